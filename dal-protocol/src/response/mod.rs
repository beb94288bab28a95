//! Server responses as records.
//!
//! [`Response`] wraps a [`ResponseEnvelope`] in the adapter for its wire
//! format. The format is chosen once from the Content-Type header; XML and
//! JSON bodies are parsed eagerly so a malformed body fails construction.

pub mod csv;
pub mod json;
pub mod xml;

pub use self::csv::{CsvOptions, CsvResponse};
pub use self::json::JsonResponse;
pub use self::xml::XmlResponse;

use crate::envelope::{ResponseEnvelope, ResponseType};
use crate::error::ProtocolError;
use crate::pagination::Pagination;
use crate::record::{Record, RecordCollector, RecordVisitor};
use crate::tags;
use std::ops::ControlFlow;

/// Passes a record to the visitor unless it is empty and empties are not
/// wanted.
pub(crate) fn deliver(
    visitor: &mut dyn RecordVisitor,
    tag: &str,
    record: &Record,
    include_empty: bool,
) -> ControlFlow<()> {
    if !include_empty && record.is_empty() {
        return ControlFlow::Continue(());
    }
    visitor.visit(tag, record)
}

/// A response in one of the three wire formats.
#[derive(Debug, Clone)]
pub enum Response {
    Xml(XmlResponse),
    Json(JsonResponse),
    Csv(CsvResponse),
}

impl Response {
    /// Selects and builds the adapter for the envelope's Content-Type.
    pub fn from_envelope(envelope: ResponseEnvelope) -> Result<Self, ProtocolError> {
        Self::from_envelope_with(envelope, CsvOptions::default())
    }

    /// Like [`Response::from_envelope`], with explicit CSV reading options.
    pub fn from_envelope_with(
        envelope: ResponseEnvelope,
        csv_options: CsvOptions,
    ) -> Result<Self, ProtocolError> {
        match ResponseType::from_content_type(envelope.content_type())? {
            ResponseType::Xml => Ok(Response::Xml(XmlResponse::new(envelope)?)),
            ResponseType::Json => Ok(Response::Json(JsonResponse::new(envelope)?)),
            ResponseType::Csv => Ok(Response::Csv(CsvResponse::new(envelope, csv_options))),
        }
    }

    pub fn response_type(&self) -> ResponseType {
        match self {
            Response::Xml(_) => ResponseType::Xml,
            Response::Json(_) => ResponseType::Json,
            Response::Csv(_) => ResponseType::Csv,
        }
    }

    pub fn envelope(&self) -> &ResponseEnvelope {
        match self {
            Response::Xml(r) => r.envelope(),
            Response::Json(r) => r.envelope(),
            Response::Csv(r) => r.envelope(),
        }
    }

    /// URL of the request that produced this response.
    pub fn url(&self) -> &str {
        &self.envelope().url
    }

    /// The server-reported error, if the payload carries one. CSV never
    /// does.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Response::Xml(r) => r.error_message(),
            Response::Json(r) => r.error_message(),
            Response::Csv(_) => None,
        }
    }

    /// First record under `tag`, or an empty record if there is none.
    pub fn first_record(&self, tag: &str) -> Result<Record, ProtocolError> {
        match self {
            Response::Xml(r) => r.first_record(tag),
            Response::Json(r) => r.first_record(tag),
            Response::Csv(r) => Ok(r.first_record(tag)),
        }
    }

    /// Value of `field` in the first record under `tag`.
    pub fn field_value(&self, tag: &str, field: &str) -> Result<Option<String>, ProtocolError> {
        Ok(self.first_record(tag)?.fields.shift_remove(field))
    }

    /// Visits the records under the wanted tags (all declared record tags
    /// when `wanted` is empty). Returns `Ok(false)` if the visitor stopped
    /// early.
    pub fn visit_records(
        &self,
        visitor: &mut dyn RecordVisitor,
        wanted: &[&str],
        include_empty: bool,
    ) -> Result<bool, ProtocolError> {
        match self {
            Response::Xml(r) => r.visit_records(visitor, wanted, include_empty),
            Response::Json(r) => r.visit_records(visitor, wanted, include_empty),
            Response::Csv(r) => Ok(r.visit_records(visitor, wanted, include_empty)),
        }
    }

    /// Collects every visited record, grouped by tag.
    pub fn collect_records(
        &self,
        wanted: &[&str],
        include_empty: bool,
    ) -> Result<RecordCollector, ProtocolError> {
        let mut collector = RecordCollector::new();
        self.visit_records(&mut collector, wanted, include_empty)?;
        Ok(collector)
    }

    /// Pagination info, when the response carries any.
    pub fn pagination(&self) -> Result<Option<Pagination>, ProtocolError> {
        if let Response::Csv(_) = self {
            return Ok(None);
        }
        Ok(Pagination::from_record(&self.first_record(tags::PAGINATION)?))
    }
}
