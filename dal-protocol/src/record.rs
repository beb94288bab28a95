//! Format-independent result records.

use indexmap::IndexMap;
use std::ops::ControlFlow;

/// Ordered field map of a record or nested row.
pub type RowData = IndexMap<String, String>;

/// One unit of result data, identical in shape whatever the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// URL of the request that produced the record.
    pub url: String,
    /// Tag (element or collection name) the record was found under.
    pub tag: String,
    /// Scalar fields in document order.
    pub fields: RowData,
    /// Nested rows keyed by child tag.
    pub nested: IndexMap<String, Vec<RowData>>,
    /// Structural oddities seen while building the record.
    pub warnings: Vec<String>,
}

impl Record {
    pub fn new(url: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Returns whether the record has neither fields nor nested rows.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.nested.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Returns the nested rows under a child tag (empty if none).
    pub fn nested_rows(&self, child: &str) -> &[RowData] {
        self.nested.get(child).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn add_nested(&mut self, child: impl Into<String>, row: RowData) {
        self.nested.entry(child.into()).or_default().push(row);
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Receives records during a visit. Returning `ControlFlow::Break` stops the
/// visit early.
pub trait RecordVisitor {
    fn visit(&mut self, tag: &str, record: &Record) -> ControlFlow<()>;
}

impl<F> RecordVisitor for F
where
    F: FnMut(&str, &Record) -> ControlFlow<()>,
{
    fn visit(&mut self, tag: &str, record: &Record) -> ControlFlow<()> {
        self(tag, record)
    }
}

/// Visitor that keeps every record, grouped by tag.
#[derive(Debug, Default)]
pub struct RecordCollector {
    records: IndexMap<String, Vec<Record>>,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, tag: &str) -> &[Record] {
        self.records.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_records(self) -> IndexMap<String, Vec<Record>> {
        self.records
    }
}

impl RecordVisitor for RecordCollector {
    fn visit(&mut self, tag: &str, record: &Record) -> ControlFlow<()> {
        self.records
            .entry(tag.to_string())
            .or_default()
            .push(record.clone());
        ControlFlow::Continue(())
    }
}
