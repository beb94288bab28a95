//! Protocol error types.

use thiserror::Error;

/// Errors raised while building commands or interpreting server responses.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("missing value for '{name}' in command: {template}")]
    MissingParameter { name: String, template: String },

    #[error("unsupported response: no 'Content-Type' header")]
    MissingContentType,

    #[error("unsupported response: Content-Type='{0}'")]
    UnsupportedContentType(String),

    #[error("response is a DTD, not data")]
    Doctype,

    #[error("invalid JSON response: {0}")]
    Json(#[from] ParseError),

    #[error("invalid XML response: {0}")]
    Xml(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("server reported error: {0}")]
    ServerReported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether the error means the response could not be interpreted
    /// at all (as opposed to a well-formed response carrying an error).
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::MissingContentType
                | ProtocolError::UnsupportedContentType(_)
                | ProtocolError::Doctype
                | ProtocolError::Json(_)
                | ProtocolError::Xml(_)
                | ProtocolError::Malformed(_)
        )
    }

    /// Returns whether the error is a caller mistake rather than a runtime
    /// condition.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, ProtocolError::MissingParameter { .. })
    }
}

impl From<quick_xml::Error> for ProtocolError {
    fn from(e: quick_xml::Error) -> Self {
        ProtocolError::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ProtocolError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        ProtocolError::Xml(e.to_string())
    }
}

/// Object-notation parse failure, located by byte offset of the offending
/// token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}
