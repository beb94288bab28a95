//! # dal-protocol
//!
//! Wire protocol implementation for KDDart DAL servers.
//!
//! This crate provides:
//! - Command URL templates with `_placeholder` segments and keyword clauses
//! - HMAC-SHA1 request signing for login, updates and file uploads
//! - A hand-written object-notation (JSON) tokenizer and parser
//! - A quote-aware CSV line splitter
//! - Format-independent [`Record`]s over XML, JSON and CSV responses
//!
//! Nothing in this crate performs network I/O.

pub mod command;
pub mod csv;
pub mod envelope;
pub mod error;
pub mod json;
pub mod pagination;
pub mod permission;
pub mod record;
pub mod response;
pub mod signing;
pub mod tags;

pub use command::{CommandBuilder, Keyword};
pub use envelope::{ResponseEnvelope, ResponseType, SessionExpiry};
pub use error::{ParseError, ProtocolError};
pub use pagination::Pagination;
pub use permission::Permission;
pub use record::{Record, RecordCollector, RecordVisitor, RowData};
pub use response::{CsvOptions, Response};
pub use signing::{RequestSigner, SignedRequest};

/// Placeholder marker: template segments starting with this are parameters.
pub const PLACEHOLDER_MARKER: char = '_';
