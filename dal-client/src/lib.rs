//! # dal-client
//!
//! Client library for KDDart DAL servers.
//!
//! This crate provides:
//! - Login sessions with group switching
//! - Signed updates and multipart uploads
//! - Export file polling
//! - A pluggable HTTP transport (reqwest by default)
//! - YAML and environment configuration

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod http;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{Client, QueryBuilder, UpdateBuilder, UploadBuilder};
pub use config::{ClientConfig, ConfigError, ExportConfig};
pub use error::{ClientError, ErrorCategory};
pub use export::{ExportPoll, MIN_POLL_DELAY};
pub use http::{HttpSettings, ReqwestTransport, ReqwestTransportFactory};
pub use session::{Session, SessionState};
pub use transport::{
    HttpRequest, Method, MultipartPart, RawResponse, RequestBody, StreamFactory, Transport,
    TransportFactory, UploadSource,
};
