//! HTTP transport abstraction.
//!
//! The session logic only needs `execute(request) -> status, headers, body`;
//! [`crate::http::ReqwestTransport`] is the default implementation.

use crate::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: Option<String>,
        data: Bytes,
    },
}

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded` fields in order.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` parts in order.
    Multipart(Vec<MultipartPart>),
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: RequestBody::Form(fields),
        }
    }

    pub fn post_multipart(url: impl Into<String>, parts: Vec<MultipartPart>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: RequestBody::Multipart(parts),
        }
    }

    /// Form or multipart text fields, in order.
    pub fn text_fields(&self) -> Vec<(&str, &str)> {
        match &self.body {
            RequestBody::Empty => Vec::new(),
            RequestBody::Form(fields) => fields
                .iter()
                .map(|(n, v)| (n.as_str(), v.as_str()))
                .collect(),
            RequestBody::Multipart(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    MultipartPart::Text { name, value } => Some((name.as_str(), value.as_str())),
                    MultipartPart::File { .. } => None,
                })
                .collect(),
        }
    }
}

/// A response as received from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Executes HTTP requests for one session.
#[async_trait]
pub trait Transport: Send {
    async fn execute(&mut self, request: HttpRequest) -> Result<RawResponse, ClientError>;

    /// Releases connections held by the transport. Called on logout and on
    /// every failed login.
    async fn close(&mut self);
}

/// Creates a fresh transport for each login.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Transport>, ClientError>;
}

/// Produces readers over the same content.
///
/// Uploads read the content twice, once for the checksum and once for the
/// body, so every call must return a fresh reader positioned at the start.
/// Returning a shared, already consumed reader is a caller error and is not
/// detected.
pub trait StreamFactory: Send + Sync {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>>;
}

impl<F> StreamFactory for F
where
    F: Fn() -> std::io::Result<Box<dyn Read + Send>> + Send + Sync,
{
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        self()
    }
}

/// Content of an upload.
#[derive(Clone)]
pub enum UploadSource {
    File(PathBuf),
    Stream(Arc<dyn StreamFactory>),
}

impl UploadSource {
    /// File name sent with the `uploadfile` part, if known.
    pub fn file_name(&self) -> Option<String> {
        match self {
            UploadSource::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            UploadSource::Stream(_) => None,
        }
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadSource::File(path) => f.debug_tuple("File").field(path).finish(),
            UploadSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_fields() {
        let req = HttpRequest::post_multipart(
            "u",
            vec![
                MultipartPart::Text {
                    name: "a".into(),
                    value: "1".into(),
                },
                MultipartPart::File {
                    name: "uploadfile".into(),
                    file_name: None,
                    data: Bytes::from_static(b"x"),
                },
                MultipartPart::Text {
                    name: "b".into(),
                    value: "2".into(),
                },
            ],
        );
        assert_eq!(req.text_fields(), vec![("a", "1"), ("b", "2")]);
        assert!(HttpRequest::get("u").text_fields().is_empty());
    }

    #[test]
    fn test_upload_source_file_name() {
        let file = UploadSource::File(PathBuf::from("/tmp/trial-units.csv"));
        assert_eq!(file.file_name().as_deref(), Some("trial-units.csv"));

        let factory = || -> std::io::Result<Box<dyn Read + Send>> {
            Ok(Box::new(std::io::Cursor::new(b"abc".to_vec())))
        };
        let stream = UploadSource::Stream(Arc::new(factory));
        assert_eq!(stream.file_name(), None);
        assert_eq!(format!("{:?}", stream), "Stream(..)");
    }
}
