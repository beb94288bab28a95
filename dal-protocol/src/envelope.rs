//! Raw HTTP response envelopes and response format selection.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const CONTENT_TYPE_TEXT_XML: &str = "text/xml";
pub const CONTENT_TYPE_APPLICATION_XML: &str = "application/xml";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_CSV: &str = "text/x-comma-separated-values";
pub const CONTENT_TYPE_TEXT_CSV: &str = "text/csv";
pub const CONTENT_TYPE_TEXT_PLAIN: &str = "text/plain";

/// Response format of a server reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Xml,
    Json,
    Csv,
}

impl ResponseType {
    /// Value sent as `ctype`, if the format can be requested at all.
    /// XML is the server default and never needs to be asked for.
    pub fn post_value(&self) -> Option<&'static str> {
        match self {
            ResponseType::Xml => Some("xml"),
            ResponseType::Json => Some("json"),
            ResponseType::Csv => None,
        }
    }

    /// Returns whether a client may ask for this format.
    pub fn is_requestable(&self) -> bool {
        self.post_value().is_some()
    }

    pub fn is_xml(&self) -> bool {
        matches!(self, ResponseType::Xml)
    }

    /// Selects the format from a Content-Type header value.
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, ProtocolError> {
        let content_type = content_type.ok_or(ProtocolError::MissingContentType)?;
        let lower = content_type.trim().to_ascii_lowercase();
        if lower.starts_with(CONTENT_TYPE_TEXT_XML) || lower.starts_with(CONTENT_TYPE_APPLICATION_XML) {
            Ok(ResponseType::Xml)
        } else if lower.starts_with(CONTENT_TYPE_JSON) {
            Ok(ResponseType::Json)
        } else if lower.starts_with(CONTENT_TYPE_CSV) || lower.starts_with(CONTENT_TYPE_TEXT_CSV) {
            Ok(ResponseType::Csv)
        } else {
            Err(ProtocolError::UnsupportedContentType(content_type.to_string()))
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResponseType::Xml => "xml",
            ResponseType::Json => "json",
            ResponseType::Csv => "csv",
        })
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(ResponseType::Xml),
            "json" => Ok(ResponseType::Json),
            "csv" => Ok(ResponseType::Csv),
            other => Err(format!("unknown response type '{}'", other)),
        }
    }
}

/// How a login session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionExpiry {
    /// Session lives until an explicit logout.
    ExplicitLogout,
    /// Session expires on the server after inactivity.
    #[default]
    AutoExpire,
}

impl SessionExpiry {
    /// Value of the `_sessionFlag` segment of the login command.
    pub fn url_value(&self) -> &'static str {
        match self {
            SessionExpiry::ExplicitLogout => "yes",
            SessionExpiry::AutoExpire => "no",
        }
    }
}

impl fmt::Display for SessionExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionExpiry::ExplicitLogout => "Explicit Logout",
            SessionExpiry::AutoExpire => "Auto Expire",
        })
    }
}

impl FromStr for SessionExpiry {
    type Err = String;

    /// Accepts the URL values (`yes`/`no`) as well as the variant names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yes" | "explicit_logout" => Ok(SessionExpiry::ExplicitLogout),
            "no" | "auto_expire" => Ok(SessionExpiry::AutoExpire),
            other => Err(format!("unknown session expiry '{}'", other)),
        }
    }
}

/// An HTTP response as received, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub url: String,
    pub body: String,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl ResponseEnvelope {
    /// Creates a 200 OK envelope with the given Content-Type.
    pub fn ok(url: impl Into<String>, content_type: &str, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            status: 200,
            reason: "OK".to_string(),
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            elapsed: Duration::ZERO,
        }
    }

    /// Case-insensitive header lookup; the first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns whether the body is a raw doctype or entity declaration
    /// instead of data.
    pub fn looks_like_doctype(&self) -> bool {
        self.body.trim_start().starts_with("<!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_mapping() {
        let cases = [
            ("text/xml; charset=UTF-8", ResponseType::Xml),
            ("application/xml", ResponseType::Xml),
            ("application/json;charset=utf-8", ResponseType::Json),
            ("Application/JSON", ResponseType::Json),
            ("text/x-comma-separated-values", ResponseType::Csv),
            ("text/csv", ResponseType::Csv),
        ];
        for (ct, expected) in cases {
            assert_eq!(ResponseType::from_content_type(Some(ct)).unwrap(), expected, "{ct}");
        }
    }

    #[test]
    fn test_content_type_errors() {
        assert!(matches!(
            ResponseType::from_content_type(None),
            Err(ProtocolError::MissingContentType)
        ));
        match ResponseType::from_content_type(Some("text/html")) {
            Err(ProtocolError::UnsupportedContentType(ct)) => assert_eq!(ct, "text/html"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_post_values() {
        assert_eq!(ResponseType::Xml.post_value(), Some("xml"));
        assert_eq!(ResponseType::Json.post_value(), Some("json"));
        assert_eq!(ResponseType::Csv.post_value(), None);
        assert!(!ResponseType::Csv.is_requestable());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("JSON".parse::<ResponseType>().unwrap(), ResponseType::Json);
        assert!("yaml".parse::<ResponseType>().is_err());
        assert_eq!("yes".parse::<SessionExpiry>().unwrap(), SessionExpiry::ExplicitLogout);
        assert_eq!("auto_expire".parse::<SessionExpiry>().unwrap(), SessionExpiry::AutoExpire);
        assert!("maybe".parse::<SessionExpiry>().is_err());
    }

    #[test]
    fn test_session_expiry_url_value() {
        assert_eq!(SessionExpiry::ExplicitLogout.url_value(), "yes");
        assert_eq!(SessionExpiry::AutoExpire.url_value(), "no");
        assert_eq!(SessionExpiry::default(), SessionExpiry::AutoExpire);
    }

    #[test]
    fn test_envelope_headers() {
        let mut env = ResponseEnvelope::ok("u", "text/xml", "<DATA/>");
        env.headers.push(("X-Other".into(), "1".into()));
        assert_eq!(env.content_type(), Some("text/xml"));
        assert_eq!(env.header("content-type"), Some("text/xml"));
        assert_eq!(env.header("x-other"), Some("1"));
        assert!(env.is_success());
        assert!(!env.looks_like_doctype());

        env.body = "<!DOCTYPE html>".into();
        env.status = 404;
        assert!(env.looks_like_doctype());
        assert!(!env.is_success());
    }
}
