//! Default transport over `reqwest`.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{
    HttpRequest, Method, MultipartPart, RawResponse, RequestBody, Transport, TransportFactory,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

/// Connection settings for [`ReqwestTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl From<&ClientConfig> for HttpSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            accept_invalid_certs: config.accept_invalid_certs,
        }
    }
}

/// Transport with its own cookie store, so the server's session cookie
/// lives exactly as long as the login.
pub struct ReqwestTransport {
    client: Option<reqwest::Client>,
}

impl ReqwestTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientError> {
        if settings.accept_invalid_certs {
            tracing::warn!("Using insecure TLS (certificate verification disabled)");
        }
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client: Some(client),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&mut self, request: HttpRequest) -> Result<RawResponse, ClientError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ClientError::Transport("transport closed".to_string()))?;

        let builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(parts) => {
                let mut form = Form::new();
                for part in parts {
                    form = match part {
                        MultipartPart::Text { name, value } => form.text(name, value),
                        MultipartPart::File {
                            name,
                            file_name,
                            data,
                        } => {
                            let mut file_part = Part::bytes(data.to_vec());
                            if let Some(file_name) = file_name {
                                file_part = file_part.file_name(file_name);
                            }
                            form.part(name, file_part)
                        }
                    };
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("HTTP transport closed");
        }
    }
}

/// Creates a [`ReqwestTransport`] per login.
#[derive(Debug, Clone)]
pub struct ReqwestTransportFactory {
    settings: HttpSettings,
}

impl ReqwestTransportFactory {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

impl TransportFactory for ReqwestTransportFactory {
    fn create(&self) -> Result<Box<dyn Transport>, ClientError> {
        Ok(Box::new(ReqwestTransport::new(&self.settings)?))
    }
}
