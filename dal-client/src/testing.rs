//! In-memory transport for session tests.

use crate::error::ClientError;
use crate::transport::{HttpRequest, RawResponse, Transport, TransportFactory};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    responses: VecDeque<Result<RawResponse, String>>,
    requests: Vec<HttpRequest>,
    created: usize,
    closed: usize,
}

/// Scripted server: answers requests from a queue and records them.
/// Unscripted requests get a `404 text/plain`.
#[derive(Clone, Default)]
pub(crate) struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn respond(&self, status: u16, reason: &str, content_type: &str, body: &str) {
        self.lock().responses.push_back(Ok(RawResponse {
            status,
            reason: reason.to_string(),
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: Bytes::from(body.to_string()),
        }));
    }

    pub fn respond_xml(&self, body: &str) {
        self.respond(200, "OK", "text/xml", body);
    }

    pub fn respond_login_ok(&self) {
        self.respond_xml(r#"<DATA><User UserId="7"/><WriteToken Value="wt-1"/></DATA>"#);
    }

    pub fn fail_transport(&self, message: &str) {
        self.lock().responses.push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.lock().requests.last().cloned().unwrap()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn created(&self) -> usize {
        self.lock().created
    }

    pub fn closed(&self) -> usize {
        self.lock().closed
    }
}

struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&mut self, request: HttpRequest) -> Result<RawResponse, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);
        match state.responses.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ClientError::Transport(message)),
            None => Ok(RawResponse {
                status: 404,
                reason: "Not Found".to_string(),
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: Bytes::from_static(b"no scripted response"),
            }),
        }
    }

    async fn close(&mut self) {
        self.state.lock().unwrap().closed += 1;
    }
}

impl TransportFactory for MockServer {
    fn create(&self) -> Result<Box<dyn Transport>, ClientError> {
        self.lock().created += 1;
        Ok(Box::new(MockTransport {
            state: self.state.clone(),
        }))
    }
}
