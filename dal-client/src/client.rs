//! High-level client API.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::export::ExportPoll;
use crate::http::{HttpSettings, ReqwestTransportFactory};
use crate::session::{Session, SessionState};
use crate::transport::{
    HttpRequest, MultipartPart, RawResponse, StreamFactory, Transport, TransportFactory,
    UploadSource,
};
use bytes::Bytes;
use dal_protocol::signing::{self, UPLOAD_PART};
use dal_protocol::{
    tags, CommandBuilder, CsvOptions, Keyword, ProtocolError, Record, Response,
    ResponseEnvelope, ResponseType,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const LOGIN_COMMAND: &str = "login/_username/_sessionFlag";
const LOGIN_PREFIX: &str = "login/";
const LOGOUT_COMMAND: &str = "logout";
const SWITCH_GROUP_PREFIX: &str = "switch/group/";
const LIST_GROUP_COMMAND: &str = "list/group";

/// Client for one DAL server, holding at most one login session.
///
/// Every operation takes `&mut self`; share a client across tasks by giving
/// it a single owner.
pub struct Client {
    config: ClientConfig,
    factory: Arc<dyn TransportFactory>,
    transport: Option<Box<dyn Transport>>,
    session: Option<Session>,
    state: SessionState,
    csv_options: CsvOptions,
}

impl Client {
    /// Creates a client that talks HTTP through `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let factory = ReqwestTransportFactory::new(HttpSettings::from(&config));
        Self::with_transport_factory(config, Arc::new(factory))
    }

    /// Creates a client with a custom transport.
    pub fn with_transport_factory(
        mut config: ClientConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, ClientError> {
        config.base_url = crate::config::normalize_base_url(&config.base_url);
        config.validate()?;
        Ok(Self {
            config,
            factory,
            transport: None,
            session: None,
            state: SessionState::LoggedOut,
            csv_options: CsvOptions::default(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the base URL, always ending with `/`.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn response_type(&self) -> ResponseType {
        self.config.response_type
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(Session::user_id)
    }

    pub fn user_name(&self) -> Option<&str> {
        self.session.as_ref().map(Session::user_name)
    }

    pub fn group_id(&self) -> Option<&str> {
        self.session.as_ref().and_then(Session::group_id)
    }

    pub fn group_name(&self) -> Option<&str> {
        self.session.as_ref().and_then(Session::group_name)
    }

    pub fn is_in_admin_group(&self) -> bool {
        self.session
            .as_ref()
            .map(Session::is_in_admin_group)
            .unwrap_or(false)
    }

    /// Sets how CSV responses (export files) are read.
    pub fn set_csv_options(&mut self, options: CsvOptions) {
        self.csv_options = options;
    }

    /// Polling parameters taken from the configuration.
    pub fn export_poll(&self) -> ExportPoll {
        ExportPoll::from_config(&self.config.export)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Logs in. Fails without any network traffic if already logged in.
    ///
    /// The session is only kept if the server reports no error and hands out
    /// a write-token; on any failure the new transport is closed again.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        if self.session.is_some() {
            return Err(ClientError::AlreadyLoggedIn);
        }

        let url = CommandBuilder::new(LOGIN_COMMAND)
            .with_prefix(self.base_url())
            .bind("username", username)
            .bind("sessionFlag", self.config.session_expiry.url_value())
            .build()?;
        let mut fields = signing::sign_login(username, password, &url).form_fields();
        self.push_ctype(&mut fields);

        self.state = SessionState::LoggingIn;
        tracing::info!("Performing login: {}", url);

        let mut transport = match self.factory.create() {
            Ok(transport) => transport,
            Err(e) => {
                self.state = SessionState::LoggedOut;
                tracing::warn!("Login failed for '{}' on {}: {}", username, self.base_url(), e);
                return Err(e);
            }
        };

        let request = HttpRequest::post_form(url.clone(), fields);
        let outcome = match execute(transport.as_mut(), request, &self.csv_options).await {
            Ok(response) => session_from_login(&response, username),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(session) => {
                tracing::info!(
                    "Logged in as id={} ({}) on {}",
                    session.user_id(),
                    username,
                    self.base_url()
                );
                self.transport = Some(transport);
                self.session = Some(session);
                self.state = SessionState::LoggedIn;
            }
            Err(e) => {
                transport.close().await;
                self.state = SessionState::LoggedOut;
                tracing::warn!("Login failed for '{}' on {}: {}", username, self.base_url(), e);
                return Err(e);
            }
        }

        if self.config.auto_switch_group {
            if let Err(e) = self.switch_to_first_group().await {
                tracing::warn!("Automatic group switch failed: {}", e);
            }
        }

        Ok(())
    }

    async fn switch_to_first_group(&mut self) -> Result<(), ClientError> {
        let url = self.command_url(LIST_GROUP_COMMAND);
        let response = self.send(HttpRequest::get(url)).await?;
        match response.field_value(tags::SYSTEM_GROUP, tags::ATTR_SYSTEM_GROUP_ID)? {
            Some(group_id) if !group_id.is_empty() => self.switch_group(&group_id).await,
            _ => {
                tracing::warn!("No {} found to switch to", tags::SYSTEM_GROUP);
                Ok(())
            }
        }
    }

    /// Switches the session to another group. On failure the previous group
    /// stays in effect.
    pub async fn switch_group(&mut self, group_id: &str) -> Result<(), ClientError> {
        if self.session.is_none() {
            return Err(ClientError::NotLoggedIn);
        }

        let url = self.command_url(&format!("{}{}", SWITCH_GROUP_PREFIX, group_id));
        self.state = SessionState::SwitchingGroup;
        let outcome = self.group_info(url).await;
        self.state = SessionState::LoggedIn;

        let info = match outcome {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Switch to group {} failed: {}", group_id, e);
                return Err(e);
            }
        };

        if let Some(session) = self.session.as_mut() {
            if !info.is_empty() {
                let name = info.get(tags::ATTR_GROUP_NAME).map(str::to_string);
                let admin = info
                    .get(tags::ATTR_GADMIN)
                    .map(|v| v.eq_ignore_ascii_case("TRUE"))
                    .unwrap_or(false);
                session.set_group(group_id.to_string(), name, admin);
            }
            tracing::info!(
                "Switched to group id={} ({})",
                group_id,
                session.group_name().unwrap_or("")
            );
        }
        Ok(())
    }

    async fn group_info(&mut self, url: String) -> Result<Record, ClientError> {
        let response = self.send(HttpRequest::get(url)).await?;
        if let Some(msg) = response.error_message() {
            return Err(ClientError::Protocol(ProtocolError::ServerReported(msg)));
        }
        Ok(response.first_record(tags::INFO)?)
    }

    /// Logs out. Errors from the server are ignored; the session is always
    /// cleared and the transport closed. Does nothing when logged out.
    pub async fn logout(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.state = SessionState::LoggedOut;

        let url = self.command_url(LOGOUT_COMMAND);
        if let Some(mut transport) = self.transport.take() {
            match transport.execute(HttpRequest::get(url)).await {
                Ok(raw) if !(200..300).contains(&raw.status) => {
                    tracing::debug!("Logout answered HTTP {} (ignored)", raw.status);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Logout request failed (ignored): {}", e),
            }
            transport.close().await;
        }

        tracing::info!(
            "Logged out id={} ({}) from {}",
            session.user_id(),
            session.user_name(),
            self.base_url()
        );
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Performs a GET for a built command, or for an absolute `http(s)://`
    /// URL such as an export file.
    pub async fn perform_query(&mut self, command: &str) -> Result<Response, ClientError> {
        let url = if is_absolute(command) {
            if let Some(relative) = command.strip_prefix(self.base_url()) {
                check_reserved(relative)?;
            }
            command.to_string()
        } else {
            check_reserved(command)?;
            self.command_url(command)
        };
        tracing::debug!("Performing query: {}", url);
        self.send(HttpRequest::get(url)).await
    }

    /// Starts a query from a command template.
    pub fn prepare_query(&mut self, template: &str) -> QueryBuilder<'_> {
        QueryBuilder {
            client: self,
            command: CommandBuilder::new(template),
        }
    }

    // =========================================================================
    // Updates and uploads
    // =========================================================================

    /// Performs a signed POST. `None` values are sent and signed as "".
    pub async fn perform_update<I, K, V>(
        &mut self,
        command: &str,
        params: I,
    ) -> Result<Response, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Option<String>>,
    {
        let params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.update(command, params).await
    }

    /// Starts a signed POST from a command template.
    pub fn prepare_update(&mut self, template: &str) -> UpdateBuilder<'_> {
        UpdateBuilder {
            client: self,
            command: CommandBuilder::new(template),
            params: Vec::new(),
        }
    }

    /// Starts an export command. Exports are signed POSTs whose response
    /// names the file to fetch with [`Client::fetch_export`].
    pub fn prepare_export(&mut self, template: &str) -> UpdateBuilder<'_> {
        self.prepare_update(template)
    }

    /// Uploads a file with a signed multipart POST.
    pub async fn perform_upload_file<I, K, V>(
        &mut self,
        command: &str,
        params: I,
        path: impl Into<PathBuf>,
    ) -> Result<Response, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Option<String>>,
    {
        let params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.upload(command, params, UploadSource::File(path.into()))
            .await
    }

    /// Uploads stream content with a signed multipart POST. The factory is
    /// opened twice and must return an independent reader each time.
    pub async fn perform_upload_stream<I, K, V>(
        &mut self,
        command: &str,
        params: I,
        factory: Arc<dyn crate::transport::StreamFactory>,
    ) -> Result<Response, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Option<String>>,
    {
        let params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.upload(command, params, UploadSource::Stream(factory))
            .await
    }

    /// Starts an upload from a command template.
    pub fn prepare_upload(&mut self, template: &str, source: UploadSource) -> UploadBuilder<'_> {
        UploadBuilder {
            client: self,
            command: CommandBuilder::new(template),
            params: Vec::new(),
            source,
        }
    }

    async fn update(
        &mut self,
        command: &str,
        params: Vec<(String, Option<String>)>,
    ) -> Result<Response, ClientError> {
        check_reserved(command)?;
        let session = self.session.as_ref().ok_or(ClientError::NotLoggedIn)?;

        let url = format!("{}{}", self.base_url(), command);
        let signed = session.signer().sign_update(
            &url,
            params.iter().map(|(n, v)| (n.as_str(), v.as_deref())),
        );

        let mut fields: Vec<(String, String)> = params
            .into_iter()
            .map(|(n, v)| (n, v.unwrap_or_default()))
            .collect();
        fields.extend(signed.form_fields());
        self.push_ctype(&mut fields);

        tracing::debug!("Performing update: {} param_order={}", url, signed.param_order);
        self.send(HttpRequest::post_form(url, fields)).await
    }

    async fn upload(
        &mut self,
        command: &str,
        params: Vec<(String, Option<String>)>,
        source: UploadSource,
    ) -> Result<Response, ClientError> {
        check_reserved(command)?;
        let signer = self
            .session
            .as_ref()
            .ok_or(ClientError::NotLoggedIn)?
            .signer();

        let (checksum, data) = match &source {
            UploadSource::File(path) => {
                let data = Bytes::from(tokio::fs::read(path).await?);
                (signing::md5_checksum(&data[..])?, data)
            }
            UploadSource::Stream(factory) => {
                let factory = Arc::clone(factory);
                tokio::task::spawn_blocking(move || read_stream(factory.as_ref()))
                    .await
                    .map_err(|e| ClientError::Transport(format!("stream reader failed: {e}")))??
            }
        };

        let url = format!("{}{}", self.base_url(), command);
        let signed = signer.sign_upload(
            &url,
            params.iter().map(|(n, v)| (n.as_str(), v.as_deref())),
            &checksum,
        );

        let mut parts: Vec<MultipartPart> = params
            .into_iter()
            .map(|(name, value)| MultipartPart::Text {
                name,
                value: value.unwrap_or_default(),
            })
            .collect();
        parts.push(MultipartPart::File {
            name: UPLOAD_PART.to_string(),
            file_name: source.file_name(),
            data,
        });
        parts.extend(
            signed
                .form_fields()
                .into_iter()
                .map(|(name, value)| MultipartPart::Text { name, value }),
        );

        tracing::debug!(
            "Performing upload: {} param_order={} md5={}",
            url,
            signed.param_order,
            checksum
        );
        self.send(HttpRequest::post_multipart(url, parts)).await
    }

    // =========================================================================
    // Exports
    // =========================================================================

    /// Fetches the file named by an export response's `ReturnIdFile/@xml`,
    /// polling while the server answers 404.
    pub async fn fetch_export(
        &mut self,
        response: &Response,
        poll: &ExportPoll,
    ) -> Result<Response, ClientError> {
        let url = response
            .field_value(tags::RETURN_ID_FILE, tags::ATTR_XML)?
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ProtocolError::Malformed(format!(
                    "no {}/@{} in response from {}",
                    tags::RETURN_ID_FILE,
                    tags::ATTR_XML,
                    response.url()
                ))
            })?;
        if self.transport.is_none() {
            return Err(ClientError::NotLoggedIn);
        }

        let started = Instant::now();
        let mut delay = poll.first_delay();
        loop {
            let remaining = poll.timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(ClientError::ExportNotReady {
                    url,
                    waited: started.elapsed(),
                });
            }
            poll.wait(delay.min(remaining)).await?;

            match self.send(HttpRequest::get(url.clone())).await {
                Err(ClientError::Server { status: 404, .. }) => {
                    tracing::debug!("Export file {} not ready after {:?}", url, started.elapsed());
                }
                other => return other,
            }
            delay = poll.next_delay(delay);
        }
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    /// Base URL plus command, with `ctype` added when not asking for XML.
    fn command_url(&self, command: &str) -> String {
        let mut url = format!("{}{}", self.base_url(), command);
        if let Some(ctype) = self.ctype() {
            url.push(if command.contains('?') { '&' } else { '?' });
            url.push_str(signing::FIELD_CTYPE);
            url.push('=');
            url.push_str(ctype);
        }
        url
    }

    fn ctype(&self) -> Option<&'static str> {
        let response_type = self.config.response_type;
        if response_type.is_xml() {
            None
        } else {
            response_type.post_value()
        }
    }

    fn push_ctype(&self, fields: &mut Vec<(String, String)>) {
        if let Some(ctype) = self.ctype() {
            fields.push((signing::FIELD_CTYPE.to_string(), ctype.to_string()));
        }
    }

    async fn send(&mut self, request: HttpRequest) -> Result<Response, ClientError> {
        let transport = self.transport.as_mut().ok_or(ClientError::NotLoggedIn)?;
        execute(transport.as_mut(), request, &self.csv_options).await
    }
}

/// Executes a request and interprets the reply.
async fn execute(
    transport: &mut dyn Transport,
    request: HttpRequest,
    csv_options: &CsvOptions,
) -> Result<Response, ClientError> {
    let url = request.url.clone();
    let started = Instant::now();
    let raw = transport.execute(request).await?;
    interpret(url, raw, started.elapsed(), csv_options)
}

fn interpret(
    url: String,
    raw: RawResponse,
    elapsed: Duration,
    csv_options: &CsvOptions,
) -> Result<Response, ClientError> {
    tracing::debug!("Elapsed ms={} for {}", elapsed.as_millis(), url);
    let envelope = ResponseEnvelope {
        url,
        body: String::from_utf8_lossy(&raw.body).into_owned(),
        status: raw.status,
        reason: raw.reason,
        headers: raw.headers,
        elapsed,
    };
    if !envelope.is_success() {
        return Err(server_error(envelope));
    }
    Response::from_envelope_with(envelope, csv_options.clone()).map_err(|e| {
        tracing::warn!("Error response is {}", e);
        ClientError::Protocol(e)
    })
}

fn server_error(envelope: ResponseEnvelope) -> ClientError {
    let mut message = format!("HTTP code {}: {}", envelope.status, envelope.reason);
    let dal_error = dal_error_message(&envelope);
    if let Some(err) = &dal_error {
        message.push_str(": ");
        message.push_str(err);
    }
    tracing::warn!("Error response for '{}' is {}", envelope.url, message);
    ClientError::Server {
        url: envelope.url,
        status: envelope.status,
        message,
        dal_error,
    }
}

/// Best-effort extraction of the server's error from a non-2xx reply.
fn dal_error_message(envelope: &ResponseEnvelope) -> Option<String> {
    let content_type = envelope.content_type()?;
    if content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with(dal_protocol::envelope::CONTENT_TYPE_TEXT_PLAIN)
    {
        let body = envelope.body.trim();
        return (!body.is_empty()).then(|| body.to_string());
    }
    match ResponseType::from_content_type(Some(content_type)) {
        Ok(ResponseType::Xml) | Ok(ResponseType::Json) => {
            match Response::from_envelope(envelope.clone()) {
                Ok(response) => response.error_message(),
                Err(e) => Some(format!("error response failed to parse: {}", e)),
            }
        }
        _ => Some(format!("{} (Content-Type={})", envelope.reason, content_type)),
    }
}

fn session_from_login(response: &Response, username: &str) -> Result<Session, ClientError> {
    if let Some(msg) = response.error_message() {
        return Err(ClientError::Protocol(ProtocolError::ServerReported(msg)));
    }
    let user_id = response
        .field_value(tags::USER, tags::ATTR_USER_ID)?
        .unwrap_or_default();
    let write_token = response
        .field_value(tags::WRITE_TOKEN, tags::ATTR_VALUE)?
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ProtocolError::Malformed(format!(
                "login response has no {}/@{}",
                tags::WRITE_TOKEN,
                tags::ATTR_VALUE
            ))
        })?;
    Ok(Session::new(user_id, username.to_string(), write_token))
}

fn is_absolute(command: &str) -> bool {
    command.starts_with("http://") || command.starts_with("https://")
}

/// Checksums a stream upload, then reopens it for the request body.
fn read_stream(factory: &dyn StreamFactory) -> Result<(String, Bytes), ClientError> {
    let checksum = signing::md5_checksum(factory.open()?)?;
    let mut data = Vec::new();
    factory.open()?.read_to_end(&mut data)?;
    Ok((checksum, Bytes::from(data)))
}

/// Rejects commands that must go through login, logout or switch_group.
fn check_reserved(command: &str) -> Result<(), ClientError> {
    let instead = if command.starts_with(LOGIN_PREFIX) {
        "Client::login"
    } else if command.starts_with(LOGOUT_COMMAND) {
        "Client::logout"
    } else if command.starts_with(SWITCH_GROUP_PREFIX) {
        "Client::switch_group"
    } else {
        return Ok(());
    };
    tracing::warn!("Invalid attempt to perform '{}'", command);
    Err(ClientError::ReservedCommand {
        command: command.to_string(),
        instead,
    })
}

// =========================================================================
// Builders
// =========================================================================

/// Query under construction; see [`Client::prepare_query`].
pub struct QueryBuilder<'a> {
    client: &'a mut Client,
    command: CommandBuilder,
}

impl<'a> QueryBuilder<'a> {
    pub fn bind(mut self, name: &str, value: impl ToString) -> Self {
        self.command.set(name, value);
        self
    }

    pub fn clause(mut self, keyword: Keyword, value: impl Into<String>) -> Self {
        self.command.set_clause(keyword, value);
        self
    }

    pub fn filter(self, filter: impl Into<String>) -> Self {
        self.clause(Keyword::Filtering, filter)
    }

    /// Returns the command the query would perform.
    pub fn build(&self) -> Result<String, ClientError> {
        Ok(self.command.build()?)
    }

    pub async fn execute(self) -> Result<Response, ClientError> {
        let command = self.command.build()?;
        self.client.perform_query(&command).await
    }
}

/// Signed POST under construction; see [`Client::prepare_update`].
pub struct UpdateBuilder<'a> {
    client: &'a mut Client,
    command: CommandBuilder,
    params: Vec<(String, Option<String>)>,
}

impl<'a> UpdateBuilder<'a> {
    pub fn bind(mut self, name: &str, value: impl ToString) -> Self {
        self.command.set(name, value);
        self
    }

    /// Adds a parameter; parameters are signed in the order added.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), Some(value.to_string())));
        self
    }

    /// Adds a parameter that may be null. Null is signed as "".
    pub fn param_opt(mut self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        self.params
            .push((name.into(), value.map(|v| v.to_string())));
        self
    }

    pub async fn execute(self) -> Result<Response, ClientError> {
        let command = self.command.build()?;
        self.client.update(&command, self.params).await
    }
}

/// Upload under construction; see [`Client::prepare_upload`].
pub struct UploadBuilder<'a> {
    client: &'a mut Client,
    command: CommandBuilder,
    params: Vec<(String, Option<String>)>,
    source: UploadSource,
}

impl<'a> UploadBuilder<'a> {
    pub fn bind(mut self, name: &str, value: impl ToString) -> Self {
        self.command.set(name, value);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), Some(value.to_string())));
        self
    }

    pub async fn execute(self) -> Result<Response, ClientError> {
        let command = self.command.build()?;
        self.client.upload(&command, self.params, self.source).await
    }
}
