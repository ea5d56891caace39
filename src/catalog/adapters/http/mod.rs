//! HTTP catalog fetcher speaking the MCP `tools/list` exchange.
//!
//! Two transports are supported:
//!
//! - Streamable HTTP: every JSON-RPC message is POSTed to the base URL and
//!   the reply arrives either as a JSON body or as an event stream.
//! - Legacy HTTP+SSE: a GET opens a long-lived event stream whose first
//!   `endpoint` event names the URL to POST messages to; replies arrive on
//!   the stream.
//!
//! Both transports run `initialize`, send `notifications/initialized`, then
//! follow `tools/list` pages until no `nextCursor` remains.

mod jsonrpc;
mod sse;

use self::jsonrpc::{INITIALIZE_ID, JsonRpcMessage, JsonRpcReply, ToolsPage};
use self::sse::{SseEventStream, is_event_stream_content_type};
use crate::catalog::{
    domain::{CatalogTransport, ToolDefinition, UpstreamEndpoint, UpstreamHeaders},
    ports::{CatalogFetchError, CatalogFetchResult, CatalogFetcher},
};
use crate::config::ConsoleConfig;
use async_trait::async_trait;
use futures_util::Stream;
use std::time::Duration;
use tracing::debug;

const MCP_JSON_CONTENT_TYPE: &str = "application/json";
const MCP_JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const MCP_SESSION_HEADER: &str = "mcp-session-id";
const MAX_PAGES: u64 = 100;

/// `reqwest`-backed [`CatalogFetcher`].
#[derive(Debug, Clone)]
pub struct HttpCatalogFetcher {
    client: reqwest::Client,
    protocol_version: String,
    request_timeout: Duration,
}

impl HttpCatalogFetcher {
    /// Creates a fetcher with its own connection pool.
    ///
    /// `request_timeout` bounds each POST and the connect phase of the SSE
    /// stream; the stream itself stays open until the listing completes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogFetchError::Transport`] when the HTTP client cannot
    /// be built.
    pub fn new(
        protocol_version: impl Into<String>,
        request_timeout: Duration,
    ) -> CatalogFetchResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(CatalogFetchError::transport)?;
        Ok(Self::with_client(client, protocol_version, request_timeout))
    }

    /// Creates a fetcher from console settings.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogFetchError::Transport`] when the HTTP client cannot
    /// be built.
    pub fn from_config(config: &ConsoleConfig) -> CatalogFetchResult<Self> {
        Self::new(config.protocol_version.clone(), config.http_timeout())
    }

    /// Creates a fetcher that reuses an existing client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        protocol_version: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            protocol_version: protocol_version.into(),
            request_timeout,
        }
    }

    fn post(
        &self,
        url: &str,
        headers: &UpstreamHeaders,
        session_id: Option<&str>,
        message: &JsonRpcMessage,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .header(reqwest::header::CONTENT_TYPE, MCP_JSON_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, MCP_JSON_AND_SSE_ACCEPT)
            .json(message);
        if !self.protocol_version.trim().is_empty() {
            request = request.header(MCP_PROTOCOL_VERSION_HEADER, &self.protocol_version);
        }
        if let Some(session) = session_id {
            request = request.header(MCP_SESSION_HEADER, session);
        }
        apply_upstream_headers(request, headers)
    }

    async fn list_streamable_http(
        &self,
        endpoint: &UpstreamEndpoint,
        headers: &UpstreamHeaders,
    ) -> CatalogFetchResult<Vec<ToolDefinition>> {
        let url = endpoint.base_url();
        let initialize = JsonRpcMessage::initialize(&self.protocol_version);
        let sent = self.post(url, headers, None, &initialize).send().await;
        let response = check_status(endpoint, sent)?;
        let session_id = response
            .headers()
            .get(MCP_SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        read_reply(endpoint, response, INITIALIZE_ID)
            .await?
            .into_result(endpoint)?;

        let acknowledged = self
            .post(url, headers, session_id.as_deref(), &JsonRpcMessage::initialized())
            .send()
            .await;
        check_status(endpoint, acknowledged)?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for id in (INITIALIZE_ID + 1)..=(INITIALIZE_ID + MAX_PAGES) {
            let message = JsonRpcMessage::list_tools(id, cursor.as_deref());
            let page_sent = self
                .post(url, headers, session_id.as_deref(), &message)
                .send()
                .await;
            let page_response = check_status(endpoint, page_sent)?;
            let result = read_reply(endpoint, page_response, id)
                .await?
                .into_result(endpoint)?;
            let page = ToolsPage::parse(endpoint, result)?;
            cursor = page.next_cursor().map(str::to_owned);
            tools.extend(page.into_definitions(endpoint)?);
            if cursor.is_none() {
                return Ok(tools);
            }
        }
        Err(CatalogFetchError::protocol(
            endpoint,
            format!("tools/list exceeded {MAX_PAGES} pages"),
        ))
    }

    async fn list_legacy_sse(
        &self,
        endpoint: &UpstreamEndpoint,
        headers: &UpstreamHeaders,
    ) -> CatalogFetchResult<Vec<ToolDefinition>> {
        let request = self
            .client
            .get(endpoint.base_url())
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let sent = apply_upstream_headers(request, headers).send().await;
        let response = check_status(endpoint, sent)?;
        let base = response.url().clone();
        let mut events = SseEventStream::new(Box::pin(response.bytes_stream()));

        let message_url = loop {
            let Some(event) = events.next_event().await? else {
                return Err(CatalogFetchError::protocol(
                    endpoint,
                    "event stream closed before announcing an endpoint",
                ));
            };
            if event.name.as_deref() == Some("endpoint") {
                break base.join(&event.data).map_err(|err| {
                    CatalogFetchError::protocol(endpoint, format!("invalid message endpoint: {err}"))
                })?;
            }
        };
        debug!(endpoint = endpoint.display_name(), url = %message_url, "SSE message endpoint announced");

        let initialize = JsonRpcMessage::initialize(&self.protocol_version);
        self.post_to_stream(endpoint, message_url.as_str(), headers, &initialize)
            .await?;
        next_stream_reply(endpoint, &mut events, INITIALIZE_ID)
            .await?
            .into_result(endpoint)?;
        self.post_to_stream(endpoint, message_url.as_str(), headers, &JsonRpcMessage::initialized())
            .await?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for id in (INITIALIZE_ID + 1)..=(INITIALIZE_ID + MAX_PAGES) {
            let message = JsonRpcMessage::list_tools(id, cursor.as_deref());
            self.post_to_stream(endpoint, message_url.as_str(), headers, &message)
                .await?;
            let result = next_stream_reply(endpoint, &mut events, id)
                .await?
                .into_result(endpoint)?;
            let page = ToolsPage::parse(endpoint, result)?;
            cursor = page.next_cursor().map(str::to_owned);
            tools.extend(page.into_definitions(endpoint)?);
            if cursor.is_none() {
                return Ok(tools);
            }
        }
        Err(CatalogFetchError::protocol(
            endpoint,
            format!("tools/list exceeded {MAX_PAGES} pages"),
        ))
    }

    async fn post_to_stream(
        &self,
        endpoint: &UpstreamEndpoint,
        url: &str,
        headers: &UpstreamHeaders,
        message: &JsonRpcMessage,
    ) -> CatalogFetchResult<()> {
        let response = self.post(url, headers, None, message).send().await;
        check_status(endpoint, response)?;
        debug!(endpoint = endpoint.display_name(), id = ?message.id(), "posted SSE message");
        Ok(())
    }
}

#[async_trait]
impl CatalogFetcher for HttpCatalogFetcher {
    async fn list_tools(
        &self,
        endpoint: &UpstreamEndpoint,
        headers: &UpstreamHeaders,
    ) -> CatalogFetchResult<Vec<ToolDefinition>> {
        match endpoint.transport() {
            CatalogTransport::StreamableHttp => self.list_streamable_http(endpoint, headers).await,
            CatalogTransport::Sse => self.list_legacy_sse(endpoint, headers).await,
        }
    }
}

fn apply_upstream_headers(
    mut request: reqwest::RequestBuilder,
    headers: &UpstreamHeaders,
) -> reqwest::RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn check_status(
    endpoint: &UpstreamEndpoint,
    sent: Result<reqwest::Response, reqwest::Error>,
) -> CatalogFetchResult<reqwest::Response> {
    let response = sent.map_err(CatalogFetchError::transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let display_name = endpoint.display_name().to_owned();
    if matches!(
        status,
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN
    ) {
        return Err(CatalogFetchError::Unauthorized {
            endpoint: display_name,
            status: status.as_u16(),
        });
    }
    Err(CatalogFetchError::UpstreamStatus {
        endpoint: display_name,
        status: status.as_u16(),
    })
}

async fn read_reply(
    endpoint: &UpstreamEndpoint,
    response: reqwest::Response,
    id: u64,
) -> CatalogFetchResult<JsonRpcReply> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_owned();

    if is_event_stream_content_type(&content_type) {
        let mut events = SseEventStream::new(Box::pin(response.bytes_stream()));
        return next_stream_reply(endpoint, &mut events, id).await;
    }

    let body = response.bytes().await.map_err(CatalogFetchError::transport)?;
    serde_json::from_slice(&body).map_err(|err| {
        CatalogFetchError::protocol(endpoint, format!("malformed JSON-RPC reply: {err}"))
    })
}

async fn next_stream_reply<S, B>(
    endpoint: &UpstreamEndpoint,
    events: &mut SseEventStream<S>,
    id: u64,
) -> CatalogFetchResult<JsonRpcReply>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    while let Some(event) = events.next_event().await? {
        if event.data.is_empty() {
            continue;
        }
        let Ok(reply) = serde_json::from_str::<JsonRpcReply>(&event.data) else {
            continue;
        };
        if reply.answers(id) {
            return Ok(reply);
        }
    }
    Err(CatalogFetchError::protocol(
        endpoint,
        format!("event stream ended before reply {id}"),
    ))
}
