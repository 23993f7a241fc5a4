use super::policy::UrlPolicy;
use crate::config::ScrapeConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

const MAX_REDIRECTS: usize = 5;

/// One configured way of getting a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEndpoint {
    pub name: String,
    #[serde(flatten)]
    pub kind: TransportKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportKind {
    /// Request the page itself.
    Direct,
    /// Ask a relay service for the page. `{url}` in the template is replaced
    /// with the percent-encoded target, `{raw_url}` with the target as is.
    Relay {
        template: String,
        /// The relay wraps the page in JSON; read the HTML from this field.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        json_field: Option<String>,
    },
    /// Request the page through an HTTP or SOCKS proxy.
    Proxy { proxy: String },
}

impl TransportEndpoint {
    pub fn direct() -> Self {
        Self {
            name: "direct".to_string(),
            kind: TransportKind::Direct,
        }
    }

    #[cfg(test)]
    pub fn relay(name: impl Into<String>, template: impl Into<String>, json_field: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind: TransportKind::Relay {
                template: template.into(),
                json_field: json_field.map(str::to_owned),
            },
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.kind, TransportKind::Direct)
    }

    /// URL actually requested for `url` through this transport.
    pub fn target_url(&self, url: &str) -> String {
        match &self.kind {
            TransportKind::Direct | TransportKind::Proxy { .. } => url.to_string(),
            TransportKind::Relay { template, .. } => template
                .replace("{url}", &urlencoding::encode(url))
                .replace("{raw_url}", url),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("relay payload has no `{0}`")]
    Payload(String),

    #[error("empty body")]
    Empty,

    #[error("no client configured for transport `{0}`")]
    Unconfigured(String),

    #[error("redirect to {0} refused")]
    RedirectRefused(String),

    #[error("bad redirect: {0}")]
    BadRedirect(String),

    #[error("more than {0} redirects")]
    TooManyRedirects(usize),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportError::Request(format!("timeout: {}", get_error(&err)));
        }
        TransportError::Request(get_error(&err))
    }
}

/// Innermost useful message of a reqwest error chain.
fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

/// A fetched page and the address it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub html: String,
    pub url: String,
}

/// Performs a single attempt to get page HTML through one transport.
#[async_trait]
pub trait HtmlSource: Send + Sync {
    async fn get(&self, endpoint: &TransportEndpoint, url: &str) -> Result<Page, TransportError>;
}

/// reqwest-backed source. Proxy clients are built once at startup.
///
/// Redirects are followed here rather than by reqwest so that every hop of a
/// direct or proxied fetch goes through the URL policy.
pub struct ReqwestSource {
    client: Client,
    proxied: HashMap<String, Client>,
    policy: UrlPolicy,
    max_body_bytes: usize,
}

impl ReqwestSource {
    pub fn new(
        config: &ScrapeConfig,
        transports: &[TransportEndpoint],
        policy: UrlPolicy,
    ) -> Result<Self, reqwest::Error> {
        let client = Self::builder(config).build()?;

        let mut proxied = HashMap::new();
        for endpoint in transports {
            if let TransportKind::Proxy { proxy } = &endpoint.kind {
                let client = Self::builder(config)
                    .proxy(reqwest::Proxy::all(proxy.as_str())?)
                    .build()?;
                proxied.insert(endpoint.name.clone(), client);
            }
        }

        Ok(Self {
            client,
            proxied,
            policy,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn builder(config: &ScrapeConfig) -> reqwest::ClientBuilder {
        Client::builder()
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .danger_accept_invalid_hostnames(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::none())
            .pool_idle_timeout(Duration::from_secs(10))
    }

    fn client_for(&self, endpoint: &TransportEndpoint) -> Result<&Client, TransportError> {
        match endpoint.kind {
            TransportKind::Proxy { .. } => self
                .proxied
                .get(&endpoint.name)
                .ok_or_else(|| TransportError::Unconfigured(endpoint.name.clone())),
            _ => Ok(&self.client),
        }
    }

    /// Request `target`, following redirects. Returns the final response.
    async fn follow(
        &self,
        client: &Client,
        target: String,
        check_hops: bool,
    ) -> Result<reqwest::Response, TransportError> {
        let mut current = target;

        for _ in 0..=MAX_REDIRECTS {
            let resp = client.get(&current).send().await?;
            if !resp.status().is_redirection() {
                return Ok(resp);
            }

            let location = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| TransportError::BadRedirect(format!("{} without location", resp.status())))?;
            let next = resp
                .url()
                .join(location)
                .map_err(|err| TransportError::BadRedirect(format!("{location}: {err}")))?;

            if check_hops && !self.policy.permits(&next).await {
                return Err(TransportError::RedirectRefused(next.to_string()));
            }
            log::debug!("{current}: redirected to {next}");
            current = next.to_string();
        }

        Err(TransportError::TooManyRedirects(MAX_REDIRECTS))
    }

    async fn read_capped(&self, mut resp: reqwest::Response) -> Result<Vec<u8>, TransportError> {
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            let room = self.max_body_bytes.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.max_body_bytes {
                log::debug!("body cut at {} bytes", self.max_body_bytes);
                break;
            }
        }
        Ok(body)
    }
}

#[async_trait]
impl HtmlSource for ReqwestSource {
    async fn get(&self, endpoint: &TransportEndpoint, url: &str) -> Result<Page, TransportError> {
        let client = self.client_for(endpoint)?;
        let is_relay = matches!(endpoint.kind, TransportKind::Relay { .. });

        let resp = self.follow(client, endpoint.target_url(url), !is_relay).await?;
        // a relay's own address says nothing about the page it wraps
        let page_url = if is_relay { url.to_string() } else { resp.url().to_string() };
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        let bytes = self.read_capped(resp).await?;
        let body = String::from_utf8_lossy(&bytes).to_string();

        let html = match &endpoint.kind {
            TransportKind::Relay {
                json_field: Some(field),
                ..
            } => unwrap_relay_payload(&body, field)?,
            _ => body,
        };

        if html.trim().is_empty() {
            return Err(TransportError::Empty);
        }
        Ok(Page { html, url: page_url })
    }
}

/// Relays like allorigins answer `{"contents": "<html>..."}`.
fn unwrap_relay_payload(body: &str, field: &str) -> Result<String, TransportError> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get(field).and_then(|v| v.as_str()).map(str::to_owned))
        .filter(|html| !html.trim().is_empty())
        .ok_or_else(|| TransportError::Payload(field.to_string()))
}
