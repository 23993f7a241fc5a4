pub mod policy;
pub mod transport;

use crate::config::{PreviewConfig, ScrapeConfig};
use policy::UrlPolicy;
use std::sync::Arc;
use std::time::Duration;
use transport::{HtmlSource, Page, ReqwestSource, TransportEndpoint, TransportError};

/// Outcome of fetching a page. Failures carry no detail: they are logged and
/// the caller falls back to a synthesized card.
///
/// `url` is where the page was served from after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlResult {
    Fetched {
        html: String,
        transport: String,
        url: String,
    },
    Failed,
}

/// Gets page HTML by walking the transport list in order until one succeeds.
///
/// Attempts are sequential so the first success deterministically wins and a
/// shared relay sees at most one request per resolution.
pub struct Fetcher {
    source: Arc<dyn HtmlSource>,
    transports: Arc<[TransportEndpoint]>,
    policy: UrlPolicy,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn HtmlSource>,
        preview: &PreviewConfig,
        scrape: &ScrapeConfig,
    ) -> Self {
        Self {
            source,
            transports: preview.transports.clone().into(),
            policy: UrlPolicy::from(scrape),
            timeout: preview.timeout(),
            retries: preview.retries,
            backoff: preview.backoff(),
        }
    }

    pub fn from_config(preview: &PreviewConfig, scrape: &ScrapeConfig) -> Result<Self, reqwest::Error> {
        let source = ReqwestSource::new(scrape, &preview.transports, UrlPolicy::from(scrape))?;
        Ok(Self::new(Arc::new(source), preview, scrape))
    }

    #[cfg(test)]
    pub fn with_policy(mut self, policy: UrlPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn transports(&self) -> &[TransportEndpoint] {
        &self.transports
    }

    pub async fn fetch(&self, url: &str) -> HtmlResult {
        let url_parsed = match url::Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                log::warn!("{url}: invalid URL: {e}");
                return HtmlResult::Failed;
            }
        };
        match tokio::time::timeout(self.timeout, self.policy.permits(&url_parsed)).await {
            Ok(true) => {}
            Ok(false) => return HtmlResult::Failed,
            Err(_) => {
                log::warn!("{url}: policy check timed out after {:?}", self.timeout);
                return HtmlResult::Failed;
            }
        }

        let host = url_parsed.host_str().unwrap_or_default();
        let iden = format!("{host}{}", url_parsed.path());

        for endpoint in self.transports.iter() {
            let attempts = if endpoint.is_direct() { 1 + self.retries } else { 1 };

            for attempt in 0..attempts {
                if attempt > 0 {
                    log::debug!("{iden}: retrying via {}", endpoint.name);
                    tokio::time::sleep(self.backoff * attempt).await;
                }

                match self.attempt(endpoint, url).await {
                    Ok(Page { html, url }) => {
                        log::debug!("{iden}: fetched via {}", endpoint.name);
                        return HtmlResult::Fetched {
                            html,
                            transport: endpoint.name.clone(),
                            url,
                        };
                    }
                    Err(err) => {
                        log::warn!("{iden}: transport={} outcome=error err={err}", endpoint.name);
                    }
                }
            }
        }

        log::info!("{iden}: all transports failed");
        HtmlResult::Failed
    }

    async fn attempt(&self, endpoint: &TransportEndpoint, url: &str) -> Result<Page, TransportError> {
        match tokio::time::timeout(self.timeout, self.source.get(endpoint, url)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        }
    }
}
