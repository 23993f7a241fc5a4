mod resolver;

use crate::config::{PreviewConfig, ScrapeConfig};
use crate::metadata::synthesize::FaviconService;
use crate::metadata::Resolver;
use crate::scrape::transport::{HtmlSource, Page, TransportEndpoint, TransportError};
use crate::scrape::Fetcher;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted transport does when asked for a page.
#[derive(Clone)]
pub enum Script {
    Html(String),
    Fail,
    Hang,
    Panic,
}

/// Transport outcomes keyed by transport name; records every attempt.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, transport: &str, script: Script) -> Self {
        self.scripts.insert(transport.to_string(), script);
        self
    }

    /// Transport names in the order they were tried.
    pub fn names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, url)| url.clone()).collect()
    }
}

#[async_trait]
impl HtmlSource for ScriptedSource {
    async fn get(&self, endpoint: &TransportEndpoint, url: &str) -> Result<Page, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.name.clone(), url.to_string()));

        match self.scripts.get(&endpoint.name) {
            Some(Script::Html(html)) => Ok(Page {
                html: html.clone(),
                url: url.to_string(),
            }),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(TransportError::Empty)
            }
            Some(Script::Panic) => panic!("scripted transport panic"),
            Some(Script::Fail) | None => Err(TransportError::Status(reqwest::StatusCode::BAD_GATEWAY)),
        }
    }
}

pub fn relay(name: &str) -> TransportEndpoint {
    TransportEndpoint::relay(name, format!("https://{name}.example/get?url={{url}}"), None)
}

pub fn preview_config(transports: Vec<TransportEndpoint>) -> PreviewConfig {
    PreviewConfig {
        timeout_ms: 100,
        backoff_ms: 1,
        transports,
        ..Default::default()
    }
}

pub fn open_scrape_config() -> ScrapeConfig {
    ScrapeConfig {
        block_private_ips: false,
        ..Default::default()
    }
}

pub fn scripted_resolver(source: Arc<ScriptedSource>, preview: PreviewConfig) -> Resolver {
    let fetcher = Fetcher::new(source, &preview, &open_scrape_config());
    Resolver::new(fetcher, FaviconService::default())
}

pub fn page(head: &str) -> String {
    format!("<!doctype html><html><head>{head}</head><body><p>hello</p></body></html>")
}
