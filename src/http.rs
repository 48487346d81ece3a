use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::Settings;

/// Something that can hand back the HTML body for a URL.
///
/// Failures (network, non-2xx, non-HTML) collapse to `None`; callers decide
/// which defaults apply.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Option<String>;
}

/// Shared reqwest client configured from [`Settings`].
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self { client })
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

impl PageSource for HttpClient {
    async fn fetch(&self, url: &str) -> Option<String> {
        debug!("GET {}", url);
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Request to {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Request to {} returned {}", url, response.status());
            return None;
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);
        if !is_html {
            warn!("Response from {} is not HTML", url);
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("Failed to read body from {}: {}", url, e);
                None
            }
        }
    }
}

/// In-memory page source keyed by URL. Used by tests and offline replays.
#[derive(Debug, Default, Clone)]
pub struct StaticPages {
    pages: HashMap<String, String>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

impl PageSource for StaticPages {
    async fn fetch(&self, url: &str) -> Option<String> {
        self.pages.get(url).cloned()
    }
}
