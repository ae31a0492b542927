//! Page fetching with a randomized client identity.

use rand::seq::SliceRandom;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use tracing::{debug, instrument};
use url::Url;

use alphawatch_shared::{AlphaWatchError, MonitorConfig, Result};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Fallback User-Agent when the configured pool is empty.
const DEFAULT_USER_AGENT: &str = concat!("AlphaWatch/", env!("CARGO_PKG_VERSION"));

/// Fetches the monitored page once per call.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    url: Url,
    user_agents: Vec<String>,
    accept_language: String,
}

impl PageFetcher {
    /// Build a fetcher with the configured timeout, UA pool and language.
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| AlphaWatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            user_agents: config.user_agents.clone(),
            accept_language: config.accept_language.clone(),
        })
    }

    /// The page this fetcher polls.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Random entry of the UA pool.
    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    /// GET the page body. Non-2xx statuses are errors.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn fetch(&self) -> Result<String> {
        let user_agent = self.pick_user_agent().to_string();
        debug!(%user_agent, "fetching page");

        let response = self
            .client
            .get(self.url.as_str())
            .header(USER_AGENT, user_agent)
            .header(ACCEPT_LANGUAGE, &self.accept_language)
            .send()
            .await
            .map_err(|e| AlphaWatchError::Network(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlphaWatchError::Network(format!(
                "{}: HTTP {status}",
                self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AlphaWatchError::Network(format!("{}: body read failed: {e}", self.url)))?;

        debug!(len = body.len(), "page fetched");
        Ok(body)
    }
}
