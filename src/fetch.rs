use anyhow::Context as _;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::config::SourceConfig;

/// Fetches the source listing page. One attempt per run, no retry.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl Fetcher {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build source http client")?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Returns the page body. Network errors and non-2xx statuses are errors.
    pub async fn fetch_html(&self, url: &Url) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url}: unexpected status {status}");
        }

        let html = response
            .text()
            .await
            .with_context(|| format!("read body of {url}"))?;
        tracing::debug!(%url, bytes = html.len(), "fetched listing page");
        Ok(html)
    }
}
