use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

pub const ENV_SOURCE_URL: &str = "NOVEL_INDEX_SOURCE_URL";
pub const ENV_CMS_URL: &str = "NOVEL_INDEX_CMS_URL";
pub const ENV_CMS_TOKEN: &str = "NOVEL_INDEX_CMS_TOKEN";
pub const ENV_CRON_SECRET: &str = "NOVEL_INDEX_CRON_SECRET";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub cms: CmsConfig,
    pub matching: MatchingConfig,
    pub reconcile: ReconcileConfig,
    pub guard: GuardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Listing page fetched once per run.
    pub url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Whether the listing shows the newest release first.
    pub newest_first: bool,
    pub rules: ParseRules,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 20,
            user_agent: format!("novel-index/{}", env!("CARGO_PKG_VERSION")),
            newest_first: true,
            rules: ParseRules::default(),
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// CSS selectors describing where release rows live on the listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseRules {
    pub row_selector: String,
    pub cell_selector: String,
    pub columns: Columns,
}

impl Default for ParseRules {
    fn default() -> Self {
        Self {
            row_selector: "table tbody tr".to_owned(),
            cell_selector: "td".to_owned(),
            columns: Columns::default(),
        }
    }
}

/// Zero-based cell positions inside one row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Columns {
    pub work: usize,
    pub chapter: usize,
    pub translator: usize,
    pub date: usize,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            work: 0,
            chapter: 1,
            translator: 2,
            date: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CmsConfig {
    /// Base URL of the CMS; collections live under `{base_url}/api/{collection}`.
    pub base_url: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub works_collection: String,
    pub chapters_collection: String,
    pub audit_collection: String,
    /// Relation field on a chapter that points at its work.
    pub work_field: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            works_collection: "novels".to_owned(),
            chapters_collection: "chapters".to_owned(),
            audit_collection: "logs".to_owned(),
            work_field: "novel".to_owned(),
            page_size: 100,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    pub min_substring_len: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_substring_len: crate::matcher::DEFAULT_MIN_SUBSTRING_LEN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    pub max_concurrent_writes: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writes: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    #[serde(skip_serializing)]
    pub cron_secret: Option<String>,
    /// Lowercase substrings; a matching `User-Agent` is refused.
    pub blocked_user_agents: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cron_secret: None,
            blocked_user_agents: [
                "gptbot",
                "ccbot",
                "bytespider",
                "ahrefsbot",
                "semrushbot",
                "mj12bot",
                "dotbot",
                "petalbot",
                "dataforseobot",
                "python-requests",
                "scrapy",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        }
    }
}

impl Config {
    /// Reads the optional YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .with_context(|| format!("read config: {}", path.display()))?;
                serde_yaml::from_str::<Config>(&yaml)
                    .with_context(|| format!("parse config: {}", path.display()))?
            }
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate().context("validate config")?;
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = lookup(ENV_SOURCE_URL) {
            self.source.url = url;
        }
        if let Some(url) = lookup(ENV_CMS_URL) {
            self.cms.base_url = url;
        }
        if let Some(token) = lookup(ENV_CMS_TOKEN) {
            self.cms.token = Some(token);
        }
        if let Some(secret) = lookup(ENV_CRON_SECRET) {
            self.guard.cron_secret = Some(secret);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        parse_http_url(&self.source.url).context("source.url")?;
        parse_http_url(&self.cms.base_url).context("cms.base_url")?;
        crate::parse::validate_rules(&self.source.rules).context("source.rules")?;

        if self.reconcile.max_concurrent_writes == 0 {
            anyhow::bail!("reconcile.max_concurrent_writes must be at least 1");
        }
        if self.cms.page_size == 0 {
            anyhow::bail!("cms.page_size must be at least 1");
        }
        Ok(())
    }

    pub fn source_url(&self) -> anyhow::Result<Url> {
        parse_http_url(&self.source.url)
    }
}

pub fn parse_http_url(raw: &str) -> anyhow::Result<Url> {
    if raw.trim().is_empty() {
        anyhow::bail!("url is required");
    }
    let url = Url::parse(raw.trim()).with_context(|| format!("parse url: {raw}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("url must be http/https: {url}");
    }
    Ok(url)
}
