use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use url::Url;

use crate::audit::{Outcome, RunLog};
use crate::cms::Cms;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::formats::{PreviewRow, RunPhase, RunSummary, ScrapedRow, WorkId};
use crate::matcher::Catalog;
use crate::reconcile::{Reconciler, WorkGroup};

/// One scrape-and-reconcile pipeline bound to a source and a CMS.
pub struct Pipeline {
    config: Config,
    source_url: Url,
    fetcher: Fetcher,
    cms: Arc<dyn Cms>,
}

/// Error returned when a run aborts before any write.
#[derive(Debug)]
pub struct RunAborted {
    pub run_id: String,
    pub failed_during: RunPhase,
    pub error: anyhow::Error,
}

impl std::fmt::Display for RunAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run {} aborted: {:#}", self.run_id, self.error)
    }
}

impl std::error::Error for RunAborted {}

struct Matched {
    rows: Vec<ScrapedRow>,
    catalog: Catalog,
}

impl Pipeline {
    pub fn new(config: Config, cms: Arc<dyn Cms>) -> anyhow::Result<Self> {
        let source_url = config.source_url().context("source url")?;
        let fetcher = Fetcher::new(&config.source).context("build fetcher")?;
        Ok(Self {
            config,
            source_url,
            fetcher,
            cms,
        })
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let cms = crate::cms::RestCms::new(&config.cms).context("build cms client")?;
        Self::new(config, Arc::new(cms))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the full pipeline.
    ///
    /// Only a failure before reconciliation (source fetch, catalog load)
    /// is returned as an error; per-chapter failures end up in the summary.
    pub async fn run(&self, origin: &str) -> Result<RunSummary, RunAborted> {
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(%run_id, origin, "run started");

        let abort = |failed_during: RunPhase, error: anyhow::Error| {
            tracing::error!(%run_id, ?failed_during, ?error, "run aborted");
            transition(&run_id, RunPhase::Failed);
            RunAborted {
                run_id: run_id.clone(),
                failed_during,
                error,
            }
        };

        let matched = self
            .fetch_and_match(&run_id)
            .await
            .map_err(|(phase, err)| abort(phase, err))?;

        let mut log = RunLog::new();
        let groups = group_by_work(&matched, &mut log);

        transition(&run_id, RunPhase::Reconciling);
        let reconciler = Reconciler::new(
            Arc::clone(&self.cms),
            self.config.reconcile.max_concurrent_writes,
            self.config.source.newest_first,
            Utc::now().date_naive(),
        );
        for group in &groups {
            reconciler.reconcile(group, &mut log).await;
        }

        let audit_recorded = crate::audit::submit(self.cms.as_ref(), &log, origin).await;
        transition(&run_id, RunPhase::AuditLogged);

        let summary = RunSummary {
            run_id,
            origin: origin.to_owned(),
            success: !log.has_failures(),
            phase: RunPhase::AuditLogged,
            log: log.lines(),
            created: log.created(),
            duplicates: log.duplicates(),
            failed: log.failed(),
            skipped: log.skipped(),
            audit_recorded,
        };
        tracing::info!(
            run_id = %summary.run_id,
            success = summary.success,
            created = summary.created,
            duplicates = summary.duplicates,
            failed = summary.failed,
            skipped = summary.skipped,
            "run finished"
        );
        Ok(summary)
    }

    /// Fetches, parses and matches without writing anything.
    pub async fn preview(&self) -> anyhow::Result<Vec<PreviewRow>> {
        let run_id = "preview";
        let matched = self
            .fetch_and_match(run_id)
            .await
            .map_err(|(_, err)| err)?;

        Ok(matched
            .rows
            .into_iter()
            .map(|row| {
                let found = matched.catalog.best_match(&row.candidates);
                PreviewRow { row, matched: found }
            })
            .collect())
    }

    async fn fetch_and_match(&self, run_id: &str) -> Result<Matched, (RunPhase, anyhow::Error)> {
        transition(run_id, RunPhase::Fetching);
        let html = self
            .fetcher
            .fetch_html(&self.source_url)
            .await
            .context("fetch source listing")
            .map_err(|err| (RunPhase::Fetching, err))?;

        transition(run_id, RunPhase::Parsing);
        let rows = crate::parse::parse_rows(&html, &self.source_url, &self.config.source.rules)
            .context("parse source listing")
            .map_err(|err| (RunPhase::Parsing, err))?;

        transition(run_id, RunPhase::Matching);
        let works = self
            .cms
            .list_works()
            .await
            .context("load catalog")
            .map_err(|err| (RunPhase::Matching, err))?;
        let catalog = Catalog::new(works, self.config.matching.min_substring_len);
        tracing::info!(run_id, rows = rows.len(), works = catalog.len(), "matching rows");

        Ok(Matched { rows, catalog })
    }
}

fn transition(run_id: &str, phase: RunPhase) {
    tracing::info!(run_id, ?phase, "run phase");
}

/// Groups matched rows by work, in order of first appearance. Unmatched
/// rows are logged as skipped.
fn group_by_work(matched: &Matched, log: &mut RunLog) -> Vec<WorkGroup> {
    let mut groups: Vec<WorkGroup> = Vec::new();
    let mut index: HashMap<WorkId, usize> = HashMap::new();

    for row in &matched.rows {
        let Some(found) = matched.catalog.best_match(&row.candidates) else {
            log.record(Outcome::Skipped {
                title: row.raw_title.clone(),
                chapter: row.chapter.text.clone(),
                reason: "no catalog match".to_owned(),
            });
            continue;
        };

        let slot = *index.entry(found.id.clone()).or_insert_with(|| {
            groups.push(WorkGroup {
                id: found.id.clone(),
                title: found.title.clone(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push(row.clone());
    }

    groups
}
