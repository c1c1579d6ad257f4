use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::cms::Cms;
use crate::formats::AuditRecord;

/// What happened to one scraped row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created {
        work: String,
        chapter: String,
        url: String,
        order: i64,
    },
    Duplicate {
        work: String,
        chapter: String,
        url: String,
    },
    Failed {
        work: String,
        chapter: String,
        error: String,
    },
    Skipped {
        title: String,
        chapter: String,
        reason: String,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created {
                work,
                chapter,
                url,
                order,
            } => write!(f, "created: {work} / {chapter} (order {order}) {url}"),
            Outcome::Duplicate { work, chapter, url } => {
                write!(f, "duplicate: {work} / {chapter} already has {url}")
            }
            Outcome::Failed {
                work,
                chapter,
                error,
            } => write!(f, "failed: {work} / {chapter}: {error}"),
            Outcome::Skipped {
                title,
                chapter,
                reason,
            } => write!(f, "skipped: {title} / {chapter}: {reason}"),
        }
    }
}

/// Outcome collector for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    outcomes: Vec<Outcome>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome) {
        match &outcome {
            Outcome::Failed { .. } => tracing::warn!(%outcome, "chapter outcome"),
            _ => tracing::debug!(%outcome, "chapter outcome"),
        }
        self.outcomes.push(outcome);
    }

    pub fn lines(&self) -> Vec<String> {
        self.outcomes.iter().map(ToString::to_string).collect()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Created { .. }))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Duplicate { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn to_record(&self, origin: &str, at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            title: format!(
                "Scrape {origin} {}",
                at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            content: self.lines().join("\n"),
            flag: self.has_failures(),
            origin: origin.to_owned(),
        }
    }
}

/// Writes the run's audit record. A failed write is logged and reported as
/// `false`; it never fails the run.
pub async fn submit(cms: &dyn Cms, log: &RunLog, origin: &str) -> bool {
    let record = log.to_record(origin, Utc::now());
    match cms.create_audit_record(&record).await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(?err, origin, "failed to write audit record");
            false
        }
    }
}
