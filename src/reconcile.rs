use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::audit::{Outcome, RunLog};
use crate::cms::Cms;
use crate::dates::parse_release_date;
use crate::formats::{ExistingChapter, NewChapter, ScrapedRow, WorkId};
use crate::pool::WritePool;

/// One planned action per scraped chapter, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Create(NewChapter),
    Duplicate { title: String, url: String },
    MissingLink { title: String },
}

/// Rows matched to one catalog work.
#[derive(Debug, Clone)]
pub struct WorkGroup {
    pub id: WorkId,
    pub title: String,
    pub rows: Vec<ScrapedRow>,
}

/// Orders the group's rows chronologically and decides, per row, whether
/// it becomes a new chapter.
///
/// Rows are ordered by release date only. The sort is stable, so rows from
/// the same day keep listing order (oldest first once a newest-first listing
/// is reversed), and rows with an unreadable date come first.
///
/// New chapters continue from the highest stored order. A URL that is
/// already stored, or that appeared earlier in the same batch, is a
/// duplicate and never consumes an order number.
pub fn plan_chapters(
    work: &WorkId,
    existing: &[ExistingChapter],
    rows: &[ScrapedRow],
    newest_first: bool,
    today: NaiveDate,
) -> Vec<Step> {
    let mut ordered: Vec<&ScrapedRow> = rows.iter().collect();
    if newest_first {
        ordered.reverse();
    }
    ordered.sort_by_cached_key(|row| parse_release_date(&row.date, today));

    let mut known: HashSet<&str> = existing.iter().map(|c| c.url.trim()).collect();
    let mut current = existing.iter().filter_map(|c| c.order).max().unwrap_or(0);

    let mut steps = Vec::with_capacity(ordered.len());
    for row in ordered {
        let title = row.chapter.text.clone();
        let Some(url) = row.chapter.href.as_deref().map(str::trim) else {
            steps.push(Step::MissingLink { title });
            continue;
        };

        if !known.insert(url) {
            steps.push(Step::Duplicate {
                title,
                url: url.to_owned(),
            });
            continue;
        }

        current += 1;
        steps.push(Step::Create(NewChapter {
            title: if title.is_empty() { url.to_owned() } else { title },
            url: url.to_owned(),
            order: current,
            work: work.clone(),
        }));
    }

    steps
}

pub struct Reconciler {
    cms: Arc<dyn Cms>,
    pool: WritePool,
    newest_first: bool,
    today: NaiveDate,
}

impl Reconciler {
    pub fn new(
        cms: Arc<dyn Cms>,
        max_concurrent_writes: usize,
        newest_first: bool,
        today: NaiveDate,
    ) -> Self {
        Self {
            cms,
            pool: WritePool::new(max_concurrent_writes),
            newest_first,
            today,
        }
    }

    /// Reconciles one work. Failures are recorded in `log`, never returned.
    pub async fn reconcile(&self, group: &WorkGroup, log: &mut RunLog) {
        let existing = match self.cms.list_chapters(&group.id).await {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(work = %group.id, ?err, "could not load existing chapters");
                for row in &group.rows {
                    log.record(Outcome::Failed {
                        work: group.title.clone(),
                        chapter: row.chapter.text.clone(),
                        error: format!("load existing chapters: {err:#}"),
                    });
                }
                return;
            }
        };

        let steps = plan_chapters(
            &group.id,
            &existing,
            &group.rows,
            self.newest_first,
            self.today,
        );
        tracing::info!(
            work = %group.id,
            existing = existing.len(),
            scraped = group.rows.len(),
            creates = steps.iter().filter(|s| matches!(s, Step::Create(_))).count(),
            "reconciling work"
        );

        let handles: Vec<_> = steps
            .iter()
            .map(|step| match step {
                Step::Create(chapter) => {
                    let cms = Arc::clone(&self.cms);
                    let chapter = chapter.clone();
                    Some(self.pool.spawn(async move { cms.create_chapter(&chapter).await }))
                }
                _ => None,
            })
            .collect();

        for (step, handle) in steps.into_iter().zip(handles) {
            let outcome = match (step, handle) {
                (Step::Create(chapter), Some(handle)) => {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(err) => Err(anyhow::anyhow!("chapter create task failed: {err}")),
                    };
                    match result {
                        Ok(()) => Outcome::Created {
                            work: group.title.clone(),
                            chapter: chapter.title,
                            url: chapter.url,
                            order: chapter.order,
                        },
                        Err(err) => Outcome::Failed {
                            work: group.title.clone(),
                            chapter: chapter.title,
                            error: format!("{err:#}"),
                        },
                    }
                }
                (Step::Duplicate { title, url }, _) => Outcome::Duplicate {
                    work: group.title.clone(),
                    chapter: title,
                    url,
                },
                (Step::MissingLink { title }, _) => Outcome::Skipped {
                    title: group.title.clone(),
                    chapter: title,
                    reason: "no chapter link".to_owned(),
                },
                (Step::Create(chapter), None) => Outcome::Failed {
                    work: group.title.clone(),
                    chapter: chapter.title,
                    error: "create was not scheduled".to_owned(),
                },
            };
            log.record(outcome);
        }
    }
}
