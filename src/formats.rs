use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Anchor text plus its resolved href, if the cell had one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// One release row pulled off the source listing. Lives for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedRow {
    pub raw_title: String,
    pub candidates: BTreeSet<String>,
    pub work: Link,
    pub chapter: Link,
    pub translator: Link,
    pub date: String,
}

/// Opaque CMS document identifier.
///
/// Ids are written back in the JSON type they were read with, so numeric
/// relation keys stay numbers and string ids such as `"007"` stay strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkId {
    Num(u64),
    Str(String),
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkId::Num(n) => write!(f, "{n}"),
            WorkId::Str(s) => f.write_str(s),
        }
    }
}

impl From<u64> for WorkId {
    fn from(id: u64) -> Self {
        WorkId::Num(id)
    }
}

impl From<&str> for WorkId {
    fn from(id: &str) -> Self {
        WorkId::Str(id.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogWork {
    pub id: WorkId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingChapter {
    pub url: String,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChapter {
    pub title: String,
    pub url: String,
    pub order: i64,
    pub work: WorkId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub title: String,
    pub content: String,
    pub flag: bool,
    pub origin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Fetching,
    Parsing,
    Matching,
    Reconciling,
    AuditLogged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub origin: String,
    pub success: bool,
    pub phase: RunPhase,
    pub log: Vec<String>,
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub skipped: usize,
    pub audit_recorded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MatchKind {
    Contains { len: usize },
    ExactAlt,
    ExactTitle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedWork {
    pub id: WorkId,
    pub title: String,
    #[serde(rename = "match")]
    pub kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRow {
    #[serde(flatten)]
    pub row: ScrapedRow,
    pub matched: Option<MatchedWork>,
}
