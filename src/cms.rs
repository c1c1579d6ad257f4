use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::CmsConfig;
use crate::formats::{AuditRecord, CatalogWork, ExistingChapter, NewChapter, WorkId};

/// The slice of the headless CMS the pipeline talks to.
#[async_trait]
pub trait Cms: Send + Sync {
    /// Every catalog work, in CMS order.
    async fn list_works(&self) -> anyhow::Result<Vec<CatalogWork>>;
    async fn list_chapters(&self, work: &WorkId) -> anyhow::Result<Vec<ExistingChapter>>;
    async fn create_chapter(&self, chapter: &NewChapter) -> anyhow::Result<()>;
    async fn create_audit_record(&self, record: &AuditRecord) -> anyhow::Result<()>;
}

/// Strapi-style REST client: `filters[..]`/`fields[..]`/`pagination[..]`
/// query parameters for reads, `{"data": {..}}` bodies for writes.
#[derive(Debug, Clone)]
pub struct RestCms {
    client: reqwest::Client,
    base_url: Url,
    config: CmsConfig,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<Entry<T>>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Entry<T> {
    id: WorkId,
    attributes: T,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page: u32,
    page_count: u32,
}

#[derive(Debug, Deserialize)]
struct WorkAttributes {
    title: String,
    #[serde(default)]
    alt_title: Option<String>,
}

impl RestCms {
    pub fn new(config: &CmsConfig) -> anyhow::Result<Self> {
        let base_url = crate::config::parse_http_url(&config.base_url).context("cms base url")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("build cms http client")?;

        Ok(Self {
            client,
            base_url,
            config: config.clone(),
        })
    }

    fn collection_url(&self, collection: &str) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("cms base url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["api", collection]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Walks every page of a collection listing until `pageCount`.
    async fn list_all<T: DeserializeOwned>(
        &self,
        collection: &str,
        params: &[(String, String)],
    ) -> anyhow::Result<Vec<Entry<T>>> {
        let mut out = Vec::new();
        let mut page = 1_u32;

        loop {
            let mut url = self.collection_url(collection)?;
            {
                let mut query = url.query_pairs_mut();
                for (key, value) in params {
                    query.append_pair(key, value);
                }
                query.append_pair("pagination[page]", &page.to_string());
                query.append_pair("pagination[pageSize]", &self.config.page_size.to_string());
            }

            let response = self
                .authorize(self.client.get(url.clone()))
                .send()
                .await
                .with_context(|| format!("GET {url}"))?;
            let raw = read_success_body(response, &url).await?;
            let parsed: ListResponse<T> = serde_json::from_str(&raw)
                .with_context(|| format!("parse {collection} listing"))?;

            let fetched = parsed.data.len();
            out.extend(parsed.data);

            let page_count = parsed
                .meta
                .and_then(|meta| meta.pagination)
                .map(|p| p.page_count.max(p.page))
                .unwrap_or(page);
            tracing::debug!(collection, page, page_count, fetched, "fetched cms page");
            if page >= page_count || fetched == 0 {
                break;
            }
            page += 1;
        }

        Ok(out)
    }

    async fn post_data(&self, collection: &str, data: serde_json::Value) -> anyhow::Result<()> {
        let url = self.collection_url(collection)?;
        let body = serde_json::json!({ "data": data });
        let response = self
            .authorize(self.client.post(url.clone()))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        read_success_body(response, &url).await?;
        Ok(())
    }
}

#[async_trait]
impl Cms for RestCms {
    async fn list_works(&self) -> anyhow::Result<Vec<CatalogWork>> {
        let params = [
            ("fields[0]".to_owned(), "title".to_owned()),
            ("fields[1]".to_owned(), "alt_title".to_owned()),
            ("sort[0]".to_owned(), "id:asc".to_owned()),
        ];
        let entries: Vec<Entry<WorkAttributes>> = self
            .list_all(&self.config.works_collection, &params)
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| CatalogWork {
                id: entry.id,
                title: entry.attributes.title,
                alt_title: entry.attributes.alt_title,
            })
            .collect())
    }

    async fn list_chapters(&self, work: &WorkId) -> anyhow::Result<Vec<ExistingChapter>> {
        let params = [
            (
                format!("filters[{}][id][$eq]", self.config.work_field),
                work.to_string(),
            ),
            ("fields[0]".to_owned(), "url".to_owned()),
            ("fields[1]".to_owned(), "order".to_owned()),
        ];
        let entries: Vec<Entry<ExistingChapter>> = self
            .list_all(&self.config.chapters_collection, &params)
            .await?;
        Ok(entries.into_iter().map(|entry| entry.attributes).collect())
    }

    async fn create_chapter(&self, chapter: &NewChapter) -> anyhow::Result<()> {
        let mut data = serde_json::json!({
            "title": chapter.title,
            "url": chapter.url,
            "order": chapter.order,
        });
        if let Some(obj) = data.as_object_mut() {
            obj.insert(
                self.config.work_field.clone(),
                serde_json::to_value(&chapter.work).context("serialize work id")?,
            );
        }
        self.post_data(&self.config.chapters_collection, data).await
    }

    async fn create_audit_record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let data = serde_json::to_value(record).context("serialize audit record")?;
        self.post_data(&self.config.audit_collection, data).await
    }
}

async fn read_success_body(response: reqwest::Response, url: &Url) -> anyhow::Result<String> {
    let status = response.status();
    let raw = response
        .text()
        .await
        .with_context(|| format!("read response body from {url}"))?;
    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or(raw);
        anyhow::bail!("CMS error ({status}) from {url}: {message}");
    }
    Ok(raw)
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// In-memory CMS that records every write.
    #[derive(Default)]
    pub struct FakeCms {
        pub works: Vec<CatalogWork>,
        pub chapters: HashMap<WorkId, Vec<ExistingChapter>>,
        pub fail_urls: HashSet<String>,
        pub fail_chapter_listing: HashSet<WorkId>,
        pub fail_works: bool,
        pub fail_audit: bool,
        pub write_delay: Option<Duration>,
        pub created: Mutex<Vec<NewChapter>>,
        pub audits: Mutex<Vec<AuditRecord>>,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl FakeCms {
        pub fn with_works(works: Vec<CatalogWork>) -> Self {
            Self {
                works,
                ..Self::default()
            }
        }

        pub fn created(&self) -> Vec<NewChapter> {
            self.created.lock().unwrap().clone()
        }

        pub fn audits(&self) -> Vec<AuditRecord> {
            self.audits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Cms for FakeCms {
        async fn list_works(&self) -> anyhow::Result<Vec<CatalogWork>> {
            if self.fail_works {
                anyhow::bail!("works listing unavailable");
            }
            Ok(self.works.clone())
        }

        async fn list_chapters(&self, work: &WorkId) -> anyhow::Result<Vec<ExistingChapter>> {
            if self.fail_chapter_listing.contains(work) {
                anyhow::bail!("chapter listing unavailable for {work}");
            }
            Ok(self.chapters.get(work).cloned().unwrap_or_default())
        }

        async fn create_chapter(&self, chapter: &NewChapter) -> anyhow::Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.write_delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_urls.contains(&chapter.url) {
                anyhow::bail!("CMS rejected {}", chapter.url);
            }
            self.created.lock().unwrap().push(chapter.clone());
            Ok(())
        }

        async fn create_audit_record(&self, record: &AuditRecord) -> anyhow::Result<()> {
            if self.fail_audit {
                anyhow::bail!("audit collection unavailable");
            }
            self.audits.lock().unwrap().push(record.clone());
            Ok(())
        }
    }
}
