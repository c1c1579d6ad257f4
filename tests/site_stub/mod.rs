use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

const LISTING: &str = r#"<!doctype html>
<html><body>
<table><tbody>
  <tr>
    <td><a href="/series/orv">[T] ORV / Omniscient Reader's Viewpoint</a></td>
    <td><a href="https://c.test/orv/552">c552</a></td>
    <td><a href="/group/tl">TL Team</a></td>
    <td>10/02/24</td>
  </tr>
  <tr>
    <td><a href="/series/unknown">Completely Unknown Work</a></td>
    <td><a href="https://c.test/unknown/1">c1</a></td>
    <td>Someone</td>
    <td>10/02/24</td>
  </tr>
  <tr>
    <td><a href="/series/orv">Omniscient Reader's Viewpoint</a></td>
    <td><a href="https://c.test/orv/551">c551</a></td>
    <td><a href="/group/tl">TL Team</a></td>
    <td>10/01/24</td>
  </tr>
  <tr>
    <td><a href="/series/orv">Omniscient Reader's Viewpoint</a></td>
    <td><a href="https://c.test/orv/550">c550</a></td>
    <td><a href="/group/tl">TL Team</a></td>
    <td>09/30/24</td>
  </tr>
</tbody></table>
</body></html>
"#;

const WORKS: &str = r#"{"data":[
  {"id":1,"attributes":{"title":"Omniscient Reader's Viewpoint","alt_title":"ORV"}},
  {"id":2,"attributes":{"title":"Overgeared","alt_title":null}}
],"meta":{"pagination":{"page":1,"pageSize":100,"pageCount":1,"total":2}}}"#;

const ORV_CHAPTERS: &str = r#"{"data":[
  {"id":10,"attributes":{"url":"https://c.test/orv/550","order":550}}
],"meta":{"pagination":{"page":1,"pageSize":100,"pageCount":1,"total":1}}}"#;

const NO_CHAPTERS: &str =
    r#"{"data":[],"meta":{"pagination":{"page":1,"pageSize":100,"pageCount":0,"total":0}}}"#;

#[derive(Debug, Clone, Copy)]
pub struct SiteStubConfig {
    pub source_status: u16,
    pub audit_status: u16,
}

impl Default for SiteStubConfig {
    fn default() -> Self {
        Self {
            source_status: 200,
            audit_status: 200,
        }
    }
}

/// Serves the release listing at `/latest` and a Strapi-style CMS under
/// `/api`, recording every POST.
pub struct SiteStub {
    pub base_url: String,
    posts: Arc<Mutex<Vec<(String, Value)>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SiteStub {
    pub fn spawn(config: SiteStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start site stub server");
        let base_url = format!("http://{}", server.server_addr());
        let posts: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
        let posts_in_thread = Arc::clone(&posts);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = url::Url::parse(&format!("http://stub{}", request.url()))
                    .expect("request url");
                let path = url.path().to_owned();
                let work_filter = url
                    .query_pairs()
                    .find(|(key, _)| key == "filters[novel][id][$eq]")
                    .map(|(_, value)| value.into_owned());
                let is_post = request.method() == &tiny_http::Method::Post;

                if is_post {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let json = serde_json::from_str(&body).unwrap_or(Value::Null);
                    posts_in_thread.lock().unwrap().push((path.clone(), json));
                }

                let (status, body) = match (is_post, path.as_str()) {
                    (false, "/latest") => (config.source_status, LISTING),
                    (false, "/api/novels") => (200, WORKS),
                    (false, "/api/chapters") if work_filter.as_deref() == Some("1") => {
                        (200, ORV_CHAPTERS)
                    }
                    (false, "/api/chapters") => (200, NO_CHAPTERS),
                    (true, "/api/chapters") => (200, r#"{"data":{"id":99}}"#),
                    (true, "/api/logs") => (
                        config.audit_status,
                        r#"{"data":null,"error":{"status":500,"message":"log store down"}}"#,
                    ),
                    _ => (404, "not found"),
                };

                let _ = request
                    .respond(tiny_http::Response::from_string(body).with_status_code(status));
            }
        });

        Self {
            base_url,
            posts,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn source_url(&self) -> String {
        format!("{}/latest", self.base_url)
    }

    /// `(path, body)` of every POST received so far.
    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

impl Drop for SiteStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
