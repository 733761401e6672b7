// Backend boundary: the paginated feed source and the decision sink, plus an
// HTTP implementation of both against the game server.
//
// Feed:      GET   {base_url}{feed_path}?page=N&pageSize=S -> { posts, page, total }
// Decisions: PATCH {base_url}/smash/{id} and PATCH {base_url}/pass/{id}

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use smashpass_core::config::Config;
use smashpass_core::protocol::{Decision, ItemId, Page};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("cannot submit an undecided vote for {0}")]
    Undecided(ItemId),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source of paginated items. Page numbers are 1-based.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page, BackendError>;
}

/// Remote vote counter. Both operations must be idempotent on the server
/// side; this client never retries them.
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn smash(&self, id: &ItemId) -> Result<(), BackendError>;
    async fn pass(&self, id: &ItemId) -> Result<(), BackendError>;
}

/// Route a decision to the matching sink operation.
pub async fn submit_decision(
    sink: &dyn DecisionSink,
    id: &ItemId,
    decision: Decision,
) -> Result<(), BackendError> {
    match decision {
        Decision::Smash => sink.smash(id).await,
        Decision::Pass => sink.pass(id).await,
        Decision::Undecided => Err(BackendError::Undecided(id.clone())),
    }
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// reqwest-based client for the game server.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    feed_path: String,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        feed_path: &str,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            feed_path: feed_path.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(
            &config.backend.base_url,
            &config.backend.feed_path,
            Duration::from_secs(config.backend.request_timeout_secs),
        )
    }

    pub(crate) fn feed_url(&self) -> String {
        format!("{}{}", self.base_url, self.feed_path)
    }

    pub(crate) fn decision_url(&self, verb: &str, id: &ItemId) -> String {
        format!("{}/{}/{}", self.base_url, verb, id)
    }

    /// GET for one feed page. The paging parameters are appended to any
    /// query already present in `feed_path`.
    pub(crate) fn feed_request(&self, page: u32, page_size: u32) -> reqwest::RequestBuilder {
        self.http
            .get(self.feed_url())
            .query(&[("page", page), ("pageSize", page_size)])
            .header("accept", "application/json")
    }

    async fn patch(&self, url: String) -> Result<(), BackendError> {
        debug!("PATCH {}", url);
        let response = self.http.patch(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedSource for HttpBackend {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page, BackendError> {
        let url = self.feed_url();
        debug!("GET {} page={} pageSize={}", url, page, page_size);
        let response = self.feed_request(page, page_size).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_page(&body).map_err(|e| BackendError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl DecisionSink for HttpBackend {
    async fn smash(&self, id: &ItemId) -> Result<(), BackendError> {
        self.patch(self.decision_url("smash", id)).await
    }

    async fn pass(&self, id: &ItemId) -> Result<(), BackendError> {
        self.patch(self.decision_url("pass", id)).await
    }
}

pub(crate) fn parse_page(body: &str) -> Result<Page, serde_json::Error> {
    serde_json::from_str(body)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use smashpass_core::config::DEFAULT_FEED_PATH;
    use std::sync::Mutex;

    fn backend() -> HttpBackend {
        HttpBackend::new("http://localhost:3000/", "/game", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn urls_are_built_from_base() {
        let b = backend();
        assert_eq!(b.feed_url(), "http://localhost:3000/game");
        assert_eq!(
            b.decision_url("smash", &ItemId::from("clx1")),
            "http://localhost:3000/smash/clx1"
        );
        assert_eq!(
            b.decision_url("pass", &ItemId::from("clx1")),
            "http://localhost:3000/pass/clx1"
        );
    }

    #[test]
    fn feed_request_keeps_loader_query() {
        let b = HttpBackend::new(
            "http://localhost:3000",
            DEFAULT_FEED_PATH,
            Duration::from_secs(5),
        )
        .unwrap();
        let request = b.feed_request(2, 10).build().unwrap();
        let url = request.url().as_str();
        assert!(url.starts_with("http://localhost:3000/game?_data=routes"), "{url}");
        assert!(url.ends_with("&page=2&pageSize=10"), "{url}");
        assert_eq!(request.method(), reqwest::Method::GET);
    }

    #[test]
    fn parse_page_reads_posts_payload() {
        let body = r#"{"posts":[{"id":"a","smashes":1,"passes":2,"totalVotes":3}],"page":4,"total":31}"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.page, 4);
        assert_eq!(page.total, 31);
        assert_eq!(page.items[0].passes, 2);
    }

    #[test]
    fn parse_page_rejects_garbage() {
        assert!(parse_page("<html>oops</html>").is_err());
        assert!(parse_page(r#"{"page":1}"#).is_err());
    }

    struct RecordingSink {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DecisionSink for RecordingSink {
        async fn smash(&self, id: &ItemId) -> Result<(), BackendError> {
            self.calls.lock().unwrap().push(format!("smash/{id}"));
            Ok(())
        }

        async fn pass(&self, id: &ItemId) -> Result<(), BackendError> {
            self.calls.lock().unwrap().push(format!("pass/{id}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn submit_decision_routes_by_outcome() {
        let sink = RecordingSink {
            calls: Mutex::new(Vec::new()),
        };
        let id = ItemId::from("x");
        submit_decision(&sink, &id, Decision::Smash).await.unwrap();
        submit_decision(&sink, &id, Decision::Pass).await.unwrap();
        let err = submit_decision(&sink, &id, Decision::Undecided)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Undecided(_)));
        assert_eq!(*sink.calls.lock().unwrap(), vec!["smash/x", "pass/x"]);
    }
}
