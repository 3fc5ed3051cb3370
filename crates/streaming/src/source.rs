//! Transport for GetFeatureInfo requests.
//!
//! `HttpSource` talks to live WMS services; `MemorySource` answers from a
//! table of canned responses with optional latency, for tests and demos.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::FetchError;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches the body of a feature-info URL.
///
/// Implementations must be `Send + Sync`; the orchestrator shares one source
/// across all batches. Cancellation is handled by the caller dropping the
/// future.
pub trait FeatureInfoSource: Send + Sync {
    fn fetch(&self, url: String) -> BoxFuture<'_, Result<String, FetchError>>;
}

pub struct HttpSource {
    client: reqwest::Client,
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl FeatureInfoSource for HttpSource {
    fn fetch(&self, url: String) -> BoxFuture<'_, Result<String, FetchError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|source| FetchError::Http {
                    url: url.clone(),
                    source,
                })?;

            if !resp.status().is_success() {
                return Err(FetchError::Status {
                    status: resp.status().as_u16(),
                    url,
                });
            }

            resp.text()
                .await
                .map_err(|source| FetchError::Http { url, source })
        })
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Body(String),
    Status(u16),
}

#[derive(Debug, Clone)]
struct Route {
    prefix: String,
    reply: Reply,
    delay: Duration,
    once: bool,
}

/// Canned responses keyed by URL prefix. The first matching route wins and
/// one-shot routes are consumed on use; unmatched URLs answer 404.
#[derive(Debug, Default)]
pub struct MemorySource {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, prefix: String, reply: Reply, delay: Duration, once: bool) {
        self.routes.lock().push(Route {
            prefix,
            reply,
            delay,
            once,
        });
    }

    pub fn respond(&self, prefix: impl Into<String>, body: impl Into<String>, delay: Duration) {
        self.push(prefix.into(), Reply::Body(body.into()), delay, false);
    }

    /// Like [`Self::respond`], but answers a single request only.
    pub fn respond_once(
        &self,
        prefix: impl Into<String>,
        body: impl Into<String>,
        delay: Duration,
    ) {
        self.push(prefix.into(), Reply::Body(body.into()), delay, true);
    }

    pub fn fail(&self, prefix: impl Into<String>, status: u16, delay: Duration) {
        self.push(prefix.into(), Reply::Status(status), delay, false);
    }

    /// Every URL fetched so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl FeatureInfoSource for MemorySource {
    fn fetch(&self, url: String) -> BoxFuture<'_, Result<String, FetchError>> {
        self.requests.lock().push(url.clone());
        let route = {
            let mut routes = self.routes.lock();
            let matched = routes.iter().position(|r| url.starts_with(&r.prefix));
            match matched {
                Some(idx) if routes[idx].once => Some(routes.remove(idx)),
                Some(idx) => Some(routes[idx].clone()),
                None => None,
            }
        };

        Box::pin(async move {
            let Some(route) = route else {
                return Err(FetchError::Status { url, status: 404 });
            };
            if !route.delay.is_zero() {
                tokio::time::sleep(route.delay).await;
            }
            match route.reply {
                Reply::Body(body) => Ok(body),
                Reply::Status(status) => Err(FetchError::Status { url, status }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{FeatureInfoSource, MemorySource};
    use crate::error::FetchError;

    #[tokio::test(start_paused = true)]
    async fn memory_source_routes_by_prefix() {
        let source = MemorySource::new();
        source.respond("https://a.example/wms", "<a/>", Duration::from_millis(30));
        source.fail("https://b.example/wms", 503, Duration::ZERO);

        let body = source
            .fetch("https://a.example/wms?X=1".to_string())
            .await
            .expect("body");
        assert_eq!(body, "<a/>");

        let err = source
            .fetch("https://b.example/wms?X=1".to_string())
            .await
            .expect_err("503");
        assert!(matches!(err, FetchError::Status { status: 503, .. }));

        let err = source
            .fetch("https://c.example/".to_string())
            .await
            .expect_err("404");
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(source.requests().len(), 3);
    }

    #[tokio::test]
    async fn one_shot_routes_are_consumed_in_order() {
        let source = MemorySource::new();
        source.respond_once("https://a.example", "first", Duration::ZERO);
        source.respond_once("https://a.example", "second", Duration::ZERO);

        let url = || "https://a.example/wms".to_string();
        assert_eq!(source.fetch(url()).await.expect("first"), "first");
        assert_eq!(source.fetch(url()).await.expect("second"), "second");
        assert!(source.fetch(url()).await.is_err());
    }
}
