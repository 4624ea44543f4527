use crate::config::UpstreamConfig;
use crate::errors::{SearchError, SearchRouterError};
use crate::metrics_defs::{UPSTREAM_REQUEST_DURATION, UPSTREAM_REQUEST_FAILURES};
use crate::protocol::{FanOutOutcome, SearchQuery, SearchResult};
use async_trait::async_trait;
use shared::{counter, histogram};
use tokio::time::Instant;
use url::Url;

/// Something that can resolve a single search query.
///
/// `FanOutAggregator` calls this once per query, concurrently. Implementations
/// must report every failure through the returned outcome rather than panic.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> FanOutOutcome;
}

/// Client for the upstream catalog search API.
///
/// Issues `GET <url>?term=<query>` and decodes the body as a `SearchResult`.
/// The HTTP status is logged but does not decide success: any body that
/// decodes is a result, anything else is an error. Calls are never retried.
#[derive(Clone)]
pub struct UpstreamSearchClient {
    client: reqwest::Client,
    url: Url,
}

impl UpstreamSearchClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, SearchRouterError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: config.url.clone(),
        })
    }

    fn build_request(&self, query: &SearchQuery) -> Result<reqwest::Request, SearchError> {
        self.client
            .get(self.url.clone())
            .query(&[("term", query.as_str())])
            .build()
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    "An error happened while creating the request. The request has not been sent."
                );
                SearchError::RequestConstruction(e.to_string())
            })
    }

    async fn fetch(&self, query: &SearchQuery) -> FanOutOutcome {
        let request = self.build_request(query)?;

        let response = self.client.execute(request).await.map_err(|e| {
            tracing::error!(
                error = %e,
                "An error happened while executing the request. The request could have been sent."
            );
            self.transport_error(e)
        })?;

        let status = response.status();
        tracing::info!(code = status.as_u16(), "Search finished.");

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(error = %e, "An error happened while reading the response body.");
            self.transport_error(e)
        })?;

        serde_json::from_slice::<SearchResult>(&body).map_err(|e| {
            tracing::error!(error = %e, "An error happened while decoding the response body.");
            SearchError::Decode(e.to_string())
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> SearchError {
        if e.is_timeout() {
            let upstream = self.url.host_str().unwrap_or(self.url.as_str());
            SearchError::UpstreamTimeout(upstream.to_string())
        } else if e.is_builder() {
            SearchError::RequestConstruction(e.to_string())
        } else {
            SearchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl SearchBackend for UpstreamSearchClient {
    async fn search(&self, query: &SearchQuery) -> FanOutOutcome {
        let start = Instant::now();
        let outcome = self.fetch(query).await;

        histogram!(UPSTREAM_REQUEST_DURATION).record(start.elapsed().as_secs_f64());
        if let Err(e) = &outcome {
            counter!(UPSTREAM_REQUEST_FAILURES, "kind" => e.kind()).increment(1);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{SEARCH_FIXTURE, start_mock_upstream, term_of, unused_port};
    use hyper::StatusCode;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn test_client(url: Url, http_timeout_secs: Option<u64>) -> UpstreamSearchClient {
        UpstreamSearchClient::new(&UpstreamConfig {
            url,
            http_timeout_secs,
        })
        .unwrap()
    }

    fn query(value: &str) -> SearchQuery {
        SearchQuery::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_search_decodes_fixture() {
        let url =
            start_mock_upstream(|_req| async { (StatusCode::OK, SEARCH_FIXTURE.to_string()) }).await;
        let client = test_client(url, None);

        let result = client.search(&query("jack johnson")).await.unwrap();

        assert_eq!(result.result_count, 2);
        assert_eq!(result.results.len(), 2);

        let first = &result.results[0];
        assert_eq!(first.wrapper_type, "track");
        assert_eq!(first.artist_id, 909253);
        assert_eq!(first.collection_id, 1440857781);
        assert_eq!(first.track_id, 1440857786);
        assert_eq!(first.track_name, "Better Together");
        assert_eq!(first.collection_price, 9.99);
        assert_eq!(first.track_price, 1.29);
        assert_eq!(first.release_date, "2005-03-01T08:00:00Z");
        assert_eq!(first.track_count, 16);
        assert_eq!(first.track_time_millis, 207679);
        assert_eq!(first.currency, "USD");
        assert_eq!(first.primary_genre_name, "Rock");
        assert!(first.is_streamable);

        // Omitted keys take their zero values
        let second = &result.results[1];
        assert_eq!(second.track_name, "Banana Pancakes");
        assert_eq!(second.artist_name, "Jack Johnson");
        assert_eq!(second.artist_id, 0);
        assert_eq!(second.track_price, 0.0);
        assert_eq!(second.release_date, "");
        assert_eq!(second.collection_artist_name, "");
        assert_eq!(second.disc_number, 0);
        assert!(!second.is_streamable);
    }

    #[tokio::test]
    async fn test_search_encodes_term() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let url = start_mock_upstream(move |req| {
            seen_clone
                .lock()
                .unwrap()
                .push((req.uri().path().to_string(), term_of(&req)));
            async { (StatusCode::OK, r#"{"resultCount": 0, "results": []}"#.to_string()) }
        })
        .await;
        let client = test_client(url, None);

        client.search(&query("AC/DC & friends?")).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![("/search".to_string(), Some("AC/DC & friends?".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_search_keeps_configured_query_params() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let url = start_mock_upstream(move |req| {
            *seen_clone.lock().unwrap() = req.uri().query().map(str::to_string);
            async { (StatusCode::OK, "{}".to_string()) }
        })
        .await;
        let mut url = url;
        url.set_query(Some("media=music"));
        let client = test_client(url, None);

        let result = client.search(&query("beck")).await.unwrap();
        assert_eq!(result, SearchResult::default());
        assert_eq!(
            seen.lock().unwrap().as_deref(),
            Some("media=music&term=beck")
        );
    }

    #[tokio::test]
    async fn test_non_success_status_with_json_is_success() {
        let url = start_mock_upstream(|_req| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"resultCount": 0, "results": []}"#.to_string(),
            )
        })
        .await;
        let client = test_client(url, None);

        let result = client.search(&query("jack johnson")).await;
        assert_eq!(result, Ok(SearchResult::default()));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let url = start_mock_upstream(|_req| async {
            (StatusCode::OK, "<html>oops</html>".to_string())
        })
        .await;
        let client = test_client(url, None);

        let result = client.search(&query("jack johnson")).await;
        assert!(matches!(result, Err(SearchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_decode_error() {
        let url = start_mock_upstream(|_req| async {
            (StatusCode::OK, r#"{"resultCount": "two", "results": []}"#.to_string())
        })
        .await;
        let client = test_client(url, None);

        let result = client.search(&query("jack johnson")).await;
        assert!(matches!(result, Err(SearchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let url = Url::parse(&format!("http://127.0.0.1:{}/search", unused_port())).unwrap();
        let client = test_client(url, None);

        let result = client.search(&query("jack johnson")).await;
        assert!(matches!(result, Err(SearchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_http_timeout() {
        let url = start_mock_upstream(|_req| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            (StatusCode::OK, "{}".to_string())
        })
        .await;
        let client = test_client(url, Some(1));

        let result = client.search(&query("jack johnson")).await;
        assert_eq!(
            result,
            Err(SearchError::UpstreamTimeout("127.0.0.1".into()))
        );
    }
}
