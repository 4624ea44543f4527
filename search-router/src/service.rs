use crate::errors::SearchRouterError;
use crate::fanout::FanOutAggregator;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::protocol::{ParsedQuery, SearchQuery};
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode, Uri};
use shared::http::make_boxed_error_response;
use shared::{gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Instant;

pub type ResponseBody = BoxBody<Bytes, SearchRouterError>;

/// Main listener service.
///
/// - `GET /search?query=a&query=b` fans the queries out and answers with a JSON
///   array in query order. Always `200`; failed or empty queries show up as
///   `{"error": ...}` elements.
/// - `GET /` answers with a plain greeting.
#[derive(Clone)]
pub struct SearchRouterService {
    aggregator: Arc<FanOutAggregator>,
}

impl SearchRouterService {
    pub fn new(aggregator: FanOutAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }

    pub async fn handle<B>(
        &self,
        req: Request<B>,
    ) -> Result<Response<ResponseBody>, SearchRouterError> {
        let start = Instant::now();
        let inflight = InflightGuard::new();

        let result = self.route(req.method(), req.uri()).await;

        drop(inflight);
        let status = match &result {
            Ok(response) => response.status().as_u16().to_string(),
            Err(_) => "error".to_string(),
        };
        histogram!(REQUEST_DURATION, "status" => status).record(start.elapsed().as_secs_f64());

        result
    }

    async fn route(
        &self,
        method: &Method,
        uri: &Uri,
    ) -> Result<Response<ResponseBody>, SearchRouterError> {
        match (method, uri.path()) {
            (&Method::GET, "/search") => self.search(uri).await,
            (_, "/search") => Ok(make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED)),
            (&Method::GET, "/") => Ok(Response::new(full_body(Bytes::from_static(
                b"Hello, World!\n",
            )))),
            _ => {
                tracing::debug!(method = %method, path = %uri.path(), "No route matched");
                Ok(make_boxed_error_response(StatusCode::NOT_FOUND))
            }
        }
    }

    async fn search(&self, uri: &Uri) -> Result<Response<ResponseBody>, SearchRouterError> {
        let queries = parse_queries(uri);
        let response = self.aggregator.dispatch(queries).await;
        if response.failure_count() > 0 {
            tracing::warn!(
                queries = response.len(),
                failures = response.failure_count(),
                "Search request completed with failures"
            );
        }

        json_response(StatusCode::OK, response.to_bytes()?)
    }
}

impl Service<Request<Incoming>> for SearchRouterService {
    type Response = Response<ResponseBody>;
    type Error = SearchRouterError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        // Only the request line matters; the body is never read.
        let (parts, _body) = req.into_parts();
        let req = Request::from_parts(parts, ());

        Box::pin(async move { service.handle(req).await })
    }
}

/// Collects every `query` parameter of the request URI, in order.
///
/// Values are form-decoded, so both `%20` and `+` become spaces. An empty
/// value is kept as an `InvalidQuery` error so it still occupies its position.
pub fn parse_queries(uri: &Uri) -> Vec<ParsedQuery> {
    let query_string = uri.query().unwrap_or_default();

    url::form_urlencoded::parse(query_string.as_bytes())
        .filter(|(key, _)| key == "query")
        .map(|(_, value)| SearchQuery::new(value.into_owned()))
        .collect()
}

/// Counts a request in `REQUESTS_INFLIGHT` until dropped.
///
/// hyper drops the request future when the client goes away, so the
/// decrement has to live in `Drop`.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

fn full_body(bytes: Bytes) -> ResponseBody {
    Full::new(bytes).map_err(|e| match e {}).boxed()
}

fn json_response(
    status: StatusCode,
    body: Bytes,
) -> Result<Response<ResponseBody>, SearchRouterError> {
    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(body))?)
}
