//! Tower layers wrapped around every API route.

use std::time::Duration;

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// Header carrying the per-request id, set on the way in and echoed back.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Verbs the resource and form routes answer to.
const API_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

type RequestTrace = TraceLayer<SharedClassifier<ServerErrorsAsFailures>>;

/// Layer stack returned by [`api_layers`], innermost last.
pub type ApiLayers = Stack<
    PropagateRequestIdLayer,
    Stack<TimeoutLayer, Stack<CorsLayer, Stack<RequestTrace, Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>>>>,
>;

/// Request id, tracing span, CORS, then the request deadline.
///
/// Requests are tagged before the trace span opens so the span and the
/// reply carry the same id. A request still running at `request_timeout`
/// is answered with 408.
#[must_use]
pub fn api_layers(config: &NetworkConfig) -> ApiLayers {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&config.cors_origins))
        .layer(deadline(config.request_timeout))
        .layer(PropagateRequestIdLayer::new(request_id))
        .into_inner()
}

fn deadline(limit: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limit)
}

/// CORS for the configured origins. Browsers may read the request id.
fn cors(origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins(origins))
        .allow_methods(API_METHODS)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|origin| origin == "*") {
        return AllowOrigin::any();
    }
    let accepted: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(accepted)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    fn app(config: &NetworkConfig) -> Router {
        Router::new()
            .route("/records", get(|| async { "[]" }))
            .layer(api_layers(config))
    }

    #[tokio::test]
    async fn replies_carry_request_id_and_allowed_origin() {
        let config = NetworkConfig {
            cors_origins: vec!["http://admin.local".to_string(), "not a\norigin".to_string()],
            ..NetworkConfig::default()
        };
        let request = Request::builder()
            .uri("/records")
            .header("origin", "http://admin.local")
            .body(Body::empty())
            .unwrap();
        let response = app(&config).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://admin.local"
        );
    }

    #[tokio::test]
    async fn caller_supplied_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/records")
            .header(REQUEST_ID_HEADER, "batch-42")
            .body(Body::empty())
            .unwrap();
        let response = app(&NetworkConfig::default()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "batch-42");
    }

    #[tokio::test]
    async fn slow_requests_time_out_with_408() {
        let config = NetworkConfig {
            request_timeout: Duration::from_millis(20),
            ..NetworkConfig::default()
        };
        let router = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(api_layers(&config));
        let request = Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
