//! Request input extraction.

use apikit_core::RequestInput;
use axum::body::Bytes;
use axum::extract::{FromRequest, Query, Request};
use http::StatusCode;

use crate::controller::ApiReply;

/// Extracts a [`RequestInput`] from the method, the query string, and an
/// optional JSON object body. Body keys override query keys.
///
/// Consumes the body, so it must be the last extractor of a handler.
#[derive(Debug, Clone)]
pub struct Input(pub RequestInput);

impl<S> FromRequest<S> for Input
where
    S: Send + Sync,
{
    type Rejection = ApiReply;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let Query(query) = Query::<Vec<(String, String)>>::try_from_uri(req.uri())
            .map_err(|err| bad_request(&format!("Malformed query string: {err}")))?;
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| bad_request(&err.body_text()))?;

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            let value = serde_json::from_slice::<serde_json::Value>(&bytes)
                .map_err(|err| bad_request(&format!("Malformed JSON body: {err}")))?;
            Some(value)
        };
        Ok(Self(RequestInput::from_parts(method, query, body)))
    }
}

fn bad_request(message: &str) -> ApiReply {
    tracing::debug!(message, "rejecting request input");
    ApiReply::failed(message, StatusCode::BAD_REQUEST.as_u16(), None)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::Method;

    use super::*;

    async fn extract(request: Request) -> Result<RequestInput, ApiReply> {
        Input::from_request(request, &()).await.map(|Input(input)| input)
    }

    #[tokio::test]
    async fn merges_query_and_json_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/records?name=query&page=2")
            .body(Body::from(r#"{"name":"body","tags":["a"]}"#))
            .unwrap();
        let input = extract(request).await.unwrap();
        assert!(input.is_method(&Method::POST));
        assert_eq!(input.string("name"), "body");
        assert_eq!(input.integer("page", 1), 2);
        assert!(input.has("tags"));
    }

    #[tokio::test]
    async fn empty_body_is_accepted() {
        let request = Request::builder()
            .uri("/records?status=1")
            .body(Body::empty())
            .unwrap();
        let input = extract(request).await.unwrap();
        assert_eq!(input.string("status"), "1");
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/records")
            .body(Body::from("{not json"))
            .unwrap();
        let reply = extract(request).await.unwrap_err();
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }
}
