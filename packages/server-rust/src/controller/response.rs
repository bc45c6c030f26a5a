//! Uniform JSON replies.

use apikit_core::Record;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::{json, Map, Value as JsonValue};

use crate::search::Page;

/// Status + JSON body of one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: JsonValue,
}

impl ApiReply {
    /// 200 with `body`.
    #[must_use]
    pub fn success(body: JsonValue) -> Self {
        Self::with_status(body, StatusCode::OK)
    }

    /// 200 with an empty object.
    #[must_use]
    pub fn ok() -> Self {
        Self::success(JsonValue::Object(Map::new()))
    }

    #[must_use]
    pub fn created(body: JsonValue) -> Self {
        Self::with_status(body, StatusCode::CREATED)
    }

    #[must_use]
    pub fn with_status(body: JsonValue, status: StatusCode) -> Self {
        Self { status, body }
    }

    /// `{code, message}` failure.
    ///
    /// Without `http_status`, `code` doubles as the HTTP status; codes that
    /// are not valid HTTP statuses fall back to 400.
    #[must_use]
    pub fn failed(message: impl Into<String>, code: u16, http_status: Option<StatusCode>) -> Self {
        let status = http_status.unwrap_or_else(|| {
            (100..600)
                .contains(&code)
                .then(|| StatusCode::from_u16(code).ok())
                .flatten()
                .unwrap_or(StatusCode::BAD_REQUEST)
        });
        Self::with_status(json!({ "code": code, "message": message.into() }), status)
    }

    /// `{data, meta}` page reply. `extra_meta` keys are merged over the
    /// default `total`, `current_page`, and `last_page`.
    #[must_use]
    pub fn paginate(
        page: Page,
        present: impl Fn(Record) -> JsonValue,
        extra_meta: Option<Map<String, JsonValue>>,
    ) -> Self {
        let mut meta = Map::new();
        meta.insert("total".into(), page.total.into());
        meta.insert("current_page".into(), page.current_page.into());
        meta.insert("last_page".into(), page.last_page.into());
        meta.extend(extra_meta.unwrap_or_default());

        let data: Vec<JsonValue> = page.records.into_iter().map(present).collect();
        Self::success(json!({ "data": data, "meta": meta }))
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
