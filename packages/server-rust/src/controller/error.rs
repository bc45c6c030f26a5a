use http::StatusCode;
use serde_json::json;

use super::ApiReply;
use crate::form::FormError;
use crate::search::SearchError;
use crate::sysconfig::ConfigStoreError;

/// Any failure a controller can surface to the transport.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Config(#[from] ConfigStoreError),

    #[error("route not found")]
    RouteNotFound,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Form(err) => err.status(),
            ApiError::Search(err) => err.status(),
            ApiError::Config(ConfigStoreError::Unencodable { .. }) => StatusCode::BAD_REQUEST,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Config(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Reply body for this error. Validation failures carry the field-keyed
    /// report; server errors hide their cause.
    #[must_use]
    pub fn to_reply(&self) -> ApiReply {
        let status = self.status();
        if let ApiError::Form(FormError::Validation(errors)) = self {
            let message = errors.first_message().unwrap_or("The given data was invalid.");
            return ApiReply::with_status(
                json!({ "message": message, "errors": errors }),
                status,
            );
        }
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            return ApiReply::failed("Server Error", status.as_u16(), None);
        }
        ApiReply::failed(self.to_string(), status.as_u16(), None)
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        self.to_reply().into_response()
    }
}

#[cfg(test)]
mod tests {
    use apikit_core::{RecordKey, ValidationErrors};

    use super::*;

    #[test]
    fn validation_errors_render_field_report() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "The email field is required.");
        let reply = ApiError::from(FormError::from(errors)).to_reply();
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(reply.body["message"], "The email field is required.");
        assert_eq!(reply.body["errors"]["email"][0], "The email field is required.");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let reply = ApiError::from(FormError::NotFound { key: RecordKey::Int(3) }).to_reply();
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body["code"], 404);
        assert_eq!(reply.body["message"], "record `3` not found");

        let reply = ApiError::from(FormError::BatchTooLarge { count: 101, max: 100 }).to_reply();
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_errors_hide_details() {
        let reply = ApiError::from(anyhow::anyhow!("connection refused")).to_reply();
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body["message"], "Server Error");
    }
}
