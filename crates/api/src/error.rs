//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commerce::CommerceError;
use serde::Serialize;
use uuid::Uuid;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed principal headers.
    Unauthorized(String),
    /// The principal lacks the role the route requires.
    AdminOnly,
    /// Bad request from the client.
    BadRequest(String),
    /// Error raised by a commerce service.
    Commerce(CommerceError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_id: Option<String>,
}

impl ApiError {
    /// HTTP status and stable code for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::AdminOnly => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Commerce(err) => (commerce_status(err), err.code()),
        }
    }
}

fn commerce_status(err: &CommerceError) -> StatusCode {
    match err {
        CommerceError::EmptyCart => StatusCode::BAD_REQUEST,
        CommerceError::Validation(_) | CommerceError::ProductUnavailable(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CommerceError::InsufficientStock { .. }
        | CommerceError::InvalidOrderStatus(_)
        | CommerceError::AlreadyExists(_) => StatusCode::CONFLICT,
        CommerceError::NotFound { .. } => StatusCode::NOT_FOUND,
        CommerceError::Forbidden(_) => StatusCode::FORBIDDEN,
        CommerceError::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
        CommerceError::Internal(_) | CommerceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();

        let body = if status.is_server_error() {
            let error_id = Uuid::new_v4().to_string();
            let detail = match &self {
                ApiError::Commerce(err) => err.to_string(),
                other => format!("{other:?}"),
            };
            tracing::error!(error_id = %error_id, error = %detail, "internal server error");
            ErrorBody {
                code,
                message: "An unexpected error occurred".to_string(),
                error_id: Some(error_id),
            }
        } else {
            let message = match self {
                ApiError::Unauthorized(msg) | ApiError::BadRequest(msg) => msg,
                ApiError::AdminOnly => "Administrator role required".to_string(),
                ApiError::Commerce(err) => err.to_string(),
            };
            ErrorBody {
                code,
                message,
                error_id: None,
            }
        };

        let body = serde_json::json!({ "error": body });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        ApiError::Commerce(err)
    }
}

#[cfg(test)]
mod tests {
    use common::OrderId;

    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CommerceError::EmptyCart, StatusCode::BAD_REQUEST),
            (
                CommerceError::Validation("quantity".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CommerceError::InsufficientStock {
                    product_name: "Mug".into(),
                    available: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                CommerceError::not_found("Order", "x"),
                StatusCode::NOT_FOUND,
            ),
            (
                CommerceError::Forbidden("not yours".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                CommerceError::PaymentDeclined {
                    order_id: OrderId::new(),
                    order_number: "202412250001".into(),
                    reason: "card declined".into(),
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                CommerceError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status().0, expected);
        }
    }

    #[tokio::test]
    async fn test_client_error_body() {
        let (status, json) = body_json(ApiError::from(CommerceError::InsufficientStock {
            product_name: "Mug".into(),
            available: 2,
        }))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "INSUFFICIENT_STOCK");
        assert_eq!(
            json["error"]["message"],
            "Insufficient stock for Mug: only 2 available"
        );
        assert!(json["error"].get("errorId").is_none());
    }

    #[tokio::test]
    async fn test_server_error_hides_detail() {
        let (status, json) =
            body_json(ApiError::from(CommerceError::Internal("pool exhausted".into()))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(json["error"]["message"], "An unexpected error occurred");
        let error_id = json["error"]["errorId"].as_str().unwrap();
        assert!(Uuid::parse_str(error_id).is_ok());
    }

    #[tokio::test]
    async fn test_unauthorized_body() {
        let (status, json) = body_json(ApiError::Unauthorized("missing x-user-id".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "UNAUTHORIZED");
    }
}
