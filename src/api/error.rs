use crate::application::circulation::CirculationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    Circulation(CirculationError),
    /// クエリパラメータ等の形式不正
    BadRequest(String),
}

impl From<CirculationError> for ApiError {
    fn from(err: CirculationError) -> Self {
        ApiError::Circulation(err)
    }
}

fn status_and_code(err: &CirculationError) -> (StatusCode, &'static str) {
    use CirculationError::*;

    match err {
        // 404 Not Found - リクエストされたリソースが存在しない
        MemberNotFound => (StatusCode::NOT_FOUND, "MEMBER_NOT_FOUND"),
        MemberTypeNotFound => (StatusCode::NOT_FOUND, "MEMBER_TYPE_NOT_FOUND"),
        StaffNotFound => (StatusCode::NOT_FOUND, "STAFF_NOT_FOUND"),
        BookNotFound => (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND"),
        CopyNotFound => (StatusCode::NOT_FOUND, "COPY_NOT_FOUND"),
        LoanNotFound => (StatusCode::NOT_FOUND, "LOAN_NOT_FOUND"),
        ReservationNotFound => (StatusCode::NOT_FOUND, "RESERVATION_NOT_FOUND"),

        // 409 Conflict - 現在の状態と衝突する
        CopyUnavailable => (StatusCode::CONFLICT, "COPY_UNAVAILABLE"),
        NotRenewable(_) => (StatusCode::CONFLICT, "NOT_RENEWABLE"),
        InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
        DuplicateReservation => (StatusCode::CONFLICT, "DUPLICATE_RESERVATION"),

        // 422 Unprocessable Entity - ビジネスルール違反
        PolicyViolation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "POLICY_VIOLATION"),
        OverPayment { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "OVER_PAYMENT"),
        InvalidRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_REQUEST"),

        // 500 Internal Server Error - システム障害
        CatalogStoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CATALOG_STORE_ERROR"),
        MembershipStoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MEMBERSHIP_STORE_ERROR"),
        LoanRepositoryError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "LOAN_REPOSITORY_ERROR"),
        ReservationRepositoryError(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "RESERVATION_REPOSITORY_ERROR",
        ),
        PaymentRepositoryError(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PAYMENT_REPOSITORY_ERROR",
        ),
        EventStoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EVENT_STORE_ERROR"),
        CommitError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMIT_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("BAD_REQUEST", message),
            ),
            ApiError::Circulation(err) => {
                let (status, code) = status_and_code(&err);
                if status.is_server_error() {
                    // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
                    let source = std::error::Error::source(&err)
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    tracing::error!(error = %err, source = %source, "store failure");
                    (
                        status,
                        ErrorResponse::new(code, "An unexpected error occurred"),
                    )
                } else {
                    (status, ErrorResponse::new(code, err.to_string()))
                }
            }
        };

        (status, Json(body)).into_response()
    }
}
