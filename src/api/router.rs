use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, cancel_reservation, create_loan, create_reservation, get_loan_by_id,
    list_loan_events, list_loans, list_payments, record_payment, renew_loan, report_damaged,
    report_lost, retire_book, return_loan, run_overdue_sweep, run_reservation_expiry,
};

/// Creates the API router with all circulation endpoints
///
/// Loans:
/// - POST /loans, GET /loans?member_id=&status=, GET /loans/:id
/// - POST /loans/:id/renew | return | lost | damaged
/// - POST /loans/:id/payments, GET /loans/:id/payments
/// - GET /loans/:id/events
///
/// Reservations and catalog:
/// - POST /reservations, POST /reservations/:id/cancel
/// - POST /books/:id/retire
///
/// Batch:
/// - POST /sweeps/overdue, POST /sweeps/reservations
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Loans
        .route("/loans", post(create_loan).get(list_loans))
        .route("/loans/:id", get(get_loan_by_id))
        .route("/loans/:id/renew", post(renew_loan))
        .route("/loans/:id/return", post(return_loan))
        .route("/loans/:id/lost", post(report_lost))
        .route("/loans/:id/damaged", post(report_damaged))
        .route("/loans/:id/payments", post(record_payment).get(list_payments))
        .route("/loans/:id/events", get(list_loan_events))
        // Reservations
        .route("/reservations", post(create_reservation))
        .route("/reservations/:id/cancel", post(cancel_reservation))
        // Catalog
        .route("/books/:id/retire", post(retire_book))
        // Batch sweeps
        .route("/sweeps/overdue", post(run_overdue_sweep))
        .route("/sweeps/reservations", post(run_reservation_expiry))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
