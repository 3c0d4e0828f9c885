use crate::application::circulation::{
    self, ExpiryReport, ServiceDependencies, SweepReport,
};
use crate::domain::{
    BookId, CopyId, DomainEvent, LoanId, MemberId, ReservationId, StaffId,
    commands::{
        ApplyPayment, CancelReservation, Checkout, PlaceReservation, Renew, ReportLoss,
        RetireBook, ReturnCopy,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{
        BookResponse, CheckoutRequest, ListLoansQuery, LoanResponse, PaymentRecordedResponse,
        PaymentRequest, PaymentResponse, ReservationRequest, ReservationResponse,
        ReturnResponse, StaffActionRequest, parse_status_filter,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// Loan handlers
// ============================================================================

/// POST /loans - 複本を貸し出す
pub async fn create_loan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let cmd = Checkout {
        member_id: MemberId::from_uuid(req.member_id),
        copy_id: CopyId::from_uuid(req.copy_id),
        staff_id: StaffId::from_uuid(req.staff_id),
        checked_out_at: Utc::now(),
    };

    let loan = circulation::checkout(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(loan.into())))
}

/// GET /loans/:id - 貸出詳細をIDで取得
pub async fn get_loan_by_id(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = circulation::get_loan(&state.service_deps, LoanId::from_uuid(loan_id)).await?;
    Ok(Json(loan.into()))
}

/// GET /loans - 会員の貸出一覧
///
/// クエリパラメータ:
/// - member_id: 会員ID（必須）
/// - status: active, overdue, returned, lost, damaged（オプション）
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let member_id = query
        .member_id
        .ok_or_else(|| ApiError::BadRequest("member_id query parameter is required".into()))?;

    let status = query
        .status
        .as_deref()
        .map(parse_status_filter)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let loans = circulation::loans_for_member(
        &state.service_deps,
        MemberId::from_uuid(member_id),
        status,
    )
    .await?;

    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

/// POST /loans/:id/renew - 貸出を延長
pub async fn renew_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = Renew {
        loan_id: LoanId::from_uuid(loan_id),
        renewed_at: Utc::now(),
    };

    let loan = circulation::renew(&state.service_deps, cmd).await?;
    Ok(Json(loan.into()))
}

/// POST /loans/:id/return - 複本を返却
///
/// 返却された複本が予約者に割り当てられた場合は、その結果も返す。
pub async fn return_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<StaffActionRequest>,
) -> Result<Json<ReturnResponse>, ApiError> {
    let cmd = ReturnCopy {
        loan_id: LoanId::from_uuid(loan_id),
        staff_id: StaffId::from_uuid(req.staff_id),
        returned_at: Utc::now(),
    };

    let outcome = circulation::return_copy(&state.service_deps, cmd).await?;
    Ok(Json(outcome.into()))
}

fn report_loss_command(loan_id: Uuid, req: StaffActionRequest) -> ReportLoss {
    ReportLoss {
        loan_id: LoanId::from_uuid(loan_id),
        staff_id: StaffId::from_uuid(req.staff_id),
        reported_at: Utc::now(),
    }
}

/// POST /loans/:id/lost - 紛失を報告
pub async fn report_lost(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<StaffActionRequest>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan =
        circulation::mark_lost(&state.service_deps, report_loss_command(loan_id, req)).await?;
    Ok(Json(loan.into()))
}

/// POST /loans/:id/damaged - 破損を報告
pub async fn report_damaged(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<StaffActionRequest>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan =
        circulation::mark_damaged(&state.service_deps, report_loss_command(loan_id, req)).await?;
    Ok(Json(loan.into()))
}

// ============================================================================
// Payment handlers
// ============================================================================

/// POST /loans/:id/payments - 延滞料金の支払いを記録
pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentRecordedResponse>), ApiError> {
    let cmd = ApplyPayment {
        loan_id: LoanId::from_uuid(loan_id),
        amount: req.amount,
        staff_id: StaffId::from_uuid(req.staff_id),
        paid_at: Utc::now(),
    };

    let (loan, payment) = circulation::apply_payment(&state.service_deps, cmd).await?;

    let response = PaymentRecordedResponse {
        payment: payment.into(),
        loan: loan.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /loans/:id/payments - 支払い履歴
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments =
        circulation::payments_for_loan(&state.service_deps, LoanId::from_uuid(loan_id)).await?;
    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// GET /loans/:id/events - 監査証跡
pub async fn list_loan_events(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<Vec<DomainEvent>>, ApiError> {
    let events =
        circulation::loan_history(&state.service_deps, LoanId::from_uuid(loan_id)).await?;
    Ok(Json(events))
}

// ============================================================================
// Reservation handlers
// ============================================================================

/// POST /reservations - 予約を登録
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let cmd = PlaceReservation {
        member_id: MemberId::from_uuid(req.member_id),
        book_id: BookId::from_uuid(req.book_id),
        expiry_date: req.expiry_date,
        priority_number: req.priority_number,
        reserved_at: Utc::now(),
    };

    let reservation = circulation::place_reservation(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// POST /reservations/:id/cancel - 予約を取り消す
pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let cmd = CancelReservation {
        reservation_id: ReservationId::from_uuid(reservation_id),
        cancelled_at: Utc::now(),
    };

    let reservation = circulation::cancel_reservation(&state.service_deps, cmd).await?;
    Ok(Json(reservation.into()))
}

// ============================================================================
// Catalog handlers
// ============================================================================

/// POST /books/:id/retire - 書籍を除籍
pub async fn retire_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<StaffActionRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    let cmd = RetireBook {
        book_id: BookId::from_uuid(book_id),
        staff_id: StaffId::from_uuid(req.staff_id),
        retired_at: Utc::now(),
    };

    let book = circulation::retire_book(&state.service_deps, cmd).await?;
    Ok(Json(book.into()))
}

// ============================================================================
// Batch handlers
// ============================================================================

/// POST /sweeps/overdue - 延滞判定バッチを即時実行
pub async fn run_overdue_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepReport>, ApiError> {
    let report = circulation::sweep_overdue(&state.service_deps, Utc::now()).await?;
    Ok(Json(report))
}

/// POST /sweeps/reservations - 予約失効バッチを即時実行
pub async fn run_reservation_expiry(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExpiryReport>, ApiError> {
    let report = circulation::expire_reservations(&state.service_deps, Utc::now()).await?;
    Ok(Json(report))
}
