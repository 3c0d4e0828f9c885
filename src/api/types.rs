use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::circulation::{OfferOutcome, ReturnOutcome};
use crate::domain::{Book, FinePayment, LoanStatus, LoanTransaction, Money, Reservation};

// ============================================================================
// Requests
// ============================================================================

/// POST /loans
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub member_id: Uuid,
    pub copy_id: Uuid,
    pub staff_id: Uuid,
}

/// 職員の操作（返却・紛失・破損・除籍）
#[derive(Debug, Deserialize)]
pub struct StaffActionRequest {
    pub staff_id: Uuid,
}

/// POST /loans/:id/payments
///
/// 金額は文字列の10進数（例: "2.50"）。
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub staff_id: Uuid,
}

/// POST /reservations
#[derive(Debug, Deserialize)]
pub struct ReservationRequest {
    pub member_id: Uuid,
    pub book_id: Uuid,
    pub expiry_date: DateTime<Utc>,
    pub priority_number: Option<u32>,
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListLoansQuery {
    /// 会員IDでフィルタリング（必須）
    pub member_id: Option<Uuid>,
    /// ステータスでフィルタリング
    pub status: Option<String>,
}

/// ステータスクエリパラメータのパースとバリデーション
pub fn parse_status_filter(status: &str) -> Result<LoanStatus, String> {
    status.parse::<LoanStatus>()
}

// ============================================================================
// Responses
// ============================================================================

/// 貸出レスポンス
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub member_id: Uuid,
    pub copy_id: Uuid,
    pub book_id: Uuid,
    pub issued_by: Uuid,
    pub received_by: Option<Uuid>,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub renewal_count: u32,
    pub fine_amount: Money,
    pub carried_fine: Money,
    pub fine_paid: Money,
    pub outstanding_fine: Money,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LoanTransaction> for LoanResponse {
    fn from(loan: LoanTransaction) -> Self {
        Self {
            loan_id: loan.loan_id.value(),
            member_id: loan.member_id.value(),
            copy_id: loan.copy_id.value(),
            book_id: loan.book_id.value(),
            issued_by: loan.issued_by.value(),
            received_by: loan.received_by.map(|s| s.value()),
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            renewal_count: loan.renewal_count.value(),
            fine_amount: loan.fine_amount,
            carried_fine: loan.carried_fine,
            fine_paid: loan.fine_paid,
            outstanding_fine: loan.outstanding_fine(),
            status: loan.status.as_str().to_string(),
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

/// 予約レスポンス
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub reservation_id: Uuid,
    pub member_id: Uuid,
    pub book_id: Uuid,
    pub reserved_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub priority_number: u32,
    pub status: String,
    pub fulfilled_loan_id: Option<Uuid>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            reservation_id: reservation.reservation_id.value(),
            member_id: reservation.member_id.value(),
            book_id: reservation.book_id.value(),
            reserved_at: reservation.reserved_at,
            expiry_date: reservation.expiry_date,
            priority_number: reservation.priority_number,
            status: reservation.status.as_str().to_string(),
            fulfilled_loan_id: reservation.fulfilled_loan_id.map(|id| id.value()),
        }
    }
}

/// 予約待ち行列への提示結果
#[derive(Debug, Serialize)]
pub struct OfferResponse {
    pub fulfilled_reservation: Option<ReservationResponse>,
    pub new_loan: Option<LoanResponse>,
    pub skipped_reservations: Vec<Uuid>,
    pub expired_reservations: Vec<Uuid>,
}

impl From<OfferOutcome> for OfferResponse {
    fn from(outcome: OfferOutcome) -> Self {
        let (fulfilled_reservation, new_loan) = match outcome.fulfilled {
            Some((reservation, loan)) => (Some(reservation.into()), Some(loan.into())),
            None => (None, None),
        };
        Self {
            fulfilled_reservation,
            new_loan,
            skipped_reservations: outcome.skipped.iter().map(|id| id.value()).collect(),
            expired_reservations: outcome.expired.iter().map(|id| id.value()).collect(),
        }
    }
}

/// POST /loans/:id/return
#[derive(Debug, Serialize)]
pub struct ReturnResponse {
    pub loan: LoanResponse,
    pub offer: OfferResponse,
}

impl From<ReturnOutcome> for ReturnResponse {
    fn from(outcome: ReturnOutcome) -> Self {
        Self {
            loan: outcome.loan.into(),
            offer: outcome.offer.into(),
        }
    }
}

/// 支払いレスポンス
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_id: Uuid,
    pub loan_id: Uuid,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub received_by: Uuid,
}

impl From<FinePayment> for PaymentResponse {
    fn from(payment: FinePayment) -> Self {
        Self {
            payment_id: payment.payment_id.value(),
            loan_id: payment.loan_id.value(),
            amount: payment.amount,
            paid_at: payment.paid_at,
            received_by: payment.received_by.value(),
        }
    }
}

/// POST /loans/:id/payments
#[derive(Debug, Serialize)]
pub struct PaymentRecordedResponse {
    pub payment: PaymentResponse,
    pub loan: LoanResponse,
}

/// 書籍レスポンス
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub book_id: Uuid,
    pub title: String,
    pub is_retired: bool,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            book_id: book.book_id.value(),
            title: book.title,
            is_retired: book.is_retired,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
