use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, CopyId, LoanId, MemberId, Money, ReservationId, StaffId};

/// コマンド：複本を貸し出す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub member_id: MemberId,
    pub copy_id: CopyId,
    pub staff_id: StaffId,
    pub checked_out_at: DateTime<Utc>,
}

/// コマンド：貸出を延長する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renew {
    pub loan_id: LoanId,
    pub renewed_at: DateTime<Utc>,
}

/// コマンド：複本を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnCopy {
    pub loan_id: LoanId,
    pub staff_id: StaffId,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：紛失・破損を報告する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLoss {
    pub loan_id: LoanId,
    pub staff_id: StaffId,
    pub reported_at: DateTime<Utc>,
}

/// コマンド：予約を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceReservation {
    pub member_id: MemberId,
    pub book_id: BookId,
    pub expiry_date: DateTime<Utc>,
    pub priority_number: Option<u32>,
    pub reserved_at: DateTime<Utc>,
}

/// コマンド：予約を取り消す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReservation {
    pub reservation_id: ReservationId,
    pub cancelled_at: DateTime<Utc>,
}

/// コマンド：延滞料金の支払いを記録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPayment {
    pub loan_id: LoanId,
    pub amount: Money,
    pub staff_id: StaffId,
    pub paid_at: DateTime<Utc>,
}

/// コマンド：書籍を除籍する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireBook {
    pub book_id: BookId,
    pub staff_id: StaffId,
    pub retired_at: DateTime<Utc>,
}
