use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    BookId, CopyId, LoanId, LoanStatus, MemberId, Money, PaymentId, ReservationId, StaffId,
};

/// イベント：貸出が開始された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanOpened {
    pub loan_id: LoanId,
    pub copy_id: CopyId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub issued_by: StaffId,
}

/// イベント：貸出が延長された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRenewed {
    pub loan_id: LoanId,
    pub old_due_date: DateTime<Utc>,
    pub new_due_date: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
    pub renewal_count: u32,
}

/// イベント：複本が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReturned {
    pub loan_id: LoanId,
    pub copy_id: CopyId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub returned_at: DateTime<Utc>,
    pub received_by: StaffId,
    pub was_overdue: bool,
    pub fine_amount: Money,
}

/// イベント：貸出が延滞した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBecameOverdue {
    pub loan_id: LoanId,
    pub copy_id: CopyId,
    pub member_id: MemberId,
    pub due_date: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub fine_amount: Money,
}

/// イベント：延滞中の貸出の延滞料金が再計算された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineAccrued {
    pub loan_id: LoanId,
    pub fine_amount: Money,
    pub assessed_at: DateTime<Utc>,
}

/// イベント：貸出が紛失または破損で終了した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanWrittenOff {
    pub loan_id: LoanId,
    pub copy_id: CopyId,
    pub member_id: MemberId,
    pub status: LoanStatus,
    pub reported_by: StaffId,
    pub reported_at: DateTime<Utc>,
}

/// イベント：延滞料金が支払われた
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinePaid {
    pub loan_id: LoanId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub fine_paid: Money,
    pub paid_at: DateTime<Utc>,
    pub received_by: StaffId,
}

/// イベント：予約が登録された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPlaced {
    pub reservation_id: ReservationId,
    pub member_id: MemberId,
    pub book_id: BookId,
    pub priority_number: u32,
    pub reserved_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

/// イベント：予約に複本が割り当てられた
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationFulfilled {
    pub reservation_id: ReservationId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub loan_id: LoanId,
    pub fulfilled_at: DateTime<Utc>,
}

/// イベント：予約が取り消された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCancelled {
    pub reservation_id: ReservationId,
    pub book_id: BookId,
    pub cancelled_at: DateTime<Utc>,
}

/// イベント：予約が期限切れになった
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationExpired {
    pub reservation_id: ReservationId,
    pub book_id: BookId,
    pub expired_at: DateTime<Utc>,
}

/// イベント：書籍が除籍された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRetired {
    pub book_id: BookId,
    pub withdrawn_copies: Vec<CopyId>,
    pub retired_by: StaffId,
    pub retired_at: DateTime<Utc>,
}

/// ドメインイベント統合型
///
/// 監査証跡としてイベントストアに追記される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    LoanOpened(LoanOpened),
    LoanRenewed(LoanRenewed),
    LoanReturned(LoanReturned),
    LoanBecameOverdue(LoanBecameOverdue),
    FineAccrued(FineAccrued),
    LoanWrittenOff(LoanWrittenOff),
    FinePaid(FinePaid),
    ReservationPlaced(ReservationPlaced),
    ReservationFulfilled(ReservationFulfilled),
    ReservationCancelled(ReservationCancelled),
    ReservationExpired(ReservationExpired),
    BookRetired(BookRetired),
}

impl DomainEvent {
    /// イベント種別の識別子
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::LoanOpened(_) => "LoanOpened",
            DomainEvent::LoanRenewed(_) => "LoanRenewed",
            DomainEvent::LoanReturned(_) => "LoanReturned",
            DomainEvent::LoanBecameOverdue(_) => "LoanBecameOverdue",
            DomainEvent::FineAccrued(_) => "FineAccrued",
            DomainEvent::LoanWrittenOff(_) => "LoanWrittenOff",
            DomainEvent::FinePaid(_) => "FinePaid",
            DomainEvent::ReservationPlaced(_) => "ReservationPlaced",
            DomainEvent::ReservationFulfilled(_) => "ReservationFulfilled",
            DomainEvent::ReservationCancelled(_) => "ReservationCancelled",
            DomainEvent::ReservationExpired(_) => "ReservationExpired",
            DomainEvent::BookRetired(_) => "BookRetired",
        }
    }

    /// イベントが属する集約の種別
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            DomainEvent::LoanOpened(_)
            | DomainEvent::LoanRenewed(_)
            | DomainEvent::LoanReturned(_)
            | DomainEvent::LoanBecameOverdue(_)
            | DomainEvent::FineAccrued(_)
            | DomainEvent::LoanWrittenOff(_)
            | DomainEvent::FinePaid(_) => "Loan",
            DomainEvent::ReservationPlaced(_)
            | DomainEvent::ReservationFulfilled(_)
            | DomainEvent::ReservationCancelled(_)
            | DomainEvent::ReservationExpired(_) => "Reservation",
            DomainEvent::BookRetired(_) => "Book",
        }
    }

    /// イベントが属する集約のID
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DomainEvent::LoanOpened(e) => e.loan_id.value(),
            DomainEvent::LoanRenewed(e) => e.loan_id.value(),
            DomainEvent::LoanReturned(e) => e.loan_id.value(),
            DomainEvent::LoanBecameOverdue(e) => e.loan_id.value(),
            DomainEvent::FineAccrued(e) => e.loan_id.value(),
            DomainEvent::LoanWrittenOff(e) => e.loan_id.value(),
            DomainEvent::FinePaid(e) => e.loan_id.value(),
            DomainEvent::ReservationPlaced(e) => e.reservation_id.value(),
            DomainEvent::ReservationFulfilled(e) => e.reservation_id.value(),
            DomainEvent::ReservationCancelled(e) => e.reservation_id.value(),
            DomainEvent::ReservationExpired(e) => e.reservation_id.value(),
            DomainEvent::BookRetired(e) => e.book_id.value(),
        }
    }

    /// イベントの発生時刻
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::LoanOpened(e) => e.loan_date,
            DomainEvent::LoanRenewed(e) => e.renewed_at,
            DomainEvent::LoanReturned(e) => e.returned_at,
            DomainEvent::LoanBecameOverdue(e) => e.detected_at,
            DomainEvent::FineAccrued(e) => e.assessed_at,
            DomainEvent::LoanWrittenOff(e) => e.reported_at,
            DomainEvent::FinePaid(e) => e.paid_at,
            DomainEvent::ReservationPlaced(e) => e.reserved_at,
            DomainEvent::ReservationFulfilled(e) => e.fulfilled_at,
            DomainEvent::ReservationCancelled(e) => e.cancelled_at,
            DomainEvent::ReservationExpired(e) => e.expired_at,
            DomainEvent::BookRetired(e) => e.retired_at,
        }
    }
}
