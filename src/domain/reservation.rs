use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{
    BookId, LoanId, MemberId, ReservationCancelled, ReservationError, ReservationExpired,
    ReservationFulfilled, ReservationId, ReservationPlaced,
};

/// 予約ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// 割り当て待ち
    Active,
    /// 複本が割り当てられ貸出に変わった
    Fulfilled,
    /// 会員または職員が取り消した
    Cancelled,
    /// 有効期限切れ
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReservationStatus::Active),
            "fulfilled" => Ok(ReservationStatus::Fulfilled),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "expired" => Ok(ReservationStatus::Expired),
            _ => Err(format!("Invalid reservation status: {}", s)),
        }
    }
}

/// 予約 - 書籍（タイトル）単位の取り置き要求
///
/// 不変条件：同じ(会員, 書籍)の組にActiveな予約は高々1件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub member_id: MemberId,
    pub book_id: BookId,
    pub reserved_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub priority_number: u32,
    pub status: ReservationStatus,
    pub fulfilled_loan_id: Option<LoanId>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// 有効期限を過ぎているか（期限の瞬間まではまだ有効）
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }
}

/// 予約の並び順：優先番号の昇順、同順位は予約日時の早い順
pub fn queue_order(a: &Reservation, b: &Reservation) -> Ordering {
    a.priority_number
        .cmp(&b.priority_number)
        .then(a.reserved_at.cmp(&b.reserved_at))
        .then(a.reservation_id.cmp(&b.reservation_id))
}

/// 書籍1タイトル分の予約待ち行列
///
/// Activeな予約だけを保持し、常に`queue_order`で整列している。
#[derive(Debug, Clone, Default)]
pub struct ReservationQueue {
    entries: Vec<Reservation>,
}

impl ReservationQueue {
    pub fn new(reservations: impl IntoIterator<Item = Reservation>) -> Self {
        let mut entries: Vec<Reservation> = reservations
            .into_iter()
            .filter(Reservation::is_active)
            .collect();
        entries.sort_by(queue_order);
        Self { entries }
    }

    /// 先頭の予約（期限切れも含む）
    pub fn head(&self) -> Option<&Reservation> {
        self.entries.first()
    }

    /// 割り当て候補を先頭から順に返す
    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.entries.iter()
    }

    /// `now`時点で割り当てを待っている予約があるか
    pub fn has_pending(&self, now: DateTime<Utc>) -> bool {
        self.entries.iter().any(|r| !r.is_expired(now))
    }

    /// 会員のActiveな予約を探す
    pub fn find_for_member(&self, member_id: MemberId) -> Option<&Reservation> {
        self.entries.iter().find(|r| r.member_id == member_id)
    }

    /// 優先番号を省略したときに割り当てる番号（末尾）
    pub fn next_priority(&self) -> u32 {
        self.entries
            .iter()
            .map(|r| r.priority_number)
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 純粋関数：予約を登録する
///
/// ビジネスルール：
/// - 同じ会員・書籍のActiveな予約が既にあれば登録不可
/// - 有効期限は`now`より後
/// - 優先番号の省略時は待ち行列の末尾
pub fn place(
    queue: &ReservationQueue,
    member_id: MemberId,
    book_id: BookId,
    expiry_date: DateTime<Utc>,
    priority_number: Option<u32>,
    now: DateTime<Utc>,
) -> Result<(Reservation, ReservationPlaced), ReservationError> {
    if queue.find_for_member(member_id).is_some() {
        return Err(ReservationError::DuplicateReservation);
    }

    if expiry_date <= now {
        return Err(ReservationError::ExpiryNotInFuture);
    }

    let reservation_id = ReservationId::new();
    let priority_number = priority_number.unwrap_or_else(|| queue.next_priority());

    let reservation = Reservation {
        reservation_id,
        member_id,
        book_id,
        reserved_at: now,
        expiry_date,
        priority_number,
        status: ReservationStatus::Active,
        fulfilled_loan_id: None,
        updated_at: now,
    };

    let event = ReservationPlaced {
        reservation_id,
        member_id,
        book_id,
        priority_number,
        reserved_at: now,
        expiry_date,
    };

    Ok((reservation, event))
}

fn ensure_active(reservation: &Reservation) -> Result<(), ReservationError> {
    if reservation.is_active() {
        Ok(())
    } else {
        Err(ReservationError::NotActive(reservation.status))
    }
}

/// 純粋関数：予約に貸出を割り当てる
///
/// Fulfilledになった予約は二度と割り当て対象にならない。
pub fn fulfil(
    reservation: &Reservation,
    loan_id: LoanId,
    now: DateTime<Utc>,
) -> Result<(Reservation, ReservationFulfilled), ReservationError> {
    ensure_active(reservation)?;

    let fulfilled = Reservation {
        status: ReservationStatus::Fulfilled,
        fulfilled_loan_id: Some(loan_id),
        updated_at: now,
        ..reservation.clone()
    };

    let event = ReservationFulfilled {
        reservation_id: reservation.reservation_id,
        book_id: reservation.book_id,
        member_id: reservation.member_id,
        loan_id,
        fulfilled_at: now,
    };

    Ok((fulfilled, event))
}

/// 純粋関数：予約を取り消す
pub fn cancel(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<(Reservation, ReservationCancelled), ReservationError> {
    ensure_active(reservation)?;

    let cancelled = Reservation {
        status: ReservationStatus::Cancelled,
        updated_at: now,
        ..reservation.clone()
    };

    let event = ReservationCancelled {
        reservation_id: reservation.reservation_id,
        book_id: reservation.book_id,
        cancelled_at: now,
    };

    Ok((cancelled, event))
}

/// 純粋関数：期限切れの予約を失効させる
///
/// まだ期限内なら`None`。Active以外は`NotActive`。
pub fn expire(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<Option<(Reservation, ReservationExpired)>, ReservationError> {
    ensure_active(reservation)?;

    if !reservation.is_expired(now) {
        return Ok(None);
    }

    let expired = Reservation {
        status: ReservationStatus::Expired,
        updated_at: now,
        ..reservation.clone()
    };

    let event = ReservationExpired {
        reservation_id: reservation.reservation_id,
        book_id: reservation.book_id,
        expired_at: now,
    };

    Ok(Some((expired, event)))
}
