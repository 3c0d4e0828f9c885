use crate::domain::{BookId, MemberId, Reservation, ReservationId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Scan;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 予約ストアポート
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// 予約を保存する（upsert）
    async fn save(&self, reservation: Reservation) -> Result<()>;

    async fn get_by_id(&self, reservation_id: ReservationId) -> Result<Option<Reservation>>;

    /// 書籍のActiveな予約をすべて取得する（順不同）
    ///
    /// 並べ替えは`ReservationQueue`が行う。
    async fn find_active_for_book(&self, book_id: BookId) -> Result<Vec<Reservation>>;

    /// 会員の全予約
    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<Reservation>>;

    /// 期限切れ候補（Activeかつ expiry_date < cutoff）を検索する
    ///
    /// 読み込めない行は`Scan::malformed`に入る。
    async fn find_expired_candidates(&self, cutoff: DateTime<Utc>) -> Result<Scan<Reservation>>;
}
