use crate::domain::{CopyId, LoanId, LoanTransaction, MemberId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Scan;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出台帳ポート
///
/// 貸出記録は削除しない。状態が変わるたびに行全体を保存する。
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// 貸出記録を保存する（新規はINSERT、既存はUPDATE）
    async fn save(&self, loan: LoanTransaction) -> Result<()>;

    /// IDで貸出記録を取得する
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanTransaction>>;

    /// 複本を占有している（Active/Overdue）貸出記録を取得する
    ///
    /// 不変条件により高々1件。
    async fn find_open_for_copy(&self, copy_id: CopyId) -> Result<Option<LoanTransaction>>;

    /// 会員が借りている（Active/Overdue）冊数
    ///
    /// 貸出上限の確認に使用される。
    async fn count_open_for_member(&self, member_id: MemberId) -> Result<usize>;

    /// 会員の全貸出記録（貸出履歴）
    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanTransaction>>;

    /// 延滞候補の貸出記録を検索する
    ///
    /// status が active/overdue かつ due_date < cutoff の記録を返す。
    /// 延滞判定バッチで使用される。読み込めない行は`Scan::malformed`に入る。
    async fn find_overdue_candidates(&self, cutoff: DateTime<Utc>)
    -> Result<Scan<LoanTransaction>>;
}
