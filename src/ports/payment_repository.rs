use crate::domain::{FinePayment, LoanId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 延滞料金支払いポート
///
/// 支払い記録は追記専用で、変更・削除しない。
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn append(&self, payment: FinePayment) -> Result<()>;

    /// 貸出に対する支払い記録を支払日時順に取得する
    async fn find_by_loan_id(&self, loan_id: LoanId) -> Result<Vec<FinePayment>>;
}
