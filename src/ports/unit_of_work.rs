use crate::domain::{Book, BookCopy, DomainEvent, FinePayment, LoanTransaction, Reservation};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 1つのユースケースが書き込む変更のまとまり
///
/// 各リストは追加した順に適用される。同じ行が複数回現れた場合は最後のものが残る。
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub books: Vec<Book>,
    pub copies: Vec<BookCopy>,
    pub loans: Vec<LoanTransaction>,
    pub reservations: Vec<Reservation>,
    pub payments: Vec<FinePayment>,
    pub events: Vec<DomainEvent>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
            && self.copies.is_empty()
            && self.loans.is_empty()
            && self.reservations.is_empty()
            && self.payments.is_empty()
            && self.events.is_empty()
    }
}

/// 書き込みの確定ポート
///
/// ユースケースの書き込みはすべてここを通る。
/// `commit`はすべての変更を反映するか、何も反映しないかのどちらか。
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn commit(&self, changes: ChangeSet) -> Result<()>;
}
