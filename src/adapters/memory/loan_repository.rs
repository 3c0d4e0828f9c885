use crate::domain::{CopyId, LoanId, LoanTransaction, MemberId};
use crate::ports::Scan;
use crate::ports::loan_repository::{LoanRepository as LoanRepositoryTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::guard;

/// In-memory implementation of LoanRepository
#[derive(Default)]
pub struct LoanRepository {
    pub(super) loans: Mutex<HashMap<LoanId, LoanTransaction>>,
}

impl LoanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored loan (test inspection)
    pub fn all(&self) -> Result<Vec<LoanTransaction>> {
        Ok(guard(&self.loans)?.values().cloned().collect())
    }
}

#[async_trait]
impl LoanRepositoryTrait for LoanRepository {
    async fn save(&self, loan: LoanTransaction) -> Result<()> {
        guard(&self.loans)?.insert(loan.loan_id, loan);
        Ok(())
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanTransaction>> {
        Ok(guard(&self.loans)?.get(&loan_id).cloned())
    }

    async fn find_open_for_copy(&self, copy_id: CopyId) -> Result<Option<LoanTransaction>> {
        Ok(guard(&self.loans)?
            .values()
            .find(|l| l.copy_id == copy_id && l.status.is_open())
            .cloned())
    }

    async fn count_open_for_member(&self, member_id: MemberId) -> Result<usize> {
        Ok(guard(&self.loans)?
            .values()
            .filter(|l| l.member_id == member_id && l.status.is_open())
            .count())
    }

    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanTransaction>> {
        let mut loans: Vec<LoanTransaction> = guard(&self.loans)?
            .values()
            .filter(|l| l.member_id == member_id)
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date));
        Ok(loans)
    }

    async fn find_overdue_candidates(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Scan<LoanTransaction>> {
        let mut loans: Vec<LoanTransaction> = guard(&self.loans)?
            .values()
            .filter(|l| l.status.is_open() && l.due_date < cutoff)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.due_date);
        Ok(Scan::complete(loans))
    }
}
