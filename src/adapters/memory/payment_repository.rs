use crate::domain::{FinePayment, LoanId};
use crate::ports::payment_repository::{PaymentRepository as PaymentRepositoryTrait, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use super::guard;

/// In-memory implementation of PaymentRepository (append-only log)
#[derive(Default)]
pub struct PaymentRepository {
    pub(super) payments: Mutex<Vec<FinePayment>>,
}

impl PaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepositoryTrait for PaymentRepository {
    async fn append(&self, payment: FinePayment) -> Result<()> {
        guard(&self.payments)?.push(payment);
        Ok(())
    }

    async fn find_by_loan_id(&self, loan_id: LoanId) -> Result<Vec<FinePayment>> {
        Ok(guard(&self.payments)?
            .iter()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect())
    }
}
