use crate::ports::unit_of_work::{ChangeSet, Result, UnitOfWork as UnitOfWorkTrait};
use async_trait::async_trait;
use sqlx::PgPool;

use super::catalog_store::{upsert_book, upsert_copy};
use super::event_store::insert_events;
use super::loan_repository::upsert_loan;
use super::payment_repository::insert_payment;
use super::reservation_repository::upsert_reservation;

/// PostgreSQL implementation of UnitOfWork
///
/// Writes a change set inside one transaction. Any failed statement drops the
/// transaction, which rolls back everything written before it.
pub struct UnitOfWork {
    pool: PgPool,
}

impl UnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkTrait for UnitOfWork {
    /// Apply the change set in foreign-key order: books, copies, loans,
    /// reservations, payments, then the audit journal.
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for book in &changes.books {
            upsert_book(&mut *tx, book).await?;
        }
        for copy in &changes.copies {
            upsert_copy(&mut *tx, copy).await?;
        }
        for loan in &changes.loans {
            upsert_loan(&mut *tx, loan).await?;
        }
        for reservation in &changes.reservations {
            upsert_reservation(&mut *tx, reservation).await?;
        }
        for payment in &changes.payments {
            insert_payment(&mut *tx, payment).await?;
        }
        insert_events(&mut *tx, &changes.events).await?;

        tx.commit().await?;

        Ok(())
    }
}
