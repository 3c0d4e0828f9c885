use crate::ports::unit_of_work::{ChangeSet, Result, UnitOfWork as UnitOfWorkTrait};
use async_trait::async_trait;
use std::sync::Arc;

use super::{
    CatalogStore, EventStore, LoanRepository, PaymentRepository, ReservationRepository, guard,
};

/// In-memory implementation of UnitOfWork
///
/// Takes every store's lock (in a fixed order) before touching any of them,
/// so a change set is applied entirely or, if a lock is poisoned, not at all.
pub struct UnitOfWork {
    catalog: Arc<CatalogStore>,
    loans: Arc<LoanRepository>,
    reservations: Arc<ReservationRepository>,
    payments: Arc<PaymentRepository>,
    events: Arc<EventStore>,
}

impl UnitOfWork {
    pub fn new(
        catalog: Arc<CatalogStore>,
        loans: Arc<LoanRepository>,
        reservations: Arc<ReservationRepository>,
        payments: Arc<PaymentRepository>,
        events: Arc<EventStore>,
    ) -> Self {
        Self {
            catalog,
            loans,
            reservations,
            payments,
            events,
        }
    }
}

#[async_trait]
impl UnitOfWorkTrait for UnitOfWork {
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut books = guard(&self.catalog.books)?;
        let mut copies = guard(&self.catalog.copies)?;
        let mut loans = guard(&self.loans.loans)?;
        let mut reservations = guard(&self.reservations.reservations)?;
        let mut payments = guard(&self.payments.payments)?;
        let mut events = guard(&self.events.events)?;

        for book in changes.books {
            books.insert(book.book_id, book);
        }
        for copy in changes.copies {
            copies.insert(copy.copy_id, copy);
        }
        for loan in changes.loans {
            loans.insert(loan.loan_id, loan);
        }
        for reservation in changes.reservations {
            reservations.insert(reservation.reservation_id, reservation);
        }
        payments.extend(changes.payments);
        events.extend(changes.events);

        Ok(())
    }
}
