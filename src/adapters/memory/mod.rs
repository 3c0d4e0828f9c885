//! In-memory adapters.
//!
//! Used by the test suites and for running the service without a database.
//! Each store guards its map with a `std::sync::Mutex`; the application
//! layer's per-copy / per-book locks provide operation-level serialization.
//! `UnitOfWork` writes one operation's changes across all stores at once.

pub mod catalog_store;
pub mod event_store;
pub mod loan_repository;
pub mod membership_store;
pub mod payment_repository;
pub mod reservation_repository;
pub mod unit_of_work;

pub use catalog_store::CatalogStore;
pub use event_store::EventStore;
pub use loan_repository::LoanRepository;
pub use membership_store::MembershipStore;
pub use payment_repository::PaymentRepository;
pub use reservation_repository::ReservationRepository;
pub use unit_of_work::UnitOfWork;

use std::sync::{Mutex, MutexGuard};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Lock a store's map, surfacing a poisoned mutex as a store error.
fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, BoxError> {
    mutex
        .lock()
        .map_err(|_| BoxError::from("in-memory store mutex poisoned"))
}
