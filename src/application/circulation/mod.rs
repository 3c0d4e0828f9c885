mod catalog_service;
mod errors;
mod loan_service;
mod locks;
mod overdue_sweep;
mod payment_service;
mod reservation_service;

pub use catalog_service::retire_book;
pub use errors::{CirculationError, Result};
pub use loan_service::{
    ReturnOutcome, ServiceDependencies, checkout, get_loan, loan_history, loans_for_member,
    mark_damaged, mark_lost, renew, return_copy,
};
pub use locks::{CirculationLocks, KeyedLocks};
pub use overdue_sweep::{SkippedRow, SweepReport, sweep_overdue};
pub use payment_service::{apply_payment, payments_for_loan};
pub use reservation_service::{
    ExpiryReport, OfferOutcome, cancel_reservation, expire_reservations, offer,
    place_reservation,
};
