pub mod catalog_store;
pub mod event_store;
pub mod loan_repository;
pub mod membership_store;
pub mod payment_repository;
pub mod reservation_repository;
pub mod scan;
pub mod unit_of_work;

pub use catalog_store::CatalogStore;
pub use event_store::EventStore;
pub use loan_repository::LoanRepository;
pub use membership_store::MembershipStore;
pub use payment_repository::PaymentRepository;
pub use reservation_repository::ReservationRepository;
pub use scan::{MalformedRow, Scan};
pub use unit_of_work::{ChangeSet, UnitOfWork};
