pub mod catalog;
pub mod commands;
pub mod errors;
pub mod events;
pub mod fine;
pub mod loan;
pub mod membership;
pub mod payment;
pub mod policy;
pub mod reservation;
pub mod value_objects;

pub use catalog::{Book, BookCopy, CopyCondition, RetireBookError};
pub use errors::*;
pub use events::*;
pub use fine::FineSchedule;
pub use loan::{LoanStatus, LoanTransaction, OverdueAssessment};
pub use membership::{Member, MemberType, PolicyViolation, Staff, check_eligibility};
pub use payment::FinePayment;
pub use policy::{CirculationPolicy, RenewalPolicy};
pub use reservation::{Reservation, ReservationQueue, ReservationStatus};
pub use value_objects::*;
