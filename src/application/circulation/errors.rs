use thiserror::Error;

use crate::domain::{
    CheckoutError, LoanStatus, Money, PaymentError, PolicyViolation, RenewError,
    ReservationError, RetireBookError, TransitionError,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 貸出管理アプリケーション層のエラー
///
/// 業務ルール違反はすべて呼び出し側で回復可能で、発生時には何も書き込まれていない。
#[derive(Debug, Error)]
pub enum CirculationError {
    /// 会員に貸出資格がない
    #[error("Policy violation: {0}")]
    PolicyViolation(PolicyViolation),

    /// 複本が貸出不可
    #[error("Copy is not available for loan")]
    CopyUnavailable,

    /// 延長不可
    #[error("Loan cannot be renewed: {0}")]
    NotRenewable(RenewError),

    /// 要求された遷移が現在の状態では不正
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 同じ会員・書籍の有効な予約が既にある
    #[error("An active reservation already exists for this member and book")]
    DuplicateReservation,

    /// 支払額が未払い残高を超える
    #[error("Payment exceeds outstanding fine of {outstanding}")]
    OverPayment { outstanding: Money },

    /// 入力値が不正（0円の支払い、過去の予約期限など）
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Member not found")]
    MemberNotFound,

    #[error("Member type not found")]
    MemberTypeNotFound,

    #[error("Staff not found")]
    StaffNotFound,

    #[error("Book not found")]
    BookNotFound,

    #[error("Copy not found")]
    CopyNotFound,

    #[error("Loan not found")]
    LoanNotFound,

    #[error("Reservation not found")]
    ReservationNotFound,

    /// CatalogStoreのエラー
    #[error("Catalog store error")]
    CatalogStoreError(#[source] BoxError),

    /// MembershipStoreのエラー
    #[error("Membership store error")]
    MembershipStoreError(#[source] BoxError),

    /// LoanRepositoryのエラー
    #[error("Loan repository error")]
    LoanRepositoryError(#[source] BoxError),

    /// ReservationRepositoryのエラー
    #[error("Reservation repository error")]
    ReservationRepositoryError(#[source] BoxError),

    /// PaymentRepositoryのエラー
    #[error("Payment repository error")]
    PaymentRepositoryError(#[source] BoxError),

    /// EventStoreのエラー
    #[error("Event store error")]
    EventStoreError(#[source] BoxError),

    /// 変更の確定に失敗（何も書き込まれていない）
    #[error("Failed to commit changes")]
    CommitError(#[source] BoxError),
}

impl CirculationError {
    /// 業務ルール違反か（ストア障害・未存在でないか）
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            CirculationError::PolicyViolation(_)
                | CirculationError::CopyUnavailable
                | CirculationError::NotRenewable(_)
                | CirculationError::InvalidState(_)
                | CirculationError::DuplicateReservation
                | CirculationError::OverPayment { .. }
                | CirculationError::InvalidRequest(_)
        )
    }
}

fn invalid_loan_state(status: LoanStatus) -> CirculationError {
    CirculationError::InvalidState(format!("loan is {}", status.as_str()))
}

impl From<CheckoutError> for CirculationError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::PolicyViolation(violation) => {
                CirculationError::PolicyViolation(violation)
            }
            CheckoutError::CopyUnavailable => CirculationError::CopyUnavailable,
        }
    }
}

impl From<RenewError> for CirculationError {
    fn from(err: RenewError) -> Self {
        CirculationError::NotRenewable(err)
    }
}

impl From<TransitionError> for CirculationError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidState(status) => invalid_loan_state(status),
        }
    }
}

impl From<ReservationError> for CirculationError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::DuplicateReservation => CirculationError::DuplicateReservation,
            ReservationError::ExpiryNotInFuture => CirculationError::InvalidRequest(
                "reservation expiry must be in the future".to_string(),
            ),
            ReservationError::NotActive(status) => {
                CirculationError::InvalidState(format!("reservation is {}", status.as_str()))
            }
        }
    }
}

impl From<PaymentError> for CirculationError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidAmount => {
                CirculationError::InvalidRequest("payment amount must be positive".to_string())
            }
            PaymentError::OverPayment { outstanding } => {
                CirculationError::OverPayment { outstanding }
            }
        }
    }
}

impl From<RetireBookError> for CirculationError {
    fn from(err: RetireBookError) -> Self {
        match err {
            RetireBookError::AlreadyRetired => {
                CirculationError::InvalidState("book is already retired".to_string())
            }
            RetireBookError::CopiesOnLoan(copies) => CirculationError::InvalidState(format!(
                "{} copies are still on loan",
                copies.len()
            )),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, CirculationError>;
