use super::{LoanStatus, Money, PolicyViolation, ReservationStatus};

/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// 会員に貸出資格がない
    PolicyViolation(PolicyViolation),
    /// 複本が貸出不可、または既に貸出中の記録がある
    CopyUnavailable,
}

impl From<PolicyViolation> for CheckoutError {
    fn from(violation: PolicyViolation) -> Self {
        CheckoutError::PolicyViolation(violation)
    }
}

/// 延長のエラー
///
/// どの理由でも呼び出し側には`NotRenewable`として伝わる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewError {
    /// 貸出中でない（返却済み・紛失・破損）
    NotOpen(LoanStatus),
    /// 同じ書籍に有効な予約がある（予約が延長より優先）
    ReservationPending,
    /// 未払いの延滞料金が閾値を超えている
    UnpaidFine { outstanding: Money },
    /// 延長回数の上限に達している
    RenewalLimitReached { limit: u32 },
}

impl std::fmt::Display for RenewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenewError::NotOpen(status) => write!(f, "loan is {}", status.as_str()),
            RenewError::ReservationPending => {
                write!(f, "another member has reserved this book")
            }
            RenewError::UnpaidFine { outstanding } => {
                write!(f, "unpaid fine of {outstanding} outstanding")
            }
            RenewError::RenewalLimitReached { limit } => {
                write!(f, "renewal limit of {limit} reached")
            }
        }
    }
}

/// 状態遷移のエラー（返却・紛失・破損・延滞判定）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// 現在の状態からは遷移できない
    InvalidState(LoanStatus),
}

/// 貸出記録の不変条件違反（永続化層から読んだ行の検証用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanInvariantError {
    DueBeforeLoanDate,
    ReturnBeforeLoanDate,
    FinePaidExceedsFine,
    CarriedFineExceedsFine,
    ReturnDateOnOpenLoan,
}

impl std::fmt::Display for LoanInvariantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            LoanInvariantError::DueBeforeLoanDate => "due_date precedes loan_date",
            LoanInvariantError::ReturnBeforeLoanDate => "return_date precedes loan_date",
            LoanInvariantError::FinePaidExceedsFine => "fine_paid exceeds fine_amount",
            LoanInvariantError::CarriedFineExceedsFine => "carried_fine exceeds fine_amount",
            LoanInvariantError::ReturnDateOnOpenLoan => "open loan carries a return_date",
        };
        f.write_str(message)
    }
}

/// 予約のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// 同じ会員・書籍の有効な予約が既にある
    DuplicateReservation,
    /// 有効期限が現在以前
    ExpiryNotInFuture,
    /// 有効（Active）でない予約は操作できない
    NotActive(ReservationStatus),
}

/// 延滞料金支払いのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// 0円の支払い
    InvalidAmount,
    /// 支払額が未払い残高を超える
    OverPayment { outstanding: Money },
}
