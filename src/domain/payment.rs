use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FinePaid, LoanId, LoanTransaction, Money, PaymentError, PaymentId, StaffId};

/// 延滞料金の支払い記録（追記のみ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinePayment {
    pub payment_id: PaymentId,
    pub loan_id: LoanId,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub received_by: StaffId,
}

/// 純粋関数：延滞料金の支払いを記録する
///
/// ビジネスルール：
/// - 支払額は0より大きい
/// - 支払済み + 今回の支払額 が延滞料金を超えてはならない
///
/// 貸出の状態は問わない（返却後の精算も受け付ける）。
pub fn apply_payment(
    loan: &LoanTransaction,
    amount: Money,
    received_by: StaffId,
    now: DateTime<Utc>,
) -> Result<(LoanTransaction, FinePayment, FinePaid), PaymentError> {
    if amount.is_zero() {
        return Err(PaymentError::InvalidAmount);
    }

    let fine_paid = loan.fine_paid + amount;
    if fine_paid > loan.fine_amount {
        return Err(PaymentError::OverPayment {
            outstanding: loan.outstanding_fine(),
        });
    }

    let payment = FinePayment {
        payment_id: PaymentId::new(),
        loan_id: loan.loan_id,
        amount,
        paid_at: now,
        received_by,
    };

    let updated = LoanTransaction {
        fine_paid,
        updated_at: now,
        ..loan.clone()
    };

    let event = FinePaid {
        loan_id: loan.loan_id,
        payment_id: payment.payment_id,
        amount,
        fine_paid,
        paid_at: now,
        received_by,
    };

    Ok((updated, payment, event))
}
