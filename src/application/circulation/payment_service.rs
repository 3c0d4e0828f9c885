use crate::domain::{self, DomainEvent, FinePayment, LoanId, LoanTransaction, commands::*};
use crate::ports::ChangeSet;

use super::errors::{CirculationError, Result};
use super::loan_service::{ServiceDependencies, commit, ensure_staff, load_loan, lock_loan};

/// 延滞料金の支払いを記録する
///
/// ビジネスルール：
/// - 支払額は0より大きい
/// - 支払済み + 支払額 が延滞料金を超えない（超える場合はOverPayment）
/// - 支払い記録は追記のみ
///
/// 延滞判定バッチと同じ複本ロックの内側で、最新の延滞料金に対して判定する。
/// 支払い記録と貸出記録の`fine_paid`は同じ変更セットで確定する。
pub async fn apply_payment(
    deps: &ServiceDependencies,
    cmd: ApplyPayment,
) -> Result<(LoanTransaction, FinePayment)> {
    let (_guard, loan) = lock_loan(deps, cmd.loan_id).await?;
    ensure_staff(deps, cmd.staff_id).await?;

    let (updated, payment, event) =
        domain::payment::apply_payment(&loan, cmd.amount, cmd.staff_id, cmd.paid_at)?;

    // 支払い記録と支払済み額は一緒に確定する
    commit(
        deps,
        ChangeSet {
            loans: vec![updated.clone()],
            payments: vec![payment.clone()],
            events: vec![DomainEvent::FinePaid(event)],
            ..ChangeSet::new()
        },
    )
    .await?;

    tracing::info!(
        loan_id = %updated.loan_id,
        payment_id = %payment.payment_id,
        amount = %payment.amount,
        outstanding = %updated.outstanding_fine(),
        "fine payment recorded"
    );

    Ok((updated, payment))
}

/// 貸出に対する支払い履歴
pub async fn payments_for_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
) -> Result<Vec<FinePayment>> {
    load_loan(deps, loan_id).await?;
    deps.payments
        .find_by_loan_id(loan_id)
        .await
        .map_err(CirculationError::PaymentRepositoryError)
}
