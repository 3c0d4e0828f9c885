use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LoanTransaction, Money};

/// 延滞料金表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineSchedule {
    pub fine_per_day: Money,
    pub cap: Option<Money>,
}

/// 純粋関数：延滞日数
///
/// 返却済みなら返却日時、未返却なら`now`を基準に、返却期限からの
/// 経過を満了日数（切り捨て）で数える。期限前は0。
pub fn days_late(loan: &LoanTransaction, now: DateTime<Utc>) -> u32 {
    let end = loan.return_date.unwrap_or(now);
    let days = (end - loan.due_date).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// 純粋関数：延滞料金を計算する
///
/// `延滞日数 × 日額`。上限が設定されていればそこで打ち止め。
/// 同じ入力には常に同じ結果を返す。
pub fn compute(loan: &LoanTransaction, schedule: &FineSchedule, now: DateTime<Utc>) -> Money {
    let fine = schedule.fine_per_day.times(days_late(loan, now));
    match schedule.cap {
        Some(cap) if fine > cap => cap,
        _ => fine,
    }
}

/// 貸出に記録する延滞料金
///
/// 延長前の繰越額に現在の期間の延滞料金を加える（上限は貸出全体に適用）。
/// 既に算定済みの額と支払済みの額を下回ることはない。
pub fn assess(loan: &LoanTransaction, schedule: &FineSchedule, now: DateTime<Utc>) -> Money {
    let total = loan.carried_fine + compute(loan, schedule, now);
    let total = match schedule.cap {
        Some(cap) if total > cap => cap,
        _ => total,
    };
    total.max(loan.fine_amount).max(loan.fine_paid)
}
