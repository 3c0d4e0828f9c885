use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{self, DomainEvent, LoanId, LoanTransaction, OverdueAssessment};
use crate::ports::{ChangeSet, MalformedRow};

use super::errors::{CirculationError, Result};
use super::loan_service::{ServiceDependencies, commit, load_loan, load_member_type};

/// バッチ処理で飛ばした行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub id: Uuid,
    pub reason: String,
}

/// 読み込めなかった行を報告用に変換する（警告ログ付き）
pub(super) fn skipped_rows(malformed: Vec<MalformedRow>, kind: &str) -> Vec<SkippedRow> {
    malformed
        .into_iter()
        .map(|row| {
            tracing::warn!(id = %row.id, kind, reason = %row.reason, "skipping malformed row");
            SkippedRow {
                id: row.id,
                reason: row.reason,
            }
        })
        .collect()
}

/// 延滞判定バッチの結果
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Active から Overdue に遷移した貸出
    pub reclassified: Vec<LoanId>,
    /// 既にOverdueで、延滞料金だけが更新された貸出
    pub accrued: Vec<LoanId>,
    /// 不正な行や読み書きに失敗した行
    pub skipped: Vec<SkippedRow>,
}

/// 延滞判定バッチ
///
/// 定期的に実行され、返却期限を過ぎた貸出をOverdueに分類し、延滞料金を再計算する。
///
/// ビジネスルール：
/// - 対象は返却期限（due_date）が`now`より前のActive/Overdueの貸出
/// - 遷移は Active → Overdue のみ（単調）
/// - 返却日時には触れない
/// - 同じ`now`で再実行しても状態・延滞料金は変わらない（冪等）
///
/// 各行は複本ロックを取ってから読み直し、個別の貸出処理と並行しても安全に動く。
/// 不正な行は警告を出して飛ばし、バッチ全体は止めない。
///
/// # エラー
/// 候補の一覧取得に失敗した場合のみ。読み込めなかった行や行ごとの失敗は
/// `SweepReport::skipped`に入る。
pub async fn sweep_overdue(deps: &ServiceDependencies, now: DateTime<Utc>) -> Result<SweepReport> {
    let scan = deps
        .loans
        .find_overdue_candidates(now)
        .await
        .map_err(CirculationError::LoanRepositoryError)?;

    let mut report = SweepReport {
        skipped: skipped_rows(scan.malformed, "loan"),
        ..SweepReport::default()
    };

    for candidate in scan.rows {
        match sweep_one(deps, &candidate, now).await {
            Ok(Some(OverdueAssessment::BecameOverdue(..))) => {
                report.reclassified.push(candidate.loan_id)
            }
            Ok(Some(OverdueAssessment::FineAccrued(..))) => report.accrued.push(candidate.loan_id),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    loan_id = %candidate.loan_id,
                    error = %err,
                    "skipping loan in overdue sweep"
                );
                report.skipped.push(SkippedRow {
                    id: candidate.loan_id.value(),
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        reclassified = report.reclassified.len(),
        accrued = report.accrued.len(),
        skipped = report.skipped.len(),
        "overdue sweep finished"
    );

    Ok(report)
}

async fn sweep_one(
    deps: &ServiceDependencies,
    candidate: &LoanTransaction,
    now: DateTime<Utc>,
) -> Result<Option<OverdueAssessment>> {
    candidate
        .validate()
        .map_err(|err| CirculationError::InvalidState(err.to_string()))?;

    let _guard = deps.locks.lock_copy(candidate.copy_id).await;
    let loan = load_loan(deps, candidate.loan_id).await?;

    // ロック待ちの間に返却・紛失処理が済んでいれば対象外
    if !loan.status.is_open() {
        return Ok(None);
    }

    let member_type = load_member_type(deps, loan.member_id).await?;
    let schedule = deps.policy.fine_schedule(&member_type);

    let assessment = domain::loan::assess_overdue(&loan, &schedule, now)?;

    match &assessment {
        Some(OverdueAssessment::BecameOverdue(updated, event)) => {
            commit(
                deps,
                ChangeSet {
                    loans: vec![updated.clone()],
                    events: vec![DomainEvent::LoanBecameOverdue(event.clone())],
                    ..ChangeSet::new()
                },
            )
            .await?;
            tracing::info!(
                loan_id = %updated.loan_id,
                fine_amount = %updated.fine_amount,
                "loan became overdue"
            );
        }
        Some(OverdueAssessment::FineAccrued(updated, event)) => {
            commit(
                deps,
                ChangeSet {
                    loans: vec![updated.clone()],
                    events: vec![DomainEvent::FineAccrued(event.clone())],
                    ..ChangeSet::new()
                },
            )
            .await?;
            tracing::debug!(
                loan_id = %updated.loan_id,
                fine_amount = %updated.fine_amount,
                "fine accrued"
            );
        }
        None => {}
    }

    Ok(assessment)
}
