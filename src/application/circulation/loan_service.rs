use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::domain::{
    self, BookCopy, BookId, CirculationPolicy, CopyCondition, CopyId, DomainEvent, LoanId,
    LoanStatus, LoanTransaction, Member, MemberId, MemberType, ReservationQueue, StaffId,
    commands::*,
};
use crate::ports::*;

use super::errors::{CirculationError, Result};
use super::locks::CirculationLocks;
use super::reservation_service::{OfferOutcome, offer_locked};

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、各ユースケース関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub catalog: Arc<dyn CatalogStore>,
    pub membership: Arc<dyn MembershipStore>,
    pub loans: Arc<dyn LoanRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub event_store: Arc<dyn EventStore>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
    pub policy: CirculationPolicy,
    pub locks: Arc<CirculationLocks>,
}

/// 返却の結果
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    /// 返却済みの貸出記録（延滞料金確定済み）
    pub loan: LoanTransaction,
    /// 返却された複本を予約待ち行列に提示した結果
    pub offer: OfferOutcome,
}

// ============================================================================
// 共通ヘルパー
// ============================================================================

pub(super) async fn load_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
) -> Result<LoanTransaction> {
    deps.loans
        .get_by_id(loan_id)
        .await
        .map_err(CirculationError::LoanRepositoryError)?
        .ok_or(CirculationError::LoanNotFound)
}

/// 貸出記録を複本ロック付きで読み込む
///
/// ロック待ちの間に状態が変わりうるため、ロック取得後に読み直す。
pub(super) async fn lock_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
) -> Result<(OwnedMutexGuard<()>, LoanTransaction)> {
    let loan = load_loan(deps, loan_id).await?;
    let guard = deps.locks.lock_copy(loan.copy_id).await;
    let loan = load_loan(deps, loan_id).await?;
    Ok((guard, loan))
}

pub(super) async fn ensure_staff(deps: &ServiceDependencies, staff_id: StaffId) -> Result<()> {
    deps.membership
        .get_staff(staff_id)
        .await
        .map_err(CirculationError::MembershipStoreError)?
        .map(|_| ())
        .ok_or(CirculationError::StaffNotFound)
}

pub(super) async fn load_member(deps: &ServiceDependencies, member_id: MemberId) -> Result<Member> {
    deps.membership
        .get_member(member_id)
        .await
        .map_err(CirculationError::MembershipStoreError)?
        .ok_or(CirculationError::MemberNotFound)
}

/// 会員の会員種別（貸出ポリシー）を取得する
pub(super) async fn load_member_type(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<MemberType> {
    let member = load_member(deps, member_id).await?;
    deps.membership
        .get_member_type(member.member_type_id)
        .await
        .map_err(CirculationError::MembershipStoreError)?
        .ok_or(CirculationError::MemberTypeNotFound)
}

pub(super) async fn load_copy(deps: &ServiceDependencies, copy_id: CopyId) -> Result<BookCopy> {
    deps.catalog
        .get_copy(copy_id)
        .await
        .map_err(CirculationError::CatalogStoreError)?
        .ok_or(CirculationError::CopyNotFound)
}

/// ユースケースの変更をまとめて確定する
pub(super) async fn commit(deps: &ServiceDependencies, changes: ChangeSet) -> Result<()> {
    deps.unit_of_work
        .commit(changes)
        .await
        .map_err(CirculationError::CommitError)
}

// ============================================================================
// ユースケース
// ============================================================================

/// 複本を貸し出す
///
/// ビジネスルール：
/// - 職員・会員・複本が存在すること
/// - 会員が有効・期限内で、貸出中の冊数が会員種別の上限未満であること
/// - 複本が貸出可能で、他の貸出記録に占有されていないこと
///
/// 複本ロック→会員ロックの順で取り、その内側で判定と書き込みを行う。
pub async fn checkout(deps: &ServiceDependencies, cmd: Checkout) -> Result<LoanTransaction> {
    let _copy_guard = deps.locks.lock_copy(cmd.copy_id).await;
    let _member_guard = deps.locks.lock_member(cmd.member_id).await;

    let copy = load_copy(deps, cmd.copy_id).await?;
    let mut changes = ChangeSet::new();
    let loan = stage_checkout(
        deps,
        &mut changes,
        None,
        cmd.member_id,
        copy,
        cmd.staff_id,
        cmd.checked_out_at,
    )
    .await?;

    commit(deps, changes).await?;

    tracing::info!(
        loan_id = %loan.loan_id,
        member_id = %loan.member_id,
        copy_id = %loan.copy_id,
        due_date = %loan.due_date,
        "loan opened"
    );

    Ok(loan)
}

/// 貸出を判定し、変更セットに積む（確定はしない）
///
/// 呼び出し側が複本ロックと会員ロックを保持していること。
/// `released`は同じ変更セットで既に閉じた貸出で、ストアにはまだ反映されていない。
/// 冊数と複本の占有の判定ではこれを閉じたものとして扱う。
pub(super) async fn stage_checkout(
    deps: &ServiceDependencies,
    changes: &mut ChangeSet,
    released: Option<&LoanTransaction>,
    member_id: MemberId,
    copy: BookCopy,
    staff_id: StaffId,
    now: DateTime<Utc>,
) -> Result<LoanTransaction> {
    // 1. 前提となる記録の取得
    ensure_staff(deps, staff_id).await?;
    let member = load_member(deps, member_id).await?;
    let member_type = load_member_type(deps, member_id).await?;

    let mut open_loans = deps
        .loans
        .count_open_for_member(member_id)
        .await
        .map_err(CirculationError::LoanRepositoryError)?;
    if released.is_some_and(|loan| loan.member_id == member_id) {
        open_loans = open_loans.saturating_sub(1);
    }

    let copy_on_loan = deps
        .loans
        .find_open_for_copy(copy.copy_id)
        .await
        .map_err(CirculationError::LoanRepositoryError)?
        .is_some_and(|open| released.is_none_or(|loan| loan.loan_id != open.loan_id));

    // 2. ドメイン層の純粋関数を呼び出し
    let (loan, event) = domain::loan::open_loan(
        &member,
        &member_type,
        open_loans,
        &copy,
        copy_on_loan,
        staff_id,
        now,
    )?;

    // 3. 貸出記録・複本の可否・監査証跡
    changes.loans.push(loan.clone());
    changes.copies.push(BookCopy {
        is_available: false,
        ..copy
    });
    changes.events.push(DomainEvent::LoanOpened(event));

    Ok(loan)
}

/// 同じ書籍に`now`時点で割り当て待ちの予約があるか
async fn reservation_pending(
    deps: &ServiceDependencies,
    book_id: BookId,
    now: DateTime<Utc>,
) -> Result<bool> {
    let reservations = deps
        .reservations
        .find_active_for_book(book_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;
    Ok(ReservationQueue::new(reservations).has_pending(now))
}

/// 貸出を延長する
///
/// ビジネスルール：
/// - 貸出がActive/Overdueであること
/// - 同じ書籍に割り当て待ちの予約がないこと（予約が延長より優先）
/// - 未払いの延滞料金が閾値以下であること
/// - 延長回数が上限未満であること（設定時のみ）
pub async fn renew(deps: &ServiceDependencies, cmd: Renew) -> Result<LoanTransaction> {
    let (_guard, loan) = lock_loan(deps, cmd.loan_id).await?;

    let member_type = load_member_type(deps, loan.member_id).await?;
    let schedule = deps.policy.fine_schedule(&member_type);
    let pending = reservation_pending(deps, loan.book_id, cmd.renewed_at).await?;

    let (renewed, event) = domain::loan::renew(
        &loan,
        &member_type,
        &schedule,
        &deps.policy.renewal,
        pending,
        cmd.renewed_at,
    )?;

    commit(
        deps,
        ChangeSet {
            loans: vec![renewed.clone()],
            events: vec![DomainEvent::LoanRenewed(event)],
            ..ChangeSet::new()
        },
    )
    .await?;

    tracing::info!(
        loan_id = %renewed.loan_id,
        renewal_count = renewed.renewal_count.value(),
        due_date = %renewed.due_date,
        "loan renewed"
    );

    Ok(renewed)
}

/// 複本を返却する
///
/// ビジネスルール：
/// - 貸出がActive/Overdueであること
/// - 返却日時で延滞料金を確定する
/// - 複本を貸出可能に戻し、同じ書籍の予約待ち行列に提示する
///
/// 予約への割り当ては返却と同じ複本ロックの内側で判定し、返却と一緒に確定する。
/// どちらかが失敗すれば何も書き込まれない。
pub async fn return_copy(deps: &ServiceDependencies, cmd: ReturnCopy) -> Result<ReturnOutcome> {
    let (_guard, loan) = lock_loan(deps, cmd.loan_id).await?;

    ensure_staff(deps, cmd.staff_id).await?;
    let member_type = load_member_type(deps, loan.member_id).await?;
    let copy = load_copy(deps, loan.copy_id).await?;
    let schedule = deps.policy.fine_schedule(&member_type);

    let (returned, event) =
        domain::loan::return_copy(&loan, &schedule, cmd.staff_id, cmd.returned_at)?;

    let released_copy = BookCopy {
        is_available: true,
        ..copy
    };
    let changes = ChangeSet {
        loans: vec![returned.clone()],
        copies: vec![released_copy.clone()],
        events: vec![DomainEvent::LoanReturned(event)],
        ..ChangeSet::new()
    };

    // 予約への割り当てを同じ変更セットに積み、返却と一緒に確定する
    let offer = offer_locked(
        deps,
        changes,
        Some(&returned),
        released_copy,
        cmd.staff_id,
        cmd.returned_at,
    )
    .await?;

    tracing::info!(
        loan_id = %returned.loan_id,
        copy_id = %returned.copy_id,
        fine_amount = %returned.fine_amount,
        "copy returned"
    );

    Ok(ReturnOutcome {
        loan: returned,
        offer,
    })
}

/// 紛失を報告する
///
/// 貸出は終了し、複本は貸出不可のまま「紛失」状態になる。
pub async fn mark_lost(deps: &ServiceDependencies, cmd: ReportLoss) -> Result<LoanTransaction> {
    write_off(deps, cmd, CopyCondition::Lost).await
}

/// 破損を報告する
///
/// 貸出は終了し、複本は貸出不可のまま「破損」状態になる。
pub async fn mark_damaged(deps: &ServiceDependencies, cmd: ReportLoss) -> Result<LoanTransaction> {
    write_off(deps, cmd, CopyCondition::Damaged).await
}

async fn write_off(
    deps: &ServiceDependencies,
    cmd: ReportLoss,
    condition: CopyCondition,
) -> Result<LoanTransaction> {
    let (_guard, loan) = lock_loan(deps, cmd.loan_id).await?;

    ensure_staff(deps, cmd.staff_id).await?;
    let copy = load_copy(deps, loan.copy_id).await?;

    let (closed, event) = match condition {
        CopyCondition::Lost => domain::loan::mark_lost(&loan, cmd.staff_id, cmd.reported_at)?,
        _ => domain::loan::mark_damaged(&loan, cmd.staff_id, cmd.reported_at)?,
    };

    commit(
        deps,
        ChangeSet {
            loans: vec![closed.clone()],
            copies: vec![BookCopy {
                is_available: false,
                condition,
                ..copy
            }],
            events: vec![DomainEvent::LoanWrittenOff(event)],
            ..ChangeSet::new()
        },
    )
    .await?;

    tracing::info!(
        loan_id = %closed.loan_id,
        copy_id = %closed.copy_id,
        status = closed.status.as_str(),
        "loan written off"
    );

    Ok(closed)
}

// ============================================================================
// 照会
// ============================================================================

/// 貸出記録を取得する
pub async fn get_loan(deps: &ServiceDependencies, loan_id: LoanId) -> Result<LoanTransaction> {
    load_loan(deps, loan_id).await
}

/// 貸出の監査証跡（記録された順）
pub async fn loan_history(
    deps: &ServiceDependencies,
    loan_id: LoanId,
) -> Result<Vec<DomainEvent>> {
    load_loan(deps, loan_id).await?;
    deps.event_store
        .load(loan_id.value())
        .await
        .map_err(CirculationError::EventStoreError)
}

/// 会員の貸出記録を一覧する（状態で絞り込み可）
pub async fn loans_for_member(
    deps: &ServiceDependencies,
    member_id: MemberId,
    status: Option<LoanStatus>,
) -> Result<Vec<LoanTransaction>> {
    let loans = deps
        .loans
        .find_by_member_id(member_id)
        .await
        .map_err(CirculationError::LoanRepositoryError)?;

    Ok(loans
        .into_iter()
        .filter(|loan| status.is_none_or(|s| loan.status == s))
        .collect())
}
