use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    self, Book, BookCopy, BookId, CopyId, DomainEvent, LoanTransaction, Reservation,
    ReservationId, ReservationQueue, StaffId, commands::*,
};
use crate::ports::ChangeSet;

use super::errors::{CirculationError, Result};
use super::loan_service::{
    ServiceDependencies, commit, ensure_staff, load_copy, load_member, stage_checkout,
};
use super::overdue_sweep::{SkippedRow, skipped_rows};

/// 返却された複本を予約待ち行列に提示した結果
#[derive(Debug, Clone, Default)]
pub struct OfferOutcome {
    /// 割り当てられた予約と、その会員に開いた貸出
    pub fulfilled: Option<(Reservation, LoanTransaction)>,
    /// 貸出資格がなく飛ばした予約（Activeのまま残る）
    pub skipped: Vec<ReservationId>,
    /// 走査中に期限切れとして失効させた予約
    pub expired: Vec<ReservationId>,
}

/// 予約失効バッチの結果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpiryReport {
    pub expired: Vec<ReservationId>,
    pub skipped: Vec<SkippedRow>,
}

async fn load_reservation(
    deps: &ServiceDependencies,
    reservation_id: ReservationId,
) -> Result<Reservation> {
    deps.reservations
        .get_by_id(reservation_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?
        .ok_or(CirculationError::ReservationNotFound)
}

async fn load_queue(deps: &ServiceDependencies, book_id: BookId) -> Result<ReservationQueue> {
    let reservations = deps
        .reservations
        .find_active_for_book(book_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;
    Ok(ReservationQueue::new(reservations))
}

async fn load_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.catalog
        .get_book(book_id)
        .await
        .map_err(CirculationError::CatalogStoreError)?
        .ok_or(CirculationError::BookNotFound)
}

/// 予約を登録する
///
/// ビジネスルール：
/// - 会員と書籍が存在し、書籍が除籍されていないこと
/// - 同じ会員・書籍のActiveな予約がないこと
/// - 優先番号の省略時は待ち行列の末尾
///
/// 書籍単位のロックの内側で待ち行列を読み、登録する。
pub async fn place_reservation(
    deps: &ServiceDependencies,
    cmd: PlaceReservation,
) -> Result<Reservation> {
    let _guard = deps.locks.lock_book(cmd.book_id).await;

    load_member(deps, cmd.member_id).await?;
    let book = load_book(deps, cmd.book_id).await?;
    if book.is_retired {
        return Err(CirculationError::InvalidState(
            "book is retired".to_string(),
        ));
    }

    let queue = load_queue(deps, cmd.book_id).await?;
    let (reservation, event) = domain::reservation::place(
        &queue,
        cmd.member_id,
        cmd.book_id,
        cmd.expiry_date,
        cmd.priority_number,
        cmd.reserved_at,
    )?;

    commit(
        deps,
        ChangeSet {
            reservations: vec![reservation.clone()],
            events: vec![DomainEvent::ReservationPlaced(event)],
            ..ChangeSet::new()
        },
    )
    .await?;

    tracing::info!(
        reservation_id = %reservation.reservation_id,
        member_id = %reservation.member_id,
        book_id = %reservation.book_id,
        priority_number = reservation.priority_number,
        "reservation placed"
    );

    Ok(reservation)
}

/// 予約を取り消す（Activeな予約のみ）
pub async fn cancel_reservation(
    deps: &ServiceDependencies,
    cmd: CancelReservation,
) -> Result<Reservation> {
    let reservation = load_reservation(deps, cmd.reservation_id).await?;
    let _guard = deps.locks.lock_book(reservation.book_id).await;
    let reservation = load_reservation(deps, cmd.reservation_id).await?;

    let (cancelled, event) = domain::reservation::cancel(&reservation, cmd.cancelled_at)?;

    commit(
        deps,
        ChangeSet {
            reservations: vec![cancelled.clone()],
            events: vec![DomainEvent::ReservationCancelled(event)],
            ..ChangeSet::new()
        },
    )
    .await?;

    tracing::info!(
        reservation_id = %cancelled.reservation_id,
        book_id = %cancelled.book_id,
        "reservation cancelled"
    );

    Ok(cancelled)
}

/// 貸出可能になった複本を予約待ち行列に提示する
///
/// 通常は返却処理から呼ばれるが、職員が手動で複本を棚に戻したときにも使う。
pub async fn offer(
    deps: &ServiceDependencies,
    book_id: BookId,
    copy_id: CopyId,
    staff_id: StaffId,
    now: DateTime<Utc>,
) -> Result<OfferOutcome> {
    let _guard = deps.locks.lock_copy(copy_id).await;

    let copy = load_copy(deps, copy_id).await?;
    if copy.book_id != book_id {
        return Err(CirculationError::InvalidRequest(
            "copy does not belong to the book".to_string(),
        ));
    }
    ensure_staff(deps, staff_id).await?;

    offer_locked(deps, ChangeSet::new(), None, copy, staff_id, now).await
}

/// 複本ロックを保持している呼び出し元向けの提示処理
///
/// ビジネスルール：
/// - 待ち行列の先頭から順に見る
/// - 期限切れの予約はExpiredにする
/// - 貸出資格を失った会員の予約は飛ばす（Activeのまま）
/// - 最初に資格のある会員へ貸し出し、その予約をFulfilledにする
/// - 1つの予約が二度割り当てられることはない
///
/// 呼び出し側の変更セット（返却など）に割り当て結果を積み、まとめて確定する。
pub(super) async fn offer_locked(
    deps: &ServiceDependencies,
    mut changes: ChangeSet,
    released: Option<&LoanTransaction>,
    copy: BookCopy,
    staff_id: StaffId,
    now: DateTime<Utc>,
) -> Result<OfferOutcome> {
    let _book_guard = deps.locks.lock_book(copy.book_id).await;

    let queue = load_queue(deps, copy.book_id).await?;
    let mut outcome = OfferOutcome::default();
    // 割り当てた会員のロックは確定まで保持する
    let mut held_member = None;

    for reservation in queue.iter() {
        if let Some((expired, event)) = domain::reservation::expire(reservation, now)? {
            changes.reservations.push(expired);
            changes.events.push(DomainEvent::ReservationExpired(event));
            outcome.expired.push(reservation.reservation_id);
            continue;
        }

        let guard = deps.locks.lock_member(reservation.member_id).await;
        let staged = stage_checkout(
            deps,
            &mut changes,
            released,
            reservation.member_id,
            copy.clone(),
            staff_id,
            now,
        )
        .await;

        let loan = match staged {
            Ok(loan) => loan,
            Err(
                err @ (CirculationError::PolicyViolation(_)
                | CirculationError::MemberNotFound
                | CirculationError::MemberTypeNotFound),
            ) => {
                tracing::info!(
                    reservation_id = %reservation.reservation_id,
                    member_id = %reservation.member_id,
                    reason = %err,
                    "reservation skipped"
                );
                outcome.skipped.push(reservation.reservation_id);
                continue;
            }
            Err(CirculationError::CopyUnavailable) => break,
            Err(err) => return Err(err),
        };

        let (fulfilled, event) = domain::reservation::fulfil(reservation, loan.loan_id, now)?;
        changes.reservations.push(fulfilled.clone());
        changes.events.push(DomainEvent::ReservationFulfilled(event));

        outcome.fulfilled = Some((fulfilled, loan));
        held_member = Some(guard);
        break;
    }

    commit(deps, changes).await?;
    drop(held_member);

    if let Some((fulfilled, loan)) = &outcome.fulfilled {
        tracing::info!(
            reservation_id = %fulfilled.reservation_id,
            loan_id = %loan.loan_id,
            "reservation fulfilled"
        );
    }

    Ok(outcome)
}

/// 予約失効バッチ
///
/// 有効期限を過ぎたActiveな予約をExpiredにする。
/// 書籍単位のロックを取り、読み直してから遷移させる（既に他の状態なら何もしない）。
/// 1件の失敗でバッチ全体を止めず、飛ばした行を報告する。
pub async fn expire_reservations(
    deps: &ServiceDependencies,
    now: DateTime<Utc>,
) -> Result<ExpiryReport> {
    let scan = deps
        .reservations
        .find_expired_candidates(now)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;

    let mut report = ExpiryReport {
        skipped: skipped_rows(scan.malformed, "reservation"),
        ..ExpiryReport::default()
    };

    for candidate in scan.rows {
        match expire_one(deps, &candidate, now).await {
            Ok(true) => report.expired.push(candidate.reservation_id),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(
                    reservation_id = %candidate.reservation_id,
                    error = %err,
                    "skipping reservation in expiry sweep"
                );
                report.skipped.push(SkippedRow {
                    id: candidate.reservation_id.value(),
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        expired = report.expired.len(),
        skipped = report.skipped.len(),
        "reservation expiry sweep finished"
    );

    Ok(report)
}

async fn expire_one(
    deps: &ServiceDependencies,
    candidate: &Reservation,
    now: DateTime<Utc>,
) -> Result<bool> {
    let _guard = deps.locks.lock_book(candidate.book_id).await;
    let reservation = load_reservation(deps, candidate.reservation_id).await?;

    if !reservation.is_active() {
        return Ok(false);
    }

    match domain::reservation::expire(&reservation, now)? {
        Some((expired, event)) => {
            commit(
                deps,
                ChangeSet {
                    reservations: vec![expired],
                    events: vec![DomainEvent::ReservationExpired(event)],
                    ..ChangeSet::new()
                },
            )
            .await?;
            Ok(true)
        }
        None => Ok(false),
    }
}
