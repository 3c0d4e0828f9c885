use crate::domain::{self, Book, CopyId, DomainEvent, commands::*};
use crate::ports::ChangeSet;

use super::errors::{CirculationError, Result};
use super::loan_service::{ServiceDependencies, commit, ensure_staff};

/// 書籍を除籍する
///
/// ビジネスルール：
/// - 貸出中の複本が1冊でもあれば除籍不可（何も変更しない）
/// - すべての複本を「除籍済み」・貸出不可にする
/// - 書籍のActiveな予約をすべて取り消す
///
/// 削除は行わず、貸出・予約・支払いの履歴はそのまま残る。
/// 書籍の全複本のロック（ID順）を取ってから書籍ロックを取る。
pub async fn retire_book(deps: &ServiceDependencies, cmd: RetireBook) -> Result<Book> {
    ensure_staff(deps, cmd.staff_id).await?;

    let mut copy_ids: Vec<CopyId> = deps
        .catalog
        .copies_of_book(cmd.book_id)
        .await
        .map_err(CirculationError::CatalogStoreError)?
        .into_iter()
        .map(|copy| copy.copy_id)
        .collect();
    copy_ids.sort();

    let mut copy_guards = Vec::with_capacity(copy_ids.len());
    for copy_id in &copy_ids {
        copy_guards.push(deps.locks.lock_copy(*copy_id).await);
    }
    let _book_guard = deps.locks.lock_book(cmd.book_id).await;

    let book = deps
        .catalog
        .get_book(cmd.book_id)
        .await
        .map_err(CirculationError::CatalogStoreError)?
        .ok_or(CirculationError::BookNotFound)?;

    let copies = deps
        .catalog
        .copies_of_book(cmd.book_id)
        .await
        .map_err(CirculationError::CatalogStoreError)?;

    let mut copies_on_loan = Vec::new();
    for copy in &copies {
        let open = deps
            .loans
            .find_open_for_copy(copy.copy_id)
            .await
            .map_err(CirculationError::LoanRepositoryError)?;
        if open.is_some() {
            copies_on_loan.push(copy.copy_id);
        }
    }

    let (retired, withdrawn, event) = domain::catalog::retire_book(
        &book,
        &copies,
        &copies_on_loan,
        cmd.staff_id,
        cmd.retired_at,
    )?;

    let reservations = deps
        .reservations
        .find_active_for_book(cmd.book_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;

    let mut events = vec![DomainEvent::BookRetired(event)];
    let mut cancelled = Vec::with_capacity(reservations.len());
    for reservation in &reservations {
        let (reservation, event) = domain::reservation::cancel(reservation, cmd.retired_at)?;
        cancelled.push(reservation);
        events.push(DomainEvent::ReservationCancelled(event));
    }

    commit(
        deps,
        ChangeSet {
            books: vec![retired.clone()],
            copies: withdrawn,
            reservations: cancelled,
            events,
            ..ChangeSet::new()
        },
    )
    .await?;

    tracing::info!(
        book_id = %retired.book_id,
        withdrawn_copies = copies.len(),
        cancelled_reservations = reservations.len(),
        "book retired"
    );

    Ok(retired)
}
