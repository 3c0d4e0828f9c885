use chrono::{Duration, NaiveDate};
use rust_decimal_macros::dec;
use rusty_library_circulation::application::circulation::*;
use rusty_library_circulation::domain::commands::*;
use rusty_library_circulation::domain::*;
use rusty_library_circulation::ports::{
    CatalogStore, ChangeSet, EventStore, LoanRepository, MalformedRow, PaymentRepository,
    ReservationRepository, Scan, UnitOfWork,
};
use std::sync::Arc;

mod common;

use common::{Fixture, days, money, t0};

// ============================================================================
// テスト用ヘルパー
// ============================================================================

async fn checkout_at(
    fx: &Fixture,
    member_id: MemberId,
    copy_id: CopyId,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<LoanTransaction> {
    checkout(
        &fx.deps,
        Checkout {
            member_id,
            copy_id,
            staff_id: fx.staff_id,
            checked_out_at: at,
        },
    )
    .await
}

async fn return_at(
    fx: &Fixture,
    loan_id: LoanId,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<ReturnOutcome> {
    return_copy(
        &fx.deps,
        ReturnCopy {
            loan_id,
            staff_id: fx.staff_id,
            returned_at: at,
        },
    )
    .await
}

async fn reserve(
    fx: &Fixture,
    member_id: MemberId,
    book_id: BookId,
    priority_number: Option<u32>,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<Reservation> {
    place_reservation(
        &fx.deps,
        PlaceReservation {
            member_id,
            book_id,
            expiry_date: at + days(30),
            priority_number,
            reserved_at: at,
        },
    )
    .await
}

async fn pay(
    fx: &Fixture,
    loan_id: LoanId,
    amount: Money,
) -> Result<(LoanTransaction, FinePayment)> {
    apply_payment(
        &fx.deps,
        ApplyPayment {
            loan_id,
            amount,
            staff_id: fx.staff_id,
            paid_at: t0() + days(30),
        },
    )
    .await
}

async fn copy_of(fx: &Fixture, copy_id: CopyId) -> BookCopy {
    fx.catalog.get_copy(copy_id).await.unwrap().unwrap()
}

async fn reservation_of(fx: &Fixture, reservation_id: ReservationId) -> Reservation {
    fx.reservations
        .get_by_id(reservation_id)
        .await
        .unwrap()
        .unwrap()
}

/// 何も書き込めないストア（確定に必ず失敗する）
struct UnavailableStorage;

#[async_trait::async_trait]
impl UnitOfWork for UnavailableStorage {
    async fn commit(
        &self,
        _changes: ChangeSet,
    ) -> rusty_library_circulation::ports::unit_of_work::Result<()> {
        Err("storage unavailable".into())
    }
}

fn with_unavailable_storage(fx: &Fixture) -> ServiceDependencies {
    ServiceDependencies {
        unit_of_work: Arc::new(UnavailableStorage),
        ..fx.deps.clone()
    }
}

// ============================================================================
// TDD: 貸出のテスト
// ============================================================================

#[tokio::test]
async fn test_checkout_opens_active_loan() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (book_id, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();

    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.member_id, member_id);
    assert_eq!(loan.book_id, book_id);
    assert_eq!(loan.loan_date, t0());
    assert_eq!(loan.due_date, t0() + days(14));
    assert_eq!(loan.fine_amount, Money::ZERO);
    assert!(!copy_of(&fx, copy_id).await.is_available);

    let stored = fx.loans.get_by_id(loan.loan_id).await.unwrap();
    assert_eq!(stored, Some(loan.clone()));

    let events = fx.events.load(loan.loan_id.value()).await.unwrap();
    assert!(matches!(events.as_slice(), [DomainEvent::LoanOpened(_)]));
}

#[tokio::test]
async fn test_checkout_of_copy_on_loan_is_rejected() {
    let fx = Fixture::new();
    let first = fx.add_member();
    let second = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    checkout_at(&fx, first, copy_id, t0()).await.unwrap();
    let result = checkout_at(&fx, second, copy_id, t0() + days(1)).await;

    assert!(matches!(result, Err(CirculationError::CopyUnavailable)));
    assert_eq!(fx.loans.all().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_open_at_most_one_loan_per_copy() {
    let fx = Fixture::new();
    let (_, copy_id) = fx.add_book_with_copy();
    let members: Vec<MemberId> = (0..8).map(|_| fx.add_member()).collect();

    let mut handles = Vec::new();
    for member_id in members {
        let deps = fx.deps.clone();
        let staff_id = fx.staff_id;
        handles.push(tokio::spawn(async move {
            checkout(
                &deps,
                Checkout {
                    member_id,
                    copy_id,
                    staff_id,
                    checked_out_at: t0(),
                },
            )
            .await
        }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(CirculationError::CopyUnavailable) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(opened, 1);
    let open_loans = fx
        .loans
        .all()
        .unwrap()
        .into_iter()
        .filter(|l| l.copy_id == copy_id && l.status.is_open())
        .count();
    assert_eq!(open_loans, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_respect_member_loan_limit() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    for _ in 0..4 {
        let (_, copy_id) = fx.add_book_with_copy();
        checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let (_, copy_id) = fx.add_book_with_copy();
        let deps = fx.deps.clone();
        let staff_id = fx.staff_id;
        handles.push(tokio::spawn(async move {
            checkout(
                &deps,
                Checkout {
                    member_id,
                    copy_id,
                    staff_id,
                    checked_out_at: t0(),
                },
            )
            .await
        }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(CirculationError::PolicyViolation(PolicyViolation::LoanLimitReached { .. })) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(opened, 1);
    assert_eq!(fx.loans.count_open_for_member(member_id).await.unwrap(), 5);
}

#[tokio::test]
async fn test_sixth_checkout_exceeds_loan_limit() {
    let fx = Fixture::new();
    let member_id = fx.add_member();

    for _ in 0..5 {
        let (_, copy_id) = fx.add_book_with_copy();
        checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    }

    let (_, sixth) = fx.add_book_with_copy();
    let result = checkout_at(&fx, member_id, sixth, t0()).await;

    assert!(matches!(
        result,
        Err(CirculationError::PolicyViolation(
            PolicyViolation::LoanLimitReached {
                max_books_allowed: 5
            }
        ))
    ));
    assert!(copy_of(&fx, sixth).await.is_available);
}

#[tokio::test]
async fn test_inactive_or_expired_member_cannot_borrow() {
    let fx = Fixture::new();
    let (_, copy_id) = fx.add_book_with_copy();

    let inactive = fx.add_member_with(false, NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
    let result = checkout_at(&fx, inactive, copy_id, t0()).await;
    assert!(matches!(
        result,
        Err(CirculationError::PolicyViolation(PolicyViolation::MemberInactive))
    ));

    let expired = fx.add_member_with(true, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    let result = checkout_at(&fx, expired, copy_id, t0()).await;
    assert!(matches!(
        result,
        Err(CirculationError::PolicyViolation(
            PolicyViolation::MembershipExpired { .. }
        ))
    ));

    // 有効期限日の当日はまだ借りられる
    let last_day = fx.add_member_with(true, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
    assert!(checkout_at(&fx, last_day, copy_id, t0()).await.is_ok());
}

#[tokio::test]
async fn test_checkout_of_unknown_records_is_not_found() {
    let fx = Fixture::new();
    let member_id = fx.add_member();

    let result = checkout_at(&fx, member_id, CopyId::new(), t0()).await;
    assert!(matches!(result, Err(CirculationError::CopyNotFound)));

    let (_, copy_id) = fx.add_book_with_copy();
    let result = checkout_at(&fx, MemberId::new(), copy_id, t0()).await;
    assert!(matches!(result, Err(CirculationError::MemberNotFound)));

    let result = checkout(
        &fx.deps,
        Checkout {
            member_id,
            copy_id,
            staff_id: StaffId::new(),
            checked_out_at: t0(),
        },
    )
    .await;
    assert!(matches!(result, Err(CirculationError::StaffNotFound)));
}

// ============================================================================
// TDD: 返却と延滞料金のテスト
// ============================================================================

#[tokio::test]
async fn test_immediate_return_has_no_fine() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    let outcome = return_at(&fx, loan.loan_id, loan.loan_date).await.unwrap();

    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert_eq!(outcome.loan.return_date, Some(t0()));
    assert_eq!(outcome.loan.received_by, Some(fx.staff_id));
    assert_eq!(outcome.loan.fine_amount, Money::ZERO);
    assert!(outcome.offer.fulfilled.is_none());
    assert!(copy_of(&fx, copy_id).await.is_available);
}

#[tokio::test]
async fn test_late_return_charges_whole_days() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    // 3日と5時間の延滞 → 3日分
    let returned_at = loan.due_date + days(3) + Duration::hours(5);
    let outcome = return_at(&fx, loan.loan_id, returned_at).await.unwrap();

    assert_eq!(outcome.loan.fine_amount, money(dec!(1.50)));
    assert_eq!(outcome.loan.outstanding_fine(), money(dec!(1.50)));
}

#[tokio::test]
async fn test_fine_cap_limits_late_return() {
    let fx = Fixture::with_policy(CirculationPolicy {
        fine_cap: Some(money(dec!(5))),
        ..CirculationPolicy::default()
    });
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    let outcome = return_at(&fx, loan.loan_id, loan.due_date + days(60))
        .await
        .unwrap();

    assert_eq!(outcome.loan.fine_amount, money(dec!(5)));
}

#[tokio::test]
async fn test_returning_twice_is_invalid_state() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    return_at(&fx, loan.loan_id, t0() + days(1)).await.unwrap();

    let result = return_at(&fx, loan.loan_id, t0() + days(2)).await;
    assert!(matches!(result, Err(CirculationError::InvalidState(_))));
}

#[tokio::test]
async fn test_lost_copy_stays_unavailable() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    let lost = mark_lost(
        &fx.deps,
        ReportLoss {
            loan_id: loan.loan_id,
            staff_id: fx.staff_id,
            reported_at: t0() + days(20),
        },
    )
    .await
    .unwrap();

    assert_eq!(lost.status, LoanStatus::Lost);
    let copy = copy_of(&fx, copy_id).await;
    assert!(!copy.is_available);
    assert_eq!(copy.condition, CopyCondition::Lost);

    // 終端状態からは返却できない
    let result = return_at(&fx, loan.loan_id, t0() + days(21)).await;
    assert!(matches!(result, Err(CirculationError::InvalidState(_))));

    // 複本は再貸出できない
    let other = fx.add_member();
    let result = checkout_at(&fx, other, copy_id, t0() + days(21)).await;
    assert!(matches!(result, Err(CirculationError::CopyUnavailable)));
}

#[tokio::test]
async fn test_damaged_copy_is_flagged() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    let damaged = mark_damaged(
        &fx.deps,
        ReportLoss {
            loan_id: loan.loan_id,
            staff_id: fx.staff_id,
            reported_at: t0() + days(3),
        },
    )
    .await
    .unwrap();

    assert_eq!(damaged.status, LoanStatus::Damaged);
    assert_eq!(copy_of(&fx, copy_id).await.condition, CopyCondition::Damaged);
}

// ============================================================================
// TDD: 延長のテスト
// ============================================================================

#[tokio::test]
async fn test_renew_extends_due_date() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    let renewed = renew(
        &fx.deps,
        Renew {
            loan_id: loan.loan_id,
            renewed_at: t0() + days(10),
        },
    )
    .await
    .unwrap();

    assert_eq!(renewed.due_date, t0() + days(28));
    assert_eq!(renewed.renewal_count.value(), 1);
    assert_eq!(renewed.status, LoanStatus::Active);
}

#[tokio::test]
async fn test_renewal_blocked_by_pending_reservation() {
    let fx = Fixture::new();
    let borrower = fx.add_member();
    let waiting = fx.add_member();
    let (book_id, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, borrower, copy_id, t0()).await.unwrap();
    reserve(&fx, waiting, book_id, None, t0() + days(1))
        .await
        .unwrap();

    let result = renew(
        &fx.deps,
        Renew {
            loan_id: loan.loan_id,
            renewed_at: t0() + days(2),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(CirculationError::NotRenewable(RenewError::ReservationPending))
    ));
    let stored = fx.loans.get_by_id(loan.loan_id).await.unwrap().unwrap();
    assert_eq!(stored.due_date, loan.due_date);
}

#[tokio::test]
async fn test_renewal_blocked_by_unpaid_fine_until_paid() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    let late = loan.due_date + days(2);

    sweep_overdue(&fx.deps, late).await.unwrap();

    let result = renew(
        &fx.deps,
        Renew {
            loan_id: loan.loan_id,
            renewed_at: late,
        },
    )
    .await;
    assert!(matches!(
        result,
        Err(CirculationError::NotRenewable(RenewError::UnpaidFine { .. }))
    ));

    apply_payment(
        &fx.deps,
        ApplyPayment {
            loan_id: loan.loan_id,
            amount: money(dec!(1)),
            staff_id: fx.staff_id,
            paid_at: late,
        },
    )
    .await
    .unwrap();

    let renewed = renew(
        &fx.deps,
        Renew {
            loan_id: loan.loan_id,
            renewed_at: late,
        },
    )
    .await
    .unwrap();
    assert_eq!(renewed.status, LoanStatus::Active);
    assert_eq!(renewed.due_date, loan.due_date + days(14));
}

#[tokio::test]
async fn test_renewal_limit_is_enforced_when_configured() {
    let fx = Fixture::with_policy(CirculationPolicy {
        renewal: RenewalPolicy {
            max_renewals: Some(1),
            ..RenewalPolicy::default()
        },
        ..CirculationPolicy::default()
    });
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();
    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();

    let cmd = Renew {
        loan_id: loan.loan_id,
        renewed_at: t0() + days(1),
    };
    renew(&fx.deps, cmd.clone()).await.unwrap();
    let result = renew(&fx.deps, cmd).await;

    assert!(matches!(
        result,
        Err(CirculationError::NotRenewable(RenewError::RenewalLimitReached { limit: 1 }))
    ));
}

fn lenient_renewal_policy() -> CirculationPolicy {
    CirculationPolicy {
        renewal: RenewalPolicy {
            max_unpaid_fine: money(dec!(5)),
            max_renewals: None,
        },
        ..CirculationPolicy::default()
    }
}

#[tokio::test]
async fn test_renewal_within_fine_threshold_keeps_accrued_fine() {
    let fx = Fixture::with_policy(lenient_renewal_policy());
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    let late = loan.due_date + days(2);
    sweep_overdue(&fx.deps, late).await.unwrap();

    let renewed = renew(
        &fx.deps,
        Renew {
            loan_id: loan.loan_id,
            renewed_at: late,
        },
    )
    .await
    .unwrap();
    assert_eq!(renewed.status, LoanStatus::Active);
    assert_eq!(renewed.fine_amount, money(dec!(1)));

    // 新しい期限より前の返却でも、延長前に発生した延滞料金は残る
    let outcome = return_at(&fx, loan.loan_id, loan.due_date + days(3))
        .await
        .unwrap();
    assert_eq!(outcome.loan.fine_amount, money(dec!(1)));
    assert_eq!(outcome.loan.outstanding_fine(), money(dec!(1)));

    let stored = fx.loans.get_by_id(loan.loan_id).await.unwrap().unwrap();
    assert_eq!(stored.fine_amount, money(dec!(1)));
}

#[tokio::test]
async fn test_renewed_loan_accrues_on_top_of_carried_fine() {
    let fx = Fixture::with_policy(lenient_renewal_policy());
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    let renewed = renew(
        &fx.deps,
        Renew {
            loan_id: loan.loan_id,
            renewed_at: loan.due_date + days(2),
        },
    )
    .await
    .unwrap();
    assert_eq!(renewed.fine_amount, money(dec!(1)));

    // 新しい期限前のバッチは何も変えない
    let report = sweep_overdue(&fx.deps, loan.due_date + days(4)).await.unwrap();
    assert!(report.reclassified.is_empty());
    assert!(report.accrued.is_empty());
    let stored = fx.loans.get_by_id(loan.loan_id).await.unwrap().unwrap();
    assert_eq!(stored.fine_amount, money(dec!(1)));

    // 新しい期限を3日過ぎると、繰越分 1.00 + 3日分 1.50
    let late = renewed.due_date + days(3);
    let report = sweep_overdue(&fx.deps, late).await.unwrap();
    assert_eq!(report.reclassified, vec![loan.loan_id]);
    let stored = fx.loans.get_by_id(loan.loan_id).await.unwrap().unwrap();
    assert_eq!(stored.status, LoanStatus::Overdue);
    assert_eq!(stored.fine_amount, money(dec!(2.5)));

    pay(&fx, loan.loan_id, money(dec!(2.5))).await.unwrap();
    let outcome = return_at(&fx, loan.loan_id, late).await.unwrap();
    assert_eq!(outcome.loan.fine_amount, money(dec!(2.5)));
    assert_eq!(outcome.loan.outstanding_fine(), Money::ZERO);
}

// ============================================================================
// TDD: 延滞判定バッチのテスト
// ============================================================================

#[tokio::test]
async fn test_sweep_overdue_reclassifies_and_is_idempotent() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, late_copy) = fx.add_book_with_copy();
    let (_, fresh_copy) = fx.add_book_with_copy();

    let late = checkout_at(&fx, member_id, late_copy, t0()).await.unwrap();
    let fresh = checkout_at(&fx, member_id, fresh_copy, t0() + days(10))
        .await
        .unwrap();

    let now = t0() + days(18);
    let first = sweep_overdue(&fx.deps, now).await.unwrap();
    assert_eq!(first.reclassified, vec![late.loan_id]);
    assert!(first.skipped.is_empty());

    let after_first = fx.loans.get_by_id(late.loan_id).await.unwrap().unwrap();
    assert_eq!(after_first.status, LoanStatus::Overdue);
    assert_eq!(after_first.fine_amount, money(dec!(2.00)));
    assert_eq!(after_first.return_date, None);

    let second = sweep_overdue(&fx.deps, now).await.unwrap();
    assert!(second.reclassified.is_empty());
    assert!(second.accrued.is_empty());

    let after_second = fx.loans.get_by_id(late.loan_id).await.unwrap().unwrap();
    assert_eq!(after_second.status, after_first.status);
    assert_eq!(after_second.fine_amount, after_first.fine_amount);

    let untouched = fx.loans.get_by_id(fresh.loan_id).await.unwrap().unwrap();
    assert_eq!(untouched.status, LoanStatus::Active);

    // 日が進めば延滞料金だけが増える
    let later = sweep_overdue(&fx.deps, now + days(2)).await.unwrap();
    assert_eq!(later.accrued, vec![late.loan_id]);
    let accrued = fx.loans.get_by_id(late.loan_id).await.unwrap().unwrap();
    assert_eq!(accrued.fine_amount, money(dec!(3.00)));
}

#[tokio::test]
async fn test_sweep_skips_malformed_rows_and_continues() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();
    let good = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();

    // 返却期限が貸出日より前という壊れた行
    let (_, broken_copy) = fx.add_book_with_copy();
    let broken = LoanTransaction {
        loan_id: LoanId::new(),
        copy_id: broken_copy,
        loan_date: t0(),
        due_date: t0() - days(1),
        ..good.clone()
    };
    fx.loans.save(broken.clone()).await.unwrap();

    // 会員が消えた行
    let (_, orphan_copy) = fx.add_book_with_copy();
    let orphan = LoanTransaction {
        loan_id: LoanId::new(),
        copy_id: orphan_copy,
        member_id: MemberId::new(),
        ..good.clone()
    };
    fx.loans.save(orphan.clone()).await.unwrap();

    let report = sweep_overdue(&fx.deps, t0() + days(20)).await.unwrap();

    assert_eq!(report.reclassified, vec![good.loan_id]);
    let mut skipped: Vec<_> = report.skipped.iter().map(|s| s.id).collect();
    skipped.sort();
    let mut expected = vec![broken.loan_id.value(), orphan.loan_id.value()];
    expected.sort();
    assert_eq!(skipped, expected);
}

/// 延滞候補の検索で、読み込めない行を1件混ぜて返す貸出台帳
struct LedgerWithUnreadableRow {
    inner: Arc<rusty_library_circulation::adapters::memory::LoanRepository>,
    unreadable: uuid::Uuid,
}

type PortResult<T> = rusty_library_circulation::ports::loan_repository::Result<T>;

#[async_trait::async_trait]
impl LoanRepository for LedgerWithUnreadableRow {
    async fn save(&self, loan: LoanTransaction) -> PortResult<()> {
        self.inner.save(loan).await
    }

    async fn get_by_id(&self, loan_id: LoanId) -> PortResult<Option<LoanTransaction>> {
        self.inner.get_by_id(loan_id).await
    }

    async fn find_open_for_copy(&self, copy_id: CopyId) -> PortResult<Option<LoanTransaction>> {
        self.inner.find_open_for_copy(copy_id).await
    }

    async fn count_open_for_member(&self, member_id: MemberId) -> PortResult<usize> {
        self.inner.count_open_for_member(member_id).await
    }

    async fn find_by_member_id(&self, member_id: MemberId) -> PortResult<Vec<LoanTransaction>> {
        self.inner.find_by_member_id(member_id).await
    }

    async fn find_overdue_candidates(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> PortResult<Scan<LoanTransaction>> {
        let mut scan = self.inner.find_overdue_candidates(cutoff).await?;
        scan.malformed.push(MalformedRow {
            id: self.unreadable,
            reason: "status: unknown loan status: borrowed".to_string(),
        });
        Ok(scan)
    }
}

#[tokio::test]
async fn test_sweep_reports_unreadable_row_and_processes_the_rest() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();
    let good = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();

    let unreadable = uuid::Uuid::new_v4();
    let deps = ServiceDependencies {
        loans: Arc::new(LedgerWithUnreadableRow {
            inner: fx.loans.clone(),
            unreadable,
        }),
        ..fx.deps.clone()
    };

    let report = sweep_overdue(&deps, t0() + days(20)).await.unwrap();

    assert_eq!(report.reclassified, vec![good.loan_id]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, unreadable);
    assert!(report.skipped[0].reason.contains("unknown loan status"));
    let stored = fx.loans.get_by_id(good.loan_id).await.unwrap().unwrap();
    assert_eq!(stored.status, LoanStatus::Overdue);
}

#[tokio::test]
async fn test_overdue_loan_can_still_be_returned() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();
    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();

    sweep_overdue(&fx.deps, loan.due_date + days(1)).await.unwrap();
    let outcome = return_at(&fx, loan.loan_id, loan.due_date + days(4))
        .await
        .unwrap();

    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert_eq!(outcome.loan.fine_amount, money(dec!(2.00)));
}

// ============================================================================
// TDD: 予約待ち行列のテスト
// ============================================================================

#[tokio::test]
async fn test_return_offers_copy_to_highest_priority() {
    let fx = Fixture::new();
    let borrower = fx.add_member();
    let member_a = fx.add_member();
    let member_b = fx.add_member();
    let (book_id, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, borrower, copy_id, t0()).await.unwrap();
    let a = reserve(&fx, member_a, book_id, Some(2), t0() + days(1))
        .await
        .unwrap();
    let b = reserve(&fx, member_b, book_id, Some(1), t0() + days(2))
        .await
        .unwrap();

    let outcome = return_at(&fx, loan.loan_id, t0() + days(5)).await.unwrap();

    let (fulfilled, new_loan) = outcome.offer.fulfilled.expect("copy should be offered");
    assert_eq!(fulfilled.reservation_id, b.reservation_id);
    assert_eq!(fulfilled.status, ReservationStatus::Fulfilled);
    assert_eq!(fulfilled.fulfilled_loan_id, Some(new_loan.loan_id));
    assert_eq!(new_loan.member_id, member_b);
    assert_eq!(new_loan.copy_id, copy_id);
    assert!(!copy_of(&fx, copy_id).await.is_available);

    let a_after = reservation_of(&fx, a.reservation_id).await;
    assert_eq!(a_after.status, ReservationStatus::Active);
}

#[tokio::test]
async fn test_offer_skips_ineligible_member() {
    let fx = Fixture::new();
    let borrower = fx.add_member();
    let first = fx.add_member();
    let second = fx.add_member();
    let (book_id, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, borrower, copy_id, t0()).await.unwrap();
    let skipped = reserve(&fx, first, book_id, Some(1), t0()).await.unwrap();
    let served = reserve(&fx, second, book_id, Some(2), t0()).await.unwrap();

    fx.update_member(first, false);

    let outcome = return_at(&fx, loan.loan_id, t0() + days(3)).await.unwrap();

    assert_eq!(outcome.offer.skipped, vec![skipped.reservation_id]);
    let (fulfilled, new_loan) = outcome.offer.fulfilled.unwrap();
    assert_eq!(fulfilled.reservation_id, served.reservation_id);
    assert_eq!(new_loan.member_id, second);

    // 飛ばされた予約はActiveのまま残る
    let still_waiting = reservation_of(&fx, skipped.reservation_id).await;
    assert_eq!(still_waiting.status, ReservationStatus::Active);
}

#[tokio::test]
async fn test_offer_expires_stale_head() {
    let fx = Fixture::new();
    let borrower = fx.add_member();
    let stale_member = fx.add_member();
    let fresh_member = fx.add_member();
    let (book_id, copy_id) = fx.add_book_with_copy();

    let loan = checkout_at(&fx, borrower, copy_id, t0()).await.unwrap();
    let stale = place_reservation(
        &fx.deps,
        PlaceReservation {
            member_id: stale_member,
            book_id,
            expiry_date: t0() + days(2),
            priority_number: Some(1),
            reserved_at: t0(),
        },
    )
    .await
    .unwrap();
    let fresh = reserve(&fx, fresh_member, book_id, Some(2), t0())
        .await
        .unwrap();

    let outcome = return_at(&fx, loan.loan_id, t0() + days(5)).await.unwrap();

    assert_eq!(outcome.offer.expired, vec![stale.reservation_id]);
    assert_eq!(
        reservation_of(&fx, stale.reservation_id).await.status,
        ReservationStatus::Expired
    );
    let (fulfilled, _) = outcome.offer.fulfilled.unwrap();
    assert_eq!(fulfilled.reservation_id, fresh.reservation_id);
}

#[tokio::test]
async fn test_reservation_is_never_fulfilled_twice() {
    let fx = Fixture::new();
    let borrower = fx.add_member();
    let waiting = fx.add_member();
    let (book_id, first_copy) = fx.add_book_with_copy();
    let second_copy = fx.add_copy(book_id);

    let first_loan = checkout_at(&fx, borrower, first_copy, t0()).await.unwrap();
    let second_loan = checkout_at(&fx, borrower, second_copy, t0()).await.unwrap();
    reserve(&fx, waiting, book_id, None, t0()).await.unwrap();

    let first = return_at(&fx, first_loan.loan_id, t0() + days(1))
        .await
        .unwrap();
    assert!(first.offer.fulfilled.is_some());

    let second = return_at(&fx, second_loan.loan_id, t0() + days(2))
        .await
        .unwrap();
    assert!(second.offer.fulfilled.is_none());
    assert!(copy_of(&fx, second_copy).await.is_available);
}

#[tokio::test]
async fn test_duplicate_reservation_is_rejected() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let book_id = fx.add_book();

    let first = reserve(&fx, member_id, book_id, None, t0()).await.unwrap();
    let result = reserve(&fx, member_id, book_id, None, t0()).await;
    assert!(matches!(result, Err(CirculationError::DuplicateReservation)));

    // 取り消した後は再予約できる
    cancel_reservation(
        &fx.deps,
        CancelReservation {
            reservation_id: first.reservation_id,
            cancelled_at: t0() + days(1),
        },
    )
    .await
    .unwrap();
    let again = reserve(&fx, member_id, book_id, None, t0() + days(1))
        .await
        .unwrap();
    assert_eq!(again.status, ReservationStatus::Active);
}

#[tokio::test]
async fn test_default_priority_appends_to_queue() {
    let fx = Fixture::new();
    let book_id = fx.add_book();

    let first = reserve(&fx, fx.add_member(), book_id, None, t0())
        .await
        .unwrap();
    let second = reserve(&fx, fx.add_member(), book_id, None, t0())
        .await
        .unwrap();

    assert_eq!(first.priority_number, 1);
    assert_eq!(second.priority_number, 2);
}

#[tokio::test]
async fn test_cancel_requires_active_reservation() {
    let fx = Fixture::new();
    let reservation = reserve(&fx, fx.add_member(), fx.add_book(), None, t0())
        .await
        .unwrap();
    let cmd = CancelReservation {
        reservation_id: reservation.reservation_id,
        cancelled_at: t0(),
    };

    cancel_reservation(&fx.deps, cmd.clone()).await.unwrap();
    let result = cancel_reservation(&fx.deps, cmd).await;

    assert!(matches!(result, Err(CirculationError::InvalidState(_))));
}

#[tokio::test]
async fn test_expire_reservations_sweep() {
    let fx = Fixture::new();
    let book_id = fx.add_book();
    let expiring = reserve(&fx, fx.add_member(), book_id, None, t0())
        .await
        .unwrap();
    let later = reserve(&fx, fx.add_member(), book_id, None, t0() + days(20))
        .await
        .unwrap();

    let now = t0() + days(31);
    let report = expire_reservations(&fx.deps, now).await.unwrap();
    assert_eq!(report.expired, vec![expiring.reservation_id]);

    assert_eq!(
        reservation_of(&fx, expiring.reservation_id).await.status,
        ReservationStatus::Expired
    );
    assert_eq!(
        reservation_of(&fx, later.reservation_id).await.status,
        ReservationStatus::Active
    );

    let again = expire_reservations(&fx.deps, now).await.unwrap();
    assert!(again.expired.is_empty());
}

#[tokio::test]
async fn test_reservation_expiry_must_be_in_future() {
    let fx = Fixture::new();
    let result = place_reservation(
        &fx.deps,
        PlaceReservation {
            member_id: fx.add_member(),
            book_id: fx.add_book(),
            expiry_date: t0(),
            priority_number: None,
            reserved_at: t0(),
        },
    )
    .await;

    assert!(matches!(result, Err(CirculationError::InvalidRequest(_))));
}

// ============================================================================
// TDD: 延滞料金の支払いのテスト
// ============================================================================

#[tokio::test]
async fn test_payments_settle_fine() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();
    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    return_at(&fx, loan.loan_id, loan.due_date + days(4))
        .await
        .unwrap();

    let (after_first, _) = pay(&fx, loan.loan_id, money(dec!(1.25))).await.unwrap();
    assert_eq!(after_first.fine_paid, money(dec!(1.25)));

    let result = pay(&fx, loan.loan_id, money(dec!(1.00))).await;
    assert!(matches!(
        result,
        Err(CirculationError::OverPayment { outstanding }) if outstanding == money(dec!(0.75))
    ));

    let (settled, _) = pay(&fx, loan.loan_id, money(dec!(0.75))).await.unwrap();
    assert_eq!(settled.outstanding_fine(), Money::ZERO);

    let payments = fx.payments.find_by_loan_id(loan.loan_id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(
        payments_for_loan(&fx.deps, loan.loan_id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_zero_payment_is_rejected() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();
    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();

    let result = pay(&fx, loan.loan_id, Money::ZERO).await;
    assert!(matches!(result, Err(CirculationError::InvalidRequest(_))));
    assert!(fx.payments.find_by_loan_id(loan.loan_id).await.unwrap().is_empty());
}

// ============================================================================
// TDD: 除籍のテスト
// ============================================================================

#[tokio::test]
async fn test_retire_book_blocked_by_open_loan() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (book_id, copy_id) = fx.add_book_with_copy();
    checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();

    let result = retire_book(
        &fx.deps,
        RetireBook {
            book_id,
            staff_id: fx.staff_id,
            retired_at: t0() + days(1),
        },
    )
    .await;

    assert!(matches!(result, Err(CirculationError::InvalidState(_))));
    let book = fx.catalog.get_book(book_id).await.unwrap().unwrap();
    assert!(!book.is_retired);
}

#[tokio::test]
async fn test_retire_book_withdraws_copies_and_cancels_reservations() {
    let fx = Fixture::new();
    let (book_id, first_copy) = fx.add_book_with_copy();
    let second_copy = fx.add_copy(book_id);
    let reservation = reserve(&fx, fx.add_member(), book_id, None, t0())
        .await
        .unwrap();

    let retired = retire_book(
        &fx.deps,
        RetireBook {
            book_id,
            staff_id: fx.staff_id,
            retired_at: t0() + days(1),
        },
    )
    .await
    .unwrap();

    assert!(retired.is_retired);
    for copy_id in [first_copy, second_copy] {
        let copy = copy_of(&fx, copy_id).await;
        assert!(!copy.is_available);
        assert_eq!(copy.condition, CopyCondition::Withdrawn);
    }
    assert_eq!(
        reservation_of(&fx, reservation.reservation_id).await.status,
        ReservationStatus::Cancelled
    );

    // 除籍済みの書籍は予約できない
    let result = reserve(&fx, fx.add_member(), book_id, None, t0() + days(2)).await;
    assert!(matches!(result, Err(CirculationError::InvalidState(_))));

    let events = fx.events.load(book_id.value()).await.unwrap();
    assert!(matches!(events.as_slice(), [DomainEvent::BookRetired(_)]));
}

// ============================================================================
// TDD: 書き込みの原子性のテスト
// ============================================================================

#[tokio::test]
async fn test_failed_checkout_leaves_copy_available() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();
    let failing = with_unavailable_storage(&fx);

    let result = checkout(
        &failing,
        Checkout {
            member_id,
            copy_id,
            staff_id: fx.staff_id,
            checked_out_at: t0(),
        },
    )
    .await;

    assert!(matches!(result, Err(CirculationError::CommitError(_))));
    assert!(copy_of(&fx, copy_id).await.is_available);
    assert_eq!(fx.loans.count_open_for_member(member_id).await.unwrap(), 0);

    // 再試行は通常どおり成功する
    checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
}

#[tokio::test]
async fn test_failed_payment_records_nothing() {
    let fx = Fixture::new();
    let member_id = fx.add_member();
    let (_, copy_id) = fx.add_book_with_copy();
    let loan = checkout_at(&fx, member_id, copy_id, t0()).await.unwrap();
    return_at(&fx, loan.loan_id, loan.due_date + days(2))
        .await
        .unwrap();

    let result = apply_payment(
        &with_unavailable_storage(&fx),
        ApplyPayment {
            loan_id: loan.loan_id,
            amount: money(dec!(1)),
            staff_id: fx.staff_id,
            paid_at: t0() + days(30),
        },
    )
    .await;

    assert!(matches!(result, Err(CirculationError::CommitError(_))));
    assert!(
        fx.payments
            .find_by_loan_id(loan.loan_id)
            .await
            .unwrap()
            .is_empty()
    );
    let stored = fx.loans.get_by_id(loan.loan_id).await.unwrap().unwrap();
    assert_eq!(stored.fine_paid, Money::ZERO);

    // 再試行しても支払い合計は延滞料金を超えない
    pay(&fx, loan.loan_id, money(dec!(1))).await.unwrap();
    let result = pay(&fx, loan.loan_id, money(dec!(1))).await;
    assert!(matches!(result, Err(CirculationError::OverPayment { .. })));
    assert_eq!(
        fx.payments
            .find_by_loan_id(loan.loan_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_failed_return_keeps_loan_and_queue_untouched() {
    let fx = Fixture::new();
    let borrower = fx.add_member();
    let waiting = fx.add_member();
    let (book_id, copy_id) = fx.add_book_with_copy();
    let loan = checkout_at(&fx, borrower, copy_id, t0()).await.unwrap();
    let reservation = reserve(&fx, waiting, book_id, None, t0() + days(1))
        .await
        .unwrap();

    let result = return_copy(
        &with_unavailable_storage(&fx),
        ReturnCopy {
            loan_id: loan.loan_id,
            staff_id: fx.staff_id,
            returned_at: t0() + days(5),
        },
    )
    .await;

    assert!(matches!(result, Err(CirculationError::CommitError(_))));
    let stored = fx.loans.get_by_id(loan.loan_id).await.unwrap().unwrap();
    assert_eq!(stored.status, LoanStatus::Active);
    assert!(!copy_of(&fx, copy_id).await.is_available);
    assert_eq!(
        reservation_of(&fx, reservation.reservation_id).await.status,
        ReservationStatus::Active
    );

    // 返却と予約への割り当ては一緒に確定する
    let outcome = return_at(&fx, loan.loan_id, t0() + days(5))
        .await
        .unwrap();
    let (fulfilled, new_loan) = outcome.offer.fulfilled.unwrap();
    assert_eq!(fulfilled.reservation_id, reservation.reservation_id);
    assert_eq!(new_loan.member_id, waiting);
    assert!(!copy_of(&fx, copy_id).await.is_available);
}
