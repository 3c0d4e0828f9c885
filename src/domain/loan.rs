use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    BookCopy, BookId, CheckoutError, CopyId, FineAccrued, FineSchedule, LoanBecameOverdue,
    LoanId, LoanInvariantError, LoanOpened, LoanRenewed, LoanReturned, LoanWrittenOff, Member,
    MemberId, MemberType, Money, RenewError, RenewalCount, RenewalPolicy, StaffId,
    TransitionError, check_eligibility, fine,
};

/// 貸出ステータス
///
/// Overdueは終端状態ではなく、返却期限を過ぎた貸出中の分類。
/// Overdueのままでも通常どおり返却できる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// 貸出中
    Active,
    /// 延滞中
    Overdue,
    /// 返却済み
    Returned,
    /// 紛失
    Lost,
    /// 破損
    Damaged,
}

impl LoanStatus {
    /// 文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::Lost => "lost",
            LoanStatus::Damaged => "damaged",
        }
    }

    /// 複本を占有している状態か（Active/Overdue）
    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            "lost" => Ok(LoanStatus::Lost),
            "damaged" => Ok(LoanStatus::Damaged),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

/// 貸出記録 - 1冊の複本の1回の貸出
///
/// 作成後は延長・返却・入金・延滞判定で更新されるが、削除はされない（監査証跡）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTransaction {
    // 識別子
    pub loan_id: LoanId,

    // 他の集約への参照（IDのみ）
    pub member_id: MemberId,
    pub copy_id: CopyId,
    pub book_id: BookId,

    // 担当職員
    pub issued_by: StaffId,
    pub received_by: Option<StaffId>,

    // 貸出管理の責務
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub renewal_count: RenewalCount,
    pub fine_amount: Money,
    /// 延長前の貸出期間で確定した延滞料金（延長のたびに繰り越す）
    pub carried_fine: Money,
    pub fine_paid: Money,
    pub status: LoanStatus,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanTransaction {
    /// 未払いの延滞料金
    pub fn outstanding_fine(&self) -> Money {
        self.fine_amount.saturating_sub(self.fine_paid)
    }

    /// 不変条件の検証
    ///
    /// 永続化層から読み込んだ行が壊れていないかを確かめる。
    pub fn validate(&self) -> Result<(), LoanInvariantError> {
        if self.due_date < self.loan_date {
            return Err(LoanInvariantError::DueBeforeLoanDate);
        }
        if let Some(returned) = self.return_date {
            if returned < self.loan_date {
                return Err(LoanInvariantError::ReturnBeforeLoanDate);
            }
            if self.status.is_open() {
                return Err(LoanInvariantError::ReturnDateOnOpenLoan);
            }
        }
        if self.fine_paid > self.fine_amount {
            return Err(LoanInvariantError::FinePaidExceedsFine);
        }
        if self.carried_fine > self.fine_amount {
            return Err(LoanInvariantError::CarriedFineExceedsFine);
        }
        Ok(())
    }
}

fn loan_period(member_type: &MemberType) -> Duration {
    Duration::days(i64::from(member_type.loan_duration_days))
}

/// 純粋関数：複本を貸し出す
///
/// ビジネスルール：
/// - 会員が有効・期限内で、貸出中の冊数が上限未満であること
/// - 複本が貸出可能で、他の貸出記録に占有されていないこと
/// - 返却期限は 貸出日時 + 会員種別の貸出期間
///
/// 副作用なし。新しい貸出記録とイベントを返す。
/// 複本の`is_available`を倒すのは呼び出し側の責務。
pub fn open_loan(
    member: &Member,
    member_type: &MemberType,
    open_loans: usize,
    copy: &BookCopy,
    copy_on_loan: bool,
    issued_by: StaffId,
    now: DateTime<Utc>,
) -> Result<(LoanTransaction, LoanOpened), CheckoutError> {
    check_eligibility(member, member_type, open_loans, now)?;

    if !copy.is_available || copy_on_loan {
        return Err(CheckoutError::CopyUnavailable);
    }

    let loan_id = LoanId::new();
    let due_date = now + loan_period(member_type);

    let loan = LoanTransaction {
        loan_id,
        member_id: member.member_id,
        copy_id: copy.copy_id,
        book_id: copy.book_id,
        issued_by,
        received_by: None,
        loan_date: now,
        due_date,
        return_date: None,
        renewal_count: RenewalCount::new(),
        fine_amount: Money::ZERO,
        carried_fine: Money::ZERO,
        fine_paid: Money::ZERO,
        status: LoanStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let event = LoanOpened {
        loan_id,
        copy_id: copy.copy_id,
        book_id: copy.book_id,
        member_id: member.member_id,
        loan_date: now,
        due_date,
        issued_by,
    };

    Ok((loan, event))
}

/// 純粋関数：貸出を延長する
///
/// ビジネスルール：
/// - Active/Overdueのみ延長可
/// - 同じ書籍に有効な予約があれば延長不可（予約が優先）
/// - `now`時点の未払い延滞料金が閾値を超えていれば延長不可
/// - 延長回数の上限（設定されていれば）
/// - 延長時：現在の返却期限 + 貸出期間
/// - `now`までに発生した延滞料金は繰越額として残り、新しい期限以降の延滞分が加算される
///
/// 延長後の期限が`now`以降になれば延滞状態は解除される。
pub fn renew(
    loan: &LoanTransaction,
    member_type: &MemberType,
    schedule: &FineSchedule,
    renewal_policy: &RenewalPolicy,
    reservation_pending: bool,
    now: DateTime<Utc>,
) -> Result<(LoanTransaction, LoanRenewed), RenewError> {
    if !loan.status.is_open() {
        return Err(RenewError::NotOpen(loan.status));
    }

    if reservation_pending {
        return Err(RenewError::ReservationPending);
    }

    let fine_amount = fine::assess(loan, schedule, now);
    let outstanding = fine_amount.saturating_sub(loan.fine_paid);
    if outstanding > renewal_policy.max_unpaid_fine {
        return Err(RenewError::UnpaidFine { outstanding });
    }

    if !loan.renewal_count.can_renew(renewal_policy.max_renewals) {
        return Err(RenewError::RenewalLimitReached {
            limit: renewal_policy.max_renewals.unwrap_or_default(),
        });
    }

    let old_due_date = loan.due_date;
    let new_due_date = old_due_date + loan_period(member_type);
    let renewal_count = loan.renewal_count.increment();
    let status = if new_due_date < now {
        LoanStatus::Overdue
    } else {
        LoanStatus::Active
    };

    let renewed = LoanTransaction {
        due_date: new_due_date,
        renewal_count,
        fine_amount,
        carried_fine: fine_amount,
        status,
        updated_at: now,
        ..loan.clone()
    };

    let event = LoanRenewed {
        loan_id: loan.loan_id,
        old_due_date,
        new_due_date,
        renewed_at: now,
        renewal_count: renewal_count.value(),
    };

    Ok((renewed, event))
}

/// 純粋関数：複本を返却する
///
/// ビジネスルール：
/// - Active/Overdueのみ返却可
/// - 延滞していても返却は受け付け、返却日時で延滞料金を確定する
///
/// 複本の`is_available`を戻すのと予約への割り当ては呼び出し側の責務。
pub fn return_copy(
    loan: &LoanTransaction,
    schedule: &FineSchedule,
    received_by: StaffId,
    now: DateTime<Utc>,
) -> Result<(LoanTransaction, LoanReturned), TransitionError> {
    if !loan.status.is_open() {
        return Err(TransitionError::InvalidState(loan.status));
    }

    let returned = LoanTransaction {
        return_date: Some(now),
        received_by: Some(received_by),
        status: LoanStatus::Returned,
        updated_at: now,
        ..loan.clone()
    };
    let fine_amount = fine::assess(&returned, schedule, now);
    let returned = LoanTransaction {
        fine_amount,
        ..returned
    };

    let event = LoanReturned {
        loan_id: loan.loan_id,
        copy_id: loan.copy_id,
        book_id: loan.book_id,
        member_id: loan.member_id,
        returned_at: now,
        received_by,
        was_overdue: loan.status == LoanStatus::Overdue || now > loan.due_date,
        fine_amount,
    };

    Ok((returned, event))
}

/// 純粋関数：紛失として貸出を終了する
///
/// 複本は貸出不可のまま残る（補充の判断は職員に委ねる）。
/// 延滞料金は最後に算定された額のまま。
pub fn mark_lost(
    loan: &LoanTransaction,
    reported_by: StaffId,
    now: DateTime<Utc>,
) -> Result<(LoanTransaction, LoanWrittenOff), TransitionError> {
    write_off(loan, LoanStatus::Lost, reported_by, now)
}

/// 純粋関数：破損として貸出を終了する
pub fn mark_damaged(
    loan: &LoanTransaction,
    reported_by: StaffId,
    now: DateTime<Utc>,
) -> Result<(LoanTransaction, LoanWrittenOff), TransitionError> {
    write_off(loan, LoanStatus::Damaged, reported_by, now)
}

fn write_off(
    loan: &LoanTransaction,
    status: LoanStatus,
    reported_by: StaffId,
    now: DateTime<Utc>,
) -> Result<(LoanTransaction, LoanWrittenOff), TransitionError> {
    if !loan.status.is_open() {
        return Err(TransitionError::InvalidState(loan.status));
    }

    let closed = LoanTransaction {
        status,
        received_by: Some(reported_by),
        updated_at: now,
        ..loan.clone()
    };

    let event = LoanWrittenOff {
        loan_id: loan.loan_id,
        copy_id: loan.copy_id,
        member_id: loan.member_id,
        status,
        reported_by,
        reported_at: now,
    };

    Ok((closed, event))
}

/// 延滞判定の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverdueAssessment {
    /// Active から Overdue へ遷移した
    BecameOverdue(LoanTransaction, LoanBecameOverdue),
    /// 既にOverdueで、延滞料金だけが変わった
    FineAccrued(LoanTransaction, FineAccrued),
}

/// 純粋関数：延滞判定と延滞料金の再計算
///
/// 定期バッチから呼ばれる。遷移は単調（Active→Overdue）で、
/// 同じ`now`で繰り返しても2回目以降は`None`を返す（冪等）。
/// 返却日時には触れない。
pub fn assess_overdue(
    loan: &LoanTransaction,
    schedule: &FineSchedule,
    now: DateTime<Utc>,
) -> Result<Option<OverdueAssessment>, TransitionError> {
    if !loan.status.is_open() {
        return Err(TransitionError::InvalidState(loan.status));
    }

    if !is_overdue(loan, now) {
        return Ok(None);
    }

    let fine_amount = fine::assess(loan, schedule, now);

    match loan.status {
        LoanStatus::Active => {
            let overdue = LoanTransaction {
                status: LoanStatus::Overdue,
                fine_amount,
                updated_at: now,
                ..loan.clone()
            };
            let event = LoanBecameOverdue {
                loan_id: loan.loan_id,
                copy_id: loan.copy_id,
                member_id: loan.member_id,
                due_date: loan.due_date,
                detected_at: now,
                fine_amount,
            };
            Ok(Some(OverdueAssessment::BecameOverdue(overdue, event)))
        }
        _ if fine_amount == loan.fine_amount => Ok(None),
        _ => {
            let accrued = LoanTransaction {
                fine_amount,
                updated_at: now,
                ..loan.clone()
            };
            let event = FineAccrued {
                loan_id: loan.loan_id,
                fine_amount,
                assessed_at: now,
            };
            Ok(Some(OverdueAssessment::FineAccrued(accrued, event)))
        }
    }
}

/// 純粋関数：延滞判定
pub fn is_overdue(loan: &LoanTransaction, now: DateTime<Utc>) -> bool {
    loan.status.is_open() && loan.due_date < now
}
