use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{MemberId, MemberTypeId, Money, StaffId};

/// 会員種別（貸出ポリシー）
///
/// 会員からは参照されるだけで、貸出エンジンが書き換えることはない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberType {
    pub member_type_id: MemberTypeId,
    pub name: String,
    pub max_books_allowed: u32,
    pub loan_duration_days: u32,
    pub fine_per_day: Money,
    pub membership_fee: Money,
}

/// 会員
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    pub member_type_id: MemberTypeId,
    pub is_active: bool,
    pub expiry_date: NaiveDate,
}

/// 職員（貸出・返却・入金の担当者）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub staff_id: StaffId,
    pub name: String,
}

/// 貸出資格がない理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PolicyViolation {
    /// 会員が無効化されている
    MemberInactive,
    /// 会員資格の有効期限切れ
    MembershipExpired { expiry_date: NaiveDate },
    /// 貸出中の冊数が上限に達している
    LoanLimitReached { max_books_allowed: u32 },
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyViolation::MemberInactive => write!(f, "member is inactive"),
            PolicyViolation::MembershipExpired { expiry_date } => {
                write!(f, "membership expired on {expiry_date}")
            }
            PolicyViolation::LoanLimitReached { max_books_allowed } => {
                write!(f, "loan limit reached (max {max_books_allowed} books)")
            }
        }
    }
}

/// 純粋関数：会員が新たに1冊借りられるか判定する
///
/// ビジネスルール：
/// - 会員が有効であること
/// - 有効期限が当日以降であること（期限日当日は貸出可）
/// - 貸出中（Active/Overdue）の冊数が上限未満であること
pub fn check_eligibility(
    member: &Member,
    member_type: &MemberType,
    open_loans: usize,
    now: DateTime<Utc>,
) -> Result<(), PolicyViolation> {
    if !member.is_active {
        return Err(PolicyViolation::MemberInactive);
    }

    if member.expiry_date < now.date_naive() {
        return Err(PolicyViolation::MembershipExpired {
            expiry_date: member.expiry_date,
        });
    }

    let limit = usize::try_from(member_type.max_books_allowed).unwrap_or(usize::MAX);
    if open_loans >= limit {
        return Err(PolicyViolation::LoanLimitReached {
            max_books_allowed: member_type.max_books_allowed,
        });
    }

    Ok(())
}
