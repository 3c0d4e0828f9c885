use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use uuid::Uuid;

/// UUIDを包む識別子型を定義する
///
/// 識別子ごとに別の型にすることで、貸出IDと複本IDの取り違えを型で防ぐ。
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

define_id!(
    /// 貸出ID - 貸出台帳の集約ID
    LoanId
);
define_id!(
    /// 書籍ID - タイトル単位（予約はこの単位）
    BookId
);
define_id!(
    /// 複本ID - 物理的な1冊単位（貸出はこの単位）
    CopyId
);
define_id!(
    /// 会員ID
    MemberId
);
define_id!(
    /// 会員種別ID - 貸出ポリシーへの参照
    MemberTypeId
);
define_id!(
    /// 職員ID
    StaffId
);
define_id!(
    /// 予約ID
    ReservationId
);
define_id!(
    /// 延滞料金支払いID
    PaymentId
);

/// 金額エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// 負の金額は扱わない
    Negative(Decimal),
}

/// 金額
///
/// 不変条件：常に0以上。浮動小数点は使わず十進数で保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Self(amount.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// 日数を掛けた金額（日額 × 日数）
    pub fn times(self, days: u32) -> Self {
        Self((self.0 * Decimal::from(days)).normalize())
    }

    /// 差額（下限0）
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self((self.0 - other.0).normalize())
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Self((self.0 + rhs.0).normalize())
    }
}

impl Sub for Money {
    type Output = Money;

    /// 結果が負になる場合は0に丸める
    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl std::fmt::Display for MoneyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoneyError::Negative(amount) => write!(f, "amount must not be negative: {amount}"),
        }
    }
}

impl std::error::Error for MoneyError {}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// 延長回数
///
/// 上限は会員種別ではなく運用設定（`RenewalPolicy`）で決まるため、
/// ここでは単調増加だけを保証する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenewalCount(u32);

impl RenewalCount {
    /// 新規作成（0回）
    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_value(value: u32) -> Self {
        Self(value)
    }

    /// 延長回数を1増やす
    pub fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// 現在の回数
    pub fn value(&self) -> u32 {
        self.0
    }

    /// 上限に対してまだ延長できるか（上限なしは常に可）
    pub fn can_renew(&self, limit: Option<u32>) -> bool {
        limit.is_none_or(|limit| self.0 < limit)
    }
}
