use serde::{Deserialize, Serialize};

use super::{FineSchedule, MemberType, Money};

/// 延長の運用ルール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalPolicy {
    /// 延長を許す未払い延滞料金の上限（これを超えると延長不可）
    pub max_unpaid_fine: Money,
    /// 延長回数の上限（Noneは無制限）
    pub max_renewals: Option<u32>,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            max_unpaid_fine: Money::ZERO,
            max_renewals: None,
        }
    }
}

/// 図書館全体で共通の貸出ルール
///
/// 会員種別ごとのルール（冊数・期間・日額）は`MemberType`が持つ。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CirculationPolicy {
    /// 1件の貸出に課す延滞料金の上限（Noneは上限なし）
    pub fine_cap: Option<Money>,
    pub renewal: RenewalPolicy,
}

impl CirculationPolicy {
    /// 会員種別の日額と全体の上限から料金表を作る
    pub fn fine_schedule(&self, member_type: &MemberType) -> FineSchedule {
        FineSchedule {
            fine_per_day: member_type.fine_per_day,
            cap: self.fine_cap,
        }
    }
}
