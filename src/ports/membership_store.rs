use crate::domain::{Member, MemberId, MemberType, MemberTypeId, Staff, StaffId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 会員ストアポート
///
/// 会員管理コンテキストとの境界。貸出エンジンからは読み取り専用。
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>>;

    /// 会員種別（貸出ポリシー）を取得する
    async fn get_member_type(&self, member_type_id: MemberTypeId) -> Result<Option<MemberType>>;

    async fn get_staff(&self, staff_id: StaffId) -> Result<Option<Staff>>;
}
