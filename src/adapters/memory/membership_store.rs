use crate::domain::{Member, MemberId, MemberType, MemberTypeId, Staff, StaffId};
use crate::ports::membership_store::{MembershipStore as MembershipStoreTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::guard;

/// In-memory implementation of MembershipStore
///
/// Supports stateful testing: member types, members and staff are
/// registered up front, and members can be updated between operations.
#[derive(Default)]
pub struct MembershipStore {
    member_types: Mutex<HashMap<MemberTypeId, MemberType>>,
    members: Mutex<HashMap<MemberId, Member>>,
    staff: Mutex<HashMap<StaffId, Staff>>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member_type(&self, member_type: MemberType) -> Result<()> {
        guard(&self.member_types)?.insert(member_type.member_type_id, member_type);
        Ok(())
    }

    /// Insert or replace a member
    pub fn add_member(&self, member: Member) -> Result<()> {
        guard(&self.members)?.insert(member.member_id, member);
        Ok(())
    }

    pub fn add_staff(&self, staff: Staff) -> Result<()> {
        guard(&self.staff)?.insert(staff.staff_id, staff);
        Ok(())
    }
}

#[async_trait]
impl MembershipStoreTrait for MembershipStore {
    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>> {
        Ok(guard(&self.members)?.get(&member_id).cloned())
    }

    async fn get_member_type(&self, member_type_id: MemberTypeId) -> Result<Option<MemberType>> {
        Ok(guard(&self.member_types)?.get(&member_type_id).cloned())
    }

    async fn get_staff(&self, staff_id: StaffId) -> Result<Option<Staff>> {
        Ok(guard(&self.staff)?.get(&staff_id).cloned())
    }
}
