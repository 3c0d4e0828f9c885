use crate::domain::{Member, MemberId, MemberType, MemberTypeId, Staff, StaffId};
use crate::ports::membership_store::{MembershipStore as MembershipStoreTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{count_column, money_column};

/// MembershipStoreのPostgreSQL実装（読み取り専用）
pub struct MembershipStore {
    pool: PgPool,
}

impl MembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStoreTrait for MembershipStore {
    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>> {
        let row = sqlx::query(
            r#"
            SELECT member_id, member_type_id, is_active, expiry_date
            FROM members
            WHERE member_id = $1
            "#,
        )
        .bind(member_id.value())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Member {
            member_id: MemberId::from_uuid(row.try_get("member_id")?),
            member_type_id: MemberTypeId::from_uuid(row.try_get("member_type_id")?),
            is_active: row.try_get("is_active")?,
            expiry_date: row.try_get("expiry_date")?,
        }))
    }

    async fn get_member_type(&self, member_type_id: MemberTypeId) -> Result<Option<MemberType>> {
        let row = sqlx::query(
            r#"
            SELECT
                member_type_id,
                name,
                max_books_allowed,
                loan_duration_days,
                fine_per_day,
                membership_fee
            FROM member_types
            WHERE member_type_id = $1
            "#,
        )
        .bind(member_type_id.value())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(MemberType {
            member_type_id: MemberTypeId::from_uuid(row.try_get("member_type_id")?),
            name: row.try_get("name")?,
            max_books_allowed: count_column(&row, "max_books_allowed")?,
            loan_duration_days: count_column(&row, "loan_duration_days")?,
            fine_per_day: money_column(&row, "fine_per_day")?,
            membership_fee: money_column(&row, "membership_fee")?,
        }))
    }

    async fn get_staff(&self, staff_id: StaffId) -> Result<Option<Staff>> {
        let row = sqlx::query("SELECT staff_id, name FROM staff WHERE staff_id = $1")
            .bind(staff_id.value())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Staff {
            staff_id: StaffId::from_uuid(row.try_get("staff_id")?),
            name: row.try_get("name")?,
        }))
    }
}
