use crate::domain::{BookId, LoanId, MemberId, Reservation, ReservationId};
use crate::ports::Scan;
use crate::ports::reservation_repository::{
    ReservationRepository as ReservationRepositoryTrait, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{count_column, count_param, parse_column, scan_rows};

const RESERVATION_COLUMNS: &str = r#"
    reservation_id,
    member_id,
    book_id,
    reserved_at,
    expiry_date,
    priority_number,
    status,
    fulfilled_loan_id,
    updated_at
"#;

fn map_row_to_reservation(row: &PgRow) -> Result<Reservation> {
    let fulfilled_loan_id: Option<Uuid> = row.try_get("fulfilled_loan_id")?;

    Ok(Reservation {
        reservation_id: ReservationId::from_uuid(row.try_get("reservation_id")?),
        member_id: MemberId::from_uuid(row.try_get("member_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        reserved_at: row.try_get("reserved_at")?,
        expiry_date: row.try_get("expiry_date")?,
        priority_number: count_column(row, "priority_number")?,
        status: parse_column(row, "status")?,
        fulfilled_loan_id: fulfilled_loan_id.map(LoanId::from_uuid),
        updated_at: row.try_get("updated_at")?,
    })
}

pub(super) async fn upsert_reservation<'e, E>(
    executor: E,
    reservation: &Reservation,
) -> Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO reservations (
            reservation_id,
            member_id,
            book_id,
            reserved_at,
            expiry_date,
            priority_number,
            status,
            fulfilled_loan_id,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (reservation_id)
        DO UPDATE SET
            status = EXCLUDED.status,
            fulfilled_loan_id = EXCLUDED.fulfilled_loan_id,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(reservation.reservation_id.value())
    .bind(reservation.member_id.value())
    .bind(reservation.book_id.value())
    .bind(reservation.reserved_at)
    .bind(reservation.expiry_date)
    .bind(count_param(reservation.priority_number)?)
    .bind(reservation.status.as_str())
    .bind(reservation.fulfilled_loan_id.map(|id| id.value()))
    .bind(reservation.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// ReservationRepositoryのPostgreSQL実装
///
/// (member_id, book_id) のActiveな予約は部分ユニークインデックスで一意。
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationRepositoryTrait for ReservationRepository {
    async fn save(&self, reservation: Reservation) -> Result<()> {
        upsert_reservation(&self.pool, &reservation).await
    }

    async fn get_by_id(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE reservation_id = $1"
        ))
        .bind(reservation_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_reservation).transpose()
    }

    /// 書籍の待ち行列（優先番号・予約日時順）
    async fn find_active_for_book(&self, book_id: BookId) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE book_id = $1 AND status = 'active'
            ORDER BY priority_number ASC, reserved_at ASC
            "#
        ))
        .bind(book_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_reservation).collect()
    }

    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE member_id = $1
            ORDER BY reserved_at DESC
            "#
        ))
        .bind(member_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_reservation).collect()
    }

    /// 失効候補（有効期限を過ぎたActiveな予約）
    async fn find_expired_candidates(&self, cutoff: DateTime<Utc>) -> Result<Scan<Reservation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE status = 'active' AND expiry_date < $1
            ORDER BY expiry_date ASC
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(scan_rows(&rows, "reservation_id", map_row_to_reservation))
    }
}
