use crate::domain::{FinePayment, LoanId, PaymentId, StaffId};
use crate::ports::payment_repository::{PaymentRepository as PaymentRepositoryTrait, Result};
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};

use super::money_column;

fn map_row_to_payment(row: &PgRow) -> Result<FinePayment> {
    Ok(FinePayment {
        payment_id: PaymentId::from_uuid(row.try_get("payment_id")?),
        loan_id: LoanId::from_uuid(row.try_get("loan_id")?),
        amount: money_column(row, "amount")?,
        paid_at: row.try_get("paid_at")?,
        received_by: StaffId::from_uuid(row.try_get("received_by")?),
    })
}

pub(super) async fn insert_payment<'e, E>(executor: E, payment: &FinePayment) -> Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO fine_payments (payment_id, loan_id, amount, paid_at, received_by)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(payment.payment_id.value())
    .bind(payment.loan_id.value())
    .bind(payment.amount.value())
    .bind(payment.paid_at)
    .bind(payment.received_by.value())
    .execute(executor)
    .await?;

    Ok(())
}

/// PaymentRepositoryのPostgreSQL実装（追記のみ）
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepositoryTrait for PaymentRepository {
    async fn append(&self, payment: FinePayment) -> Result<()> {
        insert_payment(&self.pool, &payment).await
    }

    async fn find_by_loan_id(&self, loan_id: LoanId) -> Result<Vec<FinePayment>> {
        let rows = sqlx::query(
            r#"
            SELECT payment_id, loan_id, amount, paid_at, received_by
            FROM fine_payments
            WHERE loan_id = $1
            ORDER BY paid_at ASC
            "#,
        )
        .bind(loan_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_payment).collect()
    }
}
