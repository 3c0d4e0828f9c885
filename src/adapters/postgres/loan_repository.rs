use crate::domain::{
    BookId, CopyId, LoanId, LoanTransaction, MemberId, RenewalCount, StaffId,
};
use crate::ports::Scan;
use crate::ports::loan_repository::{LoanRepository as LoanRepositoryTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{count_column, count_param, money_column, parse_column, scan_rows};

const LOAN_COLUMNS: &str = r#"
    loan_id,
    member_id,
    copy_id,
    book_id,
    issued_by,
    received_by,
    loan_date,
    due_date,
    return_date,
    renewal_count,
    fine_amount,
    carried_fine,
    fine_paid,
    status,
    created_at,
    updated_at
"#;

/// PostgreSQLの行データをLoanTransactionに変換する
///
/// 状態文字列・金額・延長回数の変換に失敗した行はエラーとして返す。
fn map_row_to_loan(row: &PgRow) -> Result<LoanTransaction> {
    let received_by: Option<Uuid> = row.try_get("received_by")?;

    Ok(LoanTransaction {
        loan_id: LoanId::from_uuid(row.try_get("loan_id")?),
        member_id: MemberId::from_uuid(row.try_get("member_id")?),
        copy_id: CopyId::from_uuid(row.try_get("copy_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        issued_by: StaffId::from_uuid(row.try_get("issued_by")?),
        received_by: received_by.map(StaffId::from_uuid),
        loan_date: row.try_get("loan_date")?,
        due_date: row.try_get("due_date")?,
        return_date: row.try_get("return_date")?,
        renewal_count: RenewalCount::from_value(count_column(row, "renewal_count")?),
        fine_amount: money_column(row, "fine_amount")?,
        carried_fine: money_column(row, "carried_fine")?,
        fine_paid: money_column(row, "fine_paid")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// 貸出記録を保存（upsert）
///
/// 作成時の項目（会員・複本・貸出日時・貸出担当）は更新しない。
pub(super) async fn upsert_loan<'e, E>(executor: E, loan: &LoanTransaction) -> Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO loan_transactions (
            loan_id,
            member_id,
            copy_id,
            book_id,
            issued_by,
            received_by,
            loan_date,
            due_date,
            return_date,
            renewal_count,
            fine_amount,
            carried_fine,
            fine_paid,
            status,
            created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT (loan_id)
        DO UPDATE SET
            received_by = EXCLUDED.received_by,
            due_date = EXCLUDED.due_date,
            return_date = EXCLUDED.return_date,
            renewal_count = EXCLUDED.renewal_count,
            fine_amount = EXCLUDED.fine_amount,
            carried_fine = EXCLUDED.carried_fine,
            fine_paid = EXCLUDED.fine_paid,
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(loan.loan_id.value())
    .bind(loan.member_id.value())
    .bind(loan.copy_id.value())
    .bind(loan.book_id.value())
    .bind(loan.issued_by.value())
    .bind(loan.received_by.map(|s| s.value()))
    .bind(loan.loan_date)
    .bind(loan.due_date)
    .bind(loan.return_date)
    .bind(count_param(loan.renewal_count.value())?)
    .bind(loan.fine_amount.value())
    .bind(loan.carried_fine.value())
    .bind(loan.fine_paid.value())
    .bind(loan.status.as_str())
    .bind(loan.created_at)
    .bind(loan.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// LoanRepositoryのPostgreSQL実装
pub struct LoanRepository {
    pool: PgPool,
}

impl LoanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanRepositoryTrait for LoanRepository {
    async fn save(&self, loan: LoanTransaction) -> Result<()> {
        upsert_loan(&self.pool, &loan).await
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {LOAN_COLUMNS} FROM loan_transactions WHERE loan_id = $1"
        ))
        .bind(loan_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    /// 複本を占有している貸出（部分ユニークインデックスにより高々1件）
    async fn find_open_for_copy(&self, copy_id: CopyId) -> Result<Option<LoanTransaction>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {LOAN_COLUMNS}
            FROM loan_transactions
            WHERE copy_id = $1 AND status IN ('active', 'overdue')
            "#
        ))
        .bind(copy_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn count_open_for_member(&self, member_id: MemberId) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM loan_transactions
            WHERE member_id = $1 AND status IN ('active', 'overdue')
            "#,
        )
        .bind(member_id.value())
        .fetch_one(&self.pool)
        .await?;

        Ok(usize::try_from(count)?)
    }

    /// 会員の全貸出（貸出履歴、新しい順）
    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanTransaction>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {LOAN_COLUMNS}
            FROM loan_transactions
            WHERE member_id = $1
            ORDER BY loan_date DESC
            "#
        ))
        .bind(member_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }

    /// 延滞候補（返却期限を過ぎた貸出中・延滞中の貸出）
    async fn find_overdue_candidates(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Scan<LoanTransaction>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {LOAN_COLUMNS}
            FROM loan_transactions
            WHERE status IN ('active', 'overdue') AND due_date < $1
            ORDER BY due_date ASC
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(scan_rows(&rows, "loan_id", map_row_to_loan))
    }
}
