use crate::domain::{Book, BookCopy, BookId, CopyId};
use crate::ports::catalog_store::{CatalogStore as CatalogStoreTrait, Result};
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};

use super::parse_column;

fn map_row_to_book(row: &PgRow) -> Result<Book> {
    Ok(Book {
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        title: row.try_get("title")?,
        is_retired: row.try_get("is_retired")?,
    })
}

fn map_row_to_copy(row: &PgRow) -> Result<BookCopy> {
    Ok(BookCopy {
        copy_id: CopyId::from_uuid(row.try_get("copy_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        is_available: row.try_get("is_available")?,
        condition: parse_column(row, "condition")?,
    })
}

pub(super) async fn upsert_book<'e, E>(executor: E, book: &Book) -> Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO books (book_id, title, is_retired)
        VALUES ($1, $2, $3)
        ON CONFLICT (book_id)
        DO UPDATE SET
            title = EXCLUDED.title,
            is_retired = EXCLUDED.is_retired
        "#,
    )
    .bind(book.book_id.value())
    .bind(&book.title)
    .bind(book.is_retired)
    .execute(executor)
    .await?;

    Ok(())
}

pub(super) async fn upsert_copy<'e, E>(executor: E, copy: &BookCopy) -> Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO book_copies (copy_id, book_id, is_available, condition)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (copy_id)
        DO UPDATE SET
            is_available = EXCLUDED.is_available,
            condition = EXCLUDED.condition
        "#,
    )
    .bind(copy.copy_id.value())
    .bind(copy.book_id.value())
    .bind(copy.is_available)
    .bind(copy.condition.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

/// CatalogStoreのPostgreSQL実装
///
/// 書籍・複本の登録は目録管理側の責務。ここでは貸出に必要な
/// 可否・状態・除籍フラグの更新だけを行う。
pub struct CatalogStore {
    pool: PgPool,
}

impl CatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStoreTrait for CatalogStore {
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query("SELECT book_id, title, is_retired FROM books WHERE book_id = $1")
            .bind(book_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn save_book(&self, book: Book) -> Result<()> {
        upsert_book(&self.pool, &book).await
    }

    async fn get_copy(&self, copy_id: CopyId) -> Result<Option<BookCopy>> {
        let row = sqlx::query(
            r#"
            SELECT copy_id, book_id, is_available, condition
            FROM book_copies
            WHERE copy_id = $1
            "#,
        )
        .bind(copy_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_copy).transpose()
    }

    async fn save_copy(&self, copy: BookCopy) -> Result<()> {
        upsert_copy(&self.pool, &copy).await
    }

    async fn copies_of_book(&self, book_id: BookId) -> Result<Vec<BookCopy>> {
        let rows = sqlx::query(
            r#"
            SELECT copy_id, book_id, is_available, condition
            FROM book_copies
            WHERE book_id = $1
            ORDER BY copy_id
            "#,
        )
        .bind(book_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_copy).collect()
    }
}
