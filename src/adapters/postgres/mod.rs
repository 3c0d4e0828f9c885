//! PostgreSQL adapters.
//!
//! Runtime-checked `sqlx` queries against the schema in `migrations/`.
//! Enum-like columns are stored as lowercase strings and parsed back into
//! domain enums at this boundary; money columns are `NUMERIC`.

pub mod catalog_store;
pub mod event_store;
pub mod loan_repository;
pub mod membership_store;
pub mod payment_repository;
pub mod reservation_repository;
pub mod unit_of_work;

// パブリックに型を再エクスポート
pub use catalog_store::CatalogStore as PostgresCatalogStore;
pub use event_store::EventStore as PostgresEventStore;
pub use loan_repository::LoanRepository as PostgresLoanRepository;
pub use membership_store::MembershipStore as PostgresMembershipStore;
pub use payment_repository::PaymentRepository as PostgresPaymentRepository;
pub use reservation_repository::ReservationRepository as PostgresReservationRepository;
pub use unit_of_work::UnitOfWork as PostgresUnitOfWork;

use crate::domain::Money;
use crate::ports::{MalformedRow, Scan};
use rust_decimal::Decimal;
use sqlx::{Row, postgres::PgRow};
use std::str::FromStr;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn invalid_data(message: String) -> BoxError {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// Parse a lowercase status/condition column into its domain enum.
fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, BoxError>
where
    T: FromStr<Err = String>,
{
    let value: &str = row.try_get(column)?;
    T::from_str(value).map_err(invalid_data)
}

/// Read a `NUMERIC` column as non-negative money.
fn money_column(row: &PgRow, column: &str) -> Result<Money, BoxError> {
    let value: Decimal = row.try_get(column)?;
    Money::new(value).map_err(|e| invalid_data(format!("{column}: {e}")))
}

/// Read an `INTEGER` column that must fit in a `u32`.
fn count_column(row: &PgRow, column: &str) -> Result<u32, BoxError> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| invalid_data(format!("{column} out of range: {value}")))
}

fn count_param(value: u32) -> Result<i32, BoxError> {
    i32::try_from(value).map_err(|_| invalid_data(format!("value out of range: {value}")))
}

/// Decode rows one by one, setting aside rows that fail to decode.
///
/// Batch sweeps use this so that one bad row does not abort the whole run.
fn scan_rows<T>(
    rows: &[PgRow],
    id_column: &str,
    map_row: fn(&PgRow) -> Result<T, BoxError>,
) -> Scan<T> {
    let mut scan = Scan::default();
    for row in rows {
        match map_row(row) {
            Ok(value) => scan.rows.push(value),
            Err(err) => scan.malformed.push(MalformedRow {
                id: row.try_get::<Uuid, _>(id_column).unwrap_or_default(),
                reason: err.to_string(),
            }),
        }
    }
    scan
}
