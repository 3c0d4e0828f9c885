//! Process configuration read from environment variables.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{CirculationPolicy, Money, RenewalPolicy};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/library";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the HTTP server, the database pool, the periodic sweeps
/// and the library-wide circulation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub database_max_connections: u32,
    /// Interval between overdue/reservation-expiry sweeps. Zero disables them.
    pub sweep_interval: Duration,
    pub policy: CirculationPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let database_max_connections =
            parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let sweep_interval = Duration::from_secs(parse_or(
            &lookup,
            "SWEEP_INTERVAL_SECS",
            DEFAULT_SWEEP_INTERVAL_SECS,
        )?);

        let fine_cap = parse_money(&lookup, "FINE_CAP")?;
        let max_unpaid_fine = parse_money(&lookup, "RENEWAL_MAX_UNPAID_FINE")?.unwrap_or_default();
        let max_renewals = parse_opt(&lookup, "RENEWAL_LIMIT")?;

        Ok(Self {
            database_url,
            port,
            database_max_connections,
            sweep_interval,
            policy: CirculationPolicy {
                fine_cap,
                renewal: RenewalPolicy {
                    max_unpaid_fine,
                    max_renewals,
                },
            },
        })
    }
}

fn parse_opt<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, name)?.unwrap_or(default))
}

fn parse_money<F>(lookup: &F, name: &'static str) -> Result<Option<Money>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(amount) = parse_opt::<F, Decimal>(lookup, name)? else {
        return Ok(None);
    };
    Money::new(amount)
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            name,
            value: amount.to_string(),
            reason: e.to_string(),
        })
}
