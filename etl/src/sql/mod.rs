//! SQL rendering for the supported warehouse backends
//!
//! Redshift is the production target. The Postgres dialect renders the same
//! statements for local runs and integration tests.

mod dialect;
mod postgres_dialect;
mod redshift_dialect;

pub use dialect::{CalendarField, SqlDialect};
pub use postgres_dialect::PostgresDialect;
pub use redshift_dialect::RedshiftDialect;

use common::config::Backend;

/// Get the SQL dialect for a backend
pub fn dialect_for(backend: Backend) -> &'static dyn SqlDialect {
    match backend {
        Backend::Redshift => &RedshiftDialect,
        Backend::Postgres => &PostgresDialect,
    }
}

/// Render a value as a SQL string literal, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
