//! Warehouse connection seam
//!
//! The driver only talks to the warehouse through [`Warehouse`], which keeps
//! the commit discipline testable without a live cluster.

mod postgres;

pub use postgres::PgWarehouse;

use crate::models::Table;
use async_trait::async_trait;
use common::Result;
use serde_json::Value;

#[async_trait]
pub trait Warehouse: Send {
    /// Executes one statement and returns the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Inserts records keyed by lower-cased column name.
    async fn insert_records(&mut self, table: Table, records: &[Value]) -> Result<u64>;

    async fn count_rows(&mut self, table: Table) -> Result<i64>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    async fn close(self) -> Result<()>
    where
        Self: Sized;
}
