//! Warehouse connection over the Postgres wire protocol (Redshift or Postgres)

use super::Warehouse;
use crate::models::Table;
use async_trait::async_trait;
use common::config::ClusterConfig;
use common::{Error, Result};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::types::Json;
use sqlx::{ConnectOptions, Connection, Executor};

/// Rows per INSERT when records are loaded by the client.
const INSERT_BATCH_SIZE: usize = 500;

pub struct PgWarehouse {
    conn: PgConnection,
}

impl PgWarehouse {
    /// Open the single connection a run uses.
    pub async fn connect(cluster: &ClusterConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&cluster.host)
            .port(cluster.db_port)
            .database(&cluster.db_name)
            .username(&cluster.db_user)
            .password(&cluster.db_password);

        let warehouse = Self::connect_with(&options).await?;

        tracing::info!(
            host = %cluster.host,
            port = cluster.db_port,
            database = %cluster.db_name,
            "Connected to warehouse"
        );
        Ok(warehouse)
    }

    pub async fn connect_with(options: &PgConnectOptions) -> Result<Self> {
        let conn = options.connect().await.map_err(Error::Connection)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        // No bind arguments, so this goes out as a simple query: COPY and DDL
        // are not preparable on Redshift.
        let result = (&mut self.conn).execute(sql).await?;
        Ok(result.rows_affected())
    }

    async fn insert_records(&mut self, table: Table, records: &[Value]) -> Result<u64> {
        let sql = format!(
            "INSERT INTO {table} SELECT * FROM jsonb_populate_recordset(NULL::{table}, $1)",
            table = table.name()
        );

        let mut inserted = 0;
        for batch in records.chunks(INSERT_BATCH_SIZE) {
            let result = sqlx::query(&sql)
                .bind(Json(batch))
                .execute(&mut self.conn)
                .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn count_rows(&mut self, table: Table) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut self.conn).await?;
        Ok(count)
    }

    async fn begin(&mut self) -> Result<()> {
        self.execute("BEGIN").await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT").await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK").await.map(|_| ())
    }

    async fn close(self) -> Result<()> {
        self.conn.close().await?;
        tracing::info!("Warehouse connection closed");
        Ok(())
    }
}
