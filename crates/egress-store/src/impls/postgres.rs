//! PgDatabase - sqlx の PostgreSQL プール
//!
//! リポジトリの SQL は `?` で書かれているので、実行前に `$n` へ書き換えます。

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use tracing::debug;

use crate::domain::StoreError;
use crate::ports::database::rebind_dollar;
use crate::ports::{Database, ExecResult, SqlRow, SqlValue, Transaction};

pub const POSTGRES_DRIVER: &str = "postgres";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS terminals (
    guid VARCHAR(255) PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS apps (
    id BIGSERIAL PRIMARY KEY,
    terminal_guid VARCHAR(255) NOT NULL UNIQUE REFERENCES terminals (guid),
    app_guid VARCHAR(255) NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS spaces (
    id BIGSERIAL PRIMARY KEY,
    terminal_guid VARCHAR(255) NOT NULL UNIQUE REFERENCES terminals (guid),
    space_guid VARCHAR(255) NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS ip_ranges (
    id BIGSERIAL PRIMARY KEY,
    terminal_guid VARCHAR(255) NOT NULL REFERENCES terminals (guid),
    start_ip VARCHAR(255) NOT NULL,
    end_ip VARCHAR(255) NOT NULL,
    protocol VARCHAR(8) NOT NULL CHECK (protocol IN ('tcp', 'udp', 'icmp')),
    start_port BIGINT NOT NULL DEFAULT 0,
    end_port BIGINT NOT NULL DEFAULT 0,
    icmp_type BIGINT NOT NULL DEFAULT 0,
    icmp_code BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS egress_policies (
    id BIGSERIAL PRIMARY KEY,
    guid VARCHAR(255) NOT NULL UNIQUE,
    source_guid VARCHAR(255) NOT NULL REFERENCES terminals (guid),
    destination_guid VARCHAR(255) NOT NULL REFERENCES terminals (guid)
);

CREATE TABLE IF NOT EXISTS destination_metadatas (
    id BIGSERIAL PRIMARY KEY,
    terminal_guid VARCHAR(255) NOT NULL UNIQUE REFERENCES terminals (guid),
    name VARCHAR(255) NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
"#;

/// PgDatabase は PostgreSQL の接続プール
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().connect(url).await?;
        debug!("connected to postgres");
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    fn driver_name(&self) -> &str {
        POSTGRES_DRIVER
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, StoreError> {
        let sql = rebind_dollar(sql);
        let rows = bind_all(sqlx::query(&sql), args)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }
}

/// PgTransaction は PostgreSQL のトランザクション
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    fn driver_name(&self) -> &str {
        POSTGRES_DRIVER
    }

    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult, StoreError> {
        let sql = rebind_dollar(sql);
        let result = bind_all(sqlx::query(&sql), args)
            .execute(&mut *self.tx)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, StoreError> {
        let sql = rebind_dollar(sql);
        let rows = bind_all(sqlx::query(&sql), args)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn bind_all<'q>(
    query: Query<'q, Postgres, PgArguments>,
    args: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    args.iter().fold(query, |query, arg| match arg {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Int(value) => query.bind(*value),
        SqlValue::Text(value) => query.bind(value.as_str()),
    })
}

// 整数列は BIGINT / BIGSERIAL / COUNT(*) のみ（i64 で読める）
fn decode_row(row: &PgRow) -> Result<SqlRow, StoreError> {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
            values.push(value.map_or(SqlValue::Null, SqlValue::Int));
            continue;
        }
        let value = row.try_get::<Option<String>, _>(index)?;
        values.push(value.map_or(SqlValue::Null, SqlValue::Text));
    }
    Ok(SqlRow::new(values))
}
