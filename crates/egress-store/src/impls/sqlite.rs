//! SqliteDatabase - sqlx の SQLite プール
//!
//! 外部キーを有効にして接続します（egress_policies → terminals の制約を効かせるため）。
//! in-memory DB は接続ごとに別の DB になるので、プールを 1 接続に固定します。

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite};
use tracing::debug;

use crate::domain::StoreError;
use crate::ports::{Database, ExecResult, SqlRow, SqlValue, Transaction};

pub const SQLITE_DRIVER: &str = "sqlite";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS terminals (
    guid TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS apps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    terminal_guid TEXT NOT NULL UNIQUE REFERENCES terminals (guid),
    app_guid TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS spaces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    terminal_guid TEXT NOT NULL UNIQUE REFERENCES terminals (guid),
    space_guid TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS ip_ranges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    terminal_guid TEXT NOT NULL REFERENCES terminals (guid),
    start_ip TEXT NOT NULL,
    end_ip TEXT NOT NULL,
    protocol TEXT NOT NULL CHECK (protocol IN ('tcp', 'udp', 'icmp')),
    start_port INTEGER NOT NULL DEFAULT 0,
    end_port INTEGER NOT NULL DEFAULT 0,
    icmp_type INTEGER NOT NULL DEFAULT 0,
    icmp_code INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS egress_policies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT NOT NULL UNIQUE,
    source_guid TEXT NOT NULL REFERENCES terminals (guid),
    destination_guid TEXT NOT NULL REFERENCES terminals (guid)
);

CREATE TABLE IF NOT EXISTS destination_metadatas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    terminal_guid TEXT NOT NULL UNIQUE REFERENCES terminals (guid),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
"#;

/// SqliteDatabase は SQLite の接続プール
#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// `sqlite://path/to/file.db` や `sqlite::memory:` に接続
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options.connect_with(options).await?;
        debug!(url, "connected to sqlite");
        Ok(Self { pool })
    }

    /// テスト・デモ用の in-memory DB
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn driver_name(&self) -> &str {
        SQLITE_DRIVER
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, StoreError> {
        let rows = bind_all(sqlx::query(sql), args)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }
}

/// SqliteTransaction は SQLite のトランザクション
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl Transaction for SqliteTransaction {
    fn driver_name(&self) -> &str {
        SQLITE_DRIVER
    }

    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult, StoreError> {
        let result = bind_all(sqlx::query(sql), args)
            .execute(&mut *self.tx)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, StoreError> {
        let rows = bind_all(sqlx::query(sql), args)
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
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    args.iter().fold(query, |query, arg| match arg {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Int(value) => query.bind(*value),
        SqlValue::Text(value) => query.bind(value.as_str()),
    })
}

// 列の宣言型ではなく値の型で判定する（COALESCE などの式列があるため）
fn decode_row(row: &SqliteRow) -> Result<SqlRow, StoreError> {
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
