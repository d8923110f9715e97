//! テスト用の fake と fixture

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::StoreError;
use crate::impls::SqliteDatabase;
use crate::ports::{Database, ExecResult, SqlRow, SqlValue, Transaction};

/// スキーマ作成済みの in-memory SQLite
pub(crate) async fn migrated_db() -> Arc<SqliteDatabase> {
    let db = SqliteDatabase::in_memory().await.expect("connect");
    db.ensure_schema().await.expect("schema");
    Arc::new(db)
}

/// sqlx が返すエラーの代わり
pub(crate) fn backend_error(message: &str) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(message.to_string()))
}

/// `backend_error(message)` がそのまま返ってきたか
pub(crate) fn is_backend_error(err: &StoreError, message: &str) -> bool {
    matches!(err, StoreError::Database(sqlx::Error::Protocol(m)) if m == message)
}

/// 任意の driver 名を名乗り、発行された SQL を記録する Transaction
pub(crate) struct FakeTransaction {
    driver: String,
    failure: Option<String>,
    rows: Vec<SqlRow>,
    statements: Vec<String>,
}

impl FakeTransaction {
    pub(crate) fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            failure: None,
            rows: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// execute / query が常に `backend_error(message)` を返す
    pub(crate) fn failing(driver: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(driver)
        }
    }

    pub(crate) fn with_rows(mut self, rows: Vec<Vec<SqlValue>>) -> Self {
        self.rows = rows.into_iter().map(SqlRow::new).collect();
        self
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.statements.clone()
    }
}

#[async_trait]
impl Transaction for FakeTransaction {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn execute(&mut self, sql: &str, _args: &[SqlValue]) -> Result<ExecResult, StoreError> {
        self.statements.push(sql.to_string());
        match &self.failure {
            Some(message) => Err(backend_error(message)),
            None => Ok(ExecResult {
                rows_affected: 1,
                last_insert_id: Some(1),
            }),
        }
    }

    async fn query(&mut self, sql: &str, _args: &[SqlValue]) -> Result<Vec<SqlRow>, StoreError> {
        self.statements.push(sql.to_string());
        match &self.failure {
            Some(message) => Err(backend_error(message)),
            None => Ok(self.rows.clone()),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// query が常に失敗する Database
pub(crate) struct FailingDatabase {
    message: String,
}

impl FailingDatabase {
    pub(crate) fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Database for FailingDatabase {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(FakeTransaction::failing("sqlite", &self.message)))
    }

    async fn query(&self, _sql: &str, _args: &[SqlValue]) -> Result<Vec<SqlRow>, StoreError> {
        Err(backend_error(&self.message))
    }
}
