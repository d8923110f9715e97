//! Database port - SQL バックエンドの抽象化
//!
//! リポジトリは `Transaction` に対して SQL を発行するだけで、
//! トランザクションの開始・コミット・ロールバックは store（app 層）が行います。
//!
//! # 規約
//! - SQL のプレースホルダは `?` で書く（PostgreSQL 実装が `$n` に書き換える）
//! - 行は `SqlValue` の列として返す（整数は i64、文字列は String）
//! - `driver_name()` は key 取得戦略の選択に使う（"sqlite" / "postgres"）

use async_trait::async_trait;

use crate::domain::StoreError;

/// バインド引数・結果列の値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// 結果の 1 行
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlRow {
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn int(&self, column: usize) -> Result<i64, StoreError> {
        match self.values.get(column) {
            Some(SqlValue::Int(value)) => Ok(*value),
            _ => Err(StoreError::Decode {
                column,
                expected: "integer",
            }),
        }
    }

    pub fn text(&self, column: usize) -> Result<String, StoreError> {
        match self.values.get(column) {
            Some(SqlValue::Text(value)) => Ok(value.clone()),
            _ => Err(StoreError::Decode {
                column,
                expected: "text",
            }),
        }
    }

    /// NULL を許す整数列（LEFT JOIN 側）
    pub fn opt_int(&self, column: usize) -> Result<Option<i64>, StoreError> {
        match self.values.get(column) {
            Some(SqlValue::Null) => Ok(None),
            _ => self.int(column).map(Some),
        }
    }

    /// NULL を許す文字列列（LEFT JOIN 側）
    pub fn opt_text(&self, column: usize) -> Result<Option<String>, StoreError> {
        match self.values.get(column) {
            Some(SqlValue::Null) => Ok(None),
            _ => self.text(column).map(Some),
        }
    }
}

/// execute の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// バックエンドが自動採番した id（取得できる driver のみ）
    pub last_insert_id: Option<i64>,
}

/// Transaction は呼び出し側が所有するトランザクション
///
/// # 設計原則
/// - リポジトリは `&mut dyn Transaction` を受け取り、commit / rollback はしない
/// - drop されたトランザクションはロールバックされる
#[async_trait]
pub trait Transaction: Send {
    /// バックエンドの driver 名
    fn driver_name(&self) -> &str;

    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult, StoreError>;

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Database は接続プール
///
/// トランザクションを開始するほか、読み取り専用の一覧取得
/// （`get_all_policies` など）はプールに直接問い合わせます。
#[async_trait]
pub trait Database: Send + Sync {
    fn driver_name(&self) -> &str;

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, StoreError>;
}

/// `?` プレースホルダを `$1, $2, ...` に書き換える（PostgreSQL 用）
pub fn rebind_dollar(sql: &str) -> String {
    let mut rebound = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    for ch in sql.chars() {
        if ch == '?' {
            index += 1;
            rebound.push('$');
            rebound.push_str(&index.to_string());
        } else {
            rebound.push(ch);
        }
    }
    rebound
}

/// `IN (...)` 用に `?, ?, ?` を作る
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
