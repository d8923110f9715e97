//! Errors - ストア層のエラー型
//!
//! バックエンドのエラー（制約違反・通信エラー）は `StoreError::Database` に
//! そのまま包んで返します。この層ではリトライしません。

use thiserror::Error;

use crate::domain::TerminalKind;

/// StoreError はストア層のエラー
#[derive(Debug, Error)]
pub enum StoreError {
    /// トランザクションの driver が key 取得戦略テーブルにない
    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    /// バックエンドが返したエラー（制約違反を含む）
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("column {column}: expected {expected}")]
    Decode {
        column: usize,
        expected: &'static str,
    },

    #[error("insert did not return a generated key")]
    MissingGeneratedKey,

    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("destination not found: {0}")]
    DestinationNotFound(String),

    #[error("unsupported source type: {0}")]
    UnsupportedSource(TerminalKind),

    #[error("terminal is in use by an egress policy: {0}")]
    TerminalInUse(String),
}
