//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqliteDatabase**: 開発・テスト用（`sqlite::memory:` も可）
//! - **PgDatabase**: 本番用
//!
//! どちらも sqlx のプールを包み、`Database` / `Transaction` port を実装します。

pub mod postgres;
pub mod sqlite;

// 主要な型を再エクスポート
pub use self::postgres::{POSTGRES_DRIVER, PgDatabase, PgTransaction};
pub use self::sqlite::{SQLITE_DRIVER, SqliteDatabase, SqliteTransaction};
