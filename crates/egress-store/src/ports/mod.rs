//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（SQLite, PostgreSQL）や非決定的な値（時刻・ID）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - リポジトリはトランザクションを開始・コミットしない（呼び出し側の責務）
//! - ID 生成は注入する（テストでは決定的な連番を使う）

pub mod clock;
pub mod database;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::database::{Database, ExecResult, SqlRow, SqlValue, Transaction};
pub use self::id_generator::{GuidGenerator, SequentialGuidGenerator, UlidGuidGenerator};
