//! Repository - テーブル単位のリポジトリ
//!
//! すべての操作は呼び出し側が渡す `&mut dyn Transaction` の中で実行します。
//! ここではトランザクションを開始・コミットしません。
//!
//! # 構成
//! - **TerminalsTable**: 共通 identity（terminals）
//! - **AppsTable / SpacesTable / IpRangesTable**: terminal に属性を付ける具象テーブル
//! - **DestinationMetadataTable**: destination の name / description（後から追加されたテーブル）
//! - **EgressPolicyTable**: source → destination のリンクと、その読み出し
//! - **EgressDestinationTable**: destination の読み出し
//! - **driver**: 自動採番 key の取得方法（driver ごとの戦略テーブル）

pub mod bindings;
pub mod destination_metadata;
pub mod driver;
pub mod egress_destination;
pub mod egress_policy;
mod hydrate;
pub mod terminals;

// 主要な型を再エクスポート
pub use self::bindings::{AppsTable, IpRangesTable, NewIpRange, SpacesTable, find_kind};
pub use self::destination_metadata::DestinationMetadataTable;
pub use self::driver::KeyRetrieval;
pub use self::egress_destination::EgressDestinationTable;
pub use self::egress_policy::EgressPolicyTable;
pub use self::terminals::TerminalsTable;
