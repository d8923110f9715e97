//! egress-store
//!
//! Egress policy の永続化コア。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（EgressPolicy, EgressSource, EgressDestination, TerminalKind, errors）
//! - **ports**: 抽象化レイヤー（Database, Transaction, GuidGenerator, Clock）
//! - **impls**: ports の実装（SQLite, PostgreSQL）
//! - **repository**: テーブル単位のリポジトリ（terminals, apps, spaces, ip_ranges, egress_policies, destination_metadatas）
//! - **app**: リポジトリを 1 トランザクション内で組み合わせる store と builder
//! - **config**: 接続設定（TOML）

pub mod domain;
pub mod ports;
pub mod impls;
pub mod repository;
pub mod app;
pub mod config;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{EgressDestinationStore, EgressPolicyStore, EgressStores, StoreBuilder};
pub use domain::{
    EgressDestination, EgressPolicy, EgressSource, IpRange, NewEgressPolicy, Ports, Protocol,
    StoreError, TerminalKind,
};
