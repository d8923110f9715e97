//! StoreBuilder - store の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 共有する GuidGenerator / TerminalsTable を 1 か所で組み立てる

use std::sync::Arc;

use crate::app::{EgressDestinationStore, EgressPolicyStore};
use crate::ports::{Database, GuidGenerator, SystemClock, UlidGuidGenerator};
use crate::repository::driver::ensure_supported;
use crate::repository::{EgressPolicyTable, KeyRetrieval, TerminalsTable};

/// StoreBuilder は 2 つの store を構築
///
/// # 使用例
/// ```ignore
/// let stores = StoreBuilder::new()
///     .database(db)
///     .build()?;
/// stores.destinations.create(&[dest]).await?;
/// ```
///
/// # Fail-fast 設計
/// - database() は必須
/// - build() 時に driver が key 取得戦略テーブルにあるかチェック
/// - 無ければ最初の INSERT を待たずに BuildError を返す
pub struct StoreBuilder {
    database: Option<Arc<dyn Database>>,
    guids: Option<Arc<dyn GuidGenerator>>,
}

/// BuildError は store 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No database configured. Call database() before build().")]
    MissingDatabase,

    #[error("Unsupported driver: {driver}. Supported drivers: {supported}.")]
    UnsupportedDriver { driver: String, supported: String },
}

/// EgressStores は構築済みの store
#[derive(Clone)]
pub struct EgressStores {
    pub destinations: EgressDestinationStore,
    pub policies: EgressPolicyStore,
}

impl StoreBuilder {
    /// 新しい StoreBuilder を作成
    pub fn new() -> Self {
        Self {
            database: None,
            guids: None,
        }
    }

    pub fn database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    /// guid の生成器を差し替える（既定は ULID）
    pub fn guid_generator(mut self, guids: Arc<dyn GuidGenerator>) -> Self {
        self.guids = Some(guids);
        self
    }

    /// StoreBuilder を構築して EgressStores を生成
    ///
    /// # 検証
    /// - database() が呼ばれていなければ BuildError::MissingDatabase
    /// - driver が未対応なら BuildError::UnsupportedDriver
    pub fn build(self) -> Result<EgressStores, BuildError> {
        let database = self.database.ok_or(BuildError::MissingDatabase)?;
        let driver = database.driver_name();
        if ensure_supported(driver).is_err() {
            return Err(BuildError::UnsupportedDriver {
                driver: driver.to_string(),
                supported: KeyRetrieval::supported_drivers()
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let guids: Arc<dyn GuidGenerator> = match self.guids {
            Some(guids) => guids,
            None => Arc::new(UlidGuidGenerator::new(SystemClock)),
        };
        let terminals = TerminalsTable::new(guids.clone());
        let policies = EgressPolicyTable::new(database.clone(), guids);

        Ok(EgressStores {
            destinations: EgressDestinationStore::new(
                database.clone(),
                terminals.clone(),
                policies.clone(),
            ),
            policies: EgressPolicyStore::new(database, terminals, policies),
        })
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
