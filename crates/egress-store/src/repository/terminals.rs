//! TerminalsTable - source / destination が共有する identity
//!
//! terminal は guid だけの行です。apps / spaces / ip_ranges のいずれかが
//! terminal_guid で参照し、egress_policies が source / destination として参照します。

use std::sync::Arc;

use crate::domain::StoreError;
use crate::ports::{GuidGenerator, SqlValue, Transaction};

/// TerminalsTable は terminals テーブルのリポジトリ
#[derive(Clone)]
pub struct TerminalsTable {
    guids: Arc<dyn GuidGenerator>,
}

impl TerminalsTable {
    pub fn new(guids: Arc<dyn GuidGenerator>) -> Self {
        Self { guids }
    }

    /// 新しい terminal を作成して guid を返す
    pub async fn create(&self, tx: &mut dyn Transaction) -> Result<String, StoreError> {
        let guid = self.guids.generate();
        tx.execute(
            "INSERT INTO terminals (guid) VALUES (?)",
            &[SqlValue::from(guid.as_str())],
        )
        .await?;
        Ok(guid)
    }

    /// terminal を削除（存在しなくても成功）
    ///
    /// policy から参照されていないことの確認は呼び出し側の責務です。
    pub async fn delete(&self, tx: &mut dyn Transaction, guid: &str) -> Result<(), StoreError> {
        tx.execute("DELETE FROM terminals WHERE guid = ?", &[SqlValue::from(guid)])
            .await?;
        Ok(())
    }
}
