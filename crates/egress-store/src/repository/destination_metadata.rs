//! DestinationMetadataTable - destination の name / description
//!
//! このテーブルは ip_ranges より後から追加されたので、metadata を持たない
//! destination が存在します。読み出し側は LEFT JOIN + COALESCE で空文字列にします。

use crate::domain::StoreError;
use crate::ports::{SqlValue, Transaction};
use crate::repository::driver::ensure_supported;

/// DestinationMetadataTable は destination_metadatas テーブルのリポジトリ
#[derive(Debug, Clone, Copy, Default)]
pub struct DestinationMetadataTable;

impl DestinationMetadataTable {
    /// terminal の metadata を作成、または上書き
    pub async fn upsert(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
        name: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        ensure_supported(tx.driver_name())?;
        tx.execute(
            "INSERT INTO destination_metadatas (terminal_guid, name, description) VALUES (?, ?, ?) \
             ON CONFLICT (terminal_guid) DO UPDATE SET name = excluded.name, description = excluded.description",
            &[
                SqlValue::from(terminal_guid),
                SqlValue::from(name),
                SqlValue::from(description),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn delete(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
    ) -> Result<(), StoreError> {
        tx.execute(
            "DELETE FROM destination_metadatas WHERE terminal_guid = ?",
            &[SqlValue::from(terminal_guid)],
        )
        .await?;
        Ok(())
    }
}
