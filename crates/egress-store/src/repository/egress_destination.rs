//! EgressDestinationTable - destination の読み出し
//!
//! ip_ranges を持つ terminal を destination とみなし、metadata を LEFT JOIN して組み立てます。

use crate::domain::{EgressDestination, StoreError};
use crate::ports::database::placeholders;
use crate::ports::{SqlValue, Transaction};
use crate::repository::hydrate::{DESTINATION_ORDER, DESTINATION_QUERY, destinations_from_rows};

/// EgressDestinationTable は destination の読み出し用リポジトリ
#[derive(Debug, Clone, Copy, Default)]
pub struct EgressDestinationTable;

impl EgressDestinationTable {
    /// すべての destination を作成順に取得
    pub async fn all(&self, tx: &mut dyn Transaction) -> Result<Vec<EgressDestination>, StoreError> {
        let sql = format!("{DESTINATION_QUERY} {DESTINATION_ORDER}");
        let rows = tx.query(&sql, &[]).await?;
        destinations_from_rows(&rows)
    }

    /// terminal guid を指定して destination を取得（存在しない guid は無視）
    pub async fn get_by_guid<S: AsRef<str> + Sync>(
        &self,
        tx: &mut dyn Transaction,
        guids: &[S],
    ) -> Result<Vec<EgressDestination>, StoreError> {
        if guids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{DESTINATION_QUERY} WHERE ip_ranges.terminal_guid IN ({}) {DESTINATION_ORDER}",
            placeholders(guids.len())
        );
        let args: Vec<SqlValue> = guids.iter().map(|g| SqlValue::from(g.as_ref())).collect();
        let rows = tx.query(&sql, &args).await?;
        destinations_from_rows(&rows)
    }
}
