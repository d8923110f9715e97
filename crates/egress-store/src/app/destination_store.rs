//! EgressDestinationStore - destination の作成・更新・削除・読み出し
//!
//! destination は terminal + ip_ranges 行（宣言された範囲ごとに 1 行）+ metadata です。
//! ポートは 1 組まで（無ければ 0-0 として保存）。protocol に関係しない値は 0 で保存し、
//! 呼び出し側には保存した形を返します。

use std::sync::Arc;

use tracing::{debug, info};

use crate::app::finish;
use crate::domain::{EgressDestination, Protocol, StoreError};
use crate::ports::{Database, Transaction};
use crate::repository::{
    DestinationMetadataTable, EgressDestinationTable, EgressPolicyTable, IpRangesTable,
    NewIpRange, TerminalsTable,
};

/// EgressDestinationStore は destination 単位の操作をまとめる
#[derive(Clone)]
pub struct EgressDestinationStore {
    conn: Arc<dyn Database>,
    terminals: TerminalsTable,
    policies: EgressPolicyTable,
    ip_ranges: IpRangesTable,
    metadata: DestinationMetadataTable,
    destinations: EgressDestinationTable,
}

impl EgressDestinationStore {
    pub fn new(
        conn: Arc<dyn Database>,
        terminals: TerminalsTable,
        policies: EgressPolicyTable,
    ) -> Self {
        Self {
            conn,
            terminals,
            policies,
            ip_ranges: IpRangesTable,
            metadata: DestinationMetadataTable,
            destinations: EgressDestinationTable,
        }
    }

    /// destination をまとめて作成し、terminal guid を埋めて返す
    ///
    /// 1 つでも失敗すれば、それまでに書いた行もすべてロールバックされます。
    pub async fn create(
        &self,
        destinations: &[EgressDestination],
    ) -> Result<Vec<EgressDestination>, StoreError> {
        let mut tx = self.conn.begin().await?;
        let result = self.create_in(tx.as_mut(), destinations).await;
        let created = finish(tx, result).await?;
        info!(count = created.len(), "created egress destinations");
        Ok(created)
    }

    async fn create_in(
        &self,
        tx: &mut dyn Transaction,
        destinations: &[EgressDestination],
    ) -> Result<Vec<EgressDestination>, StoreError> {
        let mut created = Vec::with_capacity(destinations.len());
        for destination in destinations {
            validate(destination)?;
            let mut stored = as_stored(destination);
            stored.guid = self.terminals.create(tx).await?;
            self.write_ranges(tx, &stored).await?;
            self.metadata
                .upsert(tx, &stored.guid, &stored.name, &stored.description)
                .await?;
            debug!(guid = %stored.guid, ranges = stored.ip_ranges.len(), "created destination");
            created.push(stored);
        }
        Ok(created)
    }

    /// すべての destination を作成順に取得
    pub async fn all(&self) -> Result<Vec<EgressDestination>, StoreError> {
        let mut tx = self.conn.begin().await?;
        let result = self.destinations.all(tx.as_mut()).await;
        finish(tx, result).await
    }

    pub async fn get_by_guid<S: AsRef<str> + Sync>(
        &self,
        guids: &[S],
    ) -> Result<Vec<EgressDestination>, StoreError> {
        let mut tx = self.conn.begin().await?;
        let result = self.destinations.get_by_guid(tx.as_mut(), guids).await;
        finish(tx, result).await
    }

    /// 既存の destination の ip range と metadata を置き換える
    ///
    /// `guid` が存在しなければ `DestinationNotFound`。
    pub async fn update(
        &self,
        destinations: &[EgressDestination],
    ) -> Result<Vec<EgressDestination>, StoreError> {
        let mut tx = self.conn.begin().await?;
        let result = self.update_in(tx.as_mut(), destinations).await;
        let updated = finish(tx, result).await?;
        info!(count = updated.len(), "updated egress destinations");
        Ok(updated)
    }

    async fn update_in(
        &self,
        tx: &mut dyn Transaction,
        destinations: &[EgressDestination],
    ) -> Result<Vec<EgressDestination>, StoreError> {
        let mut updated = Vec::with_capacity(destinations.len());
        for destination in destinations {
            validate(destination)?;
            let stored = as_stored(destination);
            let guid = stored.guid.as_str();
            if self.destinations.get_by_guid(tx, &[guid]).await?.is_empty() {
                return Err(StoreError::DestinationNotFound(guid.to_string()));
            }
            self.ip_ranges.delete_by_terminal(tx, guid).await?;
            self.write_ranges(tx, &stored).await?;
            self.metadata
                .upsert(tx, guid, &stored.name, &stored.description)
                .await?;
            debug!(guid = %guid, "updated destination");
            updated.push(stored);
        }
        Ok(updated)
    }

    /// destination を削除して、削除したものを返す
    ///
    /// policy から参照されている destination があれば何も削除せず `TerminalInUse`。
    pub async fn delete<S: AsRef<str> + Sync>(
        &self,
        guids: &[S],
    ) -> Result<Vec<EgressDestination>, StoreError> {
        let mut tx = self.conn.begin().await?;
        let result = self.delete_in(tx.as_mut(), guids).await;
        let deleted = finish(tx, result).await?;
        info!(count = deleted.len(), "deleted egress destinations");
        Ok(deleted)
    }

    async fn delete_in<S: AsRef<str> + Sync>(
        &self,
        tx: &mut dyn Transaction,
        guids: &[S],
    ) -> Result<Vec<EgressDestination>, StoreError> {
        let mut deleted = Vec::with_capacity(guids.len());
        for guid in guids {
            let guid = guid.as_ref();
            let Some(destination) = self.destinations.get_by_guid(tx, &[guid]).await?.pop() else {
                return Err(StoreError::DestinationNotFound(guid.to_string()));
            };
            if self.policies.is_terminal_in_use(tx, guid).await? {
                return Err(StoreError::TerminalInUse(guid.to_string()));
            }
            self.ip_ranges.delete_by_terminal(tx, guid).await?;
            self.metadata.delete(tx, guid).await?;
            self.terminals.delete(tx, guid).await?;
            debug!(guid = %guid, "deleted destination");
            deleted.push(destination);
        }
        Ok(deleted)
    }

    async fn write_ranges(
        &self,
        tx: &mut dyn Transaction,
        destination: &EgressDestination,
    ) -> Result<(), StoreError> {
        let ports = destination.stored_ports();
        for range in &destination.ip_ranges {
            let row = NewIpRange {
                start_ip: range.start.clone(),
                end_ip: range.end.clone(),
                protocol: destination.protocol,
                start_port: ports.start,
                end_port: ports.end,
                icmp_type: destination.icmp_type,
                icmp_code: destination.icmp_code,
            };
            self.ip_ranges.create(tx, &destination.guid, &row).await?;
        }
        Ok(())
    }
}

/// 保存できない destination を拒否する
///
/// ip range が無いと読み出せず、ip_ranges 行にはポートを 1 組しか持てない。
fn validate(destination: &EgressDestination) -> Result<(), StoreError> {
    if destination.ip_ranges.is_empty() {
        return Err(StoreError::InvalidDestination(format!(
            "destination {:?} has no ip ranges",
            destination.name
        )));
    }
    if destination.ports.len() > 1 {
        return Err(StoreError::InvalidDestination(format!(
            "destination {:?} declares {} port ranges, at most one is supported",
            destination.name,
            destination.ports.len()
        )));
    }
    Ok(())
}

/// 保存後に読み出したときと同じ形にそろえる
///
/// icmp ではポートを、それ以外では icmp_type / icmp_code を落とす。0-0 のポートは「指定なし」。
fn as_stored(destination: &EgressDestination) -> EgressDestination {
    let mut stored = destination.clone();
    if stored.protocol == Protocol::Icmp {
        stored.ports.clear();
    } else {
        stored.icmp_type = 0;
        stored.icmp_code = 0;
    }
    stored.ports.retain(|ports| ports.start != 0 || ports.end != 0);
    stored
}
