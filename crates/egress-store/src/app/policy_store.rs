//! EgressPolicyStore - policy の作成・削除・読み出し
//!
//! source は app / space の guid で指定します。対応する terminal が無ければ作成し、
//! あれば再利用します。destination は作成済みの destination guid を指定します。
//!
//! # 削除
//! policy を削除したあと、どの policy からも参照されなくなった source terminal は
//! binding（apps / spaces）ごと削除します。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::app::finish;
use crate::domain::{EgressPolicy, NewEgressPolicy, StoreError, TerminalKind};
use crate::ports::{Database, Transaction};
use crate::repository::{
    AppsTable, EgressDestinationTable, EgressPolicyTable, SpacesTable, TerminalsTable, find_kind,
};

/// EgressPolicyStore は policy 単位の操作をまとめる
#[derive(Clone)]
pub struct EgressPolicyStore {
    conn: Arc<dyn Database>,
    terminals: TerminalsTable,
    policies: EgressPolicyTable,
    apps: AppsTable,
    spaces: SpacesTable,
    destinations: EgressDestinationTable,
}

impl EgressPolicyStore {
    pub fn new(
        conn: Arc<dyn Database>,
        terminals: TerminalsTable,
        policies: EgressPolicyTable,
    ) -> Self {
        Self {
            conn,
            terminals,
            policies,
            apps: AppsTable,
            spaces: SpacesTable,
            destinations: EgressDestinationTable,
        }
    }

    /// policy をまとめて作成し、読み出した結果を返す
    ///
    /// 1 つでも失敗すれば、作成した source terminal も含めてロールバックされます。
    pub async fn create(
        &self,
        policies: &[NewEgressPolicy],
    ) -> Result<Vec<EgressPolicy>, StoreError> {
        let mut tx = self.conn.begin().await?;
        let result = self.create_in(tx.as_mut(), policies).await;
        let created = finish(tx, result).await?;
        info!(count = created.len(), "created egress policies");
        Ok(created)
    }

    async fn create_in(
        &self,
        tx: &mut dyn Transaction,
        policies: &[NewEgressPolicy],
    ) -> Result<Vec<EgressPolicy>, StoreError> {
        let mut guids = Vec::with_capacity(policies.len());
        for policy in policies {
            let source = self.source_terminal(tx, policy).await?;

            let destination = policy.destination_guid.as_str();
            if self.destinations.get_by_guid(tx, &[destination]).await?.is_empty() {
                return Err(StoreError::DestinationNotFound(destination.to_string()));
            }

            let guid = self
                .policies
                .create_egress_policy(tx, &source, destination)
                .await?;
            debug!(guid = %guid, source = %source, destination = %destination, "created policy");
            guids.push(guid);
        }
        self.policies.get_by_guid(tx, &guids).await
    }

    /// app / space の terminal を引き、無ければ作る
    async fn source_terminal(
        &self,
        tx: &mut dyn Transaction,
        policy: &NewEgressPolicy,
    ) -> Result<String, StoreError> {
        let id = policy.source_id.as_str();
        let existing = match policy.source_kind {
            TerminalKind::App => self.apps.terminal_by_app_guid(tx, id).await?,
            TerminalKind::Space => self.spaces.terminal_by_space_guid(tx, id).await?,
            TerminalKind::IpRange => return Err(StoreError::UnsupportedSource(policy.source_kind)),
        };
        if let Some(terminal) = existing {
            return Ok(terminal);
        }

        let terminal = self.terminals.create(tx).await?;
        match policy.source_kind {
            TerminalKind::App => self.apps.create(tx, &terminal, id).await?,
            _ => self.spaces.create(tx, &terminal, id).await?,
        };
        Ok(terminal)
    }

    /// policy を削除して、削除したものを返す（存在しない guid は無視）
    pub async fn delete<S: AsRef<str> + Sync>(
        &self,
        guids: &[S],
    ) -> Result<Vec<EgressPolicy>, StoreError> {
        let mut tx = self.conn.begin().await?;
        let result = self.delete_in(tx.as_mut(), guids).await;
        let deleted = finish(tx, result).await?;
        info!(count = deleted.len(), "deleted egress policies");
        Ok(deleted)
    }

    async fn delete_in<S: AsRef<str> + Sync>(
        &self,
        tx: &mut dyn Transaction,
        guids: &[S],
    ) -> Result<Vec<EgressPolicy>, StoreError> {
        let deleted = self.policies.get_by_guid(tx, guids).await?;
        for policy in &deleted {
            self.policies.delete_egress_policy(tx, &policy.id).await?;
        }

        let mut seen = HashSet::new();
        for policy in &deleted {
            let terminal = policy.source.terminal_guid.as_str();
            if !seen.insert(terminal) || self.policies.is_terminal_in_use(tx, terminal).await? {
                continue;
            }
            match find_kind(tx, terminal).await? {
                Some(TerminalKind::App) => self.apps.delete(tx, terminal).await?,
                Some(TerminalKind::Space) => self.spaces.delete(tx, terminal).await?,
                // ip_ranges を持つ terminal は destination なので残す
                Some(TerminalKind::IpRange) | None => continue,
            }
            self.terminals.delete(tx, terminal).await?;
            debug!(terminal = %terminal, "deleted orphaned source terminal");
        }
        Ok(deleted)
    }

    /// すべての policy を作成順に取得
    pub async fn all(&self) -> Result<Vec<EgressPolicy>, StoreError> {
        self.policies.get_all_policies().await
    }

    /// source の app / space guid で policy を取得
    pub async fn by_source_guids<S: AsRef<str> + Sync>(
        &self,
        source_guids: &[S],
    ) -> Result<Vec<EgressPolicy>, StoreError> {
        self.policies.get_by_source_guids(source_guids).await
    }
}
