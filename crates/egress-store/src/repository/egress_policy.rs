//! EgressPolicyTable - source terminal から destination terminal へのリンク
//!
//! 書き込みは呼び出し側のトランザクションで行い、
//! 一覧取得（`get_all_policies` / `get_by_source_guids`）はプールに直接問い合わせます。
//!
//! # 読み出し
//! source / destination の種類は discriminator 列ではなく、
//! apps / spaces / ip_ranges への LEFT JOIN のどれが一致したかで決まります。
//! destination_metadatas も LEFT JOIN なので、metadata の無い destination は
//! name / description が空文字列になります。

use std::sync::Arc;

use crate::domain::{EgressPolicy, StoreError};
use crate::ports::database::placeholders;
use crate::ports::{Database, GuidGenerator, SqlValue, Transaction};
use crate::repository::KeyRetrieval;
use crate::repository::hydrate::{POLICY_ORDER, POLICY_QUERY, policies_from_rows};

/// EgressPolicyTable は egress_policies テーブルのリポジトリ
#[derive(Clone)]
pub struct EgressPolicyTable {
    conn: Arc<dyn Database>,
    guids: Arc<dyn GuidGenerator>,
}

impl EgressPolicyTable {
    pub fn new(conn: Arc<dyn Database>, guids: Arc<dyn GuidGenerator>) -> Self {
        Self { conn, guids }
    }

    /// policy を作成して guid を返す
    ///
    /// どちらかの terminal が存在しなければ、バックエンドの外部キー違反がそのまま返ります。
    pub async fn create_egress_policy(
        &self,
        tx: &mut dyn Transaction,
        source_terminal_guid: &str,
        destination_terminal_guid: &str,
    ) -> Result<String, StoreError> {
        let strategy = KeyRetrieval::for_driver(tx.driver_name())?;
        let guid = self.guids.generate();
        strategy
            .insert(
                tx,
                "INSERT INTO egress_policies (guid, source_guid, destination_guid) VALUES (?, ?, ?)",
                &[
                    SqlValue::from(guid.as_str()),
                    SqlValue::from(source_terminal_guid),
                    SqlValue::from(destination_terminal_guid),
                ],
            )
            .await?;
        Ok(guid)
    }

    pub async fn delete_egress_policy(
        &self,
        tx: &mut dyn Transaction,
        guid: &str,
    ) -> Result<(), StoreError> {
        tx.execute(
            "DELETE FROM egress_policies WHERE guid = ?",
            &[SqlValue::from(guid)],
        )
        .await?;
        Ok(())
    }

    /// terminal がいずれかの policy の source / destination になっているか
    ///
    /// この確認と後続の削除は別の文です。間に別トランザクションが policy を
    /// 追加した場合は、terminal の削除が外部キー違反で失敗します。
    pub async fn is_terminal_in_use(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
    ) -> Result<bool, StoreError> {
        let rows = tx
            .query(
                "SELECT COUNT(*) FROM egress_policies WHERE source_guid = ? OR destination_guid = ?",
                &[SqlValue::from(terminal_guid), SqlValue::from(terminal_guid)],
            )
            .await?;
        let count = match rows.first() {
            Some(row) => row.int(0)?,
            None => 0,
        };
        Ok(count > 0)
    }

    /// guid を指定して policy を取得（存在しない guid は無視）
    pub async fn get_by_guid<S: AsRef<str> + Sync>(
        &self,
        tx: &mut dyn Transaction,
        guids: &[S],
    ) -> Result<Vec<EgressPolicy>, StoreError> {
        if guids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{POLICY_QUERY} WHERE egress_policies.guid IN ({}) {POLICY_ORDER}",
            placeholders(guids.len())
        );
        let args: Vec<SqlValue> = guids.iter().map(|g| SqlValue::from(g.as_ref())).collect();
        let rows = tx.query(&sql, &args).await?;
        policies_from_rows(&rows)
    }

    /// すべての policy を作成順に取得
    pub async fn get_all_policies(&self) -> Result<Vec<EgressPolicy>, StoreError> {
        let sql = format!("{POLICY_QUERY} {POLICY_ORDER}");
        let rows = self.conn.query(&sql, &[]).await?;
        policies_from_rows(&rows)
    }

    /// source の app_guid / space_guid で policy を取得
    ///
    /// terminal guid ではなく app / space の guid で照合します。
    pub async fn get_by_source_guids<S: AsRef<str> + Sync>(
        &self,
        source_guids: &[S],
    ) -> Result<Vec<EgressPolicy>, StoreError> {
        if source_guids.is_empty() {
            return Ok(Vec::new());
        }
        let marks = placeholders(source_guids.len());
        let sql = format!(
            "{POLICY_QUERY} WHERE (apps.app_guid IN ({marks}) OR spaces.space_guid IN ({marks})) {POLICY_ORDER}"
        );
        let ids = source_guids.iter().map(|g| SqlValue::from(g.as_ref()));
        let args: Vec<SqlValue> = ids.clone().chain(ids).collect();
        let rows = self.conn.query(&sql, &args).await?;
        policies_from_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{EgressDestinationStore, EgressPolicyStore};
    use crate::domain::{EgressDestination, NewEgressPolicy, Protocol, TerminalKind};
    use crate::impls::SqliteDatabase;
    use crate::ports::{SequentialGuidGenerator, SystemClock, UlidGuidGenerator};
    use crate::repository::TerminalsTable;
    use crate::testing::{FailingDatabase, FakeTransaction, is_backend_error, migrated_db};

    fn policy_table(db: Arc<dyn Database>) -> EgressPolicyTable {
        EgressPolicyTable::new(db, Arc::new(SequentialGuidGenerator::new()))
    }

    fn terminals() -> TerminalsTable {
        TerminalsTable::new(Arc::new(UlidGuidGenerator::new(SystemClock)))
    }

    #[tokio::test]
    async fn create_egress_policy_links_both_terminals() {
        let db = migrated_db().await;
        let table = policy_table(db.clone());
        let mut tx = db.begin().await.unwrap();

        let source = terminals().create(tx.as_mut()).await.unwrap();
        let destination = terminals().create(tx.as_mut()).await.unwrap();

        let guid = table
            .create_egress_policy(tx.as_mut(), &source, &destination)
            .await
            .unwrap();
        assert_eq!(guid, "guid-1");

        let rows = tx
            .query(
                "SELECT source_guid, destination_guid FROM egress_policies WHERE guid = ?",
                &[SqlValue::from(guid.as_str())],
            )
            .await
            .unwrap();
        assert_eq!(rows[0].text(0).unwrap(), source);
        assert_eq!(rows[0].text(1).unwrap(), destination);
    }

    #[tokio::test]
    async fn create_egress_policy_fails_for_missing_terminals() {
        let db = migrated_db().await;
        let table = policy_table(db.clone());
        let mut tx = db.begin().await.unwrap();

        let err = table
            .create_egress_policy(tx.as_mut(), "some-term-guid", "some-term-guid")
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn create_egress_policy_rejects_an_unknown_driver() {
        let table = policy_table(Arc::new(FailingDatabase::new("unused")));
        let mut tx = FakeTransaction::new("db2");

        let err = table
            .create_egress_policy(&mut tx, "a", "b")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unknown driver: db2");
        assert!(tx.statements().is_empty());
    }

    #[tokio::test]
    async fn delete_egress_policy_removes_the_row() {
        let db = migrated_db().await;
        let table = policy_table(db.clone());
        let mut tx = db.begin().await.unwrap();
        let source = terminals().create(tx.as_mut()).await.unwrap();
        let destination = terminals().create(tx.as_mut()).await.unwrap();
        let guid = table
            .create_egress_policy(tx.as_mut(), &source, &destination)
            .await
            .unwrap();

        table.delete_egress_policy(tx.as_mut(), &guid).await.unwrap();

        let rows = tx
            .query(
                "SELECT COUNT(guid) FROM egress_policies WHERE guid = ?",
                &[SqlValue::from(guid.as_str())],
            )
            .await
            .unwrap();
        assert_eq!(rows[0].int(0).unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_egress_policy_returns_the_sql_error() {
        let table = policy_table(Arc::new(FailingDatabase::new("unused")));
        let mut tx = FakeTransaction::failing("sqlite", "broke");

        let err = table
            .delete_egress_policy(&mut tx, "some-guid")
            .await
            .unwrap_err();

        assert!(is_backend_error(&err, "broke"));
    }

    #[tokio::test]
    async fn is_terminal_in_use_checks_source_and_destination() {
        let db = migrated_db().await;
        let table = policy_table(db.clone());
        let mut tx = db.begin().await.unwrap();
        let destination = terminals().create(tx.as_mut()).await.unwrap();
        let source = terminals().create(tx.as_mut()).await.unwrap();
        let unrelated = terminals().create(tx.as_mut()).await.unwrap();
        table
            .create_egress_policy(tx.as_mut(), &source, &destination)
            .await
            .unwrap();

        assert!(table.is_terminal_in_use(tx.as_mut(), &source).await.unwrap());
        assert!(table.is_terminal_in_use(tx.as_mut(), &destination).await.unwrap());
        assert!(!table.is_terminal_in_use(tx.as_mut(), &unrelated).await.unwrap());
        assert!(!table.is_terminal_in_use(tx.as_mut(), "some-term-guid").await.unwrap());
    }

    /// 4 つの destination（うち 1 つは metadata を消した古い行）と 4 つの policy
    struct Fixture {
        db: Arc<SqliteDatabase>,
        table: EgressPolicyTable,
        destinations: Vec<EgressDestination>,
        policies: Vec<EgressPolicy>,
    }

    async fn fixture() -> Fixture {
        let db = migrated_db().await;
        let conn: Arc<dyn Database> = db.clone();
        let guids: Arc<dyn GuidGenerator> = Arc::new(SequentialGuidGenerator::new());
        let terminals = TerminalsTable::new(Arc::new(UlidGuidGenerator::new(SystemClock)));

        let table = EgressPolicyTable::new(conn.clone(), guids);
        let destination_store =
            EgressDestinationStore::new(conn.clone(), terminals.clone(), table.clone());
        let destinations = destination_store
            .create(&[
                EgressDestination::new("a", Protocol::Tcp)
                    .with_description("desc a")
                    .with_ports(8080, 8081)
                    .with_ip_range("1.2.3.4", "1.2.3.5"),
                EgressDestination::new("b", Protocol::Udp)
                    .with_description("desc b")
                    .with_ip_range("2.2.3.4", "2.2.3.5"),
                EgressDestination::new("c", Protocol::Icmp)
                    .with_description("desc c")
                    .with_icmp(1, 2)
                    .with_ip_range("2.2.3.4", "2.2.3.5"),
                EgressDestination::new("old-entry", Protocol::Icmp)
                    .with_description("this represents an entry that has no destination_metadata")
                    .with_icmp(1, 2)
                    .with_ip_range("2.2.3.4", "2.2.3.5"),
            ])
            .await
            .unwrap();

        // destination_metadatas ができる前に作られた destination を再現する
        sqlx::query("DELETE FROM destination_metadatas WHERE name = 'old-entry'")
            .execute(db.pool())
            .await
            .unwrap();

        let policy_store = EgressPolicyStore::new(conn, terminals, table.clone());
        let policies = policy_store
            .create(&[
                NewEgressPolicy::app("some-app-guid", destinations[0].guid.clone()),
                NewEgressPolicy::space("space-guid", destinations[1].guid.clone()),
                NewEgressPolicy::app("different-app-guid", destinations[2].guid.clone()),
                NewEgressPolicy::space("different-space-guid", destinations[3].guid.clone()),
            ])
            .await
            .unwrap();

        Fixture {
            db,
            table,
            destinations,
            policies,
        }
    }

    #[tokio::test]
    async fn get_by_guid_returns_the_requested_policies() {
        let f = fixture().await;
        let mut tx = f.db.begin().await.unwrap();

        let found = f
            .table
            .get_by_guid(tx.as_mut(), &[f.policies[0].id.as_str(), f.policies[1].id.as_str()])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, f.policies[0].id);
        assert_eq!(found[0].source.kind, TerminalKind::App);
        assert_eq!(found[0].source.id, "some-app-guid");
        assert_eq!(found[0].source.terminal_guid, f.policies[0].source.terminal_guid);
        assert_eq!(found[0].destination, f.destinations[0]);
        assert_eq!(found[1].id, f.policies[1].id);
        assert_eq!(found[1].source.kind, TerminalKind::Space);
        assert_eq!(found[1].source.id, "space-guid");
        assert_eq!(found[1].destination, f.destinations[1]);
    }

    #[tokio::test]
    async fn get_by_guid_with_unknown_or_no_guids_is_empty() {
        let f = fixture().await;
        let mut tx = f.db.begin().await.unwrap();

        let found = f.table.get_by_guid(tx.as_mut(), &["what-policy?"]).await.unwrap();
        assert!(found.is_empty());

        let none: [&str; 0] = [];
        let found = f.table.get_by_guid(tx.as_mut(), &none).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn get_by_guid_without_guids_does_not_query() {
        let table = policy_table(Arc::new(FailingDatabase::new("unused")));
        let mut tx = FakeTransaction::failing("sqlite", "broke");

        let none: [&str; 0] = [];
        let found = table.get_by_guid(&mut tx, &none).await.unwrap();

        assert!(found.is_empty());
        assert!(tx.statements().is_empty());
    }

    #[tokio::test]
    async fn get_all_policies_hydrates_every_policy() {
        let f = fixture().await;

        let listed = f.table.get_all_policies().await.unwrap();

        assert_eq!(listed.len(), 4);
        let ids: Vec<&str> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["guid-1", "guid-2", "guid-3", "guid-4"]);

        assert_eq!(listed[0].source.kind, TerminalKind::App);
        assert_eq!(listed[0].destination.name, "a");
        assert_eq!(listed[0].destination.description, "desc a");
        assert_eq!(listed[0].destination.protocol, Protocol::Tcp);
        assert_eq!(listed[0].destination, f.destinations[0]);

        assert_eq!(listed[1].source.kind, TerminalKind::Space);
        assert!(listed[1].destination.ports.is_empty());
        assert_eq!(listed[1].destination, f.destinations[1]);

        assert_eq!(listed[2].destination.icmp_type, 1);
        assert_eq!(listed[2].destination.icmp_code, 2);
        assert_eq!(listed[2].destination, f.destinations[2]);
    }

    #[tokio::test]
    async fn get_all_policies_defaults_missing_metadata_to_empty_strings() {
        let f = fixture().await;

        let listed = f.table.get_all_policies().await.unwrap();
        let old = &listed[3];

        let expected = EgressDestination {
            name: String::new(),
            description: String::new(),
            ..f.destinations[3].clone()
        };
        assert_eq!(old.source.id, "different-space-guid");
        assert_eq!(old.destination, expected);
    }

    #[tokio::test]
    async fn get_all_policies_returns_the_query_error() {
        let table = policy_table(Arc::new(FailingDatabase::new(
            "some error that sql would return",
        )));

        let err = table.get_all_policies().await.unwrap_err();

        assert!(is_backend_error(&err, "some error that sql would return"));
    }

    #[tokio::test]
    async fn get_by_source_guids_matches_app_and_space_guids() {
        let db = migrated_db().await;
        let conn: Arc<dyn Database> = db.clone();
        let terminals = terminals();
        let table = policy_table(conn.clone());

        let destinations = EgressDestinationStore::new(conn.clone(), terminals.clone(), table.clone())
            .create(&[
                EgressDestination::new("a", Protocol::Tcp)
                    .with_ports(8080, 8081)
                    .with_ip_range("1.2.3.4", "1.2.3.5"),
                EgressDestination::new("b", Protocol::Udp).with_ip_range("2.2.3.4", "2.2.3.5"),
                EgressDestination::new("c", Protocol::Icmp)
                    .with_icmp(1, 2)
                    .with_ip_range("2.2.3.4", "2.2.3.5"),
                EgressDestination::new("d", Protocol::Udp)
                    .with_ports(8080, 8081)
                    .with_ip_range("3.2.3.4", "3.2.3.5"),
                EgressDestination::new("e", Protocol::Udp).with_ip_range("2.2.3.4", "2.2.3.5"),
            ])
            .await
            .unwrap();

        EgressPolicyStore::new(conn, terminals, table.clone())
            .create(&[
                NewEgressPolicy::app("some-app-guid", destinations[0].guid.clone()),
                NewEgressPolicy::app("different-app-guid", destinations[1].guid.clone()),
                NewEgressPolicy::app("different-app-guid", destinations[2].guid.clone()),
                NewEgressPolicy::space("some-space-guid", destinations[3].guid.clone()),
                NewEgressPolicy::app("never-referenced-app-guid", destinations[4].guid.clone()),
            ])
            .await
            .unwrap();

        let policies = table
            .get_by_source_guids(&["some-app-guid", "different-app-guid", "some-space-guid"])
            .await
            .unwrap();

        assert_eq!(policies.len(), 4);
        assert_eq!(policies[0].source.id, "some-app-guid");
        assert_eq!(policies[0].source.kind, TerminalKind::App);
        assert_eq!(policies[1].source.id, "different-app-guid");
        assert_eq!(policies[2].source.id, "different-app-guid");
        assert_eq!(policies[3].source.id, "some-space-guid");
        assert_eq!(policies[3].source.kind, TerminalKind::Space);
        assert_eq!(policies[3].destination.name, "d");

        let none = table
            .get_by_source_guids(&["meow-this-is-a-bogus-app-guid"])
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn get_by_source_guids_returns_the_query_error() {
        let table = policy_table(Arc::new(FailingDatabase::new(
            "some error that sql would return",
        )));

        let err = table
            .get_by_source_guids(&["id-does-not-matter"])
            .await
            .unwrap_err();

        assert!(is_backend_error(&err, "some error that sql would return"));
    }
}
