//! Bindings - terminal に属性を付ける具象テーブル（apps / spaces / ip_ranges）
//!
//! 各 create は自動採番された id を返します。id の取り方は driver ごとに違うので、
//! `KeyRetrieval` で driver を確認してから INSERT します。

use crate::domain::{Protocol, StoreError, TerminalKind};
use crate::ports::{SqlValue, Transaction};
use crate::repository::KeyRetrieval;

/// AppsTable は apps テーブルのリポジトリ
#[derive(Debug, Clone, Copy, Default)]
pub struct AppsTable;

impl AppsTable {
    pub async fn create(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
        app_guid: &str,
    ) -> Result<i64, StoreError> {
        KeyRetrieval::for_driver(tx.driver_name())?
            .insert(
                tx,
                "INSERT INTO apps (terminal_guid, app_guid) VALUES (?, ?)",
                &[SqlValue::from(terminal_guid), SqlValue::from(app_guid)],
            )
            .await
    }

    pub async fn delete(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
    ) -> Result<(), StoreError> {
        tx.execute(
            "DELETE FROM apps WHERE terminal_guid = ?",
            &[SqlValue::from(terminal_guid)],
        )
        .await?;
        Ok(())
    }

    /// app_guid に紐づく terminal guid（無ければ None）
    pub async fn terminal_by_app_guid(
        &self,
        tx: &mut dyn Transaction,
        app_guid: &str,
    ) -> Result<Option<String>, StoreError> {
        let rows = tx
            .query(
                "SELECT terminal_guid FROM apps WHERE app_guid = ?",
                &[SqlValue::from(app_guid)],
            )
            .await?;
        rows.first().map(|row| row.text(0)).transpose()
    }
}

/// SpacesTable は spaces テーブルのリポジトリ
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacesTable;

impl SpacesTable {
    pub async fn create(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
        space_guid: &str,
    ) -> Result<i64, StoreError> {
        KeyRetrieval::for_driver(tx.driver_name())?
            .insert(
                tx,
                "INSERT INTO spaces (terminal_guid, space_guid) VALUES (?, ?)",
                &[SqlValue::from(terminal_guid), SqlValue::from(space_guid)],
            )
            .await
    }

    pub async fn delete(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
    ) -> Result<(), StoreError> {
        tx.execute(
            "DELETE FROM spaces WHERE terminal_guid = ?",
            &[SqlValue::from(terminal_guid)],
        )
        .await?;
        Ok(())
    }

    /// space_guid に紐づく terminal guid（無ければ None）
    pub async fn terminal_by_space_guid(
        &self,
        tx: &mut dyn Transaction,
        space_guid: &str,
    ) -> Result<Option<String>, StoreError> {
        let rows = tx
            .query(
                "SELECT terminal_guid FROM spaces WHERE space_guid = ?",
                &[SqlValue::from(space_guid)],
            )
            .await?;
        rows.first().map(|row| row.text(0)).transpose()
    }
}

/// ip_ranges に書き込む 1 行分
///
/// protocol に関係しない値（icmp のポート、icmp 以外の icmp_type / icmp_code）は
/// 呼び出し側が 0 にしてから渡す。このテーブルは受け取った値をそのまま書きます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIpRange {
    pub start_ip: String,
    pub end_ip: String,
    pub protocol: Protocol,
    pub start_port: i64,
    pub end_port: i64,
    pub icmp_type: i64,
    pub icmp_code: i64,
}

/// IpRangesTable は ip_ranges テーブルのリポジトリ
#[derive(Debug, Clone, Copy, Default)]
pub struct IpRangesTable;

impl IpRangesTable {
    pub async fn create(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
        range: &NewIpRange,
    ) -> Result<i64, StoreError> {
        KeyRetrieval::for_driver(tx.driver_name())?
            .insert(
                tx,
                "INSERT INTO ip_ranges (terminal_guid, start_ip, end_ip, protocol, start_port, end_port, icmp_type, icmp_code) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    SqlValue::from(terminal_guid),
                    SqlValue::from(range.start_ip.as_str()),
                    SqlValue::from(range.end_ip.as_str()),
                    SqlValue::from(range.protocol.as_str()),
                    SqlValue::from(range.start_port),
                    SqlValue::from(range.end_port),
                    SqlValue::from(range.icmp_type),
                    SqlValue::from(range.icmp_code),
                ],
            )
            .await
    }

    pub async fn delete(&self, tx: &mut dyn Transaction, id: i64) -> Result<(), StoreError> {
        tx.execute("DELETE FROM ip_ranges WHERE id = ?", &[SqlValue::from(id)])
            .await?;
        Ok(())
    }

    /// destination の ip range をまとめて削除
    pub async fn delete_by_terminal(
        &self,
        tx: &mut dyn Transaction,
        terminal_guid: &str,
    ) -> Result<(), StoreError> {
        tx.execute(
            "DELETE FROM ip_ranges WHERE terminal_guid = ?",
            &[SqlValue::from(terminal_guid)],
        )
        .await?;
        Ok(())
    }
}

fn table_for(kind: TerminalKind) -> &'static str {
    match kind {
        TerminalKind::App => "apps",
        TerminalKind::Space => "spaces",
        TerminalKind::IpRange => "ip_ranges",
    }
}

/// terminal の種類を apps → spaces → ip_ranges の順に調べる
///
/// どのテーブルにも行が無ければ None。
pub async fn find_kind(
    tx: &mut dyn Transaction,
    terminal_guid: &str,
) -> Result<Option<TerminalKind>, StoreError> {
    for kind in TerminalKind::PROBE_ORDER {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE terminal_guid = ?",
            table_for(kind)
        );
        let rows = tx.query(&sql, &[SqlValue::from(terminal_guid)]).await?;
        let count = match rows.first() {
            Some(row) => row.int(0)?,
            None => 0,
        };
        if count > 0 {
            return Ok(Some(kind));
        }
    }
    Ok(None)
}
