//! Driver - 自動採番 key の取得戦略
//!
//! 生成された id の取り方はバックエンドごとに違うので、driver 名で戦略を引きます。
//! テーブルに無い driver は、SQL を発行する前に `unknown driver` で失敗します。

use crate::domain::StoreError;
use crate::impls::{POSTGRES_DRIVER, SQLITE_DRIVER};
use crate::ports::{SqlValue, Transaction};

/// KeyRetrieval は INSERT 後に id を得る方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRetrieval {
    /// execute して last insert rowid を読む
    LastInsertId,
    /// `RETURNING id` を付けて query する
    Returning,
}

/// サポートする driver の一覧（ここに無い driver はエラー）
const KEY_STRATEGIES: &[(&str, KeyRetrieval)] = &[
    (SQLITE_DRIVER, KeyRetrieval::LastInsertId),
    (POSTGRES_DRIVER, KeyRetrieval::Returning),
];

/// driver が戦略テーブルにあるか確認する（id を読まない書き込み用）
pub fn ensure_supported(driver: &str) -> Result<(), StoreError> {
    KeyRetrieval::for_driver(driver).map(|_| ())
}

impl KeyRetrieval {
    pub fn for_driver(driver: &str) -> Result<Self, StoreError> {
        KEY_STRATEGIES
            .iter()
            .find(|(name, _)| *name == driver)
            .map(|(_, strategy)| *strategy)
            .ok_or_else(|| StoreError::UnknownDriver(driver.to_string()))
    }

    pub fn supported_drivers() -> impl Iterator<Item = &'static str> {
        KEY_STRATEGIES.iter().map(|(name, _)| *name)
    }

    /// INSERT を実行して自動採番された id を返す
    pub async fn insert(
        self,
        tx: &mut dyn Transaction,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<i64, StoreError> {
        match self {
            KeyRetrieval::LastInsertId => tx
                .execute(sql, args)
                .await?
                .last_insert_id
                .ok_or(StoreError::MissingGeneratedKey),
            KeyRetrieval::Returning => {
                let rows = tx.query(&format!("{sql} RETURNING id"), args).await?;
                rows.first().ok_or(StoreError::MissingGeneratedKey)?.int(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransaction;
    use rstest::rstest;

    #[rstest]
    #[case::sqlite("sqlite", KeyRetrieval::LastInsertId)]
    #[case::postgres("postgres", KeyRetrieval::Returning)]
    fn known_drivers_have_a_strategy(#[case] driver: &str, #[case] expected: KeyRetrieval) {
        assert_eq!(KeyRetrieval::for_driver(driver).unwrap(), expected);
    }

    #[rstest]
    #[case::db2("db2")]
    #[case::mysql("mysql")]
    #[case::empty("")]
    fn other_drivers_are_unknown(#[case] driver: &str) {
        let err = KeyRetrieval::for_driver(driver).unwrap_err();
        assert_eq!(err.to_string(), format!("unknown driver: {driver}"));
    }

    #[rstest]
    #[case::sqlite("sqlite", true)]
    #[case::postgres("postgres", true)]
    #[case::db2("db2", false)]
    fn ensure_supported_follows_the_strategy_table(#[case] driver: &str, #[case] supported: bool) {
        assert_eq!(ensure_supported(driver).is_ok(), supported);
        assert_eq!(KeyRetrieval::supported_drivers().any(|name| name == driver), supported);
    }

    #[tokio::test]
    async fn returning_appends_the_clause_and_reads_the_id() {
        let mut tx = FakeTransaction::new("postgres").with_rows(vec![vec![SqlValue::Int(7)]]);

        let id = KeyRetrieval::Returning
            .insert(&mut tx, "INSERT INTO apps (terminal_guid, app_guid) VALUES (?, ?)", &[])
            .await
            .unwrap();

        assert_eq!(id, 7);
        assert_eq!(
            tx.statements(),
            vec!["INSERT INTO apps (terminal_guid, app_guid) VALUES (?, ?) RETURNING id".to_string()]
        );
    }

    #[tokio::test]
    async fn returning_without_rows_is_missing_key() {
        let mut tx = FakeTransaction::new("postgres");
        let err = KeyRetrieval::Returning
            .insert(&mut tx, "INSERT INTO terminals (guid) VALUES (?)", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingGeneratedKey));
    }
}
