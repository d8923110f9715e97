//! App - アプリケーション層
//!
//! リポジトリを組み合わせて、1 回の呼び出しを 1 トランザクションで実行します。
//!
//! # 主要コンポーネント
//! - **StoreBuilder**: Database と GuidGenerator のワイヤリング（起動時に driver を検証）
//! - **EgressDestinationStore**: destination の作成・更新・削除・読み出し
//! - **EgressPolicyStore**: policy の作成・削除・読み出し
//!
//! # トランザクション
//! 成功すればコミット、途中のどこかで失敗すればロールバックします（all-or-nothing）。

pub mod builder;
pub mod destination_store;
pub mod policy_store;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, EgressStores, StoreBuilder};
pub use self::destination_store::EgressDestinationStore;
pub use self::policy_store::EgressPolicyStore;

use tracing::warn;

use crate::domain::StoreError;
use crate::ports::Transaction;

/// 結果に応じてコミットまたはロールバックする
///
/// ロールバック自体の失敗はログに残し、元のエラーを返します。
pub(crate) async fn finish<T>(
    tx: Box<dyn Transaction>,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, cause = %err, "rollback failed");
            }
            Err(err)
        }
    }
}
