//! GuidGenerator port - guid 生成の抽象化
//!
//! terminal と egress policy の guid はリポジトリが生成します。
//! テスト容易性のために、trait として注入します。
//!
//! # 実装
//! - **UlidGuidGenerator**: ULID ベース（本番用）
//! - **SequentialGuidGenerator**: "guid-1", "guid-2", ...（テスト用）

use std::sync::atomic::{AtomicU64, Ordering};

use ulid::Ulid;

use crate::ports::Clock;

/// GuidGenerator は呼び出しごとに新しい guid を返す
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数のトランザクションから同時に使われる）
pub trait GuidGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// UlidGuidGenerator は ULID ベースの guid 生成器
///
/// Clock の時刻を timestamp 部分に、乱数を残りの 80 bit に使います。
pub struct UlidGuidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGuidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> GuidGenerator for UlidGuidGenerator<C> {
    fn generate(&self) -> String {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random()).to_string()
    }
}

/// SequentialGuidGenerator は決定的な連番 guid を返す
///
/// 生成される guid をテストで assert するためのものです。
#[derive(Debug, Default)]
pub struct SequentialGuidGenerator {
    current: AtomicU64,
}

impl SequentialGuidGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GuidGenerator for SequentialGuidGenerator {
    fn generate(&self) -> String {
        let next = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        format!("guid-{next}")
    }
}
