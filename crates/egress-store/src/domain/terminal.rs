//! Terminal - source / destination の共通 identity
//!
//! terminal 自体は guid しか持ちません。種類は discriminator 列ではなく、
//! apps → spaces → ip_ranges の順にどのテーブルが terminal_guid を参照しているかで決まります。

use serde::{Deserialize, Serialize};
use std::fmt;

/// TerminalKind は terminal が解決された具象の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    App,
    Space,
    IpRange,
}

impl TerminalKind {
    /// 判定に使うプローブ順（先に一致したものを採用）
    pub const PROBE_ORDER: [TerminalKind; 3] =
        [TerminalKind::App, TerminalKind::Space, TerminalKind::IpRange];

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalKind::App => "app",
            TerminalKind::Space => "space",
            TerminalKind::IpRange => "ip_range",
        }
    }

    /// LEFT JOIN の結果から source の種類を決める
    ///
    /// apps に行があれば App、なければ spaces、どちらもなければ IpRange。
    pub fn from_join(app_guid: Option<&str>, space_guid: Option<&str>) -> Self {
        match (app_guid, space_guid) {
            (Some(_), _) => TerminalKind::App,
            (None, Some(_)) => TerminalKind::Space,
            (None, None) => TerminalKind::IpRange,
        }
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
