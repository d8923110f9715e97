//! EgressPolicy - source terminal から destination terminal へのリンク

use serde::{Deserialize, Serialize};

use crate::domain::{EgressDestination, TerminalKind};

/// EgressSource は policy の送信元
///
/// `id` は app_guid / space_guid（terminal guid ではない）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressSource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TerminalKind,
    pub terminal_guid: String,
}

/// EgressPolicy は保存済みの policy（source / destination は解決済み）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressPolicy {
    pub id: String,
    pub source: EgressSource,
    pub destination: EgressDestination,
}

/// NewEgressPolicy は作成要求
///
/// source は app / space の guid で指定し、terminal が無ければ作成されます。
/// destination は作成済みの destination guid を指定します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEgressPolicy {
    pub source_id: String,
    pub source_kind: TerminalKind,
    pub destination_guid: String,
}

impl NewEgressPolicy {
    pub fn app(app_guid: impl Into<String>, destination_guid: impl Into<String>) -> Self {
        Self {
            source_id: app_guid.into(),
            source_kind: TerminalKind::App,
            destination_guid: destination_guid.into(),
        }
    }

    pub fn space(space_guid: impl Into<String>, destination_guid: impl Into<String>) -> Self {
        Self {
            source_id: space_guid.into(),
            source_kind: TerminalKind::Space,
            destination_guid: destination_guid.into(),
        }
    }
}
