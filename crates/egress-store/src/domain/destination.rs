//! EgressDestination - 宛先（ip_ranges 行 + 任意の destination_metadatas 行）
//!
//! destination は単一テーブルではありません。terminal に紐づく ip_ranges 行の集まりと、
//! 後から追加された destination_metadatas（name / description）から組み立てます。
//! metadata が無い古い行は空文字列として扱います。

use serde::{Deserialize, Serialize};

use crate::domain::Protocol;

/// ポート範囲（両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    pub start: i64,
    pub end: i64,
}

/// IP アドレス範囲（両端を含む）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    pub start: String,
    pub end: String,
}

impl IpRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// EgressDestination は policy の宛先
///
/// # フィールドの規約
/// - `guid` は destination の terminal guid（作成前は空文字列）
/// - `ports` は tcp/udp のときだけ意味を持つ（icmp では空）
/// - `icmp_type` / `icmp_code` は icmp 以外では 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressDestination {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub protocol: Protocol,
    #[serde(default)]
    pub ports: Vec<Ports>,
    pub ip_ranges: Vec<IpRange>,
    #[serde(default)]
    pub icmp_type: i64,
    #[serde(default)]
    pub icmp_code: i64,
}

impl EgressDestination {
    /// まだ保存されていない destination を作成
    pub fn new(name: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            guid: String::new(),
            name: name.into(),
            description: String::new(),
            protocol,
            ports: Vec::new(),
            ip_ranges: Vec::new(),
            icmp_type: 0,
            icmp_code: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_ports(mut self, start: i64, end: i64) -> Self {
        self.ports.push(Ports { start, end });
        self
    }

    pub fn with_ip_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.ip_ranges.push(IpRange::new(start, end));
        self
    }

    pub fn with_icmp(mut self, icmp_type: i64, icmp_code: i64) -> Self {
        self.icmp_type = icmp_type;
        self.icmp_code = icmp_code;
        self
    }

    /// ip_ranges 行に書き込むポート（先頭の Ports、なければ 0-0）
    pub fn stored_ports(&self) -> Ports {
        self.ports
            .first()
            .copied()
            .unwrap_or(Ports { start: 0, end: 0 })
    }
}
