//! 結合クエリの行をドメインオブジェクトに組み立てる
//!
//! destination は ip_ranges の行ごとに 1 行ずつ返ってくるので、
//! policy guid（または destination guid）ごとにまとめて ip_ranges を積み上げます。

use std::collections::HashMap;

use crate::domain::{
    EgressDestination, EgressPolicy, EgressSource, IpRange, Ports, Protocol, StoreError,
    TerminalKind,
};
use crate::ports::SqlRow;

/// ip_ranges の列（protocol, start_ip, end_ip, start_port, end_port, icmp_type, icmp_code）と
/// metadata の列（name, description）の位置
#[derive(Debug, Clone, Copy)]
struct DestinationColumns {
    guid: usize,
    range: usize,
    name: usize,
    description: usize,
}

/// `POLICY_COLUMNS` の並び
const POLICY_GUID: usize = 0;
const SOURCE_TERMINAL: usize = 1;
const APP_GUID: usize = 2;
const SPACE_GUID: usize = 3;
const POLICY_DESTINATION: DestinationColumns = DestinationColumns {
    guid: 4,
    range: 5,
    name: 12,
    description: 13,
};

/// `DESTINATION_COLUMNS` の並び
const DESTINATION: DestinationColumns = DestinationColumns {
    guid: 0,
    range: 1,
    name: 8,
    description: 9,
};

/// egress_policies を起点にした SELECT 句と FROM 句
pub(crate) const POLICY_QUERY: &str = "SELECT \
    egress_policies.guid, \
    egress_policies.source_guid, \
    apps.app_guid, \
    spaces.space_guid, \
    egress_policies.destination_guid, \
    ip_ranges.protocol, \
    ip_ranges.start_ip, \
    ip_ranges.end_ip, \
    ip_ranges.start_port, \
    ip_ranges.end_port, \
    ip_ranges.icmp_type, \
    ip_ranges.icmp_code, \
    COALESCE(destination_metadatas.name, ''), \
    COALESCE(destination_metadatas.description, '') \
    FROM egress_policies \
    LEFT OUTER JOIN apps ON (egress_policies.source_guid = apps.terminal_guid) \
    LEFT OUTER JOIN spaces ON (egress_policies.source_guid = spaces.terminal_guid) \
    LEFT OUTER JOIN ip_ranges ON (egress_policies.destination_guid = ip_ranges.terminal_guid) \
    LEFT OUTER JOIN destination_metadatas ON (egress_policies.destination_guid = destination_metadatas.terminal_guid)";

pub(crate) const POLICY_ORDER: &str = "ORDER BY egress_policies.id, ip_ranges.id";

/// ip_ranges を起点にした SELECT 句と FROM 句
pub(crate) const DESTINATION_QUERY: &str = "SELECT \
    ip_ranges.terminal_guid, \
    ip_ranges.protocol, \
    ip_ranges.start_ip, \
    ip_ranges.end_ip, \
    ip_ranges.start_port, \
    ip_ranges.end_port, \
    ip_ranges.icmp_type, \
    ip_ranges.icmp_code, \
    COALESCE(destination_metadatas.name, ''), \
    COALESCE(destination_metadatas.description, '') \
    FROM ip_ranges \
    LEFT OUTER JOIN destination_metadatas ON (ip_ranges.terminal_guid = destination_metadatas.terminal_guid)";

pub(crate) const DESTINATION_ORDER: &str = "ORDER BY ip_ranges.id";

/// ip_ranges の 1 行
struct RangeRow {
    protocol: Protocol,
    ip_range: IpRange,
    ports: Ports,
    icmp_type: i64,
    icmp_code: i64,
}

/// LEFT JOIN で ip_ranges が無ければ None
fn read_range(row: &SqlRow, first: usize) -> Result<Option<RangeRow>, StoreError> {
    let Some(protocol) = row.opt_text(first)? else {
        return Ok(None);
    };
    let protocol = protocol.parse::<Protocol>().map_err(|_| StoreError::Decode {
        column: first,
        expected: "protocol",
    })?;
    Ok(Some(RangeRow {
        protocol,
        ip_range: IpRange::new(row.text(first + 1)?, row.text(first + 2)?),
        ports: Ports {
            start: row.int(first + 3)?,
            end: row.int(first + 4)?,
        },
        icmp_type: row.int(first + 5)?,
        icmp_code: row.int(first + 6)?,
    }))
}

fn new_destination(row: &SqlRow, columns: DestinationColumns) -> Result<EgressDestination, StoreError> {
    let range = read_range(row, columns.range)?.ok_or(StoreError::Decode {
        column: columns.range,
        expected: "protocol",
    })?;

    // ポートは 0-0 のとき「指定なし」
    let ports = if range.ports.start != 0 || range.ports.end != 0 {
        vec![range.ports]
    } else {
        Vec::new()
    };

    Ok(EgressDestination {
        guid: row.text(columns.guid)?,
        name: row.text(columns.name)?,
        description: row.text(columns.description)?,
        protocol: range.protocol,
        ports,
        ip_ranges: vec![range.ip_range],
        icmp_type: range.icmp_type,
        icmp_code: range.icmp_code,
    })
}

fn push_range(
    destination: &mut EgressDestination,
    row: &SqlRow,
    columns: DestinationColumns,
) -> Result<(), StoreError> {
    if let Some(range) = read_range(row, columns.range)? {
        destination.ip_ranges.push(range.ip_range);
    }
    Ok(())
}

/// `POLICY_QUERY` の結果を policy ごとにまとめる（行の順序を保つ）
pub(crate) fn policies_from_rows(rows: &[SqlRow]) -> Result<Vec<EgressPolicy>, StoreError> {
    let mut policies: Vec<EgressPolicy> = Vec::new();
    let mut index_by_guid: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let guid = row.text(POLICY_GUID)?;
        if let Some(&index) = index_by_guid.get(&guid) {
            push_range(&mut policies[index].destination, row, POLICY_DESTINATION)?;
            continue;
        }

        let app_guid = row.opt_text(APP_GUID)?;
        let space_guid = row.opt_text(SPACE_GUID)?;
        let kind = TerminalKind::from_join(app_guid.as_deref(), space_guid.as_deref());
        let source = EgressSource {
            id: app_guid.or(space_guid).unwrap_or_default(),
            kind,
            terminal_guid: row.text(SOURCE_TERMINAL)?,
        };

        index_by_guid.insert(guid.clone(), policies.len());
        policies.push(EgressPolicy {
            id: guid,
            source,
            destination: new_destination(row, POLICY_DESTINATION)?,
        });
    }

    Ok(policies)
}

/// `DESTINATION_QUERY` の結果を destination ごとにまとめる（行の順序を保つ）
pub(crate) fn destinations_from_rows(rows: &[SqlRow]) -> Result<Vec<EgressDestination>, StoreError> {
    let mut destinations: Vec<EgressDestination> = Vec::new();
    let mut index_by_guid: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let guid = row.text(DESTINATION.guid)?;
        if let Some(&index) = index_by_guid.get(&guid) {
            push_range(&mut destinations[index], row, DESTINATION)?;
            continue;
        }
        index_by_guid.insert(guid, destinations.len());
        destinations.push(new_destination(row, DESTINATION)?);
    }

    Ok(destinations)
}
