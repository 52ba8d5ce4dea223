use anyhow::{bail, Result};
use regex_lite::Regex;
use serde_json::{json, Value};

use super::{commands, is_timestamp_line};
use crate::facts::{FactMap, FactSubset, GatherOptions, Responses};

const SHOW_MFIB_CONNECTIONS: &str = "show mfib connections";
const SHOW_MFIB_COUNTER: &str = "show mfib counter";
const SHOW_MRIB_ROUTE: &str = "show mrib route outgoing-interface";
const SHOW_BGP_SUMMARY: &str = "show bgp summary";
const SHOW_ISIS_ADJACENCY: &str = "show isis adjacency";
const SHOW_ROUTE: &str = "show route";
const SHOW_ROUTE_IPV6: &str = "show route ipv6";
const SHOW_ROUTE_SUMMARY: &str = "show route summary";
const SHOW_L2VPN_XCONNECT: &str = "show l2vpn xconnect";

fn content_lines(data: &str) -> impl Iterator<Item = &str> {
    data.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !is_timestamp_line(line))
}

/// Multicast forwarding and routing tables, kept as raw lines
pub struct Multicast;

impl FactSubset for Multicast {
    fn name(&self) -> &'static str {
        "multicast"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_MFIB_CONNECTIONS, SHOW_MFIB_COUNTER, SHOW_MRIB_ROUTE])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let routes: Vec<&str> = content_lines(responses.get(SHOW_MRIB_ROUTE)?)
            .filter(|line| line.starts_with('('))
            .collect();

        let mut facts = FactMap::new();
        facts.insert(
            "mfib_connections".into(),
            json!(content_lines(responses.get(SHOW_MFIB_CONNECTIONS)?).collect::<Vec<_>>()),
        );
        facts.insert(
            "mfib_counter".into(),
            json!(content_lines(responses.get(SHOW_MFIB_COUNTER)?).collect::<Vec<_>>()),
        );
        facts.insert("mrib_route_outgoing_if".into(), json!(routes));
        Ok(facts)
    }
}

/// BGP router summary: header lines, per-process table versions and the
/// neighbor table
pub struct Bgp;

const BGP_NEIGHBOR_COLUMNS: [&str; 9] = [
    "Spk", "AS", "MsgRcvd", "MsgSent", "TblVer", "InQ", "OutQ", "Up/Down", "St/PfxRcd",
];

impl FactSubset for Bgp {
    fn name(&self) -> &'static str {
        "bgp"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_BGP_SUMMARY])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let mut info = Vec::new();
        let mut process = Vec::new();
        let mut table = FactMap::new();
        let mut in_table = false;

        for line in content_lines(responses.get(SHOW_BGP_SUMMARY)?) {
            if line.starts_with("Process") || line.starts_with("Speaker") {
                process.push(json!(line));
            } else if line.starts_with("Neighbor") {
                in_table = true;
            } else if in_table {
                let cols: Vec<&str> = line.split_whitespace().collect();
                if cols.len() < 10 {
                    continue;
                }
                let row: FactMap = BGP_NEIGHBOR_COLUMNS
                    .iter()
                    .zip(&cols[1..])
                    .map(|(name, value)| (name.to_string(), json!(value)))
                    .collect();
                table.insert(cols[0].to_string(), Value::Object(row));
            } else if process.is_empty() {
                info.push(json!(line));
            }
        }

        let mut facts = FactMap::new();
        facts.insert("bgp_info".into(), Value::Array(info));
        facts.insert("bgp_process".into(), Value::Array(process));
        facts.insert("bgp_table".into(), Value::Object(table));
        Ok(facts)
    }
}

/// IS-IS adjacencies per level
pub struct Isis;

const ISIS_ADJACENCY_COLUMNS: [&str; 8] =
    ["Interface", "SNPA", "State", "Hold", "Changed", "NSF", "IPv4", "IPv6"];

impl FactSubset for Isis {
    fn name(&self) -> &'static str {
        "isis"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_ISIS_ADJACENCY])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let header = Regex::new(r"IS-IS \S+ Level-(\d) adjacencies:")?;
        let mut levels = FactMap::new();
        levels.insert("Level-1 adjacencies".into(), json!({}));
        levels.insert("Level-2 adjacencies".into(), json!({}));
        let mut current: Option<String> = None;

        for line in content_lines(responses.get(SHOW_ISIS_ADJACENCY)?) {
            if let Some(caps) = header.captures(line) {
                current = Some(format!("Level-{} adjacencies", &caps[1]));
                continue;
            }
            let trimmed = line.trim_start();
            if ["System", "Total", "BFD"].iter().any(|p| trimmed.starts_with(p)) {
                continue;
            }
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 9 {
                continue;
            }
            let Some(Value::Object(table)) = current.as_ref().and_then(|l| levels.get_mut(l)) else {
                continue;
            };
            let row: FactMap = ISIS_ADJACENCY_COLUMNS
                .iter()
                .zip(&cols[1..])
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect();
            table.insert(cols[0].to_string(), Value::Object(row));
        }

        let mut facts = FactMap::new();
        facts.insert("isis_adjacency".into(), Value::Object(levels));
        Ok(facts)
    }
}

/// Per-source route counts from `show route summary`
pub struct RouteSummary;

impl FactSubset for RouteSummary {
    fn name(&self) -> &'static str {
        "route_summary"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_ROUTE_SUMMARY])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let mut summary = FactMap::new();
        for line in content_lines(responses.get(SHOW_ROUTE_SUMMARY)?) {
            if line.starts_with("Route Source") {
                continue;
            }
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 5 {
                continue;
            }
            // Sources such as "isis 1" span several columns
            let (source, counts) = cols.split_at(cols.len() - 4);
            summary.insert(
                source.join(" "),
                json!({
                    "Routes": counts[0],
                    "Backup": counts[1],
                    "Deleted": counts[2],
                    "Memory": counts[3],
                }),
            );
        }

        let mut facts = FactMap::new();
        facts.insert("routing_summary".into(), Value::Object(summary));
        Ok(facts)
    }
}

/// IPv4 and IPv6 routing tables grouped by protocol
pub struct Routes;

impl FactSubset for Routes {
    fn name(&self) -> &'static str {
        "routes"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_ROUTE, SHOW_ROUTE_IPV6])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let mut facts = FactMap::new();
        facts.insert("routing_table_ipv4".into(), parse_route_table(responses.get(SHOW_ROUTE)?)?);
        facts.insert("routing_table_ipv6".into(), parse_route_table(responses.get(SHOW_ROUTE_IPV6)?)?);
        Ok(facts)
    }
}

fn protocol_for(code: &str) -> &str {
    match code.chars().next() {
        Some('B') => "BGP",
        Some('i') => "ISIS",
        Some('C') | Some('L') => "Direct",
        Some('S') => "Static",
        Some('O') => "OSPF",
        _ => code,
    }
}

/// Route being assembled across its wrapped continuation lines
struct RouteCursor {
    protocol: String,
    prefix: String,
    level: Option<String>,
    awaiting_direct: bool,
}

/// Parse everything after "Gateway of last resort" into
/// `{protocol: {prefix: {next hop: {Uptime, Distance, Metric, ...}}}}`.
/// Connected routes carry `{Uptime, Interface}` on the prefix itself.
fn parse_route_table(data: &str) -> Result<Value> {
    let Some(start) = data.find("Gateway of last resort") else {
        bail!("no 'Gateway of last resort' line in route table output");
    };

    let mut table = FactMap::new();
    for protocol in ["BGP", "ISIS", "Direct", "Static"] {
        table.insert(protocol.into(), json!({}));
    }

    let mut cursor: Option<RouteCursor> = None;
    for line in data[start..].lines().skip(1) {
        let cleaned = line.replace(',', " ");
        let tokens: Vec<&str> = cleaned.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        if !line.starts_with(char::is_whitespace) {
            let Some(prefix_idx) = tokens.iter().position(|t| t.contains('/')) else {
                cursor = None;
                continue;
            };
            let mut route = RouteCursor {
                protocol: protocol_for(tokens[0]).to_string(),
                prefix: tokens[prefix_idx].to_string(),
                level: (prefix_idx > 1).then(|| tokens[1].to_string()),
                awaiting_direct: false,
            };
            route_entry(&mut table, &route);
            apply_path(&mut table, &mut route, &tokens[prefix_idx + 1..]);
            cursor = Some(route);
        } else if let Some(route) = cursor.as_mut() {
            apply_path(&mut table, route, &tokens);
        }
    }
    Ok(Value::Object(table))
}

fn route_entry<'a>(table: &'a mut FactMap, route: &RouteCursor) -> Option<&'a mut FactMap> {
    let protocol = table.entry(route.protocol.clone()).or_insert_with(|| json!({}));
    match protocol.as_object_mut()?.entry(route.prefix.clone()).or_insert_with(|| json!({})) {
        Value::Object(entry) => Some(entry),
        _ => None,
    }
}

/// Apply "[d/m] via nh, uptime[, iface]", "is directly connected[, uptime, iface]"
/// or the "uptime, iface" tail of a wrapped connected route
fn apply_path(table: &mut FactMap, route: &mut RouteCursor, tokens: &[&str]) {
    let Some(first) = tokens.first() else {
        return;
    };

    if first.starts_with('[') {
        let (distance, metric) = first
            .trim_matches(|c: char| c == '[' || c == ']')
            .split_once('/')
            .unwrap_or_default();
        let (Some(&"via"), Some(next_hop)) = (tokens.get(1), tokens.get(2)) else {
            return;
        };
        let mut path = FactMap::new();
        path.insert("Uptime".into(), json!(tokens.get(3)));
        path.insert("Distance".into(), json!(distance));
        path.insert("Metric".into(), json!(metric));
        if let Some(interface) = tokens.get(4) {
            path.insert("Interface".into(), json!(interface));
        }
        if let Some(level) = &route.level {
            path.insert("Level".into(), json!(level));
        }
        if let Some(entry) = route_entry(table, route) {
            entry.insert(next_hop.to_string(), Value::Object(path));
        }
        route.awaiting_direct = false;
    } else if tokens.starts_with(&["is", "directly", "connected"]) {
        let rest = &tokens[3..];
        if rest.is_empty() {
            route.awaiting_direct = true;
        } else {
            set_direct(table, route, rest);
        }
    } else if route.awaiting_direct {
        set_direct(table, route, tokens);
        route.awaiting_direct = false;
    }
}

fn set_direct(table: &mut FactMap, route: &RouteCursor, tokens: &[&str]) {
    if let Some(entry) = route_entry(table, route) {
        entry.insert("Uptime".into(), json!(tokens.first()));
        if let Some(interface) = tokens.get(1) {
            entry.insert("Interface".into(), json!(interface));
        }
    }
}

/// Point-to-point cross-connects from `show l2vpn xconnect`
pub struct L2vpn;

const XCONNECT_COLUMNS: usize = 8;

impl FactSubset for L2vpn {
    fn name(&self) -> &'static str {
        "l2vpn"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_L2VPN_XCONNECT])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let mut xconnects = FactMap::new();
        let mut pending: Vec<&str> = Vec::new();

        let rows = responses
            .get(SHOW_L2VPN_XCONNECT)?
            .lines()
            .skip_while(|line| !line.starts_with("--"));

        for line in rows {
            if line.starts_with("--") {
                continue;
            }
            pending.extend(line.split_whitespace());
            if pending.len() < XCONNECT_COLUMNS {
                continue;
            }
            // Group, Name, ST, Segment 1 description, ST, Segment 2 address, PW id, ST
            if pending.len() == XCONNECT_COLUMNS {
                xconnects.insert(
                    pending[1].to_string(),
                    json!({
                        "State": pending[2],
                        "Interface": pending[3],
                        "Address": pending[5],
                    }),
                );
            }
            pending.clear();
        }

        let mut facts = FactMap::new();
        facts.insert("l2vpn".into(), Value::Object(xconnects));
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::respond;

    fn opts() -> GatherOptions {
        GatherOptions::default()
    }

    #[test]
    fn test_multicast() {
        let mrib = "\
Thu Mar  2 10:14:42.154 MET

IP Multicast Routing Information Base
(*,224.0.0.0/4) RPF nbr: 0.0.0.0 Flags: C RPF P
(10.1.1.1,232.1.1.1) RPF nbr: 10.0.0.2 Flags: RPF
  Outgoing Interface Information
";
        let responses = respond(&[
            (SHOW_MFIB_CONNECTIONS, "conn-a\n\nconn-b\n"),
            (SHOW_MFIB_COUNTER, "counter-a\n"),
            (SHOW_MRIB_ROUTE, mrib),
        ]);
        let facts = Multicast.populate(&responses, &opts()).unwrap();
        assert_eq!(facts["mfib_connections"], json!(["conn-a", "conn-b"]));
        assert_eq!(facts["mfib_counter"], json!(["counter-a"]));
        assert_eq!(facts["mrib_route_outgoing_if"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_bgp_summary() {
        let summary = "\
Thu Mar  2 10:14:42.154 MET
BGP router identifier 10.0.0.1, local AS number 65000
BGP generic scan interval 60 secs
BGP is operating in STANDALONE mode.

Process       RcvTblVer   bRIB/RIB   LabelVer  ImportVer  SendTblVer  StandbyVer
Speaker              52         52         52         52          52           0

Neighbor        Spk    AS MsgRcvd MsgSent   TblVer  InQ OutQ  Up/Down  St/PfxRcd
10.0.0.2          0 65001     100     101       52    0    0 1d02h          5
10.0.0.6          0 65002       0       0        0    0    0 00:00:00 Idle
";
        let responses = respond(&[(SHOW_BGP_SUMMARY, summary)]);
        let facts = Bgp.populate(&responses, &opts()).unwrap();

        assert_eq!(facts["bgp_info"].as_array().unwrap().len(), 3);
        assert_eq!(facts["bgp_process"].as_array().unwrap().len(), 2);
        assert_eq!(facts["bgp_table"]["10.0.0.2"]["AS"], json!("65001"));
        assert_eq!(facts["bgp_table"]["10.0.0.2"]["St/PfxRcd"], json!("5"));
        assert_eq!(facts["bgp_table"]["10.0.0.6"]["St/PfxRcd"], json!("Idle"));
        assert!(facts["bgp_table"].get("Neighbor").is_none());
    }

    #[test]
    fn test_isis_adjacency() {
        let adjacency = "\
Thu Mar  2 10:14:42.154 MET

IS-IS 1 Level-1 adjacencies:
System Id      Interface                SNPA           State Hold Changed  NSF IPv4 IPv6
                                                                               BFD  BFD
core-rtr-02    Gi0/0/0/0                *PtoP*         Up    23   1d02h    Yes None None

Total adjacency count: 1

IS-IS 1 Level-2 adjacencies:
System Id      Interface                SNPA           State Hold Changed  NSF IPv4 IPv6
                                                                               BFD  BFD
core-rtr-02    Gi0/0/0/0                *PtoP*         Up    27   1d02h    Yes None None
core-rtr-03    Gi0/0/0/1                *PtoP*         Init  9    00:00:12 Yes None None

Total adjacency count: 2
";
        let responses = respond(&[(SHOW_ISIS_ADJACENCY, adjacency)]);
        let facts = Isis.populate(&responses, &opts()).unwrap();
        let isis = &facts["isis_adjacency"];

        assert_eq!(isis["Level-1 adjacencies"].as_object().unwrap().len(), 1);
        assert_eq!(isis["Level-1 adjacencies"]["core-rtr-02"]["Hold"], json!("23"));
        assert_eq!(isis["Level-2 adjacencies"].as_object().unwrap().len(), 2);
        assert_eq!(isis["Level-2 adjacencies"]["core-rtr-03"]["State"], json!("Init"));
        assert_eq!(isis["Level-2 adjacencies"]["core-rtr-03"]["IPv6"], json!("None"));
    }

    #[test]
    fn test_isis_without_adjacencies() {
        let responses = respond(&[(SHOW_ISIS_ADJACENCY, "")]);
        let facts = Isis.populate(&responses, &opts()).unwrap();
        assert_eq!(
            facts["isis_adjacency"],
            json!({ "Level-1 adjacencies": {}, "Level-2 adjacencies": {} })
        );
    }

    #[test]
    fn test_route_summary() {
        let summary = "\
Thu Mar  2 10:14:42.154 MET
Route Source                     Routes     Backup     Deleted     Memory(bytes)
connected                        4          0          0           960
local                            4          0          0           960
isis 1                           120        2          0           28800
Total                            128        2          0           30720
";
        let responses = respond(&[(SHOW_ROUTE_SUMMARY, summary)]);
        let facts = RouteSummary.populate(&responses, &opts()).unwrap();
        let summary = &facts["routing_summary"];
        assert_eq!(summary["isis 1"]["Routes"], json!("120"));
        assert_eq!(summary["isis 1"]["Backup"], json!("2"));
        assert_eq!(summary["Total"]["Memory"], json!("30720"));
        assert!(summary.get("Route Source").is_none());
    }

    const ROUTE_V4: &str = "\
Thu Mar  2 10:14:42.154 MET

Codes: C - connected, S - static, R - RIP, B - BGP, (>) - Diversion path
       i - ISIS, L1 - IS-IS level-1, L2 - IS-IS level-2
       A - access/subscriber, a - Application route

Gateway of last resort is 10.0.0.2 to network 0.0.0.0

B    0.0.0.0/0 [20/0] via 10.0.0.2, 1d02h
i L2 10.1.1.1/32 [115/20] via 10.0.0.6, 1d02h, GigabitEthernet0/0/0/1
                 [115/20] via 10.0.0.10, 1d02h, GigabitEthernet0/0/0/2
C    10.0.0.4/30 is directly connected, 1d02h, GigabitEthernet0/0/0/1
S    192.168.0.0/16 [1/0] via 10.0.0.2, 3w1d
";

    const ROUTE_V6: &str = "\
Thu Mar  2 10:14:43.001 MET

Codes: C - connected, S - static, R - RIP, B - BGP, (>) - Diversion path

Gateway of last resort is not set

B    2001:db8:100::/48
      [20/0] via fe80::1, 1d02h, GigabitEthernet0/0/0/0
C    2001:db8::/64 is directly connected,
      1d02h, GigabitEthernet0/0/0/0
L    2001:db8::1/128 is directly connected,
      1d02h, GigabitEthernet0/0/0/0
";

    #[test]
    fn test_routes_ipv4() {
        let table = parse_route_table(ROUTE_V4).unwrap();

        assert_eq!(
            table["BGP"]["0.0.0.0/0"]["10.0.0.2"],
            json!({ "Uptime": "1d02h", "Distance": "20", "Metric": "0" })
        );

        let isis = &table["ISIS"]["10.1.1.1/32"];
        assert_eq!(isis.as_object().unwrap().len(), 2);
        assert_eq!(isis["10.0.0.10"]["Interface"], json!("GigabitEthernet0/0/0/2"));
        assert_eq!(isis["10.0.0.6"]["Level"], json!("L2"));
        assert_eq!(isis["10.0.0.6"]["Metric"], json!("20"));

        assert_eq!(
            table["Direct"]["10.0.0.4/30"],
            json!({ "Uptime": "1d02h", "Interface": "GigabitEthernet0/0/0/1" })
        );
        assert_eq!(table["Static"]["192.168.0.0/16"]["10.0.0.2"]["Uptime"], json!("3w1d"));
    }

    #[test]
    fn test_routes_ipv6_wrapped_lines() {
        let table = parse_route_table(ROUTE_V6).unwrap();

        assert_eq!(
            table["BGP"]["2001:db8:100::/48"]["fe80::1"]["Interface"],
            json!("GigabitEthernet0/0/0/0")
        );
        assert_eq!(
            table["Direct"]["2001:db8::/64"],
            json!({ "Uptime": "1d02h", "Interface": "GigabitEthernet0/0/0/0" })
        );
        assert!(table["Direct"].get("2001:db8::1/128").is_some());
        assert_eq!(table["ISIS"], json!({}));
    }

    #[test]
    fn test_routes_without_gateway_line_fail() {
        let responses = respond(&[(SHOW_ROUTE, "% No matching routes found"), (SHOW_ROUTE_IPV6, ROUTE_V6)]);
        assert!(Routes.populate(&responses, &opts()).is_err());
    }

    #[test]
    fn test_l2vpn_xconnect() {
        let xconnect = "\
Thu Mar  2 10:14:42.154 MET
Legend: ST = State, UP = Up, DN = Down, AD = Admin Down, UR = Unresolved,
        SB = Standby, SR = Standby Ready, (PP) = Partially Programmed

XConnect                   Segment 1                       Segment 2
Group      Name       ST   Description            ST       Description            ST
------------------------   -----------------------------   -----------------------------
vpws       cust-a     UP   Gi0/0/0/3.100          UP       10.0.0.9       100    UP
------------------------------------------------------------------------------------------
vpws-long-group-name
           cust-b     DN   Gi0/0/0/3.200          UP       10.0.0.9       200    DN
------------------------------------------------------------------------------------------
";
        let responses = respond(&[(SHOW_L2VPN_XCONNECT, xconnect)]);
        let facts = L2vpn.populate(&responses, &opts()).unwrap();
        assert_eq!(
            facts["l2vpn"],
            json!({
                "cust-a": { "State": "UP", "Interface": "Gi0/0/0/3.100", "Address": "10.0.0.9" },
                "cust-b": { "State": "DN", "Interface": "Gi0/0/0/3.200", "Address": "10.0.0.9" }
            })
        );
    }
}
