use anyhow::Result;
use regex_lite::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{commands, is_timestamp_line};
use crate::facts::{FactMap, FactSubset, GatherOptions, Responses};
use crate::utils::{capture, capture_groups};

const SHOW_INTERFACES: &str = "show interfaces";
const SHOW_IPV6_INTERFACE: &str = "show ipv6 interface";
const SHOW_LLDP: &str = "show lldp";
const SHOW_LLDP_NEIGHBORS: &str = "show lldp neighbors detail";
const SHOW_OPTICS: &str = "show controller TenGigE * phy";

/// Separator between entries of `show lldp neighbors detail`
const LLDP_SEPARATOR: &str = "------------------------------------------------";

/// Per-interface state, addresses and LLDP neighbors
pub struct Interfaces;

impl FactSubset for Interfaces {
    fn name(&self) -> &'static str {
        "interfaces"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_INTERFACES, SHOW_IPV6_INTERFACE, SHOW_LLDP, SHOW_LLDP_NEIGHBORS])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let mut all_ipv4 = Vec::new();
        let mut all_ipv6 = Vec::new();

        let mut interfaces = FactMap::new();
        for (name, block) in split_blocks(responses.get(SHOW_INTERFACES)?) {
            let intf = parse_interface(&block);
            if let Some(address) = intf.get("ipv4").and_then(|v| v.get("address")) {
                all_ipv4.push(address.clone());
            }
            interfaces.insert(name, Value::Object(intf));
        }

        for (name, block) in split_blocks(responses.get(SHOW_IPV6_INTERFACE)?) {
            if name == "No" || name == "RPF" || name.starts_with("IP") {
                continue;
            }
            let Some(Value::Object(intf)) = interfaces.get_mut(&name) else {
                continue;
            };
            let addresses = parse_ipv6_addresses(&block);
            all_ipv6.extend(addresses.iter().map(|a| a["address"].clone()));
            intf.insert("ipv6".into(), Value::Array(addresses));
        }

        let mut facts = FactMap::new();
        facts.insert("interfaces".into(), Value::Object(interfaces));
        facts.insert("all_ipv4_addresses".into(), Value::Array(all_ipv4));
        facts.insert("all_ipv6_addresses".into(), Value::Array(all_ipv6));

        // XR rejects "show lldp" with "% LLDP is not enabled" when it is off
        let lldp_enabled = responses
            .get(SHOW_LLDP)
            .map(|reply| !reply.contains("LLDP is not enabled"))
            .unwrap_or(false);
        if lldp_enabled {
            facts.insert("neighbors".into(), parse_neighbors(responses.get(SHOW_LLDP_NEIGHBORS)?));
        }
        Ok(facts)
    }
}

/// Group output into blocks keyed by the first word of each unindented line;
/// indented lines belong to the block above them
fn split_blocks(data: &str) -> BTreeMap<String, String> {
    let mut blocks: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in data.lines() {
        if line.trim().is_empty() || is_timestamp_line(line) {
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            if let Some(block) = current.as_ref().and_then(|key| blocks.get_mut(key)) {
                block.push('\n');
                block.push_str(line);
            }
        } else if let Some(key) = line.split_whitespace().next() {
            blocks.insert(key.to_string(), line.to_string());
            current = Some(key.to_string());
        }
    }
    blocks
}

fn parse_interface(block: &str) -> FactMap {
    let number = |pattern: &str| capture(pattern, block, 1).and_then(|v| v.parse::<u64>().ok());

    let ipv4 = capture_groups(r"Internet address is (\S+)/(\d+)", block).map(|g| {
        json!({ "address": g[0], "masklen": g[1].parse::<u8>().ok() })
    });

    let mut intf = FactMap::new();
    intf.insert("description".into(), json!(capture(r"(?m)Description: (.+)$", block, 1)));
    intf.insert("macaddress".into(), json!(capture(r"address is (\S+)", block, 1)));
    intf.insert("ipv4".into(), json!(ipv4));
    intf.insert("mtu".into(), json!(number(r"MTU (\d+)")));
    intf.insert("bandwidth".into(), json!(number(r"BW (\d+)")));
    intf.insert("duplex".into(), json!(capture(r"(?i)(\w+)[- ]duplex", block, 1)));
    intf.insert("lineprotocol".into(), json!(capture(r"(?m)line protocol is (.+?)\s*$", block, 1)));
    intf.insert("operstatus".into(), json!(capture(r"(?m)^\S+ is (.+?),", block, 1)));
    intf.insert("type".into(), json!(capture(r"(?m)Hardware is (.+?),", block, 1)));
    intf
}

/// "2001:db8::1, subnet is 2001:db8::/64" lines of one interface block
fn parse_ipv6_addresses(block: &str) -> Vec<Value> {
    let Ok(re) = Regex::new(r"(?m)^\s*(\S+), subnet is (\S+)") else {
        return Vec::new();
    };
    re.captures_iter(block)
        .map(|caps| json!({ "address": &caps[1], "subnet": &caps[2] }))
        .collect()
}

/// Local interface -> list of {host, port} seen on it
fn parse_neighbors(data: &str) -> Value {
    let mut neighbors = FactMap::new();
    for entry in data.split(LLDP_SEPARATOR).skip(1) {
        let Some(intf) = capture(r"(?m)^Local Interface: (.+?)\s*$", entry, 1) else {
            continue;
        };
        let neighbor = json!({
            "host": capture(r"(?m)System Name: (.+?)\s*$", entry, 1),
            "port": capture(r"(?m)Port id: (.+?)\s*$", entry, 1),
        });
        if let Value::Array(list) = neighbors.entry(intf).or_insert_with(|| json!([])) {
            list.push(neighbor);
        }
    }
    Value::Object(neighbors)
}

/// TenGigE transceiver identity and optical power levels
pub struct Optics;

impl FactSubset for Optics {
    fn name(&self) -> &'static str {
        "optics"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_OPTICS])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let mut facts = FactMap::new();
        facts.insert("optics".into(), parse_optics(responses.get(SHOW_OPTICS)?));
        Ok(facts)
    }
}

/// One `{xfp line: {TX, RX}}` entry per transceiver; ports without a module
/// ("XFP #...") are listed as plain lines
fn parse_optics(data: &str) -> Value {
    let matcher = |pattern: &str| Regex::new(pattern).ok();
    let no_xfp_re = matcher(r"XFP #(.+)$");
    let xfp_re = matcher(r"XFP (.+) port:(.+)$");
    let tx_re = matcher(r"Tx Power:  (.+)$");
    let rx_re = matcher(r"Rx Power:  (.+)$");
    let find = |re: &Option<Regex>, line: &str| {
        re.as_ref().and_then(|re| re.find(line)).map(|m| m.as_str().to_string())
    };

    let mut optics = Vec::new();
    let (mut xfp, mut tx, mut rx) = (String::new(), String::new(), String::new());

    for line in data.lines().map(str::trim_end) {
        if let Some(m) = find(&xfp_re, line) {
            xfp = m;
        }
        if let Some(m) = find(&tx_re, line) {
            tx = m;
        }
        if let Some(m) = find(&rx_re, line) {
            rx = m;
        }

        if !xfp.is_empty() && !tx.is_empty() && !rx.is_empty() {
            let mut entry = FactMap::new();
            entry.insert(
                std::mem::take(&mut xfp),
                json!({ "TX": std::mem::take(&mut tx), "RX": std::mem::take(&mut rx) }),
            );
            optics.push(Value::Object(entry));
        } else if let Some(m) = find(&no_xfp_re, line) {
            optics.push(Value::String(m));
        }
    }
    Value::Array(optics)
}
