use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use super::{check_model, fields, gated_commands, is_enabled, renamed_fields, text};
use crate::facts::{FactMap, FactSubset, GatherOptions, Responses};
use crate::xml::Element;

const BGP_SUMMARY: &str = "<get-bgp-summary-information/>";
const BGP_NEIGHBORS: &str = "<get-bgp-neighbor-information/>";
const ROUTE_SUMMARY: &str = "<get-route-summary-information/>";
const ROUTES: &str = "<get-route-information/>";
const ISIS_OVERVIEW: &str = "<get-isis-overview-information/>";
const L2CIRCUIT_CONNECTIONS: &str = "<get-l2ckt-connection-information/>";

const RIB_COUNTERS: &[&str] = &[
    "total-prefix-count",
    "received-prefix-count",
    "accepted-prefix-count",
    "active-prefix-count",
    "suppressed-prefix-count",
    "history-prefix-count",
    "damped-prefix-count",
    "total-external-prefix-count",
    "active-external-prefix-count",
    "suppressed-external-prefix-count",
    "total-internal-prefix-count",
    "active-internal-prefix-count",
    "accepted-internal-prefix-count",
    "suppressed-internal-prefix-count",
    "pending-prefix-count",
    "bgp-rib-state",
];

const TABLE_COUNTERS: &[&str] = &[
    "destination-count",
    "total-route-count",
    "active-route-count",
    "holddown-route-count",
    "hidden-route-count",
];

fn children<'a>(element: &'a Element, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    element.children.iter().filter(move |c| c.tag == tag)
}

/// Reply text when the device returned plain `<output>` instead of
/// structured BGP data (BGP not configured)
fn plain_output(reply: &Element) -> Value {
    reply
        .find("output")
        .map(|o| json!(o.text()))
        .unwrap_or(Value::Null)
}

/// BGP RIB counters and per-peer session summary
pub struct BgpSummary;

impl FactSubset for BgpSummary {
    fn name(&self) -> &'static str {
        "bgp_summary"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[BGP_SUMMARY])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["bgp_summary"])? {
            return Ok(facts);
        }

        let reply = responses.xml(BGP_SUMMARY)?;
        let summary = match reply.find("bgp-information") {
            Some(bgp) => Value::Object(bgp_summary(bgp)),
            None => plain_output(&reply),
        };

        let mut facts = FactMap::new();
        facts.insert("bgp_summary".into(), summary);
        Ok(facts)
    }
}

fn bgp_summary(bgp: &Element) -> FactMap {
    let mut ribs = FactMap::new();
    for rib in children(bgp, "bgp-rib") {
        if let Some(name) = rib.child_text("name") {
            ribs.insert(name, Value::Object(fields(Some(rib), RIB_COUNTERS)));
        }
    }

    let mut peers = FactMap::new();
    for peer in bgp.iter("bgp-peer") {
        let Some(address) = peer.child_text("peer-address") else {
            continue;
        };
        let mut entry = fields(
            Some(peer),
            &[
                "peer-as",
                "input-messages",
                "output-messages",
                "route-queue-count",
                "flap-count",
                "elapsed-time",
                "peer-state",
            ],
        );
        for rib in children(peer, "bgp-rib") {
            if let Some(name) = rib.child_text("name") {
                let counters = fields(
                    Some(rib),
                    &[
                        "received-prefix-count",
                        "accepted-prefix-count",
                        "active-prefix-count",
                        "suppressed-prefix-count",
                    ],
                );
                entry.insert(name, Value::Object(counters));
            }
        }
        peers.insert(address, Value::Object(entry));
    }

    let mut summary = fields(Some(bgp), &["group-count", "peer-count", "down-peer-count"]);
    summary.insert("rib".into(), Value::Object(ribs));
    summary.insert("peer".into(), Value::Object(peers));
    summary
}

/// Detailed BGP neighbor state, options and per-RIB counters
pub struct BgpPeers;

impl FactSubset for BgpPeers {
    fn name(&self) -> &'static str {
        "bgp_peers"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[BGP_NEIGHBORS])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["bgp_neighbors"])? {
            return Ok(facts);
        }

        let reply = responses.xml(BGP_NEIGHBORS)?;
        let neighbors = match reply.find("bgp-information") {
            Some(bgp) => Value::Object(bgp_neighbors(bgp)),
            None => plain_output(&reply),
        };

        let mut facts = FactMap::new();
        facts.insert("bgp_neighbors".into(), neighbors);
        Ok(facts)
    }
}

fn bgp_neighbors(bgp: &Element) -> FactMap {
    let mut neighbors = FactMap::new();
    for peer in bgp.iter("bgp-peer") {
        let Some(address) = peer.child_text("peer-address") else {
            continue;
        };
        let mut entry = fields(
            Some(peer),
            &[
                "peer-as",
                "local-address",
                "local-as",
                "peer-type",
                "peer-state",
                "peer-flags",
                "last-state",
                "last-error",
                "flap-count",
                "peer-id",
                "local-id",
                "local-interface-name",
                "peer-restart-nlri-configured",
                "nlri-type-peer",
                "nlri-type-session",
            ],
        );

        let options = fields(
            peer.find("bgp-option-information"),
            &["export-policy", "import-policy", "bgp-options2", "address-families"],
        );
        entry.insert("options".into(), Value::Object(options));

        for rib in children(peer, "bgp-rib") {
            if let Some(name) = rib.child_text("name") {
                let counters = fields(
                    Some(rib),
                    &[
                        "send-state",
                        "active-prefix-count",
                        "received-prefix-count",
                        "accepted-prefix-count",
                        "suppressed-prefix-count",
                    ],
                );
                entry.insert(name, Value::Object(counters));
            }
        }
        neighbors.insert(address, Value::Object(entry));
    }
    neighbors
}

/// Route counts per table and protocol
pub struct RouteSummary;

impl FactSubset for RouteSummary {
    fn name(&self) -> &'static str {
        "route_summary"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[ROUTE_SUMMARY])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["route_summary"])? {
            return Ok(facts);
        }

        let reply = responses.xml(ROUTE_SUMMARY)?;
        let info = reply
            .find("route-summary-information")
            .ok_or_else(|| anyhow!("reply carries no route-summary-information"))?;

        let mut instance = FactMap::new();
        instance.insert("router-id".into(), text(Some(info), "router-id"));
        for table in children(info, "route-table") {
            let Some(name) = table.child_text("table-name") else {
                continue;
            };
            let mut counters = fields(Some(table), TABLE_COUNTERS);
            for protocol in children(table, "protocols") {
                if let Some(protocol_name) = protocol.child_text("protocol-name") {
                    let counts = fields(Some(protocol), &["protocol-route-count", "active-route-count"]);
                    counters.insert(protocol_name, Value::Object(counts));
                }
            }
            instance.insert(name, Value::Object(counters));
        }

        // Keyed by local AS; routers without one are listed under "none"
        let as_number = info.child_text("as-number").unwrap_or_else(|| "none".to_string());
        let mut summary = FactMap::new();
        summary.insert(as_number, Value::Object(instance));

        let mut facts = FactMap::new();
        facts.insert("route_summary".into(), Value::Object(summary));
        Ok(facts)
    }
}

/// Full routing tables: destination -> entries -> next hops
pub struct Routes;

impl FactSubset for Routes {
    fn name(&self) -> &'static str {
        "routes"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[ROUTES])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["routes"])? {
            return Ok(facts);
        }

        let reply = responses.xml(ROUTES)?;
        let mut tables = FactMap::new();
        for table in reply.iter("route-table") {
            let Some(name) = table.child_text("table-name") else {
                continue;
            };
            let mut entry = fields(Some(table), TABLE_COUNTERS);
            entry.insert("routing-table".into(), Value::Object(routing_table(table)));
            tables.insert(name, Value::Object(entry));
        }

        let mut facts = FactMap::new();
        facts.insert("routes".into(), Value::Object(tables));
        Ok(facts)
    }
}

fn flag(element: &Element, tag: &str) -> Value {
    json!(element.child(tag).is_some())
}

fn routing_table(table: &Element) -> FactMap {
    let mut destinations = FactMap::new();
    for rt in children(table, "rt") {
        let Some(destination) = rt.child_text("rt-destination") else {
            continue;
        };
        let entries: Vec<Value> = children(rt, "rt-entry")
            .map(|rt_entry| {
                let mut entry = fields(
                    Some(rt_entry),
                    &[
                        "active-tag",
                        "protocol-name",
                        "preference",
                        "age",
                        "local-preference",
                        "learned-from",
                        "as-path",
                    ],
                );
                entry.insert("current-active".into(), flag(rt_entry, "current-active"));
                entry.insert("last-active".into(), flag(rt_entry, "last-active"));

                let next_hops: Vec<Value> = children(rt_entry, "nh")
                    .map(|nh| {
                        let mut hop = fields(Some(nh), &["to", "via"]);
                        hop.insert("selected-next-hop".into(), flag(nh, "selected-next-hop"));
                        Value::Object(hop)
                    })
                    .collect();
                entry.insert("nh".into(), Value::Array(next_hops));
                Value::Object(entry)
            })
            .collect();
        destinations.insert(destination, Value::Array(entries));
    }
    destinations
}

/// IS-IS instance settings, SPF timers and per-level preferences
pub struct IsisOverview;

impl FactSubset for IsisOverview {
    fn name(&self) -> &'static str {
        "isis_overview"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[ISIS_OVERVIEW])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["isis_overview"])? {
            return Ok(facts);
        }

        let reply = responses.xml(ISIS_OVERVIEW)?;
        let mut instances = FactMap::new();
        for overview in reply.iter("isis-overview") {
            let Some(name) = overview.child_text("instance-name") else {
                continue;
            };
            instances.insert(name, Value::Object(isis_instance(overview)));
        }

        let mut facts = FactMap::new();
        facts.insert("isis_overview".into(), Value::Object(instances));
        Ok(facts)
    }
}

fn isis_instance(overview: &Element) -> FactMap {
    let mut instance = renamed_fields(
        Some(overview),
        &[
            ("router-id", "isis-router-id"),
            ("router-hostname", "isis-router-hostname"),
            ("router-sysid", "isis-router-sysid"),
            ("router-areaid", "isis-router-areaid"),
            ("adjacency-holddown", "isis-adjacency-holddown"),
            ("max-areas", "isis-max-areas"),
            ("lsp-lifetime", "isis-lsp-lifetime"),
            ("attached-bit-evaluation", "isis-attached-bit-evaluation"),
        ],
    );

    instance.extend(renamed_fields(
        overview.find("isis-spf-information"),
        &[
            ("spf-delay", "isis-spf-delay"),
            ("spf-holddown", "isis-spf-holddown"),
            ("spf-rapid-runs", "isis-spf-rapid-runs"),
        ],
    ));

    let routing = overview.find("isis-routing");
    instance.insert("routing-ipv4".into(), is_enabled(routing, "isis-routing-ipv4"));
    instance.insert("routing-ipv6".into(), is_enabled(routing, "isis-routing-ipv6"));

    instance.insert(
        "traffic-engineering".into(),
        text(overview.find("isis-traffic-engineering"), "isis-te-status"),
    );

    let restart = overview.find("isis-restart");
    instance.insert("restart".into(), text(restart, "isis-restart-enabled"));
    instance.insert("helper-mode".into(), text(restart, "isis-restart-helper-mode-enabled"));
    instance.insert("spring".into(), text(overview.find("isis-spring"), "isis-spring-enabled"));

    for level in overview.iter("isis-level-information") {
        let Some(number) = level.child_text("isis-level") else {
            continue;
        };
        let mut settings = renamed_fields(
            Some(level),
            &[
                ("preference", "isis-preference"),
                ("external-preference", "isis-external-preference"),
                ("prefix-export-count", "isis-prefix-export-count"),
            ],
        );
        settings.insert("narrow-metrics".into(), is_enabled(Some(level), "isis-narrow-metrics"));
        settings.insert("wide-metrics".into(), is_enabled(Some(level), "isis-wide-metrics"));
        instance.insert(format!("level{}", number), Value::Object(settings));
    }
    instance
}

/// Layer-2 circuits per neighbor and connection
pub struct L2vpn;

impl FactSubset for L2vpn {
    fn name(&self) -> &'static str {
        "l2vpn"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[L2CIRCUIT_CONNECTIONS])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["l2vpn"])? {
            return Ok(facts);
        }

        let reply = responses.xml(L2CIRCUIT_CONNECTIONS)?;
        let mut neighbors = FactMap::new();
        for neighbor in reply.iter("l2circuit-neighbor") {
            let Some(address) = neighbor.child_text("neighbor-address") else {
                continue;
            };
            let mut connections = FactMap::new();
            for conn in children(neighbor, "connection") {
                let Some(id) = conn.child_text("connection-id") else {
                    continue;
                };
                connections.insert(id, Value::Object(l2_connection(conn)));
            }
            neighbors.insert(address, Value::Object(connections));
        }

        let mut facts = FactMap::new();
        facts.insert("l2vpn".into(), Value::Object(neighbors));
        Ok(facts)
    }
}

fn l2_connection(conn: &Element) -> FactMap {
    let mut entry = renamed_fields(
        Some(conn),
        &[
            ("type", "connection-type"),
            ("status", "connection-status"),
            ("last-change", "last-change"),
            ("up-transitions", "up-transitions"),
            ("remote-pe", "remote-pe"),
            ("control-word", "control-word"),
            ("inbound-label", "inbound-label"),
            ("outbound-label", "outbound-label"),
            ("pw-status-tlv", "pw-status-tlv"),
            ("vc-flow-label-transmit", "vc-flow-label-transmit"),
            ("vc-flow-label-receive", "vc-flow-label-receive"),
        ],
    );
    entry.extend(fields(
        conn.child("local-interface"),
        &["interface-name", "interface-status", "interface-encapsulation"],
    ));
    entry
}
