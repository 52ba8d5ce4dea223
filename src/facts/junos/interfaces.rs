use anyhow::Result;
use serde_json::Value;

use super::{check_model, gated_commands, leaf_children, renamed_fields};
use crate::facts::{FactMap, FactSubset, GatherOptions, Responses};
use crate::xml::Element;

const INTERFACE_DETAIL: &str = "<get-interface-information><detail/></get-interface-information>";
const OPTICS_DIAGNOSTICS: &str = "<get-interface-optics-diagnostics-information/>";

const PHYSICAL_SECTIONS: &[&str] = &[
    "traffic-statistics",
    "if-device-flags",
    "ifd-specific-config-flags",
    "if-config-flags",
];

const LOGICAL_SECTIONS: &[&str] = &[
    "traffic-statistics",
    "local-traffic-statistics",
    "transit-traffic-statistics",
    "filter-information",
];

/// Basic status of each physical interface
pub struct Interfaces;

impl FactSubset for Interfaces {
    fn name(&self) -> &'static str {
        "interfaces"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        vec![INTERFACE_DETAIL.to_string()]
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let reply = responses.xml(INTERFACE_DETAIL)?;

        let mut interfaces = FactMap::new();
        for item in reply.iter("physical-interface") {
            let Some(name) = item.child_text("name") else {
                continue;
            };
            let intf = renamed_fields(
                Some(item),
                &[
                    ("oper-status", "oper-status"),
                    ("admin-status", "admin-status"),
                    ("speed", "speed"),
                    ("macaddress", "hardware-physical-address"),
                    ("mtu", "mtu"),
                    ("type", "if-type"),
                    ("description", "description"),
                ],
            );
            interfaces.insert(name, Value::Object(intf));
        }

        let mut facts = FactMap::new();
        facts.insert("interfaces".into(), Value::Object(interfaces));
        Ok(facts)
    }
}

/// Full interface detail: counters, flags, logical units and address families
pub struct InterfacesExt;

/// Leaf values of a section plus one level of nested sections keyed by tag
fn section(element: &Element) -> FactMap {
    let mut map = leaf_children(element, &[]);
    for child in element.children.iter().filter(|c| c.has_children()) {
        map.insert(child.tag.clone(), Value::Object(leaf_children(child, &[])));
    }
    map
}

fn logical_interface(logical: &Element) -> FactMap {
    let mut unit = leaf_children(logical, &["name"]);
    for child in &logical.children {
        if LOGICAL_SECTIONS.contains(&child.tag.as_str()) {
            unit.insert(child.tag.clone(), Value::Object(section(child)));
        }
    }

    let mut families = FactMap::new();
    for family in logical.children.iter().filter(|c| c.tag == "address-family") {
        let Some(name) = family.child_text("address-family-name") else {
            continue;
        };
        families.insert(name, Value::Object(section(family)));
    }
    unit.insert("address-family".into(), Value::Object(families));
    unit
}

impl FactSubset for InterfacesExt {
    fn name(&self) -> &'static str {
        "interfaces_ext"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        vec![INTERFACE_DETAIL.to_string()]
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let reply = responses.xml(INTERFACE_DETAIL)?;

        let mut interfaces = FactMap::new();
        for item in reply.iter("physical-interface") {
            let Some(name) = item.child_text("name") else {
                continue;
            };
            let mut intf = leaf_children(item, &["name"]);
            for child in &item.children {
                if PHYSICAL_SECTIONS.contains(&child.tag.as_str()) {
                    intf.insert(child.tag.clone(), Value::Object(section(child)));
                } else if child.tag == "logical-interface" {
                    if let Some(unit) = child.child_text("name") {
                        intf.insert(unit, Value::Object(logical_interface(child)));
                    }
                }
            }
            interfaces.insert(name, Value::Object(intf));
        }

        let mut facts = FactMap::new();
        facts.insert("interfaces_ext".into(), Value::Object(interfaces));
        Ok(facts)
    }
}

/// Per-port optical diagnostics
pub struct Optics;

impl FactSubset for Optics {
    fn name(&self) -> &'static str {
        "optics"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[OPTICS_DIAGNOSTICS])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["optics"])? {
            return Ok(facts);
        }

        let reply = responses.xml(OPTICS_DIAGNOSTICS)?;
        let mut optics = FactMap::new();
        for item in reply.iter("physical-interface") {
            let Some(name) = item.child_text("name") else {
                continue;
            };
            let diagnostics = item
                .child("optics-diagnostics")
                .map(|d| leaf_children(d, &[]))
                .unwrap_or_default();
            optics.insert(name, Value::Object(diagnostics));
        }

        let mut facts = FactMap::new();
        facts.insert("optics".into(), Value::Object(optics));
        Ok(facts)
    }
}
