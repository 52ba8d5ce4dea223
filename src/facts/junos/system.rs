use anyhow::{bail, Result};
use serde_json::{json, Value};

use super::{check_model, fields, gated_commands, leaf_children, product_model, text, NOT_SUPPORTED, SOFTWARE_INFORMATION};
use crate::facts::{FactMap, FactSubset, GatherOptions, Responses, DEFAULT_SUBSET};
use crate::models::ConfigFormat;
use crate::xml::Element;

const CHASSIS_INVENTORY: &str = "<get-chassis-inventory/>";
const MEMORY_INFORMATION: &str = "<get-system-memory-information/>";
const SYSTEM_STORAGE: &str = "<get-system-storage/>";
const ENVIRONMENT_INFORMATION: &str = "<get-environment-information/>";
const SNAPSHOT_INFORMATION: &str = "<get-snapshot-information/>";
const ROUTE_ENGINE_INFORMATION: &str = "<get-route-engine-information/>";

/// Hostname, version, model and chassis serial number
pub struct DefaultFacts;

impl FactSubset for DefaultFacts {
    fn name(&self) -> &'static str {
        DEFAULT_SUBSET
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        vec![SOFTWARE_INFORMATION.to_string(), CHASSIS_INVENTORY.to_string()]
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let software = responses.xml(SOFTWARE_INFORMATION)?;
        let software = software.find("software-information");
        let inventory = responses.xml(CHASSIS_INVENTORY)?;
        let chassis = inventory
            .find("chassis-inventory")
            .and_then(|inv| inv.child("chassis"));

        let mut facts = FactMap::new();
        facts.insert("hostname".into(), text(software, "host-name"));
        facts.insert("version".into(), text(software, "junos-version"));
        facts.insert("model".into(), text(software, "product-model"));
        facts.insert("serialnum".into(), text(chassis, "serial-number"));
        Ok(facts)
    }
}

/// Memory totals and mounted filesystems
pub struct Hardware;

/// Memory counters are reported in kilobytes
fn kilobytes_to_mb(value: &Value) -> Value {
    value
        .as_str()
        .and_then(|v| v.split_whitespace().next())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|kb| json!(kb / 1024))
        .unwrap_or(Value::Null)
}

impl FactSubset for Hardware {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        vec![MEMORY_INFORMATION.to_string(), SYSTEM_STORAGE.to_string()]
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let memory = responses.xml(MEMORY_INFORMATION)?;
        let summary = memory.find("system-memory-summary-information");
        let storage = responses.xml(SYSTEM_STORAGE)?;

        let filesystems: Vec<String> = storage
            .iter("filesystem")
            .into_iter()
            .filter_map(|fs| fs.child_text("filesystem-name"))
            .collect();

        let mut facts = FactMap::new();
        facts.insert("memfree_mb".into(), kilobytes_to_mb(&text(summary, "system-memory-free")));
        facts.insert("memtotal_mb".into(), kilobytes_to_mb(&text(summary, "system-memory-total")));
        facts.insert("filesystems".into(), json!(filesystems));
        Ok(facts)
    }
}

/// Active configuration in the requested format
pub struct Config;

fn configuration_rpc(format: ConfigFormat) -> String {
    format!(r#"<get-configuration format="{}"/>"#, format.as_str())
}

/// Raw `<configuration ...>...</configuration>` markup from the reply
fn configuration_markup(reply: &str) -> Option<&str> {
    let start = reply.match_indices("<configuration").find_map(|(idx, tag)| {
        match reply[idx + tag.len()..].chars().next() {
            Some(' ') | Some('>') | Some('\n') | Some('/') => Some(idx),
            _ => None,
        }
    })?;
    let closing = "</configuration>";
    let end = reply.rfind(closing)? + closing.len();
    (end > start).then(|| &reply[start..end])
}

impl FactSubset for Config {
    fn name(&self) -> &'static str {
        "config"
    }

    fn commands(&self, opts: &GatherOptions) -> Vec<String> {
        vec![configuration_rpc(opts.config_format)]
    }

    fn populate(&self, responses: &Responses<'_>, opts: &GatherOptions) -> Result<FactMap> {
        let rpc = configuration_rpc(opts.config_format);
        let config = match opts.config_format {
            ConfigFormat::Xml => match configuration_markup(responses.get(&rpc)?) {
                Some(markup) => markup.to_string(),
                None => bail!("reply carries no <configuration> element"),
            },
            ConfigFormat::Text => text_of(&responses.xml(&rpc)?, "configuration-text"),
            ConfigFormat::Set => text_of(&responses.xml(&rpc)?, "configuration-set"),
            ConfigFormat::Json => responses.xml(&rpc)?.text().to_string(),
        };

        let mut facts = FactMap::new();
        facts.insert("config".into(), json!(config));
        Ok(facts)
    }
}

fn text_of(reply: &Element, tag: &str) -> String {
    reply
        .find(tag)
        .map(|e| e.text().to_string())
        .unwrap_or_default()
}

/// Temperature sensors and fans from the environment table
pub struct Temperatures;

impl FactSubset for Temperatures {
    fn name(&self) -> &'static str {
        "temperatures"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[ENVIRONMENT_INFORMATION])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["temperature", "fans"])? {
            return Ok(facts);
        }

        let reply = responses.xml(ENVIRONMENT_INFORMATION)?;
        let mut temperature = FactMap::new();
        let mut fans = FactMap::new();

        for item in reply.iter("environment-item") {
            let Some(name) = item.child_text("name") else {
                continue;
            };
            match item.child_text("class").as_deref() {
                None | Some("Temp") => {
                    temperature.insert(name, Value::Object(fields(Some(item), &["status", "temperature"])));
                }
                Some("Fans") => {
                    fans.insert(name, Value::Object(fields(Some(item), &["status", "comment"])));
                }
                Some(_) => {}
            }
        }

        let mut facts = FactMap::new();
        facts.insert("temperature".into(), Value::Object(temperature));
        facts.insert("fans".into(), Value::Object(fans));
        Ok(facts)
    }
}

/// Installed package snapshot (MX only, not MX104)
pub struct Snapshots;

fn snapshots_supported(model: &str) -> bool {
    model.starts_with("mx") && !model.trim_start_matches(|c: char| c.is_ascii_alphabetic()).starts_with("104")
}

impl FactSubset for Snapshots {
    fn name(&self) -> &'static str {
        "snapshots"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[SNAPSHOT_INFORMATION])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["snapshots"])? {
            return Ok(facts);
        }
        let mut facts = FactMap::new();
        if !snapshots_supported(&product_model(responses)?) {
            facts.insert("snapshots".into(), json!(NOT_SUPPORTED));
            return Ok(facts);
        }

        let reply = responses.xml(SNAPSHOT_INFORMATION)?;
        let mut snapshots = FactMap::new();
        let mut packages = FactMap::new();

        if let Some(info) = reply.find("snapshot-information") {
            snapshots.insert("medium".into(), text(Some(info), "snapshot-medium"));
            for package in info.iter("package") {
                if let Some(name) = package.child_text("package-name") {
                    packages.insert(name, text(Some(package), "package-version"));
                }
            }
        }
        snapshots.insert("packages".into(), Value::Object(packages));

        facts.insert("snapshots".into(), Value::Object(snapshots));
        Ok(facts)
    }
}

/// Routing engine status, keyed by slot
pub struct RouteEngine;

impl FactSubset for RouteEngine {
    fn name(&self) -> &'static str {
        "route_engine"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        gated_commands(&[ROUTE_ENGINE_INFORMATION])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        if let Some(facts) = check_model(responses, &["route-engine"])? {
            return Ok(facts);
        }

        let reply = responses.xml(ROUTE_ENGINE_INFORMATION)?;
        let mut engines = FactMap::new();
        // Single-RE chassis omit <slot>; fall back to the position
        for (idx, engine) in reply.iter("route-engine").into_iter().enumerate() {
            let slot = engine.child_text("slot").unwrap_or_else(|| idx.to_string());
            engines.insert(slot, Value::Object(leaf_children(engine, &[])));
        }

        let mut facts = FactMap::new();
        facts.insert("route-engine".into(), Value::Object(engines));
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn opts(config_format: ConfigFormat) -> GatherOptions {
        GatherOptions { config_format }
    }

    #[test]
    fn test_default_facts() {
        let inventory = r#"<rpc-reply><chassis-inventory><chassis junos:style="inventory">
            <name>Chassis</name><serial-number>JN11F2A3BAFA</serial-number>
            <chassis-module><name>Midplane</name><serial-number>ACRB1234</serial-number></chassis-module>
            </chassis></chassis-inventory></rpc-reply>"#;
        let responses = respond(&[(SOFTWARE_INFORMATION, MX_SOFTWARE), (CHASSIS_INVENTORY, inventory)]);
        let facts = DefaultFacts.populate(&responses, &GatherOptions::default()).unwrap();

        assert_eq!(facts["hostname"], json!("mx1"));
        assert_eq!(facts["version"], json!("15.1R5.5"));
        assert_eq!(facts["model"], json!("mx480"));
        assert_eq!(facts["serialnum"], json!("JN11F2A3BAFA"));
    }

    #[test]
    fn test_hardware_facts() {
        let memory = r#"<rpc-reply><system-memory-information><system-memory-summary-information>
            <system-memory-total>4194304</system-memory-total>
            <system-memory-free>1048576</system-memory-free>
            </system-memory-summary-information></system-memory-information></rpc-reply>"#;
        let storage = r#"<rpc-reply><system-storage-information>
            <filesystem><filesystem-name>/dev/gpt/junos</filesystem-name><mounted-on>/.mount</mounted-on></filesystem>
            <filesystem><filesystem-name>tmpfs</filesystem-name><mounted-on>/tmp</mounted-on></filesystem>
            </system-storage-information></rpc-reply>"#;
        let responses = respond(&[(MEMORY_INFORMATION, memory), (SYSTEM_STORAGE, storage)]);
        let facts = Hardware.populate(&responses, &GatherOptions::default()).unwrap();

        assert_eq!(facts["memtotal_mb"], json!(4096));
        assert_eq!(facts["memfree_mb"], json!(1024));
        assert_eq!(facts["filesystems"], json!(["/dev/gpt/junos", "tmpfs"]));
    }

    #[test]
    fn test_config_formats() {
        let text_reply = "<rpc-reply><configuration-text>system {\n    host-name mx1;\n}</configuration-text></rpc-reply>";
        let rpc = configuration_rpc(ConfigFormat::Text);
        assert_eq!(rpc, r#"<get-configuration format="text"/>"#);
        let responses = respond(&[(rpc.as_str(), text_reply)]);
        let facts = Config.populate(&responses, &opts(ConfigFormat::Text)).unwrap();
        assert_eq!(facts["config"], json!("system {\n    host-name mx1;\n}"));

        let xml_reply = r#"<rpc-reply><configuration junos:changed-seconds="1"><system><host-name>mx1</host-name></system></configuration></rpc-reply>"#;
        let rpc = configuration_rpc(ConfigFormat::Xml);
        let responses = respond(&[(rpc.as_str(), xml_reply)]);
        let facts = Config.populate(&responses, &opts(ConfigFormat::Xml)).unwrap();
        assert_eq!(
            facts["config"],
            json!(r#"<configuration junos:changed-seconds="1"><system><host-name>mx1</host-name></system></configuration>"#)
        );

        let set_reply = "<rpc-reply><configuration-set>set system host-name mx1</configuration-set></rpc-reply>";
        let rpc = configuration_rpc(ConfigFormat::Set);
        let responses = respond(&[(rpc.as_str(), set_reply)]);
        let facts = Config.populate(&responses, &opts(ConfigFormat::Set)).unwrap();
        assert_eq!(facts["config"], json!("set system host-name mx1"));

        let json_reply = r#"<rpc-reply>{"configuration": {"system": {"host-name": "mx1"}}}</rpc-reply>"#;
        let rpc = configuration_rpc(ConfigFormat::Json);
        let responses = respond(&[(rpc.as_str(), json_reply)]);
        let facts = Config.populate(&responses, &opts(ConfigFormat::Json)).unwrap();
        assert_eq!(facts["config"], json!(r#"{"configuration": {"system": {"host-name": "mx1"}}}"#));
    }

    #[test]
    fn test_xml_config_missing_is_error() {
        let rpc = configuration_rpc(ConfigFormat::Xml);
        let responses = respond(&[(rpc.as_str(), "<rpc-reply><configuration-text/></rpc-reply>")]);
        assert!(Config.populate(&responses, &opts(ConfigFormat::Xml)).is_err());
    }

    const ENVIRONMENT: &str = r#"<rpc-reply><environment-information>
        <environment-item><name>Routing Engine 0</name><class>Temp</class><status>OK</status><temperature junos:celsius="38">38 degrees C / 100 degrees F</temperature></environment-item>
        <environment-item><name>Top Fan Tray</name><class>Fans</class><status>OK</status><comment>Spinning at normal speed</comment></environment-item>
        <environment-item><name>PEM 0</name><class>Power</class><status>OK</status></environment-item>
        </environment-information></rpc-reply>"#;

    #[test]
    fn test_temperatures() {
        let responses = respond(&[(SOFTWARE_INFORMATION, MX_SOFTWARE), (ENVIRONMENT_INFORMATION, ENVIRONMENT)]);
        let facts = Temperatures.populate(&responses, &GatherOptions::default()).unwrap();

        assert_eq!(
            facts["temperature"]["Routing Engine 0"],
            json!({ "status": "OK", "temperature": "38 degrees C / 100 degrees F" })
        );
        assert_eq!(facts["fans"]["Top Fan Tray"]["comment"], json!("Spinning at normal speed"));
        assert!(facts["temperature"].get("PEM 0").is_none());
    }

    #[test]
    fn test_temperatures_unsupported_model() {
        let responses = respond(&[(SOFTWARE_INFORMATION, SRX_SOFTWARE), (ENVIRONMENT_INFORMATION, ENVIRONMENT)]);
        let facts = Temperatures.populate(&responses, &GatherOptions::default()).unwrap();
        assert_eq!(facts["temperature"], json!(NOT_SUPPORTED));
        assert_eq!(facts["fans"], json!(NOT_SUPPORTED));
    }

    const SNAPSHOT: &str = r#"<rpc-reply><snapshot-information>
        <snapshot-medium>internal</snapshot-medium>
        <package><package-name>junos</package-name><package-version>15.1R5.5</package-version></package>
        <package><package-name>jkernel</package-name><package-version>15.1R5.5</package-version></package>
        </snapshot-information></rpc-reply>"#;

    #[test]
    fn test_snapshots() {
        let responses = respond(&[(SOFTWARE_INFORMATION, MX_SOFTWARE), (SNAPSHOT_INFORMATION, SNAPSHOT)]);
        let facts = Snapshots.populate(&responses, &GatherOptions::default()).unwrap();
        assert_eq!(
            facts["snapshots"],
            json!({
                "medium": "internal",
                "packages": { "junos": "15.1R5.5", "jkernel": "15.1R5.5" }
            })
        );
    }

    #[test]
    fn test_snapshots_not_supported_on_mx104() {
        let responses = respond(&[(SOFTWARE_INFORMATION, MX104_SOFTWARE), (SNAPSHOT_INFORMATION, SNAPSHOT)]);
        let facts = Snapshots.populate(&responses, &GatherOptions::default()).unwrap();
        assert_eq!(facts["snapshots"], json!(NOT_SUPPORTED));

        assert!(snapshots_supported("mx480"));
        assert!(!snapshots_supported("ex4300"));
    }

    #[test]
    fn test_route_engine() {
        let reply = r#"<rpc-reply><route-engine-information>
            <route-engine><slot>0</slot><mastership-state>master</mastership-state><cpu-idle>97</cpu-idle></route-engine>
            <route-engine><slot>1</slot><mastership-state>backup</mastership-state><cpu-idle>99</cpu-idle></route-engine>
            </route-engine-information></rpc-reply>"#;
        let responses = respond(&[(SOFTWARE_INFORMATION, MX_SOFTWARE), (ROUTE_ENGINE_INFORMATION, reply)]);
        let facts = RouteEngine.populate(&responses, &GatherOptions::default()).unwrap();

        assert_eq!(facts["route-engine"]["0"]["mastership-state"], json!("master"));
        assert_eq!(facts["route-engine"]["1"]["cpu-idle"], json!("99"));
    }
}
