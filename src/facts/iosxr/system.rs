use anyhow::Result;
use regex_lite::Regex;
use serde_json::{json, Value};

use super::{commands, is_rule_line, is_timestamp_line};
use crate::facts::{FactMap, FactSubset, GatherOptions, Responses, DEFAULT_SUBSET};
use crate::utils::{capture, capture_all, capture_groups};

const SHOW_VERSION: &str = "show version brief";
const SHOW_DSC: &str = "admin show dsc";
const DIR_ALL: &str = "dir /all";
const SHOW_MEMORY: &str = "show memory summary";
const SHOW_TEMPERATURES: &str = "show environment temperatures";
const SHOW_CPU: &str = "show processes cpu";
const SHOW_RUNNING: &str = "show running-config";

/// Hostname, version, image and chassis serials
pub struct DefaultFacts;

impl FactSubset for DefaultFacts {
    fn name(&self) -> &'static str {
        DEFAULT_SUBSET
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_VERSION, SHOW_DSC])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let version = responses.get(SHOW_VERSION)?;
        let dsc = responses.get(SHOW_DSC)?;

        let mut facts = FactMap::new();
        facts.insert("version".into(), json!(capture(r"(?m)Version (\S+)$", version, 1)));
        facts.insert("image".into(), json!(capture(r#"image file is "(.+)""#, version, 1)));
        facts.insert("hostname".into(), json!(capture(r"(?m)^(.+) uptime", version, 1)));
        facts.insert("serial".into(), json!(parse_serial(dsc)));
        Ok(facts)
    }
}

fn parse_serial(data: &str) -> Vec<String> {
    data.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty() && !is_rule_line(line) && !is_timestamp_line(line))
        .map(str::to_string)
        .collect()
}

/// Filesystems, memory, temperatures and CPU load
pub struct Hardware;

impl FactSubset for Hardware {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[DIR_ALL, SHOW_MEMORY, SHOW_TEMPERATURES, SHOW_CPU])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let mut facts = FactMap::new();

        facts.insert(
            "filesystems".into(),
            json!(capture_all(r"(?m)^Directory of (\S+)", responses.get(DIR_ALL)?)),
        );

        if let Some(groups) =
            capture_groups(r"Physical Memory: (\d+)M total \((\d+)", responses.get(SHOW_MEMORY)?)
        {
            facts.insert("memtotal_mb".into(), json!(groups[0].parse::<u64>().ok()));
            facts.insert("memfree_mb".into(), json!(groups[1].parse::<u64>().ok()));
        }

        facts.insert("temp".into(), parse_temperatures(responses.get(SHOW_TEMPERATURES)?));
        facts.insert("cpu_percentage".into(), parse_cpu(responses.get(SHOW_CPU)?));
        Ok(facts)
    }
}

/// One entry per sensor unit ("0/RSP0/CPU0*"), once both its Inlet0 and
/// Hotspot0 readings have been seen
fn parse_temperatures(data: &str) -> Value {
    let unit_re = Regex::new(r"(.+)\*").ok();
    let inlet_re = Regex::new(r"(.+)Inlet0(.+)").ok();
    let hotspot_re = Regex::new(r"(.+)Hotspot0(.+)").ok();

    let mut readings = Vec::new();
    let (mut unit, mut inlet, mut hotspot) = (String::new(), String::new(), String::new());

    for line in data.lines() {
        if let Some(m) = unit_re.as_ref().and_then(|re| re.find(line)) {
            unit = m.as_str().trim().to_string();
        }
        if let Some(caps) = inlet_re.as_ref().and_then(|re| re.captures(line)) {
            inlet = caps[2].trim().to_string();
        }
        if let Some(caps) = hotspot_re.as_ref().and_then(|re| re.captures(line)) {
            hotspot = caps[2].trim().to_string();
        }
        if !unit.is_empty() && !inlet.is_empty() && !hotspot.is_empty() {
            let mut entry = FactMap::new();
            entry.insert(
                std::mem::take(&mut unit),
                json!({ "Inlet0": std::mem::take(&mut inlet), "Hotspot0": std::mem::take(&mut hotspot) }),
            );
            readings.push(Value::Object(entry));
        }
    }
    Value::Array(readings)
}

fn parse_cpu(data: &str) -> Value {
    let pattern = r"CPU utilization for one minute: (\d+)%; five minutes: (\d+)%; fifteen minutes: (\d+)%";
    match capture_groups(pattern, data) {
        Some(g) => json!({
            "One minute": format!("{}%", g[0]),
            "Five minutes": format!("{}%", g[1]),
            "Fifteen minutes": format!("{}%", g[2]),
        }),
        None => Value::Null,
    }
}

/// Full running configuration as text
pub struct Config;

impl FactSubset for Config {
    fn name(&self) -> &'static str {
        "config"
    }

    fn commands(&self, _opts: &GatherOptions) -> Vec<String> {
        commands(&[SHOW_RUNNING])
    }

    fn populate(&self, responses: &Responses<'_>, _opts: &GatherOptions) -> Result<FactMap> {
        let mut facts = FactMap::new();
        facts.insert("config".into(), json!(responses.get(SHOW_RUNNING)?));
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::respond;

    const VERSION_BRIEF: &str = "\
Thu Mar  2 10:14:42.154 MET

Cisco IOS XR Software, Version 6.1.2
Copyright (c) 2013-2016 by Cisco Systems, Inc.

ROM: System Bootstrap, Version 2.04(20140424:063844) [ASR9K ROMMON],

core-rtr-01 uptime is 2 weeks, 3 days, 4 hours, 5 minutes
System image file is \"disk0:asr9k-os-mbi-6.1.2/0x100305/mbiasr9k-rsp3.vm\"
";

    const DSC: &str = "\
Thu Mar  2 10:14:43.001 MET
---------------------------------------------------------
      NODE           ROLE     PRIORITY    TBEACON    SERIAL
---------------------------------------------------------
   0/RSP0/CPU0      DSC       default     300        FOX1234ABCD
";

    #[test]
    fn test_default_facts() {
        let responses = respond(&[(SHOW_VERSION, VERSION_BRIEF), (SHOW_DSC, DSC)]);
        let facts = DefaultFacts.populate(&responses, &GatherOptions::default()).unwrap();

        assert_eq!(facts["version"], json!("6.1.2"));
        assert_eq!(facts["hostname"], json!("core-rtr-01"));
        assert_eq!(
            facts["image"],
            json!("disk0:asr9k-os-mbi-6.1.2/0x100305/mbiasr9k-rsp3.vm")
        );
        let serial = facts["serial"].as_array().unwrap();
        assert_eq!(serial.len(), 2);
        assert!(serial[1].as_str().unwrap().contains("FOX1234ABCD"));
    }

    #[test]
    fn test_default_facts_missing_fields_are_null() {
        let responses = respond(&[(SHOW_VERSION, ""), (SHOW_DSC, "")]);
        let facts = DefaultFacts.populate(&responses, &GatherOptions::default()).unwrap();
        assert_eq!(facts["version"], Value::Null);
        assert_eq!(facts["serial"], json!([]));
    }

    #[test]
    fn test_hardware_facts() {
        let dir = "Directory of disk0:\n  1 drwx 4096 Mar 1 2017 foo\nDirectory of harddisk:\n";
        let memory = "node:      node0_RSP0_CPU0\n------------------------------------------------------------------\nPhysical Memory: 12288M total (9519M available)\n Application Memory : 12288M (9519M available)\n";
        let temps = "\
Location  TEMPERATURE                 Current
          Sensor                      (deg C)
0/RSP0/*
          Inlet0                      28.5
          Hotspot0                    41.0
";
        let cpu = "\nCPU utilization for one minute: 3%; five minutes: 4%; fifteen minutes: 5%\n";
        let responses = respond(&[
            (DIR_ALL, dir),
            (SHOW_MEMORY, memory),
            (SHOW_TEMPERATURES, temps),
            (SHOW_CPU, cpu),
        ]);

        let facts = Hardware.populate(&responses, &GatherOptions::default()).unwrap();
        assert_eq!(facts["filesystems"], json!(["disk0:", "harddisk:"]));
        assert_eq!(facts["memtotal_mb"], json!(12288));
        assert_eq!(facts["memfree_mb"], json!(9519));
        assert_eq!(
            facts["temp"],
            json!([{ "0/RSP0/*": { "Inlet0": "28.5", "Hotspot0": "41.0" } }])
        );
        assert_eq!(facts["cpu_percentage"]["Fifteen minutes"], json!("5%"));
    }

    #[test]
    fn test_config_is_verbatim() {
        let running = "hostname core-rtr-01\n!\nend\n";
        let responses = respond(&[(SHOW_RUNNING, running)]);
        let facts = Config.populate(&responses, &GatherOptions::default()).unwrap();
        assert_eq!(facts["config"], json!(running));
    }
}
