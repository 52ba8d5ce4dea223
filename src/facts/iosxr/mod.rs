//! Cisco IOS-XR fact subsets, scraped from CLI text output.

mod interfaces;
mod routing;
mod system;

use regex_lite::Regex;

use super::{Catalog, FactSubset};
use crate::models::Platform;

pub use interfaces::{Interfaces, Optics};
pub use routing::{Bgp, Isis, L2vpn, Multicast, RouteSummary, Routes};
pub use system::{Config, DefaultFacts, Hardware};

/// Collected unless the caller says otherwise. Optics only answers on
/// chassis with TenGigE ports, so it must be asked for explicitly.
pub const DEFAULT_GATHER_SUBSET: &[&str] = &["!config", "!routes", "!optics"];

pub fn catalog() -> Catalog {
    let subsets: Vec<Box<dyn FactSubset>> = vec![
        Box::new(DefaultFacts),
        Box::new(Hardware),
        Box::new(Interfaces),
        Box::new(Config),
        Box::new(Multicast),
        Box::new(Bgp),
        Box::new(Isis),
        Box::new(Optics),
        Box::new(Routes),
        Box::new(RouteSummary),
        Box::new(L2vpn),
    ];
    Catalog::new(Platform::Iosxr, DEFAULT_GATHER_SUBSET, subsets)
}

fn commands(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

/// XR prefixes most show output with a "Thu Mar  2 10:14:42.154 MET" line
pub(crate) fn is_timestamp_line(line: &str) -> bool {
    Regex::new(r"^(Mon|Tue|Wed|Thu|Fri|Sat|Sun) \w{3}\s+\d+ \d{1,2}:\d{2}:\d{2}")
        .map(|re| re.is_match(line.trim()))
        .unwrap_or(false)
}

/// A separator row made only of dashes
fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 10 && trimmed.chars().all(|c| c == '-')
}
