pub mod aggregator;
pub mod catalog;
pub mod iosxr;
pub mod junos;
pub mod resolver;

use anyhow::{anyhow, Result};
use std::collections::HashMap;

use crate::models::ConfigFormat;
use crate::xml::Element;

pub use aggregator::{gather, plan_commands, GatherOutcome};
pub use catalog::{Catalog, Catalogs};
pub use resolver::{resolve_subsets, InvalidSubsetError, RunSet};

/// Fact map as returned to the caller: key -> scalar, list or nested map
pub type FactMap = serde_json::Map<String, serde_json::Value>;

/// Prefix applied to every top-level fact key before returning
pub const FACT_PREFIX: &str = "ansible_net_";

/// Name of the always-collected subset
pub const DEFAULT_SUBSET: &str = "default";

/// Per-gather options that extractors may need to shape their commands
#[derive(Debug, Clone, Default)]
pub struct GatherOptions {
    pub config_format: ConfigFormat,
}

/// A selectable group of facts and the commands needed to collect them.
///
/// `commands` must not touch the device; `populate` receives the replies
/// for exactly the commands it listed, keyed by command string.
pub trait FactSubset: Send + Sync {
    fn name(&self) -> &'static str;

    fn commands(&self, opts: &GatherOptions) -> Vec<String>;

    fn populate(&self, responses: &Responses<'_>, opts: &GatherOptions) -> Result<FactMap>;
}

/// Replies for one subset, keyed by the exact command string.
///
/// A command the device rejected is kept with its error so extractors can
/// decide whether they need that reply at all.
pub struct Responses<'a> {
    replies: HashMap<&'a str, std::result::Result<&'a str, &'a str>>,
}

impl<'a> Responses<'a> {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
        }
    }

    pub fn insert(&mut self, command: &'a str, reply: &'a str) {
        self.replies.insert(command, Ok(reply));
    }

    /// Record a command that failed on the device
    pub fn insert_failure(&mut self, command: &'a str, error: &'a str) {
        self.replies.insert(command, Err(error));
    }

    /// Raw reply text for a command
    pub fn get(&self, command: &str) -> Result<&'a str> {
        match self.replies.get(command) {
            Some(Ok(reply)) => Ok(*reply),
            Some(Err(error)) => Err(anyhow!("command '{}' failed: {}", command, error)),
            None => Err(anyhow!("no reply for command '{}'", command)),
        }
    }

    /// Reply for a command parsed as an XML document
    pub fn xml(&self, command: &str) -> Result<Element> {
        Element::parse(self.get(command)?)
    }
}

impl Default for Responses<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Responses built from (command, reply) pairs
#[cfg(test)]
pub(crate) fn respond<'a>(pairs: &[(&'a str, &'a str)]) -> Responses<'a> {
    let mut responses = Responses::new();
    for &(command, reply) in pairs {
        responses.insert(command, reply);
    }
    responses
}

/// Prefix every top-level key with FACT_PREFIX
pub fn namespace_facts(facts: FactMap) -> FactMap {
    facts
        .into_iter()
        .map(|(key, value)| (format!("{}{}", FACT_PREFIX, key), value))
        .collect()
}
