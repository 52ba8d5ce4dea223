use serde::{Deserialize, Serialize};

use super::{deserialize_subset_list, ConfigFormat, Platform};
use crate::facts::FactMap;

/// FactsRequest asks the server to connect to a device and gather facts
#[derive(Debug, Clone, Deserialize)]
pub struct FactsRequest {
    pub host: String,
    pub platform: Platform,
    #[serde(default, deserialize_with = "deserialize_subset_list")]
    pub gather_subset: Option<Vec<String>>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub config_format: ConfigFormat,
}

/// FactsResponse carries the namespaced facts and any non-fatal warnings
#[derive(Debug, Clone, Serialize)]
pub struct FactsResponse {
    pub ansible_facts: FactMap,
    pub warnings: Vec<String>,
}

/// ResolveRequest previews a gather without contacting a device
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRequest {
    pub platform: Platform,
    #[serde(default, deserialize_with = "deserialize_subset_list")]
    pub gather_subset: Option<Vec<String>>,
    #[serde(default)]
    pub config_format: ConfigFormat,
}

/// ResolveResponse lists the subsets that would run and the command batch
#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
    pub platform: Platform,
    pub gather_subset: Vec<String>,
    pub commands: Vec<String>,
}
