use serde::{Deserialize, Serialize};

/// SysDescrRequest carries a raw SNMP sysDescr.0 value
#[derive(Debug, Clone, Deserialize)]
pub struct SysDescrRequest {
    pub sysdescr: String,
}

/// OS facts decoded from sysDescr
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsFacts {
    #[serde(rename = "ansible_os_vendor")]
    pub vendor: String,
    #[serde(rename = "ansible_os_model")]
    pub model: String,
    #[serde(rename = "ansible_os_type")]
    pub os_type: String,
    #[serde(rename = "ansible_os_version")]
    pub version: String,
    #[serde(rename = "ansible_os_buildtime")]
    pub buildtime: String,
}

/// SysDescrResponse wraps decoded facts the same way gathered facts are
#[derive(Debug, Clone, Serialize)]
pub struct SysDescrResponse {
    pub ansible_facts: OsFacts,
}
