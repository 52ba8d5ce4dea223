mod facts;
mod sysdescr;

pub use facts::*;
pub use sysdescr::*;

use serde::{Deserialize, Deserializer, Serialize};

/// Device operating systems with a fact catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Iosxr,
    Junos,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Iosxr => "iosxr",
            Platform::Junos => "junos",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format of the configuration returned by the Junos config subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    #[default]
    Text,
    Xml,
    Json,
    Set,
}

impl ConfigFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Text => "text",
            ConfigFormat::Xml => "xml",
            ConfigFormat::Json => "json",
            ConfigFormat::Set => "set",
        }
    }
}

/// gather_subset may be sent as a list or as one comma-separated string
/// (e.g. "!config, !routes"); both become a list of tokens.
pub fn deserialize_subset_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SubsetList {
        One(String),
        Many(Vec<String>),
    }

    let parsed = Option::<SubsetList>::deserialize(deserializer)?;
    Ok(parsed.map(|list| match list {
        SubsetList::One(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        SubsetList::Many(v) => v,
    }))
}
