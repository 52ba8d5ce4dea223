use serde::Serialize;

use super::resolver::{resolve_subsets, InvalidSubsetError, RunSet};
use super::{iosxr, junos, FactSubset};
use crate::models::Platform;

/// Fixed registry of fact subsets for one platform, in collection order
pub struct Catalog {
    platform: Platform,
    default_gather_subset: &'static [&'static str],
    subsets: Vec<Box<dyn FactSubset>>,
}

impl Catalog {
    pub fn new(
        platform: Platform,
        default_gather_subset: &'static [&'static str],
        subsets: Vec<Box<dyn FactSubset>>,
    ) -> Self {
        Self {
            platform,
            default_gather_subset,
            subsets,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Valid subset names in catalog order
    pub fn names(&self) -> Vec<&'static str> {
        self.subsets.iter().map(|s| s.name()).collect()
    }

    /// Tokens used when the caller does not supply gather_subset
    pub fn default_gather_subset(&self) -> &'static [&'static str] {
        self.default_gather_subset
    }

    /// Resolve tokens (or the platform default when None) into a RunSet
    pub fn resolve(&self, tokens: Option<&[String]>) -> Result<RunSet, InvalidSubsetError> {
        let names = self.names();
        match tokens {
            Some(tokens) => resolve_subsets(tokens, &names),
            None => resolve_subsets(self.default_gather_subset, &names),
        }
    }

    /// Subsets from the RunSet, in catalog order
    pub fn selected<'a>(&'a self, run_set: &'a RunSet) -> impl Iterator<Item = &'a dyn FactSubset> + 'a {
        self.subsets
            .iter()
            .filter(move |s| run_set.contains(s.name()))
            .map(|s| s.as_ref())
    }

    pub fn summary(&self) -> PlatformSummary {
        PlatformSummary {
            platform: self.platform,
            subsets: self.names(),
            default_gather_subset: self.default_gather_subset.to_vec(),
        }
    }
}

/// Catalog description returned by the platforms endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PlatformSummary {
    pub platform: Platform,
    pub subsets: Vec<&'static str>,
    pub default_gather_subset: Vec<&'static str>,
}

/// All platform catalogs, built once at startup
pub struct Catalogs {
    iosxr: Catalog,
    junos: Catalog,
}

impl Catalogs {
    pub fn new() -> Self {
        Self {
            iosxr: iosxr::catalog(),
            junos: junos::catalog(),
        }
    }

    pub fn get(&self, platform: Platform) -> &Catalog {
        match platform {
            Platform::Iosxr => &self.iosxr,
            Platform::Junos => &self.junos,
        }
    }

    pub fn all(&self) -> [&Catalog; 2] {
        [&self.iosxr, &self.junos]
    }
}

impl Default for Catalogs {
    fn default() -> Self {
        Self::new()
    }
}
