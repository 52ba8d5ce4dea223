//! Juniper Junos fact subsets, read from NETCONF RPC replies.
//!
//! Each subset lists RPC bodies as its commands; the runner wraps them in
//! `<rpc>` envelopes and hands back the full `<rpc-reply>` documents.
//! Subsets other than the basic inventory ones only run on MX, M, T, EX
//! and QFX models and report "Not supported" elsewhere.

mod interfaces;
mod routing;
mod system;

use anyhow::Result;
use regex_lite::Regex;
use serde_json::{json, Value};

use super::{Catalog, FactMap, FactSubset, Responses};
use crate::models::Platform;
use crate::xml::Element;

pub use interfaces::{Interfaces, InterfacesExt, Optics};
pub use routing::{BgpPeers, BgpSummary, IsisOverview, L2vpn, RouteSummary, Routes};
pub use system::{Config, DefaultFacts, Hardware, RouteEngine, Snapshots, Temperatures};

pub const DEFAULT_GATHER_SUBSET: &[&str] = &["!config", "!bgp_peers", "!routes"];

/// Fact value reported when the device model lacks the feature
pub const NOT_SUPPORTED: &str = "Not supported";

const SOFTWARE_INFORMATION: &str = "<get-software-information/>";
const SUPPORTED_MODELS: &str = r"^(mx|m|t|ex|qfx)[0-9]*[a-z]*";

pub fn catalog() -> Catalog {
    let subsets: Vec<Box<dyn FactSubset>> = vec![
        Box::new(DefaultFacts),
        Box::new(Hardware),
        Box::new(Config),
        Box::new(Interfaces),
        Box::new(InterfacesExt),
        Box::new(Optics),
        Box::new(Temperatures),
        Box::new(BgpSummary),
        Box::new(BgpPeers),
        Box::new(Snapshots),
        Box::new(RouteSummary),
        Box::new(Routes),
        Box::new(IsisOverview),
        Box::new(RouteEngine),
        Box::new(L2vpn),
    ];
    Catalog::new(Platform::Junos, DEFAULT_GATHER_SUBSET, subsets)
}

/// Commands for a model-gated subset: the version query plus its own RPCs
fn gated_commands(rpcs: &[&str]) -> Vec<String> {
    std::iter::once(SOFTWARE_INFORMATION)
        .chain(rpcs.iter().copied())
        .map(str::to_string)
        .collect()
}

/// Product model from the `<get-software-information/>` reply, lower-cased
fn product_model(responses: &Responses<'_>) -> Result<String> {
    let reply = responses.xml(SOFTWARE_INFORMATION)?;
    Ok(reply
        .find("software-information")
        .and_then(|sw| sw.child_text("product-model"))
        .unwrap_or_default()
        .to_lowercase())
}

fn model_supported(model: &str) -> bool {
    Regex::new(SUPPORTED_MODELS)
        .map(|re| re.is_match(model))
        .unwrap_or(false)
}

/// Check the device model; unsupported models get "Not supported" under each key
fn check_model(responses: &Responses<'_>, keys: &[&str]) -> Result<Option<FactMap>> {
    let model = product_model(responses)?;
    if model_supported(&model) {
        return Ok(None);
    }
    tracing::debug!("Model '{}' does not support {:?}", model, keys);
    Ok(Some(
        keys.iter()
            .map(|key| (key.to_string(), json!(NOT_SUPPORTED)))
            .collect(),
    ))
}

/// Trimmed text of a direct child, or null
fn text(element: Option<&Element>, tag: &str) -> Value {
    element
        .and_then(|e| e.child_text(tag))
        .map(Value::String)
        .unwrap_or(Value::Null)
}

/// Map each tag to its text, using the tag as the key
fn fields(element: Option<&Element>, tags: &[&str]) -> FactMap {
    tags.iter()
        .map(|tag| (tag.to_string(), text(element, tag)))
        .collect()
}

/// Map (key, tag) pairs to the tag's text under a different key
fn renamed_fields(element: Option<&Element>, pairs: &[(&str, &str)]) -> FactMap {
    pairs
        .iter()
        .map(|(key, tag)| (key.to_string(), text(element, tag)))
        .collect()
}

/// Every childless child as tag -> text, skipping `ignore`
fn leaf_children(element: &Element, ignore: &[&str]) -> FactMap {
    element
        .children
        .iter()
        .filter(|c| !c.has_children() && !ignore.contains(&c.tag.as_str()))
        .map(|c| (c.tag.clone(), json!(c.text())))
        .collect()
}

/// Junos signals boolean settings by the presence of an empty element
fn is_enabled(element: Option<&Element>, tag: &str) -> Value {
    let present = element.and_then(|e| e.child(tag)).is_some();
    json!(if present { "Enabled" } else { "Disabled" })
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_model_supported() {
        assert!(model_supported("mx480"));
        assert!(model_supported("ex4300"));
        assert!(model_supported("qfx5100"));
        assert!(model_supported("m320"));
        assert!(!model_supported("srx340"));
        assert!(!model_supported("vsrx"));
        assert!(!model_supported(""));
    }

    #[test]
    fn test_check_model() {
        let responses = respond(&[(SOFTWARE_INFORMATION, MX_SOFTWARE)]);
        assert!(check_model(&responses, &["optics"]).unwrap().is_none());

        let responses = respond(&[(SOFTWARE_INFORMATION, SRX_SOFTWARE)]);
        let facts = check_model(&responses, &["temperature", "fans"]).unwrap().unwrap();
        assert_eq!(facts["temperature"], json!(NOT_SUPPORTED));
        assert_eq!(facts["fans"], json!(NOT_SUPPORTED));
    }

    #[test]
    fn test_gated_commands_lead_with_version_query() {
        assert_eq!(
            gated_commands(&["<get-route-information/>"]),
            vec![SOFTWARE_INFORMATION.to_string(), "<get-route-information/>".to_string()]
        );
    }

    #[test]
    fn test_field_helpers() {
        let el = Element::parse("<e><name>ge-0/0/0</name><mtu> 1514 </mtu><flag/><nested><a>1</a></nested></e>").unwrap();
        let mapped = fields(Some(&el), &["mtu", "speed"]);
        assert_eq!(mapped["mtu"], json!("1514"));
        assert_eq!(mapped["speed"], Value::Null);

        let leaves = leaf_children(&el, &["name"]);
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves["flag"], json!(""));

        assert_eq!(is_enabled(Some(&el), "flag"), json!("Enabled"));
        assert_eq!(is_enabled(Some(&el), "missing"), json!("Disabled"));
        assert_eq!(text(None, "mtu"), Value::Null);
    }

    #[test]
    fn test_catalog_order() {
        let catalog = catalog();
        assert_eq!(catalog.names()[0], "default");
        assert_eq!(catalog.names().len(), 15);
    }
}
