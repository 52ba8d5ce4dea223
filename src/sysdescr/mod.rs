use crate::models::OsFacts;

const UNKNOWN: &str = "Unknown";

/// Decode an SNMP sysDescr string into vendor/type/model/version/build time.
///
/// The string is split on commas and each part on whitespace. Cisco and
/// Juniper both put the vendor name first; anything the layout does not
/// provide stays "Unknown".
pub fn decode_os(sysdescr: &str) -> OsFacts {
    let parts: Vec<&str> = sysdescr.split(',').collect();
    let tokens: Vec<Vec<&str>> = parts.iter().map(|p| p.split_whitespace().collect()).collect();
    let token = |part: usize, idx: usize| tokens.get(part).and_then(|t| t.get(idx)).copied();

    let mut facts = OsFacts {
        vendor: token(0, 0).unwrap_or(UNKNOWN).to_string(),
        model: UNKNOWN.to_string(),
        os_type: UNKNOWN.to_string(),
        version: UNKNOWN.to_string(),
        buildtime: UNKNOWN.to_string(),
    };

    match facts.vendor.to_lowercase().as_str() {
        "cisco" => {
            match (token(0, 1), token(0, 2)) {
                (Some(family), Some(next)) if next.eq_ignore_ascii_case("software") => {
                    facts.os_type = family.to_lowercase();
                }
                (Some(family), Some(next)) => {
                    facts.os_type = format!("{}_{}", family.to_lowercase(), next.to_lowercase());
                }
                (Some(family), None) => facts.os_type = family.to_lowercase(),
                _ => {}
            }

            if let Some(idx) = parts.iter().position(|p| p.to_lowercase().contains("version")) {
                if let Some(version) = token(idx, 1) {
                    facts.version = version.to_string();
                }
            }
        }
        "juniper" => {
            if let Some(os_type) = token(2, 1) {
                facts.os_type = os_type.to_lowercase();
            }
            if let Some(model) = token(1, 1) {
                facts.model = model.to_string();
            }
            if let Some(version) = token(2, 2) {
                facts.version = version.to_string();
            }
            if let (Some(date), Some(time)) = (token(3, 2), token(3, 3)) {
                facts.buildtime = format!("{} {}", date, time);
            }
        }
        _ => {
            tracing::debug!("No sysDescr layout for vendor {}", facts.vendor);
        }
    }

    facts
}
