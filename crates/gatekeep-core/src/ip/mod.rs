//! Visitor IP resolution.

use crate::providers::{HttpProvider, ProviderChain};

/// Returned when no provider produced a usable address.
pub const UNRESOLVED_IP: &str = "0.0.0.0";

/// The address-lookup chain, in priority order.
pub fn chain() -> ProviderChain {
    ProviderChain::new("ip", validate_ip)
        .with_provider(HttpProvider::new("ipify", "https://api.ipify.org?format=json").field("ip"))
        .with_provider(
            HttpProvider::new("ipify64", "https://api64.ipify.org?format=json").field("ip"),
        )
        .with_provider(HttpProvider::new("ipapi", "https://ipapi.co/ip").accepting_text())
        .with_provider(HttpProvider::new("ipsb", "https://api.ip.sb/ip").accepting_text())
        .with_provider(
            HttpProvider::new("checkip-aws", "https://checkip.amazonaws.com").accepting_text(),
        )
}

/// Accept four dot-separated decimal groups, rejecting the null address.
pub fn validate_ip(raw: &str) -> Result<String, String> {
    let candidate = raw.trim();
    let groups: Vec<&str> = candidate.split('.').collect();
    let well_formed = groups.len() == 4
        && groups
            .iter()
            .all(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit()));
    if !well_formed {
        return Err(format!("{candidate:?} is not a dotted-quad address"));
    }
    if candidate == UNRESOLVED_IP {
        return Err("null address".to_string());
    }
    Ok(candidate.to_string())
}

pub fn is_resolved(ip: &str) -> bool {
    !ip.is_empty() && ip != UNRESOLVED_IP
}
