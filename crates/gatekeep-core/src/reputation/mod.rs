//! Network-origin reputation: classify the organization behind an address.

use serde::{Deserialize, Serialize};

use crate::providers::{HttpProvider, ProviderChain};

/// Organization names that suggest hosting, cloud or datacenter origin.
/// Matched as lowercase substrings, in this order.
pub const HOSTING_KEYWORDS: &[&str] = &[
    "amazon",
    "aws",
    "google",
    "google cloud",
    "cloud",
    "azure",
    "digitalocean",
    "linode",
    "ovh",
    "hetzner",
    "vultr",
    "contabo",
    "scaleway",
    "kimsufi",
    "online.net",
    "serverloft",
    "hosthatch",
    "ramnode",
    "bhost",
    "vpn",
    "proxy",
    "tor",
    "datacenter",
    "hosting",
    "server",
    "vps",
    "dedicated",
];

pub const VPN_KEYWORDS: &[&str] = &["vpn", "proxy", "tor"];

/// The organization/ISP lookup chain, keyed by address.
pub fn chain() -> ProviderChain {
    ProviderChain::new("reputation", validate_organization)
        .with_provider(
            HttpProvider::new("ipapi", "https://ipapi.co/{ip}/json/")
                .field("org")
                .field("isp")
                .field("asn"),
        )
        .with_provider(
            HttpProvider::new("ip-api", "https://ip-api.com/json/{ip}")
                .field("org")
                .field("isp")
                .field("asn"),
        )
        .with_provider(
            HttpProvider::new("ipinfo", "https://ipinfo.io/{ip}/json")
                .field("org")
                .field("isp")
                .field("asn"),
        )
}

pub fn validate_organization(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err("empty organization".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Which keyword sets an organization string hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub organization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosting_match: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_match: Option<String>,
}

impl Classification {
    pub fn is_clean(&self) -> bool {
        self.hosting_match.is_none() && self.vpn_match.is_none()
    }
}

/// No reputation provider produced organization data. Callers treat this
/// as "allow".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no classification available")]
pub struct ClassificationUnavailable;

/// Classify organization text against both keyword sets.
pub fn classify(organization: &str) -> Classification {
    let lowered = organization.to_lowercase();
    Classification {
        organization: organization.to_string(),
        hosting_match: first_match(&lowered, HOSTING_KEYWORDS),
        vpn_match: first_match(&lowered, VPN_KEYWORDS),
    }
}

/// Classify the outcome of a reputation chain walk.
pub fn classify_resolved(
    organization: Option<&str>,
) -> Result<Classification, ClassificationUnavailable> {
    organization.map(classify).ok_or(ClassificationUnavailable)
}

fn first_match(haystack: &str, keywords: &[&str]) -> Option<String> {
    keywords
        .iter()
        .find(|k| haystack.contains(**k))
        .map(|k| k.to_string())
}
