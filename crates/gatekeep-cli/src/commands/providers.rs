//! `gatekeep providers`: list the lookup chains in priority order.

use anyhow::Result;
use gatekeep_core::providers::ProviderChain;
use gatekeep_core::{geo, ip, reputation};

/// Render every chain as text. `{ip}` marks where the visitor address goes;
/// the token, when given, is masked.
pub fn render(token: &str) -> String {
    let chains: [(ProviderChain, &str); 3] = [
        (ip::chain(), ""),
        (geo::chain(token), "{ip}"),
        (reputation::chain(), "{ip}"),
    ];

    let mut out = String::new();
    for (chain, subject) in &chains {
        out.push_str(&format!("{} ({} providers)\n", chain.label(), chain.len()));
        for (i, request) in chain.requests(subject).iter().enumerate() {
            let url = if token.is_empty() {
                request.url.clone()
            } else {
                request.url.replace(token, "***")
            };
            out.push_str(&format!("  {}. {:<14} {}\n", i + 1, request.provider, url));
        }
    }
    out
}

pub fn run(token: &str) -> Result<()> {
    print!("{}", render(token));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_chains_in_order() {
        let out = render("");
        assert!(out.starts_with("ip (5 providers)\n  1. ipify"));
        assert!(out.contains("geo (5 providers)"));
        assert!(out.contains("reputation (3 providers)"));
        assert!(out.contains("https://ipinfo.io/{ip}/json"));
        assert!(!out.contains("ipinfo-token"));
    }

    #[test]
    fn render_masks_token() {
        let out = render("s3cret");
        assert!(out.contains("geo (6 providers)"));
        assert!(out.contains("ipinfo-token"));
        assert!(out.contains("token=***"));
        assert!(!out.contains("s3cret"));
    }
}
