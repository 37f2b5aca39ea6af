//! Country resolution for a known visitor address.

use crate::providers::{HttpProvider, ProviderChain};

/// Returned when no provider produced a usable country code.
pub const UNKNOWN_COUNTRY: &str = "UNKNOWN";

/// The geo-lookup chain, in priority order. The authenticated ipinfo
/// endpoint leads the chain only when a token is configured.
pub fn chain(ipinfo_token: &str) -> ProviderChain {
    let mut chain = ProviderChain::new("geo", validate_country);

    if !ipinfo_token.is_empty() {
        chain = chain.with_provider(
            HttpProvider::new("ipinfo-token", "https://ipinfo.io/{ip}/json?token={token}")
                .with_token(ipinfo_token)
                .field("country")
                .accepting_text(),
        );
    }

    chain
        .with_provider(
            HttpProvider::new("ipinfo", "https://ipinfo.io/{ip}/json")
                .field("country")
                .accepting_text(),
        )
        .with_provider(
            HttpProvider::new("ipapi", "https://ipapi.co/{ip}/json/")
                .field("country_code")
                .accepting_text(),
        )
        .with_provider(
            HttpProvider::new("ip-api", "https://ip-api.com/json/{ip}?fields=countryCode")
                .field("countryCode")
                .accepting_text(),
        )
        .with_provider(
            HttpProvider::new(
                "geo-ipify",
                "https://geo.ipify.org/api/v2/country?apiKey=at_demo&ipAddress={ip}",
            )
            .field("location.country")
            .accepting_text(),
        )
        .with_provider(
            HttpProvider::new("geojs", "https://get.geojs.io/v1/ip/country/{ip}")
                .field("country")
                .accepting_text(),
        )
}

/// Accept exactly two ASCII letters and normalize to uppercase.
pub fn validate_country(raw: &str) -> Result<String, String> {
    let candidate = raw.trim();
    if candidate.len() == 2 && candidate.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(candidate.to_ascii_uppercase())
    } else {
        Err(format!("{candidate:?} is not a two-letter country code"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{resolve_with, LookupResponse, ScriptedLookups};

    #[test]
    fn test_chain_without_token_has_five_providers() {
        assert_eq!(
            chain("").provider_names(),
            vec!["ipinfo", "ipapi", "ip-api", "geo-ipify", "geojs"]
        );
    }

    #[test]
    fn test_chain_with_token_leads_with_authenticated_provider() {
        let chain = chain("abc123");
        assert_eq!(chain.len(), 6);
        assert_eq!(chain.provider_names()[0], "ipinfo-token");
    }

    #[test]
    fn test_token_lands_in_request_url() {
        let lookups = ScriptedLookups::new().respond(
            "https://ipinfo.io/192.0.2.1/json?token=abc123",
            LookupResponse::json(r#"{"country":"se"}"#),
        );
        let result = resolve_with(chain("abc123"), "192.0.2.1", |r| lookups.lookup(r));
        assert_eq!(result.value.as_deref(), Some("SE"));
        assert_eq!(
            lookups.calls(),
            vec!["https://ipinfo.io/192.0.2.1/json?token=abc123"]
        );
    }

    #[test]
    fn test_requests_follow_chain_order() {
        let urls: Vec<String> = chain("").requests("192.0.2.1").into_iter().map(|r| r.url).collect();
        assert_eq!(urls[0], "https://ipinfo.io/192.0.2.1/json");
        assert_eq!(urls[4], "https://get.geojs.io/v1/ip/country/192.0.2.1");
    }

    #[test]
    fn test_validate_country() {
        assert_eq!(validate_country("us").unwrap(), "US");
        assert_eq!(validate_country(" Gb\n").unwrap(), "GB");
        assert!(validate_country("USA").is_err());
        assert!(validate_country("U").is_err());
        assert!(validate_country("1A").is_err());
        assert!(validate_country("").is_err());
    }

    #[test]
    fn test_plain_text_country_accepted_and_uppercased() {
        let lookups = ScriptedLookups::new()
            .fail("https://ipinfo.io/", "blocked")
            .respond("https://ipapi.co/", LookupResponse::text("fr\n"));
        let result = resolve_with(chain(""), "192.0.2.1", |r| lookups.lookup(r));
        assert_eq!(result.value.as_deref(), Some("FR"));
    }

    #[test]
    fn test_nested_ipify_field() {
        let lookups = ScriptedLookups::new().respond(
            "https://geo.ipify.org/",
            LookupResponse::json(r#"{"ip":"192.0.2.1","location":{"country":"JP"}}"#),
        );
        let result = resolve_with(chain(""), "192.0.2.1", |r| lookups.lookup(r));
        assert_eq!(result.value.as_deref(), Some("JP"));
        assert_eq!(lookups.call_count(), 4);
    }

    #[test]
    fn test_output_is_code_or_nothing() {
        let lookups = ScriptedLookups::new()
            .respond("https://ipinfo.io/", LookupResponse::json(r#"{"country":"United States"}"#))
            .respond("https://ipapi.co/", LookupResponse::text("RateLimited"))
            .respond("https://ip-api.com/", LookupResponse::json(r#"{"countryCode":""}"#))
            .respond("https://geo.ipify.org/", LookupResponse::json(r#"{"code":403}"#))
            .respond("https://get.geojs.io/", LookupResponse::text("nope"));
        let result = resolve_with(chain(""), "192.0.2.1", |r| lookups.lookup(r));
        assert!(result.value.is_none());
        assert_eq!(result.attempts.len(), 5);
    }
}
