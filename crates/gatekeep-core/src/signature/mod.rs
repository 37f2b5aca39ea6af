//! Automation signatures in user-agent strings.

/// Lowercase substrings that mark automation frameworks, scripted HTTP
/// clients, and scanning or load-testing tools. Order is match priority.
pub const SIGNATURES: &[&str] = &[
    "bot",
    "crawl",
    "spider",
    "scrape",
    "curl",
    "wget",
    "python",
    "java",
    "perl",
    "ruby",
    "go-http",
    "scrapy",
    "httpclient",
    "okhttp",
    "axios",
    "postman",
    "insomnia",
    "fiddler",
    "burp",
    "nikto",
    "nmap",
    "scan",
    "check",
    "monitor",
    "test",
    "benchmark",
    "siege",
    "ab",
    "jmeter",
];

/// Return the first signature contained in `user_agent`, if any.
pub fn match_signature(user_agent: &str) -> Option<&'static str> {
    let lowered = user_agent.to_lowercase();
    SIGNATURES.iter().copied().find(|s| lowered.contains(s))
}
