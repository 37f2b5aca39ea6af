use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gate configuration for a single page load.
///
/// Keys keep the names page operators already use (`bot_protect`,
/// `userAgent`, `countryBlock`, ...). Every key is optional. On/off
/// switches are enabled only by the exact string `"on"` (or JSON `true`);
/// `countryBlock` is enabled only by the exact string `"true"` (or JSON
/// `true`). Any other value turns the switch off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(
        default = "default_on",
        deserialize_with = "de_on_off",
        serialize_with = "ser_on_off"
    )]
    pub bot_protect: bool,

    /// Block visitors that present no user agent at all.
    #[serde(
        rename = "userAgent",
        default = "default_on",
        deserialize_with = "de_on_off",
        serialize_with = "ser_on_off"
    )]
    pub require_user_agent: bool,

    /// Match the user agent against the automation signature dictionary.
    #[serde(
        default = "default_on",
        deserialize_with = "de_on_off",
        serialize_with = "ser_on_off"
    )]
    pub block_ua: bool,

    /// Block organizations that look like hosting providers.
    #[serde(
        default = "default_on",
        deserialize_with = "de_on_off",
        serialize_with = "ser_on_off"
    )]
    pub block_isp: bool,

    #[serde(
        default = "default_on",
        deserialize_with = "de_on_off",
        serialize_with = "ser_on_off"
    )]
    pub block_vpn: bool,

    #[serde(
        default = "default_on",
        deserialize_with = "de_on_off",
        serialize_with = "ser_on_off"
    )]
    pub block_proxy_rdp: bool,

    #[serde(
        rename = "countryBlock",
        default,
        deserialize_with = "de_true_false",
        serialize_with = "ser_true_false"
    )]
    pub country_block: bool,

    #[serde(rename = "allowedCountry", default = "default_allowed_country")]
    pub allowed_country: String,

    /// Operator address that always passes the country gate. Compared as a
    /// plain string against the resolved visitor address.
    #[serde(rename = "yourIPCountry", default = "default_bypass_address")]
    pub bypass_address: String,

    #[serde(rename = "redirectUrl", default = "default_redirect_url")]
    pub redirect_url: String,

    /// Access token for the authenticated ipinfo endpoint. Empty = unused.
    #[serde(default)]
    pub ipinfo_token: String,
}

fn default_on() -> bool {
    true
}
fn default_allowed_country() -> String {
    "US".to_string()
}
fn default_bypass_address() -> String {
    "0.0.0.0".to_string()
}
fn default_redirect_url() -> String {
    "about:blank".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bot_protect: true,
            require_user_agent: true,
            block_ua: true,
            block_isp: true,
            block_vpn: true,
            block_proxy_rdp: true,
            country_block: false,
            allowed_country: default_allowed_country(),
            bypass_address: default_bypass_address(),
            redirect_url: default_redirect_url(),
            ipinfo_token: String::new(),
        }
    }
}

impl GateConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Build a config from a flat string key-value source (query string,
    /// data attributes, environment). Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), serde_json::Value::String(v.into())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Values that are accepted but probably not what the operator meant.
    /// Nothing here stops the gates from running.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.redirect_url.trim().is_empty() {
            warnings.push("redirectUrl is empty; blocked visitors reload the page".to_string());
        }
        let country = self.allowed_country.trim();
        if self.country_block
            && (country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()))
        {
            warnings.push(format!(
                "allowedCountry {:?} is not a two-letter code; every visitor will be blocked",
                self.allowed_country
            ));
        }
        warnings
    }

    /// True when either network-origin check needs a reputation lookup.
    pub fn reputation_enabled(&self) -> bool {
        self.block_vpn || self.block_proxy_rdp
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSwitch {
    Bool(bool),
    Text(String),
    Other(serde::de::IgnoredAny),
}

fn de_on_off<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match RawSwitch::deserialize(d)? {
        RawSwitch::Bool(b) => b,
        RawSwitch::Text(s) => s == "on",
        RawSwitch::Other(_) => false,
    })
}

fn de_true_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match RawSwitch::deserialize(d)? {
        RawSwitch::Bool(b) => b,
        RawSwitch::Text(s) => s == "true",
        RawSwitch::Other(_) => false,
    })
}

fn ser_on_off<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(if *value { "on" } else { "off" })
}

fn ser_true_false<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(if *value { "true" } else { "false" })
}

/// Errors from config operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    ParseError(String),
    #[error("failed to serialize config: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert!(config.bot_protect);
        assert!(config.require_user_agent);
        assert!(config.block_ua);
        assert!(config.block_isp);
        assert!(config.block_vpn);
        assert!(config.block_proxy_rdp);
        assert!(!config.country_block);
        assert_eq!(config.allowed_country, "US");
        assert_eq!(config.bypass_address, "0.0.0.0");
        assert!(config.ipinfo_token.is_empty());
    }

    #[test]
    fn test_config_from_json_minimal() {
        let config = GateConfig::from_json("{}").unwrap();
        assert_eq!(config, GateConfig::default());
    }

    #[test]
    fn test_config_from_json_with_overrides() {
        let json = r#"{
            "bot_protect": "off",
            "userAgent": "on",
            "block_isp": "nope",
            "countryBlock": "true",
            "allowedCountry": "de",
            "yourIPCountry": "203.0.113.9",
            "redirectUrl": "https://example.org/",
            "ipinfo_token": "tok"
        }"#;
        let config = GateConfig::from_json(json).unwrap();
        assert!(!config.bot_protect);
        assert!(config.require_user_agent);
        assert!(!config.block_isp);
        assert!(config.country_block);
        assert_eq!(config.allowed_country, "de");
        assert_eq!(config.bypass_address, "203.0.113.9");
        assert_eq!(config.redirect_url, "https://example.org/");
        assert_eq!(config.ipinfo_token, "tok");
    }

    #[test]
    fn test_switches_accept_booleans_and_null() {
        let config =
            GateConfig::from_json(r#"{"block_vpn": false, "countryBlock": true, "block_ua": null}"#)
                .unwrap();
        assert!(!config.block_vpn);
        assert!(config.country_block);
        assert!(!config.block_ua);
    }

    #[test]
    fn test_country_block_requires_exact_true() {
        let config = GateConfig::from_json(r#"{"countryBlock": "on"}"#).unwrap();
        assert!(!config.country_block);
        let config = GateConfig::from_json(r#"{"countryBlock": "TRUE"}"#).unwrap();
        assert!(!config.country_block);
    }

    #[test]
    fn test_config_from_pairs() {
        let config = GateConfig::from_pairs([
            ("bot_protect", "off"),
            ("countryBlock", "true"),
            ("allowedCountry", "CA"),
            ("somethingElse", "ignored"),
        ])
        .unwrap();
        assert!(!config.bot_protect);
        assert!(config.country_block);
        assert_eq!(config.allowed_country, "CA");
        assert!(config.block_vpn);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = GateConfig::default();
        config.block_isp = false;
        config.country_block = true;
        let json = config.to_json().unwrap();
        assert!(json.contains(r#""block_isp": "off""#));
        assert!(json.contains(r#""countryBlock": "true""#));
        let parsed = GateConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_warnings_default_clean() {
        assert!(GateConfig::default().warnings().is_empty());
    }

    #[test]
    fn test_config_bad_country_ignored_while_country_gate_off() {
        let config =
            GateConfig::from_json(r#"{"countryBlock":"false","allowedCountry":"USA"}"#).unwrap();
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_config_bad_country_warns_when_country_gate_on() {
        let config =
            GateConfig::from_json(r#"{"countryBlock":"true","allowedCountry":"USA"}"#).unwrap();
        let warnings = config.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("allowedCountry"));
    }

    #[test]
    fn test_config_empty_redirect_warns() {
        let mut config = GateConfig::default();
        config.redirect_url = "  ".to_string();
        assert_eq!(config.warnings().len(), 1);
    }

    #[test]
    fn test_config_invalid_json() {
        let result = GateConfig::from_json("not json");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_reputation_enabled() {
        let mut config = GateConfig::default();
        assert!(config.reputation_enabled());
        config.block_vpn = false;
        assert!(config.reputation_enabled());
        config.block_proxy_rdp = false;
        assert!(!config.reputation_enabled());
    }
}
