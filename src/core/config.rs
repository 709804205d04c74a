use crate::core::currency::{Currency, SupportedPairs};
use crate::core::margin::MarginConfig;
use crate::core::service::CachePolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

/// Configuration shipped with the binary and written by `setup`.
pub const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WiseProviderConfig {
    pub base_url: String,
    #[serde(default = "default_send_amount")]
    pub send_amount: u32,
    #[serde(default = "default_wise_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FrankfurterProviderConfig {
    pub base_url: String,
    #[serde(default = "default_forex_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
}

fn default_send_amount() -> u32 {
    1000
}

fn default_wise_timeout() -> u64 {
    15
}

fn default_forex_timeout() -> u64 {
    10
}

fn default_retries() -> usize {
    1
}

impl Default for WiseProviderConfig {
    fn default() -> Self {
        WiseProviderConfig {
            base_url: "https://api.wise.com".to_string(),
            send_amount: default_send_amount(),
            timeout_secs: default_wise_timeout(),
            retries: default_retries(),
        }
    }
}

impl Default for FrankfurterProviderConfig {
    fn default() -> Self {
        FrankfurterProviderConfig {
            base_url: "https://api.frankfurter.app".to_string(),
            timeout_secs: default_forex_timeout(),
            retries: default_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub wise: WiseProviderConfig,
    #[serde(default)]
    pub frankfurter: FrankfurterProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub rates_ttl_secs: u64,
    pub forex_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            rates_ttl_secs: 30 * 60,
            forex_ttl_secs: 60 * 60,
        }
    }
}

impl From<CacheConfig> for CachePolicy {
    fn from(config: CacheConfig) -> Self {
        CachePolicy {
            rates_ttl: Duration::from_secs(config.rates_ttl_secs),
            forex_ttl: Duration::from_secs(config.forex_ttl_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MonitorConfig {
    pub alert_threshold: Decimal,
    pub currencies: Vec<Currency>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            alert_threshold: Decimal::new(5, 1),
            currencies: vec![Currency::Usd, Currency::Gbp, Currency::Eur],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub currencies: SupportedPairs,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub margins: MarginConfig,
}

impl AppConfig {
    /// Loads the config from the default location, falling back to the
    /// bundled example when none has been set up yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            warn!(
                "No configuration at {}, using bundled defaults",
                config_path.display()
            );
            return Self::from_yaml(EXAMPLE_CONFIG);
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "remitrates", "remitrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyPair;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
providers:
  wise:
    base_url: "http://example.com/wise"
    send_amount: 500
  frankfurter:
    base_url: "http://example.com/fx"
    timeout_secs: 3
cache:
  rates_ttl_secs: 60
  forex_ttl_secs: 120
currencies:
  sources: [USD, GBP]
  targets: [INR]
monitor:
  alert_threshold: 0.25
  currencies: [USD]
margins:
  aliases:
    wise: transferwise
  providers:
    - id: transferwise
      name: Wise
      offset: -3.0
  emergency:
    - pair: USD-INR
      forex_rate: 90.0
      rates:
        transferwise: 90.01
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.providers.wise.base_url, "http://example.com/wise");
        assert_eq!(config.providers.wise.send_amount, 500);
        assert_eq!(config.providers.wise.timeout_secs, 15);
        assert_eq!(config.providers.wise.retries, 1);
        assert_eq!(config.providers.frankfurter.timeout_secs, 3);

        let policy: CachePolicy = config.cache.into();
        assert_eq!(policy.rates_ttl, Duration::from_secs(60));
        assert_eq!(policy.forex_ttl, Duration::from_secs(120));

        assert_eq!(config.currencies.sources, vec![Currency::Usd, Currency::Gbp]);
        assert_eq!(config.monitor.alert_threshold, dec!(0.25));
        assert_eq!(config.margins.providers[0].offset, Some(dec!(-3.0)));
        assert_eq!(
            config.margins.emergency[0].pair,
            CurrencyPair::new(Currency::Usd, Currency::Inr)
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.providers.wise.base_url, "https://api.wise.com");
        assert_eq!(
            config.providers.frankfurter.base_url,
            "https://api.frankfurter.app"
        );
        assert_eq!(config.cache.rates_ttl_secs, 1800);
        assert_eq!(config.monitor.alert_threshold, dec!(0.5));
        assert_eq!(config.currencies, SupportedPairs::default());
        assert!(config.margins.providers.is_empty());
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = AppConfig::from_yaml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.margins.providers.len(), 9);
        assert!(!config.margins.aliases.is_empty());
        assert_eq!(config.margins.emergency.len(), 1);
        assert_eq!(config.margins.emergency[0].rates.len(), 9);
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let result = AppConfig::load_from_path("/nonexistent/remitrates/config.yaml");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
