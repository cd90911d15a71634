// ============================================================================
// Configuration
// ============================================================================
// Fichier TOML désérialisé avec serde. Ordre de recherche :
// 1. Chemin donné par la variable LAZYLEND_CONFIG
// 2. <config_dir>/lazylend/config.toml (~/.config/lazylend sur Linux)
// 3. ./lazylend.toml
// 4. Configuration intégrée (six marchés sur Optimism)
//
// Chaque marché doit fournir TOUS ses attributs : un champ manquant est
// une erreur de parsing, pas une valeur par défaut silencieuse.
// ============================================================================

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::{DepositsSource, RetryPolicy};
use crate::models::maturity::{DEFAULT_INTERVAL_SECS, DEFAULT_MATURITY_COUNT};
use crate::models::units::MAX_DECIMAL_PLACES;
use crate::models::MarketIdentity;

/// Variable d'environnement pointant vers un fichier de configuration
pub const CONFIG_ENV_VAR: &str = "LAZYLEND_CONFIG";

/// Configuration intégrée, utilisée quand aucun fichier n'est trouvé
pub const DEFAULT_CONFIG: &str = r##"
rpc_url = "https://mainnet.optimism.io"
price_api_url = "https://api.coingecko.com/api/v3"
fiat_currency = "usd"
refresh_interval_secs = 60
deposits_source = "floating_assets"
export_dir = "."

[schedule]
interval_secs = 2419200
maturity_count = 7

[retry]
max_attempts = 5
delay_ms = 2000

[price_retry]
max_attempts = 3
delay_ms = 1000

[[markets]]
symbol = "WETH"
name = "Wrapped Ether"
address = "0xc4d4500326981eacD020e20A81b1c479c161c7EF"
decimals = 18
price_id = "ethereum"
color = "#1a56db"

[[markets]]
symbol = "wstETH"
name = "Wrapped liquid staked Ether"
address = "0x22ab31Cd55130435b5efBf9224b6a9d5EC36533F"
decimals = 18
price_id = "wrapped-steth"
color = "#0f662c"

[[markets]]
symbol = "WBTC"
name = "Wrapped Bitcoin"
address = "0x6f748FD65d7c71949BA6641B3248C4C191F3b322"
decimals = 8
price_id = "wrapped-bitcoin"
color = "#9a3412"

[[markets]]
symbol = "USDC"
name = "USD Coin"
address = "0x6926B434CCe9b5b7966aE1BfEef6D0A7DCF3A8bb"
decimals = 6
price_id = "usd-coin"
color = "#166534"

[[markets]]
symbol = "USDC.e"
name = "Bridged USD Coin"
address = "0x81C9A7B55A4df39A9B7B5F781ec0e53539694873"
decimals = 6
price_id = "usd-coin"
color = "#166534"

[[markets]]
symbol = "OP"
name = "Optimism"
address = "0xa430A427bd00210506589906a71B54d6C256CEdb"
decimals = 18
price_id = "optimism"
color = "#991b1b"
"##;

/// Grille des échéances
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_maturity_count")]
    pub maturity_count: usize,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            maturity_count: DEFAULT_MATURITY_COUNT,
        }
    }
}

/// Budget de tentatives d'une famille d'appels réseau
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.delay_ms)
    }
}

/// Configuration complète de l'application
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_price_api_url")]
    pub price_api_url: String,

    #[serde(default = "default_fiat_currency")]
    pub fiat_currency: String,

    /// Rafraîchissement automatique (0 = désactivé)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default)]
    pub deposits_source: DepositsSource,

    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    #[serde(default)]
    pub schedule: ScheduleSettings,

    /// Lectures de contrats et timestamp de bloc
    #[serde(default = "default_retry")]
    pub retry: RetrySettings,

    /// Requêtes à l'API de prix
    #[serde(default = "default_price_retry")]
    pub price_retry: RetrySettings,

    pub markets: Vec<MarketIdentity>,
}

// CONCEPT RUST : #[serde(default = "fonction")]
// - serde appelle la fonction quand la clé est absente du fichier
// - Permet des valeurs par défaut différentes de Default::default()

fn default_rpc_url() -> String {
    "https://mainnet.optimism.io".to_string()
}

fn default_price_api_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_fiat_currency() -> String {
    crate::models::price::DEFAULT_CURRENCY.to_string()
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_maturity_count() -> usize {
    DEFAULT_MATURITY_COUNT
}

fn default_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 5,
        delay_ms: 2000,
    }
}

fn default_price_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        delay_ms: 1000,
    }
}

impl Settings {
    /// Charge la configuration selon l'ordre de recherche
    pub fn load() -> Result<Self> {
        match locate_config_file() {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_file(&path)
            }
            None => {
                info!("No configuration file found, using built-in markets");
                Self::from_toml_str(DEFAULT_CONFIG).context("Built-in configuration is invalid")
            }
        }
    }

    /// Lit et valide un fichier TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parse et valide un document TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content).context("Failed to parse TOML")?;
        settings.validate()?;
        debug!(markets = settings.markets.len(), "Configuration parsed");
        Ok(settings)
    }

    /// Vérifie les contraintes que serde ne peut pas exprimer
    pub fn validate(&self) -> Result<()> {
        if self.markets.is_empty() {
            anyhow::bail!("At least one market must be configured");
        }

        let mut seen = HashSet::new();
        for market in &self.markets {
            if !seen.insert(market.symbol.as_str()) {
                anyhow::bail!("Duplicate market symbol {}", market.symbol);
            }
            validate_market(market)?;
        }

        if self.schedule.interval_secs == 0 {
            anyhow::bail!("schedule.interval_secs must be greater than zero");
        }
        if self.schedule.maturity_count == 0 {
            anyhow::bail!("schedule.maturity_count must be greater than zero");
        }
        if self.retry.max_attempts == 0 || self.price_retry.max_attempts == 0 {
            anyhow::bail!("max_attempts must be greater than zero");
        }

        Ok(())
    }
}

fn validate_market(market: &MarketIdentity) -> Result<()> {
    if market.symbol.trim().is_empty() {
        anyhow::bail!("Market symbol cannot be empty");
    }
    if !is_hex_with_prefix(&market.address, 40) {
        anyhow::bail!("{}: malformed contract address {}", market.symbol, market.address);
    }
    if market.decimals > MAX_DECIMAL_PLACES {
        anyhow::bail!(
            "{}: {} decimals exceeds the supported maximum of {}",
            market.symbol,
            market.decimals,
            MAX_DECIMAL_PLACES
        );
    }
    if market.price_id.trim().is_empty() {
        anyhow::bail!("{}: price_id cannot be empty", market.symbol);
    }
    let color_ok = market
        .color
        .strip_prefix('#')
        .map(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false);
    if !color_ok {
        anyhow::bail!("{}: color must look like #rrggbb, got {}", market.symbol, market.color);
    }
    Ok(())
}

fn is_hex_with_prefix(value: &str, digits: usize) -> bool {
    value
        .strip_prefix("0x")
        .map(|hex| hex.len() == digits && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Premier fichier de configuration existant, selon l'ordre de recherche
fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|dir| dir.join("lazylend").join("config.toml"));
    let local = Some(PathBuf::from("lazylend.toml"));

    [user_config, local]
        .into_iter()
        .flatten()
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(market: &str) -> String {
        format!("[[markets]]\n{}", market)
    }

    const WETH: &str = r##"
symbol = "WETH"
name = "Wrapped Ether"
address = "0xc4d4500326981eacD020e20A81b1c479c161c7EF"
decimals = 18
price_id = "ethereum"
color = "#1a56db"
"##;

    #[test]
    fn test_builtin_config_is_valid() {
        let settings = Settings::from_toml_str(DEFAULT_CONFIG).unwrap();

        let symbols: Vec<&str> = settings.markets.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["WETH", "wstETH", "WBTC", "USDC", "USDC.e", "OP"]);
        assert_eq!(settings.schedule.interval_secs, 2_419_200);
        assert_eq!(settings.schedule.maturity_count, 7);
        assert_eq!(settings.retry.policy().max_attempts, 5);
        assert_eq!(settings.deposits_source, DepositsSource::FloatingAssets);
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let settings = Settings::from_toml_str(&minimal(WETH)).unwrap();

        assert_eq!(settings.fiat_currency, "usd");
        assert_eq!(settings.refresh_interval_secs, 60);
        assert_eq!(settings.price_retry, RetrySettings { max_attempts: 3, delay_ms: 1000 });
        assert_eq!(settings.schedule, ScheduleSettings::default());
    }

    #[test]
    fn test_deposits_source_is_configurable() {
        let doc = format!("deposits_source = \"total_assets\"\n{}", minimal(WETH));
        let settings = Settings::from_toml_str(&doc).unwrap();
        assert_eq!(settings.deposits_source, DepositsSource::TotalAssets);
    }

    #[test]
    fn test_missing_market_attribute_is_rejected() {
        let without_decimals = WETH.replace("decimals = 18\n", "");
        assert!(Settings::from_toml_str(&minimal(&without_decimals)).is_err());
    }

    #[test]
    fn test_validation_errors() {
        assert!(Settings::from_toml_str("markets = []").is_err());

        let duplicated = format!("{}\n[[markets]]\n{}", minimal(WETH), WETH);
        assert!(Settings::from_toml_str(&duplicated).is_err());

        let bad_address = WETH.replace("0xc4d4500326981eacD020e20A81b1c479c161c7EF", "0x1234");
        assert!(Settings::from_toml_str(&minimal(&bad_address)).is_err());

        let too_precise = WETH.replace("decimals = 18", "decimals = 29");
        assert!(Settings::from_toml_str(&minimal(&too_precise)).is_err());

        let bad_color = WETH.replace("#1a56db", "blue");
        assert!(Settings::from_toml_str(&minimal(&bad_color)).is_err());

        let no_price_id = WETH.replace("\"ethereum\"", "\"\"");
        assert!(Settings::from_toml_str(&minimal(&no_price_id)).is_err());

        let zero_interval = format!("[schedule]\ninterval_secs = 0\n\n{}", minimal(WETH));
        assert!(Settings::from_toml_str(&zero_interval).is_err());
    }
}
