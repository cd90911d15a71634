// ============================================================================
// Oracle de prix
// ============================================================================
// Récupère le prix fiat des actifs de référence (API CoinGecko par défaut)
// et construit une PriceTable indexée par SYMBOLE de marché.
//
// - Les ids de référence sont dédupliqués avant la requête : USDC et USDC.e
//   partagent "usd-coin", une seule recherche, une seule valeur
// - Un prix manquant donne None pour chaque symbole concerné
// - Une API injoignable dégrade l'affichage, jamais l'acquisition
// ============================================================================

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::api::retry::{retry, RetryPolicy};
use crate::models::{MarketIdentity, PriceTable};

/// Requête groupée : ids de référence -> prix unitaire
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Ok(None) = réponse vide ("pas de données") ; les ids sans prix
    /// connu sont simplement absents de la map
    async fn fetch(&self, ids: &BTreeSet<String>, currency: &str) -> Result<Option<HashMap<String, Decimal>>>;
}

// ============================================================================
// CoinGecko
// ============================================================================

/// Client de l'endpoint /simple/price
///
/// Réponse : {"ethereum": {"usd": 3012.4}, "usd-coin": {"usd": 1.0}}
pub struct CoinGeckoSource {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lazylend/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Construit l'URL de la requête groupée
fn build_price_url(base_url: &str, ids: &BTreeSet<String>, currency: &str) -> String {
    let joined = ids.iter().map(String::as_str).collect::<Vec<_>>().join(",");
    format!(
        "{}/simple/price?ids={}&vs_currencies={}",
        base_url, joined, currency
    )
}

/// Extrait les prix de la réponse JSON ; les valeurs non numériques sont ignorées
fn parse_price_response(
    body: HashMap<String, HashMap<String, serde_json::Value>>,
    currency: &str,
) -> HashMap<String, Decimal> {
    body.into_iter()
        .filter_map(|(id, quotes)| match quotes.get(currency)? {
            serde_json::Value::Number(number) => Some((id, decimal_from_json(number)?)),
            _ => None,
        })
        .collect()
}

/// Texte exact du nombre JSON -> Decimal, notation scientifique comprise
///
/// Avec `arbitrary_precision`, `Number` conserve les chiffres reçus : aucun
/// passage par un f64.
fn decimal_from_json(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    #[instrument(skip(self), fields(ids = ids.len()))]
    async fn fetch(&self, ids: &BTreeSet<String>, currency: &str) -> Result<Option<HashMap<String, Decimal>>> {
        let url = build_price_url(&self.base_url, ids, currency);
        debug!(url = %url, "Requesting prices");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Price API request failed")?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("Price API returned HTTP {}", status);
        }

        let body: HashMap<String, HashMap<String, serde_json::Value>> = response
            .json()
            .await
            .context("Failed to parse price response")?;

        Ok(Some(parse_price_response(body, currency)))
    }
}

// ============================================================================
// PriceOracle
// ============================================================================

/// Oracle : déduplication des ids, retry, projection par symbole
#[derive(Clone)]
pub struct PriceOracle {
    source: Arc<dyn PriceSource>,
    currency: String,
    policy: RetryPolicy,
}

impl PriceOracle {
    pub fn new(source: Arc<dyn PriceSource>, currency: &str, policy: RetryPolicy) -> Self {
        Self {
            source,
            currency: currency.to_ascii_lowercase(),
            policy,
        }
    }

    /// Retourne une table avec une entrée par symbole (None si prix inconnu)
    ///
    /// Ne retourne jamais d'erreur : en cas d'échec, tous les prix sont None.
    pub async fn fetch_prices(&self, identities: &[MarketIdentity]) -> PriceTable {
        // CONCEPT RUST : BTreeSet pour dédupliquer ET ordonner
        let ids: BTreeSet<String> = identities.iter().map(|m| m.price_id.clone()).collect();

        let quotes = if ids.is_empty() {
            HashMap::new()
        } else {
            match retry(self.policy, || self.source.fetch(&ids, &self.currency)).await {
                Ok(Some(quotes)) => quotes,
                Ok(None) => {
                    warn!("Price source returned no data");
                    HashMap::new()
                }
                Err(e) => {
                    warn!(error = ?e, "Price lookup failed, fiat values unavailable");
                    HashMap::new()
                }
            }
        };

        let prices: BTreeMap<String, Option<Decimal>> = identities
            .iter()
            .map(|m| (m.symbol.clone(), quotes.get(&m.price_id).copied()))
            .collect();

        for (symbol, price) in &prices {
            if price.is_none() {
                debug!(symbol = %symbol, "No price for market");
            }
        }

        let table = PriceTable::new(&self.currency, prices, Utc::now());
        info!(
            markets = table.len(),
            priced = table.known_count(),
            lookups = ids.len(),
            "Price table refreshed"
        );
        table
    }
}
