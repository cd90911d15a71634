// ============================================================================
// Structure : PriceTable
// ============================================================================
// Prix unitaire en fiat par symbole de marché
//
// - Une entrée None = prix indisponible (jamais remplacé par zéro)
// - Remplacée en entier à chaque rafraîchissement, lecture seule entre-temps
// ============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::MarketError;

/// Devise fiat par défaut
pub const DEFAULT_CURRENCY: &str = "usd";

/// Table symbole -> prix fiat
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    /// Code de la devise des prix (ex: "usd")
    pub currency: String,

    prices: BTreeMap<String, Option<Decimal>>,

    /// Moment du fetch (None pour une table vide initiale)
    pub fetched_at: Option<DateTime<Utc>>,
}

impl PriceTable {
    /// Table vide : tous les prix sont inconnus
    pub fn empty() -> Self {
        Self::empty_in(DEFAULT_CURRENCY)
    }

    /// Table vide dans une devise donnée
    pub fn empty_in(currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            prices: BTreeMap::new(),
            fetched_at: None,
        }
    }

    pub fn new(
        currency: &str,
        prices: BTreeMap<String, Option<Decimal>>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            currency: currency.to_string(),
            prices,
            fetched_at: Some(fetched_at),
        }
    }

    /// Prix d'un symbole, None s'il est inconnu ou absent de la table
    pub fn price_for(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied().flatten()
    }

    /// Variante "erreur typée" de price_for
    pub fn require(&self, symbol: &str) -> Result<Decimal, MarketError> {
        self.price_for(symbol)
            .ok_or_else(|| MarketError::PriceUnavailable(symbol.to_string()))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Nombre de symboles ayant un prix connu
    pub fn known_count(&self) -> usize {
        self.prices.values().filter(|p| p.is_some()).count()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::empty()
    }
}
