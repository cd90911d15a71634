// ============================================================================
// Erreurs du domaine
// ============================================================================
// Taxonomie des erreurs de la pipeline d'acquisition des marchés
//
// CONCEPT RUST : thiserror
// - #[derive(Error)] implémente std::error::Error automatiquement
// - #[error("...")] génère l'implémentation de Display
// - Les erreurs de "plomberie" (HTTP, JSON) restent en anyhow avec contexte,
//   on ne convertit qu'aux frontières du domaine
// ============================================================================

use thiserror::Error;

/// Erreurs remontées par la pipeline d'acquisition et de conversion
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    /// Lecture réseau toujours en échec après épuisement des tentatives
    #[error("{symbol}: {operation} failed after retries: {message}")]
    TransientIo {
        symbol: String,
        operation: String,
        message: String,
    },

    /// Aucun marché n'a pu être acquis pendant ce round
    #[error("No market data could be fetched")]
    NoDataAvailable,

    /// Prix indisponible pour un symbole (non fatal)
    #[error("Price unavailable for {0}")]
    PriceUnavailable(String),

    /// Erreur de programmation dans une conversion d'unités (jamais retentée)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MarketError {
    /// Construit une TransientIo en conservant toute la chaîne de contexte anyhow
    pub fn transient(symbol: &str, operation: &str, error: &anyhow::Error) -> Self {
        MarketError::TransientIo {
            symbol: symbol.to_string(),
            operation: operation.to_string(),
            message: format!("{:#}", error),
        }
    }
}
