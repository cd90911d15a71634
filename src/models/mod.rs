// ============================================================================
// Module : models
// ============================================================================
// Structures de données et conversions pures (aucun I/O)
//
// CONCEPT RUST : Modules et visibilité
// - "pub mod" : déclare un sous-module public (accessible depuis l'extérieur)
// - Sans "pub", le module serait privé au crate
// ============================================================================

pub mod display;  // Vue de dénomination (actif / fiat)
pub mod market;   // Marchés, pools, snapshot
pub mod maturity; // Échéancier des pools fixes
pub mod price;    // Table de prix fiat
pub mod units;    // Conversions brut <-> décimal <-> fiat

// Re-export des structures principales pour simplifier les imports
// Au lieu de : use lazylend::models::market::Market;
// On peut faire : use lazylend::models::Market;
pub use display::{render, DisplayMarket, DisplayMode, DisplayPool, PRICE_UNAVAILABLE};
pub use market::{
    Amount, FixedPoolSnapshot, FloatingPoolSnapshot, Market, MarketIdentity, MarketSnapshot,
    RawFixedPool,
};
pub use price::PriceTable;
