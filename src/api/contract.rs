// ============================================================================
// Interfaces des collaborateurs on-chain
// ============================================================================
// Le cœur n'a besoin que de lectures indépendantes, "awaitables", qui
// peuvent répondre "pas de données" (Ok(None)) ou échouer (Err).
// Le transport (JSON-RPC, encodage ABI) vit dans api::rpc.
//
// CONCEPT RUST : Traits + async-trait
// - Les traits natifs ne permettent pas (simplement) les méthodes async
//   utilisables via dyn Trait
// - #[async_trait] transforme `async fn` en `fn -> Pin<Box<dyn Future>>`
// - Permet Arc<dyn ContractReader> et des faux en mémoire pour les tests
// ============================================================================

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{MarketIdentity, RawFixedPool};

/// Quel agrégat utiliser comme "dépôts flottants"
///
/// Choix exposé dans la configuration (clé `deposits_source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositsSource {
    /// floatingAssets() : actifs du pool variable uniquement
    #[default]
    FloatingAssets,
    /// totalAssets() : variable + fixes (vue ERC-4626)
    TotalAssets,
}

/// Lectures d'un contrat de marché
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Total des dépôts du pool flottant (entier brut)
    async fn floating_deposits(&self, market: &MarketIdentity) -> Result<Option<u128>>;

    /// Total des emprunts du pool flottant (entier brut)
    async fn floating_borrows(&self, market: &MarketIdentity) -> Result<Option<u128>>;

    /// Triplet (supplied, borrowed, unassignedEarnings) d'un pool fixe
    async fn fixed_pool(&self, market: &MarketIdentity, maturity: u64) -> Result<Option<RawFixedPool>>;
}

/// Source de temps de référence (timestamp du dernier bloc)
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn current_timestamp(&self) -> Result<Option<u64>>;
}
