// ============================================================================
// Module : api
// ============================================================================
// Tout ce qui parle au réseau : nœud JSON-RPC (contrats de marché), API de
// prix, et l'orchestration d'un round d'acquisition au-dessus.
// ============================================================================

pub mod aggregator; // Round complet : horloge + tous les marchés
pub mod client;     // Acquisition d'un marché
pub mod contract;   // Traits ContractReader / TimeSource
pub mod prices;     // Oracle de prix fiat
pub mod retry;      // Retry borné à délai fixe
pub mod rpc;        // Client JSON-RPC (eth_call, bloc courant)

#[cfg(test)]
pub(crate) mod testing;

// Re-export des types principaux
pub use aggregator::MarketAggregator;
pub use client::{MarketClient, RoundReference};
pub use contract::{ContractReader, DepositsSource, TimeSource};
pub use prices::{CoinGeckoSource, PriceOracle, PriceSource};
pub use retry::{retry, RetryPolicy};
pub use rpc::RpcClient;
