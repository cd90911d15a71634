// ============================================================================
// MarketAggregator : un round d'acquisition complet
// ============================================================================
// 1. Lecture UNIQUE du timestamp de référence (bloc courant)
// 2. Calcul des échéances une seule fois pour tout le round
// 3. Acquisition de tous les marchés en parallèle
// 4. Les marchés en échec sont exclus du snapshot (et loggés)
// 5. Aucun marché acquis => NoDataAvailable
// ============================================================================

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::api::client::{MarketClient, RoundReference};
use crate::api::contract::{ContractReader, TimeSource};
use crate::api::retry::{retry, RetryPolicy};
use crate::error::MarketError;
use crate::models::maturity::next_maturities;
use crate::models::{MarketIdentity, MarketSnapshot};

/// Symbole utilisé dans les erreurs qui concernent tout le round
const ROUND_SCOPE: &str = "*";

/// Orchestrateur d'un round d'acquisition
#[derive(Clone)]
pub struct MarketAggregator {
    client: MarketClient,
    clock: Arc<dyn TimeSource>,
    policy: RetryPolicy,
    interval_secs: u64,
    maturity_count: usize,
}

impl MarketAggregator {
    pub fn new(
        reader: Arc<dyn ContractReader>,
        clock: Arc<dyn TimeSource>,
        policy: RetryPolicy,
        interval_secs: u64,
        maturity_count: usize,
    ) -> Self {
        Self {
            client: MarketClient::new(reader, policy),
            clock,
            policy,
            interval_secs,
            maturity_count,
        }
    }

    /// Lit le timestamp de référence du round (avec retry)
    async fn reference(&self) -> Result<RoundReference, MarketError> {
        let timestamp = retry(self.policy, || self.clock.current_timestamp())
            .await
            .map_err(|e| MarketError::transient(ROUND_SCOPE, "block timestamp", &e))?
            .ok_or_else(|| MarketError::TransientIo {
                symbol: ROUND_SCOPE.to_string(),
                operation: "block timestamp".to_string(),
                message: "node returned no block".to_string(),
            })?;

        let maturities = next_maturities(timestamp, self.interval_secs, self.maturity_count);
        if maturities.is_empty() && self.maturity_count > 0 {
            warn!(timestamp, interval = self.interval_secs, "No schedulable maturity, fixed pools skipped");
        }

        Ok(RoundReference { timestamp, maturities })
    }

    /// Acquiert un snapshot de tous les marchés configurés
    ///
    /// # Erreurs
    /// * `TransientIo` - le timestamp de référence n'a pas pu être lu
    /// * `NoDataAvailable` - aucun marché n'a pu être acquis
    #[instrument(skip(self, identities), fields(markets = identities.len()))]
    pub async fn acquire_snapshot(&self, identities: &[MarketIdentity]) -> Result<MarketSnapshot, MarketError> {
        let reference = self.reference().await?;
        info!(
            timestamp = reference.timestamp,
            maturities = reference.maturities.len(),
            "Starting acquisition round"
        );

        // CONCEPT RUST : join_all
        // - Une future par marché, toutes pilotées en même temps
        // - Les résultats reviennent dans l'ordre des identités
        let results = join_all(
            identities
                .iter()
                .map(|identity| self.client.acquire(identity, &reference)),
        )
        .await;

        let mut markets = Vec::with_capacity(identities.len());
        for (identity, result) in identities.iter().zip(results) {
            match result {
                Ok(market) => markets.push(market),
                Err(e) => warn!(symbol = %identity.symbol, error = %e, "Excluding market from snapshot"),
            }
        }

        if markets.is_empty() {
            error!(attempted = identities.len(), "No market acquired during this round");
            return Err(MarketError::NoDataAvailable);
        }

        let snapshot = MarketSnapshot::new(
            reference.timestamp,
            reference.maturities,
            Utc::now(),
            markets,
        );
        info!(
            acquired = snapshot.len(),
            failed = identities.len() - snapshot.len(),
            "Acquisition round complete"
        );
        Ok(snapshot)
    }
}
