// ============================================================================
// MarketClient : acquisition d'UN marché
// ============================================================================
// Protocole :
// 1. Deux lectures flottantes (dépôts, emprunts) lancées en parallèle
// 2. Une lecture par échéance planifiée, toutes en parallèle
// 3. Les pools fixes absents ou en erreur sont simplement écartés
// 4. Pools retenus triés par échéance (fait par Market::new)
// 5. Une lecture flottante en erreur fait échouer tout le marché
//
// Les données flottantes sont obligatoires, les pools fixes "best effort".
// ============================================================================

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::api::contract::ContractReader;
use crate::api::retry::{retry, RetryPolicy};
use crate::error::MarketError;
use crate::models::{Amount, FixedPoolSnapshot, FloatingPoolSnapshot, Market, MarketIdentity};

/// Référence temporelle d'un round, partagée par tous les marchés
///
/// Lue une seule fois par l'agrégateur puis passée à chaque client :
/// aucun marché ne relit l'horloge de son côté.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReference {
    /// Timestamp du bloc de référence
    pub timestamp: u64,

    /// Échéances planifiées pour ce round (croissantes)
    pub maturities: Vec<u64>,
}

/// Client d'acquisition d'un marché
#[derive(Clone)]
pub struct MarketClient {
    reader: Arc<dyn ContractReader>,
    policy: RetryPolicy,
}

impl MarketClient {
    pub fn new(reader: Arc<dyn ContractReader>, policy: RetryPolicy) -> Self {
        Self { reader, policy }
    }

    /// Acquiert un marché complet
    ///
    /// # Erreurs
    /// * `TransientIo` - une lecture flottante a échoué après tous les essais
    /// * `InvalidInput` - valeur brute non convertible avec les décimales configurées
    #[instrument(skip(self, identity, reference), fields(symbol = %identity.symbol))]
    pub async fn acquire(
        &self,
        identity: &MarketIdentity,
        reference: &RoundReference,
    ) -> Result<Market, MarketError> {
        debug!(maturities = reference.maturities.len(), "Fetching market data");

        // CONCEPT RUST : futures::join!
        // - Les trois groupes de lectures démarrent ensemble
        // - On attend que tous soient terminés (pas de court-circuit)
        let (deposits, borrows, pools) = futures::join!(
            self.read_floating_deposits(identity),
            self.read_floating_borrows(identity),
            self.read_fixed_pools(identity, &reference.maturities),
        );

        let floating = FloatingPoolSnapshot {
            deposits: Amount::from_optional_raw(deposits?, identity.decimals)?,
            borrows: Amount::from_optional_raw(borrows?, identity.decimals)?,
        };

        let market = Market::new(identity.clone(), floating, pools);
        info!(
            fixed_pools = market.fixed_pools().len(),
            scheduled = reference.maturities.len(),
            "Market acquired"
        );
        Ok(market)
    }

    async fn read_floating_deposits(&self, identity: &MarketIdentity) -> Result<Option<u128>, MarketError> {
        let value = retry(self.policy, || self.reader.floating_deposits(identity))
            .await
            .map_err(|e| MarketError::transient(&identity.symbol, "floating deposits", &e))?;

        if value.is_none() {
            warn!(symbol = %identity.symbol, "Floating deposits returned no data, using zero");
        }
        Ok(value)
    }

    async fn read_floating_borrows(&self, identity: &MarketIdentity) -> Result<Option<u128>, MarketError> {
        let value = retry(self.policy, || self.reader.floating_borrows(identity))
            .await
            .map_err(|e| MarketError::transient(&identity.symbol, "floating borrows", &e))?;

        if value.is_none() {
            warn!(symbol = %identity.symbol, "Floating borrows returned no data, using zero");
        }
        Ok(value)
    }

    /// Lit toutes les échéances en parallèle et garde celles qui ont répondu
    async fn read_fixed_pools(&self, identity: &MarketIdentity, maturities: &[u64]) -> Vec<FixedPoolSnapshot> {
        let reads = maturities.iter().map(|&maturity| async move {
            let result = retry(self.policy, || self.reader.fixed_pool(identity, maturity)).await;
            (maturity, result)
        });

        let mut pools = Vec::with_capacity(maturities.len());
        for (maturity, result) in join_all(reads).await {
            match result {
                Ok(Some(raw)) => match FixedPoolSnapshot::from_raw(maturity, raw, identity.decimals) {
                    Ok(pool) => pools.push(pool),
                    Err(e) => {
                        warn!(symbol = %identity.symbol, maturity, error = %e, "Discarding unconvertible fixed pool");
                    }
                },
                Ok(None) => {
                    debug!(symbol = %identity.symbol, maturity, "Fixed pool has no data, skipping");
                }
                Err(e) => {
                    warn!(symbol = %identity.symbol, maturity, error = ?e, "Fixed pool read failed, skipping");
                }
            }
        }

        pools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeChain;
    use crate::models::market::fixtures::identity;
    use rust_decimal::Decimal;
    use std::time::{Duration, Instant};

    const INTERVAL: u64 = 2_419_200;

    fn reference() -> RoundReference {
        RoundReference {
            timestamp: INTERVAL * 10 + 5,
            maturities: vec![INTERVAL * 11, INTERVAL * 12, INTERVAL * 13],
        }
    }

    fn client(chain: FakeChain) -> MarketClient {
        MarketClient::new(Arc::new(chain), RetryPolicy::new(2, 1))
    }

    #[tokio::test]
    async fn test_acquire_full_market() {
        let weth = identity("WETH", 18, "ethereum");
        let chain = FakeChain::new().with_market(&weth, &reference().maturities);

        let market = client(chain).acquire(&weth, &reference()).await.unwrap();

        assert_eq!(market.symbol(), "WETH");
        assert_eq!(market.fixed_pools().len(), 3);
        assert!(market.floating.deposits.raw > 0);
    }

    #[tokio::test]
    async fn test_missing_and_failing_pools_are_skipped() {
        let weth = identity("WETH", 18, "ethereum");
        let chain = FakeChain::new()
            .with_market(&weth, &reference().maturities)
            .without_pool("WETH", INTERVAL * 12)
            .failing_pool("WETH", INTERVAL * 13);

        let market = client(chain).acquire(&weth, &reference()).await.unwrap();

        let maturities: Vec<u64> = market.fixed_pools().iter().map(|p| p.maturity).collect();
        assert_eq!(maturities, vec![INTERVAL * 11]);
    }

    #[tokio::test]
    async fn test_pools_sorted_by_maturity() {
        let weth = identity("WETH", 18, "ethereum");
        let shuffled = RoundReference {
            timestamp: 0,
            maturities: vec![INTERVAL * 13, INTERVAL * 11, INTERVAL * 12],
        };
        let chain = FakeChain::new().with_market(&weth, &shuffled.maturities);

        let market = client(chain).acquire(&weth, &shuffled).await.unwrap();

        let maturities: Vec<u64> = market.fixed_pools().iter().map(|p| p.maturity).collect();
        assert_eq!(maturities, vec![INTERVAL * 11, INTERVAL * 12, INTERVAL * 13]);
    }

    #[tokio::test]
    async fn test_floating_failure_fails_market() {
        let weth = identity("WETH", 18, "ethereum");
        let chain = FakeChain::new()
            .with_market(&weth, &reference().maturities)
            .failing_floating("WETH");

        let err = client(chain).acquire(&weth, &reference()).await.unwrap_err();

        match err {
            MarketError::TransientIo { symbol, .. } => assert_eq!(symbol, "WETH"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_floating_failure_recovers() {
        let weth = identity("WETH", 18, "ethereum");
        let chain = FakeChain::new()
            .with_market(&weth, &reference().maturities)
            .flaky_floating("WETH", 1);

        let market = client(chain).acquire(&weth, &reference()).await.unwrap();
        assert!(market.floating.borrows.raw > 0);
    }

    #[tokio::test]
    async fn test_floating_without_data_counts_as_zero() {
        let weth = identity("WETH", 18, "ethereum");
        let chain = FakeChain::new()
            .with_market(&weth, &reference().maturities)
            .without_floating("WETH");

        let market = client(chain).acquire(&weth, &reference()).await.unwrap();

        assert_eq!(market.floating.deposits.raw, 0);
        assert_eq!(market.floating.borrows.raw, 0);
        assert_eq!(market.floating.deposits.value, Decimal::ZERO);
        assert_eq!(market.fixed_pools().len(), 3);
    }

    #[tokio::test]
    async fn test_reads_run_concurrently() {
        const LATENCY: Duration = Duration::from_millis(150);

        let weth = identity("WETH", 18, "ethereum");
        let maturities: Vec<u64> = (11..18).map(|n| INTERVAL * n).collect();
        let reference = RoundReference {
            timestamp: INTERVAL * 10,
            maturities: maturities.clone(),
        };
        let chain = FakeChain::new()
            .with_market(&weth, &maturities)
            .with_latency(LATENCY);

        let started = Instant::now();
        let market = client(chain).acquire(&weth, &reference).await.unwrap();
        let elapsed = started.elapsed();

        // 2 lectures flottantes + 7 pools : en séquentiel ce serait 9 x LATENCY
        assert_eq!(market.fixed_pools().len(), 7);
        assert!(elapsed < LATENCY * 2, "acquisition took {:?}", elapsed);
    }
}
