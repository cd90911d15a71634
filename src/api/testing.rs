// ============================================================================
// Faux collaborateurs pour les tests
// ============================================================================
// Chaîne, horloge et source de prix en mémoire, configurables par symbole.
// Compilé uniquement avec #[cfg(test)] (voir api/mod.rs).
// ============================================================================

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::api::contract::{ContractReader, TimeSource};
use crate::api::prices::PriceSource;
use crate::models::{MarketIdentity, RawFixedPool};

#[derive(Default)]
struct FakeMarket {
    deposits: u128,
    borrows: u128,
    pools: HashMap<u64, RawFixedPool>,
    failing_pools: HashSet<u64>,
    failing_floating: bool,
    empty_floating: bool,
    failing_everything: bool,
    /// Nombre d'échecs restants avant que les lectures flottantes réussissent
    flaky_remaining: AtomicU32,
}

/// Chaîne en mémoire
#[derive(Default)]
pub struct FakeChain {
    markets: HashMap<String, FakeMarket>,
    /// Délai simulé de chaque lecture
    latency: Option<Duration>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un marché sain avec un pool par échéance
    pub fn with_market(mut self, identity: &MarketIdentity, maturities: &[u64]) -> Self {
        let unit = 10u128.pow(identity.decimals);
        let pools = maturities
            .iter()
            .enumerate()
            .map(|(i, &maturity)| {
                let pool = RawFixedPool {
                    supplied: (i as u128 + 1) * 100 * unit,
                    borrowed: (i as u128 + 1) * 40 * unit,
                    unassigned_earnings: unit / 10,
                };
                (maturity, pool)
            })
            .collect();

        self.markets.insert(
            identity.symbol.clone(),
            FakeMarket {
                deposits: 5_000 * unit,
                borrows: 1_250 * unit,
                pools,
                ..FakeMarket::default()
            },
        );
        self
    }

    /// Le pool répond "pas de données"
    pub fn without_pool(mut self, symbol: &str, maturity: u64) -> Self {
        if let Some(market) = self.markets.get_mut(symbol) {
            market.pools.remove(&maturity);
        }
        self
    }

    /// Le pool répond toujours en erreur
    pub fn failing_pool(mut self, symbol: &str, maturity: u64) -> Self {
        if let Some(market) = self.markets.get_mut(symbol) {
            market.failing_pools.insert(maturity);
        }
        self
    }

    /// Les lectures flottantes échouent toujours
    pub fn failing_floating(mut self, symbol: &str) -> Self {
        if let Some(market) = self.markets.get_mut(symbol) {
            market.failing_floating = true;
        }
        self
    }

    /// Les lectures flottantes répondent "pas de données"
    pub fn without_floating(mut self, symbol: &str) -> Self {
        if let Some(market) = self.markets.get_mut(symbol) {
            market.empty_floating = true;
        }
        self
    }

    /// Chaque lecture attend `latency` avant de répondre
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Toutes les lectures du marché échouent (contrat injoignable)
    pub fn failing_market(mut self, symbol: &str) -> Self {
        self.markets.entry(symbol.to_string()).or_default().failing_everything = true;
        self
    }

    /// Les `failures` premières lectures flottantes échouent
    pub fn flaky_floating(mut self, symbol: &str, failures: u32) -> Self {
        if let Some(market) = self.markets.get_mut(symbol) {
            market.flaky_remaining = AtomicU32::new(failures);
        }
        self
    }

    fn market(&self, identity: &MarketIdentity) -> Result<&FakeMarket> {
        match self.markets.get(&identity.symbol) {
            Some(market) if market.failing_everything => {
                anyhow::bail!("{}: connection refused", identity.symbol)
            }
            Some(market) => Ok(market),
            None => anyhow::bail!("{}: unknown contract", identity.symbol),
        }
    }

    fn floating(&self, identity: &MarketIdentity, pick: fn(&FakeMarket) -> u128) -> Result<Option<u128>> {
        let market = self.market(identity)?;
        if market.failing_floating {
            anyhow::bail!("{}: execution reverted", identity.symbol);
        }
        let consumed = market
            .flaky_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            anyhow::bail!("{}: request timed out", identity.symbol);
        }
        if market.empty_floating {
            return Ok(None);
        }
        Ok(Some(pick(market)))
    }
}

#[async_trait]
impl ContractReader for FakeChain {
    async fn floating_deposits(&self, market: &MarketIdentity) -> Result<Option<u128>> {
        self.pause().await;
        self.floating(market, |m| m.deposits)
    }

    async fn floating_borrows(&self, market: &MarketIdentity) -> Result<Option<u128>> {
        self.pause().await;
        self.floating(market, |m| m.borrows)
    }

    async fn fixed_pool(&self, market: &MarketIdentity, maturity: u64) -> Result<Option<RawFixedPool>> {
        self.pause().await;
        let state = self.market(market)?;
        if state.failing_pools.contains(&maturity) {
            anyhow::bail!("{}: pool {} read failed", market.symbol, maturity);
        }
        Ok(state.pools.get(&maturity).copied())
    }
}

/// Horloge figée qui compte ses lectures
pub struct FakeClock {
    /// None : le nœud ne renvoie aucun bloc
    pub timestamp: Option<u64>,
    read_count: AtomicU32,
}

impl FakeClock {
    pub fn at(timestamp: u64) -> Self {
        Self {
            timestamp: Some(timestamp),
            read_count: AtomicU32::new(0),
        }
    }

    /// Horloge qui répond toujours "pas de données"
    pub fn without_block() -> Self {
        Self {
            timestamp: None,
            read_count: AtomicU32::new(0),
        }
    }

    pub fn reads(&self) -> u32 {
        self.read_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeSource for FakeClock {
    async fn current_timestamp(&self) -> Result<Option<u64>> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.timestamp)
    }
}

/// Source de prix en mémoire qui mémorise les ids demandés
#[derive(Default)]
pub struct FakePrices {
    prices: HashMap<String, Decimal>,
    failing: bool,
    pub requests: Mutex<Vec<BTreeSet<String>>>,
}

impl FakePrices {
    pub fn with(entries: &[(&str, Decimal)]) -> Self {
        Self {
            prices: entries.iter().map(|(id, p)| (id.to_string(), *p)).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl PriceSource for FakePrices {
    async fn fetch(&self, ids: &BTreeSet<String>, _currency: &str) -> Result<Option<HashMap<String, Decimal>>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(ids.clone());
        }
        if self.failing {
            anyhow::bail!("price API unreachable");
        }
        Ok(Some(
            ids.iter()
                .filter_map(|id| self.prices.get(id).map(|p| (id.clone(), *p)))
                .collect(),
        ))
    }
}
