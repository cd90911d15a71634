// ============================================================================
// Structures : marchés de prêt
// ============================================================================
// Modèle de données produit par la pipeline d'acquisition
//
// - MarketIdentity : configuration statique d'un marché (immuable)
// - Amount : une valeur brute + sa version décimale
// - FloatingPoolSnapshot : pool à taux variable (dépôts / emprunts)
// - FixedPoolSnapshot : pool à échéance fixe
// - Market : identité + pool flottant + pools fixes triés par échéance
// - MarketSnapshot : tous les marchés acquis pendant un round
//
// CONCEPT RUST : Immutabilité par construction
// - Pas de setters : un Market est construit une fois puis remplacé en entier
// - Les champs sont publics en lecture, la cohérence vient des constructeurs
// ============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::models::units::{format_grouped, to_decimal};

/// Identité d'un marché, chargée depuis la configuration au démarrage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketIdentity {
    /// Symbole unique (ex: "WETH", "USDC.e")
    pub symbol: String,

    /// Nom affiché (ex: "WETH Market")
    pub name: String,

    /// Adresse du contrat (0x + 40 caractères hex)
    pub address: String,

    /// Nombre de décimales de l'actif sous-jacent
    pub decimals: u32,

    /// Identifiant de l'actif de référence chez la source de prix
    /// Plusieurs marchés peuvent partager le même (USDC et USDC.e)
    pub price_id: String,

    /// Couleur d'accent pour l'affichage ("#rrggbb")
    pub color: String,
}

/// Une quantité lue sur la chaîne, sous ses deux formes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    /// Entier brut tel que retourné par le contrat
    pub raw: u128,

    /// raw / 10^decimals
    pub value: Decimal,
}

impl Amount {
    /// Convertit un entier brut avec le nombre de décimales de l'actif
    pub fn from_raw(raw: u128, decimals: u32) -> Result<Self, MarketError> {
        Ok(Self {
            raw,
            value: to_decimal(raw, decimals)?,
        })
    }

    /// Valeur absente (lecture "no data") : traitée comme zéro
    pub fn from_optional_raw(raw: Option<u128>, decimals: u32) -> Result<Self, MarketError> {
        Self::from_raw(raw.unwrap_or(0), decimals)
    }

    pub fn zero() -> Self {
        Self {
            raw: 0,
            value: Decimal::ZERO,
        }
    }

    /// Texte décimal non groupé (ex: "1234.5")
    pub fn decimal_string(&self) -> String {
        if self.value.is_zero() {
            "0".to_string()
        } else {
            self.value.normalize().to_string()
        }
    }

    /// Texte groupé par milliers (ex: "1,234.5")
    pub fn grouped(&self) -> String {
        format_grouped(self.value)
    }
}

/// Agrégats du pool à taux variable d'un marché
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingPoolSnapshot {
    pub deposits: Amount,
    pub borrows: Amount,
}

/// État d'un pool à échéance fixe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPoolSnapshot {
    /// Timestamp Unix de l'échéance (unique par marché)
    pub maturity: u64,
    pub deposits: Amount,
    pub borrows: Amount,
    /// Intérêts accumulés pas encore attribués aux déposants
    pub unassigned_earnings: Amount,
}

/// Triplet brut retourné par la lecture d'un pool fixe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFixedPool {
    pub supplied: u128,
    pub borrowed: u128,
    pub unassigned_earnings: u128,
}

impl FixedPoolSnapshot {
    /// Convertit un triplet brut pour une échéance donnée
    pub fn from_raw(maturity: u64, raw: RawFixedPool, decimals: u32) -> Result<Self, MarketError> {
        Ok(Self {
            maturity,
            deposits: Amount::from_raw(raw.supplied, decimals)?,
            borrows: Amount::from_raw(raw.borrowed, decimals)?,
            unassigned_earnings: Amount::from_raw(raw.unassigned_earnings, decimals)?,
        })
    }
}

/// Un marché complet, construit une fois par round d'acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub identity: MarketIdentity,
    pub floating: FloatingPoolSnapshot,
    /// Toujours triés par échéance croissante
    fixed_pools: Vec<FixedPoolSnapshot>,
}

impl Market {
    /// Construit un marché ; les pools fixes sont triés par échéance
    ///
    /// Si deux pools partagent une échéance, seul le premier est gardé.
    pub fn new(
        identity: MarketIdentity,
        floating: FloatingPoolSnapshot,
        mut fixed_pools: Vec<FixedPoolSnapshot>,
    ) -> Self {
        fixed_pools.sort_by_key(|pool| pool.maturity);
        fixed_pools.dedup_by_key(|pool| pool.maturity);

        Self {
            identity,
            floating,
            fixed_pools,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.identity.symbol
    }

    /// Pools fixes, triés par échéance croissante
    pub fn fixed_pools(&self) -> &[FixedPoolSnapshot] {
        &self.fixed_pools
    }
}

/// Résultat d'un round : les marchés acquis avec succès
///
/// CONCEPT RUST : BTreeMap
/// - Clé = symbole, unicité garantie par la map
/// - Itération dans l'ordre alphabétique : affichage et export stables
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    /// Timestamp de référence (bloc) partagé par tous les marchés du round
    pub reference_timestamp: u64,

    /// Échéances planifiées pour ce round
    pub maturities: Vec<u64>,

    /// Moment de l'acquisition (horloge locale)
    pub acquired_at: DateTime<Utc>,

    markets: BTreeMap<String, Market>,
}

impl MarketSnapshot {
    pub fn new(
        reference_timestamp: u64,
        maturities: Vec<u64>,
        acquired_at: DateTime<Utc>,
        markets: Vec<Market>,
    ) -> Self {
        let markets = markets
            .into_iter()
            .map(|market| (market.identity.symbol.clone(), market))
            .collect();

        Self {
            reference_timestamp,
            maturities,
            acquired_at,
            markets,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&Market> {
        self.markets.get(symbol)
    }

    /// Marchés triés par symbole
    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Constructeurs partagés par les tests des autres modules

    use super::*;

    pub fn identity(symbol: &str, decimals: u32, price_id: &str) -> MarketIdentity {
        MarketIdentity {
            symbol: symbol.to_string(),
            name: format!("{} Market", symbol),
            address: "0xc4d4500326981eacD020e20A81b1c479c161c7EF".to_string(),
            decimals,
            price_id: price_id.to_string(),
            color: "#1a56db".to_string(),
        }
    }

    pub fn market(symbol: &str, decimals: u32, price_id: &str) -> Market {
        let unit = 10u128.pow(decimals);
        let floating = FloatingPoolSnapshot {
            deposits: Amount::from_raw(1_234 * unit + unit / 2, decimals).unwrap(),
            borrows: Amount::from_raw(500 * unit, decimals).unwrap(),
        };
        let pool = FixedPoolSnapshot::from_raw(
            2_419_200 * 11,
            RawFixedPool {
                supplied: 10 * unit,
                borrowed: 4 * unit,
                unassigned_earnings: unit / 4,
            },
            decimals,
        )
        .unwrap();

        Market::new(identity(symbol, decimals, price_id), floating, vec![pool])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn pool(maturity: u64) -> FixedPoolSnapshot {
        FixedPoolSnapshot {
            maturity,
            deposits: Amount::zero(),
            borrows: Amount::zero(),
            unassigned_earnings: Amount::zero(),
        }
    }

    #[test]
    fn test_amount_from_optional_raw() {
        let missing = Amount::from_optional_raw(None, 18).unwrap();
        assert_eq!(missing, Amount::zero());
        assert_eq!(missing.decimal_string(), "0");

        let amount = Amount::from_optional_raw(Some(1_234_500_000), 6).unwrap();
        assert_eq!(amount.decimal_string(), "1234.5");
        assert_eq!(amount.grouped(), "1,234.5");
    }

    #[test]
    fn test_market_sorts_fixed_pools() {
        let floating = FloatingPoolSnapshot {
            deposits: Amount::zero(),
            borrows: Amount::zero(),
        };
        let market = Market::new(
            identity("OP", 18, "optimism"),
            floating,
            vec![pool(300), pool(100), pool(200), pool(100)],
        );

        let maturities: Vec<u64> = market.fixed_pools().iter().map(|p| p.maturity).collect();
        assert_eq!(maturities, vec![100, 200, 300]);
    }

    #[test]
    fn test_snapshot_keyed_by_symbol() {
        let snapshot = MarketSnapshot::new(
            0,
            vec![],
            Utc::now(),
            vec![market("WETH", 18, "ethereum"), market("USDC", 6, "usd-coin")],
        );

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("WETH").is_some());
        assert!(snapshot.get("WBTC").is_none());

        let symbols: Vec<&str> = snapshot.markets().map(|m| m.symbol()).collect();
        assert_eq!(symbols, vec!["USDC", "WETH"]);
    }
}
