// ============================================================================
// Vue de dénomination
// ============================================================================
// Transforme un Market en textes prêts à afficher, soit en unités de l'actif
// ("1,234.5 WETH"), soit en fiat ("$3,703,500.00").
//
// C'est l'UNIQUE chemin de formatage : le dashboard et l'export CSV appellent
// tous les deux render(). Mêmes entrées => mêmes octets.
// ============================================================================

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::trace;

use crate::models::maturity::{format_maturity_date, seconds_to_maturity};
use crate::models::units::{format_grouped, group_thousands, to_fiat};
use crate::models::{Amount, Market, PriceTable};

/// Texte affiché à la place d'une valeur fiat quand le prix est inconnu
pub const PRICE_UNAVAILABLE: &str = "price unavailable";

/// Mode de dénomination global, modifié uniquement par l'utilisateur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Unités natives de l'actif
    #[default]
    Asset,
    /// Conversion en monnaie fiat
    Fiat,
}

impl DisplayMode {
    /// Bascule Asset <-> Fiat
    pub fn toggle(self) -> Self {
        match self {
            DisplayMode::Asset => DisplayMode::Fiat,
            DisplayMode::Fiat => DisplayMode::Asset,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DisplayMode::Asset => "Asset",
            DisplayMode::Fiat => "Fiat",
        }
    }
}

/// Pool fixe formaté
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPool {
    pub maturity: u64,
    pub maturity_date: String,
    pub seconds_remaining: String,
    pub deposits: String,
    pub borrows: String,
    pub unassigned_earnings: String,
}

/// Marché formaté : même forme que Market, tous les nombres en texte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMarket {
    pub symbol: String,
    pub name: String,
    pub color: String,
    pub floating_deposits: String,
    pub floating_borrows: String,
    pub pools: Vec<DisplayPool>,
}

/// Formate un marché selon le mode et la table de prix
///
/// `now` (timestamp Unix) sert au calcul du temps restant avant échéance ;
/// le passer en paramètre garde la fonction déterministe.
pub fn render(market: &Market, prices: &PriceTable, mode: DisplayMode, now: u64) -> DisplayMarket {
    let symbol = market.symbol();

    let formatter = match mode {
        DisplayMode::Asset => Formatter::Asset(symbol),
        DisplayMode::Fiat => match prices.require(symbol) {
            Ok(price) => Formatter::Fiat {
                price,
                sign: currency_sign(&prices.currency),
            },
            Err(e) => {
                trace!(error = %e, "Rendering market without fiat price");
                Formatter::Unavailable
            }
        },
    };
    let format_amount = |amount: &Amount| formatter.format(amount);

    let pools = market
        .fixed_pools()
        .iter()
        .map(|pool| DisplayPool {
            maturity: pool.maturity,
            maturity_date: format_maturity_date(pool.maturity),
            seconds_remaining: seconds_to_maturity(pool.maturity, now).to_string(),
            deposits: format_amount(&pool.deposits),
            borrows: format_amount(&pool.borrows),
            unassigned_earnings: format_amount(&pool.unassigned_earnings),
        })
        .collect();

    DisplayMarket {
        symbol: symbol.to_string(),
        name: market.identity.name.clone(),
        color: market.identity.color.clone(),
        floating_deposits: format_amount(&market.floating.deposits),
        floating_borrows: format_amount(&market.floating.borrows),
        pools,
    }
}

/// Règle de formatage choisie une fois pour tout le marché
///
/// CONCEPT : un marché est soit entièrement en actif, soit entièrement en
/// fiat, soit entièrement marqué "price unavailable" (jamais un mélange)
enum Formatter<'a> {
    Asset(&'a str),
    Fiat { price: Decimal, sign: String },
    Unavailable,
}

impl Formatter<'_> {
    fn format(&self, amount: &Amount) -> String {
        match self {
            Formatter::Asset(symbol) => format_asset(amount.value, symbol),
            Formatter::Fiat { price, sign } => format_fiat(amount.value, Some(*price), sign),
            Formatter::Unavailable => PRICE_UNAVAILABLE.to_string(),
        }
    }
}

/// "1,234.5 WETH"
pub fn format_asset(value: Decimal, symbol: &str) -> String {
    format!("{} {}", format_grouped(value), symbol)
}

/// "$1,234.50", ou le marqueur si le prix manque
pub fn format_fiat(value: Decimal, unit_price: Option<Decimal>, sign: &str) -> String {
    let fiat = match to_fiat(value, unit_price) {
        Some(fiat) => fiat.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        None => return PRICE_UNAVAILABLE.to_string(),
    };

    let text = format!("{:.2}", fiat);
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (integer_part, cents) = digits.split_once('.').unwrap_or((digits, "00"));

    format!("{}{}{}.{}", negative, sign, group_thousands(integer_part), cents)
}

/// Préfixe monétaire d'un code devise
pub fn currency_sign(code: &str) -> String {
    match code.to_ascii_lowercase().as_str() {
        "usd" => "$".to_string(),
        "eur" => "€".to_string(),
        "gbp" => "£".to_string(),
        "jpy" => "¥".to_string(),
        other => format!("{} ", other.to_ascii_uppercase()),
    }
}
