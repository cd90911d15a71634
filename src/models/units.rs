// ============================================================================
// Conversions d'unités
// ============================================================================
// Les contrats exposent des entiers à virgule fixe (ex: 1 USDC = 1_000_000
// avec 6 décimales). Ce module convertit :
// - entier brut -> valeur décimale de l'actif
// - valeur décimale -> valeur en monnaie fiat (avec un prix unitaire)
// - décimal -> texte groupé par milliers ("12,345.678901")
//
// CONCEPT RUST : Decimal au lieu de f64
// - f64 ne représente pas 0.1 exactement
// - rust_decimal garde tous les chiffres (mantisse 96 bits, 28 décimales max)
// - Les divisions par 10^n sont donc exactes
//
// Fonctions pures : pas d'I/O, pas d'état.
// ============================================================================

use rust_decimal::Decimal;

use crate::error::MarketError;

/// Nombre maximal de décimales représentables par rust_decimal
pub const MAX_DECIMAL_PLACES: u32 = 28;

/// Convertit un entier brut en valeur décimale : raw / 10^decimal_places
///
/// # Erreurs
/// `InvalidInput` si `decimal_places` dépasse 28 ou si l'entier ne tient pas
/// dans la mantisse 96 bits.
///
/// # Exemple
/// ```
/// use lazylend::models::units::to_decimal;
/// let one = to_decimal(1_000_000, 6).unwrap();
/// assert_eq!(one.to_string(), "1.000000");
/// ```
pub fn to_decimal(raw: u128, decimal_places: u32) -> Result<Decimal, MarketError> {
    if decimal_places > MAX_DECIMAL_PLACES {
        return Err(MarketError::InvalidInput(format!(
            "decimal places {} exceed the supported maximum of {}",
            decimal_places, MAX_DECIMAL_PLACES
        )));
    }

    if raw == 0 {
        return Ok(Decimal::ZERO);
    }

    let signed = i128::try_from(raw).map_err(|_| {
        MarketError::InvalidInput(format!("raw value {} is out of range", raw))
    })?;

    Decimal::try_from_i128_with_scale(signed, decimal_places).map_err(|e| {
        MarketError::InvalidInput(format!(
            "raw value {} with {} decimals is not representable: {}",
            raw, decimal_places, e
        ))
    })
}

/// Convertit une valeur d'actif en fiat
///
/// Retourne None si le prix est inconnu : un zéro serait trompeur.
/// None aussi en cas de dépassement de capacité.
pub fn to_fiat(value: Decimal, unit_price: Option<Decimal>) -> Option<Decimal> {
    unit_price.and_then(|price| value.checked_mul(price))
}

/// Formate un décimal avec séparateurs de milliers sur la partie entière
///
/// - Garde toute la précision décimale (pas de troncature)
/// - Les zéros non significatifs de la partie décimale sont retirés
/// - Zéro s'affiche "0"
pub fn format_grouped(value: Decimal) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let text = value.normalize().to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };

    let (integer_part, decimal_part) = match digits.split_once('.') {
        Some((int, dec)) => (int, Some(dec)),
        None => (digits, None),
    };

    let grouped = group_thousands(integer_part);

    match decimal_part {
        Some(dec) => format!("{}{}.{}", sign, grouped, dec),
        None => format!("{}{}", sign, grouped),
    }
}

/// Insère une virgule toutes les 3 positions en partant de la droite
pub(crate) fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

// ============================================================================
// Tests unitaires
// ============================================================================
