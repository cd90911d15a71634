// ============================================================================
// Échéancier des pools à taux fixe
// ============================================================================
// Les échéances sont alignées sur une grille fixe depuis l'epoch Unix
// (2_419_200 s = 28 jours par défaut). À partir d'un timestamp de référence,
// on calcule les N prochaines échéances.
// ============================================================================

use chrono::DateTime;

/// Intervalle par défaut entre deux échéances (28 jours)
pub const DEFAULT_INTERVAL_SECS: u64 = 2_419_200;

/// Nombre d'échéances interrogées par défaut
pub const DEFAULT_MATURITY_COUNT: usize = 7;

/// Première échéance strictement après le plancher de l'intervalle courant
///
/// `reference - (reference % interval) + interval`, avec `interval_secs > 0`.
/// None si l'échéance dépasse `u64::MAX` (timestamp aberrant).
pub fn first_maturity(reference: u64, interval_secs: u64) -> Option<u64> {
    (reference - (reference % interval_secs)).checked_add(interval_secs)
}

/// Retourne `count` échéances croissantes, espacées de `interval_secs`
///
/// Un intervalle nul n'a pas de grille : la liste est vide. Si une échéance
/// ne tient pas dans un u64, la liste entière est vide.
pub fn next_maturities(reference: u64, interval_secs: u64, count: usize) -> Vec<u64> {
    if interval_secs == 0 {
        return Vec::new();
    }

    let first = match first_maturity(reference, interval_secs) {
        Some(first) => first,
        None => return Vec::new(),
    };

    (0..count as u64)
        .map(|i| i.checked_mul(interval_secs).and_then(|offset| first.checked_add(offset)))
        .collect::<Option<Vec<u64>>>()
        .unwrap_or_default()
}

/// Secondes restantes avant l'échéance (0 si déjà passée)
pub fn seconds_to_maturity(maturity: u64, now: u64) -> u64 {
    maturity.saturating_sub(now)
}

/// Date lisible d'une échéance, en UTC (ex: "Jan 4, 2024")
pub fn format_maturity_date(maturity: u64) -> String {
    i64::try_from(maturity)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| maturity.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_next_maturities_example() {
        let interval = DEFAULT_INTERVAL_SECS;
        let maturities = next_maturities(interval * 10 + 5, interval, 3);
        assert_eq!(maturities, vec![interval * 11, interval * 12, interval * 13]);
    }

    #[test]
    fn test_reference_on_grid_moves_to_next_slot() {
        let interval = DEFAULT_INTERVAL_SECS;
        assert_eq!(first_maturity(interval * 4, interval), Some(interval * 5));
    }

    #[test]
    fn test_overflowing_schedule_is_empty() {
        let interval = DEFAULT_INTERVAL_SECS;
        assert_eq!(first_maturity(u64::MAX - 5, interval), None);
        assert!(next_maturities(u64::MAX - 5, interval, 3).is_empty());

        // La première échéance tient, pas la troisième
        let last_slot = u64::MAX - (u64::MAX % interval) - interval;
        assert_eq!(first_maturity(last_slot - 1, interval), Some(last_slot));
        assert!(next_maturities(last_slot - 1, interval, 3).is_empty());
        assert_eq!(next_maturities(last_slot - 1, interval, 2).len(), 2);
    }

    #[test]
    fn test_zero_count_and_zero_interval() {
        assert!(next_maturities(1_700_000_000, DEFAULT_INTERVAL_SECS, 0).is_empty());
        assert!(next_maturities(1_700_000_000, 0, 3).is_empty());
    }

    #[test]
    fn test_seconds_to_maturity_clamps() {
        assert_eq!(seconds_to_maturity(100, 40), 60);
        assert_eq!(seconds_to_maturity(100, 400), 0);
    }

    #[test]
    fn test_format_maturity_date() {
        // 1_704_326_400 = 2024-01-04T00:00:00Z
        assert_eq!(format_maturity_date(1_704_326_400), "Jan 4, 2024");
    }

    proptest! {
        #[test]
        fn prop_maturities_are_aligned_and_spaced(
            reference in 0u64..4_000_000_000,
            interval in 1u64..10_000_000,
            count in 1usize..12,
        ) {
            let maturities = next_maturities(reference, interval, count);
            prop_assert_eq!(maturities.len(), count);
            prop_assert!(maturities[0] > reference);
            prop_assert_eq!(maturities[0] % interval, 0);
            for pair in maturities.windows(2) {
                prop_assert_eq!(pair[1] - pair[0], interval);
            }
        }
    }
}
