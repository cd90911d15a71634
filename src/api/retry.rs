// ============================================================================
// Retry borné
// ============================================================================
// Enveloppe générique autour d'UNE opération async. Utilisée pour chaque
// appel réseau (lectures de contrats, bloc courant, prix).
//
// L'opération retourne Result<Option<T>, E> :
// - Ok(Some(v)) : succès, on retourne immédiatement
// - Ok(None)    : "pas de données" (échec doux), on réessaie
// - Err(e)      : erreur, on réessaie aussi
//
// Délai fixe entre les tentatives, pas de backoff exponentiel : les échecs
// attendus sont des hoquets réseau passagers.
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Budget de tentatives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Nombre total de tentatives (au moins 1)
    pub max_attempts: u32,

    /// Pause entre deux tentatives
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1000)
    }
}

/// Exécute `operation` jusqu'à `policy.max_attempts` fois
///
/// # Retourne
/// * `Ok(Some(v))` - une tentative a réussi
/// * `Ok(None)` - TOUTES les tentatives ont répondu "pas de données"
///   (absence confirmée : l'appelant saute cette unité de travail)
/// * `Err(e)` - au moins une tentative a échoué et aucune n'a réussi ;
///   la dernière erreur est propagée (résultat jamais déterminé)
///
/// CONCEPT RUST : Générique sur l'opération
/// - F: FnMut() -> Fut : on peut rappeler la fabrique de futures
/// - Chaque appel produit une nouvelle Future (une future ne se rejoue pas)
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error: Option<E> = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(Some(value)) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(Some(value));
            }
            Ok(None) => {
                debug!(attempt, max_attempts, "Operation returned no data");
            }
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "Operation failed");
                last_error = Some(e);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, 1)
    }

    #[tokio::test]
    async fn test_succeeds_on_kth_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<Option<u32>, String> = retry(fast(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("hiccup {}", n))
                } else {
                    Ok(Some(42))
                }
            }
        })
        .await;

        assert_eq!(result, Ok(Some(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_propagates_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<Option<u32>, String> = retry(fast(4), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("failure {}", n)) }
        })
        .await;

        assert_eq!(result, Err("failure 4".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_no_data_everywhere_returns_none() {
        let calls = AtomicU32::new(0);

        let result: Result<Option<u32>, String> = retry(fast(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await;

        assert_eq!(result, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_then_no_data_is_not_confirmed_absent() {
        let calls = AtomicU32::new(0);

        let result: Result<Option<u32>, String> = retry(fast(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err("timeout".to_string())
                } else {
                    Ok(None)
                }
            }
        })
        .await;

        assert_eq!(result, Err("timeout".to_string()));
    }

    #[test]
    fn test_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, 10).max_attempts, 1);
    }
}
