// ============================================================================
// Structure : App
// ============================================================================
// État global de l'application TUI
//
// - Le dernier snapshot publié et la table de prix associée
// - Le mode de dénomination (actif / fiat), choisi par l'utilisateur
// - Le numéro de round : seul un résultat PLUS RÉCENT que le dernier publié
//   peut remplacer l'état affiché
//
// PATTERN : "Application State"
// - Tous les composants de l'UI lisent depuis App
// - Toutes les modifications passent par les méthodes de App
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::MarketError;
use crate::export;
use crate::models::{render, DisplayMarket, DisplayMode, MarketSnapshot, PriceTable};

/// Niveau d'un message de statut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

/// Message affiché dans la barre de statut
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub level: StatusLevel,
    pub text: String,
}

impl Status {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}

/// Timestamp Unix courant (horloge locale)
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Première pression de 'q' reçue, en attente de la seconde
    pub confirm_quit: bool,

    /// Index du marché sélectionné (ordre alphabétique du snapshot)
    pub selected_index: usize,

    /// Mode de dénomination global
    pub mode: DisplayMode,

    /// Un round est en cours
    pub is_loading: bool,

    /// Dernier message de statut
    pub status: Option<Status>,

    // CONCEPT RUST : Arc pour des données immuables partagées
    // - Le snapshot publié n'est jamais modifié, seulement remplacé
    // - Le rendu et l'export lisent la même instance sans copie
    snapshot: Option<Arc<MarketSnapshot>>,
    prices: Arc<PriceTable>,

    /// Prochain numéro de round à distribuer (commence à 1)
    next_round: u64,

    /// Dernier round appliqué (0 = aucun)
    last_published_round: u64,

    /// Le worker d'acquisition a disparu : plus aucun round possible
    worker_stopped: bool,

    /// Rafraîchissement automatique (None = désactivé)
    refresh_interval: Option<Duration>,
    last_refresh: Option<Instant>,
}

impl App {
    /// Crée l'état initial ; `refresh_interval_secs == 0` désactive l'auto-refresh
    pub fn new(refresh_interval_secs: u64, currency: &str) -> Self {
        Self {
            running: true,
            confirm_quit: false,
            selected_index: 0,
            mode: DisplayMode::default(),
            is_loading: false,
            status: None,
            snapshot: None,
            prices: Arc::new(PriceTable::empty_in(currency)),
            next_round: 1,
            last_published_round: 0,
            worker_stopped: false,
            refresh_interval: (refresh_interval_secs > 0).then(|| Duration::from_secs(refresh_interval_secs)),
            last_refresh: None,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ========================================================================
    // Rounds d'acquisition
    // ========================================================================

    /// Réserve un nouveau numéro de round (strictement croissant)
    pub fn begin_round(&mut self) -> u64 {
        let round = self.next_round;
        self.next_round += 1;
        self.is_loading = true;
        self.last_refresh = Some(Instant::now());
        self.status = Some(Status::info("Fetching market data..."));
        debug!(round, "Round started");
        round
    }

    /// Applique le résultat d'un round s'il est plus récent que le dernier publié
    ///
    /// Retourne false (et ne touche à rien) pour un résultat périmé.
    pub fn publish_round(&mut self, round: u64, snapshot: MarketSnapshot, prices: PriceTable) -> bool {
        if round <= self.last_published_round {
            warn!(round, last = self.last_published_round, "Discarding stale round result");
            return false;
        }

        info!(round, markets = snapshot.len(), priced = prices.known_count(), "Publishing round");
        self.last_published_round = round;
        self.snapshot = Some(Arc::new(snapshot));
        self.prices = Arc::new(prices);
        self.clamp_selection();
        self.finish_round(round);
        self.status = Some(Status::info(format!(
            "Updated {} markets at {}",
            self.market_count(),
            Utc::now().format("%H:%M:%S UTC")
        )));
        true
    }

    /// Enregistre l'échec d'un round ; le snapshot précédent reste affiché
    pub fn fail_round(&mut self, round: u64, error: &MarketError) {
        if round <= self.last_published_round {
            debug!(round, "Ignoring failure of a superseded round");
            return;
        }

        warn!(round, error = %error, "Round failed, keeping previous snapshot");
        self.finish_round(round);
        self.status = Some(Status::error(error.to_string()));
    }

    /// Le worker ne répond plus ; retourne true au premier signalement seulement
    pub fn worker_stopped(&mut self) -> bool {
        if self.worker_stopped {
            return false;
        }

        self.worker_stopped = true;
        self.is_loading = false;
        self.status = Some(Status::error("Background worker stopped, refresh unavailable"));
        true
    }

    pub fn is_worker_stopped(&self) -> bool {
        self.worker_stopped
    }

    fn finish_round(&mut self, round: u64) {
        // Seul le round le plus récent distribué arrête l'indicateur
        if round + 1 >= self.next_round {
            self.is_loading = false;
        }
    }

    /// Appelé à chaque itération de la boucle ; true si un refresh auto est dû
    pub fn tick(&mut self) -> bool {
        self.refresh_due(Instant::now())
    }

    fn refresh_due(&self, now: Instant) -> bool {
        match (self.refresh_interval, self.last_refresh) {
            _ if self.worker_stopped => false,
            (Some(_), _) if self.is_loading => false,
            (Some(interval), Some(last)) => now.duration_since(last) >= interval,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    // ========================================================================
    // Lecture de l'état publié
    // ========================================================================

    pub fn snapshot(&self) -> Option<&MarketSnapshot> {
        self.snapshot.as_deref()
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn market_count(&self) -> usize {
        self.snapshot.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    /// Vue formatée de tous les marchés, dans le mode courant
    pub fn display_markets(&self, now: u64) -> Vec<DisplayMarket> {
        match &self.snapshot {
            Some(snapshot) => snapshot
                .markets()
                .map(|market| render(market, &self.prices, self.mode, now))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggle();
        info!(mode = self.mode.label(), "Display mode changed");
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn navigate_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn navigate_down(&mut self) {
        let max_index = self.market_count().saturating_sub(1);
        self.selected_index = (self.selected_index + 1).min(max_index);
    }

    fn clamp_selection(&mut self) {
        let max_index = self.market_count().saturating_sub(1);
        self.selected_index = self.selected_index.min(max_index);
    }

    // ========================================================================
    // Quit en deux temps
    // ========================================================================

    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Exporte le snapshot affiché dans `dir` et met à jour le statut
    pub fn export(&mut self, dir: &Path, now: u64) -> Option<PathBuf> {
        let snapshot = match &self.snapshot {
            Some(snapshot) => Arc::clone(snapshot),
            None => {
                self.status = Some(Status::error("Nothing to export yet"));
                return None;
            }
        };

        match export::export_to_dir(dir, &snapshot, &self.prices, self.mode, now) {
            Ok(path) => {
                self.status = Some(Status::info(format!("Exported to {}", path.display())));
                Some(path)
            }
            Err(e) => {
                warn!(error = ?e, "Export failed");
                self.status = Some(Status::error(format!("Export failed: {:#}", e)));
                None
            }
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
