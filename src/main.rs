// ============================================================================
// LazyLend - Tableau de bord des marchés de prêt
// ============================================================================
// Programme TUI qui lit l'état des marchés de prêt (pools flottants et pools
// à échéance fixe) directement sur la chaîne et l'affiche en unités d'actif
// ou en fiat.
//
// Deux threads :
// - Thread UI : terminal, clavier, rendu, possède Arc<Mutex<App>>
// - Worker : runtime tokio mono-thread, exécute les rounds d'acquisition
//
// CONCEPTS RUST CLÉS :
// 1. Terminal raw mode : contrôle total du terminal
// 2. Event loop : boucle qui gère événements, résultats et rendu
// 3. Channels : commandes vers le worker, résultats vers l'UI
// ============================================================================

use std::io;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc as async_mpsc;
use tracing::{debug, error, info};

use lazylend::api::{
    CoinGeckoSource, ContractReader, MarketAggregator, PriceOracle, RpcClient, TimeSource,
};
use lazylend::app::{unix_now, App};
use lazylend::config::Settings;
use lazylend::error::MarketError;
use lazylend::models::{MarketIdentity, MarketSnapshot, PriceTable};
use lazylend::ui::{events::EventHandler, render};

// ============================================================================
// Messages échangés avec le worker
// ============================================================================

/// Commandes envoyées au worker
#[derive(Debug, Clone)]
enum AppCommand {
    /// Lance un round d'acquisition numéroté
    Refresh { round: u64 },
}

/// Résultats renvoyés par le worker
#[derive(Debug)]
enum AppResult {
    RoundCompleted {
        round: u64,
        snapshot: MarketSnapshot,
        prices: PriceTable,
    },
    RoundFailed {
        round: u64,
        error: MarketError,
    },
}

/// Services partagés par tous les rounds
#[derive(Clone)]
struct Pipeline {
    aggregator: MarketAggregator,
    oracle: PriceOracle,
    markets: Arc<Vec<MarketIdentity>>,
}

impl Pipeline {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let rpc = Arc::new(RpcClient::new(&settings.rpc_url, settings.deposits_source)?);
        let reader: Arc<dyn ContractReader> = rpc.clone();
        let clock: Arc<dyn TimeSource> = rpc;

        let aggregator = MarketAggregator::new(
            reader,
            clock,
            settings.retry.policy(),
            settings.schedule.interval_secs,
            settings.schedule.maturity_count,
        );

        let prices = Arc::new(CoinGeckoSource::new(&settings.price_api_url)?);
        let oracle = PriceOracle::new(prices, &settings.fiat_currency, settings.price_retry.policy());

        Ok(Self {
            aggregator,
            oracle,
            markets: Arc::new(settings.markets.clone()),
        })
    }

    /// Un round : snapshot et prix acquis en parallèle
    async fn run_round(&self, round: u64) -> AppResult {
        let (snapshot, prices) = futures::join!(
            self.aggregator.acquire_snapshot(&self.markets),
            self.oracle.fetch_prices(&self.markets),
        );

        match snapshot {
            Ok(snapshot) => AppResult::RoundCompleted {
                round,
                snapshot,
                prices,
            },
            Err(error) => AppResult::RoundFailed { round, error },
        }
    }
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Les println! sont illisibles une fois le TUI lancé : tout part dans
// ./logs/lazylend.log (rotation quotidienne).
//
//   tail -f logs/lazylend.log
//   RUST_LOG=lazylend=trace cargo run
// ============================================================================

fn init_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = std::path::PathBuf::from("./logs");
    std::fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "lazylend.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            // Par défaut : debug pour lazylend, info pour les dépendances
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lazylend=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialized");
    Ok(())
}

// ============================================================================
// Point d'entrée
// ============================================================================

fn main() -> Result<()> {
    init_logging().unwrap_or_else(|e| {
        eprintln!("Warning: failed to initialize logging: {}", e);
        eprintln!("Continuing without logging...");
    });

    info!("LazyLend starting up");

    let settings = Settings::load().context("Failed to load configuration")?;
    info!(
        markets = settings.markets.len(),
        rpc = %settings.rpc_url,
        currency = %settings.fiat_currency,
        "Configuration loaded"
    );

    let pipeline = Pipeline::from_settings(&settings)?;

    let mut terminal = setup_terminal()?;

    let app = Arc::new(Mutex::new(App::new(
        settings.refresh_interval_secs,
        &settings.fiat_currency,
    )));

    // CONCEPT RUST : deux sortes de channels
    // - tokio::sync::mpsc côté worker : recv().await dans le runtime
    // - std::sync::mpsc côté UI : try_recv() non bloquant dans la boucle
    let (command_tx, command_rx) = async_mpsc::unbounded_channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::channel::<AppResult>();

    info!("Spawning background worker thread");
    spawn_background_worker(pipeline, command_rx, result_tx);

    let events = EventHandler::new();

    info!("Starting event loop");
    let result = run(&mut terminal, &app, &events, &settings, command_tx, result_rx);

    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

/// Verrouille App même si un autre thread a paniqué en la tenant
fn lock(app: &Mutex<App>) -> MutexGuard<'_, App> {
    app.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Background Worker Thread
// ============================================================================
// CONCEPT RUST : runtime current_thread
// - block_on pilote la boucle de commandes ET les tâches spawnées
// - Chaque round est une tâche : un refresh manuel pendant un round en
//   cours démarre tout de suite, le numéro de round départage les résultats
// ============================================================================

fn spawn_background_worker(
    pipeline: Pipeline,
    mut command_rx: async_mpsc::UnboundedReceiver<AppCommand>,
    result_tx: mpsc::Sender<AppResult>,
) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = ?e, "Failed to create tokio runtime, worker disabled");
                return;
            }
        };

        runtime.block_on(async move {
            while let Some(command) = command_rx.recv().await {
                info!(?command, "Worker received command");

                match command {
                    AppCommand::Refresh { round } => {
                        let pipeline = pipeline.clone();
                        let result_tx = result_tx.clone();
                        tokio::spawn(async move {
                            let result = pipeline.run_round(round).await;
                            if result_tx.send(result).is_err() {
                                debug!(round, "UI gone, dropping round result");
                            }
                        });
                    }
                }
            }
            info!("Worker thread exiting (channel closed)");
        });
    });
}

// ============================================================================
// Event Loop Principal
// ============================================================================
// 0. Résultats du worker (non bloquant)
// 1. Rendu
// 2. Entrée clavier
// 3. Tick : auto-refresh éventuel
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &Arc<Mutex<App>>,
    events: &EventHandler,
    settings: &Settings,
    command_tx: async_mpsc::UnboundedSender<AppCommand>,
    result_rx: mpsc::Receiver<AppResult>,
) -> Result<()> {
    request_refresh(&mut lock(app), &command_tx);

    loop {
        if !lock(app).is_running() {
            break;
        }

        // 0. RÉSULTATS
        loop {
            match result_rx.try_recv() {
                Ok(result) => apply_result(&mut lock(app), result),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    if lock(app).worker_stopped() {
                        error!("Worker thread disconnected");
                    }
                    break;
                }
            }
        }

        // 1. RENDER
        terminal.draw(|frame| {
            let app_lock = lock(app);
            render(frame, &app_lock);
        })?;

        // 2. INPUT
        match events.next() {
            Ok(event) => handle_event(&mut lock(app), event, settings, &command_tx),
            Err(e) => debug!(error = ?e, "Failed to read terminal event"),
        }

        // 3. UPDATE
        let mut app_lock = lock(app);
        if app_lock.tick() {
            debug!("Auto refresh due");
            request_refresh(&mut app_lock, &command_tx);
        }
    }

    Ok(())
}

fn apply_result(app: &mut App, result: AppResult) {
    match result {
        AppResult::RoundCompleted {
            round,
            snapshot,
            prices,
        } => {
            app.publish_round(round, snapshot, prices);
        }
        AppResult::RoundFailed { round, error } => {
            error!(round, error = %error, "Round failed");
            app.fail_round(round, &error);
        }
    }
}

fn request_refresh(app: &mut App, command_tx: &async_mpsc::UnboundedSender<AppCommand>) {
    if app.is_worker_stopped() {
        debug!("Refresh ignored, worker stopped");
        return;
    }

    let round = app.begin_round();
    if command_tx.send(AppCommand::Refresh { round }).is_err() {
        if app.worker_stopped() {
            error!(round, "Worker unavailable, refresh dropped");
        }
    }
}

// ============================================================================
// Gestion des événements
// ============================================================================

fn handle_event(
    app: &mut App,
    event: lazylend::ui::events::Event,
    settings: &Settings,
    command_tx: &async_mpsc::UnboundedSender<AppCommand>,
) {
    use lazylend::ui::events::{
        is_down_event, is_export_event, is_quit_event, is_refresh_event, is_toggle_mode_event,
        is_up_event, Event,
    };

    match event {
        Event::Key(_) if is_quit_event(&event) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        Event::Key(_) if is_up_event(&event) => {
            app.cancel_quit();
            app.navigate_up();
        }
        Event::Key(_) if is_down_event(&event) => {
            app.cancel_quit();
            app.navigate_down();
        }

        Event::Key(_) if is_toggle_mode_event(&event) => {
            app.cancel_quit();
            app.toggle_mode();
        }

        Event::Key(_) if is_refresh_event(&event) => {
            app.cancel_quit();
            info!("User requested refresh");
            request_refresh(app, command_tx);
        }

        Event::Key(_) if is_export_event(&event) => {
            app.cancel_quit();
            info!(dir = %settings.export_dir.display(), "User requested export");
            app.export(&settings.export_dir, unix_now());
        }

        Event::Key(_) => app.cancel_quit(),

        Event::Tick => {}
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================
// IMPORTANT : toujours restaurer le terminal avant de quitter
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    Terminal::new(CrosstermBackend::new(stdout)).map_err(|e| e.into())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}
