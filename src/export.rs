// ============================================================================
// Export CSV
// ============================================================================
// Une ligne "Floating" par marché, puis une ligne par pool fixe.
// Les valeurs sont EXACTEMENT les textes produits par display::render :
// le fichier exporté et l'écran affichent les mêmes chaînes.
// ============================================================================

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::models::{render, DisplayMode, MarketSnapshot, PriceTable};

/// En-tête du fichier exporté
pub const HEADER: [&str; 7] = [
    "Market",
    "Pool",
    "Maturity",
    "Seconds To Maturity",
    "Deposits",
    "Borrows",
    "Unassigned Earnings",
];

/// Écrit le snapshot au format CSV dans `writer`
///
/// Marchés triés par symbole, pools triés par échéance.
pub fn write_csv<W: Write>(
    writer: W,
    snapshot: &MarketSnapshot,
    prices: &PriceTable,
    mode: DisplayMode,
    now: u64,
) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(HEADER)?;

    for market in snapshot.markets() {
        let view = render(market, prices, mode, now);

        out.write_record([
            view.symbol.as_str(),
            "Floating",
            "",
            "",
            view.floating_deposits.as_str(),
            view.floating_borrows.as_str(),
            "",
        ])?;

        for pool in &view.pools {
            out.write_record([
                view.symbol.as_str(),
                "Fixed",
                pool.maturity_date.as_str(),
                pool.seconds_remaining.as_str(),
                pool.deposits.as_str(),
                pool.borrows.as_str(),
                pool.unassigned_earnings.as_str(),
            ])?;
        }
    }

    out.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Nombre maximal de suffixes essayés pour un même horodatage
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Écrit `markets-<horodatage UTC>.csv` dans `dir` et retourne son chemin
///
/// Un fichier existant n'est jamais écrasé : deux exports dans la même
/// seconde donnent `markets-<horodatage>.csv` puis `markets-<horodatage>-1.csv`.
pub fn export_to_dir(
    dir: &Path,
    snapshot: &MarketSnapshot,
    prices: &PriceTable,
    mode: DisplayMode,
    now: u64,
) -> Result<PathBuf> {
    let stem = format!("markets-{}", Utc::now().format("%Y%m%dT%H%M%SZ"));
    let (file, path) = create_new_file(dir, &stem)?;
    write_csv(file, snapshot, prices, mode, now)?;

    info!(path = %path.display(), markets = snapshot.len(), mode = mode.label(), "Snapshot exported");
    Ok(path)
}

/// Crée `<stem>.csv`, ou `<stem>-N.csv` si le nom est déjà pris
fn create_new_file(dir: &Path, stem: &str) -> Result<(File, PathBuf)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let filename = match attempt {
            0 => format!("{}.csv", stem),
            n => format!("{}-{}.csv", stem, n),
        };
        let path = dir.join(filename);

        // CONCEPT RUST : create_new
        // - Création atomique : échoue avec AlreadyExists au lieu de tronquer
        match File::options().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", path.display()));
            }
        }
    }

    anyhow::bail!(
        "No free export filename for {} in {}",
        stem,
        dir.display()
    )
}
