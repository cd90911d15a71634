// ============================================================================
// Module : ui
// ============================================================================
// Interface terminal : lecture du clavier et rendu du dashboard
// ============================================================================

pub mod dashboard; // Rendu de l'interface principale
pub mod events;    // Gestion des événements clavier

// Re-exports pour simplifier les imports
pub use dashboard::render;
pub use events::{Event, EventHandler};
