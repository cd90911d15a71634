// ============================================================================
// LazyLend - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests
// ============================================================================

pub mod api;     // Nœud JSON-RPC, prix, agrégation
pub mod app;     // État de l'application
pub mod config;  // Configuration TOML
pub mod error;   // Erreurs du domaine
pub mod export;  // Export CSV
pub mod models;  // Structures de données et formatage
pub mod ui;      // Interface utilisateur
