// ============================================================================
// Événements clavier
// ============================================================================
// Lecture non bloquante du clavier (timeout court) et prédicats par touche.
// Le timeout produit un Tick : la boucle principale continue de tourner
// pour relever les résultats du worker et l'auto-refresh.
// ============================================================================

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind};

/// Délai d'attente maximal d'un événement clavier
const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Événements de l'application
#[derive(Debug, Clone)]
pub enum Event {
    /// Touche pressée
    Key(KeyEvent),

    /// Aucun événement pendant POLL_TIMEOUT
    Tick,
}

/// Gestionnaire d'événements (sans état)
#[derive(Default)]
pub struct EventHandler;

impl EventHandler {
    pub fn new() -> Self {
        Self
    }

    /// Attend au plus POLL_TIMEOUT le prochain événement
    ///
    /// Seuls les appuis (KeyEventKind::Press) sont remontés : certains
    /// terminaux envoient aussi Release, qui dédoublerait chaque action.
    pub fn next(&self) -> Result<Event> {
        if !event::poll(POLL_TIMEOUT)? {
            return Ok(Event::Tick);
        }

        match event::read()? {
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Ok(Event::Key(key)),
            _ => Ok(Event::Tick),
        }
    }
}

// ============================================================================
// Prédicats par touche
// ============================================================================

/// Code de la touche, None pour un Tick
fn key_code(event: &Event) -> Option<KeyCode> {
    match event {
        Event::Key(key) => Some(key.code),
        Event::Tick => None,
    }
}

/// 'q' : quitter (confirmation en deux temps côté App)
pub fn is_quit_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('q') | KeyCode::Char('Q')))
}

/// Flèche haut ou 'k' (vim)
pub fn is_up_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K')))
}

/// Flèche bas ou 'j' (vim)
pub fn is_down_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J')))
}

/// 'f' : bascule actif / fiat
pub fn is_toggle_mode_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('f') | KeyCode::Char('F')))
}

/// 'r' : nouveau round d'acquisition
pub fn is_refresh_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('r') | KeyCode::Char('R')))
}

/// 'e' : export CSV du snapshot affiché
pub fn is_export_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('e') | KeyCode::Char('E')))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), event::KeyModifiers::empty()))
    }

    #[test]
    fn test_is_quit_event() {
        assert!(is_quit_event(&key('q')));
        assert!(!is_quit_event(&key('a')));
        assert!(!is_quit_event(&Event::Tick));
    }

    #[test]
    fn test_navigation_keys() {
        let up = Event::Key(KeyEvent::new(KeyCode::Up, event::KeyModifiers::empty()));
        assert!(is_up_event(&up));
        assert!(is_up_event(&key('k')));
        assert!(is_down_event(&key('j')));
        assert!(!is_down_event(&up));
    }

    #[test]
    fn test_action_keys() {
        assert!(is_toggle_mode_event(&key('f')));
        assert!(is_refresh_event(&key('r')));
        assert!(is_export_event(&key('e')));
        assert!(!is_refresh_event(&key('f')));
        assert!(!is_export_event(&Event::Tick));
    }
}
