use crate::consent::ConsentChoice;
use crate::controller::{Command, LogView};
use crate::events::Event;
use crate::models::{Health, LogStats};
use crossterm::event::{KeyCode, KeyEvent};

#[derive(Default)]
pub struct App {
    pub view: Option<LogView>,
    pub scroll: usize,
    pub tick_count: usize,
    pub should_quit: bool,

    // Consent popup
    pub consent_open: bool,
    pub consent_pending: bool,

    // Backend status
    pub health: Option<Health>,
    pub stats: Option<LogStats>,
    pub last_error: Option<String>,
    pub last_update: Option<std::time::Instant>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
    }

    /// Applies an event coming back from the controller.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::Tick => self.on_tick(),
            Event::Input(_) => {}
            Event::LogsUpdated(view) => {
                let max = view.lines.len().saturating_sub(1);
                self.scroll = self.scroll.min(max);
                self.view = Some(view);
                self.last_error = None;
                self.last_update = Some(std::time::Instant::now());
            }
            Event::LogsFailed(e) => self.last_error = Some(e),
            Event::ConsentPrompt => {
                self.consent_open = true;
                self.consent_pending = false;
            }
            Event::ConsentClosed => {
                self.consent_open = false;
                self.consent_pending = false;
            }
            Event::BackendStatus { health, stats } => {
                self.health = health;
                self.stats = stats;
            }
        }
    }

    /// Maps a key press to a controller command, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if self.consent_open {
            // Choice already sent; wait for the controller to close the popup.
            if self.consent_pending {
                if let KeyCode::Char('q') = key.code {
                    self.should_quit = true;
                }
                return None;
            }
            let choice = match key.code {
                KeyCode::Char('a') | KeyCode::Enter => ConsentChoice::Allow,
                KeyCode::Char('l') | KeyCode::Esc => ConsentChoice::Later,
                KeyCode::Char('q') => {
                    self.should_quit = true;
                    return None;
                }
                _ => return None,
            };
            self.consent_pending = true;
            return Some(Command::Consent(choice));
        }

        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                None
            }
            KeyCode::Char('t') => Some(Command::SendTestLog),
            KeyCode::Char('c') => Some(Command::ClearLogs),
            KeyCode::Char('d') => Some(Command::ToggleDetails),
            KeyCode::Char('r') => Some(Command::Refresh),
            KeyCode::Char('h') => Some(Command::CheckHealth),
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.view.as_ref().map(|v| v.lines.len()).unwrap_or(0);
                if len > 0 {
                    self.scroll = (self.scroll + 1).min(len - 1);
                }
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.scroll = self.scroll.saturating_sub(1);
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn popup_keys_send_one_choice() {
        let mut app = App::new();
        app.apply(Event::ConsentPrompt);

        assert_eq!(app.handle_key(press(KeyCode::Char('t'))), None);
        assert_eq!(
            app.handle_key(press(KeyCode::Char('l'))),
            Some(Command::Consent(ConsentChoice::Later))
        );
        assert_eq!(app.handle_key(press(KeyCode::Char('a'))), None);

        app.apply(Event::ConsentClosed);
        assert!(!app.consent_open);
        assert_eq!(app.handle_key(press(KeyCode::Char('d'))), Some(Command::ToggleDetails));
    }

    #[test]
    fn list_keys_map_to_commands() {
        let mut app = App::new();
        assert_eq!(app.handle_key(press(KeyCode::Char('t'))), Some(Command::SendTestLog));
        assert_eq!(app.handle_key(press(KeyCode::Char('c'))), Some(Command::ClearLogs));
        assert_eq!(app.handle_key(press(KeyCode::Char('r'))), Some(Command::Refresh));
        assert_eq!(app.handle_key(press(KeyCode::Char('q'))), None);
        assert!(app.should_quit);
    }

    #[test]
    fn scroll_stays_within_view() {
        let mut app = App::new();
        app.apply(Event::LogsUpdated(LogView {
            last_log: "-".to_string(),
            lines: Vec::new(),
            count: 0,
            empty_text: Some("Aucun log."),
            show_details: false,
        }));
        app.handle_key(press(KeyCode::Down));
        assert_eq!(app.scroll, 0);
        app.handle_key(press(KeyCode::Up));
        assert_eq!(app.scroll, 0);
    }
}
