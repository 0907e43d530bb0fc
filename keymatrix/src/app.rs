//! The module for the main app state and logic.

use log::{debug, info};
use time::OffsetDateTime;
use keymatrix_gpio::keypad::{KeyState, KeypadEvent};

/// Longest entry the user can type before the buffer stops growing.
const MAX_INPUT: usize = 16;

/// The main app state struct.
///
/// Turns keypad events into an entry buffer: every key except `*` and `#` is appended,
/// `*` clears the buffer (as does holding it) and `#` submits it.
#[derive(Debug, Default)]
pub struct App {
    /// Current input from the user.
    input: Vec<char>,
    /// The last submitted entry and when it was submitted.
    last_submitted: Option<(String, OffsetDateTime)>,
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> String {
        self.input.iter().collect()
    }

    pub fn last_submitted(&self) -> Option<&(String, OffsetDateTime)> {
        self.last_submitted.as_ref()
    }

    /// Handles a single event dispatched by the keypad.
    pub fn handle(&mut self, event: KeypadEvent) {
        debug!("Keypad event: {:?}", event);

        let Some(key) = event.key.map(char::from) else {
            return;
        };

        match (event.state, key) {
            (KeyState::Pressed, '*') => self.input.clear(),
            (KeyState::Pressed, '#') => self.submit(),
            (KeyState::Pressed, key) => {
                if self.input.len() < MAX_INPUT {
                    self.input.push(key);
                }
            }
            (KeyState::Hold, '*') => {
                info!("Input cleared: {:?}", self.input());
                self.input.clear();
            }
            (KeyState::Hold | KeyState::Released, _) => {}
        }
    }

    fn submit(&mut self) {
        let entry = self.input();
        let at = now();
        info!("Entry {:?} submitted at {}.", entry, at);
        self.input.clear();
        self.last_submitted = Some((entry, at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(app: &mut App, keys: &str) {
        for key in keys.bytes() {
            app.handle(KeypadEvent { key: Some(key), state: KeyState::Pressed });
            app.handle(KeypadEvent { key: None, state: KeyState::Released });
        }
    }

    #[test]
    fn asterisk_clears_the_whole_entry() {
        let mut app = App::new();
        press(&mut app, "12*");
        assert_eq!(app.input(), "");

        press(&mut app, "34*5");
        assert_eq!(app.input(), "5");
    }

    #[test]
    fn hash_submits_and_resets() {
        let mut app = App::new();
        press(&mut app, "1A0#");
        assert_eq!(app.input(), "");
        assert_eq!(app.last_submitted().map(|(entry, _)| entry.as_str()), Some("1A0"));

        press(&mut app, "#");
        assert_eq!(app.last_submitted().map(|(entry, _)| entry.as_str()), Some(""));
    }

    #[test]
    fn holding_asterisk_clears() {
        let mut app = App::new();
        press(&mut app, "98");
        app.handle(KeypadEvent { key: Some(b'*'), state: KeyState::Hold });
        assert_eq!(app.input(), "");
        assert!(app.last_submitted().is_none());
    }

    #[test]
    fn holding_other_keys_does_not_repeat() {
        let mut app = App::new();
        app.handle(KeypadEvent { key: Some(b'7'), state: KeyState::Pressed });
        app.handle(KeypadEvent { key: Some(b'7'), state: KeyState::Hold });
        assert_eq!(app.input(), "7");
    }

    #[test]
    fn input_is_bounded() {
        let mut app = App::new();
        press(&mut app, &"9".repeat(MAX_INPUT + 4));
        assert_eq!(app.input().len(), MAX_INPUT);
    }
}
