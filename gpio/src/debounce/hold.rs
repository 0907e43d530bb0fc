use std::time::Duration;
use log::trace;
use crate::keypad::{KeyState, KeypadEvent};

/// Debounces a stream of single-key scans and detects held keys.
///
/// Any change of the accepted key (press, release, or a switch to another key) is only
/// accepted once strictly more than `debounce_time` has passed since the previous
/// accepted change. A key that stays accepted for at least `hold_time` enters
/// [KeyState::Hold], once per press.
#[derive(Clone, Debug)]
pub struct HoldDebouncer {
    pub debounce_time: Duration,
    pub hold_time: Duration,
    key: Option<u8>,
    state: KeyState,
    last_change: Option<Duration>,
    press_start: Duration,
    holding: bool,
}

impl HoldDebouncer {
    pub const DEFAULT_DEBOUNCE_TIME: Duration = Duration::from_millis(50);
    pub const DEFAULT_HOLD_TIME: Duration = Duration::from_millis(1000);

    pub fn new() -> Self {
        Self {
            debounce_time: Self::DEFAULT_DEBOUNCE_TIME,
            hold_time: Self::DEFAULT_HOLD_TIME,
            key: None,
            state: KeyState::Released,
            last_change: None,
            press_start: Duration::ZERO,
            holding: false,
        }
    }

    /// The currently accepted key.
    pub fn key(&self) -> Option<u8> {
        self.key
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Feeds one scan result taken at `now` and returns the transition it caused, if any.
    pub fn update(&mut self, scanned: Option<u8>, now: Duration) -> Option<KeypadEvent> {
        if scanned != self.key {
            // Before the first accepted change there is nothing to debounce against.
            let settled = self
                .last_change
                .is_none_or(|last| now.saturating_sub(last) > self.debounce_time);
            if !settled {
                trace!("Suppressed bounce {:?} -> {:?}", self.key, scanned);
                return None;
            }

            self.key = scanned;
            self.last_change = Some(now);
            self.press_start = now;
            self.holding = false;
            self.state = if scanned.is_some() { KeyState::Pressed } else { KeyState::Released };
            return Some(KeypadEvent { key: scanned, state: self.state });
        }

        if scanned.is_some() && !self.holding && now.saturating_sub(self.press_start) >= self.hold_time {
            self.state = KeyState::Hold;
            self.holding = true;
            return Some(KeypadEvent { key: scanned, state: self.state });
        }

        None
    }
}

impl Default for HoldDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn pressed(key: u8) -> Option<KeypadEvent> {
        Some(KeypadEvent { key: Some(key), state: KeyState::Pressed })
    }

    #[test]
    fn first_press_is_not_debounced() {
        let mut debouncer = HoldDebouncer::new();
        assert_eq!(debouncer.update(Some(b'4'), ms(0)), pressed(b'4'));
        assert_eq!(debouncer.key(), Some(b'4'));
        assert_eq!(debouncer.state(), KeyState::Pressed);
    }

    #[test]
    fn debounce_window_is_exclusive() {
        let mut debouncer = HoldDebouncer::new();
        debouncer.update(Some(b'1'), ms(100));

        assert_eq!(debouncer.update(None, ms(150)), None);
        assert_eq!(debouncer.key(), Some(b'1'));
        assert_eq!(
            debouncer.update(None, ms(151)),
            Some(KeypadEvent { key: None, state: KeyState::Released }),
        );
        assert_eq!(debouncer.state(), KeyState::Released);
    }

    #[test]
    fn hold_fires_once_at_threshold() {
        let mut debouncer = HoldDebouncer::new();
        debouncer.update(Some(b'4'), ms(0));
        assert_eq!(debouncer.update(Some(b'4'), ms(999)), None);
        assert_eq!(
            debouncer.update(Some(b'4'), ms(1000)),
            Some(KeypadEvent { key: Some(b'4'), state: KeyState::Hold }),
        );
        assert_eq!(debouncer.update(Some(b'4'), ms(5000)), None);
        assert_eq!(debouncer.state(), KeyState::Hold);
    }

    #[test]
    fn switching_keys_restarts_the_hold_timer() {
        let mut debouncer = HoldDebouncer::new();
        debouncer.update(Some(b'1'), ms(0));
        assert_eq!(debouncer.update(Some(b'3'), ms(900)), pressed(b'3'));
        assert_eq!(debouncer.update(Some(b'3'), ms(1100)), None);
        assert_eq!(debouncer.update(Some(b'3'), ms(1900)).map(|e| e.state), Some(KeyState::Hold));
    }

    #[test]
    fn changing_hold_time_after_hold_does_not_refire() {
        let mut debouncer = HoldDebouncer::new();
        debouncer.update(Some(b'1'), ms(0));
        debouncer.update(Some(b'1'), ms(1000));
        debouncer.hold_time = ms(10);
        assert_eq!(debouncer.update(Some(b'1'), ms(1010)), None);
        debouncer.hold_time = ms(5000);
        assert_eq!(debouncer.state(), KeyState::Hold);
        assert_eq!(debouncer.update(Some(b'1'), ms(1020)), None);
    }

    #[test]
    fn steady_release_fires_nothing() {
        let mut debouncer = HoldDebouncer::new();
        assert_eq!(debouncer.update(None, ms(0)), None);
        assert_eq!(debouncer.update(None, ms(10_000)), None);
        assert_eq!(debouncer.state(), KeyState::Released);
    }

    proptest! {
        #[test]
        fn accepted_changes_respect_debounce_and_holds_are_exclusive(
            steps in prop::collection::vec((0u64..40, prop::option::of(0u8..3)), 1..300)
        ) {
            let mut debouncer = HoldDebouncer::new();
            let mut now = 0;
            let mut last_change: Option<u64> = None;
            let mut hold_seen_for_press = false;
            let mut changes = 0;
            let mut holds = 0;
            let mut events = 0;

            for (step, scanned) in steps {
                now += step;
                let scanned = scanned.map(|k| b'1' + k);
                let before = debouncer.key();
                let event = debouncer.update(scanned, ms(now));
                events += event.is_some() as usize;

                if debouncer.key() != before {
                    if let Some(last) = last_change {
                        prop_assert!(now - last > 50);
                    }
                    last_change = Some(now);
                    hold_seen_for_press = false;
                    changes += 1;
                    prop_assert_eq!(event.map(|e| e.key), Some(debouncer.key()));
                } else if let Some(event) = event {
                    prop_assert_eq!(event.state, KeyState::Hold);
                    prop_assert!(!hold_seen_for_press);
                    hold_seen_for_press = true;
                    holds += 1;
                }

                prop_assert_eq!(debouncer.state() == KeyState::Released, debouncer.key().is_none());
            }

            prop_assert_eq!(events, changes + holds);
        }
    }
}
