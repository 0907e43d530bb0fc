mod gpio;
mod keymap;
mod matrix;

use std::fmt::Debug;
use thiserror::Error;
use crate::{GpioError, GpioResult};
pub use gpio::*;
pub use keymap::*;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Reads every key that is currently closed, without any filtering.
    fn read(&self) -> GpioResult<Vec<Self::Key>>;
}

/// The logical state of the current key, as seen by the debouncer.
///
/// The discriminants are stable and can be exchanged as raw bytes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum KeyState {
    /// No key is accepted as pressed.
    #[default]
    Released = 0,
    /// A key has been accepted as pressed.
    Pressed = 1,
    /// The pressed key has been held for at least the hold time.
    Hold = 2,
}

impl From<KeyState> for u8 {
    fn from(state: KeyState) -> Self {
        state as u8
    }
}

impl TryFrom<u8> for KeyState {
    type Error = GpioError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyState::Released),
            1 => Ok(KeyState::Pressed),
            2 => Ok(KeyState::Hold),
            _ => Err(GpioError::InvalidArgument),
        }
    }
}

/// A single transition dispatched to the keypad listener.
///
/// A release carries `key: None`. A press and the hold that follows it carry the
/// same key and differ only in `state`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeypadEvent {
    pub key: Option<u8>,
    pub state: KeyState,
}

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum KeypadError {
    #[error("expected {expected} {what} pins, got {actual}")]
    PinCount {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Keymap(#[from] KeymapError),
    #[error(transparent)]
    Gpio(#[from] GpioError),
}

pub type KeypadResult<T> = Result<T, KeypadError>;
