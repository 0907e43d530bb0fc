use std::fmt::{Debug, Formatter};
use std::time::Duration;
use log::{debug, trace};
use crate::clock::Clock;
use crate::debounce::HoldDebouncer;
use crate::keypad::matrix::Matrix;
use crate::keypad::{KeyState, Keymap, Keypad, KeypadError, KeypadEvent, KeypadResult, NO_KEY};
use crate::{GpioBias, GpioDirection, GpioDriver, GpioResult};

type Listener<'a> = Box<dyn FnMut(KeypadEvent) + 'a>;

/// The `MatrixKeypad` struct represents a GPIO-based matrix keypad of any size.
///
/// Columns are outputs, idle LOW, and are driven HIGH one at a time during a scan.
/// Rows are inputs and must be pulled down, either in hardware or with
/// [MatrixKeypad::with_row_bias].
///
/// [MatrixKeypad::poll] reduces the matrix to a single debounced "current key" and
/// dispatches press, hold and release events to the listener.
pub struct MatrixKeypad<'a> {
    gpio: &'a dyn GpioDriver,
    clock: &'a dyn Clock,
    matrix: Matrix,
    row_bias: Option<GpioBias>,
    debouncer: HoldDebouncer,
    listener: Option<Listener<'a>>,
}

impl Debug for MatrixKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MatrixKeypad({:?}, rows: {:?}, cols: {:?})",
            self.gpio, self.matrix.row_pins, self.matrix.col_pins,
        )
    }
}

impl<'a> MatrixKeypad<'a> {
    /// Creates a new `MatrixKeypad` and claims all of its pins.
    ///
    /// The keymap is indexed `[row][col]`, so it needs one row per row pin and one
    /// column per column pin. The pins are not configured until [MatrixKeypad::begin].
    ///
    /// # Errors
    /// - [KeypadError::PinCount] if the pin counts do not match the keymap.
    /// - `GpioError::AlreadyInUse` (wrapped) if a pin is listed twice or owned by someone else.
    pub fn new(
        gpio: &'a dyn GpioDriver,
        clock: &'a dyn Clock,
        keymap: Keymap,
        row_pins: &[usize],
        col_pins: &[usize],
    ) -> KeypadResult<Self> {
        if row_pins.len() != keymap.rows() {
            return Err(KeypadError::PinCount { what: "row", expected: keymap.rows(), actual: row_pins.len() });
        }
        if col_pins.len() != keymap.cols() {
            return Err(KeypadError::PinCount { what: "column", expected: keymap.cols(), actual: col_pins.len() });
        }

        let pins = || row_pins.iter().chain(col_pins);
        for (claimed, &pin) in pins().enumerate() {
            if let Err(err) = gpio.claim(pin) {
                for &pin in pins().take(claimed) {
                    gpio.release(pin);
                }
                return Err(err.into());
            }
        }

        Ok(MatrixKeypad {
            gpio,
            clock,
            matrix: Matrix {
                keymap,
                row_pins: row_pins.to_vec(),
                col_pins: col_pins.to_vec(),
                settle_time: Matrix::DEFAULT_SETTLE_TIME,
            },
            row_bias: None,
            debouncer: HoldDebouncer::new(),
            listener: None,
        })
    }

    pub fn with_debounce_time(mut self, debounce_time: Duration) -> Self {
        self.debouncer.debounce_time = debounce_time;
        self
    }

    pub fn with_hold_time(mut self, hold_time: Duration) -> Self {
        self.debouncer.hold_time = hold_time;
        self
    }

    /// Sets how long a column is driven before its rows are sampled.
    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.matrix.settle_time = settle_time;
        self
    }

    /// Makes [MatrixKeypad::begin] apply the bias to the row pins,
    /// if the driver supports it.
    pub fn with_row_bias(mut self, bias: GpioBias) -> Self {
        self.row_bias = Some(bias);
        self
    }

    pub fn keymap(&self) -> &Keymap {
        &self.matrix.keymap
    }

    /// Configures the pins: columns as outputs driven LOW, rows as inputs.
    ///
    /// Calling it again has no further effect.
    pub fn begin(&mut self) -> GpioResult<()> {
        for &pin in &self.matrix.col_pins {
            self.gpio.set_direction(pin, GpioDirection::Output)?;
            self.gpio.write(pin, false)?;
        }

        for &pin in &self.matrix.row_pins {
            self.gpio.set_direction(pin, GpioDirection::Input)?;
            if let Some(bias) = self.row_bias {
                if self.gpio.supports_bias() {
                    self.gpio.set_bias(pin, bias)?;
                } else {
                    debug!("{:?} does not support bias, relying on external resistors", self.gpio);
                }
            }
        }

        debug!("{:?} initialized.", self);
        Ok(())
    }

    /// Scans the matrix once, advances the debouncer and dispatches at most one event.
    ///
    /// Returns the currently accepted key, which may lag the raw scan while a change is
    /// being debounced.
    pub fn poll(&mut self) -> GpioResult<Option<u8>> {
        let scanned = self.matrix.scan_once(self.gpio, self.clock)?;
        let now = self.clock.now();

        if let Some(event) = self.debouncer.update(scanned, now) {
            trace!("Keypad event {:?} at {:?}", event, now);
            if let Some(listener) = self.listener.as_mut() {
                listener(event);
            }
        }

        Ok(self.debouncer.key())
    }

    /// Records every closed key into `buffer`, in sweep order, without debouncing.
    ///
    /// Returns the number of keys written, at most `buffer.len()`.
    pub fn scan_all(&self, buffer: &mut [u8]) -> GpioResult<usize> {
        self.matrix.scan_all(self.gpio, self.clock, buffer)
    }

    pub fn key_state(&self) -> KeyState {
        self.debouncer.state()
    }

    /// The key accepted by the last [MatrixKeypad::poll].
    pub fn key(&self) -> Option<u8> {
        self.debouncer.key()
    }

    /// Checks whether `key` is the accepted key. Held keys count as pressed.
    ///
    /// [NO_KEY] is "pressed" exactly when nothing is.
    pub fn is_pressed(&self, key: u8) -> bool {
        self.debouncer.key().unwrap_or(NO_KEY) == key
    }

    pub fn set_debounce_ms(&mut self, ms: u64) {
        self.debouncer.debounce_time = Duration::from_millis(ms);
    }

    pub fn set_hold_ms(&mut self, ms: u64) {
        self.debouncer.hold_time = Duration::from_millis(ms);
    }

    /// Installs the event listener, replacing the previous one.
    ///
    /// The listener runs synchronously inside [MatrixKeypad::poll].
    pub fn add_event_listener(&mut self, listener: impl FnMut(KeypadEvent) + 'a) {
        self.listener = Some(Box::new(listener));
    }

    pub fn remove_event_listener(&mut self) {
        self.listener = None;
    }
}

impl Keypad for MatrixKeypad<'_> {
    type Key = u8;

    fn read(&self) -> GpioResult<Vec<Self::Key>> {
        let mut pressed = vec![NO_KEY; self.matrix.row_pins.len() * self.matrix.col_pins.len()];
        let count = self.scan_all(&mut pressed)?;
        pressed.truncate(count);
        Ok(pressed)
    }
}

impl Drop for MatrixKeypad<'_> {
    fn drop(&mut self) {
        for &pin in self.matrix.row_pins.iter().chain(&self.matrix.col_pins) {
            self.gpio.release(pin);
        }
    }
}
