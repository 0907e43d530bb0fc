use std::ops::ControlFlow;
use std::time::Duration;
use crate::clock::Clock;
use crate::keypad::Keymap;
use crate::{GpioDriver, GpioResult};

/// Column sweep over a switch matrix.
///
/// Columns are driven HIGH one at a time and the rows are sampled while the column
/// is active. Every column is LOW again by the time a sweep returns, errors included.
#[derive(Debug)]
pub(crate) struct Matrix {
    pub keymap: Keymap,
    pub row_pins: Vec<usize>,
    pub col_pins: Vec<usize>,
    pub settle_time: Duration,
}

impl Matrix {
    pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_micros(10);

    /// Sweeps the matrix in column-major order, calling `visit` with the key of every
    /// closed intersection until it breaks.
    fn sweep(
        &self,
        gpio: &dyn GpioDriver,
        clock: &dyn Clock,
        mut visit: impl FnMut(u8) -> ControlFlow<()>,
    ) -> GpioResult<()> {
        for (col, &col_pin) in self.col_pins.iter().enumerate() {
            gpio.write(col_pin, true)?;
            clock.delay(self.settle_time);

            let sampled = self.sample_rows(gpio, col, &mut visit);
            gpio.write(col_pin, false)?;

            if sampled?.is_break() {
                break;
            }
        }
        Ok(())
    }

    fn sample_rows(
        &self,
        gpio: &dyn GpioDriver,
        col: usize,
        visit: &mut impl FnMut(u8) -> ControlFlow<()>,
    ) -> GpioResult<ControlFlow<()>> {
        for (row, &row_pin) in self.row_pins.iter().enumerate() {
            if !gpio.read(row_pin)? {
                continue;
            }
            if let Some(key) = self.keymap.get(row, col) {
                if visit(key).is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Returns the key of the first closed intersection, lowest column first,
    /// then lowest row.
    pub fn scan_once(&self, gpio: &dyn GpioDriver, clock: &dyn Clock) -> GpioResult<Option<u8>> {
        let mut found = None;
        self.sweep(gpio, clock, |key| {
            found = Some(key);
            ControlFlow::Break(())
        })?;
        Ok(found)
    }

    /// Records the keys of all closed intersections into `buffer`, in sweep order,
    /// until it is full. Returns the number of keys written.
    pub fn scan_all(&self, gpio: &dyn GpioDriver, clock: &dyn Clock, buffer: &mut [u8]) -> GpioResult<usize> {
        let mut count = 0;
        if buffer.is_empty() {
            return Ok(0);
        }
        self.sweep(gpio, clock, |key| {
            buffer[count] = key;
            count += 1;
            if count == buffer.len() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(count)
    }
}
