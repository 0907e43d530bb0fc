//! In-memory GPIO and clock used by the unit tests.

use crate::clock::Clock;
use crate::{GpioBias, GpioDirection, GpioDriver, GpioError, GpioResult};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Default)]
pub struct MockPin {
    pub direction: Option<GpioDirection>,
    pub level: bool,
    pub bias: GpioBias,
    pub claimed: bool,
}

/// Simulates a switch matrix wired to a bank of GPIO pins.
///
/// An input pin reads HIGH iff a closed switch connects it to an output pin
/// that is currently driven HIGH.
#[derive(Debug)]
pub struct MockGpio {
    pins: RefCell<Vec<MockPin>>,
    switches: RefCell<HashSet<(usize, usize)>>,
    writes: RefCell<Vec<(usize, bool)>>,
    failing_read: Cell<Option<usize>>,
    bias: bool,
}

impl MockGpio {
    pub fn new(count: usize) -> Self {
        Self {
            pins: RefCell::new(vec![MockPin::default(); count]),
            switches: RefCell::new(HashSet::new()),
            writes: RefCell::new(Vec::new()),
            failing_read: Cell::new(None),
            bias: false,
        }
    }

    pub fn with_bias_support(mut self) -> Self {
        self.bias = true;
        self
    }

    pub fn pin(&self, pin: usize) -> MockPin {
        self.pins.borrow()[pin]
    }

    /// Closes the switch between the `row` input pin and the `col` output pin.
    pub fn press(&self, row: usize, col: usize) {
        self.switches.borrow_mut().insert((row, col));
    }

    pub fn lift(&self, row: usize, col: usize) {
        self.switches.borrow_mut().remove(&(row, col));
    }

    pub fn release_all(&self) {
        self.switches.borrow_mut().clear();
    }

    pub fn writes(&self) -> Vec<(usize, bool)> {
        self.writes.borrow().clone()
    }

    pub fn fail_reads_of(&self, pin: Option<usize>) {
        self.failing_read.set(pin);
    }
}

impl GpioDriver for MockGpio {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.pins.borrow().len())
    }

    fn claim(&self, pin: usize) -> GpioResult<()> {
        let mut pins = self.pins.borrow_mut();
        let pin = pins.get_mut(pin).ok_or(GpioError::InvalidArgument)?;
        if pin.claimed {
            return Err(GpioError::AlreadyInUse);
        }
        pin.claimed = true;
        Ok(())
    }

    fn release(&self, pin: usize) {
        if let Some(pin) = self.pins.borrow_mut().get_mut(pin) {
            *pin = MockPin::default();
        }
    }

    fn set_direction(&self, pin: usize, direction: GpioDirection) -> GpioResult<()> {
        let mut pins = self.pins.borrow_mut();
        let pin = pins.get_mut(pin).ok_or(GpioError::InvalidArgument)?;
        pin.direction = Some(direction);
        Ok(())
    }

    fn write(&self, pin: usize, value: bool) -> GpioResult<()> {
        let mut pins = self.pins.borrow_mut();
        let state = pins.get_mut(pin).ok_or(GpioError::InvalidArgument)?;
        if state.direction != Some(GpioDirection::Output) {
            return Err(GpioError::InvalidArgument);
        }
        state.level = value;
        self.writes.borrow_mut().push((pin, value));
        Ok(())
    }

    fn read(&self, pin: usize) -> GpioResult<bool> {
        if self.failing_read.get() == Some(pin) {
            return Err(GpioError::Io(std::io::ErrorKind::Other));
        }

        let pins = self.pins.borrow();
        let state = pins.get(pin).ok_or(GpioError::InvalidArgument)?;
        if state.direction != Some(GpioDirection::Input) {
            return Err(GpioError::InvalidArgument);
        }

        let high = self.switches.borrow().iter().any(|&(row, col)| {
            row == pin
                && pins.get(col).is_some_and(|col| {
                    col.direction == Some(GpioDirection::Output) && col.level
                })
        });
        Ok(high)
    }

    fn supports_bias(&self) -> bool {
        self.bias
    }

    fn set_bias(&self, pin: usize, bias: GpioBias) -> GpioResult<()> {
        if !self.bias {
            return Err(GpioError::NotSupported);
        }
        let mut pins = self.pins.borrow_mut();
        let pin = pins.get_mut(pin).ok_or(GpioError::InvalidArgument)?;
        pin.bias = bias;
        Ok(())
    }
}

/// A clock that only moves when told to. Delays are recorded, not waited.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    delayed: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ms(&self, ms: u64) {
        self.now.set(Duration::from_millis(ms));
    }

    pub fn delayed(&self) -> Duration {
        self.delayed.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn delay(&self, duration: Duration) {
        self.delayed.set(self.delayed.get() + duration);
    }
}
