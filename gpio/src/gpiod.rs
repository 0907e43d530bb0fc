//! GpiodDriver implementation for managing GPIO pins using the gpiod library.
//!
//! Lines are requested from the kernel lazily, when a direction is first set,
//! and are requested again whenever the direction or bias changes.
use crate::{GpioBias, GpioDirection, GpioDriver, GpioError, GpioResult};
use bitvec::vec::BitVec;
use log::{trace, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;

enum GpiodLine {
    Input(gpiod::Lines<gpiod::Input>),
    Output(gpiod::Lines<gpiod::Output>),
}

impl GpiodLine {
    fn direction(&self) -> GpioDirection {
        match self {
            GpiodLine::Input(_) => GpioDirection::Input,
            GpiodLine::Output(_) => GpioDirection::Output,
        }
    }
}

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO pins.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
    lines: RefCell<HashMap<usize, GpiodLine>>,
    biases: RefCell<HashMap<usize, GpioBias>>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        let bits = BitVec::repeat(false, n);
        Self {
            chip,
            used_pins: bits,
            lines: RefCell::new(HashMap::new()),
            biases: RefCell::new(HashMap::new()),
        }
    }

    /// Opens the GPIO chip at the given path (e.g. `/dev/gpiochip0`).
    pub fn open(path: &str) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path)?))
    }

    fn bias(&self, pin: usize) -> GpioBias {
        self.biases.borrow().get(&pin).copied().unwrap_or_default()
    }

    fn request_line(&self, pin: usize, direction: GpioDirection, bias: GpioBias) -> GpioResult<GpiodLine> {
        let bias: gpiod::Bias = bias.into();
        let line = match direction {
            GpioDirection::Input => GpiodLine::Input(self.chip.request_lines(
                gpiod::Options::input([pin as u32])
                    .consumer(env!("CARGO_PKG_NAME"))
                    .bias(bias),
            )?),
            GpioDirection::Output => GpiodLine::Output(self.chip.request_lines(
                gpiod::Options::output([pin as u32])
                    .consumer(env!("CARGO_PKG_NAME"))
                    .bias(bias),
            )?),
        };
        trace!("Requested line {} as {:?}", pin, direction);
        Ok(line)
    }

    /// Requests `pin` with a new direction and bias, keeping the old line if that fails.
    fn configure(&self, pin: usize, direction: GpioDirection, bias: GpioBias) -> GpioResult<()> {
        let old_bias = self.bias(pin);
        let mut lines = self.lines.borrow_mut();
        let old = lines.get(&pin).map(|line| (line.direction(), old_bias));

        reconfigure(&mut lines, pin, old, (direction, bias), |(direction, bias)| {
            self.request_line(pin, direction, bias)
        })?;
        self.biases.borrow_mut().insert(pin, bias);
        Ok(())
    }
}

/// Replaces the line held for `pin` with one requested with `new`.
///
/// The old line is dropped first, since the kernel hands out each line only once. If the new
/// request fails the line is requested again with `old` and the original error is returned.
fn reconfigure<C: Copy + Debug, L>(
    lines: &mut HashMap<usize, L>,
    pin: usize,
    old: Option<C>,
    new: C,
    mut request: impl FnMut(C) -> GpioResult<L>,
) -> GpioResult<()> {
    lines.remove(&pin);

    let err = match request(new) {
        Ok(line) => {
            lines.insert(pin, line);
            return Ok(());
        }
        Err(err) => err,
    };

    if let Some(old) = old {
        match request(old) {
            Ok(line) => {
                lines.insert(pin, line);
            }
            Err(restore_err) => warn!("Line {} lost, could not restore {:?}: {}", pin, old, restore_err),
        }
    }
    Err(err)
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn claim(&self, pin: usize) -> GpioResult<()> {
        if pin >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[pin] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(pin, true);
        Ok(())
    }

    fn release(&self, pin: usize) {
        if pin >= self.used_pins.len() {
            return;
        }
        self.lines.borrow_mut().remove(&pin);
        self.biases.borrow_mut().remove(&pin);
        self.used_pins.set_aliased(pin, false);
    }

    fn set_direction(&self, pin: usize, direction: GpioDirection) -> GpioResult<()> {
        if pin >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        let current = self.lines.borrow().get(&pin).map(GpiodLine::direction);
        if current == Some(direction) {
            return Ok(());
        }
        self.configure(pin, direction, self.bias(pin))
    }

    fn write(&self, pin: usize, value: bool) -> GpioResult<()> {
        match self.lines.borrow().get(&pin) {
            Some(GpiodLine::Output(line)) => {
                line.set_values([value])?;
                Ok(())
            }
            _ => Err(GpioError::InvalidArgument),
        }
    }

    fn read(&self, pin: usize) -> GpioResult<bool> {
        match self.lines.borrow().get(&pin) {
            Some(GpiodLine::Input(line)) => {
                let values = line.get_values([false])?;
                Ok(values[0])
            }
            _ => Err(GpioError::InvalidArgument),
        }
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn set_bias(&self, pin: usize, bias: GpioBias) -> GpioResult<()> {
        if pin >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        let current = self.lines.borrow().get(&pin).map(GpiodLine::direction);
        match current {
            Some(direction) => self.configure(pin, direction, bias),
            None => {
                self.biases.borrow_mut().insert(pin, bias);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Config = (GpioDirection, GpioBias);

    const INPUT: Config = (GpioDirection::Input, GpioBias::None);
    const PULLED_DOWN: Config = (GpioDirection::Input, GpioBias::PullDown);

    #[test]
    fn successful_request_replaces_the_line() {
        let mut lines = HashMap::from([(4, INPUT)]);
        let result = reconfigure(&mut lines, 4, Some(INPUT), PULLED_DOWN, Ok);
        assert_eq!(result, Ok(()));
        assert_eq!(lines.get(&4), Some(&PULLED_DOWN));
    }

    #[test]
    fn failed_request_restores_the_old_line() {
        let mut lines = HashMap::from([(4, INPUT)]);
        let mut requested = Vec::new();
        let result = reconfigure(&mut lines, 4, Some(INPUT), PULLED_DOWN, |config| {
            requested.push(config);
            if config.1 == GpioBias::PullDown {
                Err(GpioError::Io(std::io::ErrorKind::InvalidInput))
            } else {
                Ok(config)
            }
        });

        assert_eq!(result, Err(GpioError::Io(std::io::ErrorKind::InvalidInput)));
        assert_eq!(requested, [PULLED_DOWN, INPUT]);
        assert_eq!(lines.get(&4), Some(&INPUT));
    }

    #[test]
    fn failed_first_request_leaves_no_line() {
        let mut lines: HashMap<usize, Config> = HashMap::new();
        let result = reconfigure(&mut lines, 4, None, INPUT, |_| Err(GpioError::AlreadyInUse));
        assert_eq!(result, Err(GpioError::AlreadyInUse));
        assert!(lines.is_empty());
    }

    #[test]
    fn failed_restore_reports_the_original_error() {
        let mut lines = HashMap::from([(4, INPUT)]);
        let result = reconfigure(&mut lines, 4, Some(INPUT), PULLED_DOWN, |config| {
            Err::<Config, _>(if config == PULLED_DOWN { GpioError::NotSupported } else { GpioError::AlreadyInUse })
        });
        assert_eq!(result, Err(GpioError::NotSupported));
        assert!(lines.is_empty());
    }
}
