pub mod gpiod;
pub mod debounce;
pub mod raw;
pub mod clock;
pub mod keypad;
#[cfg(test)]
mod mock;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Specifies whether a GPIO pin is read from or driven.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GpioDirection {
    Input,
    Output,
}

/// Specifies the bias of the GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors.
/// These should work in both input and output modes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// A GPIO controller addressed by pin (line) number.
///
/// Levels are plain booleans: `true` is HIGH, `false` is LOW.
pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Marks the pin as exclusively owned by the caller.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the pin does not exist.
    /// - `GpioError::AlreadyInUse` if the pin has already been claimed.
    fn claim(&self, pin: usize) -> GpioResult<()>;
    /// Gives a previously claimed pin back to the driver.
    fn release(&self, pin: usize);

    /// Sets the pin function to input or output.
    fn set_direction(&self, pin: usize, direction: GpioDirection) -> GpioResult<()>;
    /// Drives an output pin HIGH (`true`) or LOW (`false`).
    fn write(&self, pin: usize, value: bool) -> GpioResult<()>;
    /// Reads the level of an input pin.
    fn read(&self, pin: usize) -> GpioResult<bool>;

    /// Gets whether the driver supports bias (pull-up/pull-down resistors).
    fn supports_bias(&self) -> bool {
        false
    }
    /// Sets the bias of the pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the driver does not support bias.
    fn set_bias(&self, _pin: usize, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}
