use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;
use std::str::FromStr;
use dotenv::var;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use keymatrix_gpio::keypad::{Keymap, KeymapError};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("unknown GPIO backend {0:?}, expected gpiomem, mem or gpiod")]
    UnknownBackend(String),
    #[error("invalid pin number {0:?}")]
    InvalidPin(String),
    #[error("no pins given")]
    NoPins,
}

/// Which GPIO driver to drive the keypad with.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Backend {
    /// Register access through `/dev/gpiomem`.
    #[default]
    GpioMem,
    /// Register access through `/dev/mem`.
    Mem,
    /// The GPIO character device.
    Gpiod,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "gpiomem" => Ok(Backend::GpioMem),
            "mem" => Ok(Backend::Mem),
            "gpiod" => Ok(Backend::Gpiod),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Parses a pin list like `"5, 6, 13 19"`.
pub fn parse_pin_list(pin_str: &str) -> Result<Vec<usize>, ConfigError> {
    let pins = pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| ConfigError::InvalidPin(s.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    if pins.is_empty() {
        return Err(ConfigError::NoPins);
    }
    Ok(pins)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// One string per keypad row.
    pub keymap: Vec<String>,
    pub debounce_ms: u64,
    pub hold_ms: u64,
    pub poll_interval_ms: u64,
    /// Enables the internal pull-downs on the row pins.
    pub row_pull_down: bool,
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("keymatrix.json"));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = var("CONFIG_FILE").unwrap_or_else(|_| "keymatrix.json".to_string());
        let config_path = Path::new(&config_str);
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn keymap(&self) -> Result<Keymap, KeymapError> {
        Keymap::from_strs(&self.keymap)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            keymap: ["123A", "456B", "789C", "*0#D"].map(String::from).to_vec(),
            debounce_ms: 50,
            hold_ms: 1000,
            poll_interval_ms: 5,
            row_pull_down: true,
        }
    }
}
