mod app;
mod config;

use std::cell::RefCell;
use std::env::var;
use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use log::{debug, info};
use sysinfo::System;
use keymatrix_gpio::clock::MonotonicClock;
use keymatrix_gpio::gpiod::GpiodDriver;
use keymatrix_gpio::keypad::MatrixKeypad;
use keymatrix_gpio::raw::RawGpioDriver;
use keymatrix_gpio::{GpioBias, GpioDriver};
use crate::app::App;
use crate::config::{parse_pin_list, Backend, Config};

fn open_gpio(backend: Backend) -> eyre::Result<Box<dyn GpioDriver>> {
    Ok(match backend {
        Backend::GpioMem => Box::new(RawGpioDriver::new_gpiomem()?),
        Backend::Mem => Box::new(RawGpioDriver::new_mem()?),
        Backend::Gpiod => {
            let chip = var("KEYMATRIX_GPIOCHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
            Box::new(GpiodDriver::open(&chip)?)
        }
    })
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!("keymatrix starting...");
    info!(
        "Host {} running {}, architecture {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );

    // Get pin numbers from env
    let row_pins = parse_pin_list(&var("KEYMATRIX_PINS_ROWS")?)?;
    let col_pins = parse_pin_list(&var("KEYMATRIX_PINS_COLS")?)?;
    let backend: Backend = var("KEYMATRIX_BACKEND").unwrap_or_default().parse()?;

    info!("Keypad @ Rows: {:?}, Cols: {:?}, backend: {:?}", row_pins, col_pins, backend);

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    debug!("Initializing GPIO driver...");
    let gpio = open_gpio(backend)?;
    debug!("{:?} initialized.", gpio);

    let clock = MonotonicClock::new();
    let app = RefCell::new(App::new());

    debug!("Initializing keypad driver...");
    let mut keypad = MatrixKeypad::new(&*gpio, &clock, config.keymap()?, &row_pins, &col_pins)?
        .with_debounce_time(Duration::from_millis(config.debounce_ms))
        .with_hold_time(Duration::from_millis(config.hold_ms));
    if config.row_pull_down {
        keypad = keypad.with_row_bias(GpioBias::PullDown);
    }
    keypad.begin()?;
    keypad.add_event_listener(|event| app.borrow_mut().handle(event));

    info!("Starting main loop...");

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    loop {
        keypad.poll()?;
        thread::sleep(poll_interval);
    }
}
