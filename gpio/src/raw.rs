//! GPIO driver poking the BCM283x/BCM2711 GPIO registers directly through a memory mapping.
//!
//! The register layout is shared by the whole family except for the pull resistors: BCM2711 has
//! a plain read-modify-write register per 16 pins, while BCM283x needs the clocked GPPUD sequence.

use crate::clock::busy_wait;
use crate::{GpioBias, GpioDirection, GpioDriver, GpioError, GpioResult};
use bitvec::vec::BitVec;
use log::debug;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;
use std::time::Duration;

/// The Broadcom SoC whose GPIO block is being driven.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Soc {
    /// Pi 1, Zero.
    Bcm2835,
    /// Pi 2.
    Bcm2836,
    /// Pi 3, Zero 2.
    Bcm2837,
    /// Pi 4, Pi 400, CM4.
    Bcm2711,
}

impl Soc {
    const DEVICE_TREE_COMPATIBLE: &'static str = "/proc/device-tree/compatible";

    /// Reads the SoC from the device tree of the running system.
    pub fn detect() -> GpioResult<Self> {
        let compatible = std::fs::read(Self::DEVICE_TREE_COMPATIBLE)?;
        Self::from_compatible(&compatible)
    }

    /// Picks the SoC out of a NUL-separated device tree `compatible` list.
    pub fn from_compatible(compatible: &[u8]) -> GpioResult<Self> {
        compatible
            .split(|&b| b == 0)
            .find_map(|entry| match entry {
                b"brcm,bcm2835" => Some(Soc::Bcm2835),
                b"brcm,bcm2836" | b"brcm,bcm2709" => Some(Soc::Bcm2836),
                b"brcm,bcm2837" | b"brcm,bcm2710" => Some(Soc::Bcm2837),
                b"brcm,bcm2711" => Some(Soc::Bcm2711),
                _ => None,
            })
            .ok_or_else(|| {
                let names = compatible
                    .split(|&b| b == 0)
                    .filter(|entry| !entry.is_empty())
                    .map(String::from_utf8_lossy)
                    .collect::<Vec<_>>()
                    .join(", ");
                GpioError::Other(format!("no supported Broadcom GPIO block in [{}]", names))
            })
    }

    /// Physical address of the GPIO block, as mapped through `/dev/mem`.
    pub fn gpio_base(self) -> u32 {
        match self {
            Soc::Bcm2835 => 0x20200000,
            Soc::Bcm2836 | Soc::Bcm2837 => 0x3F200000,
            Soc::Bcm2711 => 0xFE200000,
        }
    }

    /// Encoding of `bias` in this SoC's pull control field.
    ///
    /// The two families disagree on which value means pull-up.
    pub fn pull_bits(self, bias: GpioBias) -> u32 {
        match (self, bias) {
            (_, GpioBias::None) => 0b00,
            (Soc::Bcm2711, GpioBias::PullUp) => 0b01,
            (Soc::Bcm2711, GpioBias::PullDown) => 0b10,
            (_, GpioBias::PullDown) => 0b01,
            (_, GpioBias::PullUp) => 0b10,
        }
    }
}

pub struct RawGpioDriver {
    mmap: MmapRaw,
    soc: Soc,
    used_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    // 0x7e200000 on the bus, see Soc::gpio_base for the ARM side

    const PIN_COUNT: usize = 58;

    const FUNCTION_INPUT: u8 = 0b000;
    const FUNCTION_OUTPUT: u8 = 0b001;

    const GPPUD: usize = 0x94 / 4;
    const GPPUDCLK0: usize = 0x98 / 4;
    const GPIO_PUP_PDN_CNTRL_REG0: usize = 0xE4 / 4;

    /// Setup and hold time of the GPPUD sequence, comfortably above 150 core clock cycles.
    const PULL_SETUP_TIME: Duration = Duration::from_micros(1);

    fn create(path: &str, offset: u64, soc: Soc) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
                .offset(offset)
                .len(4096)
                .map_raw(&file)?;

        debug!("Mapped {} for {:?} at offset {:#x}", path, soc, offset);
        Ok(Self::from_mapping(mmap, soc))
    }

    fn from_mapping(mmap: MmapRaw, soc: Soc) -> Self {
        RawGpioDriver {
            mmap,
            soc,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        }
    }

    /// Maps the GPIO block through `/dev/gpiomem`, which exposes only the GPIO registers.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::new_gpiomem_for(Soc::detect()?)
    }

    pub fn new_gpiomem_for(soc: Soc) -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0, soc)
    }

    /// Maps the GPIO block through `/dev/mem`. Requires root.
    pub fn new_mem() -> GpioResult<Self> {
        Self::new_mem_for(Soc::detect()?)
    }

    pub fn new_mem_for(soc: Soc) -> GpioResult<Self> {
        Self::create("/dev/mem", soc.gpio_base() as u64, soc)
    }

    pub fn soc(&self) -> Soc {
        self.soc
    }

    fn check_pin(pin_index: usize) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }

    fn register(&self, word: usize) -> *mut u32 {
        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // Every register offset used here lies within the 4 KiB mapping.
        unsafe { mmap.add(word) }
    }

    pub fn raw_set_pin_function(&self, pin_index: usize, function: u8) -> GpioResult<()> {
        if function > 0b111 {
            return Err(GpioError::InvalidArgument);
        }
        Self::check_pin(pin_index)?;

        // GPFSELn register
        let register_ptr = self.register(pin_index / 10);
        let shift = (pin_index % 10) * 3;

        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift);
        register_value |= (function as u32) << shift;
        unsafe { register_ptr.write_volatile(register_value) };

        Ok(())
    }

    pub(crate) fn raw_set_pin_output(&self, pin_index: usize, high: bool) -> GpioResult<()> {
        Self::check_pin(pin_index)?;

        // GPSETn/GPCLRn register
        let register_ptr = self.register(if high { 0x1c / 4 } else { 0x28 / 4 } + pin_index / 32);
        let shift = pin_index % 32;

        unsafe { register_ptr.write_volatile(1 << shift) };

        Ok(())
    }

    pub(crate) fn raw_get_pin_level(&self, pin_index: usize) -> GpioResult<bool> {
        Self::check_pin(pin_index)?;

        // GPLEVn register
        let register_ptr = self.register((0x34 / 4) + pin_index / 32) as *const u32;
        let shift = pin_index % 32;

        let register_value = unsafe { register_ptr.read_volatile() };
        Ok((register_value >> shift) & 1 != 0)
    }

    pub(crate) fn raw_set_bias(&self, pin_index: usize, bias: GpioBias) -> GpioResult<()> {
        Self::check_pin(pin_index)?;

        let bias_value = self.soc.pull_bits(bias);

        match self.soc {
            Soc::Bcm2711 => {
                // GPIO_PUP_PDN_CNTRL_REGn register (yes that is a long name)
                let register_ptr = self.register(Self::GPIO_PUP_PDN_CNTRL_REG0 + pin_index / 16);
                let shift = (pin_index % 16) * 2;
                let mut register_value = unsafe { register_ptr.read_volatile() };
                register_value &= !(0b11 << shift);
                register_value |= bias_value << shift;

                unsafe { register_ptr.write_volatile(register_value) };
            }
            Soc::Bcm2835 | Soc::Bcm2836 | Soc::Bcm2837 => {
                // GPPUD holds the control value, GPPUDCLKn latches it into the selected pins
                let control_ptr = self.register(Self::GPPUD);
                let clock_ptr = self.register(Self::GPPUDCLK0 + pin_index / 32);

                unsafe { control_ptr.write_volatile(bias_value) };
                busy_wait(Self::PULL_SETUP_TIME);
                unsafe { clock_ptr.write_volatile(1 << (pin_index % 32)) };
                busy_wait(Self::PULL_SETUP_TIME);
                unsafe {
                    control_ptr.write_volatile(0);
                    clock_ptr.write_volatile(0);
                }
            }
        }

        Ok(())
    }

    pub(crate) fn raw_reset(&self, pin_index: usize) -> GpioResult<()> {
        self.raw_set_pin_function(pin_index, Self::FUNCTION_INPUT)?;
        self.raw_set_bias(pin_index, GpioBias::None)?;
        self.raw_set_pin_output(pin_index, false)?;
        Ok(())
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?}, {:?})", self.soc, self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn claim(&self, pin: usize) -> GpioResult<()> {
        Self::check_pin(pin)?;

        if self.used_pins[pin] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(pin, true);
        self.raw_reset(pin)
    }

    fn release(&self, pin: usize) {
        if pin >= Self::PIN_COUNT {
            return;
        }
        _ = self.raw_set_pin_function(pin, Self::FUNCTION_INPUT);
        self.used_pins.set_aliased(pin, false);
    }

    fn set_direction(&self, pin: usize, direction: GpioDirection) -> GpioResult<()> {
        let function = match direction {
            GpioDirection::Input => Self::FUNCTION_INPUT,
            GpioDirection::Output => Self::FUNCTION_OUTPUT,
        };
        self.raw_set_pin_function(pin, function)
    }

    fn write(&self, pin: usize, value: bool) -> GpioResult<()> {
        self.raw_set_pin_output(pin, value)
    }

    fn read(&self, pin: usize) -> GpioResult<bool> {
        self.raw_get_pin_level(pin)
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn set_bias(&self, pin: usize, bias: GpioBias) -> GpioResult<()> {
        self.raw_set_bias(pin, bias)
    }
}
