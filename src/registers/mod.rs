// Licensed under the Apache-2.0 license

//! Register access for the STM32F407 peripherals used by this crate.
//!
//! Layouts, field positions and base addresses come from the `stm32f4` PAC.
//! Drivers do not name PAC registers themselves: each peripheral has a small
//! trait ([`I2cRegisters`](i2c::I2cRegisters), [`SpiRegisters`](spi::SpiRegisters),
//! ...) whose operations match what the driver does to the hardware, and the
//! PAC register block implements it with the generated `read`/`modify`/`write`
//! field accessors. Host tests implement the same traits with simulated
//! peripherals.
//!
//! Sibling instances (I2C2, SPI3, UART4, GPIOx, ...) are driven through the
//! first instance's register block type, as the reference manual defines
//! them identically.

use stm32f4 as pac;
pub use stm32f4::stm32f407 as device;

pub mod gpio;
pub mod i2c;
pub mod nvic;
pub mod rcc;
pub mod spi;
pub mod usart;

/// Replaces the `width`-bit field at `shift` with `value`.
///
/// Used for per-pin and per-line fields whose index is only known at run
/// time, where the PAC offers one accessor per index.
#[must_use]
pub const fn with_field(reg: u32, shift: u32, width: u32, value: u32) -> u32 {
    let mask = ((1u32 << width) - 1) << shift;
    (reg & !mask) | ((value << shift) & mask)
}

/// Per-index access to PAC registers made of repeated one-bit or multi-bit
/// slots (clock gates, EXTI lines, GPIO pins).
pub(crate) trait FlagsRegister {
    fn flags(&self) -> u32;

    /// Sets the bits in `mask`, preserving the others.
    fn set_flags(&self, mask: u32);

    /// Clears the bits in `mask`, preserving the others.
    fn clear_flags(&self, mask: u32);

    /// Rewrites one `width`-bit slot, preserving the others.
    fn replace_field(&self, shift: u32, width: u32, value: u32);
}

impl<S> FlagsRegister for pac::Reg<S>
where
    S: pac::RegisterSpec<Ux = u32> + pac::Readable + pac::Writable,
{
    fn flags(&self) -> u32 {
        self.read().bits()
    }

    fn set_flags(&self, mask: u32) {
        // SAFETY: only used on enable, reset, mask and configuration
        // registers where every bit pattern is valid.
        self.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
    }

    fn clear_flags(&self, mask: u32) {
        // SAFETY: see `set_flags`.
        self.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
    }

    fn replace_field(&self, shift: u32, width: u32, value: u32) {
        // SAFETY: see `set_flags`.
        self.modify(|r, w| unsafe { w.bits(with_field(r.bits(), shift, width, value)) });
    }
}
