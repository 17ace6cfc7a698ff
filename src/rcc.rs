// Licensed under the Apache-2.0 license

//! Reset and clock control.
//!
//! Two jobs: gating peripheral bus clocks (a peripheral's registers are not
//! accessible until its clock is enabled), and deriving the bus frequencies
//! that the I2C and USART timing calculations depend on.

use crate::registers::rcc::RccRegisters;
use fugit::HertzU32;

/// Internal RC oscillator.
pub const HSI_FREQUENCY: HertzU32 = HertzU32::from_raw(16_000_000);
/// External crystal fitted on the STM32F4-Discovery board.
pub const HSE_FREQUENCY: HertzU32 = HertzU32::from_raw(8_000_000);

const AHB_PRESCALERS: [u32; 8] = [2, 4, 8, 16, 64, 128, 256, 512];
const APB_PRESCALERS: [u32; 4] = [2, 4, 8, 16];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// PLLCFGR holds a divider of zero.
    InvalidPllConfig,
    /// SWS reports a clock source this part does not have.
    InvalidClockSource,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bus {
    Ahb1,
    Apb1,
    Apb2,
}

/// Peripherals whose bus clock this crate gates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClockGate {
    GpioA,
    GpioB,
    GpioC,
    GpioD,
    GpioE,
    GpioF,
    GpioG,
    GpioH,
    GpioI,
    I2c1,
    I2c2,
    I2c3,
    Spi1,
    Spi2,
    Spi3,
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
    Syscfg,
}

impl ClockGate {
    /// Bus and enable/reset bit position.
    #[must_use]
    pub const fn location(self) -> (Bus, u32) {
        match self {
            Self::GpioA => (Bus::Ahb1, 0),
            Self::GpioB => (Bus::Ahb1, 1),
            Self::GpioC => (Bus::Ahb1, 2),
            Self::GpioD => (Bus::Ahb1, 3),
            Self::GpioE => (Bus::Ahb1, 4),
            Self::GpioF => (Bus::Ahb1, 5),
            Self::GpioG => (Bus::Ahb1, 6),
            Self::GpioH => (Bus::Ahb1, 7),
            Self::GpioI => (Bus::Ahb1, 8),
            Self::Spi2 => (Bus::Apb1, 14),
            Self::Spi3 => (Bus::Apb1, 15),
            Self::Usart2 => (Bus::Apb1, 17),
            Self::Usart3 => (Bus::Apb1, 18),
            Self::Uart4 => (Bus::Apb1, 19),
            Self::Uart5 => (Bus::Apb1, 20),
            Self::I2c1 => (Bus::Apb1, 21),
            Self::I2c2 => (Bus::Apb1, 22),
            Self::I2c3 => (Bus::Apb1, 23),
            Self::Usart1 => (Bus::Apb2, 4),
            Self::Usart6 => (Bus::Apb2, 5),
            Self::Spi1 => (Bus::Apb2, 12),
            Self::Syscfg => (Bus::Apb2, 14),
        }
    }
}

/// Derived clock domains.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BusClock {
    Sysclk,
    Hclk,
    Pclk1,
    Pclk2,
}

/// System-level clock and reset operations needed by driver setup code.
pub trait ClockControl {
    type Error: core::fmt::Debug;

    /// # Errors
    ///
    /// Implementation specific; the register implementation never fails.
    fn enable(&mut self, gate: ClockGate) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Implementation specific; the register implementation never fails.
    fn disable(&mut self, gate: ClockGate) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Implementation specific; the register implementation never fails.
    fn reset_assert(&mut self, gate: ClockGate) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Implementation specific; the register implementation never fails.
    fn reset_deassert(&mut self, gate: ClockGate) -> Result<(), Self::Error>;

    /// Puts the peripheral through a full reset, returning every register
    /// to its reset value.
    ///
    /// # Errors
    ///
    /// Propagates errors from `reset_assert` and `reset_deassert`.
    fn reset_pulse(&mut self, gate: ClockGate) -> Result<(), Self::Error> {
        self.reset_assert(gate)?;
        self.reset_deassert(gate)
    }

    /// # Errors
    ///
    /// Returns an error if the clock tree registers hold an invalid setup.
    fn get_frequency(&self, clock: BusClock) -> Result<HertzU32, Self::Error>;
}

/// The RCC register block.
pub struct Rcc<R: RccRegisters> {
    regs: R,
}

impl<R: RccRegisters> Rcc<R> {
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn enable_clock(&self, gate: ClockGate) {
        let (bus, bit) = gate.location();
        self.regs.set_clock_enabled(bus, bit, true);
    }

    pub fn disable_clock(&self, gate: ClockGate) {
        let (bus, bit) = gate.location();
        self.regs.set_clock_enabled(bus, bit, false);
    }

    pub fn is_enabled(&self, gate: ClockGate) -> bool {
        let (bus, bit) = gate.location();
        self.regs.is_clock_enabled(bus, bit)
    }

    /// Sets then clears the peripheral's reset bit.
    pub fn reset_peripheral(&self, gate: ClockGate) {
        let (bus, bit) = gate.location();
        self.regs.set_reset(bus, bit, true);
        self.regs.set_reset(bus, bit, false);
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidClockSource`] if SWS reads as the reserved value,
    /// or a PLL error when the PLL is the system clock.
    pub fn sysclk(&self) -> Result<HertzU32, Error> {
        match self.regs.clock_select().sws {
            0 => Ok(HSI_FREQUENCY),
            1 => Ok(HSE_FREQUENCY),
            2 => self.pll_output(),
            _ => Err(Error::InvalidClockSource),
        }
    }

    /// Main PLL output: `(source / PLLM) * PLLN / PLLP`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPllConfig`] if PLLM is zero.
    pub fn pll_output(&self) -> Result<HertzU32, Error> {
        let pll = self.regs.pll_settings();
        let source = if pll.source_hse {
            HSE_FREQUENCY
        } else {
            HSI_FREQUENCY
        };
        if pll.pllm == 0 {
            return Err(Error::InvalidPllConfig);
        }
        let p = (u64::from(pll.pllp) + 1) * 2;
        let vco = u64::from(source.raw()) * u64::from(pll.plln) / u64::from(pll.pllm);
        let out = u32::try_from(vco / p).map_err(|_| Error::InvalidPllConfig)?;
        Ok(HertzU32::from_raw(out))
    }

    /// AHB clock.
    ///
    /// # Errors
    ///
    /// See [`Rcc::sysclk`].
    pub fn hclk(&self) -> Result<HertzU32, Error> {
        let hpre = self.regs.clock_select().hpre;
        Ok(self.sysclk()? / ahb_divider(hpre))
    }

    /// APB1 clock, the I2C kernel clock.
    ///
    /// # Errors
    ///
    /// See [`Rcc::sysclk`].
    pub fn pclk1(&self) -> Result<HertzU32, Error> {
        let ppre1 = self.regs.clock_select().ppre1;
        Ok(self.hclk()? / apb_divider(ppre1))
    }

    /// APB2 clock, used by USART1 and USART6.
    ///
    /// # Errors
    ///
    /// See [`Rcc::sysclk`].
    pub fn pclk2(&self) -> Result<HertzU32, Error> {
        let ppre2 = self.regs.clock_select().ppre2;
        Ok(self.hclk()? / apb_divider(ppre2))
    }
}

/// HPRE values below 8 mean "not divided".
fn ahb_divider(hpre: u8) -> u32 {
    if hpre < 8 {
        return 1;
    }
    AHB_PRESCALERS
        .get(usize::from(hpre - 8))
        .copied()
        .unwrap_or(1)
}

/// PPREx values below 4 mean "not divided".
fn apb_divider(ppre: u8) -> u32 {
    if ppre < 4 {
        return 1;
    }
    APB_PRESCALERS
        .get(usize::from(ppre - 4))
        .copied()
        .unwrap_or(1)
}

impl<R: RccRegisters> ClockControl for Rcc<R> {
    type Error = Error;

    fn enable(&mut self, gate: ClockGate) -> Result<(), Error> {
        self.enable_clock(gate);
        Ok(())
    }

    fn disable(&mut self, gate: ClockGate) -> Result<(), Error> {
        self.disable_clock(gate);
        Ok(())
    }

    fn reset_assert(&mut self, gate: ClockGate) -> Result<(), Error> {
        let (bus, bit) = gate.location();
        self.regs.set_reset(bus, bit, true);
        Ok(())
    }

    fn reset_deassert(&mut self, gate: ClockGate) -> Result<(), Error> {
        let (bus, bit) = gate.location();
        self.regs.set_reset(bus, bit, false);
        Ok(())
    }

    fn get_frequency(&self, clock: BusClock) -> Result<HertzU32, Error> {
        match clock {
            BusClock::Sysclk => self.sysclk(),
            BusClock::Hclk => self.hclk(),
            BusClock::Pclk1 => self.pclk1(),
            BusClock::Pclk2 => self.pclk2(),
        }
    }
}
