// Licensed under the Apache-2.0 license

//! Reset and clock control register access.

use super::device::rcc;
use super::FlagsRegister;
use crate::rcc::Bus;

/// Clock configuration register fields, as raw field values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockSelect {
    /// System clock switch status.
    pub sws: u8,
    /// AHB prescaler.
    pub hpre: u8,
    /// APB1 (low-speed) prescaler.
    pub ppre1: u8,
    /// APB2 (high-speed) prescaler.
    pub ppre2: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PllSettings {
    pub pllm: u8,
    pub plln: u16,
    /// Raw PLLP field: 0 => /2, 1 => /4, 2 => /6, 3 => /8.
    pub pllp: u8,
    /// PLL source is HSE when set, HSI otherwise.
    pub source_hse: bool,
}

pub trait RccRegisters {
    fn clock_select(&self) -> ClockSelect;
    fn pll_settings(&self) -> PllSettings;

    /// Clock enable bit `bit` of the bus's ENR register.
    fn is_clock_enabled(&self, bus: Bus, bit: u32) -> bool;
    fn set_clock_enabled(&self, bus: Bus, bit: u32, enabled: bool);
    /// Reset bit `bit` of the bus's RSTR register.
    fn set_reset(&self, bus: Bus, bit: u32, asserted: bool);
}

impl<T: RccRegisters + ?Sized> RccRegisters for &T {
    fn clock_select(&self) -> ClockSelect {
        (**self).clock_select()
    }
    fn pll_settings(&self) -> PllSettings {
        (**self).pll_settings()
    }
    fn is_clock_enabled(&self, bus: Bus, bit: u32) -> bool {
        (**self).is_clock_enabled(bus, bit)
    }
    fn set_clock_enabled(&self, bus: Bus, bit: u32, enabled: bool) {
        (**self).set_clock_enabled(bus, bit, enabled);
    }
    fn set_reset(&self, bus: Bus, bit: u32, asserted: bool) {
        (**self).set_reset(bus, bit, asserted);
    }
}

fn write_flag(reg: &impl FlagsRegister, bit: u32, set: bool) {
    if set {
        reg.set_flags(1 << bit);
    } else {
        reg.clear_flags(1 << bit);
    }
}

impl RccRegisters for rcc::RegisterBlock {
    fn clock_select(&self) -> ClockSelect {
        let cfgr = self.cfgr.read();
        ClockSelect {
            sws: cfgr.sws().bits(),
            hpre: cfgr.hpre().bits(),
            ppre1: cfgr.ppre1().bits(),
            ppre2: cfgr.ppre2().bits(),
        }
    }

    fn pll_settings(&self) -> PllSettings {
        let pll = self.pllcfgr.read();
        PllSettings {
            pllm: pll.pllm().bits(),
            plln: pll.plln().bits(),
            pllp: pll.pllp().bits(),
            source_hse: pll.pllsrc().bit_is_set(),
        }
    }

    fn is_clock_enabled(&self, bus: Bus, bit: u32) -> bool {
        let enr = match bus {
            Bus::Ahb1 => self.ahb1enr.flags(),
            Bus::Apb1 => self.apb1enr.flags(),
            Bus::Apb2 => self.apb2enr.flags(),
        };
        enr & (1 << bit) != 0
    }

    fn set_clock_enabled(&self, bus: Bus, bit: u32, enabled: bool) {
        match bus {
            Bus::Ahb1 => write_flag(&self.ahb1enr, bit, enabled),
            Bus::Apb1 => write_flag(&self.apb1enr, bit, enabled),
            Bus::Apb2 => write_flag(&self.apb2enr, bit, enabled),
        }
    }

    fn set_reset(&self, bus: Bus, bit: u32, asserted: bool) {
        match bus {
            Bus::Ahb1 => write_flag(&self.ahb1rstr, bit, asserted),
            Bus::Apb1 => write_flag(&self.apb1rstr, bit, asserted),
            Bus::Apb2 => write_flag(&self.apb2rstr, bit, asserted),
        }
    }
}
