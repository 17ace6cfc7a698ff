// Licensed under the Apache-2.0 license

//! GPIO port, EXTI and SYSCFG register access.
//!
//! All nine ports use the GPIOA block type. Per-pin fields are addressed by
//! run-time pin number, so they go through [`FlagsRegister`] rather than
//! the PAC's one-accessor-per-pin API.

use super::device::{exti, gpioa, syscfg};
use super::FlagsRegister;
use crate::gpio::{Mode, OutputType, Pull, Speed};

pub trait GpioRegisters {
    fn set_mode(&self, pin: u8, mode: Mode);
    fn set_speed(&self, pin: u8, speed: Speed);
    fn set_pull(&self, pin: u8, pull: Pull);
    fn set_output_type(&self, pin: u8, output_type: OutputType);
    /// AFRL for pins 0..=7, AFRH for 8..=15.
    fn set_alternate_function(&self, pin: u8, function: u8);

    /// IDR.
    fn input(&self) -> u16;
    /// ODR, the output latch.
    fn output(&self) -> u16;
    fn write_output(&self, value: u16);
    /// Atomic BSRR write: pins in `set` go high, pins in `reset` go low.
    fn set_reset(&self, set: u16, reset: u16);
}

impl<T: GpioRegisters + ?Sized> GpioRegisters for &T {
    fn set_mode(&self, pin: u8, mode: Mode) {
        (**self).set_mode(pin, mode);
    }
    fn set_speed(&self, pin: u8, speed: Speed) {
        (**self).set_speed(pin, speed);
    }
    fn set_pull(&self, pin: u8, pull: Pull) {
        (**self).set_pull(pin, pull);
    }
    fn set_output_type(&self, pin: u8, output_type: OutputType) {
        (**self).set_output_type(pin, output_type);
    }
    fn set_alternate_function(&self, pin: u8, function: u8) {
        (**self).set_alternate_function(pin, function);
    }
    fn input(&self) -> u16 {
        (**self).input()
    }
    fn output(&self) -> u16 {
        (**self).output()
    }
    fn write_output(&self, value: u16) {
        (**self).write_output(value);
    }
    fn set_reset(&self, set: u16, reset: u16) {
        (**self).set_reset(set, reset);
    }
}

#[allow(clippy::cast_possible_truncation)]
impl GpioRegisters for gpioa::RegisterBlock {
    fn set_mode(&self, pin: u8, mode: Mode) {
        self.moder
            .replace_field(u32::from(pin) * 2, 2, mode as u32);
    }

    fn set_speed(&self, pin: u8, speed: Speed) {
        self.ospeedr
            .replace_field(u32::from(pin) * 2, 2, speed as u32);
    }

    fn set_pull(&self, pin: u8, pull: Pull) {
        self.pupdr
            .replace_field(u32::from(pin) * 2, 2, pull as u32);
    }

    fn set_output_type(&self, pin: u8, output_type: OutputType) {
        let open_drain = output_type == OutputType::OpenDrain;
        self.otyper
            .replace_field(u32::from(pin), 1, u32::from(open_drain));
    }

    fn set_alternate_function(&self, pin: u8, function: u8) {
        let shift = u32::from(pin % 8) * 4;
        if pin < 8 {
            self.afrl.replace_field(shift, 4, u32::from(function));
        } else {
            self.afrh.replace_field(shift, 4, u32::from(function));
        }
    }

    fn input(&self) -> u16 {
        self.idr.read().bits() as u16
    }

    fn output(&self) -> u16 {
        self.odr.read().bits() as u16
    }

    fn write_output(&self, value: u16) {
        // SAFETY: ODR's upper half is reserved and written as zero.
        self.odr.write(|w| unsafe { w.bits(u32::from(value)) });
    }

    fn set_reset(&self, set: u16, reset: u16) {
        // SAFETY: every BSRR bit pattern is valid; zero bits are ignored.
        self.bsrr
            .write(|w| unsafe { w.bits(u32::from(set) | (u32::from(reset) << 16)) });
    }
}

pub trait ExtiRegisters {
    /// Enables or disables each trigger edge of `line`.
    fn set_edges(&self, line: u8, rising: bool, falling: bool);
    /// IMR: an unmasked line raises its interrupt.
    fn set_unmasked(&self, line: u8, unmasked: bool);
    fn pending(&self) -> u32;
    /// PR is write-one-to-clear; only `line`'s bit is written.
    fn clear_pending(&self, line: u8);
}

impl<T: ExtiRegisters + ?Sized> ExtiRegisters for &T {
    fn set_edges(&self, line: u8, rising: bool, falling: bool) {
        (**self).set_edges(line, rising, falling);
    }
    fn set_unmasked(&self, line: u8, unmasked: bool) {
        (**self).set_unmasked(line, unmasked);
    }
    fn pending(&self) -> u32 {
        (**self).pending()
    }
    fn clear_pending(&self, line: u8) {
        (**self).clear_pending(line);
    }
}

impl ExtiRegisters for exti::RegisterBlock {
    fn set_edges(&self, line: u8, rising: bool, falling: bool) {
        let shift = u32::from(line);
        self.rtsr.replace_field(shift, 1, u32::from(rising));
        self.ftsr.replace_field(shift, 1, u32::from(falling));
    }

    fn set_unmasked(&self, line: u8, unmasked: bool) {
        self.imr
            .replace_field(u32::from(line), 1, u32::from(unmasked));
    }

    fn pending(&self) -> u32 {
        self.pr.read().bits()
    }

    fn clear_pending(&self, line: u8) {
        // SAFETY: writing a single PR bit clears only that line.
        self.pr.write(|w| unsafe { w.bits(1 << line) });
    }
}

pub trait SyscfgRegisters {
    /// Routes EXTI line `line` (0..=15) to GPIO port number `port` (A = 0).
    fn route_exti(&self, line: u8, port: u8);
}

impl<T: SyscfgRegisters + ?Sized> SyscfgRegisters for &T {
    fn route_exti(&self, line: u8, port: u8) {
        (**self).route_exti(line, port);
    }
}

impl SyscfgRegisters for syscfg::RegisterBlock {
    fn route_exti(&self, line: u8, port: u8) {
        let shift = u32::from(line % 4) * 4;
        let port = u32::from(port);
        match line / 4 {
            0 => self.exticr1.replace_field(shift, 4, port),
            1 => self.exticr2.replace_field(shift, 4, port),
            2 => self.exticr3.replace_field(shift, 4, port),
            _ => self.exticr4.replace_field(shift, 4, port),
        }
    }
}
