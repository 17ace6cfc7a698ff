// Licensed under the Apache-2.0 license

//! Interrupt numbers and NVIC enable/priority control.

use crate::registers::nvic::{NvicRegisters, PRIORITY_BITS};
use cortex_m::interrupt::InterruptNumber;

/// STM32F407 interrupt lines, as generated from the device description.
pub use crate::registers::device::Interrupt;

/// EXTI interrupt that serves GPIO pin `pin`.
#[must_use]
pub const fn exti_interrupt(pin: u8) -> Option<Interrupt> {
    match pin {
        0 => Some(Interrupt::EXTI0),
        1 => Some(Interrupt::EXTI1),
        2 => Some(Interrupt::EXTI2),
        3 => Some(Interrupt::EXTI3),
        4 => Some(Interrupt::EXTI4),
        5..=9 => Some(Interrupt::EXTI9_5),
        10..=15 => Some(Interrupt::EXTI15_10),
        _ => None,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Only 16 priority levels are implemented.
    InvalidPriority,
}

/// Highest numeric (lowest urgency) priority.
pub const MAX_PRIORITY: u8 = (1 << PRIORITY_BITS) - 1;

pub struct Nvic<R: NvicRegisters> {
    regs: R,
}

impl<R: NvicRegisters> Nvic<R> {
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn enable<I: InterruptNumber>(&self, irq: I) {
        self.regs.enable(irq.number());
    }

    pub fn disable<I: InterruptNumber>(&self, irq: I) {
        self.regs.disable(irq.number());
    }

    pub fn is_enabled<I: InterruptNumber>(&self, irq: I) -> bool {
        self.regs.is_enabled(irq.number())
    }

    /// Sets the 4-bit priority of `irq`; lower values preempt higher ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPriority`] for values above [`MAX_PRIORITY`].
    pub fn set_priority<I: InterruptNumber>(&self, irq: I, priority: u8) -> Result<(), Error> {
        if priority > MAX_PRIORITY {
            return Err(Error::InvalidPriority);
        }
        self.regs
            .set_priority_byte(irq.number(), priority << (8 - PRIORITY_BITS));
        Ok(())
    }

    /// Enables or disables `irq`, setting its priority first when enabling.
    ///
    /// # Errors
    ///
    /// See [`Nvic::set_priority`].
    pub fn configure<I: InterruptNumber>(&self, irq: I, priority: u8, enable: bool) -> Result<(), Error> {
        if enable {
            self.set_priority(irq, priority)?;
            self.enable(irq);
        } else {
            self.disable(irq);
        }
        Ok(())
    }
}
