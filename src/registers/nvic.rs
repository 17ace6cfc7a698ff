// Licensed under the Apache-2.0 license

//! NVIC enable and priority registers, through the `cortex-m` register block.

use cortex_m::peripheral::nvic::RegisterBlock;

/// Priority bits implemented by this core; they sit in the top of each byte.
pub const PRIORITY_BITS: u8 = 4;

pub trait NvicRegisters {
    fn enable(&self, irq: u16);
    fn disable(&self, irq: u16);
    fn is_enabled(&self, irq: u16) -> bool;
    /// Writes the raw IPR byte of `irq`.
    fn set_priority_byte(&self, irq: u16, value: u8);
}

impl<T: NvicRegisters + ?Sized> NvicRegisters for &T {
    fn enable(&self, irq: u16) {
        (**self).enable(irq);
    }
    fn disable(&self, irq: u16) {
        (**self).disable(irq);
    }
    fn is_enabled(&self, irq: u16) -> bool {
        (**self).is_enabled(irq)
    }
    fn set_priority_byte(&self, irq: u16, value: u8) {
        (**self).set_priority_byte(irq, value);
    }
}

impl NvicRegisters for RegisterBlock {
    fn enable(&self, irq: u16) {
        if let Some(iser) = self.iser.get(usize::from(irq / 32)) {
            // SAFETY: ISER ignores zero bits, so only `irq` is affected.
            unsafe { iser.write(1 << (irq % 32)) };
        }
    }

    fn disable(&self, irq: u16) {
        if let Some(icer) = self.icer.get(usize::from(irq / 32)) {
            // SAFETY: ICER ignores zero bits, so only `irq` is affected.
            unsafe { icer.write(1 << (irq % 32)) };
        }
    }

    fn is_enabled(&self, irq: u16) -> bool {
        self.iser
            .get(usize::from(irq / 32))
            .is_some_and(|iser| iser.read() & (1 << (irq % 32)) != 0)
    }

    fn set_priority_byte(&self, irq: u16, value: u8) {
        if let Some(ipr) = self.ipr.get(usize::from(irq)) {
            // SAFETY: byte access to IPR touches no other interrupt.
            unsafe { ipr.write(value) };
        }
    }
}
