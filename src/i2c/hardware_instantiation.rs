// Licensed under the Apache-2.0 license

//! # I2C instances of the STM32F407
//!
//! The part has three I2C peripherals with identical register blocks. Each
//! differs only in its base address, its event and error interrupt lines,
//! and its clock gate. [`I2cInstance`] carries those facts, so the driver
//! type is the same for every bus and controllers can share one array:
//!
//! ```rust,ignore
//! // SAFETY: nothing else drives I2C1..3.
//! let mut buses = unsafe { instantiate_hardware(I2cConfig::default()) };
//! for bus in &mut buses {
//!     bus.hardware.init(pclk1)?;
//! }
//! buses[0].write(0x68, &[0x00])?;
//! ```
//!
//! ## Interrupt lines
//!
//! | Instance | Event IRQ | Error IRQ |
//! |----------|-----------|-----------|
//! | I2C1     | 31        | 32        |
//! | I2C2     | 33        | 34        |
//! | I2C3     | 72        | 73        |

use crate::common::NoOpLogger;
use crate::i2c::common::I2cConfig;
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::stm32_i2c::Stm32I2c;
use crate::nvic::Interrupt;
use crate::rcc::ClockGate;
use crate::registers::device::{self, i2c1};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cInstance {
    I2c1,
    I2c2,
    I2c3,
}

impl I2cInstance {
    pub const ALL: [Self; 3] = [Self::I2c1, Self::I2c2, Self::I2c3];

    #[must_use]
    pub const fn ptr(self) -> *const i2c1::RegisterBlock {
        match self {
            Self::I2c1 => device::I2C1::ptr(),
            Self::I2c2 => device::I2C2::ptr().cast(),
            Self::I2c3 => device::I2C3::ptr().cast(),
        }
    }

    #[must_use]
    pub const fn event_interrupt(self) -> Interrupt {
        match self {
            Self::I2c1 => Interrupt::I2C1_EV,
            Self::I2c2 => Interrupt::I2C2_EV,
            Self::I2c3 => Interrupt::I2C3_EV,
        }
    }

    #[must_use]
    pub const fn error_interrupt(self) -> Interrupt {
        match self {
            Self::I2c1 => Interrupt::I2C1_ER,
            Self::I2c2 => Interrupt::I2C2_ER,
            Self::I2c3 => Interrupt::I2C3_ER,
        }
    }

    #[must_use]
    pub const fn clock_gate(self) -> ClockGate {
        match self {
            Self::I2c1 => ClockGate::I2c1,
            Self::I2c2 => ClockGate::I2c2,
            Self::I2c3 => ClockGate::I2c3,
        }
    }

    #[must_use]
    pub const fn bus_number(self) -> u8 {
        match self {
            Self::I2c1 => 1,
            Self::I2c2 => 2,
            Self::I2c3 => 3,
        }
    }

    /// # Safety
    ///
    /// The caller must be the only owner driving this instance.
    #[must_use]
    pub unsafe fn registers(self) -> &'static i2c1::RegisterBlock {
        // SAFETY: I2C2 and I2C3 share I2C1's layout; ownership is the
        // caller's obligation.
        unsafe { &*self.ptr() }
    }
}

pub type I2cHardwareNoLog<'buf> = Stm32I2c<'buf, &'static i2c1::RegisterBlock, NoOpLogger>;
pub type I2cControllerNoLog<'buf> = I2cController<I2cHardwareNoLog<'buf>, NoOpLogger>;

/// Builds an uninitialized controller for `instance`.
///
/// # Safety
///
/// See [`I2cInstance::registers`].
#[must_use]
pub unsafe fn create_controller<'buf>(
    instance: I2cInstance,
    config: I2cConfig,
) -> I2cControllerNoLog<'buf> {
    // SAFETY: forwarded to the caller.
    let regs = unsafe { instance.registers() };
    I2cController::new(Stm32I2c::new(regs, config, NoOpLogger), NoOpLogger)
}

/// Controllers for all three buses, indexed by bus number minus one.
///
/// # Safety
///
/// No other code may drive I2C1, I2C2 or I2C3 while the controllers live.
#[must_use]
pub unsafe fn instantiate_hardware<'buf>(config: I2cConfig) -> [I2cControllerNoLog<'buf>; 3] {
    // SAFETY: forwarded to the caller.
    I2cInstance::ALL.map(|instance| unsafe { create_controller(instance, config) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_m::interrupt::InterruptNumber;

    #[test]
    fn test_instance_resources() {
        assert_eq!(I2cInstance::I2c1.ptr() as usize, 0x4000_5400);
        assert_eq!(I2cInstance::I2c3.ptr() as usize, 0x4000_5C00);
        assert_eq!(I2cInstance::I2c1.event_interrupt().number(), 31);
        assert_eq!(I2cInstance::I2c1.error_interrupt().number(), 32);
        assert_eq!(I2cInstance::I2c3.error_interrupt(), Interrupt::I2C3_ER);
        assert_eq!(I2cInstance::I2c2.clock_gate(), ClockGate::I2c2);
    }

    #[test]
    fn test_instances_in_bus_order() {
        for (index, instance) in I2cInstance::ALL.iter().enumerate() {
            assert_eq!(usize::from(instance.bus_number()), index + 1);
        }
        assert!(I2cInstance::ALL
            .windows(2)
            .all(|pair| (pair[0].ptr() as usize) < (pair[1].ptr() as usize)));
    }
}
