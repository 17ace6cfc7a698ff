// Licensed under the Apache-2.0 license

//! STM32F407 I2C driver module.
//!
//! [`Stm32I2c`] drives one I2C v1 peripheral as a bus master, both with
//! bounded polling and with the interrupt-driven state machine. The
//! [`I2cMaster`] and [`I2cHardwareCore`] traits abstract it, and
//! [`I2cController`] turns any `I2cMaster` into an `embedded_hal::i2c::I2c`.

pub mod common;
pub mod hardware_instantiation;
pub mod i2c_controller;
pub mod stm32_i2c;
pub mod system_setup;
pub mod traits;

pub use common::{
    BusError, FmDuty, I2cConfig, I2cConfigBuilder, I2cEvent, I2cInterrupts, I2cSpeed,
    TimingConfig,
};
pub use hardware_instantiation::I2cInstance;
pub use i2c_controller::I2cController;
pub use stm32_i2c::{compute_timing, Error, Stm32I2c, Timing, TRANSFER_INTERRUPTS};
pub use system_setup::I2cSystemSetup;
pub use traits::{I2cHardwareCore, I2cMaster};
