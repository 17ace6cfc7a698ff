// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! Clock gating, peripheral reset and source-clock lookup for an I2C
//! instance, expressed against [`ClockControl`] so the sequence can be
//! checked without hardware.

use crate::i2c::hardware_instantiation::I2cInstance;
use crate::i2c::Error;
use crate::rcc::{BusClock, ClockControl};
use fugit::HertzU32;

/// Helper for I2C system control operations.
pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// Enables the instance's bus clock and pulses its reset so every
    /// register starts from its reset value.
    ///
    /// # Errors
    ///
    /// Propagates the clock controller's error.
    pub fn initialize_i2c_system<S>(
        system_controller: &mut S,
        instance: I2cInstance,
    ) -> Result<(), Error>
    where
        S: ClockControl,
        Error: From<S::Error>,
    {
        system_controller.enable(instance.clock_gate())?;
        Self::reset_i2c_peripheral(system_controller, instance)
    }

    /// PCLK1, the clock the I2C timing registers are computed from.
    ///
    /// # Errors
    ///
    /// Propagates the clock controller's error.
    pub fn get_i2c_source_frequency<S>(system_controller: &S) -> Result<HertzU32, Error>
    where
        S: ClockControl,
        Error: From<S::Error>,
    {
        Ok(system_controller.get_frequency(BusClock::Pclk1)?)
    }

    /// [`Self::initialize_i2c_system`] followed by
    /// [`Self::get_i2c_source_frequency`].
    ///
    /// # Errors
    ///
    /// Propagates the clock controller's error.
    pub fn initialize_with_clock_config<S>(
        system_controller: &mut S,
        instance: I2cInstance,
    ) -> Result<HertzU32, Error>
    where
        S: ClockControl,
        Error: From<S::Error>,
    {
        Self::initialize_i2c_system(system_controller, instance)?;
        Self::get_i2c_source_frequency(system_controller)
    }

    /// Resets the peripheral only, e.g. to recover from a wedged bus.
    ///
    /// # Errors
    ///
    /// Propagates the clock controller's error.
    pub fn reset_i2c_peripheral<S>(
        system_controller: &mut S,
        instance: I2cInstance,
    ) -> Result<(), Error>
    where
        S: ClockControl,
        Error: From<S::Error>,
    {
        system_controller.reset_pulse(instance.clock_gate())?;
        Ok(())
    }
}
