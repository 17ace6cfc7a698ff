// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! Two layers, so code that only needs bus transfers does not depend on
//! peripheral bring-up:
//!
//! ```text
//! I2cHardwareCore (init, timing, interrupt enables, recovery)
//!     └── I2cMaster (write, read, write_read, transactions)
//! ```
//!
//! Interrupt-driven transfers are not part of these traits; they need a
//! buffer that outlives the call and an event handler, and are offered by
//! the hardware type directly (see [`Stm32I2c`](crate::i2c::Stm32I2c)).

use crate::i2c::common::{I2cInterrupts, I2cSpeed, TimingConfig};
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};
use fugit::HertzU32;

/// Core I2C hardware interface.
///
/// ```rust,ignore
/// fn setup_i2c<T: I2cHardwareCore>(i2c: &mut T, pclk1: HertzU32) -> Result<(), T::Error> {
///     i2c.init(pclk1)?;
///     i2c.enable_interrupts(I2cInterrupts::ERROR);
///     Ok(())
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Programs the peripheral from its configuration and enables it.
    ///
    /// # Errors
    ///
    /// Returns an error if `source_clock` cannot produce the configured speed.
    fn init(&mut self, source_clock: HertzU32) -> Result<(), Self::Error>;

    /// Programs clock control and rise time for `speed`.
    ///
    /// Returns the SCL frequency actually produced, which is the closest one
    /// at or below `speed` that the divider allows.
    ///
    /// # Errors
    ///
    /// Returns an error if the source clock is outside the range the
    /// peripheral accepts.
    fn configure_timing(
        &mut self,
        speed: I2cSpeed,
        timing: &TimingConfig,
    ) -> Result<HertzU32, Self::Error>;

    /// Enables `sources`, leaving the other sources as they are.
    fn enable_interrupts(&mut self, sources: I2cInterrupts);

    /// Disables `sources`, leaving the other sources as they are.
    fn disable_interrupts(&mut self, sources: I2cInterrupts);

    /// Resets the peripheral and reprograms it from the stored configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the peripheral was never initialized.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// I2C master operations.
///
/// ```rust,ignore
/// fn read_sensor<T: I2cMaster>(i2c: &mut T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.read(0x48, &mut data)?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge, arbitration is
    /// lost, or a bus condition does not appear in time.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// See [`I2cMaster::write`].
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write, repeated START, read. The bus is not released in between.
    ///
    /// # Errors
    ///
    /// See [`I2cMaster::write`].
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Runs `ops_slice` as one transaction.
    ///
    /// Adjacent operations of the same kind share one address phase; a
    /// change of direction issues a repeated START; STOP follows the last
    /// operation only.
    ///
    /// # Errors
    ///
    /// Stops at the first failing operation.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}
