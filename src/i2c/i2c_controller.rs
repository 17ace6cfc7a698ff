// Licensed under the Apache-2.0 license

//! `embedded-hal` front end over any [`I2cMaster`] implementation.
//!
//! Device drivers (see [`crate::bsp`]) take an `embedded_hal::i2c::I2c`;
//! this wrapper provides it and logs failed transfers.

use crate::common::{log_fmt, Logger, NoOpLogger};
use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub logger: L,
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    pub fn new(hardware: H, logger: L) -> Self {
        Self { hardware, logger }
    }

    fn report<T>(
        &mut self,
        op: &str,
        addr: SevenBitAddress,
        result: Result<T, H::Error>,
    ) -> Result<T, H::Error> {
        if let Err(error) = &result {
            log_fmt(
                &mut self.logger,
                true,
                format_args!("i2c {op} {addr:#04x}: {error:?}"),
            );
        }
        result
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        let result = self.hardware.read(addr, buffer);
        self.report("read", addr, result)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        let result = self.hardware.write(addr, bytes);
        self.report("write", addr, result)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.write_read(addr, bytes, buffer);
        self.report("write_read", addr, result)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.transaction_slice(addr, operations);
        self.report("transaction", addr, result)
    }
}
