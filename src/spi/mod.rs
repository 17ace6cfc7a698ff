// Licensed under the Apache-2.0 license

//! SPI master driver.
//!
//! [`SpiController`] offers polled transfers, interrupt-driven transfers that
//! report completion through an [`EventHandler`](crate::event::EventHandler),
//! and an `embedded-hal` [`SpiBus`](embedded_hal::spi::SpiBus) implementation.

pub mod spi_controller;

pub use spi_controller::SpiController;

use crate::common::PollBudget;
use crate::nvic::Interrupt;
use crate::rcc::ClockGate;
use crate::registers::device::{self, spi1};
use embedded_hal::spi::{Mode, MODE_0};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceMode {
    Slave,
    Master,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusConfig {
    FullDuplex,
    HalfDuplex,
    SimplexRxOnly,
}

/// SCLK = PCLK / divider.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BaudDivider {
    Div2 = 0,
    Div4 = 1,
    Div8 = 2,
    Div16 = 3,
    Div32 = 4,
    Div64 = 5,
    Div128 = 6,
    Div256 = 7,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameSize {
    Bits8,
    /// Buffers hold frames as little-endian byte pairs.
    Bits16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpiConfig {
    pub device_mode: DeviceMode,
    pub bus_config: BusConfig,
    pub baud_divider: BaudDivider,
    pub frame_size: FrameSize,
    /// Clock polarity and phase.
    pub mode: Mode,
    /// Software slave management (SSM). The internal NSS level is driven
    /// high so the master does not fault.
    pub software_slave_management: bool,
    pub bit_order: BitOrder,
    pub poll_budget: PollBudget,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            device_mode: DeviceMode::Master,
            bus_config: BusConfig::FullDuplex,
            baud_divider: BaudDivider::Div8,
            frame_size: FrameSize::Bits8,
            mode: MODE_0,
            software_slave_management: true,
            bit_order: BitOrder::MsbFirst,
            poll_budget: PollBudget::DEFAULT,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Overrun,
    ModeFault,
    Crc,
    /// A status flag did not appear within the poll budget.
    Timeout,
    /// An interrupt-driven transfer owns the peripheral.
    Busy,
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        use embedded_hal::spi::ErrorKind;
        match self {
            Self::Overrun => ErrorKind::Overrun,
            Self::ModeFault => ErrorKind::ModeFault,
            Self::Crc | Self::Timeout | Self::Busy => ErrorKind::Other,
        }
    }
}

/// Conditions reported by [`SpiController::on_interrupt`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpiEvent {
    TxComplete,
    RxComplete,
    Overrun,
    CrcError,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpiInstance {
    Spi1,
    Spi2,
    Spi3,
}

impl SpiInstance {
    #[must_use]
    pub const fn ptr(self) -> *const spi1::RegisterBlock {
        match self {
            Self::Spi1 => device::SPI1::ptr(),
            Self::Spi2 => device::SPI2::ptr().cast(),
            Self::Spi3 => device::SPI3::ptr().cast(),
        }
    }

    #[must_use]
    pub const fn interrupt(self) -> Interrupt {
        match self {
            Self::Spi1 => Interrupt::SPI1,
            Self::Spi2 => Interrupt::SPI2,
            Self::Spi3 => Interrupt::SPI3,
        }
    }

    #[must_use]
    pub const fn clock_gate(self) -> ClockGate {
        match self {
            Self::Spi1 => ClockGate::Spi1,
            Self::Spi2 => ClockGate::Spi2,
            Self::Spi3 => ClockGate::Spi3,
        }
    }

    /// # Safety
    ///
    /// The caller must be the only owner driving this instance.
    #[must_use]
    pub unsafe fn registers(self) -> &'static spi1::RegisterBlock {
        // SAFETY: SPI2 and SPI3 share SPI1's layout; ownership is the
        // caller's obligation.
        unsafe { &*self.ptr() }
    }
}
