// Licensed under the Apache-2.0 license

//! Configuration and event types shared by the I2C driver modules.

use crate::common::PollBudget;
use fugit::HertzU32;

/// Target SCL frequency.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast200k = 200_000,
    Fast = 400_000,
}

impl I2cSpeed {
    #[must_use]
    pub const fn hz(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }

    /// Anything above 100 kHz runs in fast mode (F/S set).
    #[must_use]
    pub const fn is_fast_mode(self) -> bool {
        !matches!(self, Self::Standard)
    }
}

/// Fast-mode SCL duty cycle, t_low / t_high.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FmDuty {
    Two,
    SixteenNine,
}

/// Inputs to the CCR/TRISE calculation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// PCLK1, the peripheral's input clock.
    pub source_clock: HertzU32,
    pub fm_duty: FmDuty,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    pub speed: I2cSpeed,
    /// 7-bit own address, used when the peripheral is addressed as a slave.
    pub own_address: u8,
    /// Acknowledge received bytes. Re-applied after every receive.
    pub ack: bool,
    pub fm_duty: FmDuty,
    pub poll_budget: PollBudget,
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    own_address: u8,
    ack: bool,
    fm_duty: FmDuty,
    poll_budget: PollBudget,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Standard,
            own_address: 0,
            ack: true,
            fm_duty: FmDuty::Two,
            poll_budget: PollBudget::DEFAULT,
        }
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn own_address(mut self, address: u8) -> Self {
        self.own_address = address & 0x7F;
        self
    }
    #[must_use]
    pub fn ack(mut self, enabled: bool) -> Self {
        self.ack = enabled;
        self
    }
    #[must_use]
    pub fn fm_duty(mut self, duty: FmDuty) -> Self {
        self.fm_duty = duty;
        self
    }
    #[must_use]
    pub fn poll_budget(mut self, budget: PollBudget) -> Self {
        self.poll_budget = budget;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            own_address: self.own_address,
            ack: self.ack,
            fm_duty: self.fm_duty,
            poll_budget: self.poll_budget,
        }
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

/// Interrupt sources enabled in CR2.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct I2cInterrupts {
    /// TXE and RXNE (ITBUFEN).
    pub buffer: bool,
    /// SB, ADDR, BTF and STOPF (ITEVTEN).
    pub event: bool,
    /// Bus error flags (ITERREN).
    pub error: bool,
}

impl I2cInterrupts {
    pub const NONE: Self = Self {
        buffer: false,
        event: false,
        error: false,
    };
    pub const ALL: Self = Self {
        buffer: true,
        event: true,
        error: true,
    };
    pub const ERROR: Self = Self {
        error: true,
        ..Self::NONE
    };
    /// Buffer and event sources, dropped when a transfer closes.
    pub const EVENTS: Self = Self {
        error: false,
        ..Self::ALL
    };

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            buffer: self.buffer | other.buffer,
            event: self.event | other.event,
            error: self.error | other.error,
        }
    }

    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self {
            buffer: self.buffer & !other.buffer,
            event: self.event & !other.event,
            error: self.error & !other.error,
        }
    }
}

/// Hardware error flags reported by the error interrupt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusError {
    /// Misplaced START or STOP (BERR).
    Bus,
    ArbitrationLoss,
    /// The receiver did not acknowledge (AF).
    AckFailure,
    /// Overrun or underrun (OVR).
    Overrun,
    /// SCL held low too long (TIMEOUT).
    Timeout,
}

/// Conditions delivered to the application from the I2C interrupt handlers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cEvent {
    TxComplete,
    RxComplete,
    /// STOP detected while addressed as a slave.
    StopDetected,
    /// Slave transmitter: the master wants the next byte.
    DataRequest,
    /// Slave receiver: a byte is waiting in DR.
    DataReceived,
    Error(BusError),
}
