// Licensed under the Apache-2.0 license

//! USART driver: configuration, baud-rate divider, polled and
//! interrupt-driven transfers, and `embedded-io` (blocking and async) access.

pub mod usart_async;
pub mod usart_controller;

pub use usart_controller::{brr_value, UsartController};

use crate::common::PollBudget;
use crate::nvic::Interrupt;
use crate::rcc::{BusClock, ClockGate};
use crate::registers::device::{self, usart1};
use fugit::HertzU32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsartMode {
    TxOnly,
    RxOnly,
    TxRx,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum StopBits {
    One = 0,
    Half = 1,
    Two = 2,
    OneAndHalf = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WordLength {
    /// With parity enabled a word carries 7 data bits plus parity.
    Bits8,
    /// With parity enabled a word carries 8 data bits plus parity.
    Bits9,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Cts,
    Rts,
    CtsRts,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Oversampling {
    By16,
    By8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UsartConfig {
    pub mode: UsartMode,
    pub baud_rate: HertzU32,
    pub stop_bits: StopBits,
    pub word_length: WordLength,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub oversampling: Oversampling,
    pub poll_budget: PollBudget,
}

impl Default for UsartConfig {
    fn default() -> Self {
        Self {
            mode: UsartMode::TxRx,
            baud_rate: HertzU32::from_raw(115_200),
            stop_bits: StopBits::One,
            word_length: WordLength::Bits8,
            parity: Parity::None,
            flow_control: FlowControl::None,
            oversampling: Oversampling::By16,
            poll_budget: PollBudget::DEFAULT,
        }
    }
}

/// USART error
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Overrun,
    FrameFormat,
    Parity,
    Noise,
    /// An interrupt-driven transfer owns the peripheral.
    Busy,
    Timeout,
    /// The requested baud rate cannot be produced from the bus clock.
    InvalidBaudRate,
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind;
        match self {
            Self::Overrun | Self::FrameFormat | Self::Parity | Self::Noise => {
                ErrorKind::InvalidData
            }
            Self::Busy => ErrorKind::Interrupted,
            Self::Timeout => ErrorKind::TimedOut,
            Self::InvalidBaudRate => ErrorKind::InvalidInput,
        }
    }
}

/// Receive line errors reported while the error interrupt (EIE) is on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineError {
    Framing,
    Noise,
    Overrun,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsartEvent {
    TxComplete,
    RxComplete,
    Cts,
    Idle,
    /// ORE seen while a receive was armed.
    Overrun,
    Error(LineError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsartInstance {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
}

impl UsartInstance {
    #[must_use]
    pub const fn ptr(self) -> *const usart1::RegisterBlock {
        match self {
            Self::Usart1 => device::USART1::ptr(),
            Self::Usart2 => device::USART2::ptr().cast(),
            Self::Usart3 => device::USART3::ptr().cast(),
            Self::Uart4 => device::UART4::ptr().cast(),
            Self::Uart5 => device::UART5::ptr().cast(),
            Self::Usart6 => device::USART6::ptr().cast(),
        }
    }

    #[must_use]
    pub const fn interrupt(self) -> Interrupt {
        match self {
            Self::Usart1 => Interrupt::USART1,
            Self::Usart2 => Interrupt::USART2,
            Self::Usart3 => Interrupt::USART3,
            Self::Uart4 => Interrupt::UART4,
            Self::Uart5 => Interrupt::UART5,
            Self::Usart6 => Interrupt::USART6,
        }
    }

    #[must_use]
    pub const fn clock_gate(self) -> ClockGate {
        match self {
            Self::Usart1 => ClockGate::Usart1,
            Self::Usart2 => ClockGate::Usart2,
            Self::Usart3 => ClockGate::Usart3,
            Self::Uart4 => ClockGate::Uart4,
            Self::Uart5 => ClockGate::Uart5,
            Self::Usart6 => ClockGate::Usart6,
        }
    }

    /// Clock that feeds the baud-rate generator.
    #[must_use]
    pub const fn bus_clock(self) -> BusClock {
        match self {
            Self::Usart1 | Self::Usart6 => BusClock::Pclk2,
            _ => BusClock::Pclk1,
        }
    }

    /// # Safety
    ///
    /// The caller must be the only owner driving this instance.
    #[must_use]
    pub unsafe fn registers(self) -> &'static usart1::RegisterBlock {
        // SAFETY: every instance shares USART1's layout; ownership is the
        // caller's obligation.
        unsafe { &*self.ptr() }
    }
}
