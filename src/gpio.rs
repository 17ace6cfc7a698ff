// Licensed under the Apache-2.0 license

//! GPIO port configuration, digital I/O and EXTI line setup.

use crate::rcc::{ClockGate, Rcc};
use crate::registers::device::{self, gpioa};
use crate::registers::gpio::{ExtiRegisters, GpioRegisters, SyscfgRegisters};
use crate::registers::rcc::RccRegisters;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Pin numbers run from 0 to 15.
    InvalidPin,
    /// Alternate functions run from 0 to 15.
    InvalidAlternateFunction,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
}

impl Port {
    /// Port number as used in SYSCFG EXTICR (A = 0).
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn ptr(self) -> *const gpioa::RegisterBlock {
        match self {
            Self::A => device::GPIOA::ptr(),
            Self::B => device::GPIOB::ptr().cast(),
            Self::C => device::GPIOC::ptr().cast(),
            Self::D => device::GPIOD::ptr().cast(),
            Self::E => device::GPIOE::ptr().cast(),
            Self::F => device::GPIOF::ptr().cast(),
            Self::G => device::GPIOG::ptr().cast(),
            Self::H => device::GPIOH::ptr().cast(),
            Self::I => device::GPIOI::ptr().cast(),
        }
    }

    /// # Safety
    ///
    /// The caller must be the only owner driving the pins it configures on
    /// this port.
    #[must_use]
    pub unsafe fn registers(self) -> &'static gpioa::RegisterBlock {
        // SAFETY: every port shares GPIOA's layout; ownership is the
        // caller's obligation.
        unsafe { &*self.ptr() }
    }

    #[must_use]
    pub const fn clock_gate(self) -> ClockGate {
        match self {
            Self::A => ClockGate::GpioA,
            Self::B => ClockGate::GpioB,
            Self::C => ClockGate::GpioC,
            Self::D => ClockGate::GpioD,
            Self::E => ClockGate::GpioE,
            Self::F => ClockGate::GpioF,
            Self::G => ClockGate::GpioG,
            Self::H => ClockGate::GpioH,
            Self::I => ClockGate::GpioI,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Input = 0,
    Output = 1,
    AlternateFunction = 2,
    Analog = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Speed {
    Low = 0,
    Medium = 1,
    Fast = 2,
    High = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Pull {
    None = 0,
    Up = 1,
    Down = 2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputType {
    PushPull,
    OpenDrain,
}

/// Edge(s) that raise an EXTI interrupt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Edge {
    Falling,
    Rising,
    Both,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PinConfig {
    pub mode: Mode,
    pub speed: Speed,
    pub pull: Pull,
    pub output_type: OutputType,
    /// Only applied in [`Mode::AlternateFunction`].
    pub alternate_function: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Input,
            speed: Speed::Low,
            pull: Pull::None,
            output_type: OutputType::PushPull,
            alternate_function: 0,
        }
    }
}

impl PinConfig {
    #[must_use]
    pub fn output() -> Self {
        Self {
            mode: Mode::Output,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn alternate(function: u8) -> Self {
        Self {
            mode: Mode::AlternateFunction,
            speed: Speed::Fast,
            alternate_function: function,
            ..Self::default()
        }
    }
}

fn check_pin(pin: u8) -> Result<(), Error> {
    if pin > 15 {
        return Err(Error::InvalidPin);
    }
    Ok(())
}

/// One GPIO port.
pub struct GpioPort<R: GpioRegisters> {
    regs: R,
    port: Port,
}

impl<R: GpioRegisters> GpioPort<R> {
    pub const fn new(regs: R, port: Port) -> Self {
        Self { regs, port }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    /// Returns every register of the port to its reset value through the
    /// AHB1 reset register.
    pub fn reset<C: RccRegisters>(&self, rcc: &Rcc<C>) {
        rcc.reset_peripheral(self.port.clock_gate());
    }

    /// Applies `config` to `pin`, leaving the other pins of the port alone.
    ///
    /// # Errors
    ///
    /// Returns an error for an out-of-range pin or alternate function.
    pub fn configure(&self, pin: u8, config: &PinConfig) -> Result<(), Error> {
        check_pin(pin)?;
        if config.alternate_function > 15 {
            return Err(Error::InvalidAlternateFunction);
        }
        self.regs.set_mode(pin, config.mode);
        self.regs.set_speed(pin, config.speed);
        self.regs.set_pull(pin, config.pull);
        self.regs.set_output_type(pin, config.output_type);
        if config.mode == Mode::AlternateFunction {
            self.regs
                .set_alternate_function(pin, config.alternate_function);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for pins above 15.
    pub fn read_pin(&self, pin: u8) -> Result<bool, Error> {
        check_pin(pin)?;
        Ok(self.regs.input() & (1 << pin) != 0)
    }

    pub fn read_port(&self) -> u16 {
        self.regs.input()
    }

    /// Drives `pin` through BSRR, so no other pin is touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for pins above 15.
    pub fn write_pin(&self, pin: u8, high: bool) -> Result<(), Error> {
        check_pin(pin)?;
        if high {
            self.regs.set_reset(1 << pin, 0);
        } else {
            self.regs.set_reset(0, 1 << pin);
        }
        Ok(())
    }

    pub fn write_port(&self, value: u16) {
        self.regs.write_output(value);
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for pins above 15.
    pub fn toggle_pin(&self, pin: u8) -> Result<(), Error> {
        check_pin(pin)?;
        let high = self.regs.output() & (1 << pin) != 0;
        self.write_pin(pin, !high)
    }

    /// Output latch state of `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for pins above 15.
    pub fn is_set_high(&self, pin: u8) -> Result<bool, Error> {
        check_pin(pin)?;
        Ok(self.regs.output() & (1 << pin) != 0)
    }

    /// Single-pin view implementing the `embedded-hal` digital traits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for pins above 15.
    pub fn pin(&self, pin: u8) -> Result<Pin<'_, R>, Error> {
        check_pin(pin)?;
        Ok(Pin { port: self, pin })
    }
}

pub struct Pin<'a, R: GpioRegisters> {
    port: &'a GpioPort<R>,
    pin: u8,
}

impl<R: GpioRegisters> Pin<'_, R> {
    #[must_use]
    pub fn number(&self) -> u8 {
        self.pin
    }
}

impl<R: GpioRegisters> embedded_hal::digital::ErrorType for Pin<'_, R> {
    type Error = core::convert::Infallible;
}

// Pin numbers are validated when the view is created, so the port calls
// below cannot fail.
impl<R: GpioRegisters> embedded_hal::digital::InputPin for Pin<'_, R> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.regs.input() & (1 << self.pin) != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.regs.input() & (1 << self.pin) == 0)
    }
}

impl<R: GpioRegisters> embedded_hal::digital::OutputPin for Pin<'_, R> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.port.regs.set_reset(0, 1 << self.pin);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.port.regs.set_reset(1 << self.pin, 0);
        Ok(())
    }
}

impl<R: GpioRegisters> embedded_hal::digital::StatefulOutputPin for Pin<'_, R> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.regs.output() & (1 << self.pin) != 0)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.regs.output() & (1 << self.pin) == 0)
    }
}

/// External interrupt controller together with the SYSCFG line router.
pub struct Exti<E: ExtiRegisters, S: SyscfgRegisters> {
    exti: E,
    syscfg: S,
}

impl<E: ExtiRegisters, S: SyscfgRegisters> Exti<E, S> {
    /// SYSCFG's clock must be enabled before lines are routed.
    pub const fn new(exti: E, syscfg: S) -> Self {
        Self { exti, syscfg }
    }

    /// Selects the trigger edge, routes line `pin` to `port` and unmasks it.
    /// The pin itself should be configured as an input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for pins above 15.
    pub fn configure_line(&self, port: Port, pin: u8, edge: Edge) -> Result<(), Error> {
        check_pin(pin)?;
        let (rising, falling) = match edge {
            Edge::Falling => (false, true),
            Edge::Rising => (true, false),
            Edge::Both => (true, true),
        };
        self.exti.set_edges(pin, rising, falling);
        self.syscfg.route_exti(pin, port.index());
        self.exti.set_unmasked(pin, true);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for pins above 15.
    pub fn mask_line(&self, pin: u8) -> Result<(), Error> {
        check_pin(pin)?;
        self.exti.set_unmasked(pin, false);
        Ok(())
    }

    pub fn is_pending(&self, pin: u8) -> bool {
        pin <= 15 && self.exti.pending() & (1 << pin) != 0
    }

    /// Acknowledges a pending edge on `pin`. Call from the EXTI handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for pins above 15.
    pub fn clear_pending(&self, pin: u8) -> Result<(), Error> {
        check_pin(pin)?;
        if self.is_pending(pin) {
            self.exti.clear_pending(pin);
        }
        Ok(())
    }
}
