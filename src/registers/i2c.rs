// Licensed under the Apache-2.0 license

//! I2C (v1) register access.

use super::device::i2c1;
use crate::i2c::common::{BusError, FmDuty, I2cInterrupts};

/// Status register 1 flags the driver acts on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sr1 {
    /// Start condition generated.
    pub sb: bool,
    /// Address sent and acknowledged (master).
    pub addr: bool,
    /// Byte transfer finished.
    pub btf: bool,
    pub stopf: bool,
    pub rxne: bool,
    pub txe: bool,
    pub berr: bool,
    pub arlo: bool,
    /// Acknowledge failure.
    pub af: bool,
    pub ovr: bool,
    pub timeout: bool,
}

impl Sr1 {
    #[must_use]
    pub const fn has_error(self, error: BusError) -> bool {
        match error {
            BusError::Bus => self.berr,
            BusError::ArbitrationLoss => self.arlo,
            BusError::AckFailure => self.af,
            BusError::Overrun => self.ovr,
            BusError::Timeout => self.timeout,
        }
    }
}

/// Status register 2.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sr2 {
    /// Master mode.
    pub msl: bool,
    pub busy: bool,
    /// Transmitter (as opposed to receiver).
    pub tra: bool,
}

/// What the I2C driver does to the peripheral.
///
/// Status reads are single register accesses: the ADDR and STOPF clear
/// sequences depend on the order in which SR1, SR2, DR and CR1 are touched.
pub trait I2cRegisters {
    /// CR1.PE.
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    fn set_ack(&self, enabled: bool);
    fn start(&self);
    fn stop(&self);
    fn set_software_reset(&self, asserted: bool);

    /// Rewrites CR1 unchanged; the second half of the STOPF clear sequence.
    fn touch_cr1(&self);

    fn interrupts(&self) -> I2cInterrupts;
    /// Sets the interrupt enables to exactly `enabled`, keeping FREQ.
    fn set_interrupts(&self, enabled: I2cInterrupts);

    /// Writes CR2 with FREQ and every interrupt source disabled.
    fn write_freq(&self, mhz: u8);
    /// Programs OAR1 with a 7-bit own address.
    fn write_own_address(&self, address: u8);
    /// Writes CCR. `fast` selects fast mode and its duty cycle.
    fn write_clock_control(&self, ccr: u16, fast: Option<FmDuty>);
    fn write_rise_time(&self, trise: u8);

    fn sr1(&self) -> Sr1;
    fn sr2(&self) -> Sr2;
    /// Clears one SR1 error flag, leaving every other flag alone.
    fn clear_error(&self, error: BusError);

    fn read_dr(&self) -> u8;
    fn write_dr(&self, byte: u8);
}

impl<T: I2cRegisters + ?Sized> I2cRegisters for &T {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
    fn set_enabled(&self, enabled: bool) {
        (**self).set_enabled(enabled);
    }
    fn set_ack(&self, enabled: bool) {
        (**self).set_ack(enabled);
    }
    fn start(&self) {
        (**self).start();
    }
    fn stop(&self) {
        (**self).stop();
    }
    fn set_software_reset(&self, asserted: bool) {
        (**self).set_software_reset(asserted);
    }
    fn touch_cr1(&self) {
        (**self).touch_cr1();
    }
    fn interrupts(&self) -> I2cInterrupts {
        (**self).interrupts()
    }
    fn set_interrupts(&self, enabled: I2cInterrupts) {
        (**self).set_interrupts(enabled);
    }
    fn write_freq(&self, mhz: u8) {
        (**self).write_freq(mhz);
    }
    fn write_own_address(&self, address: u8) {
        (**self).write_own_address(address);
    }
    fn write_clock_control(&self, ccr: u16, fast: Option<FmDuty>) {
        (**self).write_clock_control(ccr, fast);
    }
    fn write_rise_time(&self, trise: u8) {
        (**self).write_rise_time(trise);
    }
    fn sr1(&self) -> Sr1 {
        (**self).sr1()
    }
    fn sr2(&self) -> Sr2 {
        (**self).sr2()
    }
    fn clear_error(&self, error: BusError) {
        (**self).clear_error(error);
    }
    fn read_dr(&self) -> u8 {
        (**self).read_dr()
    }
    fn write_dr(&self, byte: u8) {
        (**self).write_dr(byte);
    }
}

/// Bit 14 of OAR1 has no field of its own but must be kept at 1.
const OAR1_BIT14: u32 = 1 << 14;

impl I2cRegisters for i2c1::RegisterBlock {
    fn is_enabled(&self) -> bool {
        self.cr1.read().pe().bit_is_set()
    }

    fn set_enabled(&self, enabled: bool) {
        self.cr1.modify(|_, w| w.pe().bit(enabled));
    }

    fn set_ack(&self, enabled: bool) {
        self.cr1.modify(|_, w| w.ack().bit(enabled));
    }

    fn start(&self) {
        self.cr1.modify(|_, w| w.start().set_bit());
    }

    fn stop(&self) {
        self.cr1.modify(|_, w| w.stop().set_bit());
    }

    fn set_software_reset(&self, asserted: bool) {
        self.cr1.modify(|_, w| w.swrst().bit(asserted));
    }

    fn touch_cr1(&self) {
        self.cr1.modify(|_, w| w);
    }

    fn interrupts(&self) -> I2cInterrupts {
        let cr2 = self.cr2.read();
        I2cInterrupts {
            buffer: cr2.itbufen().bit_is_set(),
            event: cr2.itevten().bit_is_set(),
            error: cr2.iterren().bit_is_set(),
        }
    }

    fn set_interrupts(&self, enabled: I2cInterrupts) {
        self.cr2.modify(|_, w| {
            w.itbufen()
                .bit(enabled.buffer)
                .itevten()
                .bit(enabled.event)
                .iterren()
                .bit(enabled.error)
        });
    }

    fn write_freq(&self, mhz: u8) {
        self.cr2.write(|w| unsafe { w.freq().bits(mhz) });
    }

    fn write_own_address(&self, address: u8) {
        self.oar1.write(|w| unsafe {
            w.bits(OAR1_BIT14)
                .addmode()
                .clear_bit()
                .add()
                .bits(u16::from(address & 0x7F) << 1)
        });
    }

    fn write_clock_control(&self, ccr: u16, fast: Option<FmDuty>) {
        self.ccr.write(|w| unsafe {
            w.f_s()
                .bit(fast.is_some())
                .duty()
                .bit(fast == Some(FmDuty::SixteenNine))
                .ccr()
                .bits(ccr)
        });
    }

    fn write_rise_time(&self, trise: u8) {
        self.trise.write(|w| w.trise().bits(trise));
    }

    fn sr1(&self) -> Sr1 {
        let sr1 = self.sr1.read();
        Sr1 {
            sb: sr1.sb().bit_is_set(),
            addr: sr1.addr().bit_is_set(),
            btf: sr1.btf().bit_is_set(),
            stopf: sr1.stopf().bit_is_set(),
            rxne: sr1.rx_ne().bit_is_set(),
            txe: sr1.tx_e().bit_is_set(),
            berr: sr1.berr().bit_is_set(),
            arlo: sr1.arlo().bit_is_set(),
            af: sr1.af().bit_is_set(),
            ovr: sr1.ovr().bit_is_set(),
            timeout: sr1.timeout().bit_is_set(),
        }
    }

    fn sr2(&self) -> Sr2 {
        let sr2 = self.sr2.read();
        Sr2 {
            msl: sr2.msl().bit_is_set(),
            busy: sr2.busy().bit_is_set(),
            tra: sr2.tra().bit_is_set(),
        }
    }

    fn clear_error(&self, error: BusError) {
        // Error flags are rc_w0: the other flags are written back as read
        // and so stay set.
        self.sr1.modify(|_, w| match error {
            BusError::Bus => w.berr().clear_bit(),
            BusError::ArbitrationLoss => w.arlo().clear_bit(),
            BusError::AckFailure => w.af().clear_bit(),
            BusError::Overrun => w.ovr().clear_bit(),
            BusError::Timeout => w.timeout().clear_bit(),
        });
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_dr(&self) -> u8 {
        self.dr.read().bits() as u8
    }

    fn write_dr(&self, byte: u8) {
        self.dr.write(|w| unsafe { w.bits(u32::from(byte)) });
    }
}
