// Licensed under the Apache-2.0 license

//! USART register access. UART4/5 and the other USARTs share USART1's
//! layout; the synchronous and flow-control bits UART4/5 lack read as zero.

use super::device::usart1;
use crate::usart::{FlowControl, Oversampling, Parity, UsartConfig, UsartMode, WordLength};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct UsartStatus {
    /// Parity error.
    pub pe: bool,
    /// Framing error.
    pub fe: bool,
    /// Noise detected.
    pub nf: bool,
    pub ore: bool,
    pub idle: bool,
    pub rxne: bool,
    pub tc: bool,
    pub txe: bool,
    pub cts: bool,
}

/// Interrupt enables spread over CR1 and CR3.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct UsartInterrupts {
    pub txe: bool,
    pub tc: bool,
    pub rxne: bool,
    pub idle: bool,
    pub cts: bool,
    /// EIE: framing, noise and overrun while not receiving by interrupt.
    pub error: bool,
}

pub trait UsartRegisters {
    /// Programs frame format, direction, oversampling, stop bits and flow
    /// control. UE and the CR1 interrupt enables end up clear.
    fn configure(&self, config: &UsartConfig);
    /// Writes BRR: mantissa in bits 15:4, fraction in bits 3:0.
    fn write_baud_divider(&self, brr: u16);
    fn baud_divider(&self) -> u16;
    fn set_enabled(&self, enabled: bool);

    fn interrupts(&self) -> UsartInterrupts;
    fn set_interrupts(&self, enabled: UsartInterrupts);

    fn status(&self) -> UsartStatus;
    /// TC and CTS are rc_w0: written to zero, everything else left alone.
    fn clear_transmission_complete(&self);
    fn clear_cts(&self);

    fn read_dr(&self) -> u16;
    fn write_dr(&self, word: u16);
}

impl<T: UsartRegisters + ?Sized> UsartRegisters for &T {
    fn configure(&self, config: &UsartConfig) {
        (**self).configure(config);
    }
    fn write_baud_divider(&self, brr: u16) {
        (**self).write_baud_divider(brr);
    }
    fn baud_divider(&self) -> u16 {
        (**self).baud_divider()
    }
    fn set_enabled(&self, enabled: bool) {
        (**self).set_enabled(enabled);
    }
    fn interrupts(&self) -> UsartInterrupts {
        (**self).interrupts()
    }
    fn set_interrupts(&self, enabled: UsartInterrupts) {
        (**self).set_interrupts(enabled);
    }
    fn status(&self) -> UsartStatus {
        (**self).status()
    }
    fn clear_transmission_complete(&self) {
        (**self).clear_transmission_complete();
    }
    fn clear_cts(&self) {
        (**self).clear_cts();
    }
    fn read_dr(&self) -> u16 {
        (**self).read_dr()
    }
    fn write_dr(&self, word: u16) {
        (**self).write_dr(word);
    }
}

impl UsartRegisters for usart1::RegisterBlock {
    fn configure(&self, config: &UsartConfig) {
        let tx = config.mode != UsartMode::RxOnly;
        let rx = config.mode != UsartMode::TxOnly;
        self.cr1.write(|w| {
            w.te()
                .bit(tx)
                .re()
                .bit(rx)
                .m()
                .bit(config.word_length == WordLength::Bits9)
                .pce()
                .bit(config.parity != Parity::None)
                .ps()
                .bit(config.parity == Parity::Odd)
                .over8()
                .bit(config.oversampling == Oversampling::By8)
        });
        self.cr2
            .modify(|_, w| w.stop().bits(config.stop_bits as u8));
        let (cts, rts) = match config.flow_control {
            FlowControl::None => (false, false),
            FlowControl::Cts => (true, false),
            FlowControl::Rts => (false, true),
            FlowControl::CtsRts => (true, true),
        };
        self.cr3.modify(|_, w| w.ctse().bit(cts).rtse().bit(rts));
    }

    fn write_baud_divider(&self, brr: u16) {
        #[allow(clippy::cast_possible_truncation)]
        let fraction = (brr & 0xF) as u8;
        self.brr.write(|w| {
            w.div_mantissa()
                .bits(brr >> 4)
                .div_fraction()
                .bits(fraction)
        });
    }

    fn baud_divider(&self) -> u16 {
        let brr = self.brr.read();
        (brr.div_mantissa().bits() << 4) | u16::from(brr.div_fraction().bits())
    }

    fn set_enabled(&self, enabled: bool) {
        self.cr1.modify(|_, w| w.ue().bit(enabled));
    }

    fn interrupts(&self) -> UsartInterrupts {
        let cr1 = self.cr1.read();
        let cr3 = self.cr3.read();
        UsartInterrupts {
            txe: cr1.txeie().bit_is_set(),
            tc: cr1.tcie().bit_is_set(),
            rxne: cr1.rxneie().bit_is_set(),
            idle: cr1.idleie().bit_is_set(),
            cts: cr3.ctsie().bit_is_set(),
            error: cr3.eie().bit_is_set(),
        }
    }

    fn set_interrupts(&self, enabled: UsartInterrupts) {
        self.cr1.modify(|_, w| {
            w.txeie()
                .bit(enabled.txe)
                .tcie()
                .bit(enabled.tc)
                .rxneie()
                .bit(enabled.rxne)
                .idleie()
                .bit(enabled.idle)
        });
        self.cr3
            .modify(|_, w| w.ctsie().bit(enabled.cts).eie().bit(enabled.error));
    }

    fn status(&self) -> UsartStatus {
        let sr = self.sr.read();
        UsartStatus {
            pe: sr.pe().bit_is_set(),
            fe: sr.fe().bit_is_set(),
            nf: sr.nf().bit_is_set(),
            ore: sr.ore().bit_is_set(),
            idle: sr.idle().bit_is_set(),
            rxne: sr.rxne().bit_is_set(),
            tc: sr.tc().bit_is_set(),
            txe: sr.txe().bit_is_set(),
            cts: sr.cts().bit_is_set(),
        }
    }

    fn clear_transmission_complete(&self) {
        self.sr.modify(|_, w| w.tc().clear_bit());
    }

    fn clear_cts(&self) {
        self.sr.modify(|_, w| w.cts().clear_bit());
    }

    fn read_dr(&self) -> u16 {
        self.dr.read().dr().bits()
    }

    fn write_dr(&self, word: u16) {
        self.dr.write(|w| w.dr().bits(word & 0x1FF));
    }
}
