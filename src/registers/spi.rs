// Licensed under the Apache-2.0 license

//! SPI register access. SPI2 and SPI3 share SPI1's layout.

use super::device::spi1;
use crate::spi::{BitOrder, BusConfig, DeviceMode, FrameSize, SpiConfig};
use embedded_hal::spi::{Phase, Polarity};

/// Status flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SpiStatus {
    pub rxne: bool,
    pub txe: bool,
    pub crcerr: bool,
    /// Mode fault: NSS pulled low while in master mode.
    pub modf: bool,
    pub ovr: bool,
    pub bsy: bool,
}

/// CR2 interrupt enables.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SpiInterrupts {
    /// TXEIE.
    pub tx: bool,
    /// RXNEIE.
    pub rx: bool,
    /// ERRIE: OVR, MODF and CRCERR.
    pub error: bool,
}

pub trait SpiRegisters {
    /// Writes CR1 from `config` with SPE clear.
    fn configure(&self, config: &SpiConfig);
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// CR1.SSI, the internal NSS level under software slave management.
    fn set_internal_select(&self, high: bool);
    /// CR2.SSOE.
    fn set_select_output(&self, enabled: bool);

    fn interrupts(&self) -> SpiInterrupts;
    fn set_interrupts(&self, enabled: SpiInterrupts);

    fn status(&self) -> SpiStatus;
    fn clear_crc_error(&self);

    fn read_dr(&self) -> u16;
    fn write_dr(&self, frame: u16);
}

impl<T: SpiRegisters + ?Sized> SpiRegisters for &T {
    fn configure(&self, config: &SpiConfig) {
        (**self).configure(config);
    }
    fn set_enabled(&self, enabled: bool) {
        (**self).set_enabled(enabled);
    }
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
    fn set_internal_select(&self, high: bool) {
        (**self).set_internal_select(high);
    }
    fn set_select_output(&self, enabled: bool) {
        (**self).set_select_output(enabled);
    }
    fn interrupts(&self) -> SpiInterrupts {
        (**self).interrupts()
    }
    fn set_interrupts(&self, enabled: SpiInterrupts) {
        (**self).set_interrupts(enabled);
    }
    fn status(&self) -> SpiStatus {
        (**self).status()
    }
    fn clear_crc_error(&self) {
        (**self).clear_crc_error();
    }
    fn read_dr(&self) -> u16 {
        (**self).read_dr()
    }
    fn write_dr(&self, frame: u16) {
        (**self).write_dr(frame);
    }
}

impl SpiRegisters for spi1::RegisterBlock {
    fn configure(&self, config: &SpiConfig) {
        let ssm = config.software_slave_management;
        self.cr1.write(|w| {
            w.cpha()
                .bit(config.mode.phase == Phase::CaptureOnSecondTransition)
                .cpol()
                .bit(config.mode.polarity == Polarity::IdleHigh)
                .mstr()
                .bit(config.device_mode == DeviceMode::Master)
                .br()
                .bits(config.baud_divider as u8)
                .lsbfirst()
                .bit(config.bit_order == BitOrder::LsbFirst)
                .ssm()
                .bit(ssm)
                .ssi()
                .bit(ssm)
                .rxonly()
                .bit(config.bus_config == BusConfig::SimplexRxOnly)
                .dff()
                .bit(config.frame_size == FrameSize::Bits16)
                .bidimode()
                .bit(config.bus_config == BusConfig::HalfDuplex)
                .spe()
                .clear_bit()
        });
    }

    fn set_enabled(&self, enabled: bool) {
        self.cr1.modify(|_, w| w.spe().bit(enabled));
    }

    fn is_enabled(&self) -> bool {
        self.cr1.read().spe().bit_is_set()
    }

    fn set_internal_select(&self, high: bool) {
        self.cr1.modify(|_, w| w.ssi().bit(high));
    }

    fn set_select_output(&self, enabled: bool) {
        self.cr2.modify(|_, w| w.ssoe().bit(enabled));
    }

    fn interrupts(&self) -> SpiInterrupts {
        let cr2 = self.cr2.read();
        SpiInterrupts {
            tx: cr2.txeie().bit_is_set(),
            rx: cr2.rxneie().bit_is_set(),
            error: cr2.errie().bit_is_set(),
        }
    }

    fn set_interrupts(&self, enabled: SpiInterrupts) {
        self.cr2.modify(|_, w| {
            w.txeie()
                .bit(enabled.tx)
                .rxneie()
                .bit(enabled.rx)
                .errie()
                .bit(enabled.error)
        });
    }

    fn status(&self) -> SpiStatus {
        let sr = self.sr.read();
        SpiStatus {
            rxne: sr.rxne().bit_is_set(),
            txe: sr.txe().bit_is_set(),
            crcerr: sr.crcerr().bit_is_set(),
            modf: sr.modf().bit_is_set(),
            ovr: sr.ovr().bit_is_set(),
            bsy: sr.bsy().bit_is_set(),
        }
    }

    fn clear_crc_error(&self) {
        // CRCERR is rc_w0; the read-only flags ignore the write.
        self.sr.modify(|_, w| w.crcerr().clear_bit());
    }

    fn read_dr(&self) -> u16 {
        self.dr.read().dr().bits()
    }

    fn write_dr(&self, frame: u16) {
        self.dr.write(|w| w.dr().bits(frame));
    }
}
