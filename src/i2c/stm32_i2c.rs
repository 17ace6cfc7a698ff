// Licensed under the Apache-2.0 license

//! STM32F4 I2C (v1) master.
//!
//! Blocking transfers poll SR1 with a bounded budget. Interrupt-driven
//! transfers are armed with [`Stm32I2c::master_send_it`] or
//! [`Stm32I2c::master_receive_it`] and advanced one bus event at a time by
//! [`Stm32I2c::on_event_interrupt`] and [`Stm32I2c::on_error_interrupt`],
//! which report completion and errors to an [`EventHandler`].

use crate::common::{log_fmt, poll, Logger, NoOpLogger, TransferState};
use crate::event::{notify, EventHandler};
use crate::i2c::common::{
    BusError, FmDuty, I2cConfig, I2cEvent, I2cInterrupts, I2cSpeed, TimingConfig,
};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};
use crate::rcc;
use crate::registers::i2c::{I2cRegisters, Sr1};
use embedded_hal::i2c::{NoAcknowledgeSource, Operation, SevenBitAddress};
use fugit::HertzU32;

/// Interrupt sources armed by interrupt-driven transfers.
pub const TRANSFER_INTERRUPTS: I2cInterrupts = I2cInterrupts::ALL;

/// SR1 error flags in the order they are reported.
const ERROR_FLAGS: [BusError; 5] = [
    BusError::Bus,
    BusError::ArbitrationLoss,
    BusError::AckFailure,
    BusError::Overrun,
    BusError::Timeout,
];

/// Widest divider CCR holds (bits 11:0).
const CCR_MAX: u32 = 0xFFF;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Misplaced START or STOP seen on the bus.
    Bus,
    ArbitrationLoss,
    NoAcknowledge(NoAcknowledgeSource),
    Overrun,
    /// A status flag did not appear within the poll budget.
    Timeout,
    /// An interrupt-driven transfer owns the peripheral.
    Busy,
    /// The source clock cannot produce the requested bus timing.
    InvalidTiming,
    Clock(rcc::Error),
}

impl From<rcc::Error> for Error {
    fn from(error: rcc::Error) -> Self {
        Self::Clock(error)
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::ErrorKind;
        match *self {
            Self::Bus => ErrorKind::Bus,
            Self::ArbitrationLoss => ErrorKind::ArbitrationLoss,
            Self::NoAcknowledge(source) => ErrorKind::NoAcknowledge(source),
            Self::Overrun => ErrorKind::Overrun,
            Self::Timeout | Self::Busy | Self::InvalidTiming | Self::Clock(_) => ErrorKind::Other,
        }
    }
}

/// Register values derived from the source clock and target speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    /// CR2.FREQ, the source clock in MHz.
    pub freq_mhz: u8,
    /// CCR divider.
    pub ccr: u16,
    /// Fast mode and its duty cycle; `None` in standard mode.
    pub fast: Option<FmDuty>,
    pub trise: u8,
    /// SCL frequency these values produce.
    pub scl: HertzU32,
}

/// Computes FREQ, CCR and TRISE.
///
/// Standard mode: t_high = t_low = CCR x t_pclk. Fast mode with duty 2:
/// t_low = 2 x t_high, period 3 x CCR. Duty 16/9: period 25 x CCR.
/// Maximum rise time is 1000 ns in standard mode and 300 ns in fast mode.
///
/// # Errors
///
/// Returns [`Error::InvalidTiming`] when the source clock is outside
/// 2..=50 MHz or the divider does not fit CCR.
pub fn compute_timing(speed: I2cSpeed, timing: &TimingConfig) -> Result<Timing, Error> {
    let pclk = timing.source_clock.raw();
    let freq_mhz = pclk / 1_000_000;
    if !(2..=50).contains(&freq_mhz) {
        return Err(Error::InvalidTiming);
    }
    let scl = speed.hz().raw();

    let (fast, ccr, periods, trise) = if speed.is_fast_mode() {
        let trise = freq_mhz * 300 / 1000 + 1;
        match timing.fm_duty {
            FmDuty::Two => (Some(FmDuty::Two), (pclk / (3 * scl)).max(1), 3, trise),
            FmDuty::SixteenNine => {
                let ccr = (pclk / (25 * scl)).max(1);
                (Some(FmDuty::SixteenNine), ccr, 25, trise)
            }
        }
    } else {
        (None, (pclk / (2 * scl)).max(4), 2, freq_mhz + 1)
    };
    if ccr > CCR_MAX {
        return Err(Error::InvalidTiming);
    }
    let narrow = |value: u32| u8::try_from(value).map_err(|_| Error::InvalidTiming);

    Ok(Timing {
        freq_mhz: narrow(freq_mhz)?,
        ccr: u16::try_from(ccr).map_err(|_| Error::InvalidTiming)?,
        fast,
        trise: narrow(trise)?,
        scl: HertzU32::from_raw(pclk / (periods * ccr)),
    })
}

fn same_direction(a: &Operation<'_>, b: &Operation<'_>) -> bool {
    matches!(
        (a, b),
        (Operation::Read(_), Operation::Read(_)) | (Operation::Write(_), Operation::Write(_))
    )
}

enum Transfer<'buf> {
    Idle,
    Sending {
        buf: &'buf [u8],
        sent: usize,
        address: u8,
        repeated_start: bool,
    },
    Receiving {
        buf: &'buf mut [u8],
        received: usize,
        address: u8,
        repeated_start: bool,
    },
}

impl Transfer<'_> {
    fn state(&self) -> TransferState {
        match self {
            Self::Idle => TransferState::Ready,
            Self::Sending { .. } => TransferState::BusyInTx,
            Self::Receiving { .. } => TransferState::BusyInRx,
        }
    }

    /// Address byte for the pending address phase.
    fn address_byte(&self) -> Option<u8> {
        match *self {
            Self::Idle => None,
            Self::Sending { address, .. } => Some(address << 1),
            Self::Receiving { address, .. } => Some((address << 1) | 1),
        }
    }
}

/// One I2C peripheral in master mode.
///
/// At most one interrupt-driven transfer is in flight. While it is, the
/// buffer belongs to the driver; a completed receive buffer is handed back
/// through [`Stm32I2c::take_rx_buffer`].
pub struct Stm32I2c<'buf, R: I2cRegisters, L: Logger = NoOpLogger> {
    regs: R,
    config: I2cConfig,
    logger: L,
    source_clock: Option<HertzU32>,
    transfer: Transfer<'buf>,
    completed_rx: Option<&'buf mut [u8]>,
}

impl<'buf, R: I2cRegisters, L: Logger> Stm32I2c<'buf, R, L> {
    pub fn new(regs: R, config: I2cConfig, logger: L) -> Self {
        Self {
            regs,
            config,
            logger,
            source_clock: None,
            transfer: Transfer::Idle,
            completed_rx: None,
        }
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    pub fn state(&self) -> TransferState {
        self.transfer.state()
    }

    pub fn enable(&mut self) {
        self.regs.set_enabled(true);
    }

    pub fn disable(&mut self) {
        self.regs.set_enabled(false);
    }

    /// Sets or clears ACK. Only takes effect while PE is set.
    pub fn set_ack(&mut self, enabled: bool) {
        self.regs.set_ack(enabled);
    }

    pub fn generate_stop(&mut self) {
        self.regs.stop();
    }

    fn restore_ack(&self) {
        if self.config.ack {
            self.regs.set_ack(true);
        }
    }

    fn close_interrupts(&self) {
        let enabled = self.regs.interrupts();
        self.regs.set_interrupts(enabled.without(I2cInterrupts::EVENTS));
    }

    /// ADDR clears on an SR1 read followed by an SR2 read.
    fn clear_addr(&self) {
        let _ = self.regs.sr1();
        let _ = self.regs.sr2();
    }

    /// Polls SR1 until `ready`, failing early on bus errors.
    ///
    /// An acknowledge failure releases the bus with STOP before returning.
    fn wait(&self, source: NoAcknowledgeSource, ready: impl Fn(Sr1) -> bool) -> Result<(), Error> {
        poll(self.config.poll_budget, Error::Timeout, || {
            let sr1 = self.regs.sr1();
            if sr1.af {
                self.regs.stop();
                self.regs.clear_error(BusError::AckFailure);
                return Err(nb::Error::Other(Error::NoAcknowledge(source)));
            }
            if sr1.arlo {
                self.regs.clear_error(BusError::ArbitrationLoss);
                return Err(nb::Error::Other(Error::ArbitrationLoss));
            }
            if sr1.berr {
                self.regs.clear_error(BusError::Bus);
                return Err(nb::Error::Other(Error::Bus));
            }
            if ready(sr1) {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        })
    }

    fn address_phase(&self, address: u8, read: bool) -> Result<(), Error> {
        self.regs.start();
        self.wait(NoAcknowledgeSource::Unknown, |sr1| sr1.sb)?;
        self.regs.write_dr((address << 1) | u8::from(read));
        self.wait(NoAcknowledgeSource::Address, |sr1| sr1.addr)
    }

    fn send_phase(
        &self,
        address: u8,
        bytes: impl IntoIterator<Item = u8>,
        stop: bool,
    ) -> Result<(), Error> {
        self.address_phase(address, false)?;
        self.clear_addr();
        let mut written = false;
        for byte in bytes {
            self.wait(NoAcknowledgeSource::Data, |sr1| sr1.txe)?;
            self.regs.write_dr(byte);
            written = true;
        }
        if written {
            // The last byte must leave the shift register before STOP.
            self.wait(NoAcknowledgeSource::Data, |sr1| sr1.txe && sr1.btf)?;
        }
        if stop {
            self.regs.stop();
        }
        Ok(())
    }

    fn receive_phase<'a>(
        &self,
        address: u8,
        len: usize,
        slots: impl IntoIterator<Item = &'a mut u8>,
        stop: bool,
    ) -> Result<(), Error> {
        if len == 0 {
            // No address phase, but a bus held by an earlier phase of the
            // same transaction still has to be released.
            if stop && self.regs.sr2().msl {
                self.regs.stop();
            }
            return Ok(());
        }
        self.address_phase(address, true)?;
        if len == 1 {
            // NACK the only byte: ACK must drop before ADDR is cleared.
            self.regs.set_ack(false);
            self.clear_addr();
            self.wait(NoAcknowledgeSource::Data, |sr1| sr1.rxne)?;
            if stop {
                self.regs.stop();
            }
            let byte = self.regs.read_dr();
            if let Some(slot) = slots.into_iter().next() {
                *slot = byte;
            }
            return Ok(());
        }

        self.clear_addr();
        for (i, slot) in slots.into_iter().take(len).enumerate() {
            self.wait(NoAcknowledgeSource::Data, |sr1| sr1.rxne)?;
            if len - i == 2 {
                self.regs.set_ack(false);
                if stop {
                    self.regs.stop();
                }
            }
            *slot = self.regs.read_dr();
        }
        Ok(())
    }

    /// Logs a failed blocking call and puts the bus back in a usable state.
    fn finish(&mut self, address: u8, result: Result<(), Error>) -> Result<(), Error> {
        self.restore_ack();
        if let Err(error) = result {
            if error == Error::Timeout {
                self.regs.stop();
            }
            log_fmt(
                &mut self.logger,
                true,
                format_args!("i2c: {address:#04x} failed: {error:?}"),
            );
        }
        result
    }

    fn ensure_ready(&self) -> Result<(), Error> {
        if self.state() == TransferState::Ready {
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    /// Blocking write of `bytes` to `address`.
    ///
    /// With `repeated_start` the bus is held after the last byte so the next
    /// transfer starts with a repeated START.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] while an interrupt transfer is armed,
    /// [`Error::NoAcknowledge`] when the slave NACKs (STOP is generated),
    /// [`Error::Timeout`] when a flag does not appear in time.
    pub fn master_send(
        &mut self,
        address: u8,
        bytes: &[u8],
        repeated_start: bool,
    ) -> Result<(), Error> {
        self.ensure_ready()?;
        let result = self.send_phase(address, bytes.iter().copied(), !repeated_start);
        self.finish(address, result)
    }

    /// Blocking read into `buf` from `address`.
    ///
    /// # Errors
    ///
    /// See [`Stm32I2c::master_send`].
    pub fn master_receive(
        &mut self,
        address: u8,
        buf: &mut [u8],
        repeated_start: bool,
    ) -> Result<(), Error> {
        self.ensure_ready()?;
        let len = buf.len();
        let result = self.receive_phase(address, len, buf.iter_mut(), !repeated_start);
        self.finish(address, result)
    }

    /// Arms an interrupt-driven send.
    ///
    /// Returns the state the handle was in. Anything other than
    /// [`TransferState::Ready`] means the request was ignored and no register
    /// was touched. An empty buffer completes at once without bus traffic.
    pub fn master_send_it(
        &mut self,
        buf: &'buf [u8],
        address: u8,
        repeated_start: bool,
    ) -> TransferState {
        let state = self.state();
        if state != TransferState::Ready || buf.is_empty() {
            return state;
        }
        log_fmt(
            &mut self.logger,
            false,
            format_args!("i2c: tx armed {address:#04x} len {}", buf.len()),
        );
        self.transfer = Transfer::Sending {
            buf,
            sent: 0,
            address,
            repeated_start,
        };
        self.arm();
        state
    }

    fn arm(&self) {
        self.regs.start();
        let enabled = self.regs.interrupts();
        self.regs.set_interrupts(enabled.union(TRANSFER_INTERRUPTS));
    }

    /// Arms an interrupt-driven receive. Same contract as
    /// [`Stm32I2c::master_send_it`].
    pub fn master_receive_it(
        &mut self,
        buf: &'buf mut [u8],
        address: u8,
        repeated_start: bool,
    ) -> TransferState {
        let state = self.state();
        if state != TransferState::Ready || buf.is_empty() {
            return state;
        }
        log_fmt(
            &mut self.logger,
            false,
            format_args!("i2c: rx armed {address:#04x} len {}", buf.len()),
        );
        self.transfer = Transfer::Receiving {
            buf,
            received: 0,
            address,
            repeated_start,
        };
        self.arm();
        state
    }

    /// Event interrupt (I2Cx_EV) entry point.
    ///
    /// Each source is acted on only when both its status flag and its
    /// interrupt enable are set.
    pub fn on_event_interrupt<H: EventHandler<I2cEvent>>(&mut self, handler: &mut H) {
        if !self.regs.interrupts().event {
            return;
        }
        let mut abort = false;

        if self.regs.sr1().sb {
            if let Some(byte) = self.transfer.address_byte() {
                self.regs.write_dr(byte);
            }
        }
        if self.regs.sr1().addr {
            self.handle_addr();
        }
        if self.regs.sr1().btf {
            abort |= self.handle_btf(handler);
        }
        if self.regs.sr1().stopf {
            // STOPF clears on the SR1 read above followed by a CR1 write.
            self.regs.touch_cr1();
            abort |= notify(handler, I2cEvent::StopDetected);
        }
        // A transfer closed above has already dropped ITBUFEN.
        let buffer_events = self.regs.interrupts().buffer;
        if buffer_events && self.regs.sr1().txe {
            abort |= self.handle_txe(handler);
        }
        if buffer_events && self.regs.sr1().rxne {
            abort |= self.handle_rxne(handler);
        }

        if abort {
            self.abort_transfer();
        }
    }

    fn handle_addr(&mut self) {
        if let Transfer::Receiving { buf, .. } = &self.transfer {
            if buf.len() == 1 {
                self.regs.set_ack(false);
            }
        }
        self.clear_addr();
    }

    fn handle_btf<H: EventHandler<I2cEvent>>(&mut self, handler: &mut H) -> bool {
        let Transfer::Sending {
            buf,
            sent,
            repeated_start,
            ..
        } = self.transfer
        else {
            return false;
        };
        if sent < buf.len() || !self.regs.sr1().txe {
            return false;
        }
        if !repeated_start {
            self.regs.stop();
        }
        self.close_transmission();
        self.logger.debug("i2c: tx complete");
        notify(handler, I2cEvent::TxComplete)
    }

    fn handle_txe<H: EventHandler<I2cEvent>>(&mut self, handler: &mut H) -> bool {
        let sr2 = self.regs.sr2();
        if sr2.msl {
            if let Transfer::Sending { buf, sent, .. } = &mut self.transfer {
                if let Some(&byte) = buf.get(*sent) {
                    self.regs.write_dr(byte);
                    *sent += 1;
                }
            }
            false
        } else if sr2.tra {
            notify(handler, I2cEvent::DataRequest)
        } else {
            false
        }
    }

    fn handle_rxne<H: EventHandler<I2cEvent>>(&mut self, handler: &mut H) -> bool {
        let sr2 = self.regs.sr2();
        if !sr2.msl {
            return !sr2.tra && notify(handler, I2cEvent::DataReceived);
        }
        let Transfer::Receiving {
            buf,
            received,
            repeated_start,
            ..
        } = &mut self.transfer
        else {
            return false;
        };

        let size = buf.len();
        if *received >= size {
            return false;
        }
        if size > 1 && size - *received == 2 {
            // The byte after this one is the last; it must be NACKed.
            self.regs.set_ack(false);
        }
        let byte = self.regs.read_dr();
        if let Some(slot) = buf.get_mut(*received) {
            *slot = byte;
        }
        *received += 1;
        if *received < size {
            return false;
        }

        if !*repeated_start {
            self.regs.stop();
        }
        self.close_reception();
        self.logger.debug("i2c: rx complete");
        notify(handler, I2cEvent::RxComplete)
    }

    /// Error interrupt (I2Cx_ER) entry point.
    ///
    /// Every raised error flag is cleared and reported once. If the handler
    /// answers [`EventAction::Abort`](crate::event::EventAction::Abort) to any
    /// of them, the transfer is torn down and STOP is generated.
    pub fn on_error_interrupt<H: EventHandler<I2cEvent>>(&mut self, handler: &mut H) {
        if !self.regs.interrupts().error {
            return;
        }
        let mut abort = false;
        for error in ERROR_FLAGS {
            if !self.regs.sr1().has_error(error) {
                continue;
            }
            self.regs.clear_error(error);
            log_fmt(&mut self.logger, true, format_args!("i2c: {error:?}"));
            abort |= notify(handler, I2cEvent::Error(error));
        }
        if abort {
            self.abort_transfer();
        }
    }

    /// Ends whatever transfer is in flight and releases the bus.
    pub fn abort_transfer(&mut self) {
        match self.state() {
            TransferState::BusyInTx => self.close_transmission(),
            TransferState::BusyInRx => self.close_reception(),
            TransferState::Ready => {}
        }
        self.regs.stop();
        self.logger.debug("i2c: transfer aborted");
    }

    /// Drops the send state and stops buffer and event interrupts.
    pub fn close_transmission(&mut self) {
        self.close_interrupts();
        if let Transfer::Sending { .. } = self.transfer {
            self.transfer = Transfer::Idle;
        }
    }

    /// Drops the receive state, keeps the buffer for
    /// [`Stm32I2c::take_rx_buffer`] and re-enables ACK if configured.
    pub fn close_reception(&mut self) {
        self.close_interrupts();
        self.transfer = match core::mem::replace(&mut self.transfer, Transfer::Idle) {
            Transfer::Receiving { buf, .. } => {
                self.completed_rx = Some(buf);
                Transfer::Idle
            }
            other => other,
        };
        self.restore_ack();
    }

    /// Buffer of the last finished or aborted receive.
    pub fn take_rx_buffer(&mut self) -> Option<&'buf mut [u8]> {
        self.completed_rx.take()
    }

    fn transaction_groups(
        &mut self,
        address: u8,
        ops: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let mut groups = ops.chunk_by_mut(same_direction).peekable();
        while let Some(group) = groups.next() {
            let stop = groups.peek().is_none();
            if matches!(group.first(), Some(Operation::Write(_))) {
                let bytes = group
                    .iter()
                    .filter_map(|op| match op {
                        Operation::Write(bytes) => Some(*bytes),
                        Operation::Read(_) => None,
                    })
                    .flatten()
                    .copied();
                self.send_phase(address, bytes, stop)?;
            } else {
                let len: usize = group
                    .iter()
                    .map(|op| match op {
                        Operation::Read(buf) => buf.len(),
                        Operation::Write(_) => 0,
                    })
                    .sum();
                let slots = group
                    .iter_mut()
                    .filter_map(|op| match op {
                        Operation::Read(buf) => Some(buf.iter_mut()),
                        Operation::Write(_) => None,
                    })
                    .flatten();
                self.receive_phase(address, len, slots, stop)?;
            }
        }
        Ok(())
    }
}

impl<R: I2cRegisters, L: Logger> I2cHardwareCore for Stm32I2c<'_, R, L> {
    type Error = Error;

    fn init(&mut self, source_clock: HertzU32) -> Result<(), Error> {
        let timing = TimingConfig {
            source_clock,
            fm_duty: self.config.fm_duty,
        };
        let t = compute_timing(self.config.speed, &timing)?;

        self.regs.set_enabled(false);
        self.regs.write_freq(t.freq_mhz);
        self.regs.write_own_address(self.config.own_address);
        self.regs.write_clock_control(t.ccr, t.fast);
        self.regs.write_rise_time(t.trise);
        self.regs.set_enabled(true);
        // ACK is held in reset while PE is clear.
        self.restore_ack();

        self.source_clock = Some(source_clock);
        self.transfer = Transfer::Idle;
        log_fmt(
            &mut self.logger,
            false,
            format_args!("i2c: init {} MHz, scl {} Hz", t.freq_mhz, t.scl.raw()),
        );
        Ok(())
    }

    fn configure_timing(
        &mut self,
        speed: I2cSpeed,
        timing: &TimingConfig,
    ) -> Result<HertzU32, Error> {
        let t = compute_timing(speed, timing)?;
        let enabled = self.regs.is_enabled();
        // CCR may only be written while the peripheral is disabled.
        self.regs.set_enabled(false);
        self.regs.write_clock_control(t.ccr, t.fast);
        self.regs.write_rise_time(t.trise);
        if enabled {
            self.regs.set_enabled(true);
        }
        Ok(t.scl)
    }

    fn enable_interrupts(&mut self, sources: I2cInterrupts) {
        let enabled = self.regs.interrupts();
        self.regs.set_interrupts(enabled.union(sources));
    }

    fn disable_interrupts(&mut self, sources: I2cInterrupts) {
        let enabled = self.regs.interrupts();
        self.regs.set_interrupts(enabled.without(sources));
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        let source_clock = self.source_clock.ok_or(Error::InvalidTiming)?;
        self.logger.error("i2c: software reset");
        self.transfer = Transfer::Idle;
        self.regs.set_software_reset(true);
        self.regs.set_software_reset(false);
        self.init(source_clock)
    }
}

impl<R: I2cRegisters, L: Logger> I2cMaster<SevenBitAddress> for Stm32I2c<'_, R, L> {
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Error> {
        self.master_send(addr, bytes, false)
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Error> {
        self.master_receive(addr, buffer, false)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.ensure_ready()?;
        let len = buffer.len();
        let result = self
            .send_phase(addr, bytes.iter().copied(), false)
            .and_then(|()| self.receive_phase(addr, len, buffer.iter_mut(), true));
        self.finish(addr, result)
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        self.ensure_ready()?;
        let result = self.transaction_groups(addr, ops_slice);
        self.finish(addr, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PollBudget;
    use crate::i2c::common::I2cConfigBuilder;
    use crate::tests::sim::{BusOp, EventLog, SimI2c};
    use hex_literal::hex;

    const PCLK1: HertzU32 = HertzU32::from_raw(16_000_000);
    const SLAVE: u8 = 0x68;

    fn master<'buf>(sim: &SimI2c) -> Stm32I2c<'buf, &SimI2c> {
        master_with(sim, I2cConfig::default())
    }

    fn master_with<'buf>(sim: &SimI2c, config: I2cConfig) -> Stm32I2c<'buf, &SimI2c> {
        let mut i2c = Stm32I2c::new(sim, config, NoOpLogger);
        i2c.init(PCLK1).unwrap();
        sim.clear_log();
        i2c
    }

    /// Services event interrupts until the transfer finishes.
    fn drive(i2c: &mut Stm32I2c<'_, &SimI2c>, events: &mut EventLog<I2cEvent>) {
        for _ in 0..32 {
            if i2c.state() == TransferState::Ready {
                return;
            }
            i2c.on_event_interrupt(events);
        }
        panic!("transfer did not finish");
    }

    fn written(sim: &SimI2c) -> Vec<u8> {
        sim.log()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Write(byte) => Some(byte),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_standard_mode_timing() {
        let sim = SimI2c::new();
        let _i2c = master(&sim);
        assert_eq!(sim.freq(), 16);
        assert_eq!(sim.clock_control(), (80, None));
        assert_eq!(sim.trise(), 17);
        assert!(sim.enabled());
        assert!(sim.ack());
        assert_eq!(sim.interrupts(), I2cInterrupts::NONE);
    }

    #[test]
    fn test_fast_mode_timing() {
        let fast = TimingConfig {
            source_clock: PCLK1,
            fm_duty: FmDuty::Two,
        };
        let t = compute_timing(I2cSpeed::Fast, &fast).unwrap();
        assert_eq!((t.ccr, t.fast), (13, Some(FmDuty::Two)));
        assert_eq!(t.trise, 5);
        assert_eq!(t.scl.raw(), 410_256);

        let duty = TimingConfig {
            fm_duty: FmDuty::SixteenNine,
            ..fast
        };
        let t = compute_timing(I2cSpeed::Fast, &duty).unwrap();
        assert_eq!((t.ccr, t.fast), (1, Some(FmDuty::SixteenNine)));
        assert_eq!(t.scl.raw(), 640_000);

        let t = compute_timing(
            I2cSpeed::Standard,
            &TimingConfig {
                source_clock: HertzU32::from_raw(42_000_000),
                fm_duty: FmDuty::Two,
            },
        )
        .unwrap();
        assert_eq!((t.freq_mhz, t.ccr, t.fast, t.trise), (42, 210, None, 43));
    }

    #[test]
    fn test_configure_timing_programs_registers() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        let timing = TimingConfig {
            source_clock: PCLK1,
            fm_duty: FmDuty::Two,
        };
        let scl = i2c.configure_timing(I2cSpeed::Fast, &timing).unwrap();
        assert_eq!(scl.raw(), 410_256);
        assert_eq!(sim.clock_control(), (13, Some(FmDuty::Two)));
        assert_eq!(sim.trise(), 5);
        assert!(sim.enabled());
    }

    #[test]
    fn test_source_clock_out_of_range() {
        for hz in [1_000_000, 51_000_000] {
            let timing = TimingConfig {
                source_clock: HertzU32::from_raw(hz),
                fm_duty: FmDuty::Two,
            };
            assert_eq!(
                compute_timing(I2cSpeed::Standard, &timing),
                Err(Error::InvalidTiming)
            );
        }
        let sim = SimI2c::new();
        let mut i2c: Stm32I2c<'_, _> = Stm32I2c::new(&sim, I2cConfig::default(), NoOpLogger);
        assert_eq!(i2c.init(HertzU32::from_raw(1_000_000)), Err(Error::InvalidTiming));
        assert_eq!(i2c.recover_bus(), Err(Error::InvalidTiming));
    }

    #[test]
    fn test_own_address() {
        let sim = SimI2c::new();
        let _i2c = master_with(&sim, I2cConfigBuilder::new().own_address(0x61).build());
        assert_eq!(sim.own_address(), 0x61);
    }

    #[test]
    fn test_blocking_send() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        i2c.master_send(SLAVE, &hex!("10 20 30"), false).unwrap();
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD0),
                BusOp::AddrCleared,
                BusOp::Write(0x10),
                BusOp::Write(0x20),
                BusOp::Write(0x30),
                BusOp::Stop,
            ]
        );
    }

    #[test]
    fn test_send_waits_for_last_byte_before_stop() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        i2c.master_send(SLAVE, &[0x10], false).unwrap();
        assert_eq!(sim.count(BusOp::StopMidByte), 0);
        assert_eq!(sim.count(BusOp::Stop), 1);
        // STOP cleared BTF; the bus is idle again.
        assert!(!sim.flags().btf);
        assert!(!sim.flags().txe);
    }

    #[test]
    fn test_empty_send_addresses_slave_only() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        i2c.master_send(SLAVE, &[], false).unwrap();
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD0),
                BusOp::AddrCleared,
                BusOp::Stop,
            ]
        );
    }

    #[test]
    fn test_send_writes_every_byte_then_one_stop() {
        for len in 1..=8u8 {
            let data: Vec<u8> = (1..=len).collect();
            for repeated_start in [false, true] {
                let expected_stops = usize::from(!repeated_start);
                let context = format!("len {len}, repeated start {repeated_start}");

                let sim = SimI2c::new();
                let mut i2c = master(&sim);
                i2c.master_send(SLAVE, &data, repeated_start).unwrap();
                assert_eq!(written(&sim), data, "blocking, {context}");
                assert_eq!(sim.count(BusOp::Stop), expected_stops, "blocking, {context}");
                assert_eq!(sim.count(BusOp::StopMidByte), 0, "blocking, {context}");

                let sim = SimI2c::new();
                let mut i2c = master(&sim);
                let mut events = EventLog::new();
                assert_eq!(
                    i2c.master_send_it(&data, SLAVE, repeated_start),
                    TransferState::Ready
                );
                drive(&mut i2c, &mut events);
                assert_eq!(written(&sim), data, "interrupt, {context}");
                assert_eq!(sim.count(BusOp::Stop), expected_stops, "interrupt, {context}");
                assert_eq!(sim.count(BusOp::StopMidByte), 0, "interrupt, {context}");
                assert_eq!(events.events, vec![I2cEvent::TxComplete], "{context}");
                if !repeated_start {
                    assert_eq!(sim.log().last(), Some(&BusOp::Stop), "{context}");
                }
            }
        }
    }

    #[test]
    fn test_blocking_receive_single_byte() {
        let sim = SimI2c::new().with_rx(&[0x5A]);
        let mut i2c = master(&sim);
        let mut buf = [0u8; 1];
        i2c.master_receive(SLAVE, &mut buf, false).unwrap();
        assert_eq!(buf, [0x5A]);
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD1),
                BusOp::AckDisabled,
                BusOp::AddrCleared,
                BusOp::Stop,
                BusOp::Read(0x5A),
                BusOp::AckEnabled,
            ]
        );
    }

    #[test]
    fn test_blocking_receive_nacks_last_byte() {
        let sim = SimI2c::new().with_rx(&hex!("01 02 03"));
        let mut i2c = master(&sim);
        let mut buf = [0u8; 3];
        i2c.master_receive(SLAVE, &mut buf, false).unwrap();
        assert_eq!(buf, hex!("01 02 03"));
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD1),
                BusOp::AddrCleared,
                BusOp::Read(0x01),
                BusOp::AckDisabled,
                BusOp::Stop,
                BusOp::Read(0x02),
                BusOp::Read(0x03),
                BusOp::AckEnabled,
            ]
        );
    }

    #[test]
    fn test_empty_receive_from_idle_bus_is_silent() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        i2c.master_receive(SLAVE, &mut [], false).unwrap();
        assert!(sim.log().is_empty());
    }

    #[test]
    fn test_blocking_address_nack() {
        let sim = SimI2c::new().nack_address();
        let mut i2c = master(&sim);
        assert_eq!(
            i2c.master_send(SLAVE, &[0x00], false),
            Err(Error::NoAcknowledge(NoAcknowledgeSource::Address))
        );
        assert_eq!(
            sim.log(),
            vec![BusOp::Start, BusOp::Address(0xD0), BusOp::Stop]
        );
        assert!(!sim.flags().af);
    }

    #[test]
    fn test_blocking_timeout() {
        let sim = SimI2c::new().stuck_start();
        let config = I2cConfigBuilder::new()
            .poll_budget(PollBudget::Iterations(10))
            .build();
        let mut i2c = master_with(&sim, config);
        assert_eq!(i2c.master_send(SLAVE, &[0x00], false), Err(Error::Timeout));
        assert_eq!(sim.log(), vec![BusOp::Start, BusOp::Stop]);
    }

    #[test]
    fn test_write_read_uses_repeated_start() {
        let sim = SimI2c::new().with_rx(&[0x42]);
        let mut i2c = master(&sim);
        let mut buf = [0u8; 1];
        I2cMaster::write_read(&mut i2c, SLAVE, &[0x00], &mut buf).unwrap();
        assert_eq!(buf, [0x42]);
        assert_eq!(sim.count(BusOp::Start), 2);
        assert_eq!(sim.count(BusOp::Stop), 1);
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD0),
                BusOp::AddrCleared,
                BusOp::Write(0x00),
                BusOp::Start,
                BusOp::Address(0xD1),
                BusOp::AckDisabled,
                BusOp::AddrCleared,
                BusOp::Stop,
                BusOp::Read(0x42),
                BusOp::AckEnabled,
            ]
        );
    }

    #[test]
    fn test_write_read_with_empty_read_releases_bus() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        I2cMaster::write_read(&mut i2c, SLAVE, &[0x00], &mut []).unwrap();
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD0),
                BusOp::AddrCleared,
                BusOp::Write(0x00),
                BusOp::Stop,
            ]
        );
        assert!(!sim.master_mode());
    }

    #[test]
    fn test_transaction_ending_in_empty_read_releases_bus() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        let mut ops = [Operation::Write(&[0x01]), Operation::Read(&mut [])];
        i2c.transaction_slice(SLAVE, &mut ops).unwrap();
        assert_eq!(written(&sim), vec![0x01]);
        assert_eq!(sim.count(BusOp::Start), 1);
        assert_eq!(sim.count(BusOp::Stop), 1);
        assert_eq!(sim.log().last(), Some(&BusOp::Stop));
        assert!(!sim.master_mode());
    }

    #[test]
    fn test_transaction_groups_operations() {
        let sim = SimI2c::new().with_rx(&hex!("AA BB"));
        let mut i2c = master(&sim);
        let mut buf = [0u8; 2];
        let mut ops = [
            Operation::Write(&[0x01]),
            Operation::Write(&[0x02]),
            Operation::Read(&mut buf),
        ];
        i2c.transaction_slice(SLAVE, &mut ops).unwrap();
        assert_eq!(buf, hex!("AA BB"));
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD0),
                BusOp::AddrCleared,
                BusOp::Write(0x01),
                BusOp::Write(0x02),
                BusOp::Start,
                BusOp::Address(0xD1),
                BusOp::AddrCleared,
                BusOp::AckDisabled,
                BusOp::Stop,
                BusOp::Read(0xAA),
                BusOp::Read(0xBB),
                BusOp::AckEnabled,
            ]
        );
    }

    #[test]
    fn test_send_it() {
        let sim = SimI2c::new();
        let data = hex!("10 20 30");
        let mut i2c = master(&sim);
        let mut events = EventLog::new();

        assert_eq!(i2c.master_send_it(&data, SLAVE, false), TransferState::Ready);
        assert_eq!(i2c.state(), TransferState::BusyInTx);
        assert_eq!(sim.interrupts(), TRANSFER_INTERRUPTS);

        drive(&mut i2c, &mut events);
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD0),
                BusOp::AddrCleared,
                BusOp::Write(0x10),
                BusOp::Write(0x20),
                BusOp::Write(0x30),
                BusOp::Stop,
            ]
        );
        assert_eq!(events.events, vec![I2cEvent::TxComplete]);
        assert_eq!(sim.interrupts(), I2cInterrupts::ERROR);
    }

    #[test]
    fn test_send_it_repeated_start_holds_bus() {
        let sim = SimI2c::new();
        let data = [0x07];
        let mut i2c = master(&sim);
        let mut events = EventLog::new();

        i2c.master_send_it(&data, SLAVE, true);
        drive(&mut i2c, &mut events);
        assert_eq!(sim.count(BusOp::Write(0x07)), 1);
        assert_eq!(sim.count(BusOp::Stop), 0);
        assert!(sim.master_mode());
        assert_eq!(events.events, vec![I2cEvent::TxComplete]);
    }

    #[test]
    fn test_send_completion_skips_buffer_handlers() {
        let sim = SimI2c::new();
        let data = [0x07];
        let mut i2c = master(&sim);
        let mut events = EventLog::new();

        i2c.master_send_it(&data, SLAVE, true);
        // START, address and the only data byte.
        i2c.on_event_interrupt(&mut events);
        assert_eq!(i2c.state(), TransferState::BusyInTx);
        assert!(sim.flags().txe);

        // BTF completes the send. TXE stays raised because the bus is held
        // for a repeated START.
        let sr2_reads = sim.sr2_reads();
        let log = sim.log();
        i2c.on_event_interrupt(&mut events);
        assert_eq!(i2c.state(), TransferState::Ready);
        assert_eq!(events.events, vec![I2cEvent::TxComplete]);
        assert_eq!(sim.sr2_reads(), sr2_reads);
        assert_eq!(sim.log(), log);
    }

    #[test]
    fn test_receive_it_five_bytes() {
        let sim = SimI2c::new().with_rx(&hex!("01 02 03 04 05"));
        let mut buf = [0u8; 5];
        let mut i2c = master(&sim);
        let mut events = EventLog::new();

        assert_eq!(
            i2c.master_receive_it(&mut buf, SLAVE, false),
            TransferState::Ready
        );
        assert_eq!(i2c.state(), TransferState::BusyInRx);
        drive(&mut i2c, &mut events);

        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD1),
                BusOp::AddrCleared,
                BusOp::Read(0x01),
                BusOp::Read(0x02),
                BusOp::Read(0x03),
                BusOp::AckDisabled,
                BusOp::Read(0x04),
                BusOp::Read(0x05),
                BusOp::Stop,
                BusOp::AckEnabled,
            ]
        );
        assert_eq!(events.events, vec![I2cEvent::RxComplete]);
        assert_eq!(i2c.take_rx_buffer().map(|b| b.to_vec()), Some(hex!("01 02 03 04 05").to_vec()));
        assert!(i2c.take_rx_buffer().is_none());
    }

    #[test]
    fn test_receive_it_single_byte() {
        let sim = SimI2c::new().with_rx(&[0x99]);
        let mut buf = [0u8; 1];
        let mut i2c = master(&sim);
        let mut events = EventLog::new();

        i2c.master_receive_it(&mut buf, SLAVE, false);
        drive(&mut i2c, &mut events);
        assert_eq!(
            sim.log(),
            vec![
                BusOp::Start,
                BusOp::Address(0xD1),
                BusOp::AckDisabled,
                BusOp::AddrCleared,
                BusOp::Read(0x99),
                BusOp::Stop,
                BusOp::AckEnabled,
            ]
        );
        assert_eq!(events.events, vec![I2cEvent::RxComplete]);
    }

    #[test]
    fn test_receive_it_ack_disabled_once_for_every_length() {
        for len in 1..=8usize {
            let data: Vec<u8> = (1..=len as u8).collect();
            let sim = SimI2c::new().with_rx(&data);
            let mut buf = vec![0u8; len];
            let mut i2c = master(&sim);
            let mut events = EventLog::new();

            i2c.master_receive_it(&mut buf, SLAVE, false);
            drive(&mut i2c, &mut events);

            let log = sim.log();
            assert_eq!(sim.count(BusOp::AckDisabled), 1, "len {len}");
            assert_eq!(sim.count(BusOp::Stop), 1, "len {len}");
            let ack_off = sim.position(BusOp::AckDisabled).unwrap();
            let reads_before = log[..ack_off]
                .iter()
                .filter(|op| matches!(op, BusOp::Read(_)))
                .count();
            assert_eq!(reads_before, len.saturating_sub(2), "len {len}");
            let last_read = log.iter().rposition(|op| matches!(op, BusOp::Read(_)));
            assert!(sim.position(BusOp::Stop) > last_read, "len {len}");
            drop(i2c);
            assert_eq!(buf, data);
        }
    }

    #[test]
    fn test_receive_it_repeated_start_skips_stop() {
        let sim = SimI2c::new().with_rx(&hex!("01 02"));
        let mut buf = [0u8; 2];
        let mut i2c = master(&sim);
        let mut events = EventLog::new();

        i2c.master_receive_it(&mut buf, SLAVE, true);
        drive(&mut i2c, &mut events);
        assert_eq!(sim.count(BusOp::Stop), 0);
        assert_eq!(events.events, vec![I2cEvent::RxComplete]);
    }

    #[test]
    fn test_arming_while_busy_is_ignored() {
        let sim = SimI2c::new();
        let first = [0x01, 0x02];
        let second = [0x03];
        let mut rx = [0u8; 4];
        let mut i2c = master(&sim);

        i2c.master_send_it(&first, SLAVE, false);
        let log = sim.log();
        let control = (sim.enabled(), sim.ack(), sim.interrupts());

        assert_eq!(
            i2c.master_send_it(&second, 0x50, false),
            TransferState::BusyInTx
        );
        assert_eq!(
            i2c.master_receive_it(&mut rx, 0x50, false),
            TransferState::BusyInTx
        );
        assert_eq!(i2c.master_send(0x50, &second, false), Err(Error::Busy));
        assert_eq!(sim.log(), log);
        assert_eq!((sim.enabled(), sim.ack(), sim.interrupts()), control);
    }

    #[test]
    fn test_empty_transfer_completes_without_bus_traffic() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        assert_eq!(i2c.master_send_it(&[], SLAVE, false), TransferState::Ready);
        assert_eq!(i2c.state(), TransferState::Ready);
        assert!(sim.log().is_empty());
    }

    #[test]
    fn test_error_interrupt_reports_each_flag_once() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        let mut events = EventLog::new();
        i2c.enable_interrupts(I2cInterrupts::ERROR);

        sim.raise(Sr1 {
            berr: true,
            af: true,
            timeout: true,
            ..Sr1::default()
        });
        i2c.on_error_interrupt(&mut events);
        assert_eq!(
            events.events,
            vec![
                I2cEvent::Error(BusError::Bus),
                I2cEvent::Error(BusError::AckFailure),
                I2cEvent::Error(BusError::Timeout),
            ]
        );
        assert!(ERROR_FLAGS.iter().all(|e| !sim.flags().has_error(*e)));

        i2c.on_error_interrupt(&mut events);
        assert_eq!(events.events.len(), 3);

        sim.raise(Sr1 {
            arlo: true,
            ovr: true,
            ..Sr1::default()
        });
        i2c.on_error_interrupt(&mut events);
        assert_eq!(
            events.events[3..],
            [
                I2cEvent::Error(BusError::ArbitrationLoss),
                I2cEvent::Error(BusError::Overrun),
            ]
        );
    }

    #[test]
    fn test_error_interrupt_keeps_transfer_flags() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        let mut events = EventLog::new();
        i2c.enable_interrupts(I2cInterrupts::ERROR);

        sim.raise(Sr1 {
            txe: true,
            addr: true,
            af: true,
            berr: true,
            ..Sr1::default()
        });
        i2c.on_error_interrupt(&mut events);
        assert_eq!(events.events.len(), 2);

        let flags = sim.flags();
        assert!(flags.txe);
        assert!(flags.addr);
        assert!(!flags.af && !flags.berr);
    }

    #[test]
    fn test_error_interrupt_masked() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        let mut events = EventLog::new();

        sim.raise(Sr1 {
            af: true,
            ..Sr1::default()
        });
        i2c.on_error_interrupt(&mut events);
        assert!(events.events.is_empty());
        assert!(sim.flags().af);
    }

    #[test]
    fn test_ack_failure_abort_releases_bus() {
        let sim = SimI2c::new().nack_address();
        let data = [0x01];
        let mut i2c = master(&sim);
        let mut events = EventLog::aborting_on(I2cEvent::Error(BusError::AckFailure));

        i2c.master_send_it(&data, SLAVE, false);
        i2c.on_event_interrupt(&mut events);
        assert!(sim.flags().af);

        i2c.on_error_interrupt(&mut events);
        assert_eq!(events.events, vec![I2cEvent::Error(BusError::AckFailure)]);
        assert_eq!(i2c.state(), TransferState::Ready);
        assert_eq!(
            sim.log(),
            vec![BusOp::Start, BusOp::Address(0xD0), BusOp::Stop]
        );
        assert_eq!(sim.interrupts(), I2cInterrupts::ERROR);
    }

    #[test]
    fn test_ack_failure_continue_leaves_transfer() {
        let sim = SimI2c::new().nack_address();
        let data = [0x01];
        let mut i2c = master(&sim);
        let mut events = EventLog::new();

        i2c.master_send_it(&data, SLAVE, false);
        i2c.on_event_interrupt(&mut events);
        i2c.on_error_interrupt(&mut events);
        assert_eq!(i2c.state(), TransferState::BusyInTx);
        assert_eq!(sim.count(BusOp::Stop), 0);

        i2c.abort_transfer();
        assert_eq!(i2c.state(), TransferState::Ready);
        assert_eq!(sim.count(BusOp::Stop), 1);
    }

    #[test]
    fn test_full_event_queue_aborts_transfer() {
        use heapless::spsc::Queue;

        let sim = SimI2c::new().nack_address();
        let data = [0x01];
        let mut queue: Queue<I2cEvent, 2> = Queue::new();
        let (mut producer, mut consumer) = queue.split();
        producer.enqueue(I2cEvent::TxComplete).unwrap();
        let mut i2c = master(&sim);

        i2c.master_send_it(&data, SLAVE, false);
        i2c.on_event_interrupt(&mut producer);
        i2c.on_error_interrupt(&mut producer);

        assert_eq!(i2c.state(), TransferState::Ready);
        assert_eq!(sim.count(BusOp::Stop), 1);
        assert_eq!(consumer.dequeue(), Some(I2cEvent::TxComplete));
        assert_eq!(consumer.dequeue(), None);
    }

    #[test]
    fn test_error_event_then_abort_from_thread_mode() {
        use crate::irq::IsrCell;
        use heapless::spsc::Queue;

        let sim = SimI2c::new().nack_address();
        let mut buf = [0u8; 2];
        let mut queue: Queue<I2cEvent, 4> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let context = IsrCell::new();

        let mut i2c = master(&sim);
        i2c.master_receive_it(&mut buf, SLAVE, false);
        context.register((i2c, producer));

        // Interrupt entries: address byte goes out, the slave NACKs it.
        context.with(|ctx| ctx.0.on_event_interrupt(&mut ctx.1));
        context.with(|ctx| ctx.0.on_error_interrupt(&mut ctx.1));
        assert_eq!(
            consumer.dequeue(),
            Some(I2cEvent::Error(BusError::AckFailure))
        );
        // A queued error does not end the transfer by itself.
        assert_eq!(
            context.with(|ctx| ctx.0.state()),
            Some(TransferState::BusyInRx)
        );
        assert_eq!(sim.count(BusOp::Stop), 0);

        context.with(|ctx| ctx.0.abort_transfer());
        assert_eq!(
            context.with(|ctx| ctx.0.state()),
            Some(TransferState::Ready)
        );
        assert_eq!(sim.count(BusOp::Stop), 1);
        assert!(!sim.master_mode());
        assert_eq!(sim.interrupts(), I2cInterrupts::ERROR);
        assert!(context
            .with(|ctx| ctx.0.take_rx_buffer())
            .flatten()
            .is_some());
    }

    #[test]
    fn test_slave_side_events() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        let mut events = EventLog::new();
        i2c.enable_interrupts(I2cInterrupts::EVENTS);

        sim.raise(Sr1 {
            stopf: true,
            rxne: true,
            ..Sr1::default()
        });
        i2c.on_event_interrupt(&mut events);
        assert_eq!(
            events.events,
            vec![I2cEvent::StopDetected, I2cEvent::DataReceived]
        );
        assert!(!sim.flags().stopf);
    }

    #[test]
    fn test_event_interrupt_masked() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        let mut events = EventLog::new();
        sim.raise(Sr1 {
            stopf: true,
            ..Sr1::default()
        });
        i2c.on_event_interrupt(&mut events);
        assert!(events.events.is_empty());
    }

    #[test]
    fn test_disable_interrupts_keeps_other_sources() {
        let sim = SimI2c::new();
        let mut i2c = master(&sim);
        i2c.enable_interrupts(I2cInterrupts::ALL);
        i2c.disable_interrupts(I2cInterrupts::EVENTS);
        assert_eq!(sim.interrupts(), I2cInterrupts::ERROR);
        assert_eq!(sim.freq(), 16);
    }

    #[test]
    fn test_recover_bus_reinitializes() {
        let sim = SimI2c::new();
        let data = [0x01];
        let mut i2c = master(&sim);
        i2c.master_send_it(&data, SLAVE, false);
        i2c.recover_bus().unwrap();
        assert_eq!(i2c.state(), TransferState::Ready);
        assert_eq!(sim.clock_control(), (80, None));
        assert!(sim.enabled());
        assert!(!sim.software_reset());
        assert_eq!(sim.software_resets(), 1);
    }

    #[test]
    fn test_error_kinds() {
        use embedded_hal::i2c::{Error as _, ErrorKind};
        assert_eq!(Error::Bus.kind(), ErrorKind::Bus);
        assert_eq!(
            Error::NoAcknowledge(NoAcknowledgeSource::Data).kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
        );
        assert_eq!(Error::Timeout.kind(), ErrorKind::Other);
        assert_eq!(
            Error::from(rcc::Error::InvalidPllConfig),
            Error::Clock(rcc::Error::InvalidPllConfig)
        );
    }
}
