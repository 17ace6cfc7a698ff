// Licensed under the Apache-2.0 license

use crate::common::{log_fmt, poll, Logger, NoOpLogger, TransferState};
use crate::event::{notify, EventHandler};
use crate::registers::usart::{UsartInterrupts, UsartRegisters, UsartStatus};
use crate::usart::{Error, LineError, Oversampling, Parity, UsartConfig, UsartEvent, WordLength};
use fugit::HertzU32;

/// BRR value for `baud` from a `pclk` bus clock.
///
/// USARTDIV is computed in hundredths; the integer part goes to the mantissa
/// and the remainder is rounded to 4 fraction bits (3 with 8x oversampling).
///
/// # Errors
///
/// Returns [`Error::InvalidBaudRate`] for a zero baud rate or a divider that
/// does not fit BRR.
pub fn brr_value(pclk: HertzU32, baud: HertzU32, oversampling: Oversampling) -> Result<u16, Error> {
    let pclk = u64::from(pclk.raw());
    let baud = u64::from(baud.raw());
    if baud == 0 {
        return Err(Error::InvalidBaudRate);
    }
    let usartdiv = match oversampling {
        Oversampling::By16 => 25 * pclk / (4 * baud),
        Oversampling::By8 => 25 * pclk / (2 * baud),
    };
    let mantissa = usartdiv / 100;
    let remainder = usartdiv - mantissa * 100;
    let fraction = match oversampling {
        Oversampling::By16 => ((remainder * 16 + 50) / 100) & 0xF,
        Oversampling::By8 => ((remainder * 8 + 50) / 100) & 0x7,
    };
    if mantissa == 0 || mantissa > 0xFFF {
        return Err(Error::InvalidBaudRate);
    }
    u16::try_from((mantissa << 4) | fraction).map_err(|_| Error::InvalidBaudRate)
}

struct TxTransfer<'buf> {
    buf: &'buf [u8],
    sent: usize,
}

struct RxTransfer<'buf> {
    buf: &'buf mut [u8],
    received: usize,
}

pub struct UsartController<'buf, R: UsartRegisters, L: Logger = NoOpLogger> {
    regs: R,
    config: UsartConfig,
    logger: L,
    tx: Option<TxTransfer<'buf>>,
    rx: Option<RxTransfer<'buf>>,
    completed_rx: Option<&'buf mut [u8]>,
}

impl<'buf, R: UsartRegisters, L: Logger> UsartController<'buf, R, L> {
    pub fn new(regs: R, config: UsartConfig, logger: L) -> Self {
        Self {
            regs,
            config,
            logger,
            tx: None,
            rx: None,
            completed_rx: None,
        }
    }

    /// Programs frame format, stop bits, flow control and the baud rate.
    /// `pclk` is the clock of the bus the instance sits on. The peripheral
    /// stays disabled until [`UsartController::enable`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBaudRate`] if BRR cannot be derived.
    pub fn init(&mut self, pclk: HertzU32) -> Result<(), Error> {
        self.regs.configure(&self.config);
        self.set_baud_rate(pclk)
    }

    /// Recomputes BRR for the configured baud rate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBaudRate`] if BRR cannot be derived.
    pub fn set_baud_rate(&mut self, pclk: HertzU32) -> Result<(), Error> {
        let brr = brr_value(pclk, self.config.baud_rate, self.config.oversampling)?;
        self.regs.write_baud_divider(brr);
        log_fmt(
            &mut self.logger,
            false,
            format_args!("usart: {} baud, brr {brr:#x}", self.config.baud_rate.raw()),
        );
        Ok(())
    }

    pub fn config(&self) -> &UsartConfig {
        &self.config
    }

    pub fn enable(&mut self) {
        self.regs.set_enabled(true);
    }

    pub fn disable(&mut self) {
        self.regs.set_enabled(false);
    }

    fn update_interrupts(&self, f: impl FnOnce(&mut UsartInterrupts)) {
        let mut enabled = self.regs.interrupts();
        f(&mut enabled);
        self.regs.set_interrupts(enabled);
    }

    pub fn set_idle_interrupt(&mut self, enabled: bool) {
        self.update_interrupts(|sources| sources.idle = enabled);
    }

    pub fn set_cts_interrupt(&mut self, enabled: bool) {
        self.update_interrupts(|sources| sources.cts = enabled);
    }

    /// Framing, noise and overrun reporting (EIE).
    pub fn set_error_interrupt(&mut self, enabled: bool) {
        self.update_interrupts(|sources| sources.error = enabled);
    }

    pub fn tx_state(&self) -> TransferState {
        if self.tx.is_some() {
            TransferState::BusyInTx
        } else {
            TransferState::Ready
        }
    }

    pub fn rx_state(&self) -> TransferState {
        if self.rx.is_some() {
            TransferState::BusyInRx
        } else {
            TransferState::Ready
        }
    }

    /// Buffer bytes per USART word: 9-bit words without parity take two.
    fn word_bytes(&self) -> usize {
        if self.config.word_length == WordLength::Bits9 && self.config.parity == Parity::None {
            2
        } else {
            1
        }
    }

    fn encode(&self, chunk: &[u8]) -> u16 {
        let lo = chunk.first().copied().unwrap_or(0);
        if self.word_bytes() == 2 {
            u16::from_le_bytes([lo, chunk.get(1).copied().unwrap_or(0)]) & 0x1FF
        } else {
            u16::from(lo)
        }
    }

    fn decode(&self, word: u16, dest: &mut [u8]) {
        let value = match (self.config.word_length, self.config.parity) {
            (WordLength::Bits9, Parity::None) => word & 0x1FF,
            (WordLength::Bits8, Parity::None) | (WordLength::Bits9, _) => word & 0xFF,
            (WordLength::Bits8, _) => word & 0x7F,
        };
        for (byte, value) in dest.iter_mut().zip(value.to_le_bytes()) {
            *byte = value;
        }
    }

    fn ensure_idle(&self) -> Result<(), Error> {
        if self.tx.is_some() || self.rx.is_some() {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn wait_for(&self, ready: impl Fn(UsartStatus) -> bool) -> Result<(), Error> {
        poll(self.config.poll_budget, Error::Timeout, || {
            if ready(self.regs.status()) {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        })
    }

    /// Polled transmit; returns once the last word has left the line (TC).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while an interrupt transfer is armed and
    /// [`Error::Timeout`] if TXE or TC never sets.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure_idle()?;
        for chunk in data.chunks(self.word_bytes()) {
            self.wait_for(|sr| sr.txe)?;
            self.regs.write_dr(self.encode(chunk));
        }
        self.wait_for(|sr| sr.tc)
    }

    /// Polled receive filling all of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while an interrupt transfer is armed and
    /// [`Error::Timeout`] if a word does not arrive within the poll budget.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.ensure_idle()?;
        let step = self.word_bytes();
        for chunk in buf.chunks_mut(step) {
            self.wait_for(|sr| sr.rxne)?;
            let word = self.regs.read_dr();
            self.decode(word, chunk);
        }
        Ok(())
    }

    /// Arms an interrupt-driven send. Returns the transmit state seen on
    /// entry; anything but [`TransferState::Ready`] means nothing was done.
    pub fn send_it(&mut self, data: &'buf [u8]) -> TransferState {
        let state = self.tx_state();
        if state != TransferState::Ready || data.is_empty() {
            return state;
        }
        self.tx = Some(TxTransfer { buf: data, sent: 0 });
        self.update_interrupts(|sources| {
            sources.txe = true;
            sources.tc = true;
        });
        state
    }

    /// Arms an interrupt-driven receive. See [`UsartController::send_it`].
    pub fn receive_it(&mut self, buf: &'buf mut [u8]) -> TransferState {
        let state = self.rx_state();
        if state != TransferState::Ready || buf.is_empty() {
            return state;
        }
        self.rx = Some(RxTransfer { buf, received: 0 });
        self.update_interrupts(|sources| sources.rxne = true);
        state
    }

    /// USART interrupt entry point.
    ///
    /// ORE, FE and NF are reported but not cleared; the application clears
    /// them with [`UsartController::clear_error_flags`].
    pub fn on_interrupt<H: EventHandler<UsartEvent>>(&mut self, handler: &mut H) {
        let mut abort = false;

        if self.regs.status().tc && self.regs.interrupts().tc {
            let done = self.tx.as_ref().map_or(true, |tx| tx.sent >= tx.buf.len());
            if done {
                self.regs.clear_transmission_complete();
                self.update_interrupts(|sources| sources.tc = false);
                if self.tx.take().is_some() {
                    self.logger.debug("usart: tx complete");
                    abort |= notify(handler, UsartEvent::TxComplete);
                }
            }
        }

        if self.regs.status().txe && self.regs.interrupts().txe {
            self.load_next_word();
        }

        if self.regs.status().rxne && self.regs.interrupts().rxne && self.store_next_word() {
            self.logger.debug("usart: rx complete");
            abort |= notify(handler, UsartEvent::RxComplete);
        }

        if self.regs.status().cts && self.regs.interrupts().cts {
            self.regs.clear_cts();
            abort |= notify(handler, UsartEvent::Cts);
        }

        if self.regs.status().idle && self.regs.interrupts().idle {
            // SR then DR read clears IDLE.
            let _ = self.regs.status();
            let _ = self.regs.read_dr();
            abort |= notify(handler, UsartEvent::Idle);
        }

        let sr = self.regs.status();
        let enabled = self.regs.interrupts();
        if sr.ore {
            if enabled.rxne {
                self.logger.error("usart: overrun");
                abort |= notify(handler, UsartEvent::Overrun);
            } else if enabled.error {
                self.logger.error("usart: overrun");
                abort |= notify(handler, UsartEvent::Error(LineError::Overrun));
            }
        }
        if enabled.error && sr.fe {
            self.logger.error("usart: framing error");
            abort |= notify(handler, UsartEvent::Error(LineError::Framing));
        }
        if enabled.error && sr.nf {
            self.logger.error("usart: noise");
            abort |= notify(handler, UsartEvent::Error(LineError::Noise));
        }

        if abort {
            self.close_transmission();
            self.close_reception();
            self.logger.debug("usart: transfer aborted");
        }
    }

    fn load_next_word(&mut self) {
        let step = self.word_bytes();
        let next = self
            .tx
            .as_ref()
            .and_then(|tx| tx.buf.get(tx.sent..))
            .filter(|rest| !rest.is_empty());
        let Some(rest) = next else {
            self.update_interrupts(|sources| sources.txe = false);
            return;
        };
        let word = self.encode(rest);
        self.regs.write_dr(word);
        if let Some(tx) = self.tx.as_mut() {
            tx.sent = (tx.sent + step).min(tx.buf.len());
            if tx.sent >= tx.buf.len() {
                // TC finishes the transfer.
                self.update_interrupts(|sources| sources.txe = false);
            }
        }
    }

    /// Returns true when the receive buffer has just been filled.
    fn store_next_word(&mut self) -> bool {
        if self.rx.is_none() {
            return false;
        }
        let step = self.word_bytes();
        let word = self.regs.read_dr();
        let mut dest = [0u8; 2];
        self.decode(word, &mut dest);
        let Some(rx) = self.rx.as_mut() else {
            return false;
        };
        let end = (rx.received + step).min(rx.buf.len());
        if let Some(slot) = rx.buf.get_mut(rx.received..end) {
            for (byte, value) in slot.iter_mut().zip(dest) {
                *byte = value;
            }
        }
        rx.received = end;
        if rx.received < rx.buf.len() {
            return false;
        }
        self.close_reception();
        true
    }

    /// Stops an interrupt-driven send without reporting completion.
    pub fn close_transmission(&mut self) {
        self.update_interrupts(|sources| {
            sources.txe = false;
            sources.tc = false;
        });
        self.tx = None;
    }

    /// Stops an interrupt-driven receive; the buffer moves to
    /// [`UsartController::take_rx_buffer`].
    pub fn close_reception(&mut self) {
        self.update_interrupts(|sources| sources.rxne = false);
        if let Some(rx) = self.rx.take() {
            self.completed_rx = Some(rx.buf);
        }
    }

    pub fn take_rx_buffer(&mut self) -> Option<&'buf mut [u8]> {
        self.completed_rx.take()
    }

    /// Clears ORE, NF, FE and IDLE with the SR-then-DR read sequence.
    pub fn clear_error_flags(&mut self) {
        let _ = self.regs.status();
        let _ = self.regs.read_dr();
    }

    pub(crate) fn is_rx_ready(&self) -> bool {
        self.regs.status().rxne
    }

    pub(crate) fn is_tx_empty(&self) -> bool {
        self.regs.status().txe
    }

    pub(crate) fn is_tx_complete(&self) -> bool {
        self.regs.status().tc
    }

    pub(crate) fn read_byte(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        let word = self.regs.read_dr();
        self.decode(word, &mut byte);
        let [value] = byte;
        value
    }

    pub(crate) fn write_byte(&mut self, byte: u8) {
        self.regs.write_dr(u16::from(byte));
    }
}

impl<R: UsartRegisters, L: Logger> embedded_io::ErrorType for UsartController<'_, R, L> {
    type Error = Error;
}

/// Byte-stream access. Each byte is one USART word, so 9-bit framing without
/// parity only carries the low 8 bits here.
impl<R: UsartRegisters, L: Logger> embedded_io::Write for UsartController<'_, R, L> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.ensure_idle()?;
        for &byte in buf {
            self.wait_for(|sr| sr.txe)?;
            self.write_byte(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.wait_for(|sr| sr.tc)
    }
}

impl<R: UsartRegisters, L: Logger> embedded_io::Read for UsartController<'_, R, L> {
    /// Blocks for the first byte, then takes whatever else is already waiting.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.ensure_idle()?;
        let mut count = 0;
        for slot in buf.iter_mut() {
            if count == 0 {
                self.wait_for(|sr| sr.rxne)?;
            } else if !self.is_rx_ready() {
                break;
            }
            *slot = self.read_byte();
            count += 1;
        }
        Ok(count)
    }
}
