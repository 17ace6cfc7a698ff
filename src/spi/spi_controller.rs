// Licensed under the Apache-2.0 license

use crate::common::{log_fmt, poll, Logger, NoOpLogger, TransferState};
use crate::event::{notify, EventHandler};
use crate::registers::spi::{SpiInterrupts, SpiRegisters, SpiStatus};
use crate::spi::{Error, FrameSize, SpiConfig, SpiEvent};

struct TxTransfer<'buf> {
    buf: &'buf [u8],
    sent: usize,
}

struct RxTransfer<'buf> {
    buf: &'buf mut [u8],
    received: usize,
}

/// One SPI peripheral in master mode.
///
/// Transmit and receive interrupt transfers are tracked separately, so a
/// send and a receive may be armed at the same time on a full-duplex bus.
pub struct SpiController<'buf, R: SpiRegisters, L: Logger = NoOpLogger> {
    regs: R,
    config: SpiConfig,
    logger: L,
    tx: Option<TxTransfer<'buf>>,
    rx: Option<RxTransfer<'buf>>,
    completed_rx: Option<&'buf mut [u8]>,
}

fn pack(chunk: &[u8], frame_bytes: usize) -> u16 {
    let lo = chunk.first().copied().unwrap_or(0);
    if frame_bytes == 2 {
        u16::from_le_bytes([lo, chunk.get(1).copied().unwrap_or(0)])
    } else {
        u16::from(lo)
    }
}

fn unpack(frame: u16, dest: &mut [u8]) {
    for (byte, value) in dest.iter_mut().zip(frame.to_le_bytes()) {
        *byte = value;
    }
}

impl<'buf, R: SpiRegisters, L: Logger> SpiController<'buf, R, L> {
    pub fn new(regs: R, config: SpiConfig, logger: L) -> Self {
        Self {
            regs,
            config,
            logger,
            tx: None,
            rx: None,
            completed_rx: None,
        }
    }

    /// Programs CR1 from the configuration. Leaves the peripheral disabled.
    pub fn init(&mut self) {
        self.regs.configure(&self.config);
        log_fmt(
            &mut self.logger,
            false,
            format_args!(
                "spi: {:?} {:?}, {:?}",
                self.config.device_mode, self.config.bus_config, self.config.baud_divider
            ),
        );
    }

    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    pub fn enable(&mut self) {
        self.regs.set_enabled(true);
    }

    /// Waits for the last frame to leave the shift register, then clears SPE.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the bus stays busy past the poll budget.
    pub fn disable(&mut self) -> Result<(), Error> {
        self.wait_for(|sr| !sr.bsy)?;
        self.regs.set_enabled(false);
        Ok(())
    }

    /// Drives the internal NSS level used with software slave management.
    pub fn set_ssi(&mut self, high: bool) {
        self.regs.set_internal_select(high);
    }

    /// Lets the master drive NSS while SPE is set.
    pub fn set_ssoe(&mut self, enabled: bool) {
        self.regs.set_select_output(enabled);
    }

    pub fn is_busy(&self) -> bool {
        self.regs.status().bsy
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

    fn frame_bytes(&self) -> usize {
        match self.config.frame_size {
            FrameSize::Bits8 => 1,
            FrameSize::Bits16 => 2,
        }
    }

    fn ensure_idle(&self) -> Result<(), Error> {
        if self.tx.is_some() || self.rx.is_some() {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn update_interrupts(&self, f: impl FnOnce(&mut SpiInterrupts)) {
        let mut enabled = self.regs.interrupts();
        f(&mut enabled);
        self.regs.set_interrupts(enabled);
    }

    fn wait_for(&self, ready: impl Fn(SpiStatus) -> bool) -> Result<(), Error> {
        poll(self.config.poll_budget, Error::Timeout, || {
            let sr = self.regs.status();
            if sr.modf {
                return Err(nb::Error::Other(Error::ModeFault));
            }
            if ready(sr) {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        })
    }

    /// Polled transmit. The received frames are not collected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while an interrupt transfer is armed,
    /// [`Error::ModeFault`] on MODF and [`Error::Timeout`] if TXE never sets.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure_idle()?;
        let step = self.frame_bytes();
        for chunk in data.chunks(step) {
            self.wait_for(|sr| sr.txe)?;
            self.regs.write_dr(pack(chunk, step));
        }
        Ok(())
    }

    /// Polled receive of `buf.len()` bytes.
    ///
    /// # Errors
    ///
    /// As for [`SpiController::send`], with RXNE in place of TXE.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.ensure_idle()?;
        let step = self.frame_bytes();
        for chunk in buf.chunks_mut(step) {
            self.wait_for(|sr| sr.rxne)?;
            unpack(self.regs.read_dr(), chunk);
        }
        Ok(())
    }

    /// Arms an interrupt-driven send of `data`.
    ///
    /// Returns the transmit state seen on entry. Anything other than
    /// [`TransferState::Ready`] means the request was ignored.
    pub fn send_it(&mut self, data: &'buf [u8]) -> TransferState {
        let state = self.tx_state();
        if state != TransferState::Ready || data.is_empty() {
            return state;
        }
        self.tx = Some(TxTransfer { buf: data, sent: 0 });
        self.update_interrupts(|enabled| enabled.tx = true);
        log_fmt(
            &mut self.logger,
            false,
            format_args!("spi: tx armed, {} bytes", data.len()),
        );
        state
    }

    /// Arms an interrupt-driven receive into `buf`. See [`SpiController::send_it`].
    pub fn receive_it(&mut self, buf: &'buf mut [u8]) -> TransferState {
        let state = self.rx_state();
        if state != TransferState::Ready || buf.is_empty() {
            return state;
        }
        log_fmt(
            &mut self.logger,
            false,
            format_args!("spi: rx armed, {} bytes", buf.len()),
        );
        self.rx = Some(RxTransfer { buf, received: 0 });
        self.update_interrupts(|enabled| {
            enabled.rx = true;
            enabled.error = true;
        });
        state
    }

    /// SPI interrupt entry point.
    pub fn on_interrupt<H: EventHandler<SpiEvent>>(&mut self, handler: &mut H) {
        let mut abort = false;

        if self.regs.status().txe && self.regs.interrupts().tx {
            abort |= self.handle_txe(handler);
        }
        if self.regs.status().rxne && self.regs.interrupts().rx {
            abort |= self.handle_rxne(handler);
        }

        let errie = self.regs.interrupts().error;
        if errie && self.regs.status().ovr && self.tx.is_none() {
            // OVR is left for the application while a send is running.
            self.clear_overrun();
            self.logger.error("spi: overrun");
            abort |= notify(handler, SpiEvent::Overrun);
        }
        if errie && self.regs.status().crcerr {
            self.regs.clear_crc_error();
            self.logger.error("spi: crc error");
            abort |= notify(handler, SpiEvent::CrcError);
        }

        if abort {
            self.abort();
        }
    }

    fn handle_txe<H: EventHandler<SpiEvent>>(&mut self, handler: &mut H) -> bool {
        let step = self.frame_bytes();
        let Some(tx) = self.tx.as_mut() else {
            self.update_interrupts(|enabled| enabled.tx = false);
            return false;
        };
        let chunk = tx.buf.get(tx.sent..).unwrap_or(&[]);
        self.regs.write_dr(pack(chunk, step));
        tx.sent = (tx.sent + step).min(tx.buf.len());
        if tx.sent < tx.buf.len() {
            return false;
        }
        self.close_transmission();
        self.logger.debug("spi: tx complete");
        notify(handler, SpiEvent::TxComplete)
    }

    fn handle_rxne<H: EventHandler<SpiEvent>>(&mut self, handler: &mut H) -> bool {
        let step = self.frame_bytes();
        let Some(rx) = self.rx.as_mut() else {
            self.update_interrupts(|enabled| enabled.rx = false);
            return false;
        };
        let frame = self.regs.read_dr();
        let end = (rx.received + step).min(rx.buf.len());
        if let Some(dest) = rx.buf.get_mut(rx.received..end) {
            unpack(frame, dest);
        }
        rx.received = end;
        if rx.received < rx.buf.len() {
            return false;
        }
        self.close_reception();
        self.logger.debug("spi: rx complete");
        notify(handler, SpiEvent::RxComplete)
    }

    /// Clears OVR with the DR-then-SR read sequence. The frame in DR is lost.
    pub fn clear_overrun(&mut self) {
        let _ = self.regs.read_dr();
        let _ = self.regs.status();
    }

    /// Stops the interrupt-driven send without reporting completion.
    pub fn close_transmission(&mut self) {
        self.update_interrupts(|enabled| enabled.tx = false);
        self.tx = None;
    }

    /// Stops the interrupt-driven receive; the buffer becomes available from
    /// [`SpiController::take_rx_buffer`].
    pub fn close_reception(&mut self) {
        self.update_interrupts(|enabled| {
            enabled.rx = false;
            enabled.error = false;
        });
        if let Some(rx) = self.rx.take() {
            self.completed_rx = Some(rx.buf);
        }
    }

    fn abort(&mut self) {
        self.close_transmission();
        self.close_reception();
        self.logger.debug("spi: transfer aborted");
    }

    /// Buffer of the last receive that finished or was closed.
    pub fn take_rx_buffer(&mut self) -> Option<&'buf mut [u8]> {
        self.completed_rx.take()
    }

    fn exchange(&mut self, out: u8) -> Result<u8, Error> {
        self.wait_for(|sr| sr.txe)?;
        self.regs.write_dr(u16::from(out));
        self.wait_for(|sr| sr.rxne)?;
        let [lo, _] = self.regs.read_dr().to_le_bytes();
        Ok(lo)
    }
}

impl<R: SpiRegisters, L: Logger> embedded_hal::spi::ErrorType for SpiController<'_, R, L> {
    type Error = Error;
}

/// Full-duplex byte transfers. Each word is one frame, so the controller
/// should be configured for 8-bit frames.
impl<R: SpiRegisters, L: Logger> embedded_hal::spi::SpiBus<u8> for SpiController<'_, R, L> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.ensure_idle()?;
        for word in words.iter_mut() {
            *word = self.exchange(0)?;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.ensure_idle()?;
        for &word in words {
            self.exchange(word)?;
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.ensure_idle()?;
        for i in 0..read.len().max(write.len()) {
            let received = self.exchange(write.get(i).copied().unwrap_or(0))?;
            if let Some(slot) = read.get_mut(i) {
                *slot = received;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.ensure_idle()?;
        for word in words.iter_mut() {
            *word = self.exchange(*word)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.wait_for(|sr| !sr.bsy)
    }
}
