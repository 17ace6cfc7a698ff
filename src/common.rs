// Licensed under the Apache-2.0 license

//! Pieces shared by every driver: logging, transfer state and bounded polling.

use core::fmt::Write as _;

/// Minimal logging sink injected into controllers.
pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Logger that discards everything; the default for all controllers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Writes CRLF-terminated log lines to any `embedded_io` sink, typically the
/// console USART.
pub struct UartLogger<W: embedded_io::Write> {
    writer: W,
}

impl<W: embedded_io::Write> UartLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, level: &str, msg: &str) {
        // A console that cannot take the line must not fail the driver call.
        let _ = self.writer.write_all(level.as_bytes());
        let _ = self.writer.write_all(msg.as_bytes());
        let _ = self.writer.write_all(b"\r\n");
    }
}

impl<W: embedded_io::Write> Logger for UartLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.line("[debug] ", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line("[error] ", msg);
    }
}

/// Formats into a fixed buffer so drivers can log values without allocation.
/// Text that does not fit is truncated.
pub(crate) fn log_fmt<L: Logger>(logger: &mut L, error: bool, args: core::fmt::Arguments<'_>) {
    let mut line = LogLine(heapless::String::new());
    let _ = line.write_fmt(args);
    let line = line.0;
    if error {
        logger.error(&line);
    } else {
        logger.debug(&line);
    }
}

struct LogLine(heapless::String<64>);

impl core::fmt::Write for LogLine {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Direction of the transfer a peripheral handle is currently running.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferState {
    Ready,
    BusyInTx,
    BusyInRx,
}

/// How long blocking calls may poll a status flag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PollBudget {
    /// Give up with a timeout error after this many status reads.
    Iterations(u32),
    /// Poll until the flag appears, even if it never does.
    Unbounded,
}

impl PollBudget {
    pub const DEFAULT: Self = Self::Iterations(100_000);
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `f` until it stops returning `WouldBlock`, at most `budget` times.
///
/// # Errors
///
/// Returns the error produced by `f`, or `timeout` once the budget is spent.
pub fn poll<T, E>(
    budget: PollBudget,
    timeout: E,
    mut f: impl FnMut() -> nb::Result<T, E>,
) -> Result<T, E> {
    let mut remaining = match budget {
        PollBudget::Iterations(n) => Some(n),
        PollBudget::Unbounded => None,
    };
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(nb::Error::Other(e)) => return Err(e),
            Err(nb::Error::WouldBlock) => {}
        }
        if let Some(n) = remaining.as_mut() {
            if *n == 0 {
                return Err(timeout);
            }
            *n -= 1;
        }
        core::hint::spin_loop();
    }
}
