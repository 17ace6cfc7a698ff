// Licensed under the Apache-2.0 license

use crate::common::Logger;
use crate::registers::usart::UsartRegisters;
use crate::usart::UsartController;

use core::future::poll_fn;
use core::task::Poll;

/// Async implementation of `embedded_io_async::Read` for `UsartController`.
///
/// Fills the whole buffer, yielding while RXNE is clear.
impl<R: UsartRegisters, L: Logger> embedded_io_async::Read for UsartController<'_, R, L> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        for byte in buf.iter_mut() {
            poll_fn(|cx| {
                if self.is_rx_ready() {
                    *byte = self.read_byte();
                    Poll::Ready(())
                } else {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            })
            .await;
            count += 1;
        }
        Ok(count)
    }
}

/// Async implementation of `embedded_io_async::Write` for `UsartController`.
///
/// Writes one byte each time TXE is set; `flush` waits for TC.
impl<R: UsartRegisters, L: Logger> embedded_io_async::Write for UsartController<'_, R, L> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            poll_fn(|cx| {
                if self.is_tx_empty() {
                    self.write_byte(byte);
                    Poll::Ready(())
                } else {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            })
            .await;
        }
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        poll_fn(|cx| {
            if self.is_tx_complete() {
                Poll::Ready(Ok(()))
            } else {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await
    }
}
