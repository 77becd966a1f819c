//! # Wired Port Servicing
//!
//! Glue between a UART and the two wired ring channels. These functions are
//! what the UART interrupt (or an executor task) runs: they only move bytes
//! between the hardware FIFO and the rings, never touch framing or radio
//! state, and never block.
//!
//! ```text
//!  UART RX FIFO ──service_rx──► wired-in ring  ──► tick
//!  UART TX FIFO ◄─service_tx─── wired-out ring ◄── radio receive
//! ```

use embedded_io::{Read, ReadReady, Write, WriteReady};

use crate::ring::Consumer;
use crate::traits::ByteSink;

/// Bytes moved per service call, the depth of the hardware FIFO
pub const HW_FIFO_DEPTH: usize = 128;

/// Drain the UART receive FIFO into the wired-in channel
///
/// Bytes that do not fit in the ring are dropped and counted by it. Stops
/// when the UART has nothing ready or a FIFO's worth has been moved.
/// Returns the number of bytes taken from the UART.
pub fn service_rx<U, S>(uart: &mut U, wired_in: &mut S) -> Result<usize, U::Error>
where
    U: Read + ReadReady,
    S: ByteSink + ?Sized,
{
    let mut chunk = [0u8; HW_FIFO_DEPTH];
    let mut total = 0;

    while total < HW_FIFO_DEPTH && uart.read_ready()? {
        let n = uart.read(&mut chunk[..HW_FIFO_DEPTH - total])?;
        if n == 0 {
            break;
        }
        wired_in.write(&chunk[..n]);
        total += n;
    }

    Ok(total)
}

/// Refill the UART transmit FIFO from the wired-out channel
///
/// Only bytes the UART accepted are removed from the ring. Returns the number
/// of bytes written.
pub fn service_tx<U, const N: usize>(
    uart: &mut U,
    wired_out: &mut Consumer<'_, N>,
) -> Result<usize, U::Error>
where
    U: Write + WriteReady,
{
    let mut sent = 0;

    while sent < HW_FIFO_DEPTH && uart.write_ready()? {
        let view = wired_out.peek();
        if view.is_empty() {
            break;
        }
        let len = view.first.len().min(HW_FIFO_DEPTH - sent);
        let n = uart.write(&view.first[..len])?;
        wired_out.consume(n);
        sent += n;
        if n == 0 {
            break;
        }
    }

    Ok(sent)
}

/// Async variant of [`service_tx`] for executor-driven firmware
///
/// Writes everything currently in the wired-out channel, then flushes.
pub async fn flush_outbound<U, const N: usize>(
    uart: &mut U,
    wired_out: &mut Consumer<'_, N>,
) -> Result<usize, U::Error>
where
    U: embedded_io_async::Write,
{
    let mut sent = 0;

    loop {
        let view = wired_out.peek();
        if view.is_empty() {
            break;
        }
        let n = uart.write(view.first).await?;
        wired_out.consume(n);
        sent += n;
        if n == 0 {
            break;
        }
    }

    if sent > 0 {
        uart.flush().await?;
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingChannel;
    use core::convert::Infallible;
    use embedded_io::ErrorType;

    /// Hardware FIFO stand-in: `rx` feeds reads, `tx` collects writes
    /// with at most `tx_room` bytes accepted per call
    struct MockUart {
        rx: std::vec::Vec<u8>,
        tx: std::vec::Vec<u8>,
        tx_room: usize,
    }

    impl MockUart {
        fn new(rx: &[u8]) -> Self {
            Self {
                rx: rx.to_vec(),
                tx: std::vec::Vec::new(),
                tx_room: usize::MAX,
            }
        }
    }

    impl ErrorType for MockUart {
        type Error = Infallible;
    }

    impl Read for MockUart {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
            let n = buf.len().min(self.rx.len()).min(16);
            buf[..n].copy_from_slice(&self.rx[..n]);
            self.rx.drain(..n);
            Ok(n)
        }
    }

    impl ReadReady for MockUart {
        fn read_ready(&mut self) -> Result<bool, Infallible> {
            Ok(!self.rx.is_empty())
        }
    }

    impl Write for MockUart {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
            let n = buf.len().min(self.tx_room);
            self.tx.extend_from_slice(&buf[..n]);
            self.tx_room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    impl WriteReady for MockUart {
        fn write_ready(&mut self) -> Result<bool, Infallible> {
            Ok(self.tx_room > 0)
        }
    }

    impl embedded_io_async::Write for MockUart {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
            // short writes to exercise the loop
            let n = buf.len().min(5);
            self.tx.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        async fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[test]
    fn test_service_rx_moves_bytes() {
        let mut ring = RingChannel::<64>::new();
        let (mut wired_in, mut rx) = ring.split();
        let mut uart = MockUart::new(b"\x00\x03abc");

        assert_eq!(service_rx(&mut uart, &mut wired_in), Ok(5));
        let mut buf = [0u8; 8];
        let n = rx.read(&mut buf);
        assert_eq!(&buf[..n], b"\x00\x03abc");
    }

    #[test]
    fn test_service_rx_is_bounded_and_lossy() {
        let mut ring = RingChannel::<64>::new();
        let (mut wired_in, rx) = ring.split();
        let mut uart = MockUart::new(&[0x55; 300]);

        // one FIFO's worth per call
        assert_eq!(service_rx(&mut uart, &mut wired_in), Ok(HW_FIFO_DEPTH));
        assert_eq!(uart.rx.len(), 300 - HW_FIFO_DEPTH);
        // ring holds 63, the rest was dropped and counted
        assert_eq!(rx.available(), 63);
        assert_eq!(wired_in.overflow_count(), (HW_FIFO_DEPTH - 63) as u32);
    }

    #[test]
    fn test_service_tx_consumes_only_accepted() {
        let mut ring = RingChannel::<64>::new();
        let (mut tx, mut wired_out) = ring.split();
        tx.write(b"0123456789");

        let mut uart = MockUart::new(&[]);
        uart.tx_room = 4;
        assert_eq!(service_tx(&mut uart, &mut wired_out), Ok(4));
        assert_eq!(uart.tx, b"0123");
        assert_eq!(wired_out.available(), 6);

        uart.tx_room = 100;
        assert_eq!(service_tx(&mut uart, &mut wired_out), Ok(6));
        assert_eq!(uart.tx, b"0123456789");
        assert_eq!(wired_out.available(), 0);
    }

    #[test]
    fn test_service_tx_across_wrap() {
        let mut ring = RingChannel::<16>::new();
        let (mut tx, mut wired_out) = ring.split();
        tx.write(&[0; 12]);
        wired_out.consume(12);
        tx.write(b"abcdefgh");

        let mut uart = MockUart::new(&[]);
        assert_eq!(service_tx(&mut uart, &mut wired_out), Ok(8));
        assert_eq!(uart.tx, b"abcdefgh");
    }

    #[tokio::test]
    async fn test_flush_outbound() {
        let mut ring = RingChannel::<32>::new();
        let (mut tx, mut wired_out) = ring.split();
        tx.write(&[0x00, 0x0C]);
        tx.write(b"hello, radio");

        let mut uart = MockUart::new(&[]);
        assert_eq!(flush_outbound(&mut uart, &mut wired_out).await, Ok(14));
        assert_eq!(&uart.tx[..2], &[0x00, 0x0C]);
        assert_eq!(&uart.tx[2..], b"hello, radio");
        assert_eq!(wired_out.available(), 0);
    }
}
