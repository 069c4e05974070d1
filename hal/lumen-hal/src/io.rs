//! `embedded-io` bridge
//!
//! Most chip HALs already expose their serial ports through `embedded-io`.
//! [`IoUart`] lets such a port be used wherever the UART traits are expected.

use embedded_io::{Read, ReadReady, Write};

use crate::uart::{UartRx, UartTx};

/// A UART built from an `embedded-io` serial port
pub struct IoUart<T> {
    inner: T,
}

impl<T> IoUart<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Write> UartTx for IoUart<T> {
    type Error = T::Error;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.inner.flush()
    }
}

impl<T: Read + ReadReady> UartRx for IoUart<T> {
    type Error = T::Error;

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.inner.read(buf)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() || !self.inner.read_ready()? {
            return Ok(0);
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory port: reads drain `rx`, writes append to `tx`
    struct MemPort<'a> {
        rx: &'a [u8],
        tx: heapless::Vec<u8, 32>,
    }

    impl embedded_io::ErrorType for MemPort<'_> {
        type Error = core::convert::Infallible;
    }

    impl Read for MemPort<'_> {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = buf.len().min(self.rx.len());
            buf[..n].copy_from_slice(&self.rx[..n]);
            self.rx = &self.rx[n..];
            Ok(n)
        }
    }

    impl ReadReady for MemPort<'_> {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.rx.is_empty())
        }
    }

    impl Write for MemPort<'_> {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            let n = buf.len().min(self.tx.capacity() - self.tx.len());
            let _ = self.tx.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_read_available_drains_then_reports_empty() {
        let mut uart = IoUart::new(MemPort {
            rx: &[1, 2, 3],
            tx: heapless::Vec::new(),
        });
        let mut buf = [0u8; 8];

        assert_eq!(uart.read_available(&mut buf), Ok(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(uart.read_available(&mut buf), Ok(0));
    }

    #[test]
    fn test_write_blocking_writes_everything() {
        let mut uart = IoUart::new(MemPort {
            rx: &[],
            tx: heapless::Vec::new(),
        });
        uart.write_blocking(&[0xAA, 0x55, 0xF0, 0, 0]).unwrap();
        uart.flush().unwrap();
        assert_eq!(uart.inner().tx.as_slice(), &[0xAA, 0x55, 0xF0, 0, 0]);
    }

    #[test]
    fn test_read_byte() {
        let mut uart = IoUart::new(MemPort {
            rx: &[0x42],
            tx: heapless::Vec::new(),
        });
        assert_eq!(uart.read_byte(), Ok(0x42));
    }
}
