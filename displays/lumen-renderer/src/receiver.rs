//! Receive loops
//!
//! Bytes come in, frames come out, each frame is handled by the session and
//! any reply (ack or pong) goes straight back. The same [`Receiver`] drives a
//! blocking loop over the HAL UART traits or an async loop over
//! `embedded-io-async`.

use heapless::Vec;
use lumen_core::traits::PanelDriver;
use lumen_hal::{UartRx, UartTx};
use lumen_protocol::{FrameError, FrameParser};

use crate::session::{Reply, Session, MAX_REPLY_SIZE};

/// Bytes read from the port per call
pub const RX_CHUNK: usize = 64;

// A chunk completes at most one frame per five bytes plus one carried over
const MAX_REPLIES: usize = RX_CHUNK / 5 + 1;

/// Receive loop errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<R, W> {
    /// Reading from the port failed
    Read(R),
    /// Writing a reply failed
    Write(W),
    /// A reply did not fit its buffer
    Encode(FrameError),
}

/// Frame reassembly state for one serial port
#[derive(Debug, Clone)]
pub struct Receiver {
    parser: FrameParser,
    framing_errors: u32,
}

impl Receiver {
    /// Create a receiver buffering at most `rx_limit` payload bytes
    pub fn new(rx_limit: usize) -> Self {
        Self {
            parser: FrameParser::with_limit(rx_limit),
            framing_errors: 0,
        }
    }

    /// Create a receiver sized for a session's configuration
    pub fn for_session<P: PanelDriver>(session: &Session<P>) -> Self {
        Self::new(session.config().rx_limit as usize)
    }

    /// Headers rejected since start
    pub fn framing_errors(&self) -> u32 {
        self.framing_errors
    }

    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }

    /// Handle whatever is already waiting on the port
    ///
    /// Returns the number of frames handled; `0` when nothing was pending.
    pub fn poll<P, R, T>(
        &mut self,
        rx: &mut R,
        tx: &mut T,
        session: &mut Session<P>,
    ) -> Result<usize, LinkError<R::Error, T::Error>>
    where
        P: PanelDriver,
        R: UartRx,
        T: UartTx,
    {
        let mut buf = [0u8; RX_CHUNK];
        let n = rx.read_available(&mut buf).map_err(LinkError::Read)?;
        if n == 0 {
            return Ok(0);
        }
        self.process_blocking(&buf[..n], tx, session)
    }

    /// Blocking receive loop
    ///
    /// Returns `Ok(())` once a blocking read yields no data, which only
    /// happens when the port has been closed.
    pub fn run_blocking<P, R, T>(
        &mut self,
        rx: &mut R,
        tx: &mut T,
        session: &mut Session<P>,
    ) -> Result<(), LinkError<R::Error, T::Error>>
    where
        P: PanelDriver,
        R: UartRx,
        T: UartTx,
    {
        info!("Blocking receive loop started");
        let mut buf = [0u8; RX_CHUNK];
        loop {
            let n = rx.read_blocking(&mut buf).map_err(LinkError::Read)?;
            if n == 0 {
                info!("Receive port closed");
                return Ok(());
            }
            self.process_blocking::<P, T, R::Error>(&buf[..n], tx, session)?;
        }
    }

    /// Async receive loop
    ///
    /// Returns `Ok(())` at end of stream.
    pub async fn run<P, R, W>(
        &mut self,
        rx: &mut R,
        tx: &mut W,
        session: &mut Session<P>,
    ) -> Result<(), LinkError<R::Error, W::Error>>
    where
        P: PanelDriver,
        R: embedded_io_async::Read,
        W: embedded_io_async::Write,
    {
        info!("Async receive loop started");
        let mut buf = [0u8; RX_CHUNK];
        loop {
            let n = rx.read(&mut buf).await.map_err(LinkError::Read)?;
            if n == 0 {
                info!("Receive stream ended");
                return Ok(());
            }

            let (_, replies) = self.ingest(&buf[..n], session);
            if replies.is_empty() {
                continue;
            }
            for reply in &replies {
                let mut out = [0u8; MAX_REPLY_SIZE];
                let len = reply.encode(&mut out).map_err(LinkError::Encode)?;
                tx.write_all(&out[..len]).await.map_err(LinkError::Write)?;
            }
            tx.flush().await.map_err(LinkError::Write)?;
        }
    }

    fn process_blocking<P, T, E>(
        &mut self,
        bytes: &[u8],
        tx: &mut T,
        session: &mut Session<P>,
    ) -> Result<usize, LinkError<E, T::Error>>
    where
        P: PanelDriver,
        T: UartTx,
    {
        let (handled, replies) = self.ingest(bytes, session);
        if !replies.is_empty() {
            for reply in &replies {
                let mut out = [0u8; MAX_REPLY_SIZE];
                let len = reply.encode(&mut out).map_err(LinkError::Encode)?;
                tx.write_blocking(&out[..len]).map_err(LinkError::Write)?;
            }
            tx.flush().map_err(LinkError::Write)?;
        }
        Ok(handled)
    }

    /// Parse a chunk of at most [`RX_CHUNK`] bytes and handle every frame
    fn ingest<P: PanelDriver>(
        &mut self,
        bytes: &[u8],
        session: &mut Session<P>,
    ) -> (usize, Vec<Reply, MAX_REPLIES>) {
        let mut handled = 0;
        let mut replies = Vec::new();

        for result in self.parser.frames(bytes) {
            match result {
                Ok(frame) => {
                    handled += 1;
                    if let Some(reply) = session.handle_frame(&frame).reply {
                        trace!("Reply {}", reply);
                        if replies.push(reply).is_err() {
                            warn!("Reply queue full, dropped {}", reply);
                        }
                    }
                }
                Err(e) => {
                    self.framing_errors = self.framing_errors.saturating_add(1);
                    warn!("Framing error: {}", e);
                }
            }
        }
        (handled, replies)
    }
}
