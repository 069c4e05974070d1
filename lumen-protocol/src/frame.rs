//! Frame encoding and decoding for the Lumen link.
//!
//! Frame format:
//! - SYNC0 (1 byte): 0xAA
//! - SYNC1 (1 byte): 0x55
//! - OPCODE (1 byte): instruction identifier
//! - LENGTH (2 bytes): payload length, little-endian
//! - PAYLOAD (LENGTH bytes): opcode-specific data
//!
//! No escaping and no checksum. A receiver resynchronises by sliding a
//! one-byte window over the stream until it sees SYNC0 followed by SYNC1.

use heapless::Vec;

/// First frame synchronization byte
pub const SYNC0: u8 = 0xAA;

/// Second frame synchronization byte
pub const SYNC1: u8 = 0x55;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 4096;

/// Frame header size (SYNC0 + SYNC1 + OPCODE + LENGTH)
pub const HEADER_SIZE: usize = 5;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Receive buffer limit used by [`FrameParser::new`]
pub const DEFAULT_RX_LIMIT: usize = 2048;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Declared length exceeds what the receiver buffers; parser rescanned
    Oversize {
        /// Length field as received
        declared: u16,
    },
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opcode byte
    pub opcode: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a new frame with the given opcode and payload
    pub fn new(opcode: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            opcode,
            payload: payload_vec,
        })
    }

    /// Create a frame with no payload
    pub fn empty(opcode: u8) -> Self {
        Self {
            opcode,
            payload: Vec::new(),
        }
    }

    /// Total encoded size of this frame
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        encode(self.opcode, &self.payload, buffer)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut vec = Vec::new();
        vec.resize(self.encoded_len(), 0)
            .map_err(|_| FrameError::BufferTooSmall)?;
        self.encode(&mut vec)?;
        Ok(vec)
    }
}

/// Encode an opcode and payload straight into `buffer`
///
/// Returns the number of bytes written.
pub fn encode(opcode: u8, payload: &[u8], buffer: &mut [u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge);
    }
    let frame_len = HEADER_SIZE + payload.len();
    if buffer.len() < frame_len {
        return Err(FrameError::BufferTooSmall);
    }

    let length = (payload.len() as u16).to_le_bytes();
    buffer[0] = SYNC0;
    buffer[1] = SYNC1;
    buffer[2] = opcode;
    buffer[3] = length[0];
    buffer[4] = length[1];
    buffer[HEADER_SIZE..frame_len].copy_from_slice(payload);

    Ok(frame_len)
}

/// State machine for parsing incoming frames
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    buffer: Vec<u8, MAX_PAYLOAD_SIZE>,
    opcode: u8,
    length_lo: u8,
    expected_length: u16,
    limit: u16,
    discarded: u32,
    desyncs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Sliding over the stream looking for SYNC0
    WaitingForSync0,
    /// Got SYNC0, waiting for SYNC1
    WaitingForSync1,
    /// Got sync pattern, waiting for OPCODE
    WaitingForOpcode,
    /// Waiting for LENGTH low byte
    WaitingForLengthLo,
    /// Waiting for LENGTH high byte
    WaitingForLengthHi,
    /// Reading payload bytes
    ReadingPayload,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser with the default receive limit
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_RX_LIMIT)
    }

    /// Create a parser that buffers at most `limit` payload bytes
    ///
    /// The limit is clamped to [`MAX_PAYLOAD_SIZE`].
    pub fn with_limit(limit: usize) -> Self {
        Self {
            state: ParseState::WaitingForSync0,
            buffer: Vec::new(),
            opcode: 0,
            length_lo: 0,
            expected_length: 0,
            limit: limit.min(MAX_PAYLOAD_SIZE) as u16,
            discarded: 0,
            desyncs: 0,
        }
    }

    /// Reset the parser state
    ///
    /// Statistics are kept.
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForSync0;
        self.buffer.clear();
        self.opcode = 0;
        self.length_lo = 0;
        self.expected_length = 0;
    }

    /// Largest payload this parser accepts
    pub fn limit(&self) -> usize {
        self.limit as usize
    }

    /// Bytes thrown away while searching for a sync pattern
    pub fn discarded_bytes(&self) -> u32 {
        self.discarded
    }

    /// Number of headers rejected because of an oversize length field
    pub fn desync_count(&self) -> u32 {
        self.desyncs
    }

    /// Whether the parser is in the middle of a frame
    pub fn is_mid_frame(&self) -> bool {
        self.state != ParseState::WaitingForSync0
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` when a header was
    /// rejected and the parser went back to scanning.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::WaitingForSync0 => {
                self.scan(byte);
                Ok(None)
            }
            ParseState::WaitingForSync1 => {
                if byte == SYNC1 {
                    self.state = ParseState::WaitingForOpcode;
                } else if byte == SYNC0 {
                    // The new byte may itself start the pattern; drop only the old one
                    self.discarded = self.discarded.saturating_add(1);
                } else {
                    self.discarded = self.discarded.saturating_add(2);
                    self.state = ParseState::WaitingForSync0;
                }
                Ok(None)
            }
            ParseState::WaitingForOpcode => {
                self.opcode = byte;
                self.state = ParseState::WaitingForLengthLo;
                Ok(None)
            }
            ParseState::WaitingForLengthLo => {
                self.length_lo = byte;
                self.state = ParseState::WaitingForLengthHi;
                Ok(None)
            }
            ParseState::WaitingForLengthHi => {
                let declared = u16::from_le_bytes([self.length_lo, byte]);
                if declared > self.limit {
                    self.rescan_header(byte);
                    return Err(FrameError::Oversize { declared });
                }

                self.expected_length = declared;
                self.buffer.clear();
                if declared == 0 {
                    return Ok(Some(self.take_frame()));
                }
                self.state = ParseState::ReadingPayload;
                Ok(None)
            }
            ParseState::ReadingPayload => {
                // Cannot overflow: expected_length <= limit <= capacity
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.expected_length as usize {
                    return Ok(Some(self.take_frame()));
                }
                Ok(None)
            }
        }
    }

    /// Iterate over every frame (or framing error) contained in `bytes`
    ///
    /// All bytes are consumed; a partial frame at the end stays buffered for
    /// the next call.
    pub fn frames<'p, 'b>(&'p mut self, bytes: &'b [u8]) -> Frames<'p, 'b> {
        Frames {
            parser: self,
            bytes,
            pos: 0,
        }
    }

    fn scan(&mut self, byte: u8) {
        if byte == SYNC0 {
            self.state = ParseState::WaitingForSync1;
        } else {
            self.discarded = self.discarded.saturating_add(1);
        }
    }

    /// Drop the rejected header's SYNC0 and rescan the bytes after it
    fn rescan_header(&mut self, length_hi: u8) {
        let replay = [SYNC1, self.opcode, self.length_lo, length_hi];
        self.desyncs = self.desyncs.saturating_add(1);
        self.discarded = self.discarded.saturating_add(1);
        self.reset();

        for byte in replay {
            match self.state {
                ParseState::WaitingForSync0 => self.scan(byte),
                ParseState::WaitingForSync1 if byte == SYNC1 => {
                    self.state = ParseState::WaitingForOpcode;
                }
                ParseState::WaitingForSync1 if byte == SYNC0 => {
                    self.discarded = self.discarded.saturating_add(1);
                }
                ParseState::WaitingForSync1 => {
                    self.discarded = self.discarded.saturating_add(2);
                    self.state = ParseState::WaitingForSync0;
                }
                ParseState::WaitingForOpcode => {
                    self.opcode = byte;
                    self.state = ParseState::WaitingForLengthLo;
                }
                ParseState::WaitingForLengthLo => {
                    self.length_lo = byte;
                    self.state = ParseState::WaitingForLengthHi;
                }
                // Four replayed bytes can never complete a five byte header
                ParseState::WaitingForLengthHi | ParseState::ReadingPayload => {}
            }
        }
    }

    fn take_frame(&mut self) -> Frame {
        let frame = Frame {
            opcode: self.opcode,
            payload: core::mem::take(&mut self.buffer),
        };
        self.reset();
        frame
    }
}

/// Iterator returned by [`FrameParser::frames`]
pub struct Frames<'p, 'b> {
    parser: &'p mut FrameParser,
    bytes: &'b [u8],
    pos: usize,
}

impl Iterator for Frames<'_, '_> {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            self.pos += 1;
            match self.parser.feed(byte) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
