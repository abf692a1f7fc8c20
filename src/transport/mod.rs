//! Transport layer: byte channels and the frames carried over them
//!
//! ```text
//! Transport (bytes) ──► SlipReader ──► FrameSource ──► Dispatcher
//! LinkSender ──► FrameSink ──► SlipWriter ──► Transport (bytes)
//! ```

use crate::error::Result;

mod mock;
mod serial;
pub mod slip;
pub mod uri;

pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use slip::{SlipReader, SlipWriter};
pub use uri::DeviceUri;

/// Size of the frame header: id (u32) + tag (u16) + flags (u16)
pub const HEADER_LEN: usize = 8;

/// Outgoing: sender wants an acknowledgement. Incoming: frame is an acknowledgement.
pub const FLAG_REQUEST: u16 = 0x0001;

/// Byte channel to the controller
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 when idle)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Number of bytes ready to read without waiting
    fn available(&mut self) -> Result<usize>;
}

/// One link-level frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender-assigned sequence number
    pub id: u32,
    /// Message tag
    pub tag: u16,
    pub flags: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(id: u32, tag: u16, payload: Vec<u8>) -> Self {
        Self {
            id,
            tag,
            flags: 0,
            payload,
        }
    }

    /// Header-only acknowledgement for frame `id`
    pub fn ack(id: u32) -> Self {
        Self {
            id,
            tag: 0,
            flags: FLAG_REQUEST,
            payload: Vec::new(),
        }
    }

    /// Request bit set (an ack when received, an ack request when sent)
    pub fn is_request(&self) -> bool {
        self.flags & FLAG_REQUEST != 0
    }
}

/// Source of inbound frames, owned by the reader thread
pub trait FrameSource: Send {
    /// Next complete frame, `None` when nothing is available yet
    fn recv(&mut self) -> Result<Option<Frame>>;
}

/// Sink for outbound frames
pub trait FrameSink: Send {
    fn send(&mut self, frame: &Frame) -> Result<()>;
}
