//! SLIP framing
//!
//! Frame format before escaping:
//!
//! ```text
//! [ID u32 LE] [TAG u16 LE] [FLAGS u16 LE] [PAYLOAD ...]
//! ```
//!
//! The whole frame is escaped (`END` → `ESC ESC_END`, `ESC` → `ESC ESC_ESC`)
//! and terminated by `END`. On a decode error the rest of the frame is
//! discarded up to the next `END`, after which decoding resumes.

use super::{Frame, FrameSink, FrameSource, Transport, HEADER_LEN};
use crate::error::{Error, Result};
use std::collections::VecDeque;

pub const END: u8 = 0xC0;
pub const ESC: u8 = 0xDB;
pub const ESC_END: u8 = 0xDC;
pub const ESC_ESC: u8 = 0xDD;

/// Largest unescaped frame accepted before the decoder gives up on it
pub const MAX_FRAME_SIZE: usize = 20 * 1024;

/// Escape and terminate one frame
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut raw = Vec::with_capacity(HEADER_LEN + frame.payload.len());
    raw.extend_from_slice(&frame.id.to_le_bytes());
    raw.extend_from_slice(&frame.tag.to_le_bytes());
    raw.extend_from_slice(&frame.flags.to_le_bytes());
    raw.extend_from_slice(&frame.payload);

    let mut out = Vec::with_capacity(raw.len() + raw.len() / 8 + 1);
    for byte in raw {
        match byte {
            END => out.extend_from_slice(&[ESC, ESC_END]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            b => out.push(b),
        }
    }
    out.push(END);
    out
}

/// Parse an unescaped frame
///
/// Inbound, the request flag marks an acknowledgement and the frame must be
/// header-only. Outbound frames with the flag set carry their payload.
fn parse_frame(raw: &[u8], outbound: bool) -> Result<Frame> {
    if raw.len() < HEADER_LEN {
        return Err(Error::InvalidFrame(format!(
            "frame too short: {} < {}",
            raw.len(),
            HEADER_LEN
        )));
    }

    let frame = Frame {
        id: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        tag: u16::from_le_bytes([raw[4], raw[5]]),
        flags: u16::from_le_bytes([raw[6], raw[7]]),
        payload: raw[HEADER_LEN..].to_vec(),
    };

    if !outbound && frame.is_request() && !frame.payload.is_empty() {
        return Err(Error::InvalidFrame(format!(
            "ack frame {} carries {} payload bytes",
            frame.id,
            frame.payload.len()
        )));
    }

    Ok(frame)
}

/// Incremental SLIP decoder
#[derive(Debug, Default)]
pub struct SlipDecoder {
    buffer: Vec<u8>,
    escaped: bool,
    discarding: bool,
    outbound: bool,
}

impl SlipDecoder {
    /// Decoder for controller-to-host traffic
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder for host-to-controller traffic, as written by [`SlipWriter`]
    ///
    /// Request-flagged frames are ack requests here and keep their payload.
    pub fn outbound() -> Self {
        Self {
            outbound: true,
            ..Self::default()
        }
    }

    /// Feed one byte; returns a result whenever a frame completes or fails
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame>> {
        if self.discarding {
            if byte == END {
                self.reset();
            }
            return None;
        }

        if self.escaped {
            self.escaped = false;
            let decoded = match byte {
                ESC_END => END,
                ESC_ESC => ESC,
                ESC => return Some(self.fail("double escape")),
                END => {
                    self.reset();
                    return Some(Err(Error::InvalidFrame("unterminated escape".into())));
                }
                other => return Some(self.fail(&format!("invalid escape 0x{:02X}", other))),
            };
            return self.append(decoded);
        }

        match byte {
            ESC => {
                self.escaped = true;
                None
            }
            END if self.buffer.is_empty() => None,
            END => {
                let result = parse_frame(&self.buffer, self.outbound);
                self.reset();
                Some(result)
            }
            b => self.append(b),
        }
    }

    /// Feed a chunk of bytes, collecting every completed result
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<Result<Frame>> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    fn append(&mut self, byte: u8) -> Option<Result<Frame>> {
        if self.buffer.len() >= MAX_FRAME_SIZE {
            return Some(self.fail(&format!("frame exceeds {} bytes", MAX_FRAME_SIZE)));
        }
        self.buffer.push(byte);
        None
    }

    /// Drop the current frame and skip input until the next END
    fn fail(&mut self, reason: &str) -> Result<Frame> {
        self.buffer.clear();
        self.escaped = false;
        self.discarding = true;
        Err(Error::InvalidFrame(reason.to_string()))
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.escaped = false;
        self.discarding = false;
    }
}

/// [`FrameSource`] that decodes SLIP frames from a byte transport
pub struct SlipReader<T: Transport> {
    transport: T,
    decoder: SlipDecoder,
    ready: VecDeque<Frame>,
    read_buf: [u8; 256],
}

impl<T: Transport> SlipReader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            decoder: SlipDecoder::new(),
            ready: VecDeque::new(),
            read_buf: [0u8; 256],
        }
    }
}

impl<T: Transport> FrameSource for SlipReader<T> {
    fn recv(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.ready.pop_front() {
            return Ok(Some(frame));
        }

        // Skip the read (and the port's read timeout) when nothing is waiting
        if self.transport.available()? == 0 {
            return Ok(None);
        }

        let n = self.transport.read(&mut self.read_buf)?;
        for &byte in &self.read_buf[..n] {
            match self.decoder.push(byte) {
                Some(Ok(frame)) => self.ready.push_back(frame),
                Some(Err(e)) => log::warn!("Dropping malformed frame: {}", e),
                None => {}
            }
        }

        Ok(self.ready.pop_front())
    }
}

/// [`FrameSink`] that SLIP-encodes frames onto a byte transport
pub struct SlipWriter<T: Transport> {
    transport: T,
}

impl<T: Transport> SlipWriter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> FrameSink for SlipWriter<T> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        let bytes = encode_frame(frame);
        let mut written = 0;
        while written < bytes.len() {
            let n = self.transport.write(&bytes[written..])?;
            if n == 0 {
                return Err(Error::Disconnected);
            }
            written += n;
        }
        self.transport.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, FLAG_REQUEST};

    #[test]
    fn test_encode_escapes_special_bytes() {
        let frame = Frame::new(1, 7, vec![END, 0x01, ESC]);
        let bytes = encode_frame(&frame);
        assert_eq!(
            bytes,
            vec![
                0x01, 0x00, 0x00, 0x00, // id
                0x07, 0x00, // tag
                0x00, 0x00, // flags
                ESC, ESC_END, 0x01, ESC, ESC_ESC, END,
            ]
        );
    }

    #[test]
    fn test_escaped_header_bytes() {
        // id 0xC0 must not terminate the frame early
        let frame = Frame::new(0xC0, 2, vec![1, 0, 5, 0]);
        let mut decoder = SlipDecoder::new();
        let results = decoder.push_slice(&encode_frame(&frame));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &frame);
    }

    #[test]
    fn test_decoder_handles_split_input() {
        let frame = Frame::new(42, 9, vec![ESC, END, 0xAA]);
        let bytes = encode_frame(&frame);
        let mut decoder = SlipDecoder::new();

        let (head, tail) = bytes.split_at(5);
        assert!(decoder.push_slice(head).is_empty());
        let results = decoder.push_slice(tail);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &frame);
    }

    #[test]
    fn test_empty_frames_skipped() {
        let mut decoder = SlipDecoder::new();
        assert!(decoder.push_slice(&[END, END, END]).is_empty());
    }

    #[test]
    fn test_short_frame_rejected() {
        let mut decoder = SlipDecoder::new();
        let results = decoder.push_slice(&[1, 2, 3, END]);
        assert!(matches!(results.as_slice(), [Err(Error::InvalidFrame(_))]));
    }

    #[test]
    fn test_ack_with_payload_rejected() {
        let mut frame = Frame::new(3, 0, vec![1]);
        frame.flags = FLAG_REQUEST;
        let mut decoder = SlipDecoder::new();
        let results = decoder.push_slice(&encode_frame(&frame));
        assert!(matches!(results.as_slice(), [Err(Error::InvalidFrame(_))]));

        let results = decoder.push_slice(&encode_frame(&Frame::ack(3)));
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap().is_request());
    }

    #[test]
    fn test_outbound_decoder_keeps_request_payload() {
        let mut frame = Frame::new(4, 7, vec![1]);
        frame.flags = FLAG_REQUEST;
        let bytes = encode_frame(&frame);

        let results = SlipDecoder::outbound().push_slice(&bytes);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &frame);

        // Same bytes arriving from the controller are a malformed ack
        let results = SlipDecoder::new().push_slice(&bytes);
        assert!(matches!(results.as_slice(), [Err(Error::InvalidFrame(_))]));
    }

    #[test]
    fn test_invalid_escape_resyncs_at_end() {
        let good = Frame::new(5, 7, vec![1]);
        let mut bytes = vec![0x01, ESC, 0x42, 0x03, 0x04, END];
        bytes.extend(encode_frame(&good));

        let mut decoder = SlipDecoder::new();
        let results = decoder.push_slice(&bytes);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(Error::InvalidFrame(_))));
        assert_eq!(results[1].as_ref().unwrap(), &good);
    }

    #[test]
    fn test_double_escape_rejected() {
        let mut decoder = SlipDecoder::new();
        let results = decoder.push_slice(&[ESC, ESC, 0x00, END]);
        assert!(matches!(results.as_slice(), [Err(Error::InvalidFrame(_))]));
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let mut bytes = vec![0x11; MAX_FRAME_SIZE + 10];
        bytes.push(END);
        bytes.extend(encode_frame(&Frame::new(1, 7, vec![0])));

        let mut decoder = SlipDecoder::new();
        let results = decoder.push_slice(&bytes);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(Error::InvalidFrame(_))));
        assert_eq!(results[1].as_ref().unwrap().id, 1);
    }

    #[test]
    fn test_reader_and_writer_over_mock() {
        let mock = MockTransport::new();
        let mut writer = SlipWriter::new(mock.clone());
        let mut reader = SlipReader::new(mock.clone());

        let a = Frame::new(1, 2, vec![0, 0, 10, 0]);
        let b = Frame::new(2, 7, vec![1]);
        writer.send(&a).unwrap();
        writer.send(&b).unwrap();

        assert!(reader.recv().unwrap().is_none());

        mock.inject_read(&mock.get_written());
        assert!(mock.clone().available().unwrap() > 0);
        assert_eq!(reader.recv().unwrap(), Some(a));
        assert_eq!(reader.recv().unwrap(), Some(b));
        assert_eq!(reader.recv().unwrap(), None);
    }
}
