//! In-memory transport for tests and hardware-free runs

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Loopback-style transport backed by shared buffers
///
/// Clones share the same buffers, so one clone can be handed to the link
/// while the test keeps another to inject controller bytes and inspect what
/// the host wrote.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Queue bytes for the host to read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Everything the host has written so far
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }

    /// Make further writes fail, as a yanked cable would
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let n = inner.read_buffer.len().min(buffer.len());
        for (dst, src) in buffer.iter_mut().zip(inner.read_buffer.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::Disconnected);
        }
        inner.write_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.inner.lock().read_buffer.len())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffers() {
        let mock = MockTransport::new();
        let mut port = mock.clone();

        mock.inject_read(&[1, 2, 3]);
        assert_eq!(port.available().unwrap(), 3);

        let mut buf = [0u8; 2];
        assert_eq!(port.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(port.available().unwrap(), 1);

        port.write(&[9, 8]).unwrap();
        assert_eq!(mock.get_written(), vec![9, 8]);
        mock.clear_written();
        assert!(mock.get_written().is_empty());
    }

    #[test]
    fn test_closed_rejects_writes() {
        let mock = MockTransport::new();
        let mut port = mock.clone();
        mock.close();
        assert!(matches!(port.write(&[1]), Err(Error::Disconnected)));
    }
}
