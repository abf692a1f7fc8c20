//! Serial transport implementation

use super::uri::DeviceUri;
use super::Transport;
use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Read timeout; an idle port yields `Ok(0)` after this long
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Serial transport for the controller UART
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate (e.g., 115200)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport { port })
    }

    /// Open the port named by a `serial:` URI
    pub fn open_uri(uri: &DeviceUri) -> Result<Self> {
        if uri.scheme != "serial" {
            return Err(Error::UnsupportedScheme(uri.scheme.clone()));
        }
        Self::open(&uri.path, uri.baud()?)
    }

    /// Second handle to the same port, so reads and writes can live on
    /// different threads
    pub fn try_clone(&self) -> Result<Self> {
        Ok(SerialTransport {
            port: self.port.try_clone()?,
        })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }
}
