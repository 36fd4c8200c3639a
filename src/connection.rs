use crate::error::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Port-level read timeout; the frame codec retries on expiry
const PORT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Line settings for a device port (always 8 data bits, no parity, 1 stop bit, no handshake)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
}

/// Projector control port: 9600 8N1
pub const PROJECTOR_SERIAL: SerialSettings = SerialSettings { baud_rate: 9600 };

/// Screen control port: 2400 8N1
pub const SCREEN_SERIAL: SerialSettings = SerialSettings { baud_rate: 2400 };

/// Open and configure a serial port
pub fn open_port(path: &str, settings: SerialSettings) -> Result<Box<dyn SerialPort>> {
    tracing::info!("Opening serial port {} at {} baud", path, settings.baud_rate);

    let port = serialport::new(path, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(PORT_READ_TIMEOUT)
        .open()?;

    Ok(port)
}

/// Exclusive handle to a blocking serial stream
///
/// Each exchange runs on tokio's blocking pool with the port locked for its
/// whole duration, so commands on one port never interleave.
pub struct SerialLink<T> {
    name: String,
    port: Arc<Mutex<T>>,
}

impl SerialLink<Box<dyn SerialPort>> {
    /// Open a hardware port and wrap it
    pub fn open(path: &str, settings: SerialSettings) -> Result<Self> {
        let port = open_port(path, settings)?;
        Ok(Self::new(path, port))
    }
}

impl<T: Send + 'static> SerialLink<T> {
    /// Wrap an already opened stream
    pub fn new(name: impl Into<String>, port: T) -> Self {
        Self {
            name: name.into(),
            port: Arc::new(Mutex::new(port)),
        }
    }

    /// Port name, for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a blocking exchange against the port
    pub async fn exchange<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let port = self.port.clone();
        tokio::task::spawn_blocking(move || {
            let mut port = port.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *port)
        })
        .await?
    }
}

impl<T> Clone for SerialLink<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            port: self.port.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AvError;
    use crate::mock::MockSerialStream;
    use std::io::Write;

    #[tokio::test]
    async fn exchange_runs_against_port() {
        let stream = MockSerialStream::new();
        let written = stream.output();
        let link = SerialLink::new("mock", stream);

        link.exchange(|port| {
            port.write_all(b"hello")?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(link.name(), "mock");
        assert_eq!(written.lock().unwrap().as_slice(), b"hello");
    }

    #[tokio::test]
    async fn exchange_propagates_errors() {
        let link = SerialLink::new("mock", MockSerialStream::new());
        let err = link
            .exchange(|_| -> Result<()> { Err(AvError::protocol("ERR")) })
            .await
            .unwrap_err();

        assert!(matches!(err, AvError::Protocol { .. }));
    }
}
