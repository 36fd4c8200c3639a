use crate::connection::{SerialLink, SCREEN_SERIAL};
use crate::error::Result;
use serialport::SerialPort;
use std::future::Future;
use std::io::{Read, Write};

/// Motion commands understood by the screen controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenCommand {
    Lower,
    Raise,
    Stop,
}

impl ScreenCommand {
    /// Fixed 5-byte wire frame
    pub const fn frame(self) -> [u8; 5] {
        match self {
            Self::Lower => [0xFF, 0xEE, 0xEE, 0xEE, 0xEE],
            Self::Raise => [0xFF, 0xEE, 0xEE, 0xEE, 0xDD],
            Self::Stop => [0xFF, 0xEE, 0xEE, 0xEE, 0xCC],
        }
    }
}

/// Projection screen control surface
///
/// Commands are one-way; the screen never reports its position.
pub trait Screen: Send + Sync + 'static {
    fn send(&self, command: ScreenCommand) -> impl Future<Output = Result<()>> + Send;

    fn lower(&self) -> impl Future<Output = Result<()>> + Send {
        self.send(ScreenCommand::Lower)
    }

    fn raise(&self) -> impl Future<Output = Result<()>> + Send {
        self.send(ScreenCommand::Raise)
    }

    fn stop(&self) -> impl Future<Output = Result<()>> + Send {
        self.send(ScreenCommand::Stop)
    }
}

/// Screen motor controller on a 2400 baud serial line
pub struct SerialScreen<T = Box<dyn SerialPort>> {
    link: SerialLink<T>,
}

impl SerialScreen {
    /// Open the screen port (2400 8N1)
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            link: SerialLink::open(path, SCREEN_SERIAL)?,
        })
    }
}

impl<T: Read + Write + Send + 'static> SerialScreen<T> {
    pub fn with_stream(name: impl Into<String>, stream: T) -> Self {
        Self {
            link: SerialLink::new(name, stream),
        }
    }
}

impl<T: Read + Write + Send + 'static> Screen for SerialScreen<T> {
    async fn send(&self, command: ScreenCommand) -> Result<()> {
        tracing::debug!("Screen command: {:?}", command);
        self.link
            .exchange(move |port| {
                port.write_all(&command.frame())?;
                port.flush()?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSerialStream;

    #[tokio::test]
    async fn writes_frames_without_reading() {
        let stream = MockSerialStream::new();
        let written = stream.output();
        let screen = SerialScreen::with_stream("mock", stream);

        screen.lower().await.unwrap();
        screen.stop().await.unwrap();
        screen.raise().await.unwrap();

        let bytes = written.lock().unwrap().clone();
        assert_eq!(
            bytes,
            [
                0xFF, 0xEE, 0xEE, 0xEE, 0xEE, // lower
                0xFF, 0xEE, 0xEE, 0xEE, 0xCC, // stop
                0xFF, 0xEE, 0xEE, 0xEE, 0xDD, // raise
            ]
        );
    }

    #[tokio::test]
    async fn write_failure_is_surfaced() {
        let mut stream = MockSerialStream::new();
        stream.fail_writes();
        let screen = SerialScreen::with_stream("mock", stream);

        assert!(matches!(
            screen.lower().await,
            Err(crate::error::AvError::Io(_))
        ));
    }
}
