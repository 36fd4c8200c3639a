use crate::codec::FrameCodec;
use crate::connection::{SerialLink, PROJECTOR_SERIAL};
use crate::error::Result;
use crate::types::PowerState;
use serialport::SerialPort;
use std::future::Future;
use std::io::{Read, Write};

const POWER_QUERY: &[u8] = b"PWR?\r\n";
const POWER_ON: &[u8] = b"PWR ON\r\n";
const POWER_OFF: &[u8] = b"PWR OFF\r\n";

/// Projector control surface
pub trait Projector: Send + Sync + 'static {
    /// Query live power state
    ///
    /// Infallible by contract: a communication failure reports [`PowerState::Off`].
    fn power_status(&self) -> impl Future<Output = PowerState> + Send;

    /// Switch the projector on
    fn turn_on(&self) -> impl Future<Output = Result<()>> + Send;

    /// Switch the projector off
    fn turn_off(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Projector driven over its serial ESC/VP21-style ASCII protocol
pub struct SerialProjector<T = Box<dyn SerialPort>> {
    link: SerialLink<T>,
}

impl SerialProjector {
    /// Open the projector port (9600 8N1)
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            link: SerialLink::open(path, PROJECTOR_SERIAL)?,
        })
    }
}

impl<T: Read + Write + Send + 'static> SerialProjector<T> {
    /// Drive a projector over an arbitrary byte stream
    pub fn with_stream(name: impl Into<String>, stream: T) -> Self {
        Self {
            link: SerialLink::new(name, stream),
        }
    }

    async fn execute(&self, command: &'static [u8]) -> Result<String> {
        self.link
            .exchange(move |port| FrameCodec::new(port).send(command))
            .await
    }
}

impl<T: Read + Write + Send + 'static> Projector for SerialProjector<T> {
    async fn power_status(&self) -> PowerState {
        match self.execute(POWER_QUERY).await {
            Ok(response) => PowerState::from_response(&response),
            // Fail-safe: an unreadable projector is treated as off
            Err(e) => {
                tracing::error!("Error requesting projector power status: {}", e);
                PowerState::Off
            }
        }
    }

    async fn turn_on(&self) -> Result<()> {
        self.execute(POWER_ON).await?;
        Ok(())
    }

    async fn turn_off(&self) -> Result<()> {
        self.execute(POWER_OFF).await?;
        Ok(())
    }
}
