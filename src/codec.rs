use crate::error::{AvError, Result};
use std::io::{ErrorKind, Read, Write};

/// Byte that terminates every projector response
pub const RESPONSE_TERMINATOR: u8 = b':';

/// Request/response framing for the projector's ASCII command protocol
///
/// Commands are written verbatim. Responses are read one byte at a time up to
/// (and excluding) the `:` terminator. A response containing `ERR` is a
/// device-side rejection.
///
/// There is no read deadline: port-level read timeouts are retried, so a
/// silent device blocks the caller.
pub struct FrameCodec<T> {
    stream: T,
}

impl<T: Read + Write> FrameCodec<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    /// Write a command and read back its response text
    pub fn send(&mut self, command: &[u8]) -> Result<String> {
        self.stream.write_all(command)?;
        self.stream.flush()?;
        tracing::info!(
            "Projector command: {}",
            String::from_utf8_lossy(command).trim_end()
        );

        let mut response = Vec::new();
        loop {
            let byte = self.read_byte()?;
            tracing::trace!("Read byte from projector: {:#04x}", byte);
            if byte == RESPONSE_TERMINATOR {
                break;
            }
            response.push(byte);
        }

        let text = String::from_utf8_lossy(&response).into_owned();
        tracing::debug!("Projector response: {}", text);

        if text.contains("ERR") {
            return Err(AvError::protocol(format!("Projector error: {}", text)));
        }

        Ok(text)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.stream.read(&mut buf) {
                Ok(1) => return Ok(buf[0]),
                Ok(_) => {
                    return Err(AvError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "failed to read response",
                    )))
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                    continue
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn into_inner(self) -> T {
        self.stream
    }
}
