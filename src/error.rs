use thiserror::Error;

/// Result type for AV automation operations
pub type Result<T> = std::result::Result<T, AvError>;

/// Errors that can occur while driving the projector, screen and amplifier
#[derive(Error, Debug)]
pub enum AvError {
    /// Serial write or read failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Device or remote service reported an explicit error condition
    #[error("Protocol error: {detail}")]
    Protocol {
        /// Error text as reported by the device
        detail: String,
    },

    /// Dependency is misconfigured or unreachable
    #[error("Connection error: {0}")]
    Connection(String),

    /// HTTP transport error talking to the amplifier
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Blocking I/O task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Configuration file is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A screen transition is already in flight
    #[error("Screen is busy")]
    ScreenBusy,

    /// The projector is still inside its command cooldown window
    #[error("Projector is cooling down, too many commands")]
    ProjectorCooldown,

    /// The device is already in the requested state
    #[error("{0}")]
    AlreadyInState(String),
}

impl AvError {
    /// Create a protocol error from device text
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol {
            detail: detail.into(),
        }
    }

    /// Whether this error is an expected arbitration rejection rather than a fault
    pub fn is_arbitration(&self) -> bool {
        matches!(
            self,
            Self::ScreenBusy | Self::ProjectorCooldown | Self::AlreadyInState(_)
        )
    }

    /// Stable numeric code reported in the caller envelope
    pub fn code(&self) -> u16 {
        match self {
            Self::ScreenBusy | Self::ProjectorCooldown | Self::AlreadyInState(_) => 409,
            Self::Connection(_) => 503,
            Self::Http(e) if e.is_timeout() => 504,
            Self::Io(_) | Self::Serial(_) | Self::Protocol { .. } | Self::Http(_) | Self::Json(_) => 502,
            Self::Task(_) | Self::Config(_) => 500,
        }
    }
}
