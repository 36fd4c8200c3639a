//! Projector-following control for a home cinema
//!
//! This library keeps a projector, a motorized projection screen and an
//! amplifier in step. It supports:
//!
//! - Projector power control and status over its serial ASCII protocol
//! - Screen lower/raise/stop over a one-way serial link
//! - Amplifier power over its JSON-RPC HTTP API
//! - Busy/cooldown arbitration for manual commands
//! - An autonomous loop that follows projector power edges
//!
//! # Quick Start
//!
//! ```no_run
//! use av_automation::{
//!     DeviceOrchestrator, Monitor, OrchestratorSettings, SerialProjector, SerialScreen,
//!     SonyAmplifier,
//! };
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = DeviceOrchestrator::new(
//!         SerialProjector::open("/dev/ttyUSB0")?,
//!         SerialScreen::open("/dev/ttyUSB1")?,
//!         SonyAmplifier::new(Some("192.168.1.50"))?,
//!         OrchestratorSettings::new(Duration::from_secs(20)),
//!     );
//!
//!     // Follow projector power automatically
//!     let mut monitor = Monitor::new(orchestrator.clone());
//!     monitor.start();
//!
//!     tokio::signal::ctrl_c().await?;
//!     monitor.stop().await?;
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Manual Control
//!
//! ```no_run
//! # use av_automation::{DeviceOrchestrator, OrchestratorSettings};
//! # use av_automation::mock::{MockAmplifier, MockProjector, MockScreen};
//! # use av_automation::PowerState;
//! # use std::time::Duration;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let orchestrator = DeviceOrchestrator::new(
//! #     MockProjector::new(PowerState::Off),
//! #     MockScreen::new(),
//! #     MockAmplifier::new(),
//! #     OrchestratorSettings::new(Duration::from_secs(20)),
//! # );
//! let outcome = orchestrator.lower_screen().await;
//! println!("{}", serde_json::to_string(&outcome)?);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Orchestrator**: shared state, arbitration and scheduled settle/cooldown actions
//! - **Monitor**: power edge detection and the autonomous loop
//! - **Devices**: `Projector`, `Screen` and `Amplifier` traits with serial/HTTP adapters
//! - **Codec / Protocol**: projector frame codec and amplifier JSON-RPC envelopes
//! - **Connection**: serial port setup and blocking I/O bridge

mod amplifier;
mod codec;
pub mod config;
mod connection;
mod error;
pub mod mock;
mod monitor;
mod orchestrator;
mod projector;
mod protocol;
mod response;
mod screen;
mod types;

// Public exports
pub use amplifier::{Amplifier, SonyAmplifier, AMPLIFIER_PORT};
pub use codec::{FrameCodec, RESPONSE_TERMINATOR};
pub use connection::{open_port, SerialLink, SerialSettings, PROJECTOR_SERIAL, SCREEN_SERIAL};
pub use error::{AvError, Result};
pub use monitor::{poll_once, run_monitor, Monitor, PowerEdge, PowerEdgeDetector, POLL_INTERVAL};
pub use orchestrator::{DeviceOrchestrator, OrchestratorSettings, PROJECTOR_COOLDOWN, RAISE_POLL_STEP};
pub use projector::{Projector, SerialProjector};
pub use protocol::{PowerParams, RpcReply, RpcRequest};
pub use response::Outcome;
pub use screen::{Screen, ScreenCommand, SerialScreen};
pub use types::{AmpPower, PowerState, ScreenPosition, Status};
