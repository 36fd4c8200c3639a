use crate::amplifier::Amplifier;
use crate::error::Result;
use crate::orchestrator::DeviceOrchestrator;
use crate::projector::Projector;
use crate::screen::Screen;
use crate::types::{AmpPower, PowerState, ScreenPosition};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// How often the projector is polled
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A projector power transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEdge {
    PoweredOn,
    PoweredOff,
}

/// Turns a stream of power readings into transitions
///
/// Starts out assuming the system is off, so a projector that is already on
/// when monitoring begins produces a `PoweredOn` edge on the first reading.
/// [`PowerState::Unknown`] never produces an edge.
#[derive(Debug, Default, Clone, Copy)]
pub struct PowerEdgeDetector {
    powered: bool,
}

impl PowerEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known powered state
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Feed one reading, returning the edge it completes (if any)
    pub fn observe(&mut self, state: PowerState) -> Option<PowerEdge> {
        match state {
            PowerState::On if !self.powered => {
                self.powered = true;
                Some(PowerEdge::PoweredOn)
            }
            PowerState::Off if self.powered => {
                self.powered = false;
                Some(PowerEdge::PoweredOff)
            }
            _ => None,
        }
    }
}

/// Autonomous power-follow loop
///
/// Polls the projector and, on each power edge, drives the screen and the
/// amplifier to match. Screen commands go through
/// [`DeviceOrchestrator::drive_screen`]: they skip busy arbitration and are
/// never followed by a settle stop.
/// Amplifier failures are logged and the loop carries on; any other failure
/// ends the loop.
///
/// # Example
///
/// ```no_run
/// use av_automation::mock::{MockAmplifier, MockProjector, MockScreen};
/// use av_automation::{DeviceOrchestrator, Monitor, OrchestratorSettings, PowerState};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = DeviceOrchestrator::new(
///         MockProjector::new(PowerState::On),
///         MockScreen::new(),
///         MockAmplifier::new(),
///         OrchestratorSettings::new(Duration::from_secs(20)),
///     );
///
///     let mut monitor = Monitor::new(orchestrator);
///     monitor.start();
///     tokio::time::sleep(Duration::from_secs(12)).await;
///     monitor.stop().await?;
///     Ok(())
/// }
/// ```
pub struct Monitor<P, S, A> {
    orchestrator: DeviceOrchestrator<P, S, A>,
    poll_interval: Duration,
    stop_token: Option<CancellationToken>,
    task_handle: Option<JoinHandle<Result<()>>>,
}

impl<P: Projector, S: Screen, A: Amplifier> Monitor<P, S, A> {
    pub fn new(orchestrator: DeviceOrchestrator<P, S, A>) -> Self {
        Self {
            orchestrator,
            poll_interval: POLL_INTERVAL,
            stop_token: None,
            task_handle: None,
        }
    }

    /// Override the poll cadence
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start polling in the background
    ///
    /// The loop also stops when the orchestrator shuts down.
    pub fn start(&mut self) {
        if let Some(token) = self.stop_token.take() {
            token.cancel();
        }

        let stop_token = self.orchestrator.shutdown_token().child_token();
        self.stop_token = Some(stop_token.clone());

        let orchestrator = self.orchestrator.clone();
        let poll_interval = self.poll_interval;

        let handle = tokio::spawn(async move {
            let result = run_monitor(&orchestrator, poll_interval, stop_token).await;
            if let Err(e) = &result {
                tracing::error!("Monitor loop terminated: {}", e);
            }
            result
        });

        self.task_handle = Some(handle);
    }

    /// Whether the background loop is still running
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop polling and return how the loop ended
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.stop_token.take() {
            token.cancel();
        }
        self.join().await
    }

    /// Wait for the loop to end on its own
    ///
    /// Cancel-safe: dropping the future leaves the loop running and joinable.
    pub async fn join(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.as_mut() else {
            return Ok(());
        };
        let result = handle.await;
        self.task_handle = None;
        result?
    }
}

/// Poll forever (until `stop` fires), acting on power edges
pub async fn run_monitor<P: Projector, S: Screen, A: Amplifier>(
    orchestrator: &DeviceOrchestrator<P, S, A>,
    poll_interval: Duration,
    stop: CancellationToken,
) -> Result<()> {
    tracing::info!("Monitoring projector power every {:?}", poll_interval);

    let mut edges = PowerEdgeDetector::new();
    loop {
        poll_once(orchestrator, &mut edges).await?;

        tokio::select! {
            _ = stop.cancelled() => {
                tracing::info!("Monitor stopped");
                return Ok(());
            }
            _ = sleep(poll_interval) => {}
        }
    }
}

/// One monitor iteration: read the projector and react to any edge
pub async fn poll_once<P: Projector, S: Screen, A: Amplifier>(
    orchestrator: &DeviceOrchestrator<P, S, A>,
    edges: &mut PowerEdgeDetector,
) -> Result<Option<PowerEdge>> {
    let state = orchestrator.projector().power_status().await;
    let edge = edges.observe(state);

    match edge {
        Some(PowerEdge::PoweredOn) => {
            tracing::info!("Projector powered on, turning on components");
            orchestrator.drive_screen(ScreenPosition::Lowered).await?;
            switch_amplifier(orchestrator, AmpPower::Active).await;
        }
        Some(PowerEdge::PoweredOff) => {
            tracing::info!("Projector powered off, shutting down components");
            orchestrator.drive_screen(ScreenPosition::Raised).await?;
            switch_amplifier(orchestrator, AmpPower::Off).await;
        }
        None => {}
    }

    Ok(edge)
}

async fn switch_amplifier<P: Projector, S: Screen, A: Amplifier>(
    orchestrator: &DeviceOrchestrator<P, S, A>,
    state: AmpPower,
) {
    if let Err(e) = orchestrator.request_amplifier(state).await {
        tracing::error!("Amplifier API error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AvError;
    use crate::mock::{MockAmplifier, MockProjector, MockScreen};
    use crate::orchestrator::OrchestratorSettings;
    use crate::screen::ScreenCommand;
    use crate::types::PowerState::{Off, On};

    const WAIT: Duration = Duration::from_millis(1_000);

    fn orchestrator(
        projector: MockProjector,
    ) -> DeviceOrchestrator<MockProjector, MockScreen, MockAmplifier> {
        DeviceOrchestrator::new(
            projector,
            MockScreen::new(),
            MockAmplifier::new(),
            OrchestratorSettings::new(WAIT),
        )
    }

    #[test]
    fn detector_fires_on_edges_only() {
        let mut edges = PowerEdgeDetector::new();
        let seen: Vec<_> = [Off, Off, On, On, Off, Off]
            .into_iter()
            .map(|s| edges.observe(s))
            .collect();

        assert_eq!(
            seen,
            vec![
                None,
                None,
                Some(PowerEdge::PoweredOn),
                None,
                Some(PowerEdge::PoweredOff),
                None
            ]
        );
    }

    #[test]
    fn detector_ignores_unknown() {
        let mut edges = PowerEdgeDetector::new();
        assert_eq!(edges.observe(PowerState::Unknown), None);
        assert_eq!(edges.observe(On), Some(PowerEdge::PoweredOn));
        assert_eq!(edges.observe(PowerState::Unknown), None);
        assert!(edges.is_powered());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_sequence_acts_once_per_edge() {
        let av = orchestrator(MockProjector::with_sequence([Off, Off, On, On, Off]));
        let mut edges = PowerEdgeDetector::new();

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(poll_once(&av, &mut edges).await.unwrap());
            sleep(POLL_INTERVAL).await;
        }

        assert_eq!(
            seen,
            vec![None, None, Some(PowerEdge::PoweredOn), None, Some(PowerEdge::PoweredOff)]
        );
        assert_eq!(av.screen().count(ScreenCommand::Lower), 1);
        assert_eq!(av.screen().count(ScreenCommand::Raise), 1);
        assert_eq!(av.amplifier().requests(), vec![AmpPower::Active, AmpPower::Off]);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_loop_follows_projector() {
        let av = orchestrator(MockProjector::with_sequence([Off, Off, On, On, Off]));
        let mut monitor = Monitor::new(av.clone());
        monitor.start();

        sleep(POLL_INTERVAL * 7).await;
        assert!(monitor.is_running());
        monitor.stop().await.unwrap();

        assert_eq!(av.screen().count(ScreenCommand::Lower), 1);
        assert_eq!(av.screen().count(ScreenCommand::Raise), 1);
        assert_eq!(av.amplifier().requests(), vec![AmpPower::Active, AmpPower::Off]);
        assert_eq!(av.screen_position().await, ScreenPosition::Raised);
    }

    #[tokio::test(start_paused = true)]
    async fn amplifier_failure_keeps_loop_alive() {
        let av = orchestrator(MockProjector::with_sequence([On, On, Off]));
        av.amplifier().set_unreachable();

        let mut monitor = Monitor::new(av.clone());
        monitor.start();
        sleep(POLL_INTERVAL * 4).await;

        assert!(monitor.is_running());
        assert_eq!(av.amplifier().requests(), vec![AmpPower::Active, AmpPower::Off]);
        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn screen_failure_ends_loop() {
        let av = orchestrator(MockProjector::new(On));
        av.screen().fail_commands();

        let mut monitor = Monitor::new(av.clone());
        monitor.start();

        let result = monitor.join().await;
        assert!(matches!(result, Err(AvError::Io(_))));
        assert!(av.amplifier().requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn orchestrator_shutdown_stops_monitor() {
        let av = orchestrator(MockProjector::new(Off));
        let mut monitor = Monitor::new(av.clone());
        monitor.start();

        sleep(POLL_INTERVAL).await;
        av.shutdown().await;

        monitor.join().await.unwrap();
        assert!(!monitor.is_running());
    }
}
