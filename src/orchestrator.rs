use crate::amplifier::Amplifier;
use crate::error::{AvError, Result};
use crate::projector::Projector;
use crate::response::Outcome;
use crate::screen::Screen;
use crate::types::{AmpPower, PowerState, ScreenPosition, Status};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Minimum interval between projector power commands
pub const PROJECTOR_COOLDOWN: Duration = Duration::from_millis(120_000);

/// Granularity of the raise watch
pub const RAISE_POLL_STEP: Duration = Duration::from_millis(10);

const MIN_RAISE_POLL_STEP: Duration = Duration::from_millis(1);

/// Timing parameters for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// How long a screen transition takes before it is considered settled
    pub screen_wait: Duration,

    /// Window after a projector command during which further commands are refused
    pub projector_cooldown: Duration,

    /// Poll step while a raise is in flight (at least 1 ms)
    pub raise_poll_step: Duration,
}

impl OrchestratorSettings {
    pub fn new(screen_wait: Duration) -> Self {
        Self {
            screen_wait,
            projector_cooldown: PROJECTOR_COOLDOWN,
            raise_poll_step: RAISE_POLL_STEP,
        }
    }
}

/// Believed screen state
///
/// `generation` increments on every transition; a settle action only acts
/// while its own transition is still the latest one.
#[derive(Debug, Default)]
struct ScreenState {
    position: ScreenPosition,
    busy: bool,
    generation: u64,
}

struct Inner<P, S, A> {
    projector: P,
    screen: S,
    amplifier: A,
    settings: OrchestratorSettings,
    screen_state: Mutex<ScreenState>,
    cooling_down: Mutex<bool>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

/// Owner of the shared device state and the arbitration rules around it
///
/// Screen commands are refused while a transition is in flight, projector
/// commands while the cooldown window is open. Rejections are immediate; no
/// request is ever queued.
pub struct DeviceOrchestrator<P, S, A> {
    inner: Arc<Inner<P, S, A>>,
}

impl<P, S, A> Clone for DeviceOrchestrator<P, S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Projector, S: Screen, A: Amplifier> DeviceOrchestrator<P, S, A> {
    /// Create an orchestrator; the screen is assumed raised and nothing busy
    pub fn new(projector: P, screen: S, amplifier: A, settings: OrchestratorSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                projector,
                screen,
                amplifier,
                settings,
                screen_state: Mutex::new(ScreenState::default()),
                cooling_down: Mutex::new(false),
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn projector(&self) -> &P {
        &self.inner.projector
    }

    pub fn screen(&self) -> &S {
        &self.inner.screen
    }

    pub fn amplifier(&self) -> &A {
        &self.inner.amplifier
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    /// Token cancelled when the orchestrator shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    // ========== Queries ==========

    /// Live projector power plus the believed screen state
    pub async fn status(&self) -> Outcome<Status> {
        let projector_on = self.inner.projector.power_status().await.is_on();
        let state = self.inner.screen_state.lock().await;

        Outcome::Success(Status {
            projector_on,
            screen_moving: state.busy,
            screen_lowered: state.position == ScreenPosition::Lowered,
        })
    }

    pub async fn screen_position(&self) -> ScreenPosition {
        self.inner.screen_state.lock().await.position
    }

    pub async fn is_screen_busy(&self) -> bool {
        self.inner.screen_state.lock().await.busy
    }

    pub async fn is_cooling_down(&self) -> bool {
        *self.inner.cooling_down.lock().await
    }

    // ========== Manual commands ==========

    /// Lower the screen unless it is moving or already lowered
    pub async fn lower_screen(&self) -> Outcome<()> {
        report("Screen lower", self.move_screen(ScreenPosition::Lowered).await)
    }

    /// Raise the screen unless it is moving or already raised
    pub async fn raise_screen(&self) -> Outcome<()> {
        report("Screen raise", self.move_screen(ScreenPosition::Raised).await)
    }

    /// Turn the projector on unless cooling down or already on
    pub async fn projector_on(&self) -> Outcome<()> {
        report("Projector on", self.switch_projector(true).await)
    }

    /// Turn the projector off unless cooling down or already off
    pub async fn projector_off(&self) -> Outcome<()> {
        report("Projector off", self.switch_projector(false).await)
    }

    // ========== Unarbitrated control ==========

    /// Move the screen regardless of busy state or believed position
    ///
    /// Used by the monitor loop and at startup. Only the believed position is
    /// recorded: nothing is scheduled, so a lower is never followed by a stop
    /// and busy is left clear. Any in-flight manual transition is superseded;
    /// its settle action will find itself stale and do nothing.
    pub async fn drive_screen(&self, target: ScreenPosition) -> Result<()> {
        {
            let mut state = self.inner.screen_state.lock().await;
            state.busy = false;
            state.position = target;
            state.generation += 1;
        }

        match target {
            ScreenPosition::Lowered => self.inner.screen.lower().await,
            ScreenPosition::Raised => self.inner.screen.raise().await,
        }
    }

    /// Send the screen up so the believed position matches reality
    ///
    /// Leaves the screen not busy, so manual commands are accepted at once.
    pub async fn home_screen(&self) -> Result<()> {
        tracing::info!("Homing screen to raised position");
        self.drive_screen(ScreenPosition::Raised).await
    }

    /// Forward a power request to the amplifier
    pub async fn request_amplifier(&self, state: AmpPower) -> Result<()> {
        self.inner.amplifier.set_power(state).await
    }

    /// Cancel pending settle/cooldown actions and wait for them to finish
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }

    /// Number of scheduled actions still pending
    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    async fn move_screen(&self, target: ScreenPosition) -> Result<()> {
        let generation = {
            let mut state = self.inner.screen_state.lock().await;
            if state.busy {
                return Err(AvError::ScreenBusy);
            }
            if state.position == target {
                return Err(AvError::AlreadyInState(format!("Screen already {}", target)));
            }
            state.busy = true;
            state.position = target;
            state.generation += 1;
            state.generation
        };

        match target {
            ScreenPosition::Lowered => {
                self.schedule_lower_settle(generation);
                self.inner.screen.lower().await
            }
            ScreenPosition::Raised => {
                self.schedule_raise_watch(generation);
                self.inner.screen.raise().await
            }
        }
    }

    /// After the wait, stop the screen if this lower is still current
    fn schedule_lower_settle(&self, generation: u64) {
        let inner = self.inner.clone();
        self.inner.tasks.spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => return,
                _ = sleep(inner.settings.screen_wait) => {}
            }

            let mut state = inner.screen_state.lock().await;
            if state.generation != generation || state.position != ScreenPosition::Lowered {
                tracing::debug!("Lower superseded, not stopping screen");
                return;
            }

            // Lock held across the write so a concurrent raise cannot be stopped
            if let Err(e) = inner.screen.stop().await {
                tracing::error!("Failed to stop screen: {}", e);
            }
            state.busy = false;
            tracing::debug!("Screen stopped");
        });
    }

    /// Hold busy for the wait budget, giving up early if a newer transition starts
    ///
    /// A superseded watch exits without touching busy: the newer transition
    /// owns the flag from then on and clears it itself.
    fn schedule_raise_watch(&self, generation: u64) {
        let inner = self.inner.clone();
        self.inner.tasks.spawn(async move {
            let step = inner.settings.raise_poll_step.max(MIN_RAISE_POLL_STEP);
            let mut remaining = inner.settings.screen_wait;

            while !remaining.is_zero() {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => return,
                    _ = sleep(step) => {}
                }
                remaining = remaining.saturating_sub(step);

                if inner.screen_state.lock().await.generation != generation {
                    tracing::debug!("Raise superseded");
                    break;
                }
            }

            let mut state = inner.screen_state.lock().await;
            if state.generation == generation {
                state.busy = false;
                tracing::debug!("Raise completed");
            }
        });
    }

    async fn switch_projector(&self, on: bool) -> Result<()> {
        let target = if on { PowerState::On } else { PowerState::Off };

        {
            let mut cooling_down = self.inner.cooling_down.lock().await;
            if *cooling_down {
                return Err(AvError::ProjectorCooldown);
            }
            if self.inner.projector.power_status().await == target {
                return Err(AvError::AlreadyInState(format!("Projector is already {}", target)));
            }
            *cooling_down = true;
        }

        self.schedule_cooldown_release();

        if on {
            self.inner.projector.turn_on().await
        } else {
            self.inner.projector.turn_off().await
        }
    }

    /// Reopen the projector for commands once the cooldown elapses
    fn schedule_cooldown_release(&self) {
        let inner = self.inner.clone();
        self.inner.tasks.spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => {}
                _ = sleep(inner.settings.projector_cooldown) => {}
            }
            *inner.cooling_down.lock().await = false;
            tracing::debug!("Projector accepting commands again");
        });
    }
}

fn report(action: &str, result: Result<()>) -> Outcome<()> {
    match &result {
        Ok(()) => tracing::info!("{} accepted", action),
        Err(e) if e.is_arbitration() => tracing::info!("{} refused: {}", action, e),
        Err(e) => tracing::error!("{} failed: {}", action, e),
    }
    result.into()
}
