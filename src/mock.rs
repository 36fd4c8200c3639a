//! In-memory devices for tests and dry runs
//!
//! [`MockSerialStream`] stands in for a serial port underneath the real
//! adapters; [`MockProjector`], [`MockScreen`] and [`MockAmplifier`] replace
//! the adapters themselves and record every command they receive.

use crate::amplifier::Amplifier;
use crate::error::{AvError, Result};
use crate::projector::Projector;
use crate::screen::{Screen, ScreenCommand};
use crate::types::{AmpPower, PowerState};
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Byte stream with scripted input and captured output
///
/// Reading past the scripted input returns zero bytes, like a port whose
/// device has gone silent.
#[derive(Debug, Default)]
pub struct MockSerialStream {
    input: VecDeque<u8>,
    output: Arc<Mutex<Vec<u8>>>,
    pending_timeouts: usize,
    fail_writes: bool,
}

impl MockSerialStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream that will yield `input` to reads
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Shared handle to everything written so far
    pub fn output(&self) -> Arc<Mutex<Vec<u8>>> {
        self.output.clone()
    }

    /// Copy of everything written so far
    pub fn written(&self) -> Vec<u8> {
        lock(&self.output).clone()
    }

    /// Make the next `count` reads fail with `TimedOut`
    pub fn inject_timeouts(&mut self, count: usize) {
        self.pending_timeouts = count;
    }

    /// Make every write fail
    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }
}

impl Read for MockSerialStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending_timeouts > 0 {
            self.pending_timeouts -= 1;
            return Err(io::Error::new(ErrorKind::TimedOut, "operation timed out"));
        }

        let mut n = 0;
        while n < buf.len() {
            match self.input.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockSerialStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "port disconnected"));
        }
        lock(&self.output).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct ProjectorScript {
    scripted: VecDeque<PowerState>,
    current: PowerState,
    commands: Vec<PowerState>,
    queries: usize,
    fail_commands: bool,
}

/// Projector with scripted power readings
#[derive(Debug)]
pub struct MockProjector {
    script: Mutex<ProjectorScript>,
}

impl MockProjector {
    /// Projector that reports `state` until commanded otherwise
    pub fn new(state: PowerState) -> Self {
        Self {
            script: Mutex::new(ProjectorScript {
                scripted: VecDeque::new(),
                current: state,
                commands: Vec::new(),
                queries: 0,
                fail_commands: false,
            }),
        }
    }

    /// Projector that reports each state of `sequence` once, then holds the last
    pub fn with_sequence(sequence: impl IntoIterator<Item = PowerState>) -> Self {
        let scripted: VecDeque<PowerState> = sequence.into_iter().collect();
        let current = scripted.back().copied().unwrap_or(PowerState::Off);
        let projector = Self::new(current);
        lock(&projector.script).scripted = scripted;
        projector
    }

    /// Change what subsequent queries report
    pub fn set_power(&self, state: PowerState) {
        let mut script = lock(&self.script);
        script.scripted.clear();
        script.current = state;
    }

    /// Make power commands fail as a device rejection
    pub fn fail_commands(&self) {
        lock(&self.script).fail_commands = true;
    }

    /// Power commands received, in order
    pub fn commands(&self) -> Vec<PowerState> {
        lock(&self.script).commands.clone()
    }

    /// Number of status queries answered
    pub fn query_count(&self) -> usize {
        lock(&self.script).queries
    }

    fn command(&self, state: PowerState) -> Result<()> {
        let mut script = lock(&self.script);
        script.commands.push(state);
        if script.fail_commands {
            return Err(AvError::protocol("Projector error: ERR"));
        }
        script.scripted.clear();
        script.current = state;
        Ok(())
    }
}

impl Projector for MockProjector {
    async fn power_status(&self) -> PowerState {
        let mut script = lock(&self.script);
        script.queries += 1;
        match script.scripted.pop_front() {
            Some(state) => state,
            None => script.current,
        }
    }

    async fn turn_on(&self) -> Result<()> {
        self.command(PowerState::On)
    }

    async fn turn_off(&self) -> Result<()> {
        self.command(PowerState::Off)
    }
}

/// Screen that records motion commands
#[derive(Debug, Default)]
pub struct MockScreen {
    commands: Mutex<Vec<ScreenCommand>>,
    fail: Mutex<bool>,
}

impl MockScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command fail with an I/O error
    pub fn fail_commands(&self) {
        *lock(&self.fail) = true;
    }

    /// Commands written, in order
    pub fn commands(&self) -> Vec<ScreenCommand> {
        lock(&self.commands).clone()
    }

    /// Number of times `command` was written
    pub fn count(&self, command: ScreenCommand) -> usize {
        lock(&self.commands).iter().filter(|c| **c == command).count()
    }
}

impl Screen for MockScreen {
    async fn send(&self, command: ScreenCommand) -> Result<()> {
        if *lock(&self.fail) {
            return Err(AvError::Io(io::Error::new(
                ErrorKind::BrokenPipe,
                "screen port disconnected",
            )));
        }
        lock(&self.commands).push(command);
        Ok(())
    }
}

/// Amplifier that records power requests
#[derive(Debug, Default)]
pub struct MockAmplifier {
    requests: Mutex<Vec<AmpPower>>,
    unreachable: Mutex<bool>,
}

impl MockAmplifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request fail as if the amplifier address were missing
    pub fn set_unreachable(&self) {
        *lock(&self.unreachable) = true;
    }

    /// Power requests received, in order (including failed ones)
    pub fn requests(&self) -> Vec<AmpPower> {
        lock(&self.requests).clone()
    }
}

impl Amplifier for MockAmplifier {
    async fn set_power(&self, state: AmpPower) -> Result<()> {
        lock(&self.requests).push(state);
        if *lock(&self.unreachable) {
            return Err(AvError::Connection("Amplifier address not configured".to_string()));
        }
        Ok(())
    }
}
