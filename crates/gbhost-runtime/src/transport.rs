//! Power / pause / reset / cartridge-swap state machine.
//!
//! The transport is the only thing that starts or stops the clock. The
//! clock runs exactly while the transport is `Running`; in `PoweredOff` and
//! `Paused` the device is stopped and the core lock is held.

use std::path::Path;

use crate::{
    clock::{ClockSource, ClockState},
    emulator::{CartridgeInfo, EmulationCore},
    error::RuntimeError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    PoweredOff,
    Running,
    Paused,
}

#[derive(Debug)]
pub struct TransportController {
    state: TransportState,
    program: Option<CartridgeInfo>,
}

impl Default for TransportController {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportController {
    pub fn new() -> Self {
        Self {
            state: TransportState::PoweredOff,
            program: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn program(&self) -> Option<&CartridgeInfo> {
        self.program.as_ref()
    }

    /// Loads `path` and powers it on. On failure nothing changes: the
    /// previous program stays loaded and the clock is back where it was.
    pub fn insert_cartridge(
        &mut self,
        clock: &mut ClockSource,
        path: &Path,
    ) -> Result<CartridgeInfo, RuntimeError> {
        let prior = self.state;
        clock.pause()?;

        let loaded = match clock.core_mut() {
            Ok(core) => core.insert_cartridge(path).map(|info| {
                core.power_on();
                info
            }),
            Err(e) => {
                self.restore(clock, prior);
                return Err(e);
            }
        };

        match loaded {
            Ok(info) => {
                clock.resume()?;
                tracing::info!(title = %info.title, path = %path.display(), "cartridge inserted");
                self.program = Some(info.clone());
                self.state = TransportState::Running;
                Ok(info)
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), error = %reason, "cartridge rejected");
                self.restore(clock, prior);
                Err(RuntimeError::CartridgeRejected {
                    path: path.to_path_buf(),
                    reason,
                })
            }
        }
    }

    fn restore(&mut self, clock: &mut ClockSource, prior: TransportState) {
        if prior == TransportState::Running {
            if let Err(e) = clock.resume() {
                tracing::error!(error = %e, "failed to resume clock after aborted operation");
                self.state = TransportState::Paused;
                return;
            }
        }
        self.state = prior;
    }

    /// Full reset of the loaded program, from any state.
    pub fn power_on(&mut self, clock: &mut ClockSource) -> Result<(), RuntimeError> {
        self.reset_into_running(clock, "power_on")
    }

    /// Same as power-on; kept separate so callers can express intent.
    pub fn reset(&mut self, clock: &mut ClockSource) -> Result<(), RuntimeError> {
        self.reset_into_running(clock, "reset")
    }

    fn reset_into_running(
        &mut self,
        clock: &mut ClockSource,
        op: &'static str,
    ) -> Result<(), RuntimeError> {
        if self.program.is_none() {
            return Err(RuntimeError::NoCartridge);
        }
        clock.pause()?;
        match clock.core_mut() {
            Ok(core) => core.power_on(),
            Err(e) => {
                let prior = self.state;
                self.restore(clock, prior);
                return Err(e);
            }
        }
        clock.resume()?;
        self.state = TransportState::Running;
        tracing::info!(op, "transport running");
        Ok(())
    }

    pub fn pause(&mut self, clock: &mut ClockSource) -> Result<(), RuntimeError> {
        match self.state {
            TransportState::Running => {
                clock.pause()?;
                self.state = TransportState::Paused;
                tracing::info!("transport paused");
                Ok(())
            }
            TransportState::Paused => Ok(()),
            from => Err(RuntimeError::InvalidTransition { from, op: "pause" }),
        }
    }

    pub fn resume(&mut self, clock: &mut ClockSource) -> Result<(), RuntimeError> {
        match self.state {
            TransportState::Paused => {
                clock.resume()?;
                self.state = TransportState::Running;
                tracing::info!("transport resumed");
                Ok(())
            }
            TransportState::Running => Ok(()),
            from => Err(RuntimeError::InvalidTransition { from, op: "resume" }),
        }
    }

    /// Stops the machine. The core flushes battery saves; the cartridge
    /// stays inserted so a later power-on restarts it.
    pub fn power_off(&mut self, clock: &mut ClockSource) -> Result<(), RuntimeError> {
        if self.state == TransportState::PoweredOff {
            return Ok(());
        }
        clock.pause()?;
        clock.core_mut()?.power_off();
        self.state = TransportState::PoweredOff;
        tracing::info!("transport powered off");
        Ok(())
    }

    /// Brings a `Running` transport down to `Paused` when the clock stopped
    /// underneath it.
    pub(crate) fn clock_halted(&mut self, clock: &ClockSource) {
        if self.state == TransportState::Running && clock.state() != ClockState::Running {
            tracing::warn!("clock stopped unexpectedly, transport paused");
            self.state = TransportState::Paused;
        }
    }

    /// Runs `f` with exclusive access to the core. Only valid while paused.
    pub fn with_paused_core<R>(
        &self,
        clock: &mut ClockSource,
        f: impl FnOnce(&mut dyn EmulationCore, &CartridgeInfo) -> R,
    ) -> Result<R, RuntimeError> {
        if self.state != TransportState::Paused {
            return Err(RuntimeError::InvalidTransition {
                from: self.state,
                op: "access core",
            });
        }
        let program = self.program.as_ref().ok_or(RuntimeError::NoCartridge)?;
        Ok(f(clock.core_mut()?, program))
    }
}
