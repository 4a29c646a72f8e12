//! Background thread that owns the gamepad device.
//!
//! The thread blocks on device activity and republishes the digitized pad
//! state after every wake-up. Missing or vanished devices are routine: the
//! state drops to neutral, the thread sleeps a back-off and tries again. It
//! only exits when the poller is stopped or dropped.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    axis::{AxisComparator, DEFAULT_STICK_THRESHOLD, DEFAULT_TRIGGER_THRESHOLD, RawPadState},
    error::InputError,
    gamepad::{GamepadState, GamepadStateWriter},
};

/// A physical gamepad backend.
pub trait GamepadSource {
    /// Blocks for at most `timeout` waiting for device activity. Returns an
    /// error when no usable device is present.
    fn wait(&mut self, timeout: Duration) -> Result<(), InputError>;

    /// Current reading of the active pad, if any.
    fn read(&mut self) -> Option<RawPadState>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollerConfig {
    pub stick: AxisComparator,
    pub trigger: AxisComparator,
    /// Sleep after a failure before trying again.
    pub backoff: Duration,
    /// Upper bound on one blocking wait; also bounds shutdown latency.
    pub wait_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            stick: AxisComparator::new(DEFAULT_STICK_THRESHOLD),
            trigger: AxisComparator::new(DEFAULT_TRIGGER_THRESHOLD),
            backoff: Duration::from_millis(500),
            wait_timeout: Duration::from_millis(100),
        }
    }
}

pub struct GamepadPoller {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl GamepadPoller {
    /// Starts the poll thread. `open` is called (and retried) on the
    /// thread until it yields a source.
    pub fn spawn<S, F>(
        open: F,
        writer: GamepadStateWriter,
        config: PollerConfig,
    ) -> Result<Self, InputError>
    where
        S: GamepadSource,
        F: FnMut() -> Result<S, InputError> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = thread::Builder::new()
            .name("gbhost-gamepad".into())
            .spawn(move || run(open, writer, config, &stop_flag))
            .map_err(|e| InputError::Spawn(e.to_string()))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("gamepad thread panicked");
        }
    }
}

impl Drop for GamepadPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    const STEP: Duration = Duration::from_millis(25);
    let mut left = total;
    while !left.is_zero() && !stop.load(Ordering::Acquire) {
        let step = left.min(STEP);
        thread::sleep(step);
        left -= step;
    }
}

fn run<S, F>(mut open: F, writer: GamepadStateWriter, config: PollerConfig, stop: &AtomicBool)
where
    S: GamepadSource,
    F: FnMut() -> Result<S, InputError>,
{
    let mut source: Option<S> = None;
    let mut last_error: Option<InputError> = None;

    while !stop.load(Ordering::Acquire) {
        if source.is_none() {
            match open() {
                Ok(src) => {
                    tracing::info!("gamepad backend opened");
                    last_error = None;
                    source = Some(src);
                }
                Err(e) => {
                    if last_error.as_ref() != Some(&e) {
                        tracing::warn!(error = %e, "gamepad backend unavailable, retrying");
                        last_error = Some(e);
                    }
                    writer.store(GamepadState::NEUTRAL);
                    sleep_unless_stopped(config.backoff, stop);
                    continue;
                }
            }
        }
        let Some(src) = source.as_mut() else {
            continue;
        };

        match src.wait(config.wait_timeout) {
            Ok(()) => {
                if last_error.take().is_some() {
                    tracing::info!("gamepad available");
                }
                let state = src
                    .read()
                    .map(|raw| raw.digitize(config.stick, config.trigger))
                    .unwrap_or(GamepadState::NEUTRAL);
                writer.store(state);
            }
            Err(e) => {
                if last_error.as_ref() != Some(&e) {
                    tracing::debug!(error = %e, "gamepad not ready, backing off");
                }
                if e.needs_reopen() {
                    source = None;
                }
                last_error = Some(e);
                writer.store(GamepadState::NEUTRAL);
                sleep_unless_stopped(config.backoff, stop);
            }
        }
    }

    writer.store(GamepadState::NEUTRAL);
    tracing::debug!("gamepad thread stopped");
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex, time::Instant};

    use super::*;
    use crate::gamepad::{GamepadInput, gamepad_state};

    type Script = Arc<Mutex<VecDeque<Result<Option<RawPadState>, InputError>>>>;

    /// Replays scripted wake-ups, then idles with the last reading.
    struct Scripted {
        script: Script,
        current: Option<RawPadState>,
    }

    impl GamepadSource for Scripted {
        fn wait(&mut self, timeout: Duration) -> Result<(), InputError> {
            let next = self.script.lock().expect("script lock").pop_front();
            match next {
                Some(Ok(reading)) => {
                    self.current = reading;
                    Ok(())
                }
                Some(Err(e)) => Err(e),
                None => {
                    thread::sleep(timeout.min(Duration::from_millis(5)));
                    Ok(())
                }
            }
        }

        fn read(&mut self) -> Option<RawPadState> {
            self.current
        }
    }

    fn fast_config() -> PollerConfig {
        PollerConfig {
            backoff: Duration::from_millis(5),
            wait_timeout: Duration::from_millis(5),
            ..PollerConfig::default()
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn pressing(input: GamepadInput) -> RawPadState {
        RawPadState {
            buttons: GamepadState::NEUTRAL.with(input, true),
            ..RawPadState::default()
        }
    }

    #[test]
    fn test_publishes_readings() {
        let (writer, reader) = gamepad_state();
        let script: Script = Arc::new(Mutex::new(VecDeque::from([Ok(Some(pressing(
            GamepadInput::Start,
        )))])));
        let s = script.clone();
        let poller = GamepadPoller::spawn(
            move || {
                Ok(Scripted {
                    script: s.clone(),
                    current: None,
                })
            },
            writer,
            fast_config(),
        )
        .expect("spawn");
        wait_for(|| reader.load().is_active(GamepadInput::Start));
        poller.stop();
        assert_eq!(reader.load(), GamepadState::NEUTRAL);
    }

    #[test]
    fn test_survives_disconnect_and_reconnect() {
        let (writer, reader) = gamepad_state();
        let script: Script = Arc::new(Mutex::new(VecDeque::from([
            Ok(Some(pressing(GamepadInput::A))),
            Err(InputError::Disconnected),
            Err(InputError::NoDevice),
            Ok(Some(pressing(GamepadInput::B))),
        ])));
        let s = script.clone();
        let poller = GamepadPoller::spawn(
            move || {
                Ok(Scripted {
                    script: s.clone(),
                    current: None,
                })
            },
            writer,
            fast_config(),
        )
        .expect("spawn");
        wait_for(|| reader.load().is_active(GamepadInput::B));
        assert!(!reader.load().is_active(GamepadInput::A));
        assert!(poller.is_running());
    }

    #[test]
    fn test_retries_backend_open() {
        let (writer, reader) = gamepad_state();
        let attempts = Arc::new(Mutex::new(0u32));
        let counter = attempts.clone();
        let poller = GamepadPoller::spawn(
            move || {
                let mut n = counter.lock().expect("counter lock");
                *n += 1;
                if *n < 3 {
                    Err(InputError::Backend("not yet".into()))
                } else {
                    Ok(Scripted {
                        script: Arc::new(Mutex::new(VecDeque::from([Ok(Some(pressing(
                            GamepadInput::X,
                        )))]))),
                        current: None,
                    })
                }
            },
            writer,
            fast_config(),
        )
        .expect("spawn");
        wait_for(|| reader.load().is_active(GamepadInput::X));
        assert_eq!(*attempts.lock().expect("counter lock"), 3);
        drop(poller);
    }
}
