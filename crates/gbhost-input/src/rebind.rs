//! Interactive rebinding of a single joypad button.
//!
//! A capture is tagged with the epoch current when it began. Closing the
//! modal bumps the epoch, so a gamepad worker that finishes late has its
//! result dropped instead of applied.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, TryRecvError};
use gbhost_runtime::Button;

use crate::{
    error::InputError,
    gamepad::{GamepadInput, GamepadStateReader},
    keyboard::keys,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebind {
    Key { button: Button, key: u32 },
    Gamepad { button: Button, input: GamepadInput },
}

enum PendingCapture {
    Key(Button),
    Gamepad {
        button: Button,
        epoch: u64,
        rx: Receiver<(u64, GamepadInput)>,
    },
}

pub struct RebindModal {
    epoch: Arc<AtomicU64>,
    pending: Option<PendingCapture>,
}

impl Default for RebindModal {
    fn default() -> Self {
        Self::new()
    }
}

impl RebindModal {
    pub fn new() -> Self {
        Self {
            epoch: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    /// The button being rebound, if a capture is in progress.
    pub fn target(&self) -> Option<Button> {
        match self.pending.as_ref()? {
            PendingCapture::Key(button) => Some(*button),
            PendingCapture::Gamepad { button, .. } => Some(*button),
        }
    }

    pub fn begin_key(&mut self, button: Button) {
        self.close();
        self.pending = Some(PendingCapture::Key(button));
    }

    /// Starts watching the pad for an input that becomes active after this
    /// call. Inputs already held at the start are ignored until released.
    pub fn begin_gamepad(
        &mut self,
        button: Button,
        reader: GamepadStateReader,
        poll: Duration,
    ) -> Result<(), InputError> {
        self.close();
        let mine = self.epoch.load(Ordering::Acquire);
        let epoch = self.epoch.clone();
        let (tx, rx) = crossbeam_channel::bounded(1);

        thread::Builder::new()
            .name("gbhost-rebind".into())
            .spawn(move || {
                let mut baseline = reader.load();
                while epoch.load(Ordering::Acquire) == mine {
                    let now = reader.load();
                    if let Some(input) = now.newly_active(baseline).active().next() {
                        let _ = tx.send((mine, input));
                        return;
                    }
                    baseline = baseline.intersection(now);
                    thread::sleep(poll);
                }
            })
            .map_err(|e| InputError::Spawn(e.to_string()))?;

        self.pending = Some(PendingCapture::Gamepad {
            button,
            epoch: mine,
            rx,
        });
        Ok(())
    }

    /// Feeds a key press to a keyboard capture. Escape cancels.
    pub fn on_key(&mut self, key: u32) -> Option<Rebind> {
        let button = match self.pending {
            Some(PendingCapture::Key(button)) => button,
            Some(PendingCapture::Gamepad { .. }) if key == keys::ESCAPE => {
                self.close();
                return None;
            }
            _ => return None,
        };
        self.close();
        (key != keys::ESCAPE).then_some(Rebind::Key { button, key })
    }

    /// Collects a finished gamepad capture.
    pub fn poll(&mut self) -> Option<Rebind> {
        let Some(PendingCapture::Gamepad { button, epoch, rx }) = &self.pending else {
            return None;
        };
        let (button, epoch) = (*button, *epoch);
        match rx.try_recv() {
            Ok((tagged, input)) => {
                self.close();
                (tagged == epoch).then_some(Rebind::Gamepad { button, input })
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::debug!(?button, "gamepad capture ended without a result");
                self.close();
                None
            }
        }
    }

    /// Cancels any capture. A worker still running stops at its next check.
    pub fn close(&mut self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.pending = None;
    }
}

impl Drop for RebindModal {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::gamepad::{GamepadState, gamepad_state};

    const POLL: Duration = Duration::from_millis(1);

    fn poll_until(modal: &mut RebindModal) -> Option<Rebind> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while modal.is_open() && Instant::now() < deadline {
            if let Some(r) = modal.poll() {
                return Some(r);
            }
            thread::sleep(POLL);
        }
        None
    }

    #[test]
    fn test_key_capture() {
        let mut modal = RebindModal::new();
        modal.begin_key(Button::Start);
        assert_eq!(modal.target(), Some(Button::Start));
        assert_eq!(
            modal.on_key(90),
            Some(Rebind::Key {
                button: Button::Start,
                key: 90
            })
        );
        assert!(!modal.is_open());
    }

    #[test]
    fn test_escape_cancels() {
        let mut modal = RebindModal::new();
        modal.begin_key(Button::A);
        assert_eq!(modal.on_key(keys::ESCAPE), None);
        assert!(!modal.is_open());
    }

    #[test]
    fn test_gamepad_capture_ignores_held_inputs() {
        let (writer, reader) = gamepad_state();
        writer.store(GamepadState::NEUTRAL.with(GamepadInput::A, true));
        let mut modal = RebindModal::new();
        modal.begin_gamepad(Button::B, reader, POLL).expect("spawn");
        thread::sleep(Duration::from_millis(10));
        assert_eq!(modal.poll(), None);

        writer.store(
            GamepadState::NEUTRAL
                .with(GamepadInput::A, true)
                .with(GamepadInput::X, true),
        );
        assert_eq!(
            poll_until(&mut modal),
            Some(Rebind::Gamepad {
                button: Button::B,
                input: GamepadInput::X
            })
        );
    }

    #[test]
    fn test_close_discards_late_result() {
        let (writer, reader) = gamepad_state();
        let mut modal = RebindModal::new();
        modal.begin_gamepad(Button::A, reader, POLL).expect("spawn");
        modal.close();
        writer.store(GamepadState::NEUTRAL.with(GamepadInput::Y, true));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(modal.poll(), None);
        assert!(!modal.is_open());
    }

    #[test]
    fn test_escape_cancels_gamepad_capture() {
        let (_writer, reader) = gamepad_state();
        let mut modal = RebindModal::new();
        modal.begin_gamepad(Button::A, reader, POLL).expect("spawn");
        assert_eq!(modal.on_key(keys::ESCAPE), None);
        assert!(!modal.is_open());
    }
}
