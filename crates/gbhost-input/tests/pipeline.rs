use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use gbhost_input::{
    ButtonBindings, GamepadInput, GamepadPoller, GamepadSource, GamepadState, InputAggregator,
    InputError, KeyboardHeldSet, PollerConfig, RawPadState, RebindModal, gamepad_state, keys,
};
use gbhost_runtime::{Button, JoypadSnapshot};

/// A pad whose reading the test can change at any time. `None` means
/// unplugged.
#[derive(Clone, Default)]
struct SharedPad(Arc<Mutex<Option<RawPadState>>>);

impl SharedPad {
    fn plug(&self, raw: RawPadState) {
        *self.0.lock().expect("pad lock") = Some(raw);
    }

    fn unplug(&self) {
        *self.0.lock().expect("pad lock") = None;
    }
}

impl GamepadSource for SharedPad {
    fn wait(&mut self, timeout: Duration) -> Result<(), InputError> {
        thread::sleep(timeout);
        match *self.0.lock().expect("pad lock") {
            Some(_) => Ok(()),
            None => Err(InputError::NoDevice),
        }
    }

    fn read(&mut self) -> Option<RawPadState> {
        *self.0.lock().expect("pad lock")
    }
}

fn config() -> PollerConfig {
    PollerConfig {
        backoff: Duration::from_millis(2),
        wait_timeout: Duration::from_millis(1),
        ..PollerConfig::default()
    }
}

fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn stick_and_keyboard_feed_one_snapshot() {
    let pad = SharedPad::default();
    let (writer, reader) = gamepad_state();
    let source = pad.clone();
    let _poller = GamepadPoller::spawn(move || Ok(source.clone()), writer, config()).expect("spawn");

    let mut bindings = ButtonBindings::default();
    bindings.set_gamepad(Button::Up, Some(GamepadInput::LeftStickYUp));
    let agg = InputAggregator::new(bindings, reader);
    let mut kb = KeyboardHeldSet::new();
    kb.press(keys::L);

    pad.plug(RawPadState {
        left_stick: [0.0, 0.8],
        ..RawPadState::default()
    });
    eventually(|| agg.snapshot(&kb).is_pressed(Button::Up));
    let snap = agg.snapshot(&kb);
    assert!(snap.is_pressed(Button::A));
    assert_eq!(snap.pressed().count(), 2);
}

#[test]
fn unplugged_pad_reads_neutral() {
    let pad = SharedPad::default();
    let (writer, reader) = gamepad_state();
    let source = pad.clone();
    let poller = GamepadPoller::spawn(move || Ok(source.clone()), writer, config()).expect("spawn");
    let agg = InputAggregator::new(ButtonBindings::default(), reader.clone());

    pad.plug(RawPadState {
        buttons: GamepadState::NEUTRAL.with(GamepadInput::Start, true),
        ..RawPadState::default()
    });
    eventually(|| agg.snapshot(&KeyboardHeldSet::new()).is_pressed(Button::Start));

    pad.unplug();
    eventually(|| reader.load() == GamepadState::NEUTRAL);
    assert_eq!(agg.snapshot(&KeyboardHeldSet::new()), JoypadSnapshot::RELEASED);

    pad.plug(RawPadState {
        buttons: GamepadState::NEUTRAL.with(GamepadInput::Select, true),
        ..RawPadState::default()
    });
    eventually(|| agg.snapshot(&KeyboardHeldSet::new()).is_pressed(Button::Select));
    assert!(poller.is_running());
}

#[test]
fn captured_rebind_takes_effect() {
    let pad = SharedPad::default();
    pad.plug(RawPadState::default());
    let (writer, reader) = gamepad_state();
    let source = pad.clone();
    let _poller = GamepadPoller::spawn(move || Ok(source.clone()), writer, config()).expect("spawn");
    let mut agg = InputAggregator::new(ButtonBindings::default(), reader.clone());

    let mut modal = RebindModal::new();
    modal
        .begin_gamepad(Button::A, reader, Duration::from_millis(1))
        .expect("spawn capture");
    pad.plug(RawPadState {
        right_trigger: 0.9,
        ..RawPadState::default()
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    let rebind = loop {
        if let Some(r) = modal.poll() {
            break r;
        }
        assert!(Instant::now() < deadline, "capture timed out");
        thread::sleep(Duration::from_millis(1));
    };
    agg.apply(rebind);
    assert_eq!(agg.bindings().gamepad_for(Button::A), Some(GamepadInput::RightTrigger));
    assert!(agg.snapshot(&KeyboardHeldSet::new()).is_pressed(Button::A));
}
