use gbhost_runtime::{Button, JoypadSnapshot};

use crate::{
    bindings::ButtonBindings,
    gamepad::{GamepadState, GamepadStateReader},
    keyboard::KeyboardHeldSet,
    rebind::Rebind,
};

/// Merges the keyboard and the gamepad into one joypad snapshot per frame.
///
/// Both sources act as independent controllers: a button is pressed when
/// either device reports its bound input active.
pub struct InputAggregator {
    bindings: ButtonBindings,
    gamepad: GamepadStateReader,
}

impl InputAggregator {
    pub fn new(bindings: ButtonBindings, gamepad: GamepadStateReader) -> Self {
        Self { bindings, gamepad }
    }

    /// Computes a fresh snapshot. Nothing is carried over from earlier
    /// frames.
    pub fn snapshot(&self, keyboard: &KeyboardHeldSet) -> JoypadSnapshot {
        merge(&self.bindings, keyboard, self.gamepad.load())
    }

    pub fn bindings(&self) -> &ButtonBindings {
        &self.bindings
    }

    pub fn set_bindings(&mut self, bindings: ButtonBindings) {
        self.bindings = bindings;
    }

    pub fn apply(&mut self, rebind: Rebind) {
        match rebind {
            Rebind::Key { button, key } => self.bindings.set_key(button, Some(key)),
            Rebind::Gamepad { button, input } => self.bindings.set_gamepad(button, Some(input)),
        }
    }
}

pub fn merge(
    bindings: &ButtonBindings,
    keyboard: &KeyboardHeldSet,
    gamepad: GamepadState,
) -> JoypadSnapshot {
    let mut pad = JoypadSnapshot::RELEASED;
    for button in Button::ALL {
        let key = bindings.key_for(button).is_some_and(|k| keyboard.is_held(k));
        let stick = bindings
            .gamepad_for(button)
            .is_some_and(|i| gamepad.is_active(i));
        pad.set(button, key || stick);
    }
    pad
}
