use std::collections::BTreeMap;

use gbhost_runtime::Button;
use serde::{Deserialize, Serialize};

use crate::{gamepad::GamepadInput, keyboard::keys};

/// Per-button keyboard and gamepad bindings. A button may be bound on both
/// devices, either or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonBindings {
    #[serde(default = "default_keyboard")]
    pub keyboard: BTreeMap<Button, u32>,
    #[serde(default = "default_gamepad")]
    pub gamepad: BTreeMap<Button, GamepadInput>,
}

impl Default for ButtonBindings {
    fn default() -> Self {
        Self {
            keyboard: default_keyboard(),
            gamepad: default_gamepad(),
        }
    }
}

pub fn default_keyboard() -> BTreeMap<Button, u32> {
    BTreeMap::from([
        (Button::Up, keys::W),
        (Button::Down, keys::S),
        (Button::Left, keys::A),
        (Button::Right, keys::D),
        (Button::Start, keys::RETURN),
        (Button::Select, keys::SHIFT),
        (Button::B, keys::K),
        (Button::A, keys::L),
    ])
}

pub fn default_gamepad() -> BTreeMap<Button, GamepadInput> {
    BTreeMap::from([
        (Button::Up, GamepadInput::DPadUp),
        (Button::Down, GamepadInput::DPadDown),
        (Button::Left, GamepadInput::DPadLeft),
        (Button::Right, GamepadInput::DPadRight),
        (Button::Start, GamepadInput::Start),
        (Button::Select, GamepadInput::Select),
        (Button::B, GamepadInput::B),
        (Button::A, GamepadInput::A),
    ])
}

impl ButtonBindings {
    pub fn key_for(&self, button: Button) -> Option<u32> {
        self.keyboard.get(&button).copied()
    }

    pub fn gamepad_for(&self, button: Button) -> Option<GamepadInput> {
        self.gamepad.get(&button).copied()
    }

    pub fn set_key(&mut self, button: Button, key: Option<u32>) {
        match key {
            Some(key) => self.keyboard.insert(button, key),
            None => self.keyboard.remove(&button),
        };
    }

    pub fn set_gamepad(&mut self, button: Button, input: Option<GamepadInput>) {
        match input {
            Some(input) => self.gamepad.insert(button, input),
            None => self.gamepad.remove(&button),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_button() {
        let b = ButtonBindings::default();
        for button in Button::ALL {
            assert!(b.key_for(button).is_some());
            assert!(b.gamepad_for(button).is_some());
        }
        assert_eq!(b.key_for(Button::Start), Some(16_777_220));
        assert_eq!(b.key_for(Button::Select), Some(16_777_248));
    }

    #[test]
    fn test_serialized_by_name() {
        let json = serde_json::to_value(ButtonBindings::default()).expect("serialize");
        assert_eq!(json["keyboard"]["up"], 87);
        assert_eq!(json["gamepad"]["a"], "a");
        assert_eq!(json["gamepad"]["left"], "d_pad_left");
    }

    #[test]
    fn test_unbind() {
        let mut b = ButtonBindings::default();
        b.set_key(Button::A, None);
        b.set_gamepad(Button::A, None);
        assert_eq!(b.key_for(Button::A), None);
        assert_eq!(b.gamepad_for(Button::A), None);
    }
}
