//! Logical 8-button handheld joypad.

use serde::{Deserialize, Serialize};

/// Logical buttons, ordered by their bit in [`JoypadSnapshot::bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Start = 4,
    Select = 5,
    B = 6,
    A = 7,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Start,
        Button::Select,
        Button::B,
        Button::A,
    ];

    #[inline]
    pub fn bit(self) -> u8 {
        1u8 << (self as u8)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::Start => "start",
            Button::Select => "select",
            Button::B => "b",
            Button::A => "a",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Button::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// One frame's combined button state, packed so it can cross threads as a
/// single atomic byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct JoypadSnapshot {
    bits: u8,
}

impl JoypadSnapshot {
    pub const RELEASED: JoypadSnapshot = JoypadSnapshot { bits: 0 };

    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        Self { bits }
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.bits
    }

    #[inline]
    pub fn is_pressed(self, button: Button) -> bool {
        self.bits & button.bit() != 0
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.bits |= button.bit();
        } else {
            self.bits &= !button.bit();
        }
    }

    pub fn with(mut self, button: Button, pressed: bool) -> Self {
        self.set(button, pressed);
        self
    }

    pub fn pressed(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.is_pressed(*b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_unique() {
        let all = Button::ALL.iter().fold(0u8, |acc, b| {
            assert_eq!(acc & b.bit(), 0);
            acc | b.bit()
        });
        assert_eq!(all, 0xFF);
    }

    #[test]
    fn set_and_clear() {
        let pad = JoypadSnapshot::RELEASED
            .with(Button::Up, true)
            .with(Button::A, true)
            .with(Button::Up, false);
        assert!(!pad.is_pressed(Button::Up));
        assert!(pad.is_pressed(Button::A));
        assert_eq!(pad.pressed().collect::<Vec<_>>(), vec![Button::A]);
    }

    #[test]
    fn names_round_trip() {
        for b in Button::ALL {
            assert_eq!(Button::from_name(b.name()), Some(b));
        }
        assert_eq!(Button::from_name("turbo"), None);
    }
}
