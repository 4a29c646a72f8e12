//! Digital gamepad state shared between the poll thread and the UI thread.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use serde::{Deserialize, Serialize};

/// Every input a bound gamepad button can refer to. Stick half-axes and
/// triggers are digitized before they get here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamepadInput {
    LeftStickYUp,
    LeftStickYDown,
    LeftStickXRight,
    LeftStickXLeft,
    RightStickYUp,
    RightStickYDown,
    RightStickXRight,
    RightStickXLeft,
    LeftTrigger,
    RightTrigger,
    LeftBumper,
    RightBumper,
    A,
    B,
    X,
    Y,
    LeftThumb,
    RightThumb,
    Select,
    Start,
    DPadLeft,
    DPadRight,
    DPadUp,
    DPadDown,
}

impl GamepadInput {
    pub const ALL: [GamepadInput; 24] = [
        GamepadInput::LeftStickYUp,
        GamepadInput::LeftStickYDown,
        GamepadInput::LeftStickXRight,
        GamepadInput::LeftStickXLeft,
        GamepadInput::RightStickYUp,
        GamepadInput::RightStickYDown,
        GamepadInput::RightStickXRight,
        GamepadInput::RightStickXLeft,
        GamepadInput::LeftTrigger,
        GamepadInput::RightTrigger,
        GamepadInput::LeftBumper,
        GamepadInput::RightBumper,
        GamepadInput::A,
        GamepadInput::B,
        GamepadInput::X,
        GamepadInput::Y,
        GamepadInput::LeftThumb,
        GamepadInput::RightThumb,
        GamepadInput::Select,
        GamepadInput::Start,
        GamepadInput::DPadLeft,
        GamepadInput::DPadRight,
        GamepadInput::DPadUp,
        GamepadInput::DPadDown,
    ];

    #[inline]
    pub fn bit(self) -> u32 {
        1u32 << (self as u32)
    }

    pub fn name(self) -> &'static str {
        match self {
            GamepadInput::LeftStickYUp => "left_stick_y_up",
            GamepadInput::LeftStickYDown => "left_stick_y_down",
            GamepadInput::LeftStickXRight => "left_stick_x_right",
            GamepadInput::LeftStickXLeft => "left_stick_x_left",
            GamepadInput::RightStickYUp => "right_stick_y_up",
            GamepadInput::RightStickYDown => "right_stick_y_down",
            GamepadInput::RightStickXRight => "right_stick_x_right",
            GamepadInput::RightStickXLeft => "right_stick_x_left",
            GamepadInput::LeftTrigger => "left_trigger",
            GamepadInput::RightTrigger => "right_trigger",
            GamepadInput::LeftBumper => "left_bumper",
            GamepadInput::RightBumper => "right_bumper",
            GamepadInput::A => "a",
            GamepadInput::B => "b",
            GamepadInput::X => "x",
            GamepadInput::Y => "y",
            GamepadInput::LeftThumb => "left_thumb",
            GamepadInput::RightThumb => "right_thumb",
            GamepadInput::Select => "select",
            GamepadInput::Start => "start",
            GamepadInput::DPadLeft => "d_pad_left",
            GamepadInput::DPadRight => "d_pad_right",
            GamepadInput::DPadUp => "d_pad_up",
            GamepadInput::DPadDown => "d_pad_down",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        GamepadInput::ALL.into_iter().find(|i| i.name() == name)
    }
}

/// Which of the 24 inputs are active right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GamepadState(u32);

impl GamepadState {
    pub const NEUTRAL: GamepadState = GamepadState(0);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits & ((1 << GamepadInput::ALL.len()) - 1))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_active(self, input: GamepadInput) -> bool {
        self.0 & input.bit() != 0
    }

    pub fn set(&mut self, input: GamepadInput, active: bool) {
        if active {
            self.0 |= input.bit();
        } else {
            self.0 &= !input.bit();
        }
    }

    pub fn with(mut self, input: GamepadInput, active: bool) -> Self {
        self.set(input, active);
        self
    }

    /// Inputs active here but not in `earlier`.
    pub fn newly_active(self, earlier: GamepadState) -> GamepadState {
        GamepadState(self.0 & !earlier.0)
    }

    pub fn intersection(self, other: GamepadState) -> GamepadState {
        GamepadState(self.0 & other.0)
    }

    pub fn active(self) -> impl Iterator<Item = GamepadInput> {
        GamepadInput::ALL
            .into_iter()
            .filter(move |i| self.is_active(*i))
    }
}

/// Creates the single writer and the readers of a shared gamepad state.
pub fn gamepad_state() -> (GamepadStateWriter, GamepadStateReader) {
    let cell = Arc::new(AtomicU32::new(0));
    (
        GamepadStateWriter { cell: cell.clone() },
        GamepadStateReader { cell },
    )
}

/// The only handle that can change the shared state. Not `Clone`.
#[derive(Debug)]
pub struct GamepadStateWriter {
    cell: Arc<AtomicU32>,
}

impl GamepadStateWriter {
    pub fn store(&self, state: GamepadState) {
        self.cell.store(state.bits(), Ordering::Release);
    }

    pub fn reader(&self) -> GamepadStateReader {
        GamepadStateReader {
            cell: self.cell.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GamepadStateReader {
    cell: Arc<AtomicU32>,
}

impl GamepadStateReader {
    pub fn load(&self) -> GamepadState {
        GamepadState(self.cell.load(Ordering::Acquire))
    }
}
