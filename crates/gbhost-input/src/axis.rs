//! Analog to digital conversion for sticks and triggers.

use crate::gamepad::{GamepadInput, GamepadState};

pub const DEFAULT_STICK_THRESHOLD: f32 = 0.20;
pub const DEFAULT_TRIGGER_THRESHOLD: f32 = 0.20;

/// Single-band comparator: a reading is active iff its magnitude exceeds
/// the threshold. The same threshold applies on the way in and on the way
/// out, and the output is binary.
///
/// There is no latch. A reading that wobbles across the threshold follows
/// every sample, so 0.21 is active even between readings of 0.19.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisComparator {
    threshold: f32,
}

impl Default for AxisComparator {
    fn default() -> Self {
        Self::new(DEFAULT_STICK_THRESHOLD)
    }
}

impl AxisComparator {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.abs(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// `(positive half active, negative half active)`. NaN is neutral.
    #[inline]
    pub fn halves(&self, value: f32) -> (bool, bool) {
        (value > self.threshold, value < -self.threshold)
    }

    #[inline]
    pub fn is_active(&self, value: f32) -> bool {
        value.abs() > self.threshold
    }
}

/// One raw reading of a physical pad.
///
/// Stick `y` is positive when pushed up. Triggers range over `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawPadState {
    /// Inputs that are digital on the device (face buttons, d-pad, ...).
    pub buttons: GamepadState,
    pub left_stick: [f32; 2],
    pub right_stick: [f32; 2],
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl RawPadState {
    pub fn digitize(&self, stick: AxisComparator, trigger: AxisComparator) -> GamepadState {
        let mut state = self.buttons;
        let sticks = [
            (
                self.left_stick,
                [
                    GamepadInput::LeftStickXRight,
                    GamepadInput::LeftStickXLeft,
                    GamepadInput::LeftStickYUp,
                    GamepadInput::LeftStickYDown,
                ],
            ),
            (
                self.right_stick,
                [
                    GamepadInput::RightStickXRight,
                    GamepadInput::RightStickXLeft,
                    GamepadInput::RightStickYUp,
                    GamepadInput::RightStickYDown,
                ],
            ),
        ];
        for ([x, y], [right, left, up, down]) in sticks {
            let (pos, neg) = stick.halves(x);
            state.set(right, pos);
            state.set(left, neg);
            let (pos, neg) = stick.halves(y);
            state.set(up, pos);
            state.set(down, neg);
        }
        // A device may also report a trigger as a digital button.
        let left = state.is_active(GamepadInput::LeftTrigger);
        let right = state.is_active(GamepadInput::RightTrigger);
        state.set(
            GamepadInput::LeftTrigger,
            left || trigger.is_active(self.left_trigger),
        );
        state.set(
            GamepadInput::RightTrigger,
            right || trigger.is_active(self.right_trigger),
        );
        state
    }
}
