//! Keyboard and gamepad input for the Game Boy host.
//!
//! The gamepad is owned by a background [`GamepadPoller`]; the UI thread
//! keeps a [`KeyboardHeldSet`] and asks the [`InputAggregator`] for a fresh
//! [`gbhost_runtime::JoypadSnapshot`] once per frame.

pub mod aggregator;
pub mod axis;
pub mod bindings;
pub mod error;
pub mod gamepad;
#[cfg(all(
    feature = "gamepad",
    not(target_arch = "wasm32"),
    not(target_os = "android"),
    not(target_os = "ios")
))]
pub mod gilrs_source;
pub mod keyboard;
pub mod poller;
pub mod rebind;

pub use aggregator::{InputAggregator, merge};
pub use axis::{AxisComparator, DEFAULT_STICK_THRESHOLD, DEFAULT_TRIGGER_THRESHOLD, RawPadState};
pub use bindings::ButtonBindings;
pub use error::InputError;
pub use gamepad::{
    GamepadInput, GamepadState, GamepadStateReader, GamepadStateWriter, gamepad_state,
};
pub use keyboard::{KeyboardHeldSet, keys};
pub use poller::{GamepadPoller, GamepadSource, PollerConfig};
pub use rebind::{Rebind, RebindModal};
