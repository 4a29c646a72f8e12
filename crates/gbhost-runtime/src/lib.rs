pub mod audio;
pub mod clock;
pub mod emulator;
pub mod error;
pub mod frame;
pub mod joypad;
pub mod savestate;
pub mod session;
pub mod transport;

pub use audio::{AudioDevice, AudioHost, AudioSpec, ManualHost, ManualPump};
#[cfg(feature = "cpal")]
pub use audio::CpalHost;
pub use clock::{ClockSource, ClockState, OUTPUT_GAIN};
pub use emulator::{
    CartridgeInfo, CoreError, CoreInit, CoreSetting, EmulationCore, FRAME_LEN, FrameSink,
    PaletteTarget, SCREEN_HEIGHT, SCREEN_WIDTH,
};
pub use error::{RuntimeError, SaveStateError};
pub use frame::{FpsCounter, FramePacer, FrameReader, FrameWriter, Presenter, VideoSurface, frame_channel};
pub use joypad::{Button, JoypadSnapshot};
pub use savestate::{LoadOutcome, SaveStateManager, SlotIndex, SlotInfo};
pub use session::{Session, SessionConfig};
pub use transport::{TransportController, TransportState};
