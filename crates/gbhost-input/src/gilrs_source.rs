//! [`GamepadSource`] backed by gilrs. Follows the first pad that connects
//! and switches to another one when it goes away.

use std::time::Duration;

use gilrs::{Axis, Button as GilrsButton, Event, EventType, GamepadId, Gilrs};

use crate::{
    axis::RawPadState,
    error::InputError,
    gamepad::{GamepadInput, GamepadState},
    poller::GamepadSource,
};

const DIGITAL: [(GilrsButton, GamepadInput); 14] = [
    (GilrsButton::South, GamepadInput::A),
    (GilrsButton::East, GamepadInput::B),
    (GilrsButton::West, GamepadInput::X),
    (GilrsButton::North, GamepadInput::Y),
    (GilrsButton::LeftTrigger, GamepadInput::LeftBumper),
    (GilrsButton::RightTrigger, GamepadInput::RightBumper),
    (GilrsButton::LeftThumb, GamepadInput::LeftThumb),
    (GilrsButton::RightThumb, GamepadInput::RightThumb),
    (GilrsButton::Select, GamepadInput::Select),
    (GilrsButton::Start, GamepadInput::Start),
    (GilrsButton::DPadUp, GamepadInput::DPadUp),
    (GilrsButton::DPadDown, GamepadInput::DPadDown),
    (GilrsButton::DPadLeft, GamepadInput::DPadLeft),
    (GilrsButton::DPadRight, GamepadInput::DPadRight),
];

pub struct GilrsSource {
    gilrs: Gilrs,
    active: Option<GamepadId>,
}

impl GilrsSource {
    pub fn open() -> Result<Self, InputError> {
        let gilrs = Gilrs::new().map_err(|e| {
            tracing::error!("Failed to initialize gilrs: {}", e);
            InputError::Backend(e.to_string())
        })?;
        let active = gilrs
            .gamepads()
            .find(|(_, pad)| pad.is_connected())
            .map(|(id, _)| id);
        Ok(Self { gilrs, active })
    }

    fn handle(&mut self, event: Event) {
        let Event { id, event, .. } = event;
        match event {
            EventType::Connected => {
                let name = self.gilrs.gamepad(id).name().to_string();
                tracing::info!("Gamepad connected: {} ({:?})", name, id);
                self.active.get_or_insert(id);
            }
            EventType::Disconnected => {
                tracing::info!("Gamepad disconnected: {:?}", id);
                if self.active == Some(id) {
                    self.active = self
                        .gilrs
                        .gamepads()
                        .find(|(other, pad)| *other != id && pad.is_connected())
                        .map(|(other, _)| other);
                }
            }
            _ => {}
        }
    }
}

impl GamepadSource for GilrsSource {
    fn wait(&mut self, timeout: Duration) -> Result<(), InputError> {
        if let Some(event) = self.gilrs.next_event_blocking(Some(timeout)) {
            self.handle(event);
            while let Some(event) = self.gilrs.next_event() {
                self.handle(event);
            }
        }
        match self.active {
            Some(id) if self.gilrs.connected_gamepad(id).is_some() => Ok(()),
            Some(_) => {
                self.active = None;
                Err(InputError::Disconnected)
            }
            None => Err(InputError::NoDevice),
        }
    }

    fn read(&mut self) -> Option<RawPadState> {
        let pad = self.gilrs.connected_gamepad(self.active?)?;

        let mut buttons = GamepadState::NEUTRAL;
        for (button, input) in DIGITAL {
            buttons.set(input, pad.is_pressed(button));
        }
        let trigger = |button: GilrsButton, axis: Axis| {
            let pressed = pad.button_data(button).map_or(0.0, |d| d.value());
            pressed.max(pad.value(axis))
        };

        Some(RawPadState {
            buttons,
            left_stick: [pad.value(Axis::LeftStickX), pad.value(Axis::LeftStickY)],
            right_stick: [pad.value(Axis::RightStickX), pad.value(Axis::RightStickY)],
            left_trigger: trigger(GilrsButton::LeftTrigger2, Axis::LeftZ),
            right_trigger: trigger(GilrsButton::RightTrigger2, Axis::RightZ),
        })
    }
}
