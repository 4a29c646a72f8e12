#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("gamepad backend unavailable: {0}")]
    Backend(String),
    #[error("no gamepad connected")]
    NoDevice,
    #[error("gamepad disconnected")]
    Disconnected,
    #[error("failed to spawn input thread: {0}")]
    Spawn(String),
}

impl InputError {
    /// Whether the backend itself must be reopened before retrying.
    pub fn needs_reopen(&self) -> bool {
        matches!(self, InputError::Backend(_))
    }
}
