use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use parking_lot::Mutex;

use super::{AudioCallback, AudioDevice, AudioHost, AudioSpec};
use crate::error::RuntimeError;

struct OpenStream {
    generation: u64,
    spec: AudioSpec,
    playing: bool,
    callback: AudioCallback,
}

#[derive(Default)]
struct Shared {
    stream: Mutex<Option<OpenStream>>,
    generation: AtomicU64,
    invocations: AtomicU64,
    fail_open: AtomicBool,
}

/// Audio host whose callback is driven explicitly through a [`ManualPump`].
///
/// Used for headless runs and tests: nothing happens until someone pumps.
#[derive(Clone, Default)]
pub struct ManualHost {
    shared: Arc<Shared>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pump(&self) -> ManualPump {
        ManualPump {
            shared: self.shared.clone(),
        }
    }

    /// Makes subsequent `open` calls fail with a startup failure.
    pub fn fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }
}

impl AudioHost for ManualHost {
    fn open(
        &self,
        spec: AudioSpec,
        callback: AudioCallback,
    ) -> Result<Box<dyn AudioDevice>, RuntimeError> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(RuntimeError::StartupFailure {
                error: "manual host refused to open".to_string(),
            });
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.stream.lock() = Some(OpenStream {
            generation,
            spec,
            playing: false,
            callback,
        });
        Ok(Box::new(ManualDevice {
            shared: self.shared.clone(),
            generation,
        }))
    }
}

pub struct ManualDevice {
    shared: Arc<Shared>,
    generation: u64,
}

impl ManualDevice {
    fn set_playing(&self, playing: bool) {
        let mut stream = self.shared.stream.lock();
        if let Some(open) = stream.as_mut().filter(|s| s.generation == self.generation) {
            open.playing = playing;
        }
    }
}

impl AudioDevice for ManualDevice {
    fn play(&mut self) -> Result<(), RuntimeError> {
        self.set_playing(true);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), RuntimeError> {
        self.set_playing(false);
        Ok(())
    }
}

impl Drop for ManualDevice {
    fn drop(&mut self) {
        let mut stream = self.shared.stream.lock();
        if stream
            .as_ref()
            .is_some_and(|s| s.generation == self.generation)
        {
            *stream = None;
        }
    }
}

/// Drives the callback of whichever device a [`ManualHost`] has open.
#[derive(Clone)]
pub struct ManualPump {
    shared: Arc<Shared>,
}

impl ManualPump {
    /// Invokes the callback once with a buffer of the open spec's size.
    /// Returns `None` when no device is open or it is paused.
    pub fn pull(&self) -> Option<Vec<f32>> {
        let len = self.spec()?.buffer_len();
        let mut buf = vec![0.0; len];
        self.pull_into(&mut buf).then_some(buf)
    }

    /// Invokes the callback with a caller-provided buffer.
    pub fn pull_into(&self, buf: &mut [f32]) -> bool {
        let mut stream = self.shared.stream.lock();
        match stream.as_mut() {
            Some(open) if open.playing => {
                (open.callback)(buf);
                self.shared.invocations.fetch_add(1, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.shared.stream.lock().as_ref().is_some_and(|s| s.playing)
    }

    pub fn is_open(&self) -> bool {
        self.shared.stream.lock().is_some()
    }

    pub fn spec(&self) -> Option<AudioSpec> {
        self.shared.stream.lock().as_ref().map(|s| s.spec)
    }

    /// Number of devices opened so far.
    pub fn opened(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Callback invocations across all devices.
    pub fn invocations(&self) -> u64 {
        self.shared.invocations.load(Ordering::SeqCst)
    }
}
