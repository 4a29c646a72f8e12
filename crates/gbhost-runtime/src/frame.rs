//! Frame handoff between the audio-clocked core and presentation.
//!
//! Three RGB24 planes rotate between the writer (audio thread), one parked
//! "latest" slot and the reader (UI thread). Neither side ever waits: the
//! writer swaps its finished plane into the latest slot, the reader swaps its
//! consumed plane out of it. Frames the reader never picks up are
//! overwritten, so there is no queue to fall behind on.

use std::{
    cell::UnsafeCell,
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    emulator::{FRAME_LEN, FrameSink},
    error::RuntimeError,
};

const INDEX_MASK: u8 = 0b011;
const FRESH: u8 = 0b100;

struct Planes {
    planes: [UnsafeCell<Box<[u8]>>; 3],
    /// Index of the parked plane, tagged with `FRESH` when unread.
    latest: AtomicU8,
    frame_seq: AtomicU64,
}

// Each plane index is owned by exactly one of writer / latest / reader at a
// time; ownership only moves through `latest.swap`.
unsafe impl Sync for Planes {}

/// Creates a connected writer/reader pair. Planes start black.
pub fn frame_channel() -> (FrameWriter, FrameReader) {
    let shared = Arc::new(Planes {
        planes: std::array::from_fn(|_| UnsafeCell::new(vec![0u8; FRAME_LEN].into_boxed_slice())),
        latest: AtomicU8::new(1),
        frame_seq: AtomicU64::new(0),
    });
    (
        FrameWriter {
            shared: shared.clone(),
            back: 0,
        },
        FrameReader { shared, front: 2 },
    )
}

/// Producer half, owned by whoever holds the core.
pub struct FrameWriter {
    shared: Arc<Planes>,
    back: u8,
}

impl FrameWriter {
    /// Copies `rgb` into the back plane and publishes it.
    ///
    /// Shorter input leaves the tail of the plane untouched; longer input is
    /// truncated.
    pub fn publish(&mut self, rgb: &[u8]) {
        debug_assert_eq!(rgb.len(), FRAME_LEN);
        // SAFETY: `back` is owned by this writer until swapped out below.
        let plane = unsafe { &mut *self.shared.planes[self.back as usize].get() };
        let n = rgb.len().min(plane.len());
        plane[..n].copy_from_slice(&rgb[..n]);

        let prev = self
            .shared
            .latest
            .swap(self.back | FRESH, Ordering::AcqRel);
        self.back = prev & INDEX_MASK;
        self.shared.frame_seq.fetch_add(1, Ordering::Release);
    }
}

impl FrameSink for FrameWriter {
    fn frame_ready(&mut self, rgb: &[u8]) {
        self.publish(rgb);
    }
}

/// Consumer half, owned by presentation.
pub struct FrameReader {
    shared: Arc<Planes>,
    front: u8,
}

impl FrameReader {
    /// Takes the most recently published frame if one arrived since the last
    /// call.
    pub fn latest(&mut self) -> Option<&[u8]> {
        if self.shared.latest.load(Ordering::Acquire) & FRESH == 0 {
            return None;
        }
        let prev = self.shared.latest.swap(self.front, Ordering::AcqRel);
        self.front = prev & INDEX_MASK;
        Some(self.current())
    }

    /// The frame last returned by [`latest`](Self::latest), or black.
    pub fn current(&self) -> &[u8] {
        // SAFETY: `front` is owned by this reader until the next swap.
        unsafe { &*self.shared.planes[self.front as usize].get() }
    }

    /// Number of frames published so far, including dropped ones.
    pub fn frame_seq(&self) -> u64 {
        self.shared.frame_seq.load(Ordering::Acquire)
    }
}

pub const DEFAULT_PRESENT_HZ: u32 = 60;
const MAX_SLEEP_CHUNK: Duration = Duration::from_millis(4);
const SPIN_THRESHOLD: Duration = Duration::from_micros(300);

/// Fixed-cadence tick for the presentation loop.
#[derive(Debug, Clone)]
pub struct FramePacer {
    period: Duration,
    next_deadline: Instant,
}

impl FramePacer {
    pub fn new(hz: u32) -> Self {
        Self {
            period: Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1))),
            next_deadline: Instant::now(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }

    /// Schedules the next deadline. When more than two periods behind the
    /// schedule is re-anchored at `now` instead of bursting to catch up.
    pub fn advance(&mut self, now: Instant) {
        self.next_deadline += self.period;
        if now > self.next_deadline && now.duration_since(self.next_deadline) > self.period * 2 {
            self.next_deadline = now;
        }
    }

    /// Sleeps the remainder of the current period, then advances.
    pub fn wait(&mut self) {
        loop {
            let now = Instant::now();
            let remaining = self.time_until_next(now);
            if remaining.is_zero() {
                break;
            }
            if remaining > SPIN_THRESHOLD {
                thread::sleep((remaining - SPIN_THRESHOLD).min(MAX_SLEEP_CHUNK));
            } else {
                std::hint::spin_loop();
            }
        }
        self.advance(Instant::now());
    }
}

pub const MIN_SCALE: u8 = 1;
pub const MAX_SCALE: u8 = 6;
pub const DEFAULT_SCALE: u8 = 4;

/// A host surface that accepts unscaled RGB24 frames.
pub trait VideoSurface {
    /// Copies one `160x144` RGB24 frame onto the surface.
    fn blit(&mut self, rgb: &[u8]);

    /// Shows the surface at an integer scale.
    fn present(&mut self, scale: u8);
}

/// Moves published frames onto a surface. Owns the display scale, which is
/// independent of the clock.
pub struct Presenter<S> {
    reader: FrameReader,
    surface: S,
    scale: u8,
    blits: u64,
}

impl<S: VideoSurface> Presenter<S> {
    pub fn new(reader: FrameReader, surface: S) -> Self {
        Self {
            reader,
            surface,
            scale: DEFAULT_SCALE,
            blits: 0,
        }
    }

    /// Presents the newest frame, if any. Returns whether a new frame was
    /// copied.
    pub fn present_latest(&mut self) -> bool {
        let Some(frame) = self.reader.latest() else {
            return false;
        };
        self.surface.blit(frame);
        self.surface.present(self.scale);
        self.blits += 1;
        true
    }

    pub fn set_scale(&mut self, scale: u8) -> Result<(), RuntimeError> {
        if !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
            return Err(RuntimeError::InvalidScale { scale });
        }
        self.scale = scale;
        self.surface.present(scale);
        Ok(())
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn blits(&self) -> u64 {
        self.blits
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

/// Frames presented per wall-clock second, counted over whole-second
/// windows.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    last: u32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            last: 0,
        }
    }

    pub fn frame(&mut self) {
        self.frames += 1;
    }

    /// Closes the window once a second has passed and returns its count.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        if now.saturating_duration_since(self.window_start) < Duration::from_secs(1) {
            return None;
        }
        self.last = self.frames;
        self.frames = 0;
        self.window_start = now;
        Some(self.last)
    }

    /// Count of the last completed window.
    pub fn last(&self) -> u32 {
        self.last
    }
}
