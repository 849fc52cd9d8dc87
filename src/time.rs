//! Time sources for the frame loop.
//!
//! The driver asks a [`Clock`] for the current time once per frame and
//! integrates `now - last` literally: no clamping, no sub-stepping. A host
//! that was paused for ten seconds delivers a ten second step.
//!
//! # Example
//!
//! ```ignore
//! use trailsim::time::{Clock, ManualClock};
//!
//! let clock = ManualClock::new(0.0);
//! let handle = clock.clone();
//! handle.advance(0.5);
//! assert_eq!(clock.now_secs(), 0.5);
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time in seconds.
pub trait Clock {
    fn now_secs(&self) -> f64;
}

/// Wall-clock time since the clock was created.
#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> f64 {
        self.now.get()
    }
}

/// Frame counting and a periodically refreshed FPS estimate.
#[derive(Debug)]
pub struct FrameTimer {
    /// Total frames since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    /// Time of last FPS calculation, in clock seconds.
    fps_update_time: Option<f64>,
    /// How often to update FPS calculation.
    fps_update_interval: Duration,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: None,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Record a finished frame at clock time `now`.
    ///
    /// Returns the new estimate whenever it is refreshed.
    pub fn tick(&mut self, now: f64) -> Option<f32> {
        self.frame_count += 1;

        let Some(since) = self.fps_update_time else {
            self.fps_update_time = Some(now);
            self.fps_frame_count = self.frame_count;
            return None;
        };

        let elapsed = now - since;
        if elapsed >= self.fps_update_interval.as_secs_f64() {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = (frames_since as f64 / elapsed) as f32;
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = Some(now);
            return Some(self.fps);
        }
        None
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Calculated frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
