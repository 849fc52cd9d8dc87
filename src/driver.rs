//! The frame driver: one strict `Update -> Draw -> (Post) -> Composite`
//! sequence per display refresh.
//!
//! All passes of a frame are recorded into one command encoder and
//! submitted together, so GPU execution order is recording order. Role
//! swaps happen between recordings: each pass captures the buffers and
//! textures of the roles current when it was recorded, and nothing of frame
//! `k + 1` is recorded before frame `k` has been submitted.

use crate::error::FrameError;
use crate::gpu::pipeline::Pipeline;
use crate::gpu::GpuContext;
use crate::roles::Slot;
use crate::time::{Clock, FrameTimer, MonotonicClock};

/// The stages of one frame, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Advance states (read role to write role), then swap state roles.
    Update,
    /// Draw the new states into the trail, then swap trail roles.
    Draw,
    /// Post-process the trail. Extended variant only.
    Post,
    /// Present the read-role trail.
    Composite,
}

impl FramePhase {
    /// The phase after this one, or `None` once the frame is complete.
    pub fn next(self, with_post: bool) -> Option<FramePhase> {
        match self {
            FramePhase::Update => Some(FramePhase::Draw),
            FramePhase::Draw if with_post => Some(FramePhase::Post),
            FramePhase::Draw => Some(FramePhase::Composite),
            FramePhase::Post => Some(FramePhase::Composite),
            FramePhase::Composite => None,
        }
    }

    /// Every phase of one frame, in order.
    pub fn schedule(with_post: bool) -> impl Iterator<Item = FramePhase> {
        std::iter::successors(Some(FramePhase::Update), move |phase| phase.next(with_post))
    }
}

/// What one frame did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Index of the frame, starting at 0.
    pub frame: u64,
    pub delta_time: f32,
    /// State buffer holding this frame's output (read role after the frame).
    pub state_read: Slot,
    /// Trail texture that was composited.
    pub trail_read: Slot,
}

/// Delta time bookkeeping against a [`Clock`].
#[derive(Debug)]
pub struct FrameTiming<C: Clock> {
    clock: C,
    start_time: f64,
    last_frame_time: f64,
}

impl<C: Clock> FrameTiming<C> {
    pub fn new(clock: C) -> Self {
        let now = clock.now_secs();
        Self {
            clock,
            start_time: now,
            last_frame_time: now,
        }
    }

    /// `(now - last, now - start)`, then `last = now`.
    pub fn advance(&mut self) -> (f32, f32) {
        let now = self.clock.now_secs();
        let delta_time = (now - self.last_frame_time) as f32;
        self.last_frame_time = now;
        (delta_time, (now - self.start_time) as f32)
    }

    pub fn now(&self) -> f64 {
        self.clock.now_secs()
    }
}

/// Owns the pipeline (and with it both role selectors) plus the timing
/// state carried from one frame to the next.
pub struct FrameDriver<C: Clock = MonotonicClock> {
    pipeline: Pipeline,
    timing: FrameTiming<C>,
    timer: FrameTimer,
    frame: u64,
}

impl FrameDriver<MonotonicClock> {
    pub fn new(pipeline: Pipeline) -> Self {
        Self::with_clock(pipeline, MonotonicClock::new())
    }
}

impl<C: Clock> FrameDriver<C> {
    pub fn with_clock(pipeline: Pipeline, clock: C) -> Self {
        Self {
            pipeline,
            timing: FrameTiming::new(clock),
            timer: FrameTimer::new(),
            frame: 0,
        }
    }

    /// Run one frame with `deltaTime = now - lastFrameTime`, compositing
    /// into `target`.
    pub fn frame(
        &mut self,
        gpu: &GpuContext,
        target: &wgpu::TextureView,
    ) -> Result<FrameReport, FrameError> {
        let (delta_time, elapsed) = self.timing.advance();
        self.run_frame(gpu, target, delta_time, elapsed)
    }

    /// Run one frame with a fixed `delta_time`. The clock still moves the
    /// last-frame timestamp forward.
    pub fn frame_with_delta(
        &mut self,
        gpu: &GpuContext,
        target: &wgpu::TextureView,
        delta_time: f32,
    ) -> Result<FrameReport, FrameError> {
        let (_, elapsed) = self.timing.advance();
        self.run_frame(gpu, target, delta_time, elapsed)
    }

    /// Composite the current trail again without running any other stage.
    /// Touches no role.
    pub fn composite_only(&self, gpu: &GpuContext, target: &wgpu::TextureView) -> Result<(), FrameError> {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Composite Encoder"),
            });
        self.pipeline.encode_composite(&mut encoder, target);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        check_device(gpu)
    }

    fn run_frame(
        &mut self,
        gpu: &GpuContext,
        target: &wgpu::TextureView,
        delta_time: f32,
        elapsed: f32,
    ) -> Result<FrameReport, FrameError> {
        check_device(gpu)?;

        self.pipeline
            .write_uniforms(&gpu.queue, delta_time, elapsed, self.frame);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let with_post = self.pipeline.has_post();
        for phase in FramePhase::schedule(with_post) {
            log::trace!("frame {}: {:?}", self.frame, phase);
            match phase {
                FramePhase::Update => {
                    self.pipeline.encode_update(&mut encoder);
                    self.pipeline.swap_states();
                }
                FramePhase::Draw => {
                    self.pipeline.encode_draw(&mut encoder);
                    self.pipeline.swap_trail();
                }
                FramePhase::Post => {
                    self.pipeline.encode_post(&mut encoder);
                }
                FramePhase::Composite => {
                    self.pipeline.encode_composite(&mut encoder, target);
                }
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        check_device(gpu)?;

        let report = FrameReport {
            frame: self.frame,
            delta_time,
            state_read: self.pipeline.states().read_slot(),
            trail_read: self.pipeline.trail().read_slot(),
        };
        self.frame += 1;

        if let Some(fps) = self.timer.tick(self.timing.now()) {
            log::debug!("{:.1} fps ({} frames)", fps, self.timer.frame());
        }

        Ok(report)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Number of frames completed.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    pub fn fps(&self) -> f32 {
        self.timer.fps()
    }
}

fn check_device(gpu: &GpuContext) -> Result<(), FrameError> {
    match gpu.take_device_error() {
        Some(message) => Err(FrameError::Device(message)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    #[test]
    fn test_schedule_without_post() {
        let phases: Vec<_> = FramePhase::schedule(false).collect();
        assert_eq!(
            phases,
            vec![FramePhase::Update, FramePhase::Draw, FramePhase::Composite]
        );
    }

    #[test]
    fn test_schedule_with_post() {
        let phases: Vec<_> = FramePhase::schedule(true).collect();
        assert_eq!(
            phases,
            vec![
                FramePhase::Update,
                FramePhase::Draw,
                FramePhase::Post,
                FramePhase::Composite
            ]
        );
    }

    #[test]
    fn test_composite_ends_frame() {
        assert_eq!(FramePhase::Composite.next(true), None);
        assert_eq!(FramePhase::Composite.next(false), None);
    }

    #[test]
    fn test_delta_is_now_minus_last() {
        let clock = ManualClock::new(10.0);
        let mut timing = FrameTiming::new(clock.clone());

        clock.advance(0.25);
        let (dt, elapsed) = timing.advance();
        assert_eq!(dt, 0.25);
        assert_eq!(elapsed, 0.25);

        clock.advance(0.5);
        let (dt, elapsed) = timing.advance();
        assert_eq!(dt, 0.5);
        assert_eq!(elapsed, 0.75);
    }

    #[test]
    fn test_large_delta_is_not_clamped() {
        let clock = ManualClock::new(0.0);
        let mut timing = FrameTiming::new(clock.clone());
        clock.advance(10.0);
        let (dt, _) = timing.advance();
        assert_eq!(dt, 10.0);
    }

    #[test]
    fn test_unchanged_clock_gives_zero_delta() {
        let clock = ManualClock::new(3.0);
        let mut timing = FrameTiming::new(clock);
        assert_eq!(timing.advance().0, 0.0);
        assert_eq!(timing.advance().0, 0.0);
    }
}
