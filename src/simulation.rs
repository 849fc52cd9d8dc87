//! Simulation builder and runner.
//!
//! [`Simulation::run`] opens a window and drives one frame per display
//! refresh until the window is closed or a frame fails.
//! [`Simulation::headless`] builds the same pipeline against an offscreen
//! target and lets the caller step frames by hand.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::SimConfig;
use crate::driver::{FrameDriver, FrameReport};
use crate::error::{FrameError, SetupError, SimulationError};
use crate::gpu::pipeline::Pipeline;
use crate::gpu::readback;
use crate::gpu::GpuContext;
use crate::particle::ParticleState;
use crate::roles::Slot;
use crate::spawn::{FixedStates, RandomInitializer, UniformInitializer};
use crate::time::{Clock, MonotonicClock};

/// Format of the offscreen composite target in headless mode.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A particle simulation builder.
///
/// # Example
///
/// ```ignore
/// use trailsim::prelude::*;
///
/// let config = SimConfig {
///     particle_count: 100_000,
///     variant: Variant::Extended,
///     ..Default::default()
/// };
/// Simulation::new(config).run()?;
/// ```
pub struct Simulation {
    config: SimConfig,
    initializer: Box<dyn RandomInitializer>,
}

impl Simulation {
    /// A simulation seeded from `config.seed` (or entropy).
    pub fn new(config: SimConfig) -> Self {
        let initializer = Box::new(UniformInitializer::new(config.seed));
        Self {
            config,
            initializer,
        }
    }

    /// Replace the source of the initial population.
    pub fn with_initializer(mut self, initializer: impl RandomInitializer + 'static) -> Self {
        self.initializer = Box::new(initializer);
        self
    }

    /// Start from exactly these states.
    pub fn with_states(self, states: Vec<ParticleState>) -> Self {
        self.with_initializer(FixedStates(states))
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Validate the config and draw the initial population, before any GPU
    /// work.
    fn prepare(&mut self) -> Result<Vec<ParticleState>, SetupError> {
        self.config.validate()?;
        let ranges = self.config.spawn_ranges();
        let states = self
            .initializer
            .initial_states(self.config.particle_count, &ranges);
        if states.len() != self.config.particle_count as usize {
            return Err(SetupError::InvalidConfig(format!(
                "initializer produced {} states for a population of {}",
                states.len(),
                self.config.particle_count
            )));
        }
        Ok(states)
    }

    /// Run the simulation. This blocks until the window is closed.
    pub fn run(mut self) -> Result<(), SimulationError> {
        let initial = self.prepare()?;

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self.config, initial);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Build the pipeline without a window, timed by the monotonic clock.
    pub fn headless(self) -> Result<HeadlessSimulation, SimulationError> {
        self.headless_with_clock(MonotonicClock::new())
    }

    /// Build the pipeline without a window, timed by `clock`.
    pub fn headless_with_clock<C: Clock>(
        mut self,
        clock: C,
    ) -> Result<HeadlessSimulation<C>, SimulationError> {
        let initial = self.prepare()?;
        let gpu = pollster::block_on(GpuContext::headless())?;
        HeadlessSimulation::new(gpu, &self.config, &initial, clock)
    }
}

/// A simulation compositing into an offscreen texture.
pub struct HeadlessSimulation<C: Clock = MonotonicClock> {
    gpu: GpuContext,
    driver: FrameDriver<C>,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
}

impl<C: Clock> HeadlessSimulation<C> {
    fn new(
        gpu: GpuContext,
        config: &SimConfig,
        initial: &[ParticleState],
        clock: C,
    ) -> Result<Self, SimulationError> {
        let pipeline = Pipeline::new(&gpu, config, initial, HEADLESS_FORMAT)?;
        let target = gpu.allocate("Headless Target", |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Headless Target"),
                size: wgpu::Extent3d {
                    width: config.width,
                    height: config.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: HEADLESS_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            gpu,
            driver: FrameDriver::with_clock(pipeline, clock),
            target,
            target_view,
        })
    }

    /// Run one frame with the delta time taken from the clock.
    pub fn step(&mut self) -> Result<FrameReport, FrameError> {
        self.driver.frame(&self.gpu, &self.target_view)
    }

    /// Run one frame with a fixed delta time.
    pub fn step_with_delta(&mut self, delta_time: f32) -> Result<FrameReport, FrameError> {
        self.driver
            .frame_with_delta(&self.gpu, &self.target_view, delta_time)
    }

    /// Composite the current trail again, with no other stage.
    pub fn composite_only(&self) -> Result<(), FrameError> {
        self.driver.composite_only(&self.gpu, &self.target_view)
    }

    /// The most recent states (the read-role buffer).
    pub fn read_states(&self) -> Result<Vec<ParticleState>, FrameError> {
        let states = self.driver.pipeline().states();
        readback::read_states(&self.gpu, states.read())
    }

    /// Contents of one state buffer, whatever its role.
    pub fn read_slot(&self, slot: Slot) -> Result<Vec<ParticleState>, FrameError> {
        let states = self.driver.pipeline().states();
        readback::read_states(&self.gpu, states.get(slot))
    }

    /// The composited image as tightly packed RGBA8 rows.
    pub fn read_target(&self) -> Result<Vec<u8>, FrameError> {
        readback::read_texture(&self.gpu, &self.target)
    }

    /// Raw texels of one trail texture, whatever its role. Rows are tightly
    /// packed in the trail format (four half floats per texel).
    pub fn read_trail(&self, slot: Slot) -> Result<Vec<u8>, FrameError> {
        let trail = self.driver.pipeline().trail();
        readback::read_texture(&self.gpu, trail.get(slot).texture())
    }

    pub fn driver(&self) -> &FrameDriver<C> {
        &self.driver
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Canvas size in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.target.width(), self.target.height())
    }
}

/// Everything that exists once the window is up.
struct WindowState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    gpu: GpuContext,
    driver: FrameDriver,
}

impl WindowState {
    fn new(
        event_loop: &ActiveEventLoop,
        config: &SimConfig,
        initial: &[ParticleState],
    ) -> Result<Self, SimulationError> {
        let window_attrs = Window::default_attributes()
            .with_title("trailsim")
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(false);
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(SetupError::Window)?,
        );

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(SetupError::Surface)?;
        let (gpu, adapter) = pollster::block_on(GpuContext::for_surface(&instance, &surface))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| SetupError::InvalidConfig("surface reports no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = window.inner_size();
        if size.width != config.width || size.height != config.height {
            log::warn!(
                "Window is {}x{}, trail is {}x{}; the trail is stretched to fit",
                size.width,
                size.height,
                config.width,
                config.height
            );
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);

        let pipeline = Pipeline::new(&gpu, config, initial, format)?;

        Ok(Self {
            window,
            surface,
            surface_config,
            gpu,
            driver: FrameDriver::new(pipeline),
        })
    }

    /// Acquire the next surface texture and run one frame into it.
    ///
    /// A lost or outdated surface is reconfigured before any stage runs and
    /// the frame is retried on the next refresh, unless the device itself
    /// has reported an error.
    fn redraw(&mut self) -> Result<(), FrameError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                match recover_surface(err, self.gpu.take_device_error())? {
                    SurfaceRecovery::Reconfigure => {
                        log::warn!("Surface lost or outdated, reconfiguring");
                        self.surface.configure(&self.gpu.device, &self.surface_config);
                    }
                    SurfaceRecovery::Skip => {
                        log::warn!("Timed out acquiring surface texture, skipping refresh");
                    }
                }
                return Ok(());
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.driver.frame(&self.gpu, &view)?;

        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }
}

/// What to do after the surface refused to hand out a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceRecovery {
    Reconfigure,
    Skip,
}

/// Decide how to handle a failed texture acquisition. A pending device
/// error wins over the surface error: a lost device usually shows up as a
/// lost surface first.
fn recover_surface(
    err: wgpu::SurfaceError,
    device_error: Option<String>,
) -> Result<SurfaceRecovery, FrameError> {
    if let Some(message) = device_error {
        return Err(FrameError::Device(message));
    }
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => Ok(SurfaceRecovery::Reconfigure),
        wgpu::SurfaceError::Timeout => Ok(SurfaceRecovery::Skip),
        err => Err(FrameError::Surface(err)),
    }
}

struct App {
    config: SimConfig,
    initial: Vec<ParticleState>,
    state: Option<WindowState>,
    error: Option<SimulationError>,
}

impl App {
    fn new(config: SimConfig, initial: Vec<ParticleState>) -> Self {
        Self {
            config,
            initial,
            state: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: SimulationError) {
        log::error!("{err}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match WindowState::new(event_loop, &self.config, &self.initial) {
            Ok(state) => {
                // Particle data now lives on the GPU only.
                self.initial = Vec::new();
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(state) = &self.state {
                    log::info!("Closing after {} frames", state.driver.frames());
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match state.redraw() {
                    Ok(()) => state.window.request_redraw(),
                    Err(err) => self.fail(event_loop, err.into()),
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_surface_is_reconfigured() {
        assert_eq!(
            recover_surface(wgpu::SurfaceError::Lost, None).unwrap(),
            SurfaceRecovery::Reconfigure
        );
        assert_eq!(
            recover_surface(wgpu::SurfaceError::Outdated, None).unwrap(),
            SurfaceRecovery::Reconfigure
        );
        assert_eq!(
            recover_surface(wgpu::SurfaceError::Timeout, None).unwrap(),
            SurfaceRecovery::Skip
        );
    }

    #[test]
    fn test_device_error_makes_surface_loss_fatal() {
        for err in [
            wgpu::SurfaceError::Lost,
            wgpu::SurfaceError::Outdated,
            wgpu::SurfaceError::Timeout,
        ] {
            let result = recover_surface(err, Some("device lost".to_string()));
            assert!(matches!(result, Err(FrameError::Device(ref m)) if m == "device lost"));
        }
    }

    #[test]
    fn test_out_of_memory_surface_is_fatal() {
        assert!(matches!(
            recover_surface(wgpu::SurfaceError::OutOfMemory, None),
            Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory))
        ));
    }
}
