//! trailsim - GPU particle trails
//!
//! Usage:
//!   trailsim [--config <file.toml>] [--particles N] [--width W] [--height H]
//!            [--variant simple|extended] [--seed S] [--log-filter FILTER]

use std::path::PathBuf;

use clap::Parser;
use trailsim::{SimConfig, Simulation, SimulationError, Variant};

#[derive(Parser)]
#[command(name = "trailsim")]
#[command(about = "Run a GPU particle simulation with persistent trails")]
struct Args {
    /// TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of particles
    #[arg(long)]
    particles: Option<u32>,

    /// Canvas width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Canvas height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Update law and stage set
    #[arg(long, value_enum)]
    variant: Option<Variant>,

    /// Seed for the initial population
    #[arg(long)]
    seed: Option<u64>,

    /// Log filter, e.g. "info" or "trailsim=debug"
    #[arg(long, default_value = "info")]
    log_filter: String,
}

impl Args {
    fn into_config(self) -> Result<SimConfig, SimulationError> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };
        if let Some(particles) = self.particles {
            config.particle_count = particles;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

fn main() -> Result<(), SimulationError> {
    let args = Args::parse();
    if let Err(err) = scrub_log::init_with_filter_string(&args.log_filter) {
        eprintln!("Failed to install logger: {err:?}");
    }

    let config = args.into_config()?;
    log::info!(
        "Starting {:?} simulation: {} particles on a {}x{} canvas",
        config.variant,
        config.particle_count,
        config.width,
        config.height
    );

    Simulation::new(config).run()
}
