//! Startup configuration.
//!
//! Everything here is read once, before the pipeline is built, and never
//! changes afterwards. Configs are usually loaded from TOML:
//!
//! ```toml
//! particle_count = 1000000
//! width = 1280
//! height = 720
//! variant = "extended"
//! trail_policy = "accumulate"
//! wrap = "toroidal"
//!
//! [agent]
//! sensor_angle = 0.4
//! sensor_distance = 9.0
//!
//! [post]
//! decay_rate = 0.6
//! ```

use std::f32::consts::TAU;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SetupError};

/// Which update law and which optional stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// `secondary` is a velocity. No trail sensing, no post pass.
    #[default]
    Simple,
    /// `secondary` is `(angle, speed)`. Agents steer by sampling the trail and
    /// a post pass diffuses and decays the trail every frame.
    Extended,
}

/// Whether the draw stage keeps the previous content of its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailPolicy {
    /// Draw on top of what the target already holds.
    #[default]
    Accumulate,
    /// Clear the target before drawing; no trails.
    Clear,
}

/// How drawn points combine with the trail target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailBlend {
    /// Points overwrite the texel they land on.
    Replace,
    /// Point colors are added to the texel.
    #[default]
    Additive,
    /// Standard alpha blending.
    Alpha,
}

/// Boundary policy applied after every position update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    /// `position mod dimensions`, result in `[0, dimensions)`.
    #[default]
    Toroidal,
    /// `min(max(position, 0), dimensions - 1)`.
    Clamped,
}

impl WrapMode {
    /// Value written into the uniform block.
    pub fn as_u32(self) -> u32 {
        match self {
            WrapMode::Toroidal => 0,
            WrapMode::Clamped => 1,
        }
    }
}

/// Independent `[min, max)` ranges for the two components of an attribute.
///
/// `min == max` yields that constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRanges {
    pub x: [f32; 2],
    pub y: [f32; 2],
}

impl AxisRanges {
    pub fn new(x: [f32; 2], y: [f32; 2]) -> Self {
        Self { x, y }
    }

    fn validate(&self, name: &str) -> Result<(), SetupError> {
        for (axis, [min, max]) in [("x", self.x), ("y", self.y)] {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(SetupError::InvalidConfig(format!(
                    "{name}.{axis} range [{min}, {max}) is empty or not finite"
                )));
            }
        }
        Ok(())
    }
}

/// Initial ranges for the two per-particle attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub position: AxisRanges,
    pub secondary: AxisRanges,
}

/// Steering parameters for the extended variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Angle between the forward sensor and each side sensor, in radians.
    pub sensor_angle: f32,
    /// Distance from the agent to its sensors, in pixels.
    pub sensor_distance: f32,
    /// Turn rate in radians per second.
    pub turn_speed: f32,
    /// Color each agent deposits into the trail.
    pub deposit: [f32; 4],
    /// Random turns when the forward sensor is the weakest.
    pub randomness: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sensor_angle: 0.4,
            sensor_distance: 9.0,
            turn_speed: 12.0,
            deposit: [0.35, 0.25, 0.12, 1.0],
            randomness: true,
        }
    }
}

/// Parameters for the trail post pass (extended variant).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    /// Amount subtracted from every channel per second.
    pub decay_rate: f32,
    /// How fast the trail relaxes toward its 3x3 average, per second.
    pub diffuse_rate: f32,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.6,
            diffuse_rate: 8.0,
        }
    }
}

/// Complete startup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub particle_count: u32,
    pub width: u32,
    pub height: u32,
    pub variant: Variant,
    pub trail_policy: TrailPolicy,
    pub trail_blend: TrailBlend,
    pub wrap: WrapMode,
    /// Seed for the initializer. `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Initial ranges. `None` picks ranges that suit the variant and canvas.
    pub spawn: Option<SpawnConfig>,
    /// Point color for the simple variant.
    pub draw_color: [f32; 4],
    pub agent: AgentConfig,
    pub post: PostConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            particle_count: 500_000,
            width: 1280,
            height: 720,
            variant: Variant::Simple,
            trail_policy: TrailPolicy::Accumulate,
            trail_blend: TrailBlend::Additive,
            wrap: WrapMode::Toroidal,
            seed: None,
            spawn: None,
            draw_color: [0.05, 0.08, 0.12, 1.0],
            agent: AgentConfig::default(),
            post: PostConfig::default(),
        }
    }
}

impl std::str::FromStr for SimConfig {
    type Err = toml::de::Error;
    fn from_str(serialized: &str) -> Result<Self, Self::Err> {
        let config = toml::from_str(serialized)?;
        Ok(config)
    }
}

impl SimConfig {
    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(text.parse()?)
    }

    /// Canvas dimensions as floats.
    pub fn dimensions(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    /// Whether the post pass runs.
    pub fn has_post(&self) -> bool {
        self.variant == Variant::Extended
    }

    /// The configured spawn ranges, or defaults for the variant.
    pub fn spawn_ranges(&self) -> SpawnConfig {
        if let Some(spawn) = self.spawn {
            return spawn;
        }
        let position = AxisRanges::new([0.0, self.width as f32], [0.0, self.height as f32]);
        let secondary = match self.variant {
            Variant::Simple => AxisRanges::new([-50.0, 50.0], [-50.0, 50.0]),
            Variant::Extended => AxisRanges::new([0.0, TAU], [40.0, 60.0]),
        };
        SpawnConfig {
            position,
            secondary,
        }
    }

    /// Reject configurations no pipeline can be built from.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.particle_count == 0 {
            return Err(SetupError::InvalidConfig(
                "particle_count must be at least 1".into(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SetupError::InvalidConfig(format!(
                "canvas {}x{} has no area",
                self.width, self.height
            )));
        }
        let spawn = self.spawn_ranges();
        spawn.position.validate("spawn.position")?;
        spawn.secondary.validate("spawn.secondary")?;
        if self.post.decay_rate < 0.0 || self.post.diffuse_rate < 0.0 {
            return Err(SetupError::InvalidConfig(
                "post rates must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        SimConfig::default().validate().unwrap();
        let extended = SimConfig {
            variant: Variant::Extended,
            ..Default::default()
        };
        extended.validate().unwrap();
        assert!(extended.has_post());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: SimConfig = r#"
            particle_count = 4
            width = 2
            height = 2
            variant = "extended"
            trail_policy = "clear"
            wrap = "clamped"

            [post]
            decay_rate = 1.5
        "#
        .parse()
        .unwrap();

        assert_eq!(config.particle_count, 4);
        assert_eq!(config.variant, Variant::Extended);
        assert_eq!(config.trail_policy, TrailPolicy::Clear);
        assert_eq!(config.wrap, WrapMode::Clamped);
        assert_eq!(config.post.decay_rate, 1.5);
        // Unset fields keep their defaults
        assert_eq!(config.post.diffuse_rate, PostConfig::default().diffuse_rate);
        assert_eq!(config.trail_blend, TrailBlend::Additive);
    }

    #[test]
    fn test_toml_round_trip_keeps_spawn() {
        let config = SimConfig {
            spawn: Some(SpawnConfig {
                position: AxisRanges::new([-1.0, 1.0], [-1.0, 1.0]),
                secondary: AxisRanges::new([-0.1, 0.1], [-0.1, 0.1]),
            }),
            seed: Some(7),
            ..Default::default()
        };
        let serialized = toml::to_string(&config).unwrap();
        let parsed: SimConfig = serialized.parse().unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_empty_population_and_canvas() {
        let no_particles = SimConfig {
            particle_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            no_particles.validate(),
            Err(SetupError::InvalidConfig(_))
        ));

        let no_area = SimConfig {
            width: 0,
            ..Default::default()
        };
        assert!(no_area.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_range() {
        let config = SimConfig {
            spawn: Some(SpawnConfig {
                position: AxisRanges::new([1.0, -1.0], [0.0, 1.0]),
                secondary: AxisRanges::new([0.0, 0.0], [0.0, 0.0]),
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("spawn.position.x"));
    }

    #[test]
    fn test_default_ranges_follow_variant() {
        let simple = SimConfig::default().spawn_ranges();
        assert_eq!(simple.position.x, [0.0, 1280.0]);
        assert!(simple.secondary.x[0] < 0.0);

        let extended = SimConfig {
            variant: Variant::Extended,
            ..Default::default()
        }
        .spawn_ranges();
        assert_eq!(extended.secondary.x, [0.0, TAU]);
    }
}
