//! End-to-end tests of the frame loop on a real device.
//!
//! Every test builds a headless simulation and steps it by hand. Machines
//! without a usable adapter skip these tests instead of failing them.

use std::collections::HashSet;
use std::f32::consts::{FRAC_PI_2, TAU};

use trailsim::kernel::{self, AgentStep};
use trailsim::time::ManualClock;
use trailsim::{
    AgentConfig, HeadlessSimulation, ParticleState, PostConfig, SetupError, SimConfig, Simulation,
    SimulationError, Slot, TrailBlend, TrailPolicy, Variant, Vec2, WrapMode,
};

fn build(sim: Simulation) -> Option<HeadlessSimulation<ManualClock>> {
    build_with_clock(sim, ManualClock::new(0.0))
}

fn build_with_clock(sim: Simulation, clock: ManualClock) -> Option<HeadlessSimulation<ManualClock>> {
    match sim.headless_with_clock(clock) {
        Ok(sim) => Some(sim),
        Err(SimulationError::Setup(SetupError::NoAdapter | SetupError::Device(_))) => {
            eprintln!("skipping: no GPU adapter available");
            None
        }
        Err(err) => panic!("failed to build headless simulation: {err}"),
    }
}

/// A headless simulation starting from exactly `states`.
fn headless(config: SimConfig, states: Vec<ParticleState>) -> Option<HeadlessSimulation<ManualClock>> {
    build(Simulation::new(config).with_states(states))
}

/// A headless simulation with a seeded random population.
fn headless_seeded(config: SimConfig) -> Option<HeadlessSimulation<ManualClock>> {
    build(Simulation::new(config))
}

fn config(width: u32, height: u32, particle_count: u32) -> SimConfig {
    SimConfig {
        particle_count,
        width,
        height,
        variant: Variant::Simple,
        seed: Some(7),
        ..Default::default()
    }
}

fn positions(states: &[ParticleState]) -> Vec<[f32; 2]> {
    states.iter().map(|s| s.position).collect()
}

/// Red channel of texel `(x, y)` in the composited image.
fn red_at(sim: &HeadlessSimulation<ManualClock>, x: u32, y: u32) -> u8 {
    let (width, _) = sim.dimensions();
    let pixels = sim.read_target().unwrap();
    pixels[((y * width + x) * 4) as usize]
}

// ============================================================================
// Update law
// ============================================================================

#[test]
fn test_one_frame_wraps_toroidally() {
    let states = vec![
        ParticleState::new([0.0, 0.0], [1.0, 0.0]),
        ParticleState::new([1.0, 1.0], [0.0, 1.0]),
        ParticleState::new([-1.0, -1.0], [0.0, 0.0]),
        ParticleState::new([0.5, 0.5], [-1.0, -1.0]),
    ];
    let Some(mut sim) = headless(config(2, 2, 4), states) else {
        return;
    };

    sim.step_with_delta(1.0).unwrap();

    let after = sim.read_states().unwrap();
    assert_eq!(
        positions(&after),
        vec![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.5, 1.5]]
    );
}

#[test]
fn test_zero_delta_frames_leave_state_unchanged() {
    let states: Vec<_> = (0..64)
        .map(|i| {
            let f = i as f32;
            ParticleState::new([f % 16.0 + 0.25, f / 4.0], [f - 32.0, 32.0 - f])
        })
        .collect();
    let Some(mut sim) = headless(config(16, 16, 64), states.clone()) else {
        return;
    };

    let mut trail_slots = Vec::new();
    for _ in 0..5 {
        let report = sim.step_with_delta(0.0).unwrap();
        trail_slots.push(report.trail_read);
    }

    assert_eq!(sim.read_states().unwrap(), states);
    // Trail roles still swap every frame.
    assert_eq!(
        trail_slots,
        vec![Slot::B, Slot::A, Slot::B, Slot::A, Slot::B]
    );
}

#[test]
fn test_gpu_matches_host_kernel() {
    let states: Vec<_> = (0..1000)
        .map(|i| {
            let f = i as f32;
            ParticleState::new([(f * 7.3) % 64.0, (f * 3.1) % 32.0], [f % 13.0 - 6.0, f % 7.0 - 3.0])
        })
        .collect();
    let Some(mut sim) = headless(config(64, 32, 1000), states.clone()) else {
        return;
    };

    sim.step_with_delta(0.5).unwrap();
    let gpu = sim.read_states().unwrap();

    let mut expected = vec![ParticleState::default(); states.len()];
    kernel::step_simple(
        &states,
        &mut expected,
        0.5,
        Vec2::new(64.0, 32.0),
        WrapMode::Toroidal,
    );

    for (i, (got, want)) in gpu.iter().zip(&expected).enumerate() {
        for axis in 0..2 {
            assert!(
                (got.position[axis] - want.position[axis]).abs() < 1e-3,
                "particle {i}: gpu {:?} host {:?}",
                got.position,
                want.position
            );
        }
        assert_eq!(got.secondary, want.secondary);
    }
}

#[test]
fn test_positions_stay_in_domain() {
    for wrap in [WrapMode::Toroidal, WrapMode::Clamped] {
        let states: Vec<_> = (0..256)
            .map(|i| {
                let f = i as f32;
                ParticleState::new([f % 10.0, 9.9], [(f - 128.0) * 3.0, 50.0])
            })
            .collect();
        let mut cfg = config(10, 10, 256);
        cfg.wrap = wrap;
        let Some(mut sim) = headless(cfg, states) else {
            return;
        };

        for _ in 0..3 {
            sim.step_with_delta(0.37).unwrap();
        }

        for state in sim.read_states().unwrap() {
            for p in state.position {
                let inside = match wrap {
                    WrapMode::Toroidal => (0.0..10.0).contains(&p),
                    WrapMode::Clamped => (0.0..=9.0).contains(&p),
                };
                assert!(inside, "{wrap:?}: {p} out of domain");
            }
        }
    }
}

#[test]
fn test_same_input_same_output() {
    let mut cfg = SimConfig {
        variant: Variant::Extended,
        ..config(32, 32, 200)
    };
    cfg.agent.randomness = false;
    let states: Vec<_> = (0..200)
        .map(|i| {
            let f = i as f32;
            ParticleState::new([(f * 5.0) % 32.0, (f * 11.0) % 32.0], [f * 0.1, 20.0])
        })
        .collect();

    let Some(mut first) = headless(cfg.clone(), states.clone()) else {
        return;
    };
    let Some(mut second) = headless(cfg, states) else {
        return;
    };

    for _ in 0..4 {
        first.step_with_delta(0.1).unwrap();
        second.step_with_delta(0.1).unwrap();
    }

    assert_eq!(first.read_states().unwrap(), second.read_states().unwrap());
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn test_one_frame_swaps_state_roles() {
    let states = vec![ParticleState::new([1.0, 1.0], [1.0, 0.0])];
    let Some(mut sim) = headless(config(4, 4, 1), states.clone()) else {
        return;
    };

    let before = sim.driver().pipeline().states().read_slot();
    assert_eq!(before, Slot::A);

    let report = sim.step_with_delta(1.0).unwrap();
    assert_eq!(report.state_read, Slot::B);
    assert_eq!(sim.driver().pipeline().states().write_slot(), Slot::A);

    // The buffer that was read still holds the input; the other holds the output.
    assert_eq!(sim.read_slot(Slot::A).unwrap(), states);
    assert_eq!(positions(&sim.read_slot(Slot::B).unwrap()), vec![[2.0, 1.0]]);
}

#[test]
fn test_roles_never_alias_across_frames() {
    let Some(mut sim) = headless_seeded(config(8, 8, 16)) else {
        return;
    };

    for frame in 0..6u64 {
        let report = sim.step_with_delta(0.016).unwrap();
        assert_eq!(report.frame, frame);
        let states = sim.driver().pipeline().states();
        assert_ne!(states.read_slot(), states.write_slot());
        let trail = sim.driver().pipeline().trail();
        assert_ne!(trail.read().slot(), trail.write().slot());
        assert_eq!(report.state_read, report.trail_read);
    }
    assert_eq!(sim.driver().frames(), 6);
}

// ============================================================================
// Trail and composite
// ============================================================================

fn trail_config(policy: TrailPolicy) -> SimConfig {
    SimConfig {
        trail_policy: policy,
        trail_blend: TrailBlend::Replace,
        draw_color: [1.0, 0.0, 0.0, 1.0],
        ..config(8, 2, 1)
    }
}

#[test]
fn test_accumulated_trail_keeps_every_other_frame() {
    let states = vec![ParticleState::new([0.5, 0.5], [1.0, 0.0])];
    let Some(mut sim) = headless(trail_config(TrailPolicy::Accumulate), states) else {
        return;
    };

    for _ in 0..3 {
        sim.step_with_delta(1.0).unwrap();
    }

    // Frames 1 and 3 drew into the same texture, frame 2 into the other.
    assert_eq!(red_at(&sim, 1, 0), 255);
    assert_eq!(red_at(&sim, 2, 0), 0);
    assert_eq!(red_at(&sim, 3, 0), 255);
    assert_eq!(red_at(&sim, 0, 0), 0);
}

#[test]
fn test_cleared_trail_shows_only_latest_frame() {
    let states = vec![ParticleState::new([0.5, 0.5], [1.0, 0.0])];
    let Some(mut sim) = headless(trail_config(TrailPolicy::Clear), states) else {
        return;
    };

    for _ in 0..3 {
        sim.step_with_delta(1.0).unwrap();
    }

    assert_eq!(red_at(&sim, 1, 0), 0);
    assert_eq!(red_at(&sim, 3, 0), 255);
}

#[test]
fn test_composite_is_idempotent() {
    let Some(mut sim) = headless_seeded(config(32, 16, 300)) else {
        return;
    };
    for _ in 0..3 {
        sim.step_with_delta(0.05).unwrap();
    }

    let trail_before = sim.driver().pipeline().trail().read_slot();
    sim.composite_only().unwrap();
    let first = sim.read_target().unwrap();
    sim.composite_only().unwrap();
    let second = sim.read_target().unwrap();

    assert_eq!(first, second);
    assert_eq!(sim.driver().pipeline().trail().read_slot(), trail_before);
}

#[test]
fn test_extended_variant_runs_post_stage() {
    let cfg = SimConfig {
        variant: Variant::Extended,
        ..config(64, 64, 2000)
    };
    let Some(mut sim) = headless_seeded(cfg) else {
        return;
    };
    assert!(sim.driver().pipeline().has_post());

    for _ in 0..10 {
        sim.step_with_delta(1.0 / 60.0).unwrap();
    }

    for state in sim.read_states().unwrap() {
        let [x, y] = state.position;
        assert!((0.0..64.0).contains(&x) && (0.0..64.0).contains(&y));
        // Speed is never changed by steering.
        assert!((40.0..60.0).contains(&state.secondary[1]));
    }
}

#[test]
fn test_trail_readback_uses_trail_texel_size() {
    let Some(mut sim) = headless_seeded(config(8, 4, 16)) else {
        return;
    };
    sim.step_with_delta(0.1).unwrap();

    // Four half floats per texel.
    for slot in [Slot::A, Slot::B] {
        assert_eq!(sim.read_trail(slot).unwrap().len(), 8 * 4 * 8);
    }
    assert_eq!(sim.read_target().unwrap().len(), 8 * 4 * 4);
}

// ============================================================================
// Extended variant
// ============================================================================

/// Agents that see every deposit at full strength: white deposits written
/// with `Replace`, and a post pass that neither blurs nor fades.
fn steering_config(particle_count: u32, randomness: bool) -> SimConfig {
    SimConfig {
        variant: Variant::Extended,
        trail_blend: TrailBlend::Replace,
        agent: AgentConfig {
            sensor_angle: FRAC_PI_2,
            sensor_distance: 4.0,
            turn_speed: 2.0,
            deposit: [1.0, 1.0, 1.0, 1.0],
            randomness,
        },
        post: PostConfig {
            decay_rate: 0.0,
            diffuse_rate: 0.0,
        },
        ..config(32, 32, particle_count)
    }
}

/// Step `frames` frames on the host. The trail is modeled as the set of
/// pixels any particle has been drawn at so far, each sensed as 1.0.
fn host_frames(
    states: &[ParticleState],
    cfg: &SimConfig,
    delta_time: f32,
    frames: u32,
) -> Vec<ParticleState> {
    let dimensions = Vec2::new(cfg.width as f32, cfg.height as f32);
    let pixel = |p: [f32; 2]| (p[0].floor() as i32, p[1].floor() as i32);
    let mut current = states.to_vec();
    let mut deposits = HashSet::new();
    for frame in 0..frames {
        current = current
            .iter()
            .enumerate()
            .map(|(index, state)| {
                let step = AgentStep {
                    index: index as u32,
                    frame,
                    delta_time,
                    dimensions,
                    mode: cfg.wrap,
                };
                kernel::advance_agent(*state, step, &cfg.agent, |p| {
                    if deposits.contains(&pixel(p.to_array())) {
                        1.0
                    } else {
                        0.0
                    }
                })
            })
            .collect();
        deposits.extend(current.iter().map(|s| pixel(s.position)));
    }
    current
}

fn assert_states_close(gpu: &[ParticleState], host: &[ParticleState], tolerance: f32) {
    assert_eq!(gpu.len(), host.len());
    for (i, (got, want)) in gpu.iter().zip(host).enumerate() {
        let close = got
            .position
            .iter()
            .chain(&got.secondary)
            .zip(want.position.iter().chain(&want.secondary))
            .all(|(a, b)| (a - b).abs() < tolerance);
        assert!(close, "particle {i}: gpu {got:?} host {want:?}");
    }
}

#[test]
fn test_agents_on_blank_trail_match_host() {
    let cfg = steering_config(1000, true);
    let states: Vec<_> = (0..1000)
        .map(|i| {
            let f = i as f32;
            // Kept clear of the edges so no agent wraps this frame.
            let position = [4.0 + (f * 7.3) % 24.0, 4.0 + (f * 3.1) % 24.0];
            ParticleState::new(position, [(f * 0.37) % TAU, 5.0 + f % 11.0])
        })
        .collect();
    let Some(mut sim) = headless(cfg.clone(), states.clone()) else {
        return;
    };

    sim.step_with_delta(0.25).unwrap();

    // Nothing has been drawn yet, so every agent keeps its heading.
    let expected = host_frames(&states, &cfg, 0.25, 1);
    assert_states_close(&sim.read_states().unwrap(), &expected, 1e-2);
}

#[test]
fn test_agent_turns_toward_deposit_like_host() {
    // Agent 0 faces +x; agent 1 sits on its left sensor and never moves.
    let states = vec![
        ParticleState::new([16.5, 16.5], [0.0, 0.0]),
        ParticleState::new([16.5, 20.5], [0.0, 0.0]),
    ];
    let cfg = steering_config(2, false);
    let Some(mut sim) = headless(cfg.clone(), states.clone()) else {
        return;
    };

    sim.step_with_delta(0.5).unwrap();
    sim.step_with_delta(0.5).unwrap();

    let expected = host_frames(&states, &cfg, 0.5, 2);
    // turn_speed * delta_time toward the deposit
    assert!((expected[0].secondary[0] - 1.0).abs() < 1e-6);
    assert_states_close(&sim.read_states().unwrap(), &expected, 1e-4);
}

#[test]
fn test_random_turn_uses_same_hash_as_host() {
    // Deposits on both side sensors of agent 0 and none ahead: the turn is
    // drawn from the per-particle hash.
    let states = vec![
        ParticleState::new([16.5, 16.5], [0.0, 0.0]),
        ParticleState::new([16.5, 20.5], [0.0, 0.0]),
        ParticleState::new([16.5, 12.5], [0.0, 0.0]),
    ];
    let cfg = steering_config(3, true);
    let Some(mut sim) = headless(cfg.clone(), states.clone()) else {
        return;
    };

    sim.step_with_delta(0.5).unwrap();
    sim.step_with_delta(0.5).unwrap();

    let expected = host_frames(&states, &cfg, 0.5, 2);
    assert_ne!(expected[0].secondary[0], 0.0);
    assert_states_close(&sim.read_states().unwrap(), &expected, 1e-4);
}

#[test]
fn test_post_stage_decays_old_deposits() {
    let mut cfg = steering_config(1, false);
    cfg.width = 64;
    cfg.height = 16;
    cfg.agent.sensor_distance = 3.0;
    cfg.agent.sensor_angle = 0.5;
    cfg.agent.deposit = [1.0, 0.0, 0.0, 1.0];
    cfg.post.decay_rate = 0.5;
    // Moves four pixels along +x per frame, never back over its own trail.
    let states = vec![ParticleState::new([8.5, 8.5], [0.0, 4.0])];
    let Some(mut sim) = headless(cfg, states) else {
        return;
    };

    sim.step_with_delta(1.0).unwrap();
    assert_eq!(red_at(&sim, 12, 8), 255);

    sim.step_with_delta(1.0).unwrap();
    let faded = red_at(&sim, 12, 8);
    assert!((120..=135).contains(&faded), "one decay step left {faded}");
    assert_eq!(red_at(&sim, 16, 8), 255);

    sim.step_with_delta(1.0).unwrap();
    assert_eq!(red_at(&sim, 12, 8), 0);
    assert!(red_at(&sim, 16, 8) < 255);
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn test_clock_step_integrates_elapsed_time() {
    let clock = ManualClock::new(100.0);
    let states = vec![ParticleState::new([1.0, 1.0], [1.0, 0.0])];
    let sim = Simulation::new(config(8, 8, 1)).with_states(states);
    let Some(mut sim) = build_with_clock(sim, clock.clone()) else {
        return;
    };
    assert_eq!(sim.driver().pipeline().particle_count(), 1);

    clock.advance(1.0);
    let report = sim.step().unwrap();
    assert_eq!(report.delta_time, 1.0);
    assert_eq!(positions(&sim.read_states().unwrap()), vec![[2.0, 1.0]]);

    clock.advance(0.5);
    assert_eq!(sim.step().unwrap().delta_time, 0.5);
    assert_eq!(positions(&sim.read_states().unwrap()), vec![[2.5, 1.0]]);

    // No time passed: nothing moves.
    assert_eq!(sim.step().unwrap().delta_time, 0.0);
    assert_eq!(positions(&sim.read_states().unwrap()), vec![[2.5, 1.0]]);
}

// ============================================================================
// Setup errors
// ============================================================================

#[test]
fn test_mismatched_initial_states_rejected() {
    let Some(sim) = headless_seeded(config(4, 4, 2)) else {
        return;
    };
    let gpu = sim.gpu();
    let result = trailsim::gpu::pipeline::Pipeline::new(
        gpu,
        &config(4, 4, 3),
        &[ParticleState::default()],
        wgpu::TextureFormat::Rgba8Unorm,
    );
    assert!(matches!(
        result,
        Err(SimulationError::Setup(SetupError::InvalidConfig(_)))
    ));
}

#[test]
fn test_zero_particles_rejected_before_gpu() {
    let result = Simulation::new(config(4, 4, 0)).headless();
    assert!(matches!(
        result,
        Err(SimulationError::Setup(SetupError::InvalidConfig(_)))
    ));
}

#[test]
fn test_scripted_population_of_wrong_length_rejected() {
    for len in [2, 4] {
        let states = vec![ParticleState::default(); len];
        let result = Simulation::new(config(4, 4, 3)).with_states(states).headless();
        assert!(matches!(
            result,
            Err(SimulationError::Setup(SetupError::InvalidConfig(_)))
        ));
    }
}
