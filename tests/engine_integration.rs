use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use myxelia::agents::AgentPool;
use myxelia::config::SimulationConfig;
use myxelia::cpu::CpuSimulation;
use myxelia::engine::Engine;
use myxelia::grid::TRAIL_MAX;

// Species presets give every scenario the same steering geometry: sensor
// half-angle pi/4, turn angle pi/4, sensor reach 9 cells, speed 1. With
// heading 0 an agent at (64, 64) therefore samples
//   center -> (row 64, col 73)
//   left   -> (row 58, col 70)
//   right  -> (row 70, col 70)
// after rounding to cells.

/// 128x128 backend with an empty agent pool; scenarios install their own.
fn scenario_sim(decay_rate: f32, diffuse_weight: f32) -> CpuSimulation {
    let config = SimulationConfig {
        agent_pct: 0.0,
        decay_rate,
        diffuse_weight,
        ..SimulationConfig::default()
    };
    CpuSimulation::new(128, 128, config, 77)
}

fn install_agent(sim: &mut CpuSimulation, x: f32, y: f32, heading: f32) {
    sim.agents = AgentPool {
        x: vec![x],
        y: vec![y],
        heading: vec![heading],
        species: vec![0],
    };
}

#[test]
fn trail_dead_ahead_holds_the_course() {
    let mut sim = scenario_sim(0.0, 0.0);
    install_agent(&mut sim, 64.0, 64.0, 0.0);
    sim.current_mut().set(64, 73, 200.0);
    // A weaker flank reading must not win over the center.
    sim.current_mut().set(58, 70, 100.0);

    sim.tick();

    assert_eq!(sim.agents.heading[0], 0.0);
    assert_eq!(sim.agents.x[0], 65.0);
    assert_eq!(sim.agents.y[0], 64.0);
}

#[test]
fn empty_field_holds_the_course() {
    let mut sim = scenario_sim(0.0, 0.0);
    install_agent(&mut sim, 20.0, 40.0, 0.0);

    sim.tick();

    assert_eq!(sim.agents.heading[0], 0.0);
    assert_eq!(sim.agents.x[0], 21.0);
    assert_eq!(sim.agents.y[0], 40.0);
}

#[test]
fn stronger_flank_wins_the_turn() {
    let mut sim = scenario_sim(0.0, 0.0);
    install_agent(&mut sim, 64.0, 64.0, 0.0);
    sim.current_mut().set(58, 70, 200.0);
    sim.tick();
    assert_eq!(sim.agents.heading[0], -FRAC_PI_4);

    let mut sim = scenario_sim(0.0, 0.0);
    install_agent(&mut sim, 64.0, 64.0, 0.0);
    sim.current_mut().set(70, 70, 200.0);
    sim.tick();
    assert_eq!(sim.agents.heading[0], FRAC_PI_4);
}

#[test]
fn tied_flanks_turn_randomly_within_the_cone() {
    let mut sim = scenario_sim(0.0, 0.0);
    install_agent(&mut sim, 64.0, 64.0, 0.0);
    sim.current_mut().set(58, 70, 200.0);
    sim.current_mut().set(70, 70, 200.0);

    sim.tick();

    let heading = sim.agents.heading[0];
    assert!(
        heading.abs() <= FRAC_PI_4 + 1e-6,
        "heading {heading} outside the turn cone"
    );
}

#[test]
fn steering_senses_the_pre_decay_field() {
    // Decay wipes the seeded trail within this very tick; the turn still
    // happens because sensing reads the pre-tick buffer.
    let mut sim = scenario_sim(TRAIL_MAX, 0.0);
    install_agent(&mut sim, 64.0, 64.0, 0.0);
    sim.current_mut().set(58, 70, 200.0);

    sim.tick();

    assert_eq!(sim.agents.heading[0], -FRAC_PI_4);
    // Only the fresh deposit survives the decayed field.
    let deposits: Vec<f32> = sim
        .current()
        .cells()
        .iter()
        .copied()
        .filter(|&v| v > 0.0)
        .collect();
    assert_eq!(deposits, vec![50.0]);
}

#[test]
fn movement_wraps_on_both_axes() {
    let mut sim = scenario_sim(0.0, 0.0);
    install_agent(&mut sim, 127.5, 30.0, 0.0);
    sim.tick();
    assert_eq!(sim.agents.x[0], 0.5);
    assert_eq!(sim.agents.y[0], 30.0);

    let mut sim = scenario_sim(0.0, 0.0);
    install_agent(&mut sim, 30.0, 127.6, FRAC_PI_2);
    sim.tick();
    let y = sim.agents.y[0];
    assert!((0.0..128.0).contains(&y));
    assert!((y - 0.6).abs() < 0.01, "y {y}");
}

#[test]
fn deposits_stack_and_saturate() {
    let mut config = SimulationConfig {
        agent_pct: 0.0,
        decay_rate: 0.0,
        diffuse_weight: 0.0,
        ..SimulationConfig::default()
    };
    // Pin the agent to its cell so every deposit lands in the same place.
    config.species[0].speed = 0.0;
    let mut sim = CpuSimulation::new(128, 128, config, 1);
    install_agent(&mut sim, 64.25, 64.5, 0.0);

    for expected in [50.0, 100.0, 150.0, 200.0, 250.0, 255.0, 255.0] {
        sim.tick();
        assert_eq!(sim.current().get(64, 64), expected);
    }
}

#[test]
fn seeded_engines_replay_identically() {
    let config = SimulationConfig {
        agent_pct: 2.0,
        ..SimulationConfig::default()
    };
    let mut a = Engine::cpu(64, 64, config.clone(), 0xDEADBEEF);
    let mut b = Engine::cpu(64, 64, config, 0xDEADBEEF);

    for _ in 0..30 {
        a.tick();
        b.tick();
    }

    assert_eq!(a.tick_count(), 30);
    assert_eq!(a.cells().expect("cells a"), b.cells().expect("cells b"));
}

#[test]
fn export_draws_trail_brighter_than_background() {
    let config = SimulationConfig {
        agent_pct: 0.0,
        decay_rate: 0.0,
        diffuse_weight: 0.0,
        ..SimulationConfig::default()
    };
    let mut sim = CpuSimulation::new(64, 64, config, 0);
    for row in 28..36 {
        for col in 28..36 {
            sim.current_mut().set(row, col, TRAIL_MAX);
        }
    }

    let engine = Engine::Cpu(sim);
    let pixels = engine.export_frame(256, 256).expect("export");
    assert_eq!(pixels.len(), 256 * 256 * 4);
    assert!(pixels.chunks_exact(4).all(|px| px[3] == 255));

    let px_at = |x: usize, y: usize| {
        let i = (y * 256 + x) * 4;
        (pixels[i], pixels[i + 1], pixels[i + 2])
    };
    let center = px_at(128, 128);
    let corner = px_at(4, 4);
    assert!(center.0 > corner.0 && center.1 > corner.1);
}
