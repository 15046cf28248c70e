// ============================================================================
// config.rs — Myxelia
// Species and simulation parameters, derived agent budgets, and the clamped
// Gaussian randomizer that draws fresh parameter sets.
// ============================================================================

use std::f32::consts::PI;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

pub const SPECIES_COUNT: usize = 3;

/// Hard ceiling on the agent pool when simulating on the CPU backend.
pub const MAX_CPU_AGENTS: usize = 50_000;

// ======================== Spawn patterns ========================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnPattern {
    UniformRandom,
    CenterCluster,
    Circle,
    Rings,
    Spiral,
}

impl SpawnPattern {
    pub const ALL: [SpawnPattern; 5] = [
        SpawnPattern::UniformRandom,
        SpawnPattern::CenterCluster,
        SpawnPattern::Circle,
        SpawnPattern::Rings,
        SpawnPattern::Spiral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpawnPattern::UniformRandom => "Uniform",
            SpawnPattern::CenterCluster => "Center cluster",
            SpawnPattern::Circle => "Circle",
            SpawnPattern::Rings => "Rings",
            SpawnPattern::Spiral => "Spiral",
        }
    }
}

// ======================== Display colors ========================

/// Named display color for a species. Purely cosmetic; the renderer blends
/// these by population share, nothing in the kernels reads them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorPreset {
    Amber,
    Cyan,
    Magenta,
    Lime,
    Violet,
    Ember,
}

impl ColorPreset {
    pub const ALL: [ColorPreset; 6] = [
        ColorPreset::Amber,
        ColorPreset::Cyan,
        ColorPreset::Magenta,
        ColorPreset::Lime,
        ColorPreset::Violet,
        ColorPreset::Ember,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorPreset::Amber => "Amber",
            ColorPreset::Cyan => "Cyan",
            ColorPreset::Magenta => "Magenta",
            ColorPreset::Lime => "Lime",
            ColorPreset::Violet => "Violet",
            ColorPreset::Ember => "Ember",
        }
    }

    /// Linear RGB base color.
    pub fn rgb(self) -> [f32; 3] {
        match self {
            ColorPreset::Amber => [1.0, 0.72, 0.18],
            ColorPreset::Cyan => [0.16, 0.85, 0.92],
            ColorPreset::Magenta => [0.93, 0.22, 0.77],
            ColorPreset::Lime => [0.55, 0.95, 0.25],
            ColorPreset::Violet => [0.56, 0.35, 0.98],
            ColorPreset::Ember => [0.98, 0.35, 0.18],
        }
    }
}

// ======================== Species ========================

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    /// Half-angle between the center sensor and each side sensor, radians.
    pub sensor_angle: f32,
    /// Heading correction applied on a steer decision, radians.
    pub turn_angle: f32,
    /// Distance from the agent to each sensor sample, in cells.
    pub sensor_distance: f32,
    /// Cells advanced per tick.
    pub speed: f32,
    /// Trail added at the agent's cell every tick.
    pub deposit: f32,
    pub color: ColorPreset,
    /// Share of the total agent budget, percent.
    pub population_pct: f32,
}

impl SpeciesConfig {
    fn preset(color: ColorPreset, population_pct: f32) -> Self {
        SpeciesConfig {
            sensor_angle: PI / 4.0,
            turn_angle: PI / 4.0,
            sensor_distance: 9.0,
            speed: 1.0,
            deposit: 50.0,
            color,
            population_pct,
        }
    }
}

// ======================== Simulation ========================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Trail subtracted from every cell each tick.
    pub decay_rate: f32,
    /// Blend toward the 3x3 box blur; 0 disables diffusion, 1 is full blur.
    pub diffuse_weight: f32,
    /// Agent budget as a percentage of total grid cells.
    pub agent_pct: f32,
    /// Pattern used when (re)spawning the agent pool.
    pub spawn_pattern: SpawnPattern,
    /// Patterns `randomized` may pick the next spawn pattern from.
    pub enabled_spawn_patterns: Vec<SpawnPattern>,
    pub species: [SpeciesConfig; SPECIES_COUNT],
    /// Cross-species attraction/repulsion weights in [-1, 1]. Carried through
    /// configuration, serialization, and the GPU uniform block, but trail
    /// sensing does not consult it: species sense the shared trail
    /// undifferentiated. Kept so stored setups round-trip.
    pub interaction: [[f32; SPECIES_COUNT]; SPECIES_COUNT],
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            decay_rate: 2.0,
            diffuse_weight: 0.1,
            agent_pct: 5.0,
            spawn_pattern: SpawnPattern::UniformRandom,
            enabled_spawn_patterns: SpawnPattern::ALL.to_vec(),
            species: [
                SpeciesConfig::preset(ColorPreset::Amber, 34.0),
                SpeciesConfig::preset(ColorPreset::Cyan, 33.0),
                SpeciesConfig::preset(ColorPreset::Magenta, 33.0),
            ],
            interaction: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

impl SimulationConfig {
    /// Total agents for a grid of the given size, before any backend cap.
    pub fn agent_budget(&self, width: usize, height: usize) -> usize {
        ((width * height) as f32 * self.agent_pct / 100.0).floor() as usize
    }

    /// Per-species agent counts: floor for the first two species, remainder
    /// to the third. Ratios need not sum to 100.
    pub fn species_counts(&self, total: usize) -> [usize; SPECIES_COUNT] {
        let first = (total as f32 * self.species[0].population_pct / 100.0).floor() as usize;
        let first = first.min(total);
        let second = (total as f32 * self.species[1].population_pct / 100.0).floor() as usize;
        let second = second.min(total - first);
        [first, second, total - first - second]
    }

    /// True when switching to `next` forces the agent pool to be rebuilt:
    /// any change to the agent budget, a population share, or the spawn
    /// pattern does.
    pub fn requires_reinit(&self, next: &SimulationConfig) -> bool {
        if self.agent_pct != next.agent_pct || self.spawn_pattern != next.spawn_pattern {
            return true;
        }
        self.species
            .iter()
            .zip(&next.species)
            .any(|(a, b)| a.population_pct != b.population_pct)
    }

    /// Draw a fresh configuration with every physical parameter sampled from
    /// a clamped Gaussian over its documented range. Colors, the agent
    /// budget, and the enabled-pattern set are kept from `self`.
    pub fn randomized<R: Rng>(&self, rng: &mut R) -> SimulationConfig {
        let population = random_population_split(rng);
        let mut species = self.species;
        for (sp, pct) in species.iter_mut().zip(population) {
            sp.sensor_angle = gaussian_in(rng, PI / 36.0, PI / 2.0);
            sp.turn_angle = gaussian_in(rng, PI / 36.0, PI / 2.0);
            sp.sensor_distance = gaussian_in(rng, 3.0, 32.0).round();
            sp.speed = gaussian_in(rng, 0.5, 3.0);
            sp.deposit = gaussian_in(rng, 20.0, 150.0).round();
            sp.population_pct = pct;
        }

        let mut interaction = [[0.0f32; SPECIES_COUNT]; SPECIES_COUNT];
        for (i, row) in interaction.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = if i == j {
                    gaussian_in(rng, 0.5, 1.0)
                } else {
                    gaussian_in(rng, -0.5, 0.5)
                };
            }
        }

        SimulationConfig {
            decay_rate: gaussian_in(rng, 0.4, 6.0),
            diffuse_weight: gaussian_in(rng, 0.05, 0.6),
            agent_pct: self.agent_pct,
            spawn_pattern: *self
                .enabled_spawn_patterns
                .choose(rng)
                .unwrap_or(&self.spawn_pattern),
            enabled_spawn_patterns: self.enabled_spawn_patterns.clone(),
            species,
            interaction,
        }
    }
}

/// Load a configuration from a JSON file.
pub fn load_config(path: &str) -> Result<SimulationConfig, crate::engine::EngineError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Gaussian sample centered on the range midpoint with sigma = range/6,
/// clamped into [min, max].
fn gaussian_in<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    let mean = (min + max) * 0.5;
    let stddev = (max - min) / 6.0;
    let sample = match Normal::new(mean, stddev) {
        Ok(dist) => dist.sample(rng),
        Err(_) => mean,
    };
    sample.clamp(min, max)
}

/// Three population percentages that sum to exactly 100.
fn random_population_split<R: Rng>(rng: &mut R) -> [f32; SPECIES_COUNT] {
    let raw = [
        rng.gen_range(1.0f32..10.0),
        rng.gen_range(1.0f32..10.0),
        rng.gen_range(1.0f32..10.0),
    ];
    let sum: f32 = raw.iter().sum();
    let first = (raw[0] / sum * 100.0).round();
    let second = (raw[1] / sum * 100.0).round();
    [first, second, 100.0 - first - second]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn species_counts_floor_first_two_remainder_last() {
        let mut config = SimulationConfig::default();
        config.species[0].population_pct = 50.0;
        config.species[1].population_pct = 30.0;
        config.species[2].population_pct = 20.0;
        assert_eq!(config.species_counts(1000), [500, 300, 200]);

        // 33/33/33 leaves the rounding slack with the last species.
        config.species[0].population_pct = 33.0;
        config.species[1].population_pct = 33.0;
        config.species[2].population_pct = 33.0;
        assert_eq!(config.species_counts(100), [33, 33, 34]);
    }

    #[test]
    fn species_counts_survive_ratios_above_100() {
        let mut config = SimulationConfig::default();
        config.species[0].population_pct = 80.0;
        config.species[1].population_pct = 80.0;
        config.species[2].population_pct = 80.0;
        let counts = config.species_counts(100);
        assert_eq!(counts.iter().sum::<usize>(), 100);
    }

    #[test]
    fn agent_budget_floors() {
        let config = SimulationConfig {
            agent_pct: 5.0,
            ..SimulationConfig::default()
        };
        assert_eq!(config.agent_budget(512, 512), 13107);
        assert_eq!(config.agent_budget(128, 128), 819);
    }

    #[test]
    fn reinit_triggers() {
        let base = SimulationConfig::default();

        let mut next = base.clone();
        next.decay_rate = 4.0;
        assert!(!base.requires_reinit(&next));

        let mut next = base.clone();
        next.agent_pct = 7.0;
        assert!(base.requires_reinit(&next));

        let mut next = base.clone();
        next.spawn_pattern = SpawnPattern::Spiral;
        assert!(base.requires_reinit(&next));

        let mut next = base.clone();
        next.species[1].population_pct = 10.0;
        assert!(base.requires_reinit(&next));

        let mut next = base.clone();
        next.species[1].turn_angle = 1.0;
        assert!(!base.requires_reinit(&next));
    }

    #[test]
    fn randomized_stays_in_documented_ranges() {
        let base = SimulationConfig::default();
        let mut rng = SmallRng::seed_from_u64(99);
        for _ in 0..50 {
            let config = base.randomized(&mut rng);
            assert!(config.decay_rate >= 0.4 && config.decay_rate <= 6.0);
            assert!(config.diffuse_weight >= 0.05 && config.diffuse_weight <= 0.6);
            let pct: f32 = config.species.iter().map(|s| s.population_pct).sum();
            assert!((pct - 100.0).abs() < 0.001);
            for sp in &config.species {
                assert!(sp.sensor_distance >= 3.0 && sp.sensor_distance <= 32.0);
                assert!(sp.speed >= 0.5 && sp.speed <= 3.0);
                assert!(sp.deposit >= 20.0 && sp.deposit <= 150.0);
            }
            for (i, row) in config.interaction.iter().enumerate() {
                for (j, &v) in row.iter().enumerate() {
                    if i == j {
                        assert!((0.5..=1.0).contains(&v));
                    } else {
                        assert!((-0.5..=0.5).contains(&v));
                    }
                }
            }
            assert!(config.enabled_spawn_patterns.contains(&config.spawn_pattern));
        }
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SimulationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
