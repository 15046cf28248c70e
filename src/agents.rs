// ============================================================================
// agents.rs — Myxelia
// AgentPool: structure-of-arrays agent state plus the spawn-pattern
// generators that seed it. Reinitialization replaces every array wholesale;
// there is no incremental add/remove.
// ============================================================================

use std::f32::consts::PI;

use rand::Rng;

use crate::config::{SimulationConfig, SpawnPattern, SPECIES_COUNT};

pub struct AgentPool {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub heading: Vec<f32>,
    pub species: Vec<u32>,
}

impl AgentPool {
    /// Spawn `count` agents for a `width` x `height` grid. Positions follow
    /// the configured pattern, headings are uniform in [0, 2pi), and species
    /// are assigned by walking the population-ratio boundaries in order.
    pub fn spawn<R: Rng>(
        count: usize,
        width: usize,
        height: usize,
        config: &SimulationConfig,
        rng: &mut R,
    ) -> Self {
        let w = width as f32;
        let h = height as f32;
        let mut x = Vec::with_capacity(count);
        let mut y = Vec::with_capacity(count);
        let mut heading = Vec::with_capacity(count);

        for i in 0..count {
            let (px, py) = spawn_position(config.spawn_pattern, i, count, w, h, rng);
            x.push(px.rem_euclid(w));
            y.push(py.rem_euclid(h));
            heading.push(rng.gen::<f32>() * 2.0 * PI);
        }

        let counts = config.species_counts(count);
        let mut species = Vec::with_capacity(count);
        for (index, &n) in counts.iter().enumerate() {
            species.extend(std::iter::repeat(index as u32).take(n));
        }

        AgentPool {
            x,
            y,
            heading,
            species,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Number of agents per species.
    pub fn species_histogram(&self) -> [usize; SPECIES_COUNT] {
        let mut histogram = [0usize; SPECIES_COUNT];
        for &s in &self.species {
            histogram[s as usize] += 1;
        }
        histogram
    }
}

/// Position for agent `i` of `count` under the given pattern, in grid space.
/// Callers wrap the result; patterns may overshoot the edge on tiny grids.
fn spawn_position<R: Rng>(
    pattern: SpawnPattern,
    i: usize,
    count: usize,
    w: f32,
    h: f32,
    rng: &mut R,
) -> (f32, f32) {
    let cx = w * 0.5;
    let cy = h * 0.5;
    let reach = w.min(h);
    let fraction = if count > 1 {
        i as f32 / (count - 1) as f32
    } else {
        0.0
    };

    match pattern {
        SpawnPattern::UniformRandom => (rng.gen::<f32>() * w, rng.gen::<f32>() * h),
        SpawnPattern::CenterCluster => {
            // Uniform radius draw is densest at the center.
            let radius = rng.gen::<f32>() * reach / 8.0;
            let theta = rng.gen::<f32>() * 2.0 * PI;
            (cx + theta.cos() * radius, cy + theta.sin() * radius)
        }
        SpawnPattern::Circle => {
            let theta = fraction * 2.0 * PI;
            let radius = reach * 0.3 + (rng.gen::<f32>() - 0.5) * 4.0;
            (cx + theta.cos() * radius, cy + theta.sin() * radius)
        }
        SpawnPattern::Rings => {
            let ring = i % 3;
            let radius = reach * (0.15 + ring as f32 * 0.12);
            let theta = fraction * 3.0 * 2.0 * PI;
            (cx + theta.cos() * radius, cy + theta.sin() * radius)
        }
        SpawnPattern::Spiral => {
            const TURNS: f32 = 4.0;
            let theta = fraction * TURNS * 2.0 * PI;
            let radius = fraction * reach * 0.4;
            (cx + theta.cos() * radius, cy + theta.sin() * radius)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn config_with_ratios(r0: f32, r1: f32, r2: f32) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.species[0].population_pct = r0;
        config.species[1].population_pct = r1;
        config.species[2].population_pct = r2;
        config
    }

    #[test]
    fn population_split_is_exact() {
        let config = config_with_ratios(50.0, 30.0, 20.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let pool = AgentPool::spawn(1000, 256, 256, &config, &mut rng);
        assert_eq!(pool.len(), 1000);
        assert_eq!(pool.species_histogram(), [500, 300, 200]);
    }

    #[test]
    fn species_blocks_are_contiguous() {
        let config = config_with_ratios(50.0, 30.0, 20.0);
        let mut rng = SmallRng::seed_from_u64(2);
        let pool = AgentPool::spawn(100, 64, 64, &config, &mut rng);
        assert!(pool.species.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn ratios_not_summing_to_100_still_fill_the_pool() {
        let config = config_with_ratios(40.0, 40.0, 40.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let pool = AgentPool::spawn(500, 64, 64, &config, &mut rng);
        assert_eq!(pool.len(), 500);
        assert_eq!(pool.species_histogram().iter().sum::<usize>(), 500);
        assert!(pool.species.iter().all(|&s| s < SPECIES_COUNT as u32));
    }

    #[test]
    fn every_pattern_spawns_in_bounds() {
        let mut rng = SmallRng::seed_from_u64(4);
        for pattern in SpawnPattern::ALL {
            let config = SimulationConfig {
                spawn_pattern: pattern,
                ..SimulationConfig::default()
            };
            let pool = AgentPool::spawn(2000, 128, 64, &config, &mut rng);
            for i in 0..pool.len() {
                assert!(
                    pool.x[i] >= 0.0 && pool.x[i] < 128.0,
                    "{:?} x {}",
                    pattern,
                    pool.x[i]
                );
                assert!(
                    pool.y[i] >= 0.0 && pool.y[i] < 64.0,
                    "{:?} y {}",
                    pattern,
                    pool.y[i]
                );
            }
        }
    }

    #[test]
    fn headings_cover_the_full_turn() {
        let config = SimulationConfig::default();
        let mut rng = SmallRng::seed_from_u64(5);
        let pool = AgentPool::spawn(4000, 64, 64, &config, &mut rng);
        assert!(pool.heading.iter().all(|&a| (0.0..2.0 * PI).contains(&a)));
        // With 4000 draws every quadrant should be hit.
        let mut quadrants = [false; 4];
        for &a in &pool.heading {
            quadrants[(a / (PI / 2.0)) as usize % 4] = true;
        }
        assert!(quadrants.iter().all(|&q| q));
    }

    #[test]
    fn tiny_grids_wrap_instead_of_overflowing() {
        let mut rng = SmallRng::seed_from_u64(6);
        for pattern in SpawnPattern::ALL {
            let config = SimulationConfig {
                spawn_pattern: pattern,
                ..SimulationConfig::default()
            };
            let pool = AgentPool::spawn(64, 8, 8, &config, &mut rng);
            assert!(pool.x.iter().all(|&v| (0.0..8.0).contains(&v)));
            assert!(pool.y.iter().all(|&v| (0.0..8.0).contains(&v)));
        }
    }
}
