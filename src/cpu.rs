// ============================================================================
// cpu.rs — Myxelia
// CPU simulation backend. One tick runs the diffuse-decay pass over the
// whole field (parallel per row), then the per-agent sense/steer/move/deposit
// pass, both in the same source->destination direction, then swaps roles.
// ============================================================================

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::agents::AgentPool;
use crate::config::{SimulationConfig, MAX_CPU_AGENTS};
use crate::grid::{TrailGrid, TRAIL_MAX};
use crate::trig::TrigTable;

const ONE_NINTH: f32 = 1.0 / 9.0;

pub struct CpuSimulation {
    grids: [TrailGrid; 2],
    current: usize,
    pub agents: AgentPool,
    config: SimulationConfig,
    trig: TrigTable,
    rng: SmallRng,
    tick_count: u64,
}

impl CpuSimulation {
    /// Build the backend for a power-of-two grid. The agent budget derives
    /// from the configuration, capped at MAX_CPU_AGENTS.
    pub fn new(width: usize, height: usize, config: SimulationConfig, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let budget = config.agent_budget(width, height);
        let count = budget.min(MAX_CPU_AGENTS);
        if count < budget {
            log::info!("cpu backend: agent budget {budget} capped to {count}");
        }
        let agents = AgentPool::spawn(count, width, height, &config, &mut rng);
        CpuSimulation {
            grids: [TrailGrid::new(width, height), TrailGrid::new(width, height)],
            current: 0,
            agents,
            config,
            trig: TrigTable::new(),
            rng,
            tick_count: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.grids[0].width()
    }

    pub fn height(&self) -> usize {
        self.grids[0].height()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The currently readable trail buffer, never the write target.
    pub fn current(&self) -> &TrailGrid {
        &self.grids[self.current]
    }

    /// Mutable access to the readable buffer, for seeding trails from
    /// outside the kernel (painting, test setup).
    pub fn current_mut(&mut self) -> &mut TrailGrid {
        &mut self.grids[self.current]
    }

    /// Replace the active configuration; rebuilds the agent pool when the
    /// budget, a population share, or the spawn pattern changed.
    pub fn configure(&mut self, config: SimulationConfig) {
        let reinit = self.config.requires_reinit(&config);
        self.config = config;
        if reinit {
            self.respawn_agents();
        }
    }

    /// Zero both trail buffers and respawn agents from the current
    /// configuration.
    pub fn clear(&mut self) {
        self.grids[0].clear();
        self.grids[1].clear();
        self.current = 0;
        self.respawn_agents();
    }

    fn respawn_agents(&mut self) {
        let width = self.width();
        let height = self.height();
        let count = self
            .config
            .agent_budget(width, height)
            .min(MAX_CPU_AGENTS);
        self.agents = AgentPool::spawn(count, width, height, &self.config, &mut self.rng);
    }

    /// Advance the simulation by exactly one step.
    pub fn tick(&mut self) {
        let (head, tail) = self.grids.split_at_mut(1);
        let (src, dst) = if self.current == 0 {
            (&head[0], &mut tail[0])
        } else {
            (&tail[0], &mut head[0])
        };

        diffuse_decay(src, dst, self.config.decay_rate, self.config.diffuse_weight);
        agent_pass(
            src,
            dst,
            &mut self.agents,
            &self.config,
            &self.trig,
            &mut self.rng,
        );

        self.current = 1 - self.current;
        self.tick_count += 1;
    }
}

// ======================== Diffuse-decay pass ========================

/// Grid-wide pass: 3x3 toroidal box blur blended with each cell's own value,
/// then global decay, clamped at zero. Rows are independent, so the pass
/// fans out across the rayon pool.
pub fn diffuse_decay(src: &TrailGrid, dst: &mut TrailGrid, decay_rate: f32, diffuse_weight: f32) {
    let width = src.width();
    let col_mask = src.col_mask();
    let row_mask = src.row_mask();
    let cells = src.cells();
    let keep = 1.0 - diffuse_weight;

    dst.cells_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out)| {
            let above = row.wrapping_sub(1) & row_mask;
            let below = (row + 1) & row_mask;
            let base = row * width;
            let base_above = above * width;
            let base_below = below * width;

            for col in 0..width {
                let left = col.wrapping_sub(1) & col_mask;
                let right = (col + 1) & col_mask;

                let sum = cells[base_above + left]
                    + cells[base_above + col]
                    + cells[base_above + right]
                    + cells[base + left]
                    + cells[base + col]
                    + cells[base + right]
                    + cells[base_below + left]
                    + cells[base_below + col]
                    + cells[base_below + right];

                let own = cells[base + col];
                let diffused = own * keep + sum * ONE_NINTH * diffuse_weight;
                out[col] = (diffused - decay_rate).max(0.0);
            }
        });
}

// ======================== Agent pass ========================

/// Per-agent pass: three sensor samples from the pre-tick source grid, the
/// steer decision, one movement step with per-axis wrap, then a clamped
/// deposit into the destination (on top of the diffused result).
fn agent_pass<R: Rng>(
    src: &TrailGrid,
    dst: &mut TrailGrid,
    agents: &mut AgentPool,
    config: &SimulationConfig,
    trig: &TrigTable,
    rng: &mut R,
) {
    let width = src.width();
    let w = width as f32;
    let h = src.height() as f32;
    let col_mask = src.col_mask();
    let row_mask = src.row_mask();
    let dst_cells = dst.cells_mut();

    for i in 0..agents.len() {
        let sp = &config.species[agents.species[i] as usize];
        let x = agents.x[i];
        let y = agents.y[i];
        let mut heading = agents.heading[i];

        let center = sense(src, trig, x, y, heading, sp.sensor_distance);
        let left = sense(src, trig, x, y, heading - sp.sensor_angle, sp.sensor_distance);
        let right = sense(src, trig, x, y, heading + sp.sensor_angle, sp.sensor_distance);

        if center >= left && center >= right {
            // strongest signal ahead, hold course
        } else if left > right {
            heading -= sp.turn_angle;
        } else if right > left {
            heading += sp.turn_angle;
        } else {
            heading += (rng.gen::<f32>() - 0.5) * 2.0 * sp.turn_angle;
        }

        let mut nx = x + trig.cos(heading) * sp.speed;
        let mut ny = y + trig.sin(heading) * sp.speed;
        if nx < 0.0 {
            nx += w;
        }
        if nx >= w {
            nx -= w;
        }
        if ny < 0.0 {
            ny += h;
        }
        if ny >= h {
            ny -= h;
        }

        agents.x[i] = nx;
        agents.y[i] = ny;
        agents.heading[i] = heading;

        let col = nx as usize & col_mask;
        let row = ny as usize & row_mask;
        let idx = row * width + col;
        dst_cells[idx] = (dst_cells[idx] + sp.deposit).min(TRAIL_MAX);
    }
}

/// Sample the trail at `distance` cells from (x, y) along `angle`, rounded
/// to the nearest cell and wrapped onto the torus.
#[inline]
fn sense(grid: &TrailGrid, trig: &TrigTable, x: f32, y: f32, angle: f32, distance: f32) -> f32 {
    let sx = x + trig.cos(angle) * distance;
    let sy = y + trig.sin(angle) * distance;
    let col = grid.wrap_col(sx.round() as i32);
    let row = grid.wrap_row(sy.round() as i32);
    grid.cells()[row * grid.width() + col]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnPattern;

    fn no_agent_config() -> SimulationConfig {
        SimulationConfig {
            agent_pct: 0.0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn decay_only_reaches_zero_in_ceil_v_over_d_ticks() {
        let mut config = no_agent_config();
        config.diffuse_weight = 0.0;
        config.decay_rate = 2.0;
        let mut sim = CpuSimulation::new(32, 32, config, 0);
        for cell in sim.current_mut().cells_mut() {
            *cell = 5.0;
        }

        // ceil(5 / 2) = 3 ticks: 5 -> 3 -> 1 -> 0.
        sim.tick();
        sim.tick();
        assert!(sim.current().cells().iter().all(|&v| v > 0.0));
        sim.tick();
        assert!(sim.current().cells().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn uniform_field_diffuses_to_itself() {
        let mut config = no_agent_config();
        config.diffuse_weight = 0.7;
        config.decay_rate = 0.0;
        let mut sim = CpuSimulation::new(16, 16, config, 0);
        for cell in sim.current_mut().cells_mut() {
            *cell = 40.0;
        }
        sim.tick();
        // A uniform field is a fixed point of the blur regardless of weight.
        assert!(sim.current().cells().iter().all(|&v| (v - 40.0).abs() < 1e-4));
    }

    #[test]
    fn impulse_spreads_one_ninth_to_neighbors() {
        let mut config = no_agent_config();
        config.diffuse_weight = 1.0;
        config.decay_rate = 0.0;
        let mut sim = CpuSimulation::new(16, 16, config, 0);
        sim.current_mut().set(8, 8, 90.0);
        sim.tick();
        let grid = sim.current();
        for row in 7..=9 {
            for col in 7..=9 {
                assert!((grid.get(row, col) - 10.0).abs() < 1e-4);
            }
        }
        assert_eq!(grid.get(8, 11), 0.0);
    }

    #[test]
    fn diffusion_wraps_across_the_torus_seam() {
        let mut config = no_agent_config();
        config.diffuse_weight = 1.0;
        config.decay_rate = 0.0;
        let mut sim = CpuSimulation::new(16, 16, config, 0);
        sim.current_mut().set(0, 0, 90.0);
        sim.tick();
        let grid = sim.current();
        // The opposite corner is a toroidal neighbor of (0, 0).
        assert!((grid.get(15, 15) - 10.0).abs() < 1e-4);
        assert!((grid.get(0, 15) - 10.0).abs() < 1e-4);
        assert!((grid.get(15, 0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn cells_stay_clamped_under_heavy_deposits() {
        let mut config = SimulationConfig {
            agent_pct: 10.0,
            spawn_pattern: SpawnPattern::CenterCluster,
            ..SimulationConfig::default()
        };
        for sp in &mut config.species {
            sp.deposit = 200.0;
            sp.speed = 0.2;
        }
        let mut sim = CpuSimulation::new(64, 64, config, 11);
        for _ in 0..50 {
            sim.tick();
            assert!(sim
                .current()
                .cells()
                .iter()
                .all(|&v| (0.0..=TRAIL_MAX).contains(&v)));
        }
    }

    #[test]
    fn identical_seeds_stay_bit_identical() {
        let config = SimulationConfig {
            agent_pct: 2.0,
            ..SimulationConfig::default()
        };
        let mut a = CpuSimulation::new(64, 64, config.clone(), 42);
        let mut b = CpuSimulation::new(64, 64, config, 42);
        for _ in 0..20 {
            a.tick();
            b.tick();
        }
        assert_eq!(a.current().cells(), b.current().cells());
        assert_eq!(a.agents.x, b.agents.x);
        assert_eq!(a.agents.y, b.agents.y);
        assert_eq!(a.agents.heading, b.agents.heading);
        assert_eq!(a.agents.species, b.agents.species);
    }

    #[test]
    fn sensing_reads_across_the_wrap() {
        let config = no_agent_config();
        let mut sim = CpuSimulation::new(32, 32, config, 0);
        // Trail two cells past the right edge, i.e. at column 1.
        sim.current_mut().set(16, 1, 200.0);
        let value = sense(
            sim.current(),
            &TrigTable::new(),
            31.0,
            16.0,
            0.0,
            2.0,
        );
        assert_eq!(value, 200.0);
    }

    #[test]
    fn clear_resets_field_and_pool() {
        let config = SimulationConfig {
            agent_pct: 1.0,
            ..SimulationConfig::default()
        };
        let mut sim = CpuSimulation::new(32, 32, config, 3);
        for _ in 0..5 {
            sim.tick();
        }
        let count = sim.agents.len();
        sim.clear();
        assert!(sim.current().cells().iter().all(|&v| v == 0.0));
        assert_eq!(sim.agents.len(), count);
    }

    #[test]
    fn configure_without_population_change_keeps_the_pool() {
        let config = SimulationConfig {
            agent_pct: 1.0,
            ..SimulationConfig::default()
        };
        let mut sim = CpuSimulation::new(32, 32, config.clone(), 3);
        let x_before = sim.agents.x.clone();

        let mut tweaked = config.clone();
        tweaked.decay_rate = 5.0;
        sim.configure(tweaked);
        assert_eq!(sim.agents.x, x_before);

        let mut resized = config;
        resized.agent_pct = 4.0;
        sim.configure(resized);
        assert_ne!(sim.agents.len(), x_before.len());
    }
}
