// ============================================================================
// buffers.rs — Myxelia
// GPU-side buffer containers and the uniform structs shared with WGSL.
// Field order and padding here must mirror the shader structs exactly.
// ============================================================================

use wgpu::util::DeviceExt;

use crate::agents::AgentPool;
use crate::config::{SimulationConfig, SPECIES_COUNT};

/// Trail values live on the GPU as 8.8 fixed point so deposits can use
/// integer atomics. 255.0 maps to 65280.
pub const TRAIL_FIXED_SCALE: f32 = 256.0;
/// Clamp ceiling in fixed-point units (255 * 256).
pub const TRAIL_MAX_FIXED: u32 = 65280;

/// Workgroup edge for the grid kernel (16x16 threads).
pub const GRID_WORKGROUP: u32 = 16;
/// Workgroup size for the agent kernel.
pub const AGENT_WORKGROUP: u32 = 256;

// ======================== Uniform structs ========================

/// Per-species parameters, padded to 32 bytes for array stride.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpeciesUniform {
    pub sensor_angle: f32,
    pub turn_angle: f32,
    pub sensor_distance: f32,
    pub speed: f32,
    pub deposit: f32,
    pub _pad: [f32; 3],
}

impl SpeciesUniform {
    fn from_config(sp: &crate::config::SpeciesConfig) -> Self {
        SpeciesUniform {
            sensor_angle: sp.sensor_angle,
            turn_angle: sp.turn_angle,
            sensor_distance: sp.sensor_distance,
            speed: sp.speed,
            deposit: sp.deposit,
            _pad: [0.0; 3],
        }
    }
}

/// Simulation parameters for both compute kernels.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimUniform {
    pub width: u32,
    pub height: u32,
    pub col_mask: u32,
    pub row_mask: u32,
    pub decay_rate: f32,
    pub diffuse_weight: f32,
    pub agent_count: u32,
    pub frame_seed: u32,
    pub species: [SpeciesUniform; SPECIES_COUNT],
    /// Rows padded to vec4 stride. Carried for the kernels but not read
    /// by them; trail sensing stays species-blind.
    pub interaction: [[f32; 4]; SPECIES_COUNT],
}

/// Byte offset of the per-frame seed, for partial uniform writes.
pub const FRAME_SEED_OFFSET: u64 = std::mem::offset_of!(SimUniform, frame_seed) as u64;

const _: () = assert!(std::mem::size_of::<SpeciesUniform>() == 32);
const _: () = assert!(std::mem::size_of::<SimUniform>() == 176);

impl SimUniform {
    pub fn new(
        config: &SimulationConfig,
        width: u32,
        height: u32,
        agent_count: u32,
        frame_seed: u32,
    ) -> Self {
        let mut species = [SpeciesUniform::from_config(&config.species[0]); SPECIES_COUNT];
        for (dst, src) in species.iter_mut().zip(config.species.iter()) {
            *dst = SpeciesUniform::from_config(src);
        }

        let mut interaction = [[0.0f32; 4]; SPECIES_COUNT];
        for (dst, src) in interaction.iter_mut().zip(config.interaction.iter()) {
            dst[..SPECIES_COUNT].copy_from_slice(src);
        }

        SimUniform {
            width,
            height,
            col_mask: width - 1,
            row_mask: height - 1,
            decay_rate: config.decay_rate,
            diffuse_weight: config.diffuse_weight,
            agent_count,
            frame_seed,
            species,
            interaction,
        }
    }
}

/// Camera and palette parameters for the field shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderUniform {
    /// Cell coordinate at the top-left corner of the viewport.
    pub origin: [f32; 2],
    /// Cells per unit of UV in each axis.
    pub uv_to_cell: [f32; 2],
    pub col_mask: u32,
    pub row_mask: u32,
    pub width: u32,
    pub _pad: u32,
    pub fg_color: [f32; 4],
    pub bg_color: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<RenderUniform>() == 64);

impl RenderUniform {
    /// Identity view: UV (0,0)..(1,1) maps onto the whole grid. Used for
    /// offscreen exports.
    pub fn full_grid(width: u32, height: u32, fg: [f32; 3], bg: [f32; 3]) -> Self {
        RenderUniform {
            origin: [0.0, 0.0],
            uv_to_cell: [width as f32, height as f32],
            col_mask: width - 1,
            row_mask: height - 1,
            width,
            _pad: 0,
            fg_color: [fg[0], fg[1], fg[2], 1.0],
            bg_color: [bg[0], bg[1], bg[2], 1.0],
        }
    }
}

// ======================== Buffer containers ========================

/// Ping-pong pair of trail grids in fixed-point form.
pub struct GridBuffers {
    pub cells: [wgpu::Buffer; 2],
    pub cell_count: usize,
}

impl GridBuffers {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let cell_count = (width * height) as usize;
        let zeros = vec![0u32; cell_count];

        let make = |label: &str| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&zeros),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            })
        };

        GridBuffers {
            cells: [make("trail-grid-a"), make("trail-grid-b")],
            cell_count,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        (self.cell_count * std::mem::size_of::<u32>()) as u64
    }
}

/// Structure-of-arrays agent state, one buffer per component.
pub struct AgentBuffers {
    pub x: wgpu::Buffer,
    pub y: wgpu::Buffer,
    pub heading: wgpu::Buffer,
    pub species: wgpu::Buffer,
    pub count: u32,
}

impl AgentBuffers {
    pub fn new(device: &wgpu::Device, pool: &AgentPool) -> Self {
        let make_f32 = |label: &str, data: &[f32]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            })
        };

        let species = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("agent-species"),
            contents: bytemuck::cast_slice(&pool.species),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        AgentBuffers {
            x: make_f32("agent-x", &pool.x),
            y: make_f32("agent-y", &pool.y),
            heading: make_f32("agent-heading", &pool.heading),
            species,
            count: pool.len() as u32,
        }
    }
}

/// Create a uniform buffer from any Pod struct.
pub fn create_uniform<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, value: &T) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(value),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Dispatch count for one axis of the grid kernel.
pub fn grid_groups(extent: u32) -> u32 {
    extent.div_ceil(GRID_WORKGROUP)
}

/// Dispatch count for the agent kernel.
pub fn agent_groups(count: u32) -> u32 {
    count.div_ceil(AGENT_WORKGROUP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    #[test]
    fn sim_uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<SimUniform>(), 176);
        assert_eq!(FRAME_SEED_OFFSET, 28);
        assert_eq!(std::mem::offset_of!(SimUniform, species), 32);
        assert_eq!(std::mem::offset_of!(SimUniform, interaction), 128);
    }

    #[test]
    fn interaction_rows_are_padded_not_dropped() {
        let mut config = SimulationConfig::default();
        config.interaction[1][2] = -0.25;
        let uniform = SimUniform::new(&config, 256, 256, 1000, 0);
        assert_eq!(uniform.interaction[1][2], -0.25);
        assert_eq!(uniform.interaction[1][3], 0.0);
    }

    #[test]
    fn masks_derive_from_dimensions() {
        let config = SimulationConfig::default();
        let uniform = SimUniform::new(&config, 512, 128, 0, 99);
        assert_eq!(uniform.col_mask, 511);
        assert_eq!(uniform.row_mask, 127);
        assert_eq!(uniform.frame_seed, 99);
    }

    #[test]
    fn dispatch_counts_round_up() {
        assert_eq!(grid_groups(256), 16);
        assert_eq!(grid_groups(257), 17);
        assert_eq!(agent_groups(256), 1);
        assert_eq!(agent_groups(257), 2);
        assert_eq!(agent_groups(0), 0);
    }

    #[test]
    fn fixed_point_ceiling_matches_trail_max() {
        assert_eq!(
            (crate::grid::TRAIL_MAX * TRAIL_FIXED_SCALE) as u32,
            TRAIL_MAX_FIXED
        );
    }
}
