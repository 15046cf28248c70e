// ============================================================================
// mod.rs — Myxelia
// GPU simulation backend. Owns the device-side trail grids, agent buffers,
// compute pipelines, and the field renderer. Ticks submit two compute
// dispatches (diffuse-decay, then agents) and flip the ping-pong direction.
// ============================================================================

pub mod buffers;
pub mod pipelines;

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::agents::AgentPool;
use crate::camera::Camera;
use crate::config::SimulationConfig;
use crate::engine::EngineError;
use crate::grid::TrailGrid;
use crate::render::{blended_species_color, BACKGROUND};

use buffers::{
    agent_groups, create_uniform, grid_groups, AgentBuffers, GridBuffers, RenderUniform,
    SimUniform, FRAME_SEED_OFFSET, TRAIL_FIXED_SCALE,
};
use pipelines::{RenderPipelines, SimPipelines};

// ======================== Device acquisition ========================

/// Shared handles to the one device this process talks to.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

/// Request an adapter (optionally compatible with a presentation surface)
/// and a device with storage limits lifted to whatever the adapter offers,
/// so large grids are bounded by hardware rather than the baseline limits.
pub fn acquire(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<GpuContext, EngineError> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .ok_or(EngineError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("adapter: {} ({:?})", info.name, info.backend);

    let adapter_limits = adapter.limits();
    let required_limits = wgpu::Limits {
        max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
        max_buffer_size: adapter_limits.max_buffer_size,
        ..wgpu::Limits::default()
    };

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("myxelia-device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            memory_hints: wgpu::MemoryHints::default(),
        },
        None,
    ))?;

    Ok(GpuContext {
        adapter,
        device: Arc::new(device),
        queue: Arc::new(queue),
    })
}

// ======================== GPU backend ========================

pub struct GpuSimulation {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    width: u32,
    height: u32,
    grids: GridBuffers,
    agents: AgentBuffers,
    sim_uniform: wgpu::Buffer,
    pipelines: SimPipelines,
    render: RenderPipelines,
    render_uniform: wgpu::Buffer,
    render_bind_groups: [wgpu::BindGroup; 2],
    current: usize,
    config: SimulationConfig,
    config_dirty: bool,
    rng: SmallRng,
    tick_count: u64,
}

impl GpuSimulation {
    /// Allocate all device resources for a power-of-two grid. Fails (instead
    /// of crashing the process) when the device reports an out-of-memory
    /// validation error during allocation.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: SimulationConfig,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let budget = config.agent_budget(width as usize, height as usize);
        let pool = AgentPool::spawn(budget, width as usize, height as usize, &config, &mut rng);

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let grids = GridBuffers::new(&device, width, height);
        let agents = AgentBuffers::new(&device, &pool);
        let sim_value = SimUniform::new(&config, width, height, agents.count, 0);
        let sim_uniform = create_uniform(&device, "sim-uniform", &sim_value);
        let pipelines = SimPipelines::new(&device, &sim_uniform, &grids, &agents);

        let render = RenderPipelines::new(&device, surface_format);
        let view_value = RenderUniform::full_grid(
            width,
            height,
            blended_species_color(&config),
            BACKGROUND,
        );
        let render_uniform = create_uniform(&device, "view-uniform", &view_value);
        let render_bind_groups = [
            render.bind_group(&device, &render_uniform, &grids.cells[0]),
            render.bind_group(&device, &render_uniform, &grids.cells[1]),
        ];

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(EngineError::Allocation(error.to_string()));
        }

        log::info!(
            "gpu backend: {}x{} grid ({} KiB per buffer), {} agents",
            width,
            height,
            grids.size_bytes() / 1024,
            agents.count,
        );

        Ok(GpuSimulation {
            device,
            queue,
            width,
            height,
            grids,
            agents,
            sim_uniform,
            pipelines,
            render,
            render_uniform,
            render_bind_groups,
            current: 0,
            config,
            config_dirty: false,
            rng,
            tick_count: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn agent_count(&self) -> usize {
        self.agents.count as usize
    }

    /// Advance one step: rewrite the uniform (full block when the config
    /// changed, otherwise just the per-frame seed word), then submit the
    /// diffuse and agent dispatches in one encoder.
    pub fn tick(&mut self) {
        let seed = self.rng.gen::<u32>();
        if self.config_dirty {
            let value =
                SimUniform::new(&self.config, self.width, self.height, self.agents.count, seed);
            self.queue
                .write_buffer(&self.sim_uniform, 0, bytemuck::bytes_of(&value));
            self.config_dirty = false;
        } else {
            self.queue
                .write_buffer(&self.sim_uniform, FRAME_SEED_OFFSET, bytemuck::bytes_of(&seed));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tick-encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("diffuse-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.diffuse);
            pass.set_bind_group(0, &self.pipelines.diffuse_bind_groups[self.current], &[]);
            pass.dispatch_workgroups(grid_groups(self.width), grid_groups(self.height), 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("agent-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.agents);
            pass.set_bind_group(0, &self.pipelines.agent_bind_groups[self.current], &[]);
            pass.dispatch_workgroups(agent_groups(self.agents.count), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        self.current = 1 - self.current;
        self.tick_count += 1;
    }

    /// Replace the active configuration. Any change marks the uniform dirty;
    /// population or spawn-pattern changes also rebuild the agent buffers
    /// and their bind groups.
    pub fn configure(&mut self, config: SimulationConfig) {
        let reinit = self.config.requires_reinit(&config);
        self.config = config;
        if reinit {
            self.respawn_agents();
        }
        self.config_dirty = true;
    }

    /// Zero both trail buffers and respawn the agents in place.
    pub fn clear(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear-encoder"),
            });
        encoder.clear_buffer(&self.grids.cells[0], 0, None);
        encoder.clear_buffer(&self.grids.cells[1], 0, None);
        self.queue.submit(Some(encoder.finish()));

        let pool = AgentPool::spawn(
            self.agents.count as usize,
            self.width as usize,
            self.height as usize,
            &self.config,
            &mut self.rng,
        );
        self.queue
            .write_buffer(&self.agents.x, 0, bytemuck::cast_slice(&pool.x));
        self.queue
            .write_buffer(&self.agents.y, 0, bytemuck::cast_slice(&pool.y));
        self.queue
            .write_buffer(&self.agents.heading, 0, bytemuck::cast_slice(&pool.heading));
        self.queue
            .write_buffer(&self.agents.species, 0, bytemuck::cast_slice(&pool.species));
        self.current = 0;
    }

    fn respawn_agents(&mut self) {
        let budget = self
            .config
            .agent_budget(self.width as usize, self.height as usize);
        let pool = AgentPool::spawn(
            budget,
            self.width as usize,
            self.height as usize,
            &self.config,
            &mut self.rng,
        );
        self.agents = AgentBuffers::new(&self.device, &pool);
        self.pipelines.rebuild_agent_groups(
            &self.device,
            &self.sim_uniform,
            &self.grids,
            &self.agents,
        );
    }

    /// Write the camera view and current palette into the render uniform.
    pub fn update_view(&self, camera: &Camera, window: (u32, u32)) {
        let value = RenderUniform {
            origin: camera.origin,
            uv_to_cell: camera.view_extent(window),
            col_mask: self.width - 1,
            row_mask: self.height - 1,
            width: self.width,
            _pad: 0,
            fg_color: with_alpha(blended_species_color(&self.config)),
            bg_color: with_alpha(BACKGROUND),
        };
        self.queue
            .write_buffer(&self.render_uniform, 0, bytemuck::bytes_of(&value));
    }

    /// Draw the readable trail buffer into an active presentation pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.render.surface);
        pass.set_bind_group(0, &self.render_bind_groups[self.current], &[]);
        pass.draw(0..6, 0..1);
    }

    /// Render the whole grid offscreen at the requested resolution and read
    /// it back as tightly packed RGBA8 bytes. The offscreen target uses a
    /// fixed format, so surface format differences never leak into exports.
    pub fn export_frame(&self, width: u32, height: u32) -> Result<Vec<u8>, EngineError> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("export-target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RenderPipelines::EXPORT_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let view_value = RenderUniform::full_grid(
            self.width,
            self.height,
            blended_species_color(&self.config),
            BACKGROUND,
        );
        let uniform = create_uniform(&self.device, "export-view", &view_value);
        let bind_group =
            self.render
                .bind_group(&self.device, &uniform, &self.grids.cells[self.current]);

        // Row stride must be aligned for the copy; repack drops the padding.
        let bytes_per_row = (width * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("export-staging"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("export-encoder"),
            });
        {
            let mut pass = begin_field_pass(&mut encoder, &view);
            pass.set_pipeline(&self.render.export);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let padded = read_staging(&self.device, &staging)?;
        let row_bytes = (width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * bytes_per_row as usize;
            pixels.extend_from_slice(&padded[start..start + row_bytes]);
        }
        Ok(pixels)
    }

    /// Copy the readable grid back to the CPU in trail units. Used for
    /// diagnostics and the headless runner.
    pub fn readback_cells(&self) -> Result<Vec<f32>, EngineError> {
        let size = self.grids.size_bytes();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grid-staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback-encoder"),
            });
        encoder.copy_buffer_to_buffer(&self.grids.cells[self.current], 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let bytes = read_staging(&self.device, &staging)?;
        let fixed: &[u32] = bytemuck::cast_slice(&bytes);
        Ok(fixed.iter().map(|&v| v as f32 / TRAIL_FIXED_SCALE).collect())
    }
}

// ======================== CPU-backend presenter ========================

/// Presents a CPU-side trail grid through the same field shader the GPU
/// backend renders with: the grid is converted to fixed point and uploaded
/// into a storage buffer each displayed frame.
pub struct GridPresenter {
    pipelines: RenderPipelines,
    buffer: wgpu::Buffer,
    render_uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    scratch: Vec<u32>,
    width: u32,
    height: u32,
}

impl GridPresenter {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let pipelines = RenderPipelines::new(device, surface_format);
        let cell_count = (width * height) as usize;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("presenter-grid"),
            size: (cell_count * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let view_value = RenderUniform::full_grid(width, height, [1.0; 3], BACKGROUND);
        let render_uniform = create_uniform(device, "presenter-view", &view_value);
        let bind_group = pipelines.bind_group(device, &render_uniform, &buffer);

        GridPresenter {
            pipelines,
            buffer,
            render_uniform,
            bind_group,
            scratch: vec![0; cell_count],
            width,
            height,
        }
    }

    pub fn upload(&mut self, queue: &wgpu::Queue, grid: &TrailGrid) {
        for (dst, &src) in self.scratch.iter_mut().zip(grid.cells()) {
            *dst = (src * TRAIL_FIXED_SCALE) as u32;
        }
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&self.scratch));
    }

    pub fn update_view(
        &self,
        queue: &wgpu::Queue,
        camera: &Camera,
        window: (u32, u32),
        config: &SimulationConfig,
    ) {
        let value = RenderUniform {
            origin: camera.origin,
            uv_to_cell: camera.view_extent(window),
            col_mask: self.width - 1,
            row_mask: self.height - 1,
            width: self.width,
            _pad: 0,
            fg_color: with_alpha(blended_species_color(config)),
            bg_color: with_alpha(BACKGROUND),
        };
        queue.write_buffer(&self.render_uniform, 0, bytemuck::bytes_of(&value));
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipelines.surface);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..6, 0..1);
    }
}

// ======================== Shared helpers ========================

fn with_alpha(rgb: [f32; 3]) -> [f32; 4] {
    [rgb[0], rgb[1], rgb[2], 1.0]
}

fn begin_field_pass(
    encoder: &mut wgpu::CommandEncoder,
    target: &wgpu::TextureView,
) -> wgpu::RenderPass<'static> {
    encoder
        .begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("field-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(BACKGROUND[0]),
                        g: f64::from(BACKGROUND[1]),
                        b: f64::from(BACKGROUND[2]),
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        })
        .forget_lifetime()
}

/// Block until a MAP_READ staging buffer is mapped, then copy its contents
/// out and unmap.
fn read_staging(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<u8>, EngineError> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    rx.recv()
        .map_err(|_| EngineError::Readback("map callback dropped".into()))?
        .map_err(|e| EngineError::Readback(e.to_string()))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}
