// ============================================================================
// pipelines.rs — Myxelia
// Compute and render pipeline construction plus the ping-pong bind groups.
// ============================================================================

use super::buffers::{AgentBuffers, GridBuffers};

// ======================== Layout helpers ========================

fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_storage_ro(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_storage_rw(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bg_buffer(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn create_compute(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    bgl: &wgpu::BindGroupLayout,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

// ======================== Simulation pipelines ========================

/// The two compute kernels and their bind groups, one set per ping-pong
/// direction. Direction `i` means: diffuse reads grid `i` and writes grid
/// `1 - i`, then agents sense grid `i` and deposit into grid `1 - i`.
pub struct SimPipelines {
    pub diffuse: wgpu::ComputePipeline,
    pub agents: wgpu::ComputePipeline,
    agent_layout: wgpu::BindGroupLayout,
    pub diffuse_bind_groups: [wgpu::BindGroup; 2],
    pub agent_bind_groups: [wgpu::BindGroup; 2],
}

impl SimPipelines {
    pub fn new(
        device: &wgpu::Device,
        sim_uniform: &wgpu::Buffer,
        grids: &GridBuffers,
        agents: &AgentBuffers,
    ) -> Self {
        let diffuse_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("diffuse-decay-shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../shaders/diffuse_decay.wgsl").into(),
            ),
        });
        let agent_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("agent-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/agents.wgsl").into()),
        });

        let diffuse_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("diffuse-bgl"),
            entries: &[bgl_uniform(0), bgl_storage_ro(1), bgl_storage_rw(2)],
        });
        let agent_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("agent-bgl"),
            entries: &[
                bgl_uniform(0),
                bgl_storage_ro(1),
                bgl_storage_rw(2),
                bgl_storage_rw(3),
                bgl_storage_rw(4),
                bgl_storage_rw(5),
                bgl_storage_ro(6),
            ],
        });

        let diffuse = create_compute(device, "diffuse-pipeline", &diffuse_shader, &diffuse_layout);
        let agents_pipeline = create_compute(device, "agent-pipeline", &agent_shader, &agent_layout);

        let diffuse_bind_groups =
            Self::build_diffuse_groups(device, &diffuse_layout, sim_uniform, grids);
        let agent_bind_groups =
            Self::build_agent_groups(device, &agent_layout, sim_uniform, grids, agents);

        SimPipelines {
            diffuse,
            agents: agents_pipeline,
            agent_layout,
            diffuse_bind_groups,
            agent_bind_groups,
        }
    }

    fn build_diffuse_groups(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sim_uniform: &wgpu::Buffer,
        grids: &GridBuffers,
    ) -> [wgpu::BindGroup; 2] {
        let make = |dir: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("diffuse-bg"),
                layout,
                entries: &[
                    bg_buffer(0, sim_uniform),
                    bg_buffer(1, &grids.cells[dir]),
                    bg_buffer(2, &grids.cells[1 - dir]),
                ],
            })
        };
        [make(0), make(1)]
    }

    fn build_agent_groups(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sim_uniform: &wgpu::Buffer,
        grids: &GridBuffers,
        agents: &AgentBuffers,
    ) -> [wgpu::BindGroup; 2] {
        let make = |dir: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("agent-bg"),
                layout,
                entries: &[
                    bg_buffer(0, sim_uniform),
                    bg_buffer(1, &grids.cells[dir]),
                    bg_buffer(2, &grids.cells[1 - dir]),
                    bg_buffer(3, &agents.x),
                    bg_buffer(4, &agents.y),
                    bg_buffer(5, &agents.heading),
                    bg_buffer(6, &agents.species),
                ],
            })
        };
        [make(0), make(1)]
    }

    /// Rebuild the agent bind groups after the agent buffers were replaced
    /// (population or spawn pattern change).
    pub fn rebuild_agent_groups(
        &mut self,
        device: &wgpu::Device,
        sim_uniform: &wgpu::Buffer,
        grids: &GridBuffers,
        agents: &AgentBuffers,
    ) {
        self.agent_bind_groups =
            Self::build_agent_groups(device, &self.agent_layout, sim_uniform, grids, agents);
    }
}

// ======================== Field renderer pipelines ========================

/// Fullscreen-quad pipeline that shades the trail field straight from the
/// storage buffer. One variant targets the surface, one targets the
/// RGBA8 offscreen texture used for exports.
pub struct RenderPipelines {
    pub layout: wgpu::BindGroupLayout,
    pub surface: wgpu::RenderPipeline,
    pub export: wgpu::RenderPipeline,
}

impl RenderPipelines {
    pub const EXPORT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("field-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/render.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("field-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let surface = Self::build(device, &shader, &layout, surface_format, "field-pipeline");
        let export = Self::build(
            device,
            &shader,
            &layout,
            Self::EXPORT_FORMAT,
            "field-export-pipeline",
        );

        RenderPipelines {
            layout,
            surface,
            export,
        }
    }

    fn build(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        bgl: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> wgpu::RenderPipeline {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[bgl],
            push_constant_ranges: &[],
        });
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        render_uniform: &wgpu::Buffer,
        grid: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("field-bg"),
            layout: &self.layout,
            entries: &[bg_buffer(0, render_uniform), bg_buffer(1, grid)],
        })
    }
}
