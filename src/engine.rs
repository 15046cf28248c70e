// ============================================================================
// engine.rs — Myxelia
// Backend facade. One enum hides which stepping implementation is active;
// callers drive tick/configure/clear/export without caring whether the
// field lives in host memory or on the GPU.
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::config::SimulationConfig;
use crate::cpu::CpuSimulation;
use crate::gpu::{self, GpuSimulation};
use crate::grid::TrailGrid;
use crate::render;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no compatible gpu adapter found")]
    NoAdapter,
    #[error("gpu device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("gpu allocation failed: {0}")]
    Allocation(String),
    #[error("gpu readback failed: {0}")]
    Readback(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("configuration parse failed: {0}")]
    Config(#[from] serde_json::Error),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Backend {
    Cpu,
    Gpu,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Gpu => "gpu",
        }
    }
}

pub enum Engine {
    Cpu(CpuSimulation),
    Gpu(GpuSimulation),
}

impl Engine {
    pub fn cpu(width: u32, height: u32, config: SimulationConfig, seed: u64) -> Self {
        Engine::Cpu(CpuSimulation::new(
            width as usize,
            height as usize,
            config,
            seed,
        ))
    }

    pub fn gpu(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: SimulationConfig,
        seed: u64,
    ) -> Result<Self, EngineError> {
        GpuSimulation::new(device, queue, surface_format, width, height, config, seed)
            .map(Engine::Gpu)
    }

    /// Probe for GPU acceleration on a fresh headless device; fall back to
    /// the CPU backend when no adapter or device is available. A failed
    /// probe is terminal for the attempt, never retried.
    pub fn probe_headless(width: u32, height: u32, config: SimulationConfig, seed: u64) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let attempt = gpu::acquire(&instance, None).and_then(|ctx| {
            GpuSimulation::new(
                ctx.device,
                ctx.queue,
                gpu::pipelines::RenderPipelines::EXPORT_FORMAT,
                width,
                height,
                config.clone(),
                seed,
            )
        });
        match attempt {
            Ok(sim) => Engine::Gpu(sim),
            Err(err) => {
                log::warn!("gpu backend unavailable ({err}), falling back to cpu");
                Engine::cpu(width, height, config, seed)
            }
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Engine::Cpu(_) => Backend::Cpu,
            Engine::Gpu(_) => Backend::Gpu,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Engine::Cpu(sim) => sim.width() as u32,
            Engine::Gpu(sim) => sim.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Engine::Cpu(sim) => sim.height() as u32,
            Engine::Gpu(sim) => sim.height(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        match self {
            Engine::Cpu(sim) => sim.config(),
            Engine::Gpu(sim) => sim.config(),
        }
    }

    pub fn tick_count(&self) -> u64 {
        match self {
            Engine::Cpu(sim) => sim.tick_count(),
            Engine::Gpu(sim) => sim.tick_count(),
        }
    }

    pub fn agent_count(&self) -> usize {
        match self {
            Engine::Cpu(sim) => sim.agents.len(),
            Engine::Gpu(sim) => sim.agent_count(),
        }
    }

    /// Advance the simulation by exactly one step.
    pub fn tick(&mut self) {
        match self {
            Engine::Cpu(sim) => sim.tick(),
            Engine::Gpu(sim) => sim.tick(),
        }
    }

    pub fn configure(&mut self, config: SimulationConfig) {
        match self {
            Engine::Cpu(sim) => sim.configure(config),
            Engine::Gpu(sim) => sim.configure(config),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Engine::Cpu(sim) => sim.clear(),
            Engine::Gpu(sim) => sim.clear(),
        }
    }

    /// Read-only view of the current trail buffer, available only when the
    /// field lives in host memory.
    pub fn grid_view(&self) -> Option<&TrailGrid> {
        match self {
            Engine::Cpu(sim) => Some(sim.current()),
            Engine::Gpu(_) => None,
        }
    }

    /// The current trail field in trail units, copied to the host. Cheap
    /// for the CPU backend, a staging-buffer round trip for the GPU one.
    pub fn cells(&self) -> Result<Vec<f32>, EngineError> {
        match self {
            Engine::Cpu(sim) => Ok(sim.current().cells().to_vec()),
            Engine::Gpu(sim) => sim.readback_cells(),
        }
    }

    /// Render the current state at the requested resolution as tightly
    /// packed RGBA8 bytes.
    pub fn export_frame(&self, width: u32, height: u32) -> Result<Vec<u8>, EngineError> {
        match self {
            Engine::Cpu(sim) => Ok(render::rasterize(
                sim.current(),
                sim.config(),
                width,
                height,
            )),
            Engine::Gpu(sim) => sim.export_frame(width, height),
        }
    }
}
