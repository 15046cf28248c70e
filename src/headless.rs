// ============================================================================
// headless.rs — Myxelia
// Headless simulation runner for fast long-horizon batches.
// ============================================================================

use std::time::Instant;

use crate::config::{self, SimulationConfig};
use crate::engine::{Backend, Engine, EngineError};
use crate::metrics::SimDiagnostics;

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub ticks: u64,
    pub width: u32,
    pub height: u32,
    pub backend: Option<Backend>,
    pub seed: u64,
    pub config_path: Option<String>,
    pub out: Option<String>,
    pub progress_interval: u64,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            ticks: 10_000,
            width: 512,
            height: 512,
            backend: None,
            seed: 0,
            config_path: None,
            out: None,
            progress_interval: 1000,
        }
    }
}

pub fn run(config: &HeadlessConfig) -> Result<(), EngineError> {
    let sim_config = match &config.config_path {
        Some(path) => config::load_config(path)?,
        None => SimulationConfig::default(),
    };

    let mut engine = match config.backend {
        Some(Backend::Cpu) => {
            Engine::cpu(config.width, config.height, sim_config.clone(), config.seed)
        }
        _ => Engine::probe_headless(config.width, config.height, sim_config.clone(), config.seed),
    };

    log::info!(
        "headless run started: {} ticks on {}x{} | {} backend | {} agents",
        config.ticks,
        engine.width(),
        engine.height(),
        engine.backend().name(),
        engine.agent_count(),
    );

    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut last_report_tick = 0u64;

    for step in 0..config.ticks {
        engine.tick();

        if config.progress_interval > 0 && (step + 1) % config.progress_interval == 0 {
            let done = step + 1;
            let total_elapsed = started.elapsed().as_secs_f64().max(1e-6);
            let total_tps = done as f64 / total_elapsed;

            let window_elapsed = last_report.elapsed().as_secs_f64().max(1e-6);
            let window_ticks = done - last_report_tick;
            let window_tps = window_ticks as f64 / window_elapsed;

            let remaining = config.ticks.saturating_sub(done);
            let eta_secs = if total_tps > 1e-6 {
                remaining as f64 / total_tps
            } else {
                0.0
            };

            log::info!(
                "headless progress: {}/{} | tps={:.0} (window {:.0}) | ETA={:.1} min",
                done,
                config.ticks,
                total_tps,
                window_tps,
                eta_secs / 60.0,
            );

            last_report = Instant::now();
            last_report_tick = done;
        }
    }

    let elapsed = started.elapsed().as_secs_f64().max(1e-6);
    log::info!(
        "headless run finished: {} ticks in {:.1}s ({:.0} tps)",
        config.ticks,
        elapsed,
        config.ticks as f64 / elapsed,
    );

    let cells = engine.cells()?;
    SimDiagnostics::from_cells(&cells).log(engine.tick_count(), engine.agent_count());

    if let Some(path) = &config.out {
        let pixels = engine.export_frame(engine.width(), engine.height())?;
        if let Some(dir) = std::path::Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        image::save_buffer(
            path,
            &pixels,
            engine.width(),
            engine.height(),
            image::ColorType::Rgba8,
        )?;
        let json_path = std::path::Path::new(path).with_extension("json");
        std::fs::write(&json_path, serde_json::to_string_pretty(&sim_config)?)?;
        log::info!(
            "final frame saved to {path}, config to {}",
            json_path.display()
        );
    }

    Ok(())
}
