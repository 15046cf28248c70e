// ============================================================================
// app.rs — Myxelia
// Application state and winit event-loop handler with egui UI integration.
// The redraw callback is the single driver: it runs the fixed-step scheduler,
// advances the engine, and presents the field with HUD and panel on top.
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use winit::{
    application::ApplicationHandler,
    event::{MouseScrollDelta, WindowEvent},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes},
};

use crate::camera::Camera;
use crate::config::{self, SimulationConfig};
use crate::engine::{Backend, Engine};
use crate::gpu::{self, GpuContext, GridPresenter};
use crate::input::KeysHeld;
use crate::metrics::{FrameTimer, MassHistory, SimDiagnostics};
use crate::render::BACKGROUND;
use crate::renderer::{HudRenderer, HudState};
use crate::scheduler::{speed_to_interval, FixedStep};
use crate::ui::{self, PanelResponse, PanelStats};

// ======================== Application ========================

pub struct App {
    state: Option<AppState>,
    config: AppConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub backend: Option<Backend>,
    pub seed: u64,
    pub speed: u32,
    pub config_path: Option<String>,
    pub diag_interval: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grid_width: 512,
            grid_height: 512,
            backend: None,
            seed: 0,
            speed: 80,
            config_path: None,
            diag_interval: 240,
        }
    }
}

struct AppState {
    // GPU
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,

    // Simulation
    engine: Engine,
    presenter: Option<GridPresenter>,
    config: SimulationConfig,
    scheduler: FixedStep,
    speed: u32,
    paused: bool,
    grid: (u32, u32),
    seed: u64,

    // Window
    window: Arc<Window>,

    // Camera & Input
    camera: Camera,
    keys: KeysHeld,
    pending: PanelResponse,

    // HUD
    hud: HudRenderer,
    show_panel: bool,
    show_help: bool,

    // egui
    egui_ctx: egui::Context,
    egui_winit_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Diagnostics
    timer: FrameTimer,
    history: MassHistory,
    diagnostics: SimDiagnostics,
    last_diag_tick: u64,
    diag_interval: u64,

    rng: SmallRng,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            state: None,
            config,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title("Myxelia — Physarum Lab")
            .with_inner_size(winit::dpi::LogicalSize::new(1280u32, 960u32));

        let window = Arc::new(event_loop.create_window(window_attrs).unwrap());

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = match instance.create_surface(window.clone()) {
            Ok(surface) => surface,
            Err(err) => {
                log::error!(
                    "surface creation failed ({err}); run with --headless --backend cpu \
                     for software simulation"
                );
                event_loop.exit();
                return;
            }
        };

        // Presentation needs a device even when the simulation runs on the
        // CPU backend.
        let ctx = match gpu::acquire(&instance, Some(&surface)) {
            Ok(ctx) => ctx,
            Err(err) => {
                log::error!(
                    "no usable gpu for presentation ({err}); run with --headless \
                     --backend cpu for software simulation"
                );
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let surface_config = configure_surface(&surface, &ctx, size);

        let sim_config = match &self.config.config_path {
            Some(path) => match config::load_config(path) {
                Ok(loaded) => {
                    log::info!("loaded configuration from {path}");
                    loaded
                }
                Err(err) => {
                    log::warn!("failed to load {path}: {err}; using defaults");
                    SimulationConfig::default()
                }
            },
            None => SimulationConfig::default(),
        };

        let grid = (self.config.grid_width, self.config.grid_height);
        let (engine, presenter) = build_engine(
            &ctx.device,
            &ctx.queue,
            surface_config.format,
            self.config.backend,
            grid,
            &sim_config,
            self.config.seed,
        );

        let hud = HudRenderer::new(&ctx.device, &ctx.queue, surface_config.format);

        // ---- Initialize egui ----
        let egui_ctx = egui::Context::default();
        // Dark theme with slightly transparent backgrounds for overlay feel
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(27, 27, 35, 235);
        visuals.panel_fill = egui::Color32::from_rgba_premultiplied(20, 20, 28, 230);
        egui_ctx.set_visuals(visuals);

        let egui_winit_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            event_loop,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer =
            egui_wgpu::Renderer::new(&ctx.device, surface_config.format, None, 1, false);

        let mut scheduler = FixedStep::new(speed_to_interval(self.config.speed));
        scheduler.start();

        log::info!(
            "myxelia initialized: {}x{} torus, {} backend, {} agents",
            grid.0,
            grid.1,
            engine.backend().name(),
            engine.agent_count(),
        );

        self.state = Some(AppState {
            device: ctx.device,
            queue: ctx.queue,
            surface,
            surface_config,
            engine,
            presenter,
            config: sim_config,
            scheduler,
            speed: self.config.speed,
            paused: false,
            grid,
            seed: self.config.seed,
            window: window.clone(),
            camera: Camera::fit((size.width, size.height), grid),
            keys: KeysHeld::default(),
            pending: PanelResponse::default(),
            hud,
            show_panel: true,
            show_help: false,
            egui_ctx,
            egui_winit_state,
            egui_renderer,
            timer: FrameTimer::new(),
            history: MassHistory::new(512),
            diagnostics: SimDiagnostics::default(),
            last_diag_tick: 0,
            diag_interval: self.config.diag_interval.max(1),
            rng: SmallRng::seed_from_u64(self.config.seed ^ 0x9e37_79b9),
        });

        // Initial redraw — required on macOS with winit 0.30
        window.request_redraw();
    }

    fn about_to_wait(&mut self, _event_loop: &winit::event_loop::ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        // Pass events to egui first
        let egui_response = state.egui_winit_state.on_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput { event, .. } => {
                handle_keyboard(state, event_loop, &event, egui_response.consumed);
            }

            WindowEvent::MouseWheel { delta, .. } => {
                if !egui_response.consumed {
                    let scroll = match &delta {
                        MouseScrollDelta::LineDelta(_, y) => *y,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
                    };
                    let win = (state.surface_config.width, state.surface_config.height);
                    state.camera.apply_scroll(scroll, win);
                }
            }

            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    state.surface_config.width = new_size.width;
                    state.surface_config.height = new_size.height;
                    state.surface.configure(&state.device, &state.surface_config);
                }
            }

            WindowEvent::RedrawRequested => {
                redraw(state);
            }

            _ => {}
        }
    }
}

// ======================== Surface Setup ========================

fn configure_surface(
    surface: &wgpu::Surface<'_>,
    ctx: &GpuContext,
    size: winit::dpi::PhysicalSize<u32>,
) -> wgpu::SurfaceConfiguration {
    let caps = surface.get_capabilities(&ctx.adapter);
    let format = caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .copied()
        .unwrap_or(caps.formats[0]);

    // Uncapped presentation when available; the scheduler bounds the
    // simulation rate either way.
    let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Mailbox) {
        wgpu::PresentMode::Mailbox
    } else if caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
        wgpu::PresentMode::Immediate
    } else {
        wgpu::PresentMode::Fifo
    };
    log::info!("present mode: {present_mode:?}");

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode,
        alpha_mode: caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&ctx.device, &config);
    config
}

// ======================== Engine Construction ========================

/// Build the requested engine, probing GPU first unless the CPU backend was
/// forced.  The CPU backend additionally gets a presenter that uploads its
/// grid for display.
fn build_engine(
    device: &Arc<wgpu::Device>,
    queue: &Arc<wgpu::Queue>,
    surface_format: wgpu::TextureFormat,
    requested: Option<Backend>,
    grid: (u32, u32),
    config: &SimulationConfig,
    seed: u64,
) -> (Engine, Option<GridPresenter>) {
    let engine = match requested {
        Some(Backend::Cpu) => Engine::cpu(grid.0, grid.1, config.clone(), seed),
        _ => match Engine::gpu(
            device.clone(),
            queue.clone(),
            surface_format,
            grid.0,
            grid.1,
            config.clone(),
            seed,
        ) {
            Ok(engine) => engine,
            Err(err) => {
                log::warn!("gpu backend unavailable ({err}), falling back to cpu");
                Engine::cpu(grid.0, grid.1, config.clone(), seed)
            }
        },
    };

    let presenter = match engine.backend() {
        Backend::Cpu => Some(GridPresenter::new(device, surface_format, grid.0, grid.1)),
        Backend::Gpu => None,
    };
    (engine, presenter)
}

// ======================== Keyboard Handling ========================

fn handle_keyboard(
    state: &mut AppState,
    event_loop: &winit::event_loop::ActiveEventLoop,
    event: &winit::event::KeyEvent,
    egui_consumed: bool,
) {
    let pressed = event.state.is_pressed();

    // Quit works even when egui has focus.
    if let Key::Named(NamedKey::Escape) = &event.logical_key {
        if pressed {
            event_loop.exit();
        }
    }

    if egui_consumed {
        return;
    }

    match &event.logical_key {
        Key::Named(NamedKey::Space) if pressed => {
            state.paused = !state.paused;
        }
        Key::Named(NamedKey::Tab) if pressed => {
            state.show_panel = !state.show_panel;
        }

        Key::Character(c) => match c.as_str() {
            "w" | "W" => state.keys.pan_up = pressed,
            "s" | "S" => state.keys.pan_down = pressed,
            "a" | "A" => state.keys.pan_left = pressed,
            "d" | "D" => state.keys.pan_right = pressed,
            "q" | "Q" => state.keys.zoom_in = pressed,
            "z" | "Z" => state.keys.zoom_out = pressed,
            "c" | "C" if pressed => state.pending.clear = true,
            "r" | "R" if pressed => state.pending.randomize = true,
            "e" | "E" if pressed => state.pending.export = true,
            "b" | "B" if pressed => state.pending.toggle_backend = true,
            "h" | "H" if pressed => state.show_help = !state.show_help,
            _ => {}
        },

        _ => {}
    }
}

// ======================== Frame Rendering ========================

fn redraw(state: &mut AppState) {
    let now = Instant::now();
    state.timer.frame(now);

    let win = (state.surface_config.width, state.surface_config.height);

    // Camera movement from held keys
    state.camera.apply_pan(
        state.keys.pan_up,
        state.keys.pan_down,
        state.keys.pan_left,
        state.keys.pan_right,
    );
    state
        .camera
        .apply_zoom_keys(state.keys.zoom_in, state.keys.zoom_out, win);

    // ---- egui frame ----
    let stats = PanelStats {
        backend: state.engine.backend(),
        fps: state.timer.fps,
        tick_count: state.engine.tick_count(),
        agent_count: state.engine.agent_count(),
        grid: state.grid,
        diagnostics: state.diagnostics,
    };
    let show_panel = state.show_panel;
    let mut panel_response = PanelResponse::default();
    let raw_input = state.egui_winit_state.take_egui_input(&state.window);
    let full_output = state.egui_ctx.run(raw_input, |ctx| {
        if show_panel {
            panel_response = ui::draw_panel(
                ctx,
                &mut state.config,
                &mut state.speed,
                &mut state.paused,
                &stats,
                &state.history,
            );
        }
    });
    state
        .egui_winit_state
        .handle_platform_output(&state.window, full_output.platform_output);

    // ---- Apply requested actions (panel + hotkeys) ----
    let mut actions = std::mem::take(&mut state.pending);
    actions.merge(panel_response);
    apply_actions(state, actions);

    // Pause gates the scheduler; start() resets accumulated time so a long
    // pause never turns into a tick burst.
    if state.paused {
        state.scheduler.stop();
    } else if !state.scheduler.is_running() {
        state.scheduler.start();
    }

    // ---- Simulation steps ----
    let ticks = state.scheduler.update(now);
    if ticks > 0 {
        let started = Instant::now();
        for _ in 0..ticks {
            state.engine.tick();
        }
        let ms = started.elapsed().as_secs_f32() * 1000.0 / ticks as f32;
        state.timer.record_tick(ms);
    }

    // ---- Periodic diagnostics ----
    if state.engine.tick_count() >= state.last_diag_tick + state.diag_interval {
        match state.engine.cells() {
            Ok(cells) => {
                let diag = SimDiagnostics::from_cells(&cells);
                state.history.push(state.engine.tick_count(), diag.total_trail);
                diag.log(state.engine.tick_count(), state.engine.agent_count());
                state.diagnostics = diag;
            }
            Err(err) => log::warn!("diagnostics readback failed: {err}"),
        }
        state.last_diag_tick = state.engine.tick_count();
    }

    // ---- Prepare HUD (only when the panel is hidden, to avoid overlap) ----
    if !state.show_panel {
        let hud_state = HudState {
            backend: state.engine.backend(),
            tick_count: state.engine.tick_count(),
            fps: state.timer.fps,
            agent_count: state.engine.agent_count(),
            paused: state.paused,
            speed: state.speed,
            zoom: state.camera.zoom,
            grid: state.grid,
            show_help: state.show_help,
        };
        state
            .hud
            .prepare(&state.device, &state.queue, &hud_state, win.0, win.1);
    }

    // ---- Upload view for the active presentation path ----
    match (&state.engine, &mut state.presenter) {
        (Engine::Gpu(sim), _) => sim.update_view(&state.camera, win),
        (Engine::Cpu(sim), Some(presenter)) => {
            presenter.upload(&state.queue, sim.current());
            presenter.update_view(&state.queue, &state.camera, win, sim.config());
        }
        _ => {}
    }

    // ---- Render pass ----
    let output = match state.surface.get_current_texture() {
        Ok(t) => t,
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            state.surface.configure(&state.device, &state.surface_config);
            return;
        }
        Err(e) => {
            log::error!("surface error: {e:?}");
            return;
        }
    };
    let view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = state
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame-encoder"),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("field-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
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
        });

        match &state.engine {
            Engine::Gpu(sim) => sim.draw(&mut pass),
            Engine::Cpu(_) => {
                if let Some(presenter) = &state.presenter {
                    presenter.draw(&mut pass);
                }
            }
        }

        if !state.show_panel {
            state.hud.render(&mut pass);
        }
    }
    state.queue.submit(std::iter::once(encoder.finish()));

    // ---- egui render pass (on top of the field, separate encoder) ----
    let paint_jobs = state
        .egui_ctx
        .tessellate(full_output.shapes, full_output.pixels_per_point);

    for (id, image_delta) in &full_output.textures_delta.set {
        state
            .egui_renderer
            .update_texture(&state.device, &state.queue, *id, image_delta);
    }

    let screen_descriptor = egui_wgpu::ScreenDescriptor {
        size_in_pixels: [win.0, win.1],
        pixels_per_point: full_output.pixels_per_point,
    };

    let mut egui_encoder = state
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui-encoder"),
        });

    state.egui_renderer.update_buffers(
        &state.device,
        &state.queue,
        &mut egui_encoder,
        &paint_jobs,
        &screen_descriptor,
    );

    render_egui_pass(
        &state.egui_renderer,
        &mut egui_encoder,
        &view,
        &paint_jobs,
        &screen_descriptor,
    );

    state.queue.submit(std::iter::once(egui_encoder.finish()));

    output.present();

    for id in &full_output.textures_delta.free {
        state.egui_renderer.free_texture(id);
    }
    state.hud.trim();

    state.window.request_redraw();
}

// ======================== Actions ========================

fn apply_actions(state: &mut AppState, mut actions: PanelResponse) {
    if actions.randomize {
        state.config = state.config.randomized(&mut state.rng);
        actions.config_changed = true;
        log::info!("parameters randomized");
    }
    if actions.config_changed {
        state.engine.configure(state.config.clone());
    }
    if actions.speed_changed {
        state.scheduler.set_interval(speed_to_interval(state.speed));
    }
    if actions.clear {
        state.engine.clear();
        state.history = MassHistory::new(512);
        state.last_diag_tick = 0;
    }
    if actions.toggle_backend {
        toggle_backend(state);
    }
    if actions.export {
        export_png(&state.engine);
    }
}

/// Swap backends by rebuilding the engine from the draft configuration.
/// The run restarts; a failed GPU attempt falls back to CPU and is not
/// retried until requested again.
fn toggle_backend(state: &mut AppState) {
    let target = match state.engine.backend() {
        Backend::Cpu => Backend::Gpu,
        Backend::Gpu => Backend::Cpu,
    };
    let (engine, presenter) = build_engine(
        &state.device,
        &state.queue,
        state.surface_config.format,
        Some(target),
        state.grid,
        &state.config,
        state.seed,
    );
    log::info!("backend switched to {}", engine.backend().name());
    state.engine = engine;
    state.presenter = presenter;
    state.history = MassHistory::new(512);
    state.last_diag_tick = 0;
}

fn export_png(engine: &Engine) {
    let width = engine.width();
    let height = engine.height();
    let result = engine.export_frame(width, height).and_then(|pixels| {
        std::fs::create_dir_all("exports")?;
        let path = std::path::PathBuf::from(format!(
            "exports/myxelia_{}_tick{:06}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            engine.tick_count(),
        ));
        image::save_buffer(&path, &pixels, width, height, image::ColorType::Rgba8)?;
        log::info!("frame exported: {}", path.display());
        Ok(())
    });
    if let Err(err) = result {
        log::error!("export failed: {err}");
    }
}

// ======================== egui Render Helper ========================

/// Render egui paint jobs into their own pass. The pass lifetime is
/// detached because egui_wgpu::Renderer::render requires a 'static pass
/// under wgpu 24.
fn render_egui_pass(
    renderer: &egui_wgpu::Renderer,
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    paint_jobs: &[egui::ClippedPrimitive],
    screen_descriptor: &egui_wgpu::ScreenDescriptor,
) {
    let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("egui-pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    let mut pass = pass.forget_lifetime();
    renderer.render(&mut pass, paint_jobs, screen_descriptor);
}
