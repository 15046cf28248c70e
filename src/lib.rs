// ============================================================================
// lib.rs — Myxelia
// Crate root. The simulation lives in a library so the viewer binary, the
// headless runner, and the integration tests all drive the same engine.
// ============================================================================

pub mod agents;
pub mod app;
pub mod camera;
pub mod config;
pub mod cpu;
pub mod engine;
pub mod gpu;
pub mod grid;
pub mod headless;
pub mod input;
pub mod metrics;
pub mod render;
pub mod renderer;
pub mod scheduler;
pub mod trig;
pub mod ui;
