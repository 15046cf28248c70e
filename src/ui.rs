// ============================================================================
// ui.rs — Myxelia
// egui control panel: run control, field and species parameters, the
// interaction matrix, diagnostics, and capture. The panel edits a draft
// configuration; the app applies it to the engine when anything changed.
// ============================================================================

use egui_plot::{Line, Plot, PlotPoints};

use crate::config::{ColorPreset, SimulationConfig, SpawnPattern, SPECIES_COUNT};
use crate::engine::Backend;
use crate::metrics::{MassHistory, SimDiagnostics};

/// Live values the panel displays but never edits.
pub struct PanelStats {
    pub backend: Backend,
    pub fps: f32,
    pub tick_count: u64,
    pub agent_count: usize,
    pub grid: (u32, u32),
    pub diagnostics: SimDiagnostics,
}

/// What the user asked for this frame.
#[derive(Default)]
pub struct PanelResponse {
    pub config_changed: bool,
    pub speed_changed: bool,
    pub clear: bool,
    pub randomize: bool,
    pub export: bool,
    pub toggle_backend: bool,
}

impl PanelResponse {
    /// Combine panel actions with actions queued from hotkeys.
    pub fn merge(&mut self, other: PanelResponse) {
        self.config_changed |= other.config_changed;
        self.speed_changed |= other.speed_changed;
        self.clear |= other.clear;
        self.randomize |= other.randomize;
        self.export |= other.export;
        self.toggle_backend |= other.toggle_backend;
    }
}

pub fn draw_panel(
    ctx: &egui::Context,
    config: &mut SimulationConfig,
    speed: &mut u32,
    paused: &mut bool,
    stats: &PanelStats,
    history: &MassHistory,
) -> PanelResponse {
    let mut response = PanelResponse::default();

    egui::SidePanel::left("control_panel")
        .default_width(280.0)
        .min_width(240.0)
        .max_width(400.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("🦠 Myxelia");
                ui.separator();

                control_section(ui, speed, paused, stats, &mut response);
                ui.separator();
                field_section(ui, config, &mut response);
                ui.separator();
                species_section(ui, config, &mut response);
                ui.separator();
                population_section(ui, config, stats, &mut response);
                ui.separator();
                interaction_section(ui, config, &mut response);
                ui.separator();
                diagnostics_section(ui, stats, history);
                ui.separator();
                capture_section(ui, &mut response);

                ui.add_space(10.0);
            });
        });

    response
}

// ======================== Control Section ========================

fn control_section(
    ui: &mut egui::Ui,
    speed: &mut u32,
    paused: &mut bool,
    stats: &PanelStats,
    response: &mut PanelResponse,
) {
    ui.collapsing("▶ Control", |ui| {
        ui.horizontal(|ui| {
            let play_label = if *paused { "▶ Resume" } else { "⏸ Pause" };
            if ui.button(play_label).clicked() {
                *paused = !*paused;
            }
            if ui.button("🧹 Clear").clicked() {
                response.clear = true;
            }
            if ui.button("🎲 Randomize").clicked() {
                response.randomize = true;
            }
        });

        ui.add_space(4.0);

        ui.horizontal(|ui| {
            ui.label("Speed:");
            if ui
                .add(egui::Slider::new(speed, 0..=99))
                .changed()
            {
                response.speed_changed = true;
            }
        });
        ui.label(
            egui::RichText::new(format!(
                "Tick interval: {} ms",
                crate::scheduler::speed_to_interval(*speed).as_millis()
            ))
            .small()
            .color(egui::Color32::from_rgb(150, 200, 150)),
        );

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            ui.label(format!("Backend: {}", stats.backend.name()));
            let other = match stats.backend {
                Backend::Cpu => "Switch to GPU",
                Backend::Gpu => "Switch to CPU",
            };
            if ui.button(other).clicked() {
                response.toggle_backend = true;
            }
        });
    });
}

// ======================== Field Section ========================

fn field_section(ui: &mut egui::Ui, config: &mut SimulationConfig, response: &mut PanelResponse) {
    ui.collapsing("🌫 Trail Field", |ui| {
        if ui
            .add(
                egui::Slider::new(&mut config.decay_rate, 0.1..=10.0)
                    .text("Decay rate")
                    .step_by(0.1),
            )
            .changed()
        {
            response.config_changed = true;
        }
        if ui
            .add(
                egui::Slider::new(&mut config.diffuse_weight, 0.0..=1.0)
                    .text("Diffuse weight")
                    .step_by(0.01),
            )
            .changed()
        {
            response.config_changed = true;
        }
    });
}

// ======================== Species Section ========================

fn species_section(ui: &mut egui::Ui, config: &mut SimulationConfig, response: &mut PanelResponse) {
    ui.collapsing("🐌 Species", |ui| {
        for index in 0..SPECIES_COUNT {
            let header = format!(
                "Species {} — {}",
                index + 1,
                config.species[index].color.name()
            );
            ui.collapsing(header, |ui| {
                let sp = &mut config.species[index];

                let mut sensor_deg = sp.sensor_angle.to_degrees();
                if ui
                    .add(
                        egui::Slider::new(&mut sensor_deg, 5.0..=90.0)
                            .text("Sensor angle")
                            .suffix("°"),
                    )
                    .changed()
                {
                    sp.sensor_angle = sensor_deg.to_radians();
                    response.config_changed = true;
                }

                let mut turn_deg = sp.turn_angle.to_degrees();
                if ui
                    .add(
                        egui::Slider::new(&mut turn_deg, 5.0..=90.0)
                            .text("Turn angle")
                            .suffix("°"),
                    )
                    .changed()
                {
                    sp.turn_angle = turn_deg.to_radians();
                    response.config_changed = true;
                }

                if ui
                    .add(
                        egui::Slider::new(&mut sp.sensor_distance, 1.0..=32.0)
                            .text("Sensor distance")
                            .step_by(1.0),
                    )
                    .changed()
                {
                    response.config_changed = true;
                }
                if ui
                    .add(
                        egui::Slider::new(&mut sp.speed, 0.1..=4.0)
                            .text("Speed")
                            .step_by(0.1),
                    )
                    .changed()
                {
                    response.config_changed = true;
                }
                if ui
                    .add(
                        egui::Slider::new(&mut sp.deposit, 5.0..=200.0)
                            .text("Deposit")
                            .step_by(1.0),
                    )
                    .changed()
                {
                    response.config_changed = true;
                }

                ui.horizontal(|ui| {
                    ui.label("Share:");
                    if ui
                        .add(
                            egui::DragValue::new(&mut sp.population_pct)
                                .range(0.0..=100.0)
                                .suffix("%"),
                        )
                        .changed()
                    {
                        response.config_changed = true;
                    }
                });

                ui.horizontal(|ui| {
                    ui.label("Color:");
                    let before = sp.color;
                    egui::ComboBox::from_id_salt(("species_color", index))
                        .selected_text(sp.color.name())
                        .show_ui(ui, |ui| {
                            for preset in ColorPreset::ALL {
                                ui.selectable_value(&mut sp.color, preset, preset.name());
                            }
                        });
                    if sp.color != before {
                        response.config_changed = true;
                    }
                });
            });
        }
    });
}

// ======================== Population Section ========================

fn population_section(
    ui: &mut egui::Ui,
    config: &mut SimulationConfig,
    stats: &PanelStats,
    response: &mut PanelResponse,
) {
    ui.collapsing("👥 Population", |ui| {
        if ui
            .add(
                egui::Slider::new(&mut config.agent_pct, 0.1..=20.0)
                    .text("Agents")
                    .suffix("% of cells")
                    .step_by(0.1),
            )
            .changed()
        {
            response.config_changed = true;
        }

        ui.horizontal(|ui| {
            ui.label("Spawn:");
            let before = config.spawn_pattern;
            egui::ComboBox::from_id_salt("spawn_pattern")
                .selected_text(config.spawn_pattern.name())
                .show_ui(ui, |ui| {
                    for pattern in SpawnPattern::ALL {
                        ui.selectable_value(&mut config.spawn_pattern, pattern, pattern.name());
                    }
                });
            if config.spawn_pattern != before {
                response.config_changed = true;
            }
        });

        let (width, height) = stats.grid;
        ui.label(
            egui::RichText::new(format!(
                "Budget: {} agents on {}×{}",
                config.agent_budget(width as usize, height as usize),
                width,
                height,
            ))
            .small()
            .color(egui::Color32::from_rgb(150, 200, 150)),
        );
    });
}

// ======================== Interaction Section ========================

fn interaction_section(
    ui: &mut egui::Ui,
    config: &mut SimulationConfig,
    response: &mut PanelResponse,
) {
    ui.collapsing("🔗 Interaction Matrix", |ui| {
        egui::Grid::new("interaction_matrix")
            .num_columns(SPECIES_COUNT + 1)
            .show(ui, |ui| {
                ui.label("");
                for col in 0..SPECIES_COUNT {
                    ui.label(egui::RichText::new(format!("S{}", col + 1)).strong());
                }
                ui.end_row();

                for row in 0..SPECIES_COUNT {
                    ui.label(egui::RichText::new(format!("S{}", row + 1)).strong());
                    for col in 0..SPECIES_COUNT {
                        if ui
                            .add(
                                egui::DragValue::new(&mut config.interaction[row][col])
                                    .range(-1.0..=1.0)
                                    .speed(0.01),
                            )
                            .changed()
                        {
                            response.config_changed = true;
                        }
                    }
                    ui.end_row();
                }
            });

        ui.label(
            egui::RichText::new("Stored with the run; sensing is currently species-blind.")
                .small()
                .color(egui::Color32::GRAY),
        );
    });
}

// ======================== Diagnostics Section ========================

fn diagnostics_section(ui: &mut egui::Ui, stats: &PanelStats, history: &MassHistory) {
    ui.collapsing("📈 Diagnostics", |ui| {
        egui::Grid::new("live_stats")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                stat_row(ui, "Tick", &format!("{}", stats.tick_count));
                stat_row(ui, "FPS", &format!("{:.0}", stats.fps));
                stat_row(ui, "Agents", &format!("{}", stats.agent_count));
                stat_row(ui, "Total trail", &format!("{:.0}", stats.diagnostics.total_trail));
                stat_row(ui, "Mean trail", &format!("{:.3}", stats.diagnostics.mean_trail));
                stat_row(ui, "Max trail", &format!("{:.1}", stats.diagnostics.max_trail));
                stat_row(
                    ui,
                    "Occupied",
                    &format!("{:.1}%", stats.diagnostics.occupied_fraction * 100.0),
                );
            });

        if !history.is_empty() {
            let points: PlotPoints = history.points().into();
            Plot::new("mass_plot")
                .height(100.0)
                .show_axes(true)
                .show_grid(true)
                .allow_drag(false)
                .allow_scroll(false)
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new(points).name("Total trail"));
                });
            ui.label(egui::RichText::new("Total trail").small().strong());
        }
    });
}

fn stat_row(ui: &mut egui::Ui, label: &str, value: &str) {
    ui.label(label);
    ui.label(egui::RichText::new(value).monospace());
    ui.end_row();
}

// ======================== Capture Section ========================

fn capture_section(ui: &mut egui::Ui, response: &mut PanelResponse) {
    ui.collapsing("📸 Capture", |ui| {
        if ui.button("📷 Export PNG (E)").clicked() {
            response.export = true;
        }
        ui.label(
            egui::RichText::new("Saved under exports/ at grid resolution.")
                .small()
                .color(egui::Color32::GRAY),
        );
    });
}
