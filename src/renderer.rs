// ============================================================================
// renderer.rs — Myxelia
// HUD text rendering via glyphon, drawn on top of the field each frame.
// ============================================================================

use glyphon::{
    Attrs, Buffer as TextBuffer, Cache as GlyphCache, Color as GlyphColor, Family, FontSystem,
    Metrics, Resolution, Shaping, SwashCache, TextArea, TextAtlas, TextBounds, TextRenderer,
    Viewport as GlyphViewport,
};

use crate::engine::Backend;

/// All glyphon resources needed for HUD text rendering.
pub struct HudRenderer {
    pub font_system: FontSystem,
    pub swash_cache: SwashCache,
    pub glyph_viewport: GlyphViewport,
    pub text_atlas: TextAtlas,
    pub text_renderer: TextRenderer,
}

/// Everything the HUD line reports.
pub struct HudState {
    pub backend: Backend,
    pub tick_count: u64,
    pub fps: f32,
    pub agent_count: usize,
    pub paused: bool,
    pub speed: u32,
    pub zoom: f32,
    pub grid: (u32, u32),
    pub show_help: bool,
}

impl HudRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let mut font_system = FontSystem::new();
        let swash_cache = SwashCache::new();
        let glyph_cache = GlyphCache::new(device);
        let glyph_viewport = GlyphViewport::new(device, &glyph_cache);
        let mut text_atlas = TextAtlas::new(device, queue, &glyph_cache, surface_format);
        let text_renderer =
            TextRenderer::new(&mut text_atlas, device, wgpu::MultisampleState::default(), None);

        // Prime font system so first frame renders correctly
        let mut primer = TextBuffer::new(&mut font_system, Metrics::new(16.0, 20.0));
        primer.set_text(
            &mut font_system,
            "Myxelia",
            Attrs::new().family(Family::Monospace),
            Shaping::Basic,
        );

        Self {
            font_system,
            swash_cache,
            glyph_viewport,
            text_atlas,
            text_renderer,
        }
    }

    /// Prepare HUD text for the current frame.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        state: &HudState,
        win_w: u32,
        win_h: u32,
    ) {
        self.glyph_viewport.update(
            queue,
            Resolution {
                width: win_w,
                height: win_h,
            },
        );

        let hud_text = build_hud_text(state);

        let mut text_buf = TextBuffer::new(&mut self.font_system, Metrics::new(14.0, 18.0));
        text_buf.set_size(&mut self.font_system, Some(win_w as f32), Some(win_h as f32));
        text_buf.set_text(
            &mut self.font_system,
            &hud_text,
            Attrs::new().family(Family::Monospace),
            Shaping::Basic,
        );
        text_buf.shape_until_scroll(&mut self.font_system, false);

        self.text_renderer
            .prepare(
                device,
                queue,
                &mut self.font_system,
                &mut self.text_atlas,
                &self.glyph_viewport,
                [TextArea {
                    buffer: &text_buf,
                    left: 10.0,
                    top: 10.0,
                    scale: 1.0,
                    bounds: TextBounds {
                        left: 0,
                        top: 0,
                        right: win_w as i32,
                        bottom: win_h as i32,
                    },
                    default_color: GlyphColor::rgb(220, 220, 220),
                    custom_glyphs: &[],
                }],
                &mut self.swash_cache,
            )
            .unwrap();
    }

    /// Render the HUD overlay into an active render pass.
    pub fn render<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        self.text_renderer
            .render(&self.text_atlas, &self.glyph_viewport, pass)
            .unwrap();
    }

    /// Trim the glyph atlas after presenting.
    pub fn trim(&mut self) {
        self.text_atlas.trim();
    }
}

// ======================== HUD Text Builder ========================

fn build_hud_text(state: &HudState) -> String {
    let pause_status = if state.paused { " [PAUSED]" } else { "" };

    if state.show_help {
        format!(
            "━━━ Myxelia ━━━\n\
             Tick: {}   FPS: {:.0}{}  |  Backend: {}  |  Agents: {}\n\
             \n\
             SIMULATION:\n\
             • Space: {}  |  C: Clear  |  R: Randomize  |  B: Switch backend\n\
             • Speed: {} (panel slider)  |  E: Export PNG\n\
             \n\
             CAMERA:\n\
             • Pan: WASD  |  Zoom: Q/Z or Mouse Wheel ({:.2}x)\n\
             \n\
             UI:\n\
             • Tab: Control panel  |  H: This help  |  ESC: Quit\n\
             \n\
             GRID: {}×{} torus",
            state.tick_count,
            state.fps,
            pause_status,
            state.backend.name(),
            state.agent_count,
            if state.paused { "Resume" } else { "Pause" },
            state.speed,
            state.zoom,
            state.grid.0,
            state.grid.1,
        )
    } else {
        format!(
            "Tick: {}   FPS: {:.0}{}   Backend: {}   Agents: {}\n\
             Space: Pause | Tab: Panel | H: Help",
            state.tick_count,
            state.fps,
            pause_status,
            state.backend.name(),
            state.agent_count,
        )
    }
}
