// ============================================================================
// camera.rs — Myxelia
// View state for pan/zoom over the repeating trail field. `origin` is the
// cell coordinate under the window's top-left corner; `zoom` is screen
// pixels per cell. The torus repeats, so the origin never needs clamping.
// ============================================================================

const MIN_ZOOM: f32 = 0.05;
const MAX_ZOOM: f32 = 64.0;

pub struct Camera {
    pub origin: [f32; 2],
    pub zoom: f32,
}

impl Camera {
    /// Fit the whole grid into the window, centered.
    pub fn fit(window: (u32, u32), grid: (u32, u32)) -> Self {
        let zoom = (window.0 as f32 / grid.0 as f32)
            .min(window.1 as f32 / grid.1 as f32)
            .clamp(MIN_ZOOM, MAX_ZOOM);
        let origin = [
            (grid.0 as f32 - window.0 as f32 / zoom) * 0.5,
            (grid.1 as f32 - window.1 as f32 / zoom) * 0.5,
        ];
        Camera { origin, zoom }
    }

    /// Cell-space size of the visible window.
    pub fn view_extent(&self, window: (u32, u32)) -> [f32; 2] {
        [
            window.0 as f32 / self.zoom,
            window.1 as f32 / self.zoom,
        ]
    }

    /// Continuous pan from held keys; a held key moves the view by a fixed
    /// number of screen pixels per frame regardless of zoom.
    pub fn apply_pan(&mut self, up: bool, down: bool, left: bool, right: bool) {
        let step = 8.0 / self.zoom;
        if up {
            self.origin[1] -= step;
        }
        if down {
            self.origin[1] += step;
        }
        if left {
            self.origin[0] -= step;
        }
        if right {
            self.origin[0] += step;
        }
    }

    /// Zoom by `factor`, anchored at the window center.
    pub fn apply_zoom(&mut self, factor: f32, window: (u32, u32)) {
        let old = self.zoom;
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let half_w = window.0 as f32 * 0.5;
        let half_h = window.1 as f32 * 0.5;
        self.origin[0] += half_w * (1.0 / old - 1.0 / self.zoom);
        self.origin[1] += half_h * (1.0 / old - 1.0 / self.zoom);
    }

    /// Continuous zoom from held keys.
    pub fn apply_zoom_keys(&mut self, zoom_in: bool, zoom_out: bool, window: (u32, u32)) {
        if zoom_in {
            self.apply_zoom(1.02, window);
        }
        if zoom_out {
            self.apply_zoom(0.98, window);
        }
    }

    /// Scroll-wheel zoom.
    pub fn apply_scroll(&mut self, scroll_y: f32, window: (u32, u32)) {
        let factor = (1.0 + scroll_y * 0.1).clamp(0.5, 2.0);
        self.apply_zoom(factor, window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_centers_the_grid() {
        let camera = Camera::fit((1024, 512), (512, 512));
        assert_eq!(camera.zoom, 1.0);
        let extent = camera.view_extent((1024, 512));
        assert_eq!(extent, [1024.0, 512.0]);
        // Horizontal slack is split evenly around the grid.
        assert_eq!(camera.origin, [-256.0, 0.0]);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = Camera::fit((800, 600), (512, 512));
        camera.apply_zoom(1e6, (800, 600));
        assert_eq!(camera.zoom, MAX_ZOOM);
        camera.apply_zoom(1e-9, (800, 600));
        assert_eq!(camera.zoom, MIN_ZOOM);
    }

    #[test]
    fn zoom_anchors_on_the_window_center() {
        let window = (800, 600);
        let mut camera = Camera::fit(window, (512, 512));
        let center_before = [
            camera.origin[0] + 400.0 / camera.zoom,
            camera.origin[1] + 300.0 / camera.zoom,
        ];
        camera.apply_zoom(2.0, window);
        let center_after = [
            camera.origin[0] + 400.0 / camera.zoom,
            camera.origin[1] + 300.0 / camera.zoom,
        ];
        assert!((center_before[0] - center_after[0]).abs() < 1e-3);
        assert!((center_before[1] - center_after[1]).abs() < 1e-3);
    }

    #[test]
    fn pan_moves_in_screen_pixels() {
        let mut camera = Camera {
            origin: [0.0, 0.0],
            zoom: 2.0,
        };
        camera.apply_pan(false, true, false, true);
        assert_eq!(camera.origin, [4.0, 4.0]);
    }
}
