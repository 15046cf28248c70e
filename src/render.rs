// ============================================================================
// render.rs — Myxelia
// Colormap shared by every render path: trail intensity mixes the blended
// species color over the background. Also hosts the pure-CPU rasterizer the
// CPU backend uses for frame export (no GPU required).
// ============================================================================

use crate::config::SimulationConfig;
use crate::grid::{TrailGrid, TRAIL_MAX};

/// Background color behind the trails, linear RGB.
pub const BACKGROUND: [f32; 3] = [0.039, 0.039, 0.059];

/// Single display color for the scalar trail: the species base colors
/// blended by population share. The field itself carries no per-species
/// information, so one palette covers all deposits.
pub fn blended_species_color(config: &SimulationConfig) -> [f32; 3] {
    let mut color = [0.0f32; 3];
    let mut weight = 0.0f32;
    for sp in &config.species {
        let rgb = sp.color.rgb();
        for (c, v) in color.iter_mut().zip(rgb) {
            *c += v * sp.population_pct;
        }
        weight += sp.population_pct;
    }
    if weight <= 0.0 {
        return config.species[0].color.rgb();
    }
    color.map(|c| c / weight)
}

/// Rasterize `grid` to tightly packed RGBA8 at the requested size, sampling
/// nearest-neighbor. This is the CPU backend's `exportFrame`.
pub fn rasterize(
    grid: &TrailGrid,
    config: &SimulationConfig,
    out_width: u32,
    out_height: u32,
) -> Vec<u8> {
    let fg = blended_species_color(config);
    let cells = grid.cells();
    let grid_w = grid.width();
    let grid_h = grid.height();

    let mut pixels = Vec::with_capacity(out_width as usize * out_height as usize * 4);
    for py in 0..out_height as usize {
        let row = py * grid_h / out_height as usize;
        let base = row * grid_w;
        for px in 0..out_width as usize {
            let col = px * grid_w / out_width as usize;
            let t = (cells[base + col] / TRAIL_MAX).clamp(0.0, 1.0);
            for c in 0..3 {
                let v = BACKGROUND[c] + (fg[c] - BACKGROUND[c]) * t;
                pixels.push((v * 255.0 + 0.5) as u8);
            }
            pixels.push(255);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorPreset;

    #[test]
    fn output_is_tightly_packed_rgba() {
        let grid = TrailGrid::new(16, 16);
        let config = SimulationConfig::default();
        let pixels = rasterize(&grid, &config, 33, 17);
        assert_eq!(pixels.len(), 33 * 17 * 4);
        // Empty grid renders pure background, opaque.
        let bg: Vec<u8> = BACKGROUND
            .iter()
            .map(|&v| (v * 255.0 + 0.5) as u8)
            .chain(std::iter::once(255))
            .collect();
        assert_eq!(&pixels[0..4], &bg[..]);
    }

    #[test]
    fn saturated_cell_renders_the_blend_color() {
        let mut grid = TrailGrid::new(8, 8);
        grid.set(0, 0, TRAIL_MAX);
        let config = SimulationConfig::default();
        let fg = blended_species_color(&config);
        let pixels = rasterize(&grid, &config, 8, 8);
        for c in 0..3 {
            assert_eq!(pixels[c], (fg[c] * 255.0 + 0.5) as u8);
        }
    }

    #[test]
    fn upscaling_repeats_cells_nearest_neighbor() {
        let mut grid = TrailGrid::new(8, 8);
        grid.set(0, 0, TRAIL_MAX);
        let config = SimulationConfig::default();
        let pixels = rasterize(&grid, &config, 16, 16);
        // Cell (0,0) covers the 2x2 top-left pixel block.
        assert_eq!(pixels[0..4], pixels[4..8]);
        let second_row = 16 * 4;
        assert_eq!(pixels[0..4], pixels[second_row..second_row + 4]);
    }

    #[test]
    fn blend_weights_follow_population() {
        let mut config = SimulationConfig::default();
        config.species[0].color = ColorPreset::Amber;
        config.species[0].population_pct = 100.0;
        config.species[1].population_pct = 0.0;
        config.species[2].population_pct = 0.0;
        assert_eq!(blended_species_color(&config), ColorPreset::Amber.rgb());
    }
}
