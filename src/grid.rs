// ============================================================================
// grid.rs — Myxelia
// TrailGrid: the toroidal scalar field agents deposit into and sense from.
// Both dimensions are powers of two so wraparound is a bitmask, never a
// modulo. Two instances ping-pong as source/destination across ticks.
// ============================================================================

use rand::Rng;

/// Largest value a cell can hold.
pub const TRAIL_MAX: f32 = 255.0;

/// Round `n` up to the next power of two (minimum 1).
pub fn ceil_power_of_two(n: u32) -> u32 {
    n.max(1).next_power_of_two()
}

#[derive(Clone)]
pub struct TrailGrid {
    width: usize,
    height: usize,
    col_mask: usize,
    row_mask: usize,
    data: Vec<f32>,
}

impl TrailGrid {
    /// `width` and `height` must both be powers of two.
    pub fn new(width: usize, height: usize) -> Self {
        debug_assert!(width.is_power_of_two(), "grid width must be a power of two");
        debug_assert!(height.is_power_of_two(), "grid height must be a power of two");
        TrailGrid {
            width,
            height,
            col_mask: width - 1,
            row_mask: height - 1,
            data: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn col_mask(&self) -> usize {
        self.col_mask
    }

    pub fn row_mask(&self) -> usize {
        self.row_mask
    }

    /// Wrap any integer column onto the torus.
    #[inline]
    pub fn wrap_col(&self, col: i32) -> usize {
        (col & self.col_mask as i32) as usize
    }

    /// Wrap any integer row onto the torus.
    #[inline]
    pub fn wrap_row(&self, row: i32) -> usize {
        (row & self.row_mask as i32) as usize
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        if row >= self.height || col >= self.width {
            return 0.0;
        }
        self.data[row * self.width + col]
    }

    /// Bounds-checked write. Out-of-range coordinates are ignored; the value
    /// is clamped into [0, TRAIL_MAX].
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        if row >= self.height || col >= self.width {
            return;
        }
        self.data[row * self.width + col] = value.clamp(0.0, TRAIL_MAX);
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Seed the field: each cell independently receives a full-strength
    /// deposit with probability `density`.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R, density: f32) {
        for cell in &mut self.data {
            *cell = if rng.gen::<f32>() < density { TRAIL_MAX } else { 0.0 };
        }
    }

    /// Raw cells in row-major order. The step kernel iterates this directly
    /// with pre-wrapped indices instead of going through `get`.
    pub fn cells(&self) -> &[f32] {
        &self.data
    }

    pub fn cells_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn masked_wrap_matches_double_modulo() {
        let grid = TrailGrid::new(64, 32);
        for &coord in &[-129i32, -64, -33, -1, 0, 1, 31, 32, 63, 64, 100, 513] {
            let by_mask = grid.wrap_col(coord);
            let by_mod = ((coord % 64) + 64) % 64;
            assert_eq!(by_mask, by_mod as usize, "col {coord}");

            let by_mask = grid.wrap_row(coord);
            let by_mod = ((coord % 32) + 32) % 32;
            assert_eq!(by_mask, by_mod as usize, "row {coord}");
        }
    }

    #[test]
    fn set_clamps_to_storage_range() {
        let mut grid = TrailGrid::new(16, 16);
        grid.set(3, 3, 900.0);
        assert_eq!(grid.get(3, 3), TRAIL_MAX);
        grid.set(3, 3, -14.0);
        assert_eq!(grid.get(3, 3), 0.0);
    }

    #[test]
    fn out_of_range_coordinates_are_ignored() {
        let mut grid = TrailGrid::new(16, 16);
        grid.set(16, 0, 50.0);
        grid.set(0, 99, 50.0);
        assert!(grid.cells().iter().all(|&v| v == 0.0));
        assert_eq!(grid.get(16, 0), 0.0);
        assert_eq!(grid.get(0, 99), 0.0);
    }

    #[test]
    fn clear_zeroes_every_cell() {
        let mut grid = TrailGrid::new(8, 8);
        for row in 0..8 {
            grid.set(row, row, 100.0);
        }
        grid.clear();
        assert!(grid.cells().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn randomize_respects_density_roughly() {
        let mut grid = TrailGrid::new(128, 128);
        let mut rng = SmallRng::seed_from_u64(7);
        grid.randomize(&mut rng, 0.3);
        let filled = grid.cells().iter().filter(|&&v| v == TRAIL_MAX).count();
        let fraction = filled as f32 / (128.0 * 128.0);
        assert!((fraction - 0.3).abs() < 0.03, "fill fraction {fraction}");
        assert!(grid.cells().iter().all(|&v| v == 0.0 || v == TRAIL_MAX));
    }

    #[test]
    fn ceil_power_of_two_rounds_up() {
        assert_eq!(ceil_power_of_two(0), 1);
        assert_eq!(ceil_power_of_two(1), 1);
        assert_eq!(ceil_power_of_two(2), 2);
        assert_eq!(ceil_power_of_two(3), 4);
        assert_eq!(ceil_power_of_two(512), 512);
        assert_eq!(ceil_power_of_two(700), 1024);
    }
}
