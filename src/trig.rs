// ============================================================================
// trig.rs — Myxelia
// Table-based sine/cosine for agent heading math. One full turn is quantized
// into TRIG_TABLE_SIZE buckets so the hot kernel never calls into libm.
// ============================================================================

use std::f32::consts::PI;

pub const TRIG_TABLE_SIZE: usize = 4096;

const TABLE_MASK: usize = TRIG_TABLE_SIZE - 1;
const TWO_PI: f32 = 2.0 * PI;
const INDEX_FACTOR: f32 = TRIG_TABLE_SIZE as f32 / TWO_PI;

/// Precomputed sine/cosine over [0, 2pi), indexed by masked bucket.
pub struct TrigTable {
    sin: Vec<f32>,
    cos: Vec<f32>,
}

impl TrigTable {
    pub fn new() -> Self {
        let mut sin = Vec::with_capacity(TRIG_TABLE_SIZE);
        let mut cos = Vec::with_capacity(TRIG_TABLE_SIZE);
        for i in 0..TRIG_TABLE_SIZE {
            let angle = i as f32 * TWO_PI / TRIG_TABLE_SIZE as f32;
            sin.push(angle.sin());
            cos.push(angle.cos());
        }
        TrigTable { sin, cos }
    }

    /// Bucket index for `angle`, normalized into [0, 2pi) first.
    #[inline]
    fn index(angle: f32) -> usize {
        let mut a = angle % TWO_PI;
        if a < 0.0 {
            a += TWO_PI;
        }
        (a * INDEX_FACTOR) as usize & TABLE_MASK
    }

    #[inline]
    pub fn sin(&self, angle: f32) -> f32 {
        self.sin[Self::index(angle)]
    }

    #[inline]
    pub fn cos(&self, angle: f32) -> f32 {
        self.cos[Self::index(angle)]
    }
}

impl Default for TrigTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One bucket spans 2pi/4096 radians; a lookup may be off by at most one
    // bucket, so the value error stays below ~1.5 quantization steps.
    const TOLERANCE: f32 = 1.5 * TWO_PI / TRIG_TABLE_SIZE as f32;

    #[test]
    fn matches_std_trig_within_quantization() {
        let table = TrigTable::new();
        for i in 0..2000 {
            let angle = i as f32 * 0.0173 - 17.0;
            assert!(
                (table.sin(angle) - angle.sin()).abs() < TOLERANCE,
                "sin({angle}) diverged"
            );
            assert!(
                (table.cos(angle) - angle.cos()).abs() < TOLERANCE,
                "cos({angle}) diverged"
            );
        }
    }

    #[test]
    fn negative_angles_normalize() {
        let table = TrigTable::new();
        assert!((table.sin(-PI / 2.0) + 1.0).abs() < TOLERANCE);
        assert!((table.cos(-PI) + 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn angles_beyond_full_turns_wrap() {
        let table = TrigTable::new();
        let angle = 0.5;
        assert!((table.sin(angle + 10.0 * TWO_PI) - table.sin(angle)).abs() < f32::EPSILON);
        assert!((table.cos(angle - 6.0 * TWO_PI) - table.cos(angle)).abs() < TOLERANCE);
    }

    #[test]
    fn cardinal_angles_are_exact_buckets() {
        let table = TrigTable::new();
        assert_eq!(table.sin(0.0), 0.0);
        assert_eq!(table.cos(0.0), 1.0);
        assert!((table.sin(PI / 2.0) - 1.0).abs() < TOLERANCE);
    }
}
