// ============================================================================
// metrics.rs — Myxelia
// Trail-field diagnostics, frame timing, and the mass history ring that
// feeds the control panel sparkline.
// ============================================================================

use std::collections::VecDeque;
use std::time::Instant;

/// Cells above this value count as occupied for the coverage fraction.
const OCCUPIED_THRESHOLD: f32 = 1.0;

// ======================== Field diagnostics ========================

/// Aggregate statistics over the current trail buffer.
#[derive(Clone, Copy, Default)]
pub struct SimDiagnostics {
    pub total_trail: f32,
    pub mean_trail: f32,
    pub max_trail: f32,
    pub occupied_fraction: f32,
}

impl SimDiagnostics {
    /// Single pass over the cells of the readable buffer.
    pub fn from_cells(cells: &[f32]) -> Self {
        let mut total = 0.0f64;
        let mut max_trail = 0.0f32;
        let mut occupied = 0u32;

        for &v in cells {
            total += v as f64;
            if v > max_trail {
                max_trail = v;
            }
            if v > OCCUPIED_THRESHOLD {
                occupied += 1;
            }
        }

        let n = cells.len().max(1);
        SimDiagnostics {
            total_trail: total as f32,
            mean_trail: (total / n as f64) as f32,
            max_trail,
            occupied_fraction: occupied as f32 / n as f32,
        }
    }

    pub fn log(&self, tick: u64, agents: usize) {
        log::info!(
            "TRAIL @{tick}: total={:.0} | mean={:.3} | max={:.1} | occupied={:.1}% | agents={agents}",
            self.total_trail,
            self.mean_trail,
            self.max_trail,
            self.occupied_fraction * 100.0,
        );
    }
}

// ======================== Frame timing ========================

/// Exponentially smoothed frame rate and tick cost.
pub struct FrameTimer {
    last_frame: Option<Instant>,
    pub fps: f32,
    pub tick_ms: f32,
}

impl FrameTimer {
    pub fn new() -> Self {
        FrameTimer {
            last_frame: None,
            fps: 0.0,
            tick_ms: 0.0,
        }
    }

    /// Call once per displayed frame.
    pub fn frame(&mut self, now: Instant) {
        if let Some(previous) = self.last_frame {
            let dt = now.duration_since(previous).as_secs_f32();
            if dt > 0.0 {
                let instant_fps = 1.0 / dt;
                self.fps = if self.fps == 0.0 {
                    instant_fps
                } else {
                    self.fps * 0.95 + instant_fps * 0.05
                };
            }
        }
        self.last_frame = Some(now);
    }

    /// Record the cost of one simulation tick in milliseconds.
    pub fn record_tick(&mut self, millis: f32) {
        self.tick_ms = if self.tick_ms == 0.0 {
            millis
        } else {
            self.tick_ms * 0.9 + millis * 0.1
        };
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

// ======================== Mass history ========================

/// Fixed-capacity ring of (tick, total trail) samples for the UI plot.
pub struct MassHistory {
    samples: VecDeque<[f64; 2]>,
    capacity: usize,
}

impl MassHistory {
    pub fn new(capacity: usize) -> Self {
        MassHistory {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, tick: u64, total_trail: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back([tick as f64, total_trail as f64]);
    }

    pub fn points(&self) -> Vec<[f64; 2]> {
        self.samples.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_aggregate_the_field() {
        let mut cells = vec![0.0f32; 100];
        cells[0] = 255.0;
        cells[1] = 45.0;
        cells[2] = 0.5; // below the occupancy threshold
        let diag = SimDiagnostics::from_cells(&cells);
        assert_eq!(diag.total_trail, 300.5);
        assert_eq!(diag.max_trail, 255.0);
        assert!((diag.mean_trail - 3.005).abs() < 1e-4);
        assert!((diag.occupied_fraction - 0.02).abs() < 1e-6);
    }

    #[test]
    fn empty_field_is_all_zero() {
        let diag = SimDiagnostics::from_cells(&[]);
        assert_eq!(diag.total_trail, 0.0);
        assert_eq!(diag.occupied_fraction, 0.0);
    }

    #[test]
    fn history_ring_drops_oldest() {
        let mut history = MassHistory::new(3);
        for tick in 0..5u64 {
            history.push(tick, tick as f32 * 10.0);
        }
        let points = history.points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0][0], 2.0);
        assert_eq!(points[2][0], 4.0);
    }
}
