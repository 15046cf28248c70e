// ============================================================================
// input.rs — Myxelia
// Keyboard state tracking for continuous held-key actions.
// ============================================================================

/// Navigation keys currently held down: WASD pans, Q/Z zooms.
#[derive(Default)]
pub struct KeysHeld {
    pub pan_up: bool,
    pub pan_down: bool,
    pub pan_left: bool,
    pub pan_right: bool,
    pub zoom_in: bool,
    pub zoom_out: bool,
}
