//! Conversion from real-world acceleration to engine gravity units.

/// Standard gravity at Earth's surface, m/s².
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Engine units per m/s². Earth maps to 1.
pub const GRAVITY_UNIT_SCALE: f32 = 1.0 / STANDARD_GRAVITY;

/// Per-axis bound on engine gravity.
pub const MAX_ENGINE_GRAVITY: f32 = 10.0;

/// Engine gravity used when an axis cannot be computed.
pub const DEFAULT_ENGINE_GRAVITY: [f32; 2] = [0.0, 1.0];

/// Converts a real-world acceleration (m/s², +y down) into engine units.
///
/// Each axis is scaled so Earth's gravity has unit magnitude, then clamped to
/// `±MAX_ENGINE_GRAVITY`. A non-finite axis falls back to the matching axis
/// of `DEFAULT_ENGINE_GRAVITY`.
pub fn normalize_gravity(real_world: [f32; 2]) -> [f32; 2] {
    let mut out = [0.0; 2];
    for (axis, value) in real_world.iter().enumerate() {
        let scaled = value * GRAVITY_UNIT_SCALE;
        out[axis] = if scaled.is_finite() {
            scaled.clamp(-MAX_ENGINE_GRAVITY, MAX_ENGINE_GRAVITY)
        } else {
            DEFAULT_ENGINE_GRAVITY[axis]
        };
    }
    out
}
