//! Numeric sanitization for untrusted generative output.
//!
//! Every number that arrives from the model passes through here before it can
//! reach a scene. Values may be JSON numbers or numeric strings; anything else
//! is repaired to a fallback.

use std::f32::consts::TAU;

use serde_json::Value;

/// Inclusive range and default for one sanitized field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl FieldRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Sanitizes a required field, repairing missing or broken input to the default.
    pub fn apply(&self, value: Option<&Value>) -> f32 {
        match value {
            Some(value) => sanitize_number(value, self.min, self.max, Some(self.default)),
            None => self.default,
        }
    }

    /// Sanitizes an optional field. Unparsable input counts as absent.
    pub fn apply_optional(&self, value: Option<&Value>) -> Option<f32> {
        value
            .and_then(parse_number)
            .map(|v| sanitize_number(&Value::from(v), self.min, self.max, None))
    }
}

pub const POSITION_X: FieldRange = FieldRange::new(-10_000.0, 10_000.0, 400.0);
pub const POSITION_Y: FieldRange = FieldRange::new(-10_000.0, 10_000.0, 300.0);
pub const RADIUS: FieldRange = FieldRange::new(2.0, 1_000.0, 20.0);
pub const WIDTH: FieldRange = FieldRange::new(2.0, 5_000.0, 100.0);
pub const HEIGHT: FieldRange = FieldRange::new(2.0, 5_000.0, 20.0);
pub const ANGLE: FieldRange = FieldRange::new(-TAU, TAU, 0.0);
pub const FRICTION: FieldRange = FieldRange::new(0.0, 1.0, 0.1);
pub const STIFFNESS: FieldRange = FieldRange::new(0.001, 1.0, 0.1);
pub const LENGTH: FieldRange = FieldRange::new(0.0, 10_000.0, 0.0);
pub const TIME_SCALE: FieldRange = FieldRange::new(0.05, 5.0, 1.0);

/// Parses `value` as a finite real number.
///
/// Accepts JSON numbers and strings holding a number (surrounding whitespace
/// allowed). Returns `None` for everything else, including values that
/// overflow `f32`.
pub fn parse_number(value: &Value) -> Option<f32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    #[allow(clippy::cast_possible_truncation)]
    let narrowed = parsed as f32;
    narrowed.is_finite().then_some(narrowed)
}

/// Parses a real number and clamps it into `[min, max]`.
///
/// Unparsable or non-finite input yields `fallback` when given, otherwise
/// `min`. The fallback is clamped as well so the result always lies in the
/// range. Total: never panics, whatever the bounds.
pub fn sanitize_number(value: &Value, min: f32, max: f32, fallback: Option<f32>) -> f32 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let raw = parse_number(value).unwrap_or_else(|| fallback.unwrap_or(lo));
    // max/min instead of f32::clamp, which panics on inverted or NaN bounds.
    raw.max(lo).min(hi)
}

/// Interprets a loosely-typed flag: JSON booleans or `"true"`/`"false"`.
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Interprets an id. Strings are trimmed; numbers are formatted.
pub fn parse_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Maximum length of a color string we pass to renderers.
const MAX_COLOR_LEN: usize = 32;

/// Keeps a color only if it is a short, non-empty string.
pub fn parse_color(value: &Value) -> Option<String> {
    let Value::String(s) = value else {
        return None;
    };
    let trimmed = s.trim();
    (!trimmed.is_empty() && trimmed.len() <= MAX_COLOR_LEN).then(|| trimmed.to_string())
}
