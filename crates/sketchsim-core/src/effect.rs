//! Contact effect timer.
//!
//! A single-slot state machine driving the flash drawn where two bodies touch.
//! A newer contact always replaces the current one.

/// Frames an effect stays visible unless configured otherwise.
pub const DEFAULT_EFFECT_FRAMES: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactEffect {
    Idle,
    Active { point: [f32; 2], age: u32 },
}

impl ContactEffect {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn point(&self) -> Option<[f32; 2]> {
        match self {
            Self::Active { point, .. } => Some(*point),
            Self::Idle => None,
        }
    }
}

/// Owns the effect slot and its frame threshold.
#[derive(Debug, Clone)]
pub struct EffectTimer {
    state: ContactEffect,
    threshold: u32,
}

impl Default for EffectTimer {
    fn default() -> Self {
        Self::new(DEFAULT_EFFECT_FRAMES)
    }
}

impl EffectTimer {
    /// A zero threshold is raised to one frame.
    pub fn new(threshold: u32) -> Self {
        Self {
            state: ContactEffect::Idle,
            threshold: threshold.max(1),
        }
    }

    pub fn state(&self) -> ContactEffect {
        self.state
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Starts (or restarts) the effect at `point`.
    ///
    /// Ignored when effects are disabled or the point is not finite.
    pub fn on_contact(&mut self, point: [f32; 2], enabled: bool) {
        if !enabled {
            return;
        }
        if !point.iter().all(|v| v.is_finite()) {
            tracing::debug!(
                kind = crate::error::ErrorKind::NumericInstability.as_str(),
                "[effect] non-finite contact point skipped"
            );
            return;
        }
        self.state = ContactEffect::Active { point, age: 0 };
    }

    /// Advances one render frame.
    pub fn tick(&mut self) {
        if let ContactEffect::Active { point, age } = self.state {
            let age = age + 1;
            self.state = if age >= self.threshold {
                ContactEffect::Idle
            } else {
                ContactEffect::Active { point, age }
            };
        }
    }

    /// Drops a live effect, e.g. when effects get switched off.
    pub fn clear(&mut self) {
        self.state = ContactEffect::Idle;
    }

    /// Fraction of the effect's lifetime already elapsed, in `[0, 1]`.
    pub fn progress(&self) -> Option<f32> {
        match self.state {
            #[allow(clippy::cast_precision_loss)]
            ContactEffect::Active { age, .. } => {
                Some((age as f32 / self.threshold as f32).min(1.0))
            }
            ContactEffect::Idle => None,
        }
    }
}
