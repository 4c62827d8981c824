//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::viewport::Bounds;

/// Viewport limits and default rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportConfig {
    /// World rectangle shown on start and after reset
    pub default_bounds: Bounds,

    /// Smallest visible world width (most zoomed in)
    pub min_width: f32,

    /// Largest visible world width (most zoomed out)
    pub max_width: f32,

    /// Width multiplier per zoom-out step
    pub zoom_step: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            default_bounds: Bounds::new([0.0, 0.0], [800.0, 600.0]),
            min_width: 200.0,
            max_width: 4000.0,
            zoom_step: 1.1,
        }
    }
}

/// Tunables for one sketch session.
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Sketch analysis deadline, in milliseconds
    pub analysis_timeout_ms: u64,

    /// Voice command deadline, in milliseconds
    pub voice_timeout_ms: u64,

    /// Smallest encoded image worth sending
    pub min_image_bytes: usize,

    /// Smallest encoded audio clip worth sending
    pub min_audio_bytes: usize,

    /// Shortest recording accepted, in milliseconds
    pub min_audio_ms: u64,

    /// Render frames a contact effect stays visible
    pub effect_frames: u32,

    pub viewport: ViewportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            analysis_timeout_ms: 30_000,
            voice_timeout_ms: 30_000,
            min_image_bytes: 1024,
            min_audio_bytes: 1000,
            min_audio_ms: 500,
            effect_frames: 20,
            viewport: ViewportConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }

    pub fn voice_timeout(&self) -> Duration {
        Duration::from_millis(self.voice_timeout_ms)
    }

    pub fn min_audio_duration(&self) -> Duration {
        Duration::from_millis(self.min_audio_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            SessionConfig::from_json(r#"{"voiceTimeoutMs": 500, "viewport": {"maxWidth": 2000}}"#)
                .expect("valid config");

        assert_eq!(config.voice_timeout(), Duration::from_millis(500));
        assert_eq!(config.analysis_timeout(), Duration::from_secs(30));
        assert_eq!(config.viewport.max_width, 2000.0);
        assert_eq!(config.viewport.zoom_step, 1.1);
        assert_eq!(config.effect_frames, 20);
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = SessionConfig::from_json("{}").expect("valid config");
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        assert!(SessionConfig::from_json(r#"{"effectFrames": "many"}"#).is_err());
    }
}
