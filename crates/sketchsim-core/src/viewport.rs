//! Viewport controller.
//!
//! Holds the world-space rectangle currently shown on the drawing surface and
//! converts between device (pixel) and world coordinates.
//!
//! - Wheel scroll: `zoom` (positive delta zooms out, negative zooms in)
//! - Drag: `pan` by a device-space delta
//!
//! Conversions always read the current box, so pointer picking stays correct
//! while the view is being zoomed or panned.

use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;

/// Axis-aligned world-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl Bounds {
    pub const fn new(min: [f32; 2], max: [f32; 2]) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f32 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f32 {
        self.max[1] - self.min[1]
    }

    pub fn center(&self) -> [f32; 2] {
        [
            f32::midpoint(self.min[0], self.max[0]),
            f32::midpoint(self.min[1], self.max[1]),
        ]
    }
}

/// Outcome of a zoom request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomResult {
    Applied,
    /// Delta was zero or not finite.
    Ignored,
    /// The new width would leave the configured bounds.
    OutOfBounds,
    /// The canvas aspect ratio was zero, negative, or not finite.
    InvalidAspect,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    bounds: Bounds,
    config: ViewportConfig,
}

fn valid_surface(surface: [f32; 2]) -> bool {
    surface.iter().all(|v| v.is_finite() && *v > 0.0)
}

impl Viewport {
    /// Creates a viewport showing the configured default world rectangle.
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            bounds: config.default_bounds,
            config,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Restores the default world rectangle.
    pub fn reset(&mut self) {
        self.bounds = self.config.default_bounds;
    }

    /// Zooms around the current center.
    ///
    /// Positive `delta` zooms out by `zoom_step`, negative zooms in. The height
    /// is recomputed from `canvas_aspect` (width / height) so the view never
    /// distorts. Requests that would leave `[min_width, max_width]` are
    /// rejected and leave the box unchanged.
    pub fn zoom(&mut self, delta: f32, canvas_aspect: f32) -> ZoomResult {
        if !delta.is_finite() || delta == 0.0 {
            return ZoomResult::Ignored;
        }
        if !canvas_aspect.is_finite() || canvas_aspect <= 0.0 {
            return ZoomResult::InvalidAspect;
        }

        let factor = if delta > 0.0 {
            self.config.zoom_step
        } else {
            1.0 / self.config.zoom_step
        };

        let width = self.bounds.width() * factor;
        if width > self.config.max_width || width < self.config.min_width {
            tracing::debug!("[viewport] zoom to width {width} rejected");
            return ZoomResult::OutOfBounds;
        }
        let height = width / canvas_aspect;

        let [cx, cy] = self.bounds.center();
        self.bounds = Bounds::new(
            [cx - width / 2.0, cy - height / 2.0],
            [cx + width / 2.0, cy + height / 2.0],
        );
        ZoomResult::Applied
    }

    /// World units per device pixel, per axis.
    pub fn scale(&self, surface: [f32; 2]) -> Option<[f32; 2]> {
        valid_surface(surface).then(|| {
            [
                self.bounds.width() / surface[0],
                self.bounds.height() / surface[1],
            ]
        })
    }

    /// Maps a device point (pixels from the surface's top-left) to world space.
    ///
    /// Returns `None` for a degenerate surface or a non-finite point.
    pub fn device_to_world(&self, point: [f32; 2], surface: [f32; 2]) -> Option<[f32; 2]> {
        let [sx, sy] = self.scale(surface)?;
        let world = [
            point[0] * sx + self.bounds.min[0],
            point[1] * sy + self.bounds.min[1],
        ];
        world.iter().all(|v| v.is_finite()).then_some(world)
    }

    /// Maps a world point to device pixels. Inverse of `device_to_world`.
    pub fn world_to_device(&self, point: [f32; 2], surface: [f32; 2]) -> Option<[f32; 2]> {
        let [sx, sy] = self.scale(surface)?;
        let device = [
            (point[0] - self.bounds.min[0]) / sx,
            (point[1] - self.bounds.min[1]) / sy,
        ];
        device.iter().all(|v| v.is_finite()).then_some(device)
    }

    /// Drags the view by a device-space delta.
    ///
    /// Dragging right moves the box left so the content follows the pointer.
    pub fn pan(&mut self, device_delta: [f32; 2], surface: [f32; 2]) -> bool {
        let Some([sx, sy]) = self.scale(surface) else {
            return false;
        };
        let dx = -device_delta[0] * sx;
        let dy = -device_delta[1] * sy;
        if !dx.is_finite() || !dy.is_finite() {
            return false;
        }

        self.bounds.min[0] += dx;
        self.bounds.max[0] += dx;
        self.bounds.min[1] += dy;
        self.bounds.max[1] += dy;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: [f32; 2] = [800.0, 600.0];
    const ASPECT: f32 = 800.0 / 600.0;

    fn viewport() -> Viewport {
        Viewport::new(ViewportConfig::default())
    }

    fn approx(a: [f32; 2], b: [f32; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-3 && (a[1] - b[1]).abs() < 1e-3
    }

    #[test]
    fn test_identity_mapping_at_default() {
        let vp = viewport();
        assert_eq!(vp.device_to_world([0.0, 0.0], SURFACE), Some([0.0, 0.0]));
        assert_eq!(vp.device_to_world([400.0, 300.0], SURFACE), Some([400.0, 300.0]));
    }

    #[test]
    fn test_zoom_out_keeps_center_and_aspect() {
        let mut vp = viewport();
        let center = vp.bounds().center();

        assert_eq!(vp.zoom(1.0, ASPECT), ZoomResult::Applied);
        let b = vp.bounds();
        assert!(approx(b.center(), center));
        assert!((b.width() / b.height() - ASPECT).abs() < 1e-4);
        assert!(b.width() > 800.0);
    }

    #[test]
    fn test_device_to_world_follows_zoom() {
        let mut vp = viewport();
        vp.zoom(-1.0, ASPECT);

        // Surface center still maps to the world center after zooming in.
        let world = vp.device_to_world([400.0, 300.0], SURFACE).unwrap();
        assert!(approx(world, [400.0, 300.0]));

        // Top-left maps to the new min corner.
        let corner = vp.device_to_world([0.0, 0.0], SURFACE).unwrap();
        assert!(approx(corner, vp.bounds().min));
    }

    #[test]
    fn test_zoom_never_escapes_bounds() {
        let config = ViewportConfig::default();
        let mut vp = viewport();

        for _ in 0..200 {
            vp.zoom(1.0, ASPECT);
            assert!(vp.bounds().width() <= config.max_width);
        }
        assert_eq!(vp.zoom(1.0, ASPECT), ZoomResult::OutOfBounds);

        for _ in 0..400 {
            vp.zoom(-1.0, ASPECT);
            assert!(vp.bounds().width() >= config.min_width);
        }
        assert_eq!(vp.zoom(-1.0, ASPECT), ZoomResult::OutOfBounds);
    }

    #[test]
    fn test_zoom_rejects_bad_input() {
        let mut vp = viewport();
        let before = vp.bounds();
        assert_eq!(vp.zoom(0.0, ASPECT), ZoomResult::Ignored);
        assert_eq!(vp.zoom(f32::NAN, ASPECT), ZoomResult::Ignored);
        assert_eq!(vp.zoom(1.0, 0.0), ZoomResult::InvalidAspect);
        assert_eq!(vp.zoom(1.0, f32::INFINITY), ZoomResult::InvalidAspect);
        assert_eq!(vp.bounds(), before);
    }

    #[test]
    fn test_pan_moves_against_drag() {
        let mut vp = viewport();
        assert!(vp.pan([100.0, -50.0], SURFACE));
        assert_eq!(vp.bounds().min, [-100.0, 50.0]);

        vp.reset();
        assert_eq!(vp.bounds(), ViewportConfig::default().default_bounds);
    }

    #[test]
    fn test_world_to_device_inverts() {
        let mut vp = viewport();
        vp.zoom(1.0, ASPECT);
        vp.pan([37.0, 12.0], SURFACE);

        let device = [123.0, 456.0];
        let world = vp.device_to_world(device, SURFACE).unwrap();
        let back = vp.world_to_device(world, SURFACE).unwrap();
        assert!(approx(back, device));
    }

    #[test]
    fn test_degenerate_surface() {
        let vp = viewport();
        assert_eq!(vp.device_to_world([1.0, 1.0], [0.0, 600.0]), None);
        assert_eq!(vp.scale([f32::NAN, 1.0]), None);
    }
}
