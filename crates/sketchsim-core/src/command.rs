//! Generative command payloads.
//!
//! `Raw*` types mirror the model's JSON loosely: every numeric field is kept as
//! a `serde_json::Value` so a wrong type never fails the whole payload. The
//! `sanitize` methods turn them into the closed, fully-checked types the merger
//! accepts. Nothing downstream of this module ever sees a `Raw*` value.

use serde::Deserialize;
use serde_json::Value;

use crate::gravity::normalize_gravity;
use crate::sanitize::{
    self, ANGLE, FRICTION, HEIGHT, LENGTH, POSITION_X, POSITION_Y, RADIUS, STIFFNESS, TIME_SCALE,
    WIDTH, parse_color, parse_flag, parse_id, parse_number,
};
use crate::scene::{BodyDescriptor, BodyShape, ConstraintDescriptor, ConstraintTarget, ShapeKind};

/// Id given to bodies whose model id is missing or blank.
pub const FALLBACK_BODY_ID: &str = "body";

/// A 2D vector as the model writes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVector {
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
}

/// A body as the model writes it, for additions and update fragments alike.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBody {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<Value>,
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
    #[serde(default)]
    pub radius: Option<Value>,
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub angle: Option<Value>,
    #[serde(default)]
    pub is_static: Option<Value>,
    #[serde(default)]
    pub friction: Option<Value>,
    #[serde(default)]
    pub color: Option<Value>,
}

/// A constraint as the model writes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConstraint {
    #[serde(default, alias = "bodyA")]
    pub body_a_id: Option<Value>,
    #[serde(default, alias = "bodyB")]
    pub body_b_id: Option<Value>,
    #[serde(default)]
    pub point_b: Option<RawVector>,
    #[serde(default)]
    pub stiffness: Option<Value>,
    #[serde(default)]
    pub length: Option<Value>,
}

/// Partial physics update as the model writes it. Gravity is in m/s².
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPhysics {
    #[serde(default)]
    pub gravity: Option<RawVector>,
    #[serde(default)]
    pub time_scale: Option<Value>,
    #[serde(default)]
    pub collision_effects_enabled: Option<Value>,
}

/// Voice-command response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommand {
    #[serde(default)]
    pub physics: Option<RawPhysics>,
    #[serde(default)]
    pub new_bodies: Option<Vec<RawBody>>,
    #[serde(default)]
    pub updated_bodies: Option<Vec<RawBody>>,
    #[serde(default)]
    pub new_constraints: Option<Vec<RawConstraint>>,
    #[serde(default)]
    pub remove_body_ids: Option<Vec<Value>>,
    pub summary: String,
}

/// Sketch-analysis response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScene {
    pub bodies: Vec<RawBody>,
    #[serde(default)]
    pub constraints: Option<Vec<RawConstraint>>,
}

/// Sanitized partial physics update. Gravity is already in engine units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhysicsUpdate {
    pub gravity: Option<[f32; 2]>,
    pub time_scale: Option<f32>,
    pub collision_effects_enabled: Option<bool>,
}

/// Sanitized update fragment. `None` fields keep the body's prior value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyPatch {
    pub id: String,
    pub kind: Option<ShapeKind>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub radius: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub angle: Option<f32>,
    pub is_static: Option<bool>,
    pub friction: Option<f32>,
    pub color: Option<String>,
}

impl BodyPatch {
    /// Produces the patched body. Absent fields keep their prior values.
    pub fn apply_to(&self, body: &BodyDescriptor) -> BodyDescriptor {
        let mut next = body.clone();

        let base_shape = match (self.kind, body.shape.kind()) {
            (Some(ShapeKind::Circle), ShapeKind::Rectangle) => BodyShape::default_circle(),
            (Some(ShapeKind::Rectangle), ShapeKind::Circle) => BodyShape::default_rectangle(),
            _ => body.shape,
        };
        next.shape = match base_shape {
            BodyShape::Circle { radius } => BodyShape::Circle {
                radius: self.radius.unwrap_or(radius),
            },
            BodyShape::Rectangle { width, height } => BodyShape::Rectangle {
                width: self.width.unwrap_or(width),
                height: self.height.unwrap_or(height),
            },
        };

        if let Some(x) = self.x {
            next.position[0] = x;
        }
        if let Some(y) = self.y {
            next.position[1] = y;
        }
        if let Some(angle) = self.angle {
            next.angle = angle;
        }
        if let Some(is_static) = self.is_static {
            next.is_static = is_static;
        }
        if let Some(friction) = self.friction {
            next.friction = friction;
        }
        if let Some(color) = &self.color {
            next.color = Some(color.clone());
        }
        next
    }
}

/// A validated, sanitized command ready for remapping and merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneCommand {
    pub physics: Option<PhysicsUpdate>,
    pub new_bodies: Vec<BodyDescriptor>,
    pub updated_bodies: Vec<BodyPatch>,
    pub new_constraints: Vec<ConstraintDescriptor>,
    pub remove_body_ids: Vec<String>,
    pub summary: String,
}

impl SceneCommand {
    /// Returns true if the command carries no scene delta.
    pub fn is_scene_noop(&self) -> bool {
        self.new_bodies.is_empty()
            && self.updated_bodies.is_empty()
            && self.new_constraints.is_empty()
            && self.remove_body_ids.is_empty()
    }
}

fn parse_kind(value: Option<&Value>) -> Option<ShapeKind> {
    let Value::String(s) = value? else {
        return None;
    };
    match s.trim().to_ascii_lowercase().as_str() {
        "circle" | "ball" => Some(ShapeKind::Circle),
        "rectangle" | "rect" | "box" => Some(ShapeKind::Rectangle),
        _ => None,
    }
}

impl RawBody {
    /// Sanitizes a new body. Missing fields take their defaults.
    pub fn sanitize(&self) -> BodyDescriptor {
        let kind = parse_kind(self.kind.as_ref()).unwrap_or_else(|| {
            if self.radius.is_some() && self.width.is_none() && self.height.is_none() {
                ShapeKind::Circle
            } else {
                ShapeKind::Rectangle
            }
        });

        let shape = match kind {
            ShapeKind::Circle => BodyShape::Circle {
                radius: RADIUS.apply(self.radius.as_ref()),
            },
            ShapeKind::Rectangle => BodyShape::Rectangle {
                width: WIDTH.apply(self.width.as_ref()),
                height: HEIGHT.apply(self.height.as_ref()),
            },
        };

        BodyDescriptor {
            id: self
                .id
                .as_ref()
                .and_then(parse_id)
                .unwrap_or_else(|| FALLBACK_BODY_ID.to_string()),
            shape,
            position: [
                POSITION_X.apply(self.x.as_ref()),
                POSITION_Y.apply(self.y.as_ref()),
            ],
            angle: ANGLE.apply(self.angle.as_ref()),
            is_static: self.is_static.as_ref().and_then(parse_flag).unwrap_or(false),
            friction: FRICTION.apply(self.friction.as_ref()),
            color: self.color.as_ref().and_then(parse_color),
        }
    }

    /// Sanitizes an update fragment. Returns `None` if it names no body.
    pub fn sanitize_patch(&self) -> Option<BodyPatch> {
        let id = self.id.as_ref().and_then(parse_id)?;
        Some(BodyPatch {
            id,
            kind: parse_kind(self.kind.as_ref()),
            x: POSITION_X.apply_optional(self.x.as_ref()),
            y: POSITION_Y.apply_optional(self.y.as_ref()),
            radius: RADIUS.apply_optional(self.radius.as_ref()),
            width: WIDTH.apply_optional(self.width.as_ref()),
            height: HEIGHT.apply_optional(self.height.as_ref()),
            angle: ANGLE.apply_optional(self.angle.as_ref()),
            is_static: self.is_static.as_ref().and_then(parse_flag),
            friction: FRICTION.apply_optional(self.friction.as_ref()),
            color: self.color.as_ref().and_then(parse_color),
        })
    }
}

impl RawConstraint {
    /// Sanitizes a constraint. Returns `None` when body A is missing or when
    /// neither a second body nor an anchor point is given.
    pub fn sanitize(&self) -> Option<ConstraintDescriptor> {
        let body_a = self.body_a_id.as_ref().and_then(parse_id)?;

        let target = if let Some(body_b) = self.body_b_id.as_ref().and_then(parse_id) {
            ConstraintTarget::Body(body_b)
        } else {
            let point = self.point_b.as_ref()?;
            let x = point.x.as_ref().and_then(parse_number)?;
            let y = point.y.as_ref().and_then(parse_number)?;
            ConstraintTarget::Point([
                sanitize::sanitize_number(&Value::from(x), POSITION_X.min, POSITION_X.max, None),
                sanitize::sanitize_number(&Value::from(y), POSITION_Y.min, POSITION_Y.max, None),
            ])
        };

        Some(ConstraintDescriptor {
            body_a,
            target,
            stiffness: STIFFNESS.apply(self.stiffness.as_ref()),
            length: LENGTH.apply_optional(self.length.as_ref()),
        })
    }
}

impl RawPhysics {
    /// Sanitizes a physics update, normalizing gravity to engine units.
    pub fn sanitize(&self) -> PhysicsUpdate {
        let gravity = self.gravity.as_ref().map(|g| {
            let axis = |v: Option<&Value>| v.and_then(parse_number).unwrap_or(f32::NAN);
            // A missing horizontal axis means no sideways pull.
            let x = g.x.as_ref().map_or(0.0, |v| axis(Some(v)));
            normalize_gravity([x, axis(g.y.as_ref())])
        });

        PhysicsUpdate {
            gravity,
            time_scale: TIME_SCALE.apply_optional(self.time_scale.as_ref()),
            collision_effects_enabled: self.collision_effects_enabled.as_ref().and_then(parse_flag),
        }
    }
}

fn sanitize_constraints(raw: &[RawConstraint]) -> Vec<ConstraintDescriptor> {
    raw.iter()
        .filter_map(|c| {
            let sanitized = c.sanitize();
            if sanitized.is_none() {
                tracing::warn!("[sanitize] dropping constraint without usable anchors: {c:?}");
            }
            sanitized
        })
        .collect()
}

impl RawCommand {
    pub fn sanitize(&self) -> SceneCommand {
        let updated_bodies = self
            .updated_bodies
            .iter()
            .flatten()
            .filter_map(|raw| {
                let patch = raw.sanitize_patch();
                if patch.is_none() {
                    tracing::warn!("[sanitize] dropping update fragment without id");
                }
                patch
            })
            .collect();

        SceneCommand {
            physics: self.physics.as_ref().map(RawPhysics::sanitize),
            new_bodies: self
                .new_bodies
                .iter()
                .flatten()
                .map(RawBody::sanitize)
                .collect(),
            updated_bodies,
            new_constraints: sanitize_constraints(
                self.new_constraints.as_deref().unwrap_or_default(),
            ),
            remove_body_ids: self
                .remove_body_ids
                .iter()
                .flatten()
                .filter_map(parse_id)
                .collect(),
            summary: self.summary.trim().to_string(),
        }
    }
}

impl RawScene {
    /// Sanitizes an analysis result into bodies and constraints.
    pub fn sanitize(&self) -> (Vec<BodyDescriptor>, Vec<ConstraintDescriptor>) {
        let bodies = self.bodies.iter().map(RawBody::sanitize).collect();
        let constraints = sanitize_constraints(self.constraints.as_deref().unwrap_or_default());
        (bodies, constraints)
    }
}
