//! Scene data model: bodies, constraints, and physics parameters.
//!
//! A `Scene` is an immutable value once built. The only ways to obtain a new
//! one are `Scene::from_parts` (which enforces the invariants) and the merger.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::sanitize;

/// Shape of a body. Exactly one kind-appropriate size is carried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodyShape {
    Circle { radius: f32 },
    Rectangle { width: f32, height: f32 },
}

impl BodyShape {
    /// Default circle used when a fragment switches a body to a circle.
    pub fn default_circle() -> Self {
        Self::Circle {
            radius: sanitize::RADIUS.default,
        }
    }

    /// Default rectangle used when a fragment switches a body to a rectangle.
    pub fn default_rectangle() -> Self {
        Self::Rectangle {
            width: sanitize::WIDTH.default,
            height: sanitize::HEIGHT.default,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Circle { .. } => ShapeKind::Circle,
            Self::Rectangle { .. } => ShapeKind::Rectangle,
        }
    }
}

/// Shape discriminant, used by update fragments that change a body's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Circle,
    Rectangle,
}

/// Declarative description of one rigid shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyDescriptor {
    pub id: String,
    pub shape: BodyShape,
    /// Center position in world coordinates.
    pub position: [f32; 2],
    /// Rotation in radians.
    pub angle: f32,
    pub is_static: bool,
    pub friction: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl BodyDescriptor {
    /// Creates a dynamic body with default angle, friction, and no color.
    pub fn new(id: impl Into<String>, shape: BodyShape, position: [f32; 2]) -> Self {
        Self {
            id: id.into(),
            shape,
            position,
            angle: 0.0,
            is_static: false,
            friction: sanitize::FRICTION.default,
            color: None,
        }
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Returns true if every geometric value is finite.
    pub fn is_finite(&self) -> bool {
        let shape_ok = match self.shape {
            BodyShape::Circle { radius } => radius.is_finite(),
            BodyShape::Rectangle { width, height } => width.is_finite() && height.is_finite(),
        };
        shape_ok
            && self.position.iter().all(|v| v.is_finite())
            && self.angle.is_finite()
            && self.friction.is_finite()
    }
}

/// Second end of a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintTarget {
    /// Another body in the same scene.
    Body(String),
    /// A fixed world-space anchor.
    Point([f32; 2]),
}

/// Declarative description of a spring between two anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDescriptor {
    pub body_a: String,
    pub target: ConstraintTarget,
    /// Spring stiffness in (0, 1].
    pub stiffness: f32,
    /// Rest length. `None` lets the adapter use the distance at creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f32>,
}

impl ConstraintDescriptor {
    pub fn between(body_a: impl Into<String>, body_b: impl Into<String>) -> Self {
        Self {
            body_a: body_a.into(),
            target: ConstraintTarget::Body(body_b.into()),
            stiffness: sanitize::STIFFNESS.default,
            length: None,
        }
    }

    pub fn anchored(body_a: impl Into<String>, point: [f32; 2]) -> Self {
        Self {
            body_a: body_a.into(),
            target: ConstraintTarget::Point(point),
            stiffness: sanitize::STIFFNESS.default,
            length: None,
        }
    }

    /// Id of the second body, if the constraint joins two bodies.
    pub fn body_b(&self) -> Option<&str> {
        match &self.target {
            ConstraintTarget::Body(id) => Some(id),
            ConstraintTarget::Point(_) => None,
        }
    }

    /// Returns true if the constraint references `id` at either end.
    pub fn references(&self, id: &str) -> bool {
        self.body_a == id || self.body_b() == Some(id)
    }
}

/// Global simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsParameters {
    /// Gravity in engine units (Earth = 1 on the vertical axis).
    pub gravity: [f32; 2],
    pub time_scale: f32,
    pub collision_effects_enabled: bool,
}

impl Default for PhysicsParameters {
    fn default() -> Self {
        Self {
            gravity: [0.0, 1.0],
            time_scale: 1.0,
            collision_effects_enabled: true,
        }
    }
}

/// The full set of bodies and constraints of one simulated world.
///
/// Invariants: body ids are unique and every constraint reference resolves.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    bodies: Vec<BodyDescriptor>,
    constraints: Vec<ConstraintDescriptor>,
}

impl Scene {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a scene, enforcing the invariants.
    ///
    /// Later bodies with an already-seen id, bodies with non-finite geometry,
    /// and constraints with unresolved references are dropped.
    pub fn from_parts(
        bodies: Vec<BodyDescriptor>,
        constraints: Vec<ConstraintDescriptor>,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(bodies.len());
        for body in bodies {
            if !body.is_finite() {
                tracing::warn!(
                    kind = ErrorKind::NumericInstability.as_str(),
                    "[scene] dropping non-finite body {}",
                    body.id
                );
                continue;
            }
            if !seen.insert(body.id.clone()) {
                tracing::warn!("[scene] dropping duplicate body id {}", body.id);
                continue;
            }
            kept.push(body);
        }

        let constraints = constraints
            .into_iter()
            .filter(|c| {
                let resolved = constraint_resolves(c, &seen);
                if !resolved {
                    tracing::warn!(
                        kind = ErrorKind::DanglingReference.as_str(),
                        "[scene] dropping constraint {} -> {:?}",
                        c.body_a,
                        c.target
                    );
                }
                resolved
            })
            .collect();

        Self {
            bodies: kept,
            constraints,
        }
    }

    pub fn bodies(&self) -> &[BodyDescriptor] {
        &self.bodies
    }

    pub fn constraints(&self) -> &[ConstraintDescriptor] {
        &self.constraints
    }

    pub fn body(&self, id: &str) -> Option<&BodyDescriptor> {
        self.bodies.iter().find(|b| b.id == id)
    }

    pub fn contains_body(&self, id: &str) -> bool {
        self.body(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty() && self.constraints.is_empty()
    }

    pub fn body_ids(&self) -> HashSet<&str> {
        self.bodies.iter().map(|b| b.id.as_str()).collect()
    }

    /// Decomposes the scene for the merger.
    pub(crate) fn into_parts(self) -> (Vec<BodyDescriptor>, Vec<ConstraintDescriptor>) {
        (self.bodies, self.constraints)
    }

    /// Checks the data-model invariants. Used by tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        let ids: HashSet<String> = self.bodies.iter().map(|b| b.id.clone()).collect();
        ids.len() == self.bodies.len()
            && self.constraints.iter().all(|c| constraint_resolves(c, &ids))
    }
}

impl<'de> Deserialize<'de> for Scene {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            #[serde(default)]
            bodies: Vec<BodyDescriptor>,
            #[serde(default)]
            constraints: Vec<ConstraintDescriptor>,
        }

        let parts = Parts::deserialize(deserializer)?;
        Ok(Scene::from_parts(parts.bodies, parts.constraints))
    }
}

fn constraint_resolves(constraint: &ConstraintDescriptor, ids: &HashSet<String>) -> bool {
    let a_ok = ids.contains(&constraint.body_a);
    let b_ok = match &constraint.target {
        ConstraintTarget::Body(b) => ids.contains(b) && *b != constraint.body_a,
        ConstraintTarget::Point(p) => p.iter().all(|v| v.is_finite()),
    };
    a_ok && b_ok
}
