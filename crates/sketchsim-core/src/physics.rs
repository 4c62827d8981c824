//! Physics world adapter over `Rapier2D`.
//!
//! Builds a rapier world from a scene snapshot, steps it at a fixed rate and
//! reports where bodies start touching. Scene coordinates are pixels with +y
//! pointing down, so engine gravity `(0, 1)` pulls bodies toward the bottom.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use rapier2d::prelude::*;

use crate::error::ErrorKind;
use crate::scene::{
    BodyDescriptor, BodyShape, ConstraintDescriptor, ConstraintTarget, PhysicsParameters, Scene,
};

/// Fixed timestep for physics simulation (60Hz).
pub const PHYSICS_DT: f32 = 1.0 / 60.0;

/// Pixels per second squared for one engine gravity unit (100 px per metre).
pub const PIXELS_PER_GRAVITY_UNIT: f32 = 981.0;

/// Maps constraint stiffness in `(0, 1]` to spring stiffness.
const SPRING_STIFFNESS_SCALE: f32 = 100.0;
const SPRING_DAMPING: f32 = 2.0;

/// Default gravity vector (downward, in pixels/s²).
pub fn default_gravity() -> Vector {
    Vector::new(0.0, PIXELS_PER_GRAVITY_UNIT)
}

/// Two colliders started touching at `point` (world pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub point: [f32; 2],
}

/// Live pose and velocity of one scene body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: [f32; 2],
    pub angle: f32,
    pub linvel: [f32; 2],
    pub angvel: f32,
}

impl BodyState {
    fn of(body: &RigidBody) -> Self {
        let pos = body.translation();
        let vel = body.linvel();
        Self {
            position: [pos.x, pos.y],
            angle: body.rotation().angle(),
            linvel: [vel.x, vel.y],
            angvel: body.angvel(),
        }
    }
}

/// Collects contact points while the pipeline holds `&mut` on every set.
#[derive(Default)]
struct ContactCollector {
    points: Mutex<Vec<[f32; 2]>>,
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        let CollisionEvent::Started(h1, h2, _) = event else {
            return;
        };
        let point = contact_pair
            .and_then(first_contact_point)
            .or_else(|| collider_midpoint(colliders, h1, h2));
        if let Some(point) = point {
            self.points.lock().push(point);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

fn first_contact_point(pair: &ContactPair) -> Option<[f32; 2]> {
    pair.manifolds
        .iter()
        .flat_map(|m| m.data.solver_contacts.iter())
        .map(|c| [c.point.x, c.point.y])
        .next()
}

fn collider_midpoint(
    colliders: &ColliderSet,
    h1: ColliderHandle,
    h2: ColliderHandle,
) -> Option<[f32; 2]> {
    let a = colliders.get(h1)?.translation();
    let b = colliders.get(h2)?.translation();
    Some([f32::midpoint(a.x, b.x), f32::midpoint(a.y, b.y)])
}

/// Live state for a body whose descriptor went from `previous` to `next`.
///
/// An edited position restarts the body at rest at the new position; an
/// edited angle only replaces the orientation.
#[allow(clippy::float_cmp)]
fn carry_over(previous: &BodyDescriptor, next: &BodyDescriptor, live: BodyState) -> BodyState {
    let mut state = live;
    if previous.position != next.position {
        state.position = next.position;
        state.linvel = [0.0, 0.0];
        state.angvel = 0.0;
    }
    if previous.angle != next.angle {
        state.angle = next.angle;
    }
    state
}

/// Rapier world mirroring one scene snapshot.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub gravity: Vector,
    pub frame: u64,
    params: PhysicsParameters,
    handles: HashMap<String, RigidBodyHandle>,
    descriptors: HashMap<String, BodyDescriptor>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("frame", &self.frame)
            .field("scene_bodies", &self.handles.len())
            .field("joint_count", &self.impulse_joint_set.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Creates an empty world with default parameters.
    pub fn new() -> Self {
        let integration_parameters = IntegrationParameters {
            dt: PHYSICS_DT,
            ..Default::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: default_gravity(),
            frame: 0,
            params: PhysicsParameters::default(),
            handles: HashMap::new(),
            descriptors: HashMap::new(),
        }
    }

    /// Builds a fresh world from a snapshot.
    pub fn from_snapshot(scene: &Scene, params: &PhysicsParameters) -> Self {
        let mut world = Self::new();
        world.set_parameters(params);
        world.populate(scene, |_| None);
        world
    }

    /// Builds the world for a newer snapshot.
    ///
    /// Bodies that already existed keep their live pose and velocity unless
    /// the update moved or rotated them. Colliders always follow the new
    /// descriptor, so friction, shape and static changes take effect.
    pub fn rebuild(&self, scene: &Scene, params: &PhysicsParameters) -> Self {
        let mut world = Self::new();
        world.set_parameters(params);
        world.frame = self.frame;
        world.populate(scene, |desc| {
            let previous = self.descriptors.get(&desc.id)?;
            let live = self.body_state(&desc.id)?;
            Some(carry_over(previous, desc, live))
        });
        tracing::debug!(
            "[physics] rebuilt world: {} bodies, {} joints",
            world.handles.len(),
            world.impulse_joint_set.len()
        );
        world
    }

    fn populate(
        &mut self,
        scene: &Scene,
        carried: impl Fn(&BodyDescriptor) -> Option<BodyState>,
    ) {
        for desc in scene.bodies() {
            let state = carried(desc);
            self.insert_body(desc, state);
        }
        for constraint in scene.constraints() {
            self.insert_constraint(constraint, scene);
        }
    }

    fn insert_body(&mut self, desc: &BodyDescriptor, state: Option<BodyState>) {
        if !desc.is_finite() {
            tracing::warn!(
                kind = ErrorKind::NumericInstability.as_str(),
                "[physics] body {} skipped",
                desc.id
            );
            return;
        }

        let state = state.unwrap_or(BodyState {
            position: desc.position,
            angle: desc.angle,
            linvel: [0.0, 0.0],
            angvel: 0.0,
        });
        let builder = if desc.is_static {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
                .linvel(Vector::new(state.linvel[0], state.linvel[1]))
                .angvel(state.angvel)
                .ccd_enabled(true)
        };
        let body = builder
            .translation(Vector::new(state.position[0], state.position[1]))
            .rotation(state.angle)
            .build();
        let handle = self.add_rigid_body(body);

        let collider = match desc.shape {
            BodyShape::Circle { radius } => ColliderBuilder::ball(radius),
            BodyShape::Rectangle { width, height } => {
                ColliderBuilder::cuboid(width / 2.0, height / 2.0)
            }
        }
        .friction(desc.friction)
        .density(1.0)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();
        self.add_collider(collider, handle);

        self.handles.insert(desc.id.clone(), handle);
        self.descriptors.insert(desc.id.clone(), desc.clone());
    }

    fn insert_constraint(&mut self, constraint: &ConstraintDescriptor, scene: &Scene) {
        let (Some(&handle_a), Some(desc_a)) = (
            self.handles.get(&constraint.body_a),
            scene.body(&constraint.body_a),
        ) else {
            tracing::debug!(
                kind = ErrorKind::DanglingReference.as_str(),
                "[physics] constraint on {} skipped",
                constraint.body_a
            );
            return;
        };

        let (handle_b, target_pos) = match &constraint.target {
            ConstraintTarget::Body(id) => {
                let (Some(&handle), Some(desc)) = (self.handles.get(id), scene.body(id)) else {
                    tracing::debug!(
                        kind = ErrorKind::DanglingReference.as_str(),
                        "[physics] constraint {} -> {id} skipped",
                        constraint.body_a
                    );
                    return;
                };
                (handle, desc.position)
            }
            ConstraintTarget::Point(point) => {
                // World anchors are colliderless fixed bodies.
                let anchor = RigidBodyBuilder::fixed()
                    .translation(Vector::new(point[0], point[1]))
                    .build();
                (self.add_rigid_body(anchor), *point)
            }
        };

        let rest_length = constraint.length.unwrap_or_else(|| {
            let dx = target_pos[0] - desc_a.position[0];
            let dy = target_pos[1] - desc_a.position[1];
            dx.hypot(dy)
        });
        let joint = SpringJointBuilder::new(
            rest_length,
            constraint.stiffness * SPRING_STIFFNESS_SCALE,
            SPRING_DAMPING,
        )
        .spring_model(MotorModel::AccelerationBased)
        .build();
        self.impulse_joint_set.insert(handle_a, handle_b, joint, true);
    }

    /// Applies gravity (engine units) and time scale.
    pub fn set_parameters(&mut self, params: &PhysicsParameters) {
        self.set_gravity(params.gravity);
        self.set_time_scale(params.time_scale);
        self.params.collision_effects_enabled = params.collision_effects_enabled;
    }

    /// Sets gravity in engine units. Non-finite input is ignored.
    pub fn set_gravity(&mut self, engine: [f32; 2]) {
        if !engine.iter().all(|v| v.is_finite()) {
            tracing::warn!(
                kind = ErrorKind::NumericInstability.as_str(),
                "[physics] gravity ignored"
            );
            return;
        }
        self.params.gravity = engine;
        self.gravity = Vector::new(
            engine[0] * PIXELS_PER_GRAVITY_UNIT,
            engine[1] * PIXELS_PER_GRAVITY_UNIT,
        );
    }

    /// Scales the step length. Non-positive or non-finite input is ignored.
    pub fn set_time_scale(&mut self, time_scale: f32) {
        if !time_scale.is_finite() || time_scale <= 0.0 {
            tracing::warn!(
                kind = ErrorKind::NumericInstability.as_str(),
                "[physics] time scale ignored"
            );
            return;
        }
        self.params.time_scale = time_scale;
        self.integration_parameters.dt = PHYSICS_DT * time_scale;
    }

    pub fn parameters(&self) -> &PhysicsParameters {
        &self.params
    }

    /// Advances one fixed timestep and returns the contacts that started.
    pub fn step(&mut self) -> Vec<ContactEvent> {
        let collector = ContactCollector::default();
        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &collector,
        );
        self.frame += 1;

        collector
            .points
            .into_inner()
            .into_iter()
            .filter(|p| {
                let finite = p.iter().all(|v| v.is_finite());
                if !finite {
                    tracing::warn!(
                        kind = ErrorKind::NumericInstability.as_str(),
                        "[physics] non-finite contact dropped"
                    );
                }
                finite
            })
            .map(|point| ContactEvent { point })
            .collect()
    }

    /// Adds a rigid body to the world and returns its handle.
    fn add_rigid_body(&mut self, rigid_body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(rigid_body)
    }

    /// Adds a collider attached to a rigid body.
    fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    pub fn body_state(&self, id: &str) -> Option<BodyState> {
        let handle = self.handles.get(id)?;
        self.rigid_body_set.get(*handle).map(BodyState::of)
    }

    /// Live state of every scene body, keyed by id.
    pub fn body_states(&self) -> impl Iterator<Item = (&str, BodyState)> + '_ {
        self.handles.iter().filter_map(|(id, handle)| {
            self.rigid_body_set
                .get(*handle)
                .map(|body| (id.as_str(), BodyState::of(body)))
        })
    }

    /// Number of scene bodies (world anchors excluded).
    pub fn body_count(&self) -> usize {
        self.handles.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joint_set.len()
    }

    /// Returns the current simulation frame number.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }
}
