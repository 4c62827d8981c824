//! Sketch Simulation Core Library
//!
//! Keeps a physics scene in sync with untrusted generative-model output.
//!
//! A sketch is analyzed into an initial scene; spoken commands then arrive as
//! JSON deltas that are validated, sanitized, given fresh ids, and merged into
//! a new immutable snapshot. A `rapier2d` world follows the committed snapshot
//! and reports contacts for the on-screen effect.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod config;
pub mod effect;
pub mod error;
pub mod gravity;
pub mod identity;
pub mod merge;
pub mod physics;
pub mod sanitize;
pub mod scene;
pub mod session;
pub mod simulation;
pub mod store;
pub mod validate;
pub mod viewport;

pub use command::{BodyPatch, PhysicsUpdate, RawCommand, RawScene, SceneCommand};
pub use config::{SessionConfig, ViewportConfig};
pub use effect::{ContactEffect, EffectTimer};
pub use error::{CaptureKind, ErrorKind, ServiceError, SessionError};
pub use gravity::normalize_gravity;
pub use identity::{ClockSuffix, FixedSuffix, SuffixSource, remap_new_entities};
pub use merge::merge;
pub use physics::{BodyState, ContactEvent, PHYSICS_DT, PhysicsWorld, default_gravity};
pub use sanitize::sanitize_number;
pub use scene::{
    BodyDescriptor, BodyShape, ConstraintDescriptor, ConstraintTarget, PhysicsParameters, Scene,
    ShapeKind,
};
pub use session::{AudioClip, CommandOutcome, GenerativeService, Session, VoiceRequest};
pub use simulation::{Simulation, TickReport};
pub use store::{SceneSnapshot, SceneStore};
pub use viewport::{Bounds, Viewport, ZoomResult};
