//! Host-side tick loop.
//!
//! Follows the committed snapshot, steps physics, and feeds contact events
//! into the effect timer. Never blocks on the session beyond a pointer read.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::effect::EffectTimer;
use crate::physics::PhysicsWorld;
use crate::store::{SceneSnapshot, SceneStore};
use crate::viewport::Viewport;

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub frame: u64,
    pub rebuilt: bool,
    pub contacts: usize,
}

pub struct Simulation {
    store: Arc<SceneStore>,
    snapshot: Arc<SceneSnapshot>,
    world: PhysicsWorld,
    effect: EffectTimer,
    viewport: Viewport,
}

impl Simulation {
    pub fn new(store: Arc<SceneStore>, config: &SessionConfig) -> Self {
        let snapshot = store.load();
        let world = PhysicsWorld::from_snapshot(&snapshot.scene, &snapshot.params);
        Self {
            store,
            snapshot,
            world,
            effect: EffectTimer::new(config.effect_frames),
            viewport: Viewport::new(config.viewport),
        }
    }

    /// Advances one frame.
    pub fn tick(&mut self) -> TickReport {
        let rebuilt = self.sync();

        self.effect.tick();
        let enabled = self.snapshot.params.collision_effects_enabled;
        let contacts = self.world.step();
        for contact in &contacts {
            self.effect.on_contact(contact.point, enabled);
        }

        TickReport {
            frame: self.world.current_frame(),
            rebuilt,
            contacts: contacts.len(),
        }
    }

    /// Rebuilds the world if a newer snapshot was committed.
    fn sync(&mut self) -> bool {
        let latest = self.store.load();
        if latest.version == self.snapshot.version {
            return false;
        }

        if latest.epoch == self.snapshot.epoch {
            self.world = self.world.rebuild(&latest.scene, &latest.params);
        } else {
            // Wholesale replacement: nothing carries over.
            self.world = PhysicsWorld::from_snapshot(&latest.scene, &latest.params);
            self.effect.clear();
        }
        if !latest.params.collision_effects_enabled {
            self.effect.clear();
        }

        tracing::debug!(
            "[simulation] synced to v{} (epoch {})",
            latest.version,
            latest.epoch
        );
        self.snapshot = latest;
        true
    }

    pub fn snapshot(&self) -> &Arc<SceneSnapshot> {
        &self.snapshot
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn effect(&self) -> &EffectTimer {
        &self.effect
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }
}
