//! Committed scene snapshot shared between the session and the simulation.
//!
//! Readers clone an `Arc` and never see a half-applied scene. Writers build
//! the next snapshot under the write lock and swap the pointer.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::SessionError;
use crate::scene::{PhysicsParameters, Scene};

/// One immutable committed state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneSnapshot {
    /// Bumped whenever the scene is replaced wholesale.
    pub epoch: u64,
    /// Bumped on every commit.
    pub version: u64,
    pub scene: Scene,
    pub params: PhysicsParameters,
}

#[derive(Debug, Default)]
pub struct SceneStore {
    current: RwLock<Arc<SceneSnapshot>>,
}

impl SceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Arc<SceneSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn epoch(&self) -> u64 {
        self.current.read().epoch
    }

    /// Commits the result of `f` if no reset happened since `epoch` was read.
    ///
    /// `f` runs under the write lock, so concurrent applies are serialized and
    /// each one sees the snapshot left by the previous.
    pub fn apply<T>(
        &self,
        epoch: u64,
        f: impl FnOnce(&SceneSnapshot) -> (Scene, PhysicsParameters, T),
    ) -> Result<(Arc<SceneSnapshot>, T), SessionError> {
        let mut current = self.current.write();
        if current.epoch != epoch {
            tracing::info!(
                "[store] apply for epoch {epoch} rejected, current epoch is {}",
                current.epoch
            );
            return Err(SessionError::Superseded);
        }

        let (scene, params, out) = f(&current);
        let next = Arc::new(SceneSnapshot {
            epoch: current.epoch,
            version: current.version + 1,
            scene,
            params,
        });
        *current = Arc::clone(&next);
        Ok((next, out))
    }

    /// Installs `scene` as a new epoch if no reset happened since `epoch`.
    ///
    /// Physics parameters carry over.
    pub fn replace(&self, epoch: u64, scene: Scene) -> Result<Arc<SceneSnapshot>, SessionError> {
        let mut current = self.current.write();
        if current.epoch != epoch {
            return Err(SessionError::Superseded);
        }

        let next = Arc::new(SceneSnapshot {
            epoch: current.epoch + 1,
            version: current.version + 1,
            scene,
            params: current.params,
        });
        *current = Arc::clone(&next);
        Ok(next)
    }

    /// Clears the scene and parameters. In-flight applies become stale.
    pub fn reset(&self) -> Arc<SceneSnapshot> {
        let mut current = self.current.write();
        let next = Arc::new(SceneSnapshot {
            epoch: current.epoch + 1,
            version: current.version + 1,
            scene: Scene::empty(),
            params: PhysicsParameters::default(),
        });
        *current = Arc::clone(&next);
        tracing::info!("[store] reset to epoch {}", next.epoch);
        next
    }
}
