//! Session orchestration.
//!
//! Captured input → generative service → validation → sanitization → id
//! remapping → merge → commit. Service calls are bounded by the configured
//! timeouts; a reset while a call is in flight discards its result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::command::{PhysicsUpdate, SceneCommand};
use crate::config::SessionConfig;
use crate::error::{CaptureKind, ServiceError, SessionError};
use crate::identity::{ClockSuffix, SuffixSource, remap_new_entities};
use crate::merge::merge;
use crate::scene::{PhysicsParameters, Scene};
use crate::store::{SceneSnapshot, SceneStore};
use crate::validate::{ensure_audio_duration, ensure_capture_size, parse_command, parse_scene};

/// Payload for the voice-command service.
#[derive(Debug, Clone)]
pub struct VoiceRequest {
    pub audio: Vec<u8>,
    pub transcript: Option<String>,
    /// Current scene and physics parameters as JSON.
    pub context: String,
}

/// Backend producing raw model text for sketches and voice commands.
pub trait GenerativeService: Send + Sync {
    fn analyze_sketch(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;

    fn interpret_voice(
        &self,
        request: VoiceRequest,
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;
}

/// One recorded voice command.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub duration: Duration,
    pub transcript: Option<String>,
}

/// Result of a committed command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub summary: String,
    pub snapshot: Arc<SceneSnapshot>,
    /// Model id → minted id for the bodies this command created.
    pub mapping: HashMap<String, String>,
}

#[derive(Serialize)]
struct VoiceContext<'a> {
    scene: &'a Scene,
    physics: &'a PhysicsParameters,
}

pub struct Session<S> {
    service: S,
    store: Arc<SceneStore>,
    config: SessionConfig,
    suffix: Box<dyn SuffixSource>,
}

impl<S: GenerativeService> Session<S> {
    pub fn new(service: S, config: SessionConfig) -> Self {
        Self {
            service,
            store: Arc::new(SceneStore::new()),
            config,
            suffix: Box::new(ClockSuffix),
        }
    }

    /// Shares an existing store, e.g. with a `Simulation`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<SceneStore>) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_suffix_source(mut self, suffix: impl SuffixSource + 'static) -> Self {
        self.suffix = Box::new(suffix);
        self
    }

    pub fn store(&self) -> &Arc<SceneStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<SceneSnapshot> {
        self.store.load()
    }

    /// Clears the scene. Commands still in flight will be superseded.
    pub fn reset(&self) -> Arc<SceneSnapshot> {
        self.store.reset()
    }

    /// Sends a sketch to the vision service and installs the recognized scene.
    pub async fn analyze_sketch(&self, image: &[u8]) -> Result<Arc<SceneSnapshot>, SessionError> {
        ensure_capture_size(CaptureKind::Image, image.len(), self.config.min_image_bytes)?;

        let epoch = self.store.epoch();
        let call = self.service.analyze_sketch(image);
        let raw = with_timeout(self.config.analysis_timeout(), call).await?;
        self.install_scene(epoch, &raw)
    }

    /// Installs a vision response against the current scene.
    pub fn load_scene_response(&self, raw: &str) -> Result<Arc<SceneSnapshot>, SessionError> {
        self.install_scene(self.store.epoch(), raw)
    }

    fn install_scene(&self, epoch: u64, raw: &str) -> Result<Arc<SceneSnapshot>, SessionError> {
        let (bodies, constraints) = parse_scene(raw)?.sanitize();
        let scene = Scene::from_parts(bodies, constraints);
        let snapshot = self.store.replace(epoch, scene)?;
        tracing::info!(
            "[session] scene installed: {} bodies, {} constraints",
            snapshot.scene.bodies().len(),
            snapshot.scene.constraints().len()
        );
        Ok(snapshot)
    }

    /// Sends a voice command with the current scene as context and applies
    /// the returned delta.
    pub async fn apply_voice_command(
        &self,
        clip: &AudioClip,
    ) -> Result<CommandOutcome, SessionError> {
        ensure_capture_size(CaptureKind::Audio, clip.data.len(), self.config.min_audio_bytes)?;
        ensure_audio_duration(clip.duration, self.config.min_audio_duration())?;

        let snapshot = self.store.load();
        let context = serde_json::to_string(&VoiceContext {
            scene: &snapshot.scene,
            physics: &snapshot.params,
        })
        .map_err(|e| ServiceError(format!("failed to encode scene context: {e}")))?;

        let request = VoiceRequest {
            audio: clip.data.clone(),
            transcript: clip.transcript.clone(),
            context,
        };
        let call = self.service.interpret_voice(request);
        let raw = with_timeout(self.config.voice_timeout(), call).await?;
        self.commit_command(snapshot.epoch, &raw)
    }

    /// Applies a voice-command response against the current scene.
    pub fn apply_command_response(&self, raw: &str) -> Result<CommandOutcome, SessionError> {
        self.commit_command(self.store.epoch(), raw)
    }

    fn commit_command(&self, epoch: u64, raw: &str) -> Result<CommandOutcome, SessionError> {
        let command = parse_command(raw)?.sanitize();
        let summary = command.summary.clone();

        let (snapshot, mapping) = self.store.apply(epoch, |current| {
            let params = apply_physics(current.params, command.physics);
            if command.is_scene_noop() {
                return (current.scene.clone(), params, HashMap::new());
            }
            let suffix = self.suffix.next_suffix();
            let remapped = remap_new_entities(command, &suffix, &current.scene);
            (merge(&current.scene, &remapped.command), params, remapped.mapping)
        })?;

        tracing::info!(
            "[session] command applied (v{}): {}",
            snapshot.version,
            if summary.is_empty() { "<no summary>" } else { summary.as_str() }
        );
        Ok(CommandOutcome {
            summary,
            snapshot,
            mapping,
        })
    }
}

async fn with_timeout<F>(limit: Duration, call: F) -> Result<String, SessionError>
where
    F: Future<Output = Result<String, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::warn!("[session] service call timed out after {limit:?}");
            Err(SessionError::Timeout(limit))
        }
    }
}

fn apply_physics(
    mut params: PhysicsParameters,
    update: Option<PhysicsUpdate>,
) -> PhysicsParameters {
    let Some(update) = update else {
        return params;
    };
    if let Some(gravity) = update.gravity {
        params.gravity = gravity;
    }
    if let Some(time_scale) = update.time_scale {
        params.time_scale = time_scale;
    }
    if let Some(enabled) = update.collision_effects_enabled {
        params.collision_effects_enabled = enabled;
    }
    params
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ErrorKind;
    use crate::identity::FixedSuffix;
    use crate::scene::BodyShape;

    /// Replies with canned text after an optional delay.
    struct ScriptedService {
        scene: String,
        command: String,
        delay: Duration,
        calls: AtomicUsize,
        reset_during_call: Option<Arc<SceneStore>>,
    }

    impl ScriptedService {
        fn new(scene: &str, command: &str) -> Self {
            Self {
                scene: scene.to_string(),
                command: command.to_string(),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                reset_during_call: None,
            }
        }

        async fn reply(&self, text: &str) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(store) = &self.reset_during_call {
                store.reset();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(text.to_string())
        }
    }

    impl GenerativeService for ScriptedService {
        async fn analyze_sketch(&self, _image: &[u8]) -> Result<String, ServiceError> {
            self.reply(&self.scene).await
        }

        async fn interpret_voice(&self, _request: VoiceRequest) -> Result<String, ServiceError> {
            self.reply(&self.command).await
        }
    }

    const BOX_COMMAND: &str = r#"{
        "newBodies": [{"id": "box", "type": "rectangle", "x": 400, "y": 200, "isStatic": false}],
        "summary": "added box"
    }"#;

    const GROUND_SCENE: &str = r#"Here you go:
```json
{"bodies": [{"id": "ground", "type": "rectangle", "x": 400, "y": 580,
             "width": 800, "height": 40, "isStatic": true},
            {"id": "ball", "x": 400, "y": 100, "radius": "15"}],
 "constraints": [{"bodyA": "ball", "bodyB": "ghost"}]}
```"#;

    fn clip() -> AudioClip {
        AudioClip {
            data: vec![0; 4000],
            duration: Duration::from_secs(2),
            transcript: Some("add a box".into()),
        }
    }

    #[tokio::test]
    async fn test_box_command_end_to_end() {
        let service = ScriptedService::new("{}", BOX_COMMAND);
        let session = Session::new(service, SessionConfig::default())
            .with_suffix_source(FixedSuffix("4242".into()));

        let outcome = session.apply_voice_command(&clip()).await.expect("command applies");
        assert_eq!(outcome.summary, "added box");

        let scene = &outcome.snapshot.scene;
        assert_eq!(scene.bodies().len(), 1);
        let body = &scene.bodies()[0];
        assert_eq!(body.id, "box_4242");
        assert_eq!(body.friction, 0.1);
        assert_eq!(body.shape, BodyShape::Rectangle { width: 100.0, height: 20.0 });
        assert_eq!(outcome.mapping.get("box").map(String::as_str), Some("box_4242"));
    }

    #[tokio::test]
    async fn test_analysis_installs_sanitized_scene() {
        let service = ScriptedService::new(GROUND_SCENE, "{}");
        let session = Session::new(service, SessionConfig::default());

        let snapshot = session.analyze_sketch(&[0; 2048]).await.expect("analysis succeeds");
        assert_eq!(snapshot.scene.bodies().len(), 2);
        // Constraint to an unknown body is not admitted.
        assert!(snapshot.scene.constraints().is_empty());
        assert_eq!(
            snapshot.scene.body("ball").map(|b| b.shape),
            Some(BodyShape::Circle { radius: 15.0 })
        );
    }

    #[tokio::test]
    async fn test_short_capture_never_calls_service() {
        let service = ScriptedService::new(GROUND_SCENE, BOX_COMMAND);
        let session = Session::new(service, SessionConfig::default());

        let short = AudioClip {
            duration: Duration::from_millis(200),
            ..clip()
        };
        let err = session.apply_voice_command(&short).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientInput);

        let err = session.analyze_sketch(&[0; 10]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientInput);

        assert_eq!(session.service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let mut service = ScriptedService::new(GROUND_SCENE, BOX_COMMAND);
        service.delay = Duration::from_secs(5);
        let config = SessionConfig {
            voice_timeout_ms: 20,
            ..SessionConfig::default()
        };
        let session = Session::new(service, config);
        let before = session.snapshot();

        let err = session.apply_voice_command(&clip()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test]
    async fn test_slow_analysis_times_out() {
        let mut service = ScriptedService::new(GROUND_SCENE, BOX_COMMAND);
        service.delay = Duration::from_secs(5);
        let config = SessionConfig {
            analysis_timeout_ms: 20,
            ..SessionConfig::default()
        };
        let session = Session::new(service, config);
        session.load_scene_response(GROUND_SCENE).expect("scene loads");
        let before = session.snapshot();

        let err = session.analyze_sketch(&[0; 2048]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test]
    async fn test_reset_during_call_supersedes() {
        let store = Arc::new(SceneStore::new());
        let mut service = ScriptedService::new(GROUND_SCENE, BOX_COMMAND);
        service.reset_during_call = Some(Arc::clone(&store));
        let session = Session::new(service, SessionConfig::default()).with_store(store);

        let err = session.apply_voice_command(&clip()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Superseded);
        assert!(session.snapshot().scene.is_empty());
    }

    #[test]
    fn test_malformed_response_leaves_scene_unchanged() {
        let session = Session::new(ScriptedService::new("{}", "{}"), SessionConfig::default());
        session.load_scene_response(GROUND_SCENE).expect("scene loads");
        let before = session.snapshot();

        let err = session.apply_command_response("no json at all").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        let err = session.apply_command_response(r#"{"newBodies": []}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);

        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_physics_only_command() {
        let session = Session::new(ScriptedService::new("{}", "{}"), SessionConfig::default());
        session.load_scene_response(GROUND_SCENE).expect("scene loads");

        let outcome = session
            .apply_command_response(
                r#"{"physics": {"gravity": {"x": 0, "y": 1.62}, "timeScale": 0.5,
                                "collisionEffectsEnabled": "false"},
                    "summary": "moon gravity, slow motion"}"#,
            )
            .expect("command applies");

        let params = outcome.snapshot.params;
        assert!((params.gravity[1] - 1.62 / 9.81).abs() < 1e-4);
        assert_eq!(params.time_scale, 0.5);
        assert!(!params.collision_effects_enabled);
        assert_eq!(outcome.snapshot.scene.bodies().len(), 2);
        assert!(outcome.mapping.is_empty());
    }

    #[test]
    fn test_command_can_attach_to_existing_body() {
        let session = Session::new(ScriptedService::new("{}", "{}"), SessionConfig::default())
            .with_suffix_source(FixedSuffix("0001".into()));
        session.load_scene_response(GROUND_SCENE).expect("scene loads");

        let outcome = session
            .apply_command_response(
                r#"{"newBodies": [{"id": "ball", "radius": 10, "x": 300, "y": 100}],
                    "newConstraints": [{"bodyAId": "ball", "bodyBId": "ground", "stiffness": 0.5}],
                    "removeBodyIds": ["ball"],
                    "summary": "swap the ball for one on a spring"}"#,
            )
            .expect("command applies");

        let scene = &outcome.snapshot.scene;
        let ids: Vec<_> = scene.bodies().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["ground", "ball_0001"]);
        assert_eq!(scene.constraints().len(), 1);
        assert_eq!(scene.constraints()[0].body_b(), Some("ground"));
    }
}
