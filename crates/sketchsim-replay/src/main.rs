//! Sketch Simulation Replay
//!
//! Drives the scene pipeline from recorded model responses on disk: installs
//! the analyzed scene, applies each voice-command response in order, and runs
//! the physics tick between them. Prints the final scene as JSON.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sketchsim_core::{
    GenerativeService, ServiceError, Session, SessionConfig, SessionError, Simulation, VoiceRequest,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod args;

use args::ReplayArgs;

/// Responses come from files, so live calls always fail.
struct Offline;

impl GenerativeService for Offline {
    async fn analyze_sketch(&self, _image: &[u8]) -> Result<String, ServiceError> {
        Err(ServiceError("no vision service in replay".to_string()))
    }

    async fn interpret_voice(&self, _request: VoiceRequest) -> Result<String, ServiceError> {
        Err(ServiceError("no voice service in replay".to_string()))
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn run_frames(sim: &mut Simulation, frames: u32) {
    let mut contacts = 0;
    for _ in 0..frames {
        contacts += sim.tick().contacts;
    }

    let world = sim.world();
    tracing::info!(
        "[replay] frame {}: {} bodies, {} contacts",
        world.current_frame(),
        world.body_count(),
        contacts
    );
    let mut states: Vec<_> = world.body_states().collect();
    states.sort_by(|a, b| a.0.cmp(b.0));
    for (id, state) in states {
        tracing::debug!(
            "[replay]   {id}: ({:.1}, {:.1}) angle {:.2}",
            state.position[0],
            state.position[1],
            state.angle
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = ReplayArgs::parse();

    let config = match &args.config {
        Some(path) => SessionConfig::from_json(&read(path)?)
            .with_context(|| format!("invalid config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let session = Session::new(Offline, config);
    let mut sim = Simulation::new(Arc::clone(session.store()), session.config());

    session
        .load_scene_response(&read(&args.scene)?)
        .map_err(|e| anyhow::anyhow!("{}: {e}", e.user_message()))
        .with_context(|| format!("scene {}", args.scene.display()))?;
    run_frames(&mut sim, args.frames);

    for path in &args.commands {
        match session.apply_command_response(&read(path)?) {
            Ok(outcome) => {
                tracing::info!("[replay] {}: {}", path.display(), outcome.summary);
                for (model_id, minted) in &outcome.mapping {
                    tracing::debug!("[replay]   {model_id} -> {minted}");
                }
            }
            // A bad response is reported and skipped, like a failed command in a live session.
            Err(e @ SessionError::MalformedResponse(_)) => {
                tracing::warn!(
                    kind = e.kind().as_str(),
                    "[replay] {} skipped: {e}",
                    path.display()
                );
            }
            Err(e) => return Err(e).with_context(|| format!("command {}", path.display())),
        }
        run_frames(&mut sim, args.frames);
    }

    let snapshot = session.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot.scene)?);
    Ok(())
}
