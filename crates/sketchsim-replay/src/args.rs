//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

/// Replays recorded sketch and voice-command responses headlessly.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "sketchsim-replay", version, about)]
pub struct ReplayArgs {
    /// Recorded sketch-analysis response
    pub scene: PathBuf,

    /// Recorded voice-command responses, applied in order
    pub commands: Vec<PathBuf>,

    /// Frames simulated after the scene loads and after each command
    #[arg(long, default_value_t = 120)]
    pub frames: u32,

    /// Session configuration (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
