//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Snowflake method novel planning
///
/// Ten stages from a one-sentence summary to a first draft, with validated
/// project state.
#[derive(Parser, Debug)]
#[command(name = "snowflake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project to operate on
    #[arg(short, long, global = true, env = "SNOWFLAKE_PROJECT")]
    pub project: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new project
    Init {
        /// Project title
        title: String,
    },

    /// List stored projects, most recently modified first
    List,

    /// Show completion and health report
    Status,

    /// Assemble the context a stage works from
    Context {
        /// Stage number (1-10)
        stage: i64,

        /// Scene number, required for stages 9 and 10
        #[arg(short, long)]
        scene: Option<u32>,
    },

    /// Stage output management
    Stage(StageCommand),

    /// Character records
    Character(CharacterCommand),

    /// Scene list
    Scenes(ScenesCommand),

    /// Save a scene plan (stage 9)
    Plan {
        /// Scene number
        scene: u32,

        /// Read content from file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Save a scene draft (stage 10)
    Draft {
        /// Scene number
        scene: u32,

        /// Read content from file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Log one of the three disasters
    Disaster {
        /// Disaster level (1-3)
        level: i64,

        /// What goes wrong
        description: String,
    },

    /// Toggle point-of-view checks
    Pov {
        #[arg(value_enum)]
        mode: PovMode,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct StageCommand {
    #[command(subcommand)]
    pub action: StageAction,
}

#[derive(Subcommand, Debug)]
pub enum StageAction {
    /// Save a stage's output and mark it completed
    Save {
        /// Stage number (1-10)
        stage: i64,

        /// Output title
        #[arg(short, long)]
        title: Option<String>,

        /// Read content from file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show a stage's saved output
    Show {
        /// Stage number (1-10)
        stage: i64,
    },

    /// Mark a completed stage as not completed
    Reopen {
        /// Stage number (1-10)
        stage: i64,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Character Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct CharacterCommand {
    #[command(subcommand)]
    pub action: CharacterAction,
}

#[derive(Subcommand, Debug)]
pub enum CharacterAction {
    /// Create or update a character from a JSON object
    Set {
        /// Read JSON from file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show one character
    Show {
        /// Character name
        name: String,
    },

    /// List all characters
    List,
}

// ─────────────────────────────────────────────────────────────────────────────
// Scene Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ScenesCommand {
    #[command(subcommand)]
    pub action: ScenesAction,
}

#[derive(Subcommand, Debug)]
pub enum ScenesAction {
    /// Replace the scene list from a JSON array
    Import {
        /// JSON file holding the scene array
        file: PathBuf,
    },

    /// Show the scene list
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PovMode {
    On,
    Off,
}

impl PovMode {
    pub fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}
