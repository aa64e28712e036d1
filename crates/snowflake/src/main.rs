//! snowflake - Snowflake method novel planning CLI
//!
//! Thin front end over `snowflake-core`: every subcommand loads the selected
//! project and makes one engine call.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use snowflake_core::{Engine, EngineConfig};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("snowflake=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = EngineConfig::load()?;
    let engine = Engine::open(config)?;
    let project = cli.project.as_deref();
    let json = cli.json;

    match cli.command {
        Commands::Init { title } => commands::project::init(&engine, &title, json),
        Commands::List => commands::project::list(&engine, json),
        Commands::Status => commands::status::execute(&engine, project, json),
        Commands::Context { stage, scene } => {
            commands::context::execute(&engine, project, stage, scene, json)
        }
        Commands::Stage(cmd) => commands::stage::execute(&engine, project, cmd, json),
        Commands::Character(cmd) => commands::character::execute(&engine, project, cmd, json),
        Commands::Scenes(cmd) => commands::scenes::execute(&engine, project, cmd, json),
        Commands::Plan { scene, file } => {
            commands::scenes::save_plan(&engine, project, scene, file.as_deref(), json)
        }
        Commands::Draft { scene, file } => {
            commands::scenes::save_draft(&engine, project, scene, file.as_deref(), json)
        }
        Commands::Disaster { level, description } => {
            commands::project::disaster(&engine, project, level, &description, json)
        }
        Commands::Pov { mode } => commands::project::pov(&engine, project, mode, json),
    }
}
