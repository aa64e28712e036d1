//! Command implementations for the snowflake CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod character;
pub mod context;
pub mod project;
pub mod scenes;
pub mod stage;
pub mod status;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use snowflake_core::{Engine, ProjectMetadata};

/// Load the project named on the command line into the engine.
pub fn open_project(engine: &Engine, project: Option<&str>) -> Result<ProjectMetadata> {
    let Some(title) = project else {
        bail!("No project selected. Pass --project or set SNOWFLAKE_PROJECT");
    };
    Ok(engine.load_project(title)?)
}

/// Read command input from a file, or stdin when no file is given.
pub fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Parse command input as JSON.
pub fn read_json(file: Option<&Path>) -> Result<serde_json::Value> {
    let raw = read_input(file)?;
    serde_json::from_str(&raw).context("Input is not valid JSON")
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
