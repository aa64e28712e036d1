//! Project lifecycle commands: init, list, disasters and POV mode.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use tracing::info;

use snowflake_core::Engine;

use super::{open_project, print_json};
use crate::cli::PovMode;

pub fn init(engine: &Engine, title: &str, json: bool) -> Result<()> {
    let meta = engine.init_project(title)?;
    info!(title = %meta.title, "Project created");

    if json {
        return print_json(&meta);
    }
    println!("{} Created project {}", "✓".green(), meta.title.bold());
    println!("  Start with: snowflake --project {:?} stage save 1", meta.title);
    Ok(())
}

pub fn list(engine: &Engine, json: bool) -> Result<()> {
    let projects = engine.list_projects()?;
    if json {
        return print_json(&projects);
    }

    if projects.is_empty() {
        println!("No projects yet. Create one with: snowflake init <title>");
        return Ok(());
    }

    println!("{} ({})", "Projects:".cyan().bold(), projects.len());
    for project in &projects {
        println!(
            "  {} {}  stage {}/10  {} completed  {}",
            "•".green(),
            project.title.bold(),
            project.current_stage,
            project.completed_stages.len(),
            format_time(project.updated_at).dimmed()
        );
    }
    Ok(())
}

pub fn disaster(
    engine: &Engine,
    project: Option<&str>,
    level: i64,
    description: &str,
    json: bool,
) -> Result<()> {
    open_project(engine, project)?;
    let disaster = engine.log_disaster(level, description)?;

    if json {
        return print_json(&disaster);
    }
    println!(
        "{} Disaster {} logged: {}",
        "✓".green(),
        disaster.level,
        disaster.description
    );
    Ok(())
}

pub fn pov(engine: &Engine, project: Option<&str>, mode: PovMode, json: bool) -> Result<()> {
    open_project(engine, project)?;
    let meta = engine.set_pov_mode(mode.enabled())?;

    if json {
        return print_json(&meta.settings);
    }
    let state = if meta.settings.use_pov_mode {
        "on".green()
    } else {
        "off".yellow()
    };
    println!("POV mode {state}");
    Ok(())
}

pub(crate) fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
