//! Scene list, scene plan and scene draft commands.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use snowflake_core::{Engine, SceneArtifact};

use super::{open_project, print_json, read_input, read_json};
use crate::cli::{ScenesAction, ScenesCommand};

pub fn execute(engine: &Engine, project: Option<&str>, cmd: ScenesCommand, json: bool) -> Result<()> {
    match cmd.action {
        ScenesAction::Import { file } => {
            let list = read_json(Some(file.as_path()))?;
            open_project(engine, project)?;

            let scenes = engine.replace_scene_list(&list)?;
            if json {
                return print_json(&scenes);
            }
            println!("{} Imported {} scenes", "✓".green(), scenes.len());
            Ok(())
        }

        ScenesAction::List => {
            open_project(engine, project)?;
            let scenes = engine.scene_list()?;
            if json {
                return print_json(&scenes);
            }
            if scenes.is_empty() {
                println!("No scenes defined");
                return Ok(());
            }
            println!("{} ({})", "Scenes:".cyan().bold(), scenes.len());
            for scene in &scenes {
                let pov = scene.pov_character.as_deref().unwrap_or("-");
                println!("  {:>3}. {} {}", scene.scene_number, scene.gist, format!("[{pov}]").dimmed());
            }
            Ok(())
        }
    }
}

pub fn save_plan(
    engine: &Engine,
    project: Option<&str>,
    scene: u32,
    file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let content = read_input(file)?;
    open_project(engine, project)?;
    let plan = engine.save_scene_plan(scene, &content)?;
    report_artifact("Plan", &plan, json)
}

pub fn save_draft(
    engine: &Engine,
    project: Option<&str>,
    scene: u32,
    file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let content = read_input(file)?;
    open_project(engine, project)?;
    let draft = engine.save_scene_draft(scene, &content)?;
    report_artifact("Draft", &draft, json)
}

fn report_artifact(kind: &str, artifact: &SceneArtifact, json: bool) -> Result<()> {
    if json {
        return print_json(artifact);
    }
    println!(
        "{} {} for scene {} saved ({} words)",
        "✓".green(),
        kind,
        artifact.scene_number,
        artifact.content.split_whitespace().count()
    );
    Ok(())
}
