//! Stage output commands.

use anyhow::{Result, bail};
use colored::Colorize;
use tracing::info;

use snowflake_core::{Engine, Stage};

use super::project::format_time;
use super::{open_project, print_json, read_input};
use crate::cli::{StageAction, StageCommand};

pub fn execute(engine: &Engine, project: Option<&str>, cmd: StageCommand, json: bool) -> Result<()> {
    match cmd.action {
        StageAction::Save { stage, title, file } => {
            let stage = Stage::new(stage)?;
            let content = read_input(file.as_deref())?;
            open_project(engine, project)?;

            let output = engine.save_stage_output(stage, title.as_deref(), &content)?;
            info!(stage = %stage, bytes = content.len(), "Stage output saved");

            if json {
                return print_json(&output);
            }
            println!(
                "{} Stage {} ({}) saved and marked complete",
                "✓".green(),
                stage,
                stage.name()
            );
            Ok(())
        }

        StageAction::Show { stage } => {
            let stage = Stage::new(stage)?;
            open_project(engine, project)?;

            let Some(output) = engine.stage_output(stage)? else {
                bail!("Stage {} ({}) has no saved output", stage, stage.name());
            };
            if json {
                return print_json(&output);
            }
            let heading = output.title.as_deref().unwrap_or(stage.name());
            println!(
                "{} {}",
                format!("Stage {stage}: {heading}").cyan().bold(),
                format_time(output.saved_at).dimmed()
            );
            println!();
            println!("{}", output.content.trim_end());
            Ok(())
        }

        StageAction::Reopen { stage } => {
            let stage = Stage::new(stage)?;
            open_project(engine, project)?;

            let meta = engine.reopen_stage(stage)?;
            if json {
                return print_json(&meta);
            }
            println!(
                "Stage {} reopened; current stage is {}",
                stage, meta.current_stage
            );
            Ok(())
        }
    }
}
