//! Context assembly for one stage.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use snowflake_core::{Assembly, ContextBundle, ContextRequest, Engine, Stage};

use super::{open_project, print_json};

pub fn execute(
    engine: &Engine,
    project: Option<&str>,
    stage: i64,
    scene: Option<u32>,
    json: bool,
) -> Result<()> {
    let stage = Stage::new(stage)?;
    open_project(engine, project)?;

    let request = match scene {
        Some(n) => ContextRequest::scene(stage, n),
        None => ContextRequest::stage(stage),
    };
    let assembly = engine.assemble(request)?;

    if json {
        let value = match &assembly {
            Assembly::Ready(bundle) => json!({ "ready": true, "context": bundle }),
            Assembly::Deficient(deficiencies) => json!({
                "ready": false,
                "deficiencies": deficiencies,
                "messages": deficiencies.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }),
        };
        return print_json(&value);
    }

    match assembly {
        Assembly::Ready(bundle) => print_bundle(&bundle),
        Assembly::Deficient(deficiencies) => {
            println!(
                "{} Stage {} ({}) is not ready:",
                "✗".red(),
                stage,
                stage.name()
            );
            for deficiency in &deficiencies {
                println!("    • {deficiency}");
            }
        }
    }
    Ok(())
}

fn print_bundle(bundle: &ContextBundle) {
    println!(
        "{} {} - stage {} ({})",
        "Context:".cyan().bold(),
        bundle.project_title.bold(),
        bundle.stage,
        bundle.stage.name()
    );

    if let Some(genre) = &bundle.settings.genre {
        println!("  Genre: {genre}");
    }
    for disaster in &bundle.disasters {
        println!("  Disaster {}: {}", disaster.level, disaster.description);
    }

    for output in bundle.stage_outputs.values() {
        println!();
        println!("{}", format!("## Stage {}: {}", output.stage, output.stage.name()).cyan());
        println!("{}", output.content.trim_end());
    }

    if !bundle.characters.is_empty() {
        println!();
        println!("{}", "## Characters".cyan());
        for character in &bundle.characters {
            match character.role() {
                Some(role) => println!("  • {} ({role})", character.name),
                None => println!("  • {}", character.name),
            }
        }
    }

    if let Some(scene) = &bundle.scene {
        println!();
        println!("{}", format!("## Scene {}", scene.scene_number).cyan());
        println!("  {}", scene.gist);
        if let Some(pov) = &scene.pov_character {
            println!("  POV: {pov}");
        }
    }

    if let Some(plan) = &bundle.scene_plan {
        println!();
        println!("{}", "## Scene plan".cyan());
        println!("{}", plan.content.trim_end());
    }

    if !bundle.style_samples.is_empty() {
        println!();
        println!("{}", "## Style samples".cyan());
        for sample in &bundle.style_samples {
            println!(
                "  [{} {:.2}] {}",
                sample.source_title, sample.similarity_score, sample.text
            );
        }
    }
}
