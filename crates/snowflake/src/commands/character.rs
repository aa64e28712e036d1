//! Character record commands.

use anyhow::{Result, bail};
use colored::Colorize;
use serde_json::Value;

use snowflake_core::{Character, Engine};

use super::{open_project, print_json, read_json};
use crate::cli::{CharacterAction, CharacterCommand};

pub fn execute(
    engine: &Engine,
    project: Option<&str>,
    cmd: CharacterCommand,
    json: bool,
) -> Result<()> {
    match cmd.action {
        CharacterAction::Set { file } => {
            let data = read_json(file.as_deref())?;
            open_project(engine, project)?;

            let character = engine.upsert_character(&data)?;
            if json {
                return print_json(&character);
            }
            println!("{} Saved {}", "✓".green(), character.name.bold());
            Ok(())
        }

        CharacterAction::Show { name } => {
            open_project(engine, project)?;
            let Some(character) = engine.character(&name)? else {
                bail!("Character not found: {name}");
            };
            if json {
                return print_json(&character);
            }
            print_character(&character);
            Ok(())
        }

        CharacterAction::List => {
            open_project(engine, project)?;
            let characters = engine.characters()?;
            if json {
                return print_json(&characters);
            }
            if characters.is_empty() {
                println!("No characters defined");
                return Ok(());
            }
            println!("{} ({})", "Characters:".cyan().bold(), characters.len());
            for character in &characters {
                let role = character.role().unwrap_or("-");
                println!("  {} {} {}", "•".green(), character.name, role.dimmed());
            }
            Ok(())
        }
    }
}

fn print_character(character: &Character) {
    println!("{}", character.name.cyan().bold());
    for (field, value) in &character.attributes {
        match value {
            Value::String(text) => println!("  {field}: {text}"),
            other => println!("  {field}: {other}"),
        }
    }
}
