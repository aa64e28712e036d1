//! Project status dashboard.
//!
//! Prints the diagnostics report: stage progress, record counts, health
//! issues and warnings. Supports JSON output for programmatic use.

use anyhow::Result;
use colored::Colorize;

use snowflake_core::{Engine, StatusReport, Stage};

use super::project::format_time;
use super::{open_project, print_json};

pub fn execute(engine: &Engine, project: Option<&str>, json: bool) -> Result<()> {
    open_project(engine, project)?;
    let report = engine.status()?;

    if json {
        print_json(&report)
    } else {
        print_dashboard(&report);
        Ok(())
    }
}

fn print_dashboard(report: &StatusReport) {
    println!();
    println!("  {} {}", "Project:".cyan().bold(), report.project_title.bold());
    println!(
        "  {} {}% complete, working on stage {} ({})",
        "Progress:".cyan().bold(),
        report.completion_percentage,
        report.current_stage,
        report.current_stage.name()
    );
    println!("  {} {}", "Modified:".cyan().bold(), format_time(report.last_modified));

    println!();
    println!("  {}", "Stages:".cyan().bold());
    for stage in Stage::all() {
        let mark = if report.completed_stages.contains(&stage) {
            "✓".green()
        } else {
            "·".normal()
        };
        println!("    {} {:>2} {}", mark, stage.number(), stage.name());
    }

    println!();
    println!("  {}", "Records:".cyan().bold());
    println!("    Characters:   {}", report.characters_defined);
    println!(
        "    Scenes:       {} (recommended ~{} for {} words)",
        report.scenes_planned, report.recommended_scene_count, report.target_word_count
    );
    println!("    Scene plans:  {}", report.scene_plans_written);
    println!("    Drafts:       {}", report.scenes_drafted);
    println!("    Disasters:    {}/3", report.disasters_logged);

    if !report.health_issues.is_empty() {
        println!();
        println!("  {}", "Issues:".red().bold());
        for issue in &report.health_issues {
            println!("    {} {}", "✗".red(), issue);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("  {}", "Warnings:".yellow().bold());
        for warning in &report.warnings {
            println!("    {} {}", "⚠".yellow(), warning);
        }
    }

    if report.health_issues.is_empty() && report.warnings.is_empty() {
        println!();
        println!("  {} No problems found", "✓".green());
    }
    println!();
}
