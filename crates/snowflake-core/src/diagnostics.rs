//! Project diagnostics.
//!
//! The report is computed from current state only. Reads go through the cache
//! like any other read, and nothing is written, so repeated calls without an
//! intervening write return identical reports.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DiagnosticsConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::types::{Character, ProjectMetadata, Scene, SceneArtifact, Stage, normalize_key};

/// Problems that block sensible progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum HealthIssue {
    TooFewDisasters { logged: usize },
    NoCharacters,
    NoScenes,
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewDisasters { logged } => {
                write!(f, "Only {logged} of 3 disasters logged after Step 2")
            }
            Self::NoCharacters => f.write_str("No characters defined after Step 3"),
            Self::NoScenes => f.write_str("No scenes defined after Step 8"),
        }
    }
}

/// Softer findings worth a look.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum Warning {
    MissingPovCharacters { names: Vec<String> },
    SceneCountLow { actual: usize, recommended: u32 },
    SceneCountHigh { actual: usize, recommended: u32 },
    DraftingIncomplete { drafted: usize, planned: usize },
    DraftsWithoutScene { scene_numbers: Vec<u32> },
    NoProtagonist,
    NoAntagonist,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPovCharacters { names } => {
                write!(f, "POV characters not in Character Bible: {}", names.join(", "))
            }
            Self::SceneCountLow {
                actual,
                recommended,
            } => write!(
                f,
                "Scene count ({actual}) may be low for target word count (recommended: ~{recommended})"
            ),
            Self::SceneCountHigh {
                actual,
                recommended,
            } => write!(
                f,
                "Scene count ({actual}) may be high for target word count (recommended: ~{recommended})"
            ),
            Self::DraftingIncomplete { drafted, planned } => {
                write!(f, "{drafted} of {planned} scenes drafted")
            }
            Self::DraftsWithoutScene { scene_numbers } => {
                let numbers: Vec<String> = scene_numbers.iter().map(u32::to_string).collect();
                write!(f, "Drafts exist for scenes not in the scene list: {}", numbers.join(", "))
            }
            Self::NoProtagonist => f.write_str("No protagonist defined"),
            Self::NoAntagonist => f.write_str("No antagonist defined"),
        }
    }
}

/// Snapshot of a project's progress and health.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub project_title: String,
    pub current_stage: Stage,
    pub completed_stages: Vec<Stage>,
    pub completion_percentage: u32,
    pub characters_defined: usize,
    pub scenes_planned: usize,
    pub scene_plans_written: usize,
    pub scenes_drafted: usize,
    pub disasters_logged: usize,
    pub target_word_count: u32,
    pub recommended_scene_count: u32,
    pub last_modified: DateTime<Utc>,
    pub health_issues: Vec<HealthIssue>,
    pub warnings: Vec<Warning>,
}

/// Weighted share of completed stages, truncated to an integer percentage.
pub fn completion_percentage(completed: &BTreeSet<Stage>, weights: &[u32; 10]) -> u32 {
    let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    if total == 0 {
        return 0;
    }
    let done: u64 = completed
        .iter()
        .map(|stage| u64::from(weights[usize::from(stage.number() - 1)]))
        .sum();
    u32::try_from(done * 100 / total).unwrap_or(100)
}

/// Everything the report is computed from.
pub struct ProjectState<'a> {
    pub metadata: &'a ProjectMetadata,
    pub characters: &'a [Character],
    pub scenes: &'a [Scene],
    pub plans: &'a BTreeMap<u32, SceneArtifact>,
    pub drafts: &'a BTreeMap<u32, SceneArtifact>,
}

fn has_role(characters: &[Character], roles: &[&str]) -> bool {
    characters.iter().any(|c| {
        c.role()
            .map(|r| r.trim().to_lowercase())
            .is_some_and(|r| roles.contains(&r.as_str()))
    })
}

/// Compute the report for `state`.
pub fn diagnose(state: &ProjectState<'_>, config: &DiagnosticsConfig) -> StatusReport {
    let metadata = state.metadata;
    let completed = &metadata.completed_stages;
    let is_done = |n: u8| completed.contains(&Stage::known(n));

    let mut health_issues = Vec::new();
    if is_done(2) && metadata.disasters.len() < 3 {
        health_issues.push(HealthIssue::TooFewDisasters {
            logged: metadata.disasters.len(),
        });
    }
    if is_done(3) && state.characters.is_empty() {
        health_issues.push(HealthIssue::NoCharacters);
    }
    if is_done(8) && state.scenes.is_empty() {
        health_issues.push(HealthIssue::NoScenes);
    }

    let mut warnings = Vec::new();

    if metadata.settings.use_pov_mode {
        let known: BTreeSet<String> = state.characters.iter().map(Character::key).collect();
        let mut reported = BTreeSet::new();
        let mut missing: Vec<String> = Vec::new();
        for pov in state.scenes.iter().filter_map(|s| s.pov_character.as_deref()) {
            let key = normalize_key(pov);
            if !known.contains(&key) && reported.insert(key) {
                missing.push(pov.to_string());
            }
        }
        if !missing.is_empty() {
            warnings.push(Warning::MissingPovCharacters { names: missing });
        }
    }

    let recommended = metadata
        .settings
        .target_word_count
        .checked_div(config.words_per_scene)
        .unwrap_or(0);
    let actual = state.scenes.len();
    if actual > 0 {
        let low = f64::from(recommended) * (1.0 - config.scene_count_tolerance);
        let high = f64::from(recommended) * (1.0 + config.scene_count_tolerance);
        if (actual as f64) < low {
            warnings.push(Warning::SceneCountLow {
                actual,
                recommended,
            });
        } else if (actual as f64) > high {
            warnings.push(Warning::SceneCountHigh {
                actual,
                recommended,
            });
        }
    }

    let scene_numbers: BTreeSet<u32> = state.scenes.iter().map(|s| s.scene_number).collect();
    let drafted = state
        .drafts
        .keys()
        .filter(|n| scene_numbers.contains(n))
        .count();
    if !state.drafts.is_empty() && drafted < actual {
        warnings.push(Warning::DraftingIncomplete {
            drafted,
            planned: actual,
        });
    }
    let orphaned: Vec<u32> = state
        .drafts
        .keys()
        .copied()
        .filter(|n| !scene_numbers.contains(n))
        .collect();
    if !orphaned.is_empty() {
        warnings.push(Warning::DraftsWithoutScene {
            scene_numbers: orphaned,
        });
    }

    if is_done(3) {
        if !has_role(state.characters, &["protagonist"]) {
            warnings.push(Warning::NoProtagonist);
        }
        if !has_role(state.characters, &["antagonist", "systemic_antagonist"]) {
            warnings.push(Warning::NoAntagonist);
        }
    }

    StatusReport {
        project_title: metadata.title.clone(),
        current_stage: metadata.current_stage,
        completed_stages: completed.iter().copied().collect(),
        completion_percentage: completion_percentage(completed, &config.stage_weights),
        characters_defined: state.characters.len(),
        scenes_planned: actual,
        scene_plans_written: state.plans.len(),
        scenes_drafted: drafted,
        disasters_logged: metadata.disasters.len(),
        target_word_count: metadata.settings.target_word_count,
        recommended_scene_count: recommended,
        last_modified: metadata.updated_at,
        health_issues,
        warnings,
    }
}

impl Engine {
    /// Progress and health report for the active project.
    pub fn status(&self) -> Result<StatusReport> {
        let active = self.read_gate()?;
        let project_id = active.as_deref().ok_or(Error::NoActiveProject)?;

        let metadata = self.load_metadata(project_id)?;
        let characters = self.load_characters(project_id)?;
        let scenes = self.load_scenes(project_id)?;
        let plans = self.load_stage(project_id, Stage::known(9))?;
        let drafts = self.load_stage(project_id, Stage::known(10))?;

        let state = ProjectState {
            metadata: &metadata,
            characters: &characters,
            scenes: &scenes,
            plans: &plans.scene_artifacts,
            drafts: &drafts.scene_artifacts,
        };
        Ok(diagnose(&state, &self.config().diagnostics))
    }
}
