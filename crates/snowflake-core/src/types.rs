//! Shared types for snowflake-core.
//!
//! These are the records persisted per project and served through the cache.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Stage
// ─────────────────────────────────────────────────────────────────────────────

/// One of the ten steps of the authoring workflow. Always within 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Stage(u8);

impl Stage {
    pub const FIRST: Stage = Stage(1);
    pub const LAST: Stage = Stage(10);

    /// Validate a stage number.
    pub fn new(number: i64) -> Result<Self> {
        if (1..=10).contains(&number) {
            Ok(Self(number as u8))
        } else {
            Err(Error::InvalidStageNumber(number))
        }
    }

    /// Stage taken from a fixed in-crate table; the number is known to be valid.
    pub(crate) const fn known(number: u8) -> Self {
        debug_assert!(number >= 1 && number <= 10);
        Self(number)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// All ten stages in order.
    pub fn all() -> impl Iterator<Item = Stage> {
        (1..=10).map(Stage)
    }

    /// Workflow name of the stage.
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "One-Sentence Summary",
            2 => "One-Paragraph Summary",
            3 => "Character Summaries",
            4 => "One-Page Synopsis",
            5 => "Character Synopses",
            6 => "Four-Page Synopsis",
            7 => "Character Bible",
            8 => "Scene List",
            9 => "Scene Plans",
            _ => "First Draft",
        }
    }
}

impl TryFrom<i64> for Stage {
    type Error = Error;

    fn try_from(number: i64) -> Result<Self> {
        Stage::new(number)
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.0
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keys
// ─────────────────────────────────────────────────────────────────────────────

/// Normalize a title or character name into a storage key.
///
/// Alphanumerics, `-` and `_` are kept, whitespace becomes `_`, anything else
/// becomes `_`, and the result is lowercased.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .to_lowercase()
}

/// Attribute names compare without case or separators: `eyeColor == eye_color`.
fn normalize_field(field: &str) -> String {
    field
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a recorded attribute value carries no information.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_target_word_count() -> u32 {
    80_000
}

/// Per-project settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default = "default_target_word_count")]
    pub target_word_count: u32,
    #[serde(default)]
    pub pov_style: Option<String>,
    /// When true, scenes are expected to name a POV character.
    #[serde(default = "default_true")]
    pub use_pov_mode: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            genre: None,
            target_word_count: default_target_word_count(),
            pov_style: None,
            use_pov_mode: true,
        }
    }
}

/// A major plot disaster (levels 1 to 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disaster {
    pub level: u8,
    pub description: String,
    pub logged_at: DateTime<Utc>,
}

/// The metadata record of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Highest completed stage, or stage 1 before anything is completed.
    pub current_stage: Stage,
    /// Unordered set; stages may complete out of order.
    #[serde(default)]
    pub completed_stages: BTreeSet<Stage>,
    #[serde(default)]
    pub disasters: Vec<Disaster>,
    #[serde(default)]
    pub settings: ProjectSettings,
}

impl ProjectMetadata {
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            created_at: now,
            updated_at: now,
            current_stage: Stage::FIRST,
            completed_stages: BTreeSet::new(),
            disasters: Vec::new(),
            settings: ProjectSettings::default(),
        }
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Add a stage to the completed set. Re-completing a stage is allowed.
    pub fn complete(&mut self, stage: Stage, now: DateTime<Utc>) {
        self.completed_stages.insert(stage);
        self.sync_current_stage();
        self.updated_at = now;
    }

    /// Remove a stage from the completed set so it can be redone.
    pub fn reopen(&mut self, stage: Stage, now: DateTime<Utc>) {
        self.completed_stages.remove(&stage);
        self.sync_current_stage();
        self.updated_at = now;
    }

    /// Record a disaster, replacing any existing one at the same level.
    pub fn record_disaster(&mut self, disaster: Disaster) {
        self.updated_at = disaster.logged_at;
        match self.disasters.iter_mut().find(|d| d.level == disaster.level) {
            Some(existing) => *existing = disaster,
            None => self.disasters.push(disaster),
        }
        self.disasters.sort_by_key(|d| d.level);
    }

    fn sync_current_stage(&mut self) {
        self.current_stage = self
            .completed_stages
            .iter()
            .next_back()
            .copied()
            .unwrap_or(Stage::FIRST);
    }
}

/// Listing entry for a stored project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    pub current_stage: Stage,
    pub completed_stages: Vec<Stage>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectSummary {
    pub fn from_metadata(id: impl Into<String>, metadata: &ProjectMetadata) -> Self {
        Self {
            id: id.into(),
            title: metadata.title.clone(),
            current_stage: metadata.current_stage,
            completed_stages: metadata.completed_stages.iter().copied().collect(),
            updated_at: metadata.updated_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Characters
// ─────────────────────────────────────────────────────────────────────────────

/// A character record. Attributes are an open map accumulated across stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Character {
    /// Storage key derived from the name.
    pub fn key(&self) -> String {
        normalize_key(&self.name)
    }

    /// Look up an attribute, ignoring case and separators in its name.
    pub fn attribute(&self, field: &str) -> Option<&Value> {
        if let Some(value) = self.attributes.get(field) {
            return Some(value);
        }
        let wanted = normalize_field(field);
        self.attributes
            .iter()
            .find(|(name, _)| normalize_field(name) == wanted)
            .map(|(_, value)| value)
    }

    /// Whether the attribute is recorded with a non-blank value.
    pub fn has_attribute(&self, field: &str) -> bool {
        self.attribute(field).is_some_and(|v| !is_blank(v))
    }

    pub fn role(&self) -> Option<&str> {
        self.attribute("role").and_then(Value::as_str)
    }

    /// Merge newer attributes over this record. Absent attributes are kept.
    pub fn merge(&mut self, newer: Character) {
        self.name = newer.name;
        self.updated_at = newer.updated_at;
        self.attributes.extend(newer.attributes);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenes
// ─────────────────────────────────────────────────────────────────────────────

/// One row of the scene list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(alias = "scene_number")]
    pub scene_number: u32,
    pub gist: String,
    #[serde(default, alias = "pov_character", skip_serializing_if = "Option::is_none")]
    pub pov_character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disaster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Fields outside the known set, preserved as written.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A per-scene artifact: a stage-9 plan or a stage-10 draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneArtifact {
    pub scene_number: u32,
    pub content: String,
    pub saved_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage outputs
// ─────────────────────────────────────────────────────────────────────────────

/// The saved output of one stage. Overwritten on resave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutput {
    pub stage: Stage,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    pub saved_at: DateTime<Utc>,
}

/// Everything a stage produced: its output plus any per-scene artifacts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageRecords {
    pub output: Option<StageOutput>,
    pub scene_artifacts: BTreeMap<u32, SceneArtifact>,
}
