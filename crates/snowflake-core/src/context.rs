//! Per-stage context assembly.
//!
//! Each stage declares the upstream records it needs. Assembly either returns
//! exactly those records or reports what is missing or incomplete; it never
//! fills gaps with defaults.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::style::{StyleQuery, StyleSample};
use crate::types::{
    Character, Disaster, ProjectSettings, Scene, SceneArtifact, Stage, StageOutput,
    normalize_key,
};

/// An upstream record a stage can depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Artifact {
    StageOutput(Stage),
    /// The character records as a whole.
    Characters,
    Character(String),
    Scene(u32),
    ScenePlan(u32),
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageOutput(stage) => write!(f, "stage {} output ({})", stage, stage.name()),
            Self::Characters => f.write_str("character records"),
            Self::Character(name) => write!(f, "character '{name}'"),
            Self::Scene(n) => write!(f, "scene {n}"),
            Self::ScenePlan(n) => write!(f, "plan for scene {n}"),
        }
    }
}

/// Why a stage cannot be assembled yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "deficiency", rename_all = "snake_case")]
pub enum Deficiency {
    /// The record does not exist: create it first.
    Missing { artifact: Artifact },
    /// The record exists but a required field is empty: fill it in.
    Incomplete { artifact: Artifact, field: String },
}

impl Deficiency {
    pub fn artifact(&self) -> &Artifact {
        match self {
            Self::Missing { artifact } | Self::Incomplete { artifact, .. } => artifact,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

impl fmt::Display for Deficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { artifact } => write!(f, "missing {artifact}"),
            Self::Incomplete { artifact, field } => write!(f, "{artifact} has no {field}"),
        }
    }
}

/// Records handed to a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub stage: Stage,
    pub project_title: String,
    pub settings: ProjectSettings,
    pub disasters: Vec<Disaster>,
    pub stage_outputs: BTreeMap<Stage, StageOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub characters: Vec<Character>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<Scene>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_plan: Option<SceneArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pov_character: Option<Character>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub style_samples: Vec<StyleSample>,
}

/// Outcome of assembling a stage's context.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembly {
    Ready(Box<ContextBundle>),
    /// Non-empty, in requirement order.
    Deficient(Vec<Deficiency>),
}

impl Assembly {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn bundle(&self) -> Option<&ContextBundle> {
        match self {
            Self::Ready(bundle) => Some(bundle),
            Self::Deficient(_) => None,
        }
    }

    pub fn deficiencies(&self) -> &[Deficiency] {
        match self {
            Self::Ready(_) => &[],
            Self::Deficient(deficiencies) => deficiencies,
        }
    }
}

/// Which stage to assemble, and for which scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextRequest {
    pub stage: Stage,
    pub scene_number: Option<u32>,
}

impl ContextRequest {
    pub fn stage(stage: Stage) -> Self {
        Self {
            stage,
            scene_number: None,
        }
    }

    pub fn scene(stage: Stage, scene_number: u32) -> Self {
        Self {
            stage,
            scene_number: Some(scene_number),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Output(Stage),
    AnyCharacter,
    SceneEntry,
    /// Only in POV mode.
    PovCharacter,
    ScenePlan,
    /// Only in POV mode.
    BibleFields,
}

const REQUIREMENTS: [&[Requirement]; 10] = {
    use Requirement::*;
    [
        &[],
        &[Output(Stage::known(1))],
        &[Output(Stage::known(2))],
        &[Output(Stage::known(2))],
        &[Output(Stage::known(3)), AnyCharacter],
        &[Output(Stage::known(4))],
        &[Output(Stage::known(3)), Output(Stage::known(5)), AnyCharacter],
        &[Output(Stage::known(6)), AnyCharacter],
        &[SceneEntry, PovCharacter],
        &[SceneEntry, ScenePlan, PovCharacter, BibleFields],
    ]
};

fn requirements(stage: Stage) -> &'static [Requirement] {
    REQUIREMENTS[usize::from(stage.number() - 1)]
}

fn works_on_scene(stage: Stage) -> bool {
    requirements(stage).contains(&Requirement::SceneEntry)
}

impl Engine {
    /// Assemble the upstream records a stage needs.
    ///
    /// Stages 9 and 10 work on one scene and fail with `SceneRequired` when
    /// `request.scene_number` is absent.
    pub fn assemble(&self, request: ContextRequest) -> Result<Assembly> {
        let stage = request.stage;
        let scene_number = match (works_on_scene(stage), request.scene_number) {
            (true, None) => {
                return Err(Error::SceneRequired {
                    stage: stage.number(),
                });
            }
            (true, Some(n)) => Some(n),
            (false, _) => None,
        };

        let active = self.read_gate()?;
        let project_id = active.as_deref().ok_or(Error::NoActiveProject)?;

        let metadata = self.load_metadata(project_id)?;
        let pov_mode = metadata.settings.use_pov_mode;

        let mut bundle = ContextBundle {
            stage,
            project_title: metadata.title.clone(),
            settings: metadata.settings.clone(),
            disasters: metadata.disasters.clone(),
            stage_outputs: BTreeMap::new(),
            characters: Vec::new(),
            scene: None,
            scene_plan: None,
            pov_character: None,
            style_samples: Vec::new(),
        };
        let mut deficiencies = Vec::new();

        for requirement in requirements(stage) {
            match *requirement {
                Requirement::Output(upstream) => {
                    let records = self.load_stage(project_id, upstream)?;
                    match &records.output {
                        None => deficiencies.push(Deficiency::Missing {
                            artifact: Artifact::StageOutput(upstream),
                        }),
                        Some(output) if output.content.trim().is_empty() => {
                            deficiencies.push(Deficiency::Incomplete {
                                artifact: Artifact::StageOutput(upstream),
                                field: "content".to_string(),
                            })
                        }
                        Some(output) => {
                            bundle.stage_outputs.insert(upstream, output.clone());
                        }
                    }
                }
                Requirement::AnyCharacter => {
                    let characters = self.load_characters(project_id)?;
                    if characters.is_empty() {
                        deficiencies.push(Deficiency::Missing {
                            artifact: Artifact::Characters,
                        });
                    } else {
                        bundle.characters = characters.as_ref().clone();
                    }
                }
                Requirement::SceneEntry => {
                    let Some(n) = scene_number else { continue };
                    let scenes = self.load_scenes(project_id)?;
                    match scenes.iter().find(|s| s.scene_number == n) {
                        Some(scene) => bundle.scene = Some(scene.clone()),
                        None => deficiencies.push(Deficiency::Missing {
                            artifact: Artifact::Scene(n),
                        }),
                    }
                }
                Requirement::ScenePlan => {
                    let Some(n) = scene_number else { continue };
                    if bundle.scene.is_none() {
                        continue;
                    }
                    let plans = self.load_stage(project_id, Stage::known(9))?;
                    match plans.scene_artifacts.get(&n) {
                        None => deficiencies.push(Deficiency::Missing {
                            artifact: Artifact::ScenePlan(n),
                        }),
                        Some(plan) if plan.content.trim().is_empty() => {
                            deficiencies.push(Deficiency::Incomplete {
                                artifact: Artifact::ScenePlan(n),
                                field: "content".to_string(),
                            })
                        }
                        Some(plan) => bundle.scene_plan = Some(plan.clone()),
                    }
                }
                Requirement::PovCharacter => {
                    if !pov_mode {
                        continue;
                    }
                    let Some(scene) = &bundle.scene else { continue };
                    let Some(pov) = scene.pov_character.clone() else {
                        deficiencies.push(Deficiency::Incomplete {
                            artifact: Artifact::Scene(scene.scene_number),
                            field: "povCharacter".to_string(),
                        });
                        continue;
                    };
                    let key = normalize_key(&pov);
                    let characters = self.load_characters(project_id)?;
                    match characters.iter().find(|c| c.key() == key) {
                        Some(character) => bundle.pov_character = Some(character.clone()),
                        None => deficiencies.push(Deficiency::Missing {
                            artifact: Artifact::Character(pov),
                        }),
                    }
                }
                Requirement::BibleFields => {
                    let Some(character) = &bundle.pov_character else { continue };
                    for field in &self.config().context.character_bible_fields {
                        if !character.has_attribute(field) {
                            deficiencies.push(Deficiency::Incomplete {
                                artifact: Artifact::Character(character.name.clone()),
                                field: field.clone(),
                            });
                        }
                    }
                }
            }
        }

        if !deficiencies.is_empty() {
            debug!(project_id, %stage, count = deficiencies.len(), "Context deficient");
            return Ok(Assembly::Deficient(deficiencies));
        }

        if stage == Stage::LAST {
            bundle.style_samples = self.style_samples(bundle.scene.as_ref())?;
        }

        Ok(Assembly::Ready(Box::new(bundle)))
    }

    /// Samples from the attached retriever. Retriever failures yield none.
    fn style_samples(&self, scene: Option<&Scene>) -> Result<Vec<StyleSample>> {
        let (Some(retriever), Some(scene)) = (self.style_retriever()?, scene) else {
            return Ok(Vec::new());
        };

        let query = StyleQuery {
            description: &scene.gist,
            scene_type: scene.extra.get("sceneType").and_then(|v| v.as_str()),
            sample_count: self.config().context.style_sample_count,
        };
        match retriever.style_context_for_scene(&query) {
            Ok(samples) => Ok(samples),
            Err(e) => {
                warn!(scene = scene.scene_number, error = %e, "Style retrieval failed");
                Ok(Vec::new())
            }
        }
    }
}
