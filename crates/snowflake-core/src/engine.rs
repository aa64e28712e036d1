//! The project engine.
//!
//! Owns the store, the cache and the active project. Every mutating operation
//! runs validate, persist and invalidate while holding the project gate
//! exclusively, so a concurrent reader sees either the full pre-write state or
//! the full post-write state.
//!
//! ```text
//!   write:  Validator ──▶ RecordStore (one transaction) ──▶ ScopedCache::invalidate
//!   read:   ScopedCache ──(miss)──▶ RecordStore ──▶ fill
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, Scope, ScopedCache};
use crate::config::EngineConfig;
use crate::db::{Database, RecordKind, RecordStore, RecordWrite};
use crate::error::{Error, Result};
use crate::style::StyleRetriever;
use crate::types::{
    Character, Disaster, ProjectMetadata, ProjectSummary, Scene, SceneArtifact, Stage,
    StageOutput, StageRecords, normalize_key,
};
use crate::validation::{
    validate_character, validate_disaster, validate_scene_list, validate_target_word_count,
    validate_title,
};

const METADATA_KEY: &str = "project";

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn encode<T: Serialize>(kind: RecordKind, key: impl Into<String>, record: &T) -> Result<RecordWrite> {
    Ok(RecordWrite::new(kind, key, serde_json::to_value(record)?))
}

fn active_id(active: &Option<String>) -> Result<&str> {
    active.as_deref().ok_or(Error::NoActiveProject)
}

/// Project state engine.
pub struct Engine {
    store: Arc<dyn RecordStore>,
    cache: ScopedCache,
    config: EngineConfig,
    /// Active project id. Readers share it; writers and project switches hold
    /// it exclusively for the whole validate, persist, invalidate sequence.
    active: RwLock<Option<String>>,
    style: RwLock<Option<Arc<dyn StyleRetriever>>>,
}

impl Engine {
    /// Open the engine on the database named by `config`.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        config.ensure_dirs()?;
        let database = Database::open_path(&config.database_path())?;
        info!(path = %config.database_path().display(), "Opened project database");
        Self::with_store(Arc::new(database), config)
    }

    /// Engine over a private in-memory database.
    pub fn open_in_memory(config: EngineConfig) -> Result<Self> {
        Self::with_store(Arc::new(Database::open_in_memory()?), config)
    }

    /// Engine over an arbitrary store. Fails on an invalid `config`.
    pub fn with_store(store: Arc<dyn RecordStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache: ScopedCache::new(),
            config,
            active: RwLock::new(None),
            style: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Id of the active project, if any.
    pub fn active_project(&self) -> Result<Option<String>> {
        let active = self.read_gate()?;
        Ok(active.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gates
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn read_gate(&self) -> Result<RwLockReadGuard<'_, Option<String>>> {
        self.active.read().map_err(|_| Error::LockPoisoned)
    }

    fn write_gate(&self) -> Result<RwLockWriteGuard<'_, Option<String>>> {
        self.active.write().map_err(|_| Error::LockPoisoned)
    }

    /// Invalidate `scopes` after a committed write.
    fn invalidate(&self, project_id: &str, scopes: &[Scope]) -> Result<()> {
        for scope in scopes {
            self.cache.invalidate(project_id, *scope)?;
        }
        Ok(())
    }

    fn activate(&self, active: &mut Option<String>, project_id: String) -> Result<()> {
        if let Some(previous) = active.as_deref() {
            self.cache.invalidate_all(previous)?;
        }
        self.cache.invalidate_all(&project_id)?;
        if active.as_deref() != Some(project_id.as_str()) {
            info!(project_id = %project_id, previous = ?active.as_deref(), "Switched active project");
        }
        *active = Some(project_id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cached loaders (caller holds a gate)
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn load_metadata(&self, project_id: &str) -> Result<Arc<ProjectMetadata>> {
        self.cache
            .get_or_load(project_id, Scope::Metadata, || self.fetch_metadata(project_id))
    }

    pub(crate) fn load_characters(&self, project_id: &str) -> Result<Arc<Vec<Character>>> {
        self.cache.get_or_load(project_id, Scope::Characters, || {
            let mut characters = self
                .store
                .read_collection(project_id, RecordKind::Character)?
                .into_iter()
                .map(|(_, body)| decode::<Character>(body))
                .collect::<Result<Vec<_>>>()?;
            characters.sort_by_key(Character::key);
            Ok(characters)
        })
    }

    pub(crate) fn load_scenes(&self, project_id: &str) -> Result<Arc<Vec<Scene>>> {
        self.cache
            .get_or_load(project_id, Scope::Scenes, || self.fetch_scenes(project_id))
    }

    pub(crate) fn load_stage(&self, project_id: &str, stage: Stage) -> Result<Arc<StageRecords>> {
        self.cache.get_or_load(project_id, Scope::Stage(stage), || {
            let output = self
                .store
                .read(project_id, RecordKind::StageOutput, &stage.to_string())?
                .map(decode::<StageOutput>)
                .transpose()?;

            let artifact_kind = match stage.number() {
                9 => Some(RecordKind::ScenePlan),
                10 => Some(RecordKind::SceneDraft),
                _ => None,
            };
            let mut scene_artifacts = BTreeMap::new();
            if let Some(kind) = artifact_kind {
                for (_, body) in self.store.read_collection(project_id, kind)? {
                    let artifact: SceneArtifact = decode(body)?;
                    scene_artifacts.insert(artifact.scene_number, artifact);
                }
            }

            Ok(StageRecords {
                output,
                scene_artifacts,
            })
        })
    }

    pub(crate) fn style_retriever(&self) -> Result<Option<Arc<dyn StyleRetriever>>> {
        let style = self.style.read().map_err(|_| Error::LockPoisoned)?;
        Ok(style.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Uncached store reads (write paths, under the exclusive gate)
    // ─────────────────────────────────────────────────────────────────────────

    fn fetch_metadata(&self, project_id: &str) -> Result<ProjectMetadata> {
        self.store
            .read(project_id, RecordKind::Metadata, METADATA_KEY)?
            .map(decode)
            .transpose()?
            .ok_or_else(|| Error::not_found("project", project_id))
    }

    fn fetch_scenes(&self, project_id: &str) -> Result<Vec<Scene>> {
        self.store
            .read_collection(project_id, RecordKind::Scene)?
            .into_iter()
            .map(|(_, body)| decode(body))
            .collect()
    }

    /// Apply `change` to the stored metadata and persist it, alone or with
    /// other records, in one batch.
    fn commit_with_metadata(
        &self,
        project_id: &str,
        mut writes: Vec<RecordWrite>,
        scopes: &[Scope],
        change: impl FnOnce(&mut ProjectMetadata),
    ) -> Result<ProjectMetadata> {
        let mut metadata = self.fetch_metadata(project_id)?;
        change(&mut metadata);
        writes.push(encode(RecordKind::Metadata, METADATA_KEY, &metadata)?);

        self.store.write_batch(project_id, &writes)?;
        self.invalidate(project_id, scopes)?;
        self.invalidate(project_id, &[Scope::Metadata])?;
        Ok(metadata)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Projects
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a project and make it active.
    pub fn init_project(&self, title: &str) -> Result<ProjectMetadata> {
        let title = validate_title(title).into_result()?;
        let project_id = normalize_key(&title);

        let mut active = self.write_gate()?;
        if self
            .store
            .read(&project_id, RecordKind::Metadata, METADATA_KEY)?
            .is_some()
        {
            return Err(Error::ProjectExists(project_id));
        }

        let metadata = ProjectMetadata::new(title, Utc::now());
        self.store.write_batch(
            &project_id,
            &[encode(RecordKind::Metadata, METADATA_KEY, &metadata)?],
        )?;
        info!(project_id = %project_id, "Initialized project");

        self.activate(&mut active, project_id)?;
        Ok(metadata)
    }

    /// Load an existing project and make it active.
    pub fn load_project(&self, title: &str) -> Result<ProjectMetadata> {
        let project_id = normalize_key(title);

        let mut active = self.write_gate()?;
        let metadata = self
            .fetch_metadata(&project_id)
            .map_err(|e| if e.is_not_found() { Error::not_found("project", title) } else { e })?;
        info!(project_id = %project_id, "Loaded project");

        self.activate(&mut active, project_id)?;
        Ok(metadata)
    }

    /// Every stored project, most recently modified first.
    ///
    /// Projects whose metadata is missing or unreadable are skipped.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut projects = Vec::new();
        for project_id in self.store.list_project_ids()? {
            let metadata = match self.fetch_metadata(&project_id) {
                Ok(metadata) => metadata,
                Err(e @ (Error::Serialization(_) | Error::NotFound { .. })) => {
                    warn!(project_id = %project_id, error = %e, "Skipping unreadable project");
                    continue;
                }
                Err(e) => return Err(e),
            };
            projects.push(ProjectSummary::from_metadata(project_id, &metadata));
        }
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    pub fn metadata(&self) -> Result<ProjectMetadata> {
        let active = self.read_gate()?;
        let metadata = self.load_metadata(active_id(&active)?)?;
        Ok(Arc::unwrap_or_clone(metadata))
    }

    pub fn pov_mode(&self) -> Result<bool> {
        Ok(self.metadata()?.settings.use_pov_mode)
    }

    pub fn set_pov_mode(&self, enabled: bool) -> Result<ProjectMetadata> {
        let active = self.write_gate()?;
        let project_id = active_id(&active)?;
        let now = Utc::now();
        self.commit_with_metadata(project_id, Vec::new(), &[], |meta| {
            meta.settings.use_pov_mode = enabled;
            meta.updated_at = now;
        })
    }

    pub fn set_target_word_count(&self, words: u32) -> Result<ProjectMetadata> {
        let words = validate_target_word_count(words).into_result()?;
        let active = self.write_gate()?;
        let project_id = active_id(&active)?;
        let now = Utc::now();
        self.commit_with_metadata(project_id, Vec::new(), &[], |meta| {
            meta.settings.target_word_count = words;
            meta.updated_at = now;
        })
    }

    pub fn set_genre(&self, genre: Option<String>) -> Result<ProjectMetadata> {
        let genre = genre.map(|g| g.trim().to_string()).filter(|g| !g.is_empty());
        let active = self.write_gate()?;
        let project_id = active_id(&active)?;
        let now = Utc::now();
        self.commit_with_metadata(project_id, Vec::new(), &[], |meta| {
            meta.settings.genre = genre;
            meta.updated_at = now;
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stages
    // ─────────────────────────────────────────────────────────────────────────

    /// Save a stage's output and mark the stage completed, atomically.
    pub fn save_stage_output(
        &self,
        stage: Stage,
        title: Option<&str>,
        content: &str,
    ) -> Result<StageOutput> {
        let active = self.write_gate()?;
        let project_id = active_id(&active)?;

        let now = Utc::now();
        let output = StageOutput {
            stage,
            title: title.map(str::to_string),
            content: content.to_string(),
            saved_at: now,
        };
        let writes = vec![encode(RecordKind::StageOutput, stage.to_string(), &output)?];
        self.commit_with_metadata(project_id, writes, &[Scope::Stage(stage)], |meta| {
            meta.complete(stage, now);
        })?;

        debug!(project_id, %stage, "Saved stage output");
        Ok(output)
    }

    pub fn stage_output(&self, stage: Stage) -> Result<Option<StageOutput>> {
        let active = self.read_gate()?;
        let records = self.load_stage(active_id(&active)?, stage)?;
        Ok(records.output.clone())
    }

    /// Remove a stage from the completed set. Its output is kept.
    pub fn reopen_stage(&self, stage: Stage) -> Result<ProjectMetadata> {
        let active = self.write_gate()?;
        let project_id = active_id(&active)?;
        let now = Utc::now();
        self.commit_with_metadata(project_id, Vec::new(), &[], |meta| meta.reopen(stage, now))
    }

    /// Record one of the three major disasters.
    pub fn log_disaster(&self, level: i64, description: &str) -> Result<Disaster> {
        let disaster = validate_disaster(level, description, Utc::now()).into_result()?;

        let active = self.write_gate()?;
        let project_id = active_id(&active)?;
        let recorded = disaster.clone();
        self.commit_with_metadata(project_id, Vec::new(), &[], |meta| {
            meta.record_disaster(recorded)
        })?;
        Ok(disaster)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Characters
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate and merge a character record into the stored one.
    pub fn upsert_character(&self, data: &Value) -> Result<Character> {
        let incoming = validate_character(data).into_result()?;
        let key = incoming.key();

        let active = self.write_gate()?;
        let project_id = active_id(&active)?;

        let now = Utc::now();
        let mut character = match self.store.read(project_id, RecordKind::Character, &key)? {
            Some(body) => {
                let mut existing: Character = decode(body)?;
                existing.merge(incoming);
                existing
            }
            None => incoming,
        };
        character.updated_at = Some(now);

        let writes = vec![encode(RecordKind::Character, key.as_str(), &character)?];
        self.commit_with_metadata(project_id, writes, &[Scope::Characters], |meta| {
            meta.updated_at = now;
        })?;

        debug!(project_id, character = %key, "Saved character");
        Ok(character)
    }

    /// Look up a character by name. Absent characters are `None`.
    pub fn character(&self, name: &str) -> Result<Option<Character>> {
        let key = normalize_key(name);
        let active = self.read_gate()?;
        let characters = self.load_characters(active_id(&active)?)?;
        Ok(characters.iter().find(|c| c.key() == key).cloned())
    }

    /// All characters, ordered by name.
    pub fn characters(&self) -> Result<Vec<Character>> {
        let active = self.read_gate()?;
        let characters = self.load_characters(active_id(&active)?)?;
        Ok(Arc::unwrap_or_clone(characters))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scenes
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate and replace the whole scene list.
    pub fn replace_scene_list(&self, list: &Value) -> Result<Vec<Scene>> {
        let scenes = validate_scene_list(list).into_result()?;

        let active = self.write_gate()?;
        let project_id = active_id(&active)?;

        let records = scenes
            .iter()
            .map(|scene| -> Result<(String, Value)> {
                Ok((scene.scene_number.to_string(), serde_json::to_value(scene)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut metadata = self.fetch_metadata(project_id)?;
        metadata.updated_at = Utc::now();
        let touch = encode(RecordKind::Metadata, METADATA_KEY, &metadata)?;

        self.store
            .replace_collection(project_id, RecordKind::Scene, &records, &[touch])?;
        self.invalidate(project_id, &[Scope::Scenes, Scope::Metadata])?;

        debug!(project_id, scenes = scenes.len(), "Replaced scene list");
        Ok(scenes)
    }

    pub fn scene_list(&self) -> Result<Vec<Scene>> {
        let active = self.read_gate()?;
        let scenes = self.load_scenes(active_id(&active)?)?;
        Ok(Arc::unwrap_or_clone(scenes))
    }

    /// Save the stage-9 plan of one scene.
    pub fn save_scene_plan(&self, scene_number: u32, content: &str) -> Result<SceneArtifact> {
        self.save_scene_artifact(Stage::known(9), RecordKind::ScenePlan, scene_number, content)
    }

    /// Save the stage-10 draft of one scene.
    pub fn save_scene_draft(&self, scene_number: u32, content: &str) -> Result<SceneArtifact> {
        self.save_scene_artifact(Stage::known(10), RecordKind::SceneDraft, scene_number, content)
    }

    fn save_scene_artifact(
        &self,
        stage: Stage,
        kind: RecordKind,
        scene_number: u32,
        content: &str,
    ) -> Result<SceneArtifact> {
        let active = self.write_gate()?;
        let project_id = active_id(&active)?;

        let scenes = self.fetch_scenes(project_id)?;
        if !scenes.iter().any(|s| s.scene_number == scene_number) {
            return Err(Error::not_found("scene", scene_number.to_string()));
        }

        let now = Utc::now();
        let artifact = SceneArtifact {
            scene_number,
            content: content.to_string(),
            saved_at: now,
        };
        let writes = vec![encode(kind, scene_number.to_string(), &artifact)?];
        self.commit_with_metadata(project_id, writes, &[Scope::Stage(stage)], |meta| {
            meta.updated_at = now;
        })?;

        debug!(project_id, %kind, scene_number, "Saved scene artifact");
        Ok(artifact)
    }

    pub fn scene_plan(&self, scene_number: u32) -> Result<Option<SceneArtifact>> {
        self.scene_artifact(Stage::known(9), scene_number)
    }

    pub fn scene_draft(&self, scene_number: u32) -> Result<Option<SceneArtifact>> {
        self.scene_artifact(Stage::known(10), scene_number)
    }

    fn scene_artifact(&self, stage: Stage, scene_number: u32) -> Result<Option<SceneArtifact>> {
        let active = self.read_gate()?;
        let records = self.load_stage(active_id(&active)?, stage)?;
        Ok(records.scene_artifacts.get(&scene_number).cloned())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cache
    // ─────────────────────────────────────────────────────────────────────────

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn reset_cache_stats(&self) {
        self.cache.reset_stats();
    }

    /// Drop every cached scope of the active project.
    pub fn clear_cache(&self) -> Result<()> {
        let active = self.write_gate()?;
        self.cache.invalidate_all(active_id(&active)?)
    }

    /// Whether `scope` of the active project currently holds a value.
    pub fn is_cached(&self, scope: Scope) -> Result<bool> {
        let active = self.read_gate()?;
        self.cache.is_cached(active_id(&active)?, scope)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Style retrieval
    // ─────────────────────────────────────────────────────────────────────────

    /// Enable and attach a style retriever consulted when drafting.
    pub fn attach_style_retriever(&self, retriever: Arc<dyn StyleRetriever>) -> Result<()> {
        retriever.enable()?;
        let mut style = self.style.write().map_err(|_| Error::LockPoisoned)?;
        *style = Some(retriever);
        info!("Style retriever attached");
        Ok(())
    }

    pub fn detach_style_retriever(&self) -> Result<()> {
        let mut style = self.style.write().map_err(|_| Error::LockPoisoned)?;
        *style = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::open_in_memory(EngineConfig::default()).unwrap()
    }

    fn stage(n: i64) -> Stage {
        Stage::new(n).unwrap()
    }

    #[test]
    fn test_operations_require_active_project() {
        let engine = engine();
        assert!(matches!(engine.scene_list(), Err(Error::NoActiveProject)));
        assert!(matches!(
            engine.save_stage_output(stage(1), None, "x"),
            Err(Error::NoActiveProject)
        ));
    }

    #[test]
    fn test_init_defaults_and_duplicate() {
        let engine = engine();
        let meta = engine.init_project("The Long Night").unwrap();

        assert_eq!(meta.current_stage, Stage::FIRST);
        assert!(meta.completed_stages.is_empty());
        assert_eq!(meta.settings.target_word_count, 80_000);
        assert!(meta.settings.use_pov_mode);
        assert_eq!(engine.active_project().unwrap().as_deref(), Some("the_long_night"));

        let err = engine.init_project("the long night").unwrap_err();
        assert!(matches!(err, Error::ProjectExists(id) if id == "the_long_night"));
    }

    #[test]
    fn test_load_missing_project() {
        let engine = engine();
        let err = engine.load_project("Ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_save_stage_updates_completion() {
        let engine = engine();
        engine.init_project("Nova").unwrap();

        engine.save_stage_output(stage(3), Some("Characters"), "Ada, Bo").unwrap();
        engine.save_stage_output(stage(1), None, "A pilot falls.").unwrap();

        let meta = engine.metadata().unwrap();
        assert_eq!(meta.current_stage.number(), 3);
        assert_eq!(meta.completed_stages.len(), 2);

        let output = engine.stage_output(stage(1)).unwrap().unwrap();
        assert_eq!(output.content, "A pilot falls.");
        assert!(engine.stage_output(stage(2)).unwrap().is_none());

        let meta = engine.reopen_stage(stage(3)).unwrap();
        assert_eq!(meta.current_stage.number(), 1);
        assert!(engine.stage_output(stage(3)).unwrap().is_some());
    }

    #[test]
    fn test_character_upsert_merges() {
        let engine = engine();
        engine.init_project("Nova").unwrap();

        engine
            .upsert_character(&json!({"name": "Ada", "role": "protagonist"}))
            .unwrap();
        engine
            .upsert_character(&json!({"name": "ada", "eyeColor": "grey"}))
            .unwrap();

        let characters = engine.characters().unwrap();
        assert_eq!(characters.len(), 1);
        let ada = engine.character("ADA").unwrap().unwrap();
        assert!(ada.has_attribute("role"));
        assert!(ada.has_attribute("eye_color"));
        assert!(engine.character("Bo").unwrap().is_none());
    }

    #[test]
    fn test_scene_artifacts_require_scene() {
        let engine = engine();
        engine.init_project("Nova").unwrap();
        engine
            .replace_scene_list(&json!([{"sceneNumber": 1, "gist": "intro"}]))
            .unwrap();

        assert!(engine.save_scene_plan(2, "plan").unwrap_err().is_not_found());

        engine.save_scene_plan(1, "plan one").unwrap();
        engine.save_scene_draft(1, "draft one").unwrap();

        assert_eq!(engine.scene_plan(1).unwrap().unwrap().content, "plan one");
        assert_eq!(engine.scene_draft(1).unwrap().unwrap().content, "draft one");
        assert!(engine.scene_draft(2).unwrap().is_none());
    }

    #[test]
    fn test_settings_round_trip() {
        let engine = engine();
        engine.init_project("Nova").unwrap();

        engine.set_pov_mode(false).unwrap();
        assert!(!engine.pov_mode().unwrap());

        engine.set_target_word_count(60_000).unwrap();
        engine.set_genre(Some("  space opera ".to_string())).unwrap();
        let settings = engine.metadata().unwrap().settings;
        assert_eq!(settings.target_word_count, 60_000);
        assert_eq!(settings.genre.as_deref(), Some("space opera"));

        assert!(engine.set_target_word_count(0).unwrap_err().is_validation());
    }

    #[test]
    fn test_log_disaster() {
        let engine = engine();
        engine.init_project("Nova").unwrap();

        engine.log_disaster(2, "the ship is lost").unwrap();
        engine.log_disaster(1, "the mentor dies").unwrap();
        assert!(engine.log_disaster(5, "too many").unwrap_err().is_validation());

        let levels: Vec<u8> = engine
            .metadata()
            .unwrap()
            .disasters
            .iter()
            .map(|d| d.level)
            .collect();
        assert_eq!(levels, vec![1, 2]);
    }

    #[test]
    fn test_list_projects_most_recent_first() {
        let engine = engine();
        engine.init_project("Ember").unwrap();
        engine.init_project("Nova").unwrap();
        engine.save_stage_output(stage(1), None, "x").unwrap();

        let projects = engine.list_projects().unwrap();
        let ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["nova", "ember"]);
        assert_eq!(projects[0].completed_stages, vec![Stage::FIRST]);
    }

    #[test]
    fn test_list_projects_skips_unreadable_metadata() {
        let store = Arc::new(Database::open_in_memory().unwrap());
        store
            .write(
                "broken",
                RecordKind::Metadata,
                METADATA_KEY,
                &serde_json::json!({"title": 5}),
            )
            .unwrap();
        let engine = Engine::with_store(store, EngineConfig::default()).unwrap();
        engine.init_project("Nova").unwrap();

        let projects = engine.list_projects().unwrap();
        let ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["nova"]);
    }

    #[test]
    fn test_with_store_rejects_invalid_config() {
        let store = Arc::new(Database::open_in_memory().unwrap());
        let config = EngineConfig::default().with_words_per_scene(0);

        let err = Engine::with_store(store, config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
