//! Cache coherence scenarios run against the full engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};
use snowflake_core::{
    Database, Engine, EngineConfig, Error, RecordKind, RecordStore, RecordWrite, Result, Scope,
    Stage,
};

fn engine() -> Engine {
    Engine::open_in_memory(EngineConfig::default()).unwrap()
}

fn gists(engine: &Engine) -> Vec<String> {
    engine
        .scene_list()
        .unwrap()
        .into_iter()
        .map(|s| s.gist)
        .collect()
}

/// Store that can be switched into failing every write.
struct FlakyStore {
    inner: Database,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: Database::open_in_memory().unwrap(),
            fail_writes: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

impl RecordStore for FlakyStore {
    fn read(&self, project_id: &str, kind: RecordKind, key: &str) -> Result<Option<Value>> {
        self.inner.read(project_id, kind, key)
    }

    fn read_collection(&self, project_id: &str, kind: RecordKind) -> Result<Vec<(String, Value)>> {
        self.inner.read_collection(project_id, kind)
    }

    fn write_batch(&self, project_id: &str, writes: &[RecordWrite]) -> Result<()> {
        self.check()?;
        self.inner.write_batch(project_id, writes)
    }

    fn replace_collection(
        &self,
        project_id: &str,
        kind: RecordKind,
        records: &[(String, Value)],
        writes: &[RecordWrite],
    ) -> Result<()> {
        self.check()?;
        self.inner.replace_collection(project_id, kind, records, writes)
    }

    fn list_project_ids(&self) -> Result<Vec<String>> {
        self.inner.list_project_ids()
    }
}

#[test]
fn nova_scene_list_hit_and_miss_sequence() {
    let engine = engine();
    engine.init_project("Nova").unwrap();

    engine
        .replace_scene_list(&json!([{"sceneNumber": 1, "gist": "intro"}]))
        .unwrap();

    engine.scene_list().unwrap();
    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses), (0, 1));

    engine.scene_list().unwrap();
    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.hit_rate_percent, 50.0);

    engine
        .replace_scene_list(&json!([
            {"sceneNumber": 1, "gist": "intro"},
            {"sceneNumber": 2, "gist": "inciting incident"}
        ]))
        .unwrap();
    assert!(!engine.is_cached(Scope::Scenes).unwrap());

    assert_eq!(gists(&engine), vec!["intro", "inciting incident"]);
    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses), (1, 2));
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.hit_rate_percent, 33.3);
}

#[test]
fn stage_output_second_read_is_a_hit() {
    let engine = engine();
    engine.init_project("Nova").unwrap();
    let stage = Stage::new(1).unwrap();
    engine.save_stage_output(stage, None, "A pilot falls.").unwrap();

    engine.stage_output(stage).unwrap();
    engine.stage_output(stage).unwrap();

    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.hit_rate_percent, 50.0);
}

#[test]
fn reads_after_writes_never_see_stale_content() {
    let engine = engine();
    engine.init_project("Nova").unwrap();
    let stage = Stage::new(4).unwrap();

    for round in 0..5 {
        let content = format!("synopsis v{round}");
        engine.save_stage_output(stage, None, &content).unwrap();
        assert_eq!(engine.stage_output(stage).unwrap().unwrap().content, content);
        assert_eq!(engine.stage_output(stage).unwrap().unwrap().content, content);

        let name = json!({"name": "Ada", "mood": format!("mood {round}")});
        engine.upsert_character(&name).unwrap();
        let ada = engine.character("Ada").unwrap().unwrap();
        assert_eq!(ada.attribute("mood"), Some(&json!(format!("mood {round}"))));

        assert!(engine.metadata().unwrap().is_completed(stage));
    }
}

#[test]
fn rejected_scene_list_leaves_previous_list_cached() {
    let engine = engine();
    engine.init_project("Nova").unwrap();
    engine
        .replace_scene_list(&json!([{"sceneNumber": 1, "gist": "intro"}]))
        .unwrap();
    engine.scene_list().unwrap();

    let err = engine
        .replace_scene_list(&json!([
            {"sceneNumber": 1, "gist": "a"},
            {"sceneNumber": 2, "gist": "b"},
            {"sceneNumber": 0, "gist": "c"}
        ]))
        .unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert_eq!(errors.iter().next().unwrap().index, Some(2));

    assert!(engine.is_cached(Scope::Scenes).unwrap());
    let hits_before = engine.cache_stats().hits;
    assert_eq!(gists(&engine), vec!["intro"]);
    assert_eq!(engine.cache_stats().hits, hits_before + 1);

    engine.clear_cache().unwrap();
    let misses_before = engine.cache_stats().misses;
    assert_eq!(gists(&engine), vec!["intro"]);
    assert_eq!(engine.cache_stats().misses, misses_before + 1);
}

#[test]
fn failed_store_write_changes_nothing() {
    let store = Arc::new(FlakyStore::new());
    let engine = Engine::with_store(store.clone(), EngineConfig::default()).unwrap();
    engine.init_project("Nova").unwrap();
    engine
        .replace_scene_list(&json!([{"sceneNumber": 1, "gist": "intro"}]))
        .unwrap();
    let stage = Stage::new(2).unwrap();
    engine.save_stage_output(stage, None, "before").unwrap();
    engine.stage_output(stage).unwrap();

    store.fail_writes.store(true, Ordering::SeqCst);

    let err = engine
        .replace_scene_list(&json!([{"sceneNumber": 9, "gist": "replacement"}]))
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(engine.save_stage_output(stage, None, "after").is_err());
    assert!(engine.upsert_character(&json!({"name": "Ada"})).is_err());

    store.fail_writes.store(false, Ordering::SeqCst);

    assert_eq!(gists(&engine), vec!["intro"]);
    assert_eq!(engine.stage_output(stage).unwrap().unwrap().content, "before");
    assert!(engine.characters().unwrap().is_empty());

    engine.clear_cache().unwrap();
    assert_eq!(gists(&engine), vec!["intro"]);
    assert_eq!(engine.stage_output(stage).unwrap().unwrap().content, "before");
}

#[test]
fn switching_projects_clears_cache_but_keeps_stats() {
    let engine = engine();
    engine.init_project("Ember").unwrap();
    engine.init_project("Nova").unwrap();
    engine
        .replace_scene_list(&json!([{"sceneNumber": 1, "gist": "nova intro"}]))
        .unwrap();
    engine.scene_list().unwrap();
    engine.scene_list().unwrap();
    assert!(engine.is_cached(Scope::Scenes).unwrap());

    engine.load_project("Ember").unwrap();
    assert!(engine.scene_list().unwrap().is_empty());

    engine.load_project("Nova").unwrap();
    assert!(!engine.is_cached(Scope::Scenes).unwrap());
    assert!(!engine.is_cached(Scope::Metadata).unwrap());

    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses), (1, 2));

    engine.reset_cache_stats();
    let stats = engine.cache_stats();
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.hit_rate_percent, 0.0);
}

#[test]
fn concurrent_readers_see_whole_lists() {
    let engine = engine();
    engine.init_project("Nova").unwrap();
    engine
        .replace_scene_list(&json!([{"sceneNumber": 1, "gist": "v0"}]))
        .unwrap();

    std::thread::scope(|s| {
        s.spawn(|| {
            for version in 1..=20u32 {
                let list: Vec<Value> = (1..=version)
                    .map(|n| json!({"sceneNumber": n, "gist": format!("v{version}")}))
                    .collect();
                engine.replace_scene_list(&Value::Array(list)).unwrap();
            }
        });

        for _ in 0..4 {
            s.spawn(|| {
                let mut last_seen = 0usize;
                for _ in 0..200 {
                    let scenes = engine.scene_list().unwrap();
                    let expected = format!("v{}", if scenes.len() == 1 { 0 } else { scenes.len() });
                    let consistent = scenes
                        .iter()
                        .all(|s| s.gist == expected || (scenes.len() == 1 && s.gist == "v1"));
                    assert!(consistent, "mixed list: {scenes:?}");
                    assert!(scenes.len() >= last_seen, "list went backwards");
                    last_seen = scenes.len();
                }
            });
        }
    });

    assert_eq!(engine.scene_list().unwrap().len(), 20);
}

#[test]
fn projects_survive_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::in_dir(dir.path());
    {
        let engine = Engine::open(config.clone()).unwrap();
        engine.init_project("Nova").unwrap();
        engine.save_stage_output(Stage::new(1).unwrap(), None, "x").unwrap();
    }

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.active_project().unwrap(), None);
    let meta = engine.load_project("nova").unwrap();
    assert_eq!(meta.title, "Nova");
    assert_eq!(meta.current_stage, Stage::FIRST);
    assert_eq!(engine.list_projects().unwrap().len(), 1);
}
