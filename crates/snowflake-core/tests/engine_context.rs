//! Context assembly against a live engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use snowflake_core::style::{
    ReferenceAdded, ReferenceSummary, StyleQuery, StyleRetriever, StyleSample,
};
use snowflake_core::{
    Artifact, Assembly, ContextRequest, Deficiency, Engine, EngineConfig, Error, Result, Stage,
};

fn stage(n: i64) -> Stage {
    Stage::new(n).unwrap()
}

fn engine() -> Engine {
    let engine = Engine::open_in_memory(EngineConfig::default()).unwrap();
    engine.init_project("Nova").unwrap();
    engine
}

/// Engine with one scene planned and its POV character on record.
fn drafting_engine(ada: serde_json::Value) -> Engine {
    let engine = engine();
    engine
        .replace_scene_list(&json!([
            {"sceneNumber": 1, "gist": "Ada lands on the ice moon", "povCharacter": "Ada"}
        ]))
        .unwrap();
    engine.save_scene_plan(1, "Goal: land. Conflict: storm.").unwrap();
    engine.upsert_character(&ada).unwrap();
    engine
}

fn deficiencies(assembly: Assembly) -> Vec<Deficiency> {
    match assembly {
        Assembly::Ready(bundle) => panic!("expected deficiency, got {bundle:?}"),
        Assembly::Deficient(deficiencies) => deficiencies,
    }
}

#[test]
fn stage_one_needs_nothing() {
    let engine = engine();
    let assembly = engine.assemble(ContextRequest::stage(stage(1))).unwrap();
    let bundle = assembly.bundle().unwrap();
    assert_eq!(bundle.project_title, "Nova");
    assert!(bundle.stage_outputs.is_empty());
}

#[test]
fn stage_three_takes_only_stage_two() {
    let engine = engine();
    engine.save_stage_output(stage(1), None, "One sentence.").unwrap();

    let missing = deficiencies(engine.assemble(ContextRequest::stage(stage(3))).unwrap());
    assert_eq!(
        missing,
        vec![Deficiency::Missing {
            artifact: Artifact::StageOutput(stage(2))
        }]
    );

    engine.save_stage_output(stage(2), None, "One paragraph.").unwrap();
    let assembly = engine.assemble(ContextRequest::stage(stage(3))).unwrap();
    let bundle = assembly.bundle().unwrap();
    let stages: Vec<u8> = bundle.stage_outputs.keys().map(|s| s.number()).collect();
    assert_eq!(stages, vec![2]);
    assert!(bundle.characters.is_empty());
}

#[test]
fn blank_upstream_output_is_incomplete() {
    let engine = engine();
    engine.save_stage_output(stage(1), None, "   ").unwrap();

    let found = deficiencies(engine.assemble(ContextRequest::stage(stage(2))).unwrap());
    assert_eq!(
        found,
        vec![Deficiency::Incomplete {
            artifact: Artifact::StageOutput(stage(1)),
            field: "content".to_string()
        }]
    );
}

#[test]
fn character_stages_need_characters() {
    let engine = engine();
    engine.save_stage_output(stage(3), None, "Ada, the pilot.").unwrap();

    let found = deficiencies(engine.assemble(ContextRequest::stage(stage(5))).unwrap());
    assert_eq!(
        found,
        vec![Deficiency::Missing {
            artifact: Artifact::Characters
        }]
    );

    engine.upsert_character(&json!({"name": "Ada"})).unwrap();
    let assembly = engine.assemble(ContextRequest::stage(stage(5))).unwrap();
    assert_eq!(assembly.bundle().unwrap().characters.len(), 1);
}

#[test]
fn scene_stages_require_a_scene_number() {
    let engine = engine();
    for n in [9, 10] {
        let err = engine.assemble(ContextRequest::stage(stage(n))).unwrap_err();
        assert!(matches!(err, Error::SceneRequired { stage } if stage == n as u8));
    }
}

#[test]
fn drafting_with_blank_eye_color_is_incomplete() {
    let engine = drafting_engine(json!({"name": "Ada", "role": "protagonist", "eyeColor": ""}));

    let found = deficiencies(engine.assemble(ContextRequest::scene(stage(10), 1)).unwrap());
    assert_eq!(
        found,
        vec![Deficiency::Incomplete {
            artifact: Artifact::Character("Ada".to_string()),
            field: "eyeColor".to_string()
        }]
    );
}

#[test]
fn drafting_without_pov_record_is_missing() {
    let engine = drafting_engine(json!({"name": "Bo", "role": "mentor"}));

    let found = deficiencies(engine.assemble(ContextRequest::scene(stage(10), 1)).unwrap());
    assert_eq!(found.len(), 1);
    assert!(found[0].is_missing());
    assert_eq!(found[0].artifact(), &Artifact::Character("Ada".to_string()));
}

#[test]
fn drafting_without_plan_is_missing() {
    let engine = engine();
    engine
        .replace_scene_list(&json!([{"sceneNumber": 2, "gist": "x", "povCharacter": "Ada"}]))
        .unwrap();
    engine
        .upsert_character(&json!({"name": "Ada", "role": "protagonist", "eye_color": "grey"}))
        .unwrap();

    let found = deficiencies(engine.assemble(ContextRequest::scene(stage(10), 2)).unwrap());
    assert_eq!(
        found,
        vec![Deficiency::Missing {
            artifact: Artifact::ScenePlan(2)
        }]
    );

    let found = deficiencies(engine.assemble(ContextRequest::scene(stage(10), 7)).unwrap());
    assert_eq!(
        found,
        vec![Deficiency::Missing {
            artifact: Artifact::Scene(7)
        }]
    );
}

#[test]
fn complete_drafting_context() {
    let engine = drafting_engine(json!({"name": "Ada", "role": "protagonist", "eye_color": "grey"}));

    let assembly = engine.assemble(ContextRequest::scene(stage(10), 1)).unwrap();
    let bundle = assembly.bundle().unwrap();
    assert_eq!(bundle.scene.as_ref().unwrap().scene_number, 1);
    assert_eq!(bundle.pov_character.as_ref().unwrap().name, "Ada");
    assert!(bundle.scene_plan.as_ref().unwrap().content.starts_with("Goal"));
    assert!(bundle.style_samples.is_empty());
}

#[test]
fn pov_checks_skipped_when_pov_mode_off() {
    let engine = engine();
    engine
        .replace_scene_list(&json!([{"sceneNumber": 1, "gist": "ensemble scene"}]))
        .unwrap();

    let found = deficiencies(engine.assemble(ContextRequest::scene(stage(9), 1)).unwrap());
    assert_eq!(
        found,
        vec![Deficiency::Incomplete {
            artifact: Artifact::Scene(1),
            field: "povCharacter".to_string()
        }]
    );

    engine.set_pov_mode(false).unwrap();
    assert!(engine.assemble(ContextRequest::scene(stage(9), 1)).unwrap().is_ready());
}

#[test]
fn assembly_sees_latest_write() {
    let engine = engine();
    engine.save_stage_output(stage(2), None, "first").unwrap();
    let first = engine.assemble(ContextRequest::stage(stage(4))).unwrap();
    assert_eq!(first.bundle().unwrap().stage_outputs[&stage(2)].content, "first");

    engine.save_stage_output(stage(2), None, "second").unwrap();
    let second = engine.assemble(ContextRequest::stage(stage(4))).unwrap();
    assert_eq!(second.bundle().unwrap().stage_outputs[&stage(2)].content, "second");
}

struct CannedRetriever {
    fail: bool,
    calls: AtomicUsize,
}

impl StyleRetriever for CannedRetriever {
    fn add_reference(&self, _title: &str, _content: &str, _author: Option<&str>) -> Result<ReferenceAdded> {
        Ok(ReferenceAdded {
            id: "ref_1".to_string(),
            chunks_added: 1,
        })
    }

    fn list_references(&self) -> Result<Vec<ReferenceSummary>> {
        Ok(Vec::new())
    }

    fn remove_reference(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    fn style_context_for_scene(&self, query: &StyleQuery<'_>) -> Result<Vec<StyleSample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::style_retriever("index unavailable"));
        }
        Ok((0..query.sample_count)
            .map(|i| StyleSample {
                text: format!("sample {i} for {}", query.description),
                source_title: "Reference".to_string(),
                similarity_score: 0.9,
            })
            .collect())
    }
}

#[test]
fn style_samples_only_for_drafting() {
    let engine = drafting_engine(json!({"name": "Ada", "role": "protagonist", "eyeColor": "grey"}));
    let retriever = Arc::new(CannedRetriever {
        fail: false,
        calls: AtomicUsize::new(0),
    });
    engine.attach_style_retriever(retriever.clone()).unwrap();

    engine.assemble(ContextRequest::scene(stage(9), 1)).unwrap();
    assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);

    let assembly = engine.assemble(ContextRequest::scene(stage(10), 1)).unwrap();
    let samples = &assembly.bundle().unwrap().style_samples;
    assert_eq!(samples.len(), 3);
    assert!(samples[0].text.contains("ice moon"));

    engine.detach_style_retriever().unwrap();
    let assembly = engine.assemble(ContextRequest::scene(stage(10), 1)).unwrap();
    assert!(assembly.bundle().unwrap().style_samples.is_empty());
}

#[test]
fn failing_retriever_does_not_fail_assembly() {
    let engine = drafting_engine(json!({"name": "Ada", "role": "protagonist", "eyeColor": "grey"}));
    engine
        .attach_style_retriever(Arc::new(CannedRetriever {
            fail: true,
            calls: AtomicUsize::new(0),
        }))
        .unwrap();

    let assembly = engine.assemble(ContextRequest::scene(stage(10), 1)).unwrap();
    assert!(assembly.bundle().unwrap().style_samples.is_empty());
}
