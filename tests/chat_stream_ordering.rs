//! Drives `Orchestrator::run_turn` with a scripted provider that calls
//! `make_schedule`, and asserts the NDJSON frame ordering the `/chat`
//! surface promises: zero or more text frames, then every schedule frame,
//! then zero or more text frames, then the stream ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use advisor::catalog::{CatalogStore, Course, LecturerStore, SectionRecord, UserProfile};
use advisor::llm::{AssistantTurn, ChatProvider, Orchestrator, StreamChunk, ToolCall, ToolSpecDecl};
use advisor::semantic::{Embedder, IndexedCourse, SearchHit, VectorStore};
use advisor::session::ChatTurn;
use advisor::tools::ToolRegistry;
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;

fn section(id: &str, days: &str, times: &str) -> SectionRecord {
    SectionRecord {
        section_id: id.into(),
        crn: "00000".into(),
        days: days.into(),
        times: times.into(),
        location: "TBD".into(),
        status: "Open".into(),
        max_seats: "30".into(),
        current_seats: "0".into(),
        instructor: "Staff".into(),
        delivery_mode: "Face to Face".into(),
        credits: "3".into(),
        info: "".into(),
        comments: "".into(),
    }
}

/// One course with three non-conflicting sections: `make_schedule` treats
/// each as its own schedule since only one is chosen per combination, so
/// enumeration yields exactly three.
fn catalog_with_three_sections() -> CatalogStore {
    let catalog = CatalogStore::new();
    let mut section_map = HashMap::new();
    section_map.insert("001".to_string(), section("001", "M", "9:00 AM - 9:50 AM"));
    section_map.insert("002".to_string(), section("002", "T", "10:00 AM - 10:50 AM"));
    section_map.insert("003".to_string(), section("003", "W", "11:00 AM - 11:50 AM"));
    let mut term_map = HashMap::new();
    term_map.insert("202610".to_string(), section_map);
    catalog.upsert(
        "CS 100".to_string(),
        Course {
            title: "Intro to Computing".into(),
            description: "desc".into(),
            credits: Some(3.0),
            prereq_tree: None,
            coreq_tree: None,
            restrictions: vec![],
            sections: term_map,
        },
    );
    catalog
}

struct EmptyVectorStore;

#[async_trait]
impl VectorStore for EmptyVectorStore {
    async fn upsert_batch(&self, _courses: &[IndexedCourse]) -> Result<()> {
        Ok(())
    }
    async fn existing_hash(&self, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }
    async fn search(&self, _query_embedding: &[f32], _fetch_k: u64, allowed_names: &[String]) -> Result<Vec<SearchHit>> {
        Ok(allowed_names.iter().map(|name| SearchHit { name: name.clone(), document: name.clone() }).collect())
    }
}

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; 4])
    }
}

/// Round 1: emits a greeting and calls `make_schedule`. Round 2: emits a
/// closing remark and no further tool calls.
struct ScriptedProvider {
    round: AtomicUsize,
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn send_turn(
        &self,
        _system_instructions: &str,
        _history: &[ChatTurn],
        _tool_specs: &[ToolSpecDecl],
        _attachments: &[Vec<u8>],
        on_text: &mut (dyn FnMut(String) + Send),
    ) -> Result<AssistantTurn> {
        let round = self.round.fetch_add(1, Ordering::SeqCst);
        if round == 0 {
            on_text("Let me build that schedule.".to_string());
            Ok(AssistantTurn {
                text: "Let me build that schedule.".to_string(),
                tool_calls: vec![ToolCall {
                    id: "call-1".into(),
                    name: "make_schedule".into(),
                    arguments: serde_json::json!({ "courses": ["CS 100"], "maxDays": 5 }),
                }],
            })
        } else {
            on_text("Here are your options.".to_string());
            Ok(AssistantTurn { text: "Here are your options.".to_string(), tool_calls: vec![] })
        }
    }
}

#[tokio::test]
async fn schedule_frames_are_grouped_between_text_frames() {
    let catalog = catalog_with_three_sections();
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(ScriptedProvider { round: AtomicUsize::new(0) }),
        Arc::new(ToolRegistry::new()),
        "You are a course advisor.".to_string(),
        catalog,
        LecturerStore::new(),
        Arc::new(EmptyVectorStore),
        None,
        Arc::new(FixedEmbedder),
    ));

    let (stream, mut final_rx) = orchestrator.run_turn(
        Vec::new(),
        UserProfile::default(),
        "202610".to_string(),
        "Build me a schedule for CS 100".to_string(),
        Vec::new(),
    );

    let chunks: Vec<StreamChunk> = stream.map(|item| item.expect("stream yielded an error")).collect().await;

    // Find the run of Schedule frames and assert nothing text-shaped is
    // interleaved inside it.
    let first_schedule = chunks.iter().position(|c| matches!(c, StreamChunk::Schedule { .. }));
    let last_schedule = chunks.iter().rposition(|c| matches!(c, StreamChunk::Schedule { .. }));
    let (first_schedule, last_schedule) = (
        first_schedule.expect("expected at least one schedule frame"),
        last_schedule.expect("expected at least one schedule frame"),
    );

    let schedule_run = &chunks[first_schedule..=last_schedule];
    assert!(
        schedule_run.iter().all(|c| matches!(c, StreamChunk::Schedule { .. })),
        "schedule frames must not be interrupted by text frames: {chunks:?}"
    );
    assert_eq!(schedule_run.len(), 3, "expected exactly 3 schedule frames, got {chunks:?}");

    assert!(
        chunks[..first_schedule].iter().all(|c| matches!(c, StreamChunk::Text { .. })),
        "only text frames may precede the schedule run"
    );
    assert!(
        chunks[last_schedule + 1..].iter().all(|c| matches!(c, StreamChunk::Text { .. })),
        "only text frames may follow the schedule run"
    );

    let (history, _profile) = final_rx.recv().await.expect("orchestrator must send final history once");
    assert!(history.len() >= 3, "history should contain the user turn, the tool-call turn, and the model's reply");
}
