//! Exercises prereq gating end-to-end through the tool surface: a catalog
//! with a real prerequisite chain, a user profile with partial history, and
//! the `can_take_course`/`course_query` tools consuming the same catalog.

use std::collections::HashMap;
use std::sync::Arc;

use advisor::catalog::{
    CatalogStore, Course, LecturerStore, RequirementNode, SectionRecord, UserCourseInfo, UserProfile,
};
use advisor::prereq;
use advisor::semantic::{Embedder, IndexedCourse, SearchHit, VectorStore};
use advisor::tools::{ToolContext, ToolRegistry};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

fn section(id: &str) -> SectionRecord {
    SectionRecord {
        section_id: id.into(),
        crn: "10000".into(),
        days: "MW".into(),
        times: "9:00 AM - 9:50 AM".into(),
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

fn course(title: &str, prereq_tree: Option<RequirementNode>) -> Course {
    let mut section_map = HashMap::new();
    section_map.insert("001".to_string(), section("001"));
    let mut term_map = HashMap::new();
    term_map.insert("202610".to_string(), section_map);
    Course {
        title: title.to_string(),
        description: format!("{title} description"),
        credits: Some(3.0),
        prereq_tree,
        coreq_tree: None,
        restrictions: vec![],
        sections: term_map,
    }
}

/// `CS 101 -> CS 201` (needs a B or better) `-> CS 301` (needs CS 201 plus
/// junior standing).
fn catalog_with_prereq_chain() -> CatalogStore {
    let catalog = CatalogStore::new();
    catalog.upsert("CS 101".to_string(), course("Intro to Computing", None));
    catalog.upsert(
        "CS 201".to_string(),
        course(
            "Data Structures",
            Some(RequirementNode::Course { course: "CS 101".to_string(), min_grade: Some("B".to_string()) }),
        ),
    );
    catalog.upsert(
        "CS 301".to_string(),
        course(
            "Algorithms",
            Some(RequirementNode::And {
                children: vec![
                    RequirementNode::Course { course: "CS 201".to_string(), min_grade: None },
                    RequirementNode::Standing { standing: "JUNIOR".to_string(), semesters_left: None },
                ],
            }),
        ),
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

fn context(catalog: CatalogStore, profile: UserProfile) -> ToolContext {
    ToolContext {
        catalog,
        lecturers: LecturerStore::new(),
        vector_store: Arc::new(EmptyVectorStore),
        cross_encoder: None,
        embedder: Arc::new(FixedEmbedder),
        profile: Arc::new(Mutex::new(profile)),
        term: "202610".to_string(),
    }
}

#[tokio::test]
async fn low_grade_blocks_the_next_course_in_the_chain() {
    let catalog = catalog_with_prereq_chain();
    let mut profile = UserProfile::default();
    profile.courses.insert("CS 101".to_string(), UserCourseInfo { name: "CS 101".to_string(), grade: "C".to_string() });

    let available = prereq::get_available_courses(&catalog, &profile, true, false, "202610");
    assert!(!available.contains(&"CS 101".to_string()), "already-completed course must not reappear");
    assert!(!available.contains(&"CS 201".to_string()), "a C in CS 101 must not satisfy the B-or-better requirement");

    let tools = ToolRegistry::new();
    let ctx = context(catalog, profile);
    let result = tools.call("can_take_course", serde_json::json!({ "course": "cs201" }), &ctx).await.unwrap();
    assert_ne!(result.response["response"], true);
}

#[tokio::test]
async fn sufficient_grade_unlocks_exactly_the_next_course() {
    let catalog = catalog_with_prereq_chain();
    let mut profile = UserProfile::default();
    profile.courses.insert("CS 101".to_string(), UserCourseInfo { name: "CS 101".to_string(), grade: "A".to_string() });

    let available = prereq::get_available_courses(&catalog, &profile, true, false, "202610");
    assert!(available.contains(&"CS 201".to_string()), "an A in CS 101 must satisfy the B-or-better requirement");
    assert!(
        !available.contains(&"CS 301".to_string()),
        "CS 301 also needs junior standing, which this profile lacks"
    );

    let tools = ToolRegistry::new();
    let ctx = context(catalog, profile);
    let result = tools.call("can_take_course", serde_json::json!({ "course": "CS 201" }), &ctx).await.unwrap();
    assert_eq!(result.response["response"], true);
}

#[tokio::test]
async fn standing_gate_blocks_the_final_course_until_met() {
    let catalog = catalog_with_prereq_chain();
    let mut profile = UserProfile::default();
    profile.courses.insert("CS 101".to_string(), UserCourseInfo { name: "CS 101".to_string(), grade: "A".to_string() });
    profile.courses.insert("CS 201".to_string(), UserCourseInfo { name: "CS 201".to_string(), grade: "A".to_string() });
    profile.standing = Some("SOPHOMORE".to_string());

    let tools = ToolRegistry::new();
    let ctx = context(catalog.clone(), profile.clone());
    let blocked = tools.call("can_take_course", serde_json::json!({ "course": "CS 301" }), &ctx).await.unwrap();
    assert_ne!(blocked.response["response"], true);

    profile.standing = Some("JUNIOR".to_string());
    let ctx = context(catalog, profile);
    let unblocked = tools.call("can_take_course", serde_json::json!({ "course": "CS 301" }), &ctx).await.unwrap();
    assert_eq!(unblocked.response["response"], true);
}
