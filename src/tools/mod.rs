//! C6 Tool Surface: the fixed set of domain tools the LLM orchestrator can
//! call, each wrapped in a `FunctionResult` envelope (spec.md §11) so a
//! model sees both a structured `response` and a natural-language
//! `message_to_ai` summary regardless of which tool ran.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::catalog::{CatalogStore, LecturerStore, UserCourseInfo, UserProfile};
use crate::prereq;
use crate::schedule::{self, MakeScheduleRequest};
use crate::semantic::{self, CrossEncoder, Embedder, VectorStore};

/// Uniform tool-response envelope (spec.md §11): `response` is the
/// structured payload a UI can render, `message_to_ai` is the plain-text
/// summary fed back into the model's next turn.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionResult {
    pub method: String,
    pub response: Value,
    pub message_to_ai: String,
}

impl FunctionResult {
    fn new(method: &str, response: Value, message_to_ai: impl Into<String>) -> Self {
        Self { method: method.to_string(), response, message_to_ai: message_to_ai.into() }
    }
}

/// Shared collaborators every tool needs: the catalog, ratings, retrieval
/// backends, the session's mutable profile, and the request's term. Tools
/// never own a process-global profile (spec.md §9).
#[derive(Clone)]
pub struct ToolContext {
    pub catalog: CatalogStore,
    pub lecturers: LecturerStore,
    pub vector_store: Arc<dyn VectorStore>,
    pub cross_encoder: Option<Arc<dyn CrossEncoder>>,
    pub embedder: Arc<dyn Embedder>,
    pub profile: Arc<Mutex<UserProfile>>,
    pub term: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<FunctionResult>;
}

pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut tools: HashMap<&'static str, Box<dyn Tool>> = HashMap::new();
        for tool in default_tools() {
            tools.insert(tool.name(), tool);
        }
        Self { tools }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub async fn call(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<FunctionResult> {
        let tool = self.tools.get(name).with_context(|| format!("unknown tool {name}"))?;
        tool.call(args, ctx).await
    }
}

fn default_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(CourseQueryTool),
        Box::new(UpdateUserProfileTool),
        Box::new(GetCourseDescriptionTool),
        Box::new(CanTakeCourseTool),
        Box::new(MakeScheduleTool),
        Box::new(GetTermTool),
    ]
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseQueryArgs {
    query: String,
    #[serde(default = "default_top_n")]
    top_n: usize,
    #[serde(default = "default_true")]
    only_prereqs_fulfilled: bool,
    #[serde(default = "default_true")]
    only_current_semester: bool,
}

fn default_top_n() -> usize {
    20
}

fn default_true() -> bool {
    true
}

struct CourseQueryTool;

#[async_trait]
impl Tool for CourseQueryTool {
    fn name(&self) -> &'static str {
        "course_query"
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<FunctionResult> {
        let args: CourseQueryArgs = serde_json::from_value(args).context("invalid course_query arguments")?;
        let top_n = args.top_n.clamp(1, 100);

        let profile = ctx.profile.lock().await.clone();
        let available = prereq::get_available_courses(
            &ctx.catalog,
            &profile,
            args.only_prereqs_fulfilled,
            args.only_current_semester,
            &ctx.term,
        );

        let embedding = ctx.embedder.embed(&args.query).await?;
        let ranked = semantic::query(
            ctx.vector_store.as_ref(),
            ctx.cross_encoder.as_deref(),
            &embedding,
            &args.query,
            &available,
            top_n,
        )
        .await?;

        let message = format!("Found {} course(s) matching \"{}\".", ranked.len(), args.query);
        let response = serde_json::json!({
            "search_result": ranked,
            "message_to_relay_to_user": message,
        });
        Ok(FunctionResult::new("course_query", response, message))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserProfileArgs {
    #[serde(default)]
    courses: Vec<UserCourseInfo>,
    #[serde(default)]
    equivalents: Vec<String>,
    #[serde(default)]
    standing: Option<String>,
    #[serde(default)]
    semesters_left: Option<i32>,
    #[serde(default)]
    honors: Option<bool>,
    #[serde(default)]
    to_remove: Option<RemoveFromUserProfile>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RemoveFromUserProfile {
    #[serde(default)]
    courses: Vec<String>,
    #[serde(default)]
    equivalents: Vec<String>,
}

struct UpdateUserProfileTool;

#[async_trait]
impl Tool for UpdateUserProfileTool {
    fn name(&self) -> &'static str {
        "update_user_profile"
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<FunctionResult> {
        let args: UpdateUserProfileArgs = serde_json::from_value(args).context("invalid update_user_profile arguments")?;

        let mut profile = ctx.profile.lock().await;
        profile.new_user = false;

        for course in args.courses {
            profile.courses.insert(course.name.clone(), course);
        }
        for equivalent in args.equivalents {
            if !profile.equivalents.contains(&equivalent) {
                profile.equivalents.push(equivalent);
            }
        }
        if let Some(standing) = args.standing {
            profile.standing = Some(standing);
        }
        if let Some(semesters_left) = args.semesters_left {
            profile.semesters_left = Some(semesters_left);
        }
        if let Some(honors) = args.honors {
            profile.honors = honors;
        }

        if let Some(to_remove) = args.to_remove {
            for course in to_remove.courses {
                profile.courses.remove(&course);
            }
            profile.equivalents.retain(|e| !to_remove.equivalents.contains(e));
        }

        let response = serde_json::to_value(&*profile)?;
        Ok(FunctionResult::new("update_user_profile", response, "Profile updated."))
    }
}

#[derive(Deserialize)]
struct SingleCourseArgs {
    course: String,
}

struct GetCourseDescriptionTool;

#[async_trait]
impl Tool for GetCourseDescriptionTool {
    fn name(&self) -> &'static str {
        "get_course_description"
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<FunctionResult> {
        let args: SingleCourseArgs = serde_json::from_value(args).context("invalid get_course_description arguments")?;
        let name = ctx.catalog.normalize(&args.course).map_err(|err| anyhow::anyhow!(err.error_message))?;
        let course = ctx.catalog.get(&name).with_context(|| format!("no catalog entry for {name}"))?;

        let response = serde_json::json!({
            "course": name,
            "title": course.title,
            "description": course.description,
            "credits": course.credits,
        });
        Ok(FunctionResult::new("get_course_description", response, format!("Described {name}.")))
    }
}

struct CanTakeCourseTool;

#[async_trait]
impl Tool for CanTakeCourseTool {
    fn name(&self) -> &'static str {
        "can_take_course"
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<FunctionResult> {
        let args: SingleCourseArgs = serde_json::from_value(args).context("invalid can_take_course arguments")?;
        let name = ctx.catalog.normalize(&args.course).map_err(|err| anyhow::anyhow!(err.error_message))?;
        let course = ctx.catalog.get(&name).with_context(|| format!("no catalog entry for {name}"))?;

        let profile = ctx.profile.lock().await.clone();
        let result = prereq::evaluate(course.prereq_tree.as_ref(), &profile);

        let (response, message_to_ai) = match result {
            Ok(()) => (serde_json::json!({ "response": true }), "Prerequisites satisfied.".to_string()),
            Err(explanation) => {
                (serde_json::json!({ "response": explanation.clone() }), explanation)
            }
        };

        Ok(FunctionResult::new("can_take_course", response, message_to_ai))
    }
}

struct MakeScheduleTool;

#[async_trait]
impl Tool for MakeScheduleTool {
    fn name(&self) -> &'static str {
        "make_schedule"
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<FunctionResult> {
        let request: MakeScheduleRequest = serde_json::from_value(args).context("invalid make_schedule arguments")?;
        let (schedules, errors) = schedule::enumerate(&ctx.catalog, &ctx.lecturers, &ctx.term, &request);

        let response = serde_json::json!({ "schedules": schedules, "errors": errors });
        let message = if schedules.is_empty() {
            "No valid schedules could be built with the given constraints.".to_string()
        } else {
            format!("Built {} schedule(s).", schedules.len())
        };
        Ok(FunctionResult::new("make_schedule", response, message))
    }
}

struct GetTermTool;

#[async_trait]
impl Tool for GetTermTool {
    fn name(&self) -> &'static str {
        "get_term"
    }

    async fn call(&self, _args: Value, ctx: &ToolContext) -> Result<FunctionResult> {
        let readable = readable_term(&ctx.term);
        let response = serde_json::json!(readable);
        Ok(FunctionResult::new("get_term", response, format!("The active term is {readable}.")))
    }
}

/// Translates a six-digit Banner term code into `"<YYYY> <season>"`
/// (GLOSSARY: last two digits encode season — `10` Spring, `50` Summer,
/// `90` Fall, `95` Winter).
fn readable_term(term: &str) -> String {
    let (year, suffix) = term.split_at(term.len().saturating_sub(2));
    let season = match suffix {
        "10" => "Spring",
        "50" => "Summer",
        "90" => "Fall",
        "95" => "Winter",
        _ => suffix,
    };
    format!("{year} {season}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{IndexedCourse, SearchHit};
    use async_trait::async_trait;

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
            Ok(allowed_names
                .iter()
                .map(|name| SearchHit { name: name.clone(), document: name.clone() })
                .collect())
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl crate::semantic::Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 8])
        }
    }

    fn test_context(catalog: CatalogStore, profile: UserProfile) -> ToolContext {
        ToolContext {
            catalog,
            lecturers: LecturerStore::new(),
            vector_store: Arc::new(EmptyVectorStore),
            cross_encoder: None,
            embedder: Arc::new(FixedEmbedder),
            profile: Arc::new(Mutex::new(profile)),
            term: "202610".into(),
        }
    }

    #[tokio::test]
    async fn get_term_returns_configured_term() {
        let ctx = test_context(CatalogStore::new(), UserProfile::default());
        let tool = GetTermTool;
        let result = tool.call(serde_json::json!({}), &ctx).await.unwrap();
        assert_eq!(result.response, serde_json::json!("2026 Spring"));
    }

    #[tokio::test]
    async fn update_user_profile_merges_courses() {
        let ctx = test_context(CatalogStore::new(), UserProfile::default());
        let tool = UpdateUserProfileTool;
        let args = serde_json::json!({ "courses": [{ "name": "CS 101", "grade": "A" }] });
        tool.call(args, &ctx).await.unwrap();
        let profile = ctx.profile.lock().await;
        assert_eq!(profile.courses.get("CS 101").unwrap().grade, "A");
    }

    #[tokio::test]
    async fn update_user_profile_removes_listed_courses() {
        let mut profile = UserProfile::default();
        profile.courses.insert("CS 101".into(), UserCourseInfo { name: "CS 101".into(), grade: "A".into() });
        let ctx = test_context(CatalogStore::new(), profile);

        let tool = UpdateUserProfileTool;
        let args = serde_json::json!({ "toRemove": { "courses": ["CS 101"] } });
        tool.call(args, &ctx).await.unwrap();
        assert!(ctx.profile.lock().await.courses.is_empty());
    }
}
