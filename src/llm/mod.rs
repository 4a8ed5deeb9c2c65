//! C7 LLM Orchestrator: the streaming tool-calling loop that drives a
//! `/chat` turn. Adapts the message/tool-call envelope shapes an LLM
//! provider's chat-completions API exposes, generalized behind a thin
//! `GeminiClient` so the loop itself never depends on the wire format.

use std::io::Read as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_stream::try_stream;
use base64::Engine;
use flate2::read::GzDecoder;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::catalog::UserProfile;
use crate::session::{ChatTurn, ChatTurnRole};
use crate::tools::{FunctionResult, ToolContext, ToolRegistry};

pub mod gemini;
pub use gemini::GeminiChatProvider;

/// One frame of the NDJSON stream the HTTP surface forwards verbatim
/// (spec.md §4.7, §6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamChunk {
    Text { content: String },
    Schedule { content: Value },
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One assistant turn as returned by a provider round-trip: zero or more
/// text deltas already flushed to the stream, plus any tool calls found in
/// the final turn.
#[derive(Debug, Default)]
pub struct AssistantTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// The provider boundary (spec.md §1: "the LLM provider wire protocol" is
/// out of scope). A concrete implementation streams text deltas through
/// `on_text` as they arrive and returns the turn's aggregated tool calls.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    async fn send_turn(
        &self,
        system_instructions: &str,
        history: &[ChatTurn],
        tool_specs: &[ToolSpecDecl],
        attachments: &[Vec<u8>],
        on_text: &mut (dyn FnMut(String) + Send),
    ) -> Result<AssistantTurn>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpecDecl {
    pub name: String,
    pub description: String,
}

pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    tools: Arc<ToolRegistry>,
    prompt_template: String,
    catalog: crate::catalog::CatalogStore,
    lecturers: crate::catalog::LecturerStore,
    vector_store: Arc<dyn crate::semantic::VectorStore>,
    cross_encoder: Option<Arc<dyn crate::semantic::CrossEncoder>>,
    embedder: Arc<dyn crate::semantic::Embedder>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        prompt_template: String,
        catalog: crate::catalog::CatalogStore,
        lecturers: crate::catalog::LecturerStore,
        vector_store: Arc<dyn crate::semantic::VectorStore>,
        cross_encoder: Option<Arc<dyn crate::semantic::CrossEncoder>>,
        embedder: Arc<dyn crate::semantic::Embedder>,
    ) -> Self {
        Self { provider, tools, prompt_template, catalog, lecturers, vector_store, cross_encoder, embedder }
    }

    fn system_instructions(&self, profile: &UserProfile) -> Result<String> {
        let profile_json = serde_json::to_string_pretty(profile).context("serialize profile for system prompt")?;
        Ok(format!("{}\n\nUser profile:\n{}", self.prompt_template, profile_json))
    }

    /// Drives one `/chat` turn to completion, returning the updated history
    /// and profile for the caller to persist (spec.md §4.5: exactly once,
    /// after everything below has settled).
    pub fn run_turn(
        self: Arc<Self>,
        mut history: Vec<ChatTurn>,
        profile: UserProfile,
        term: String,
        query: String,
        attachments: Vec<String>,
    ) -> (impl Stream<Item = Result<StreamChunk>>, mpsc::Receiver<(Vec<ChatTurn>, UserProfile)>) {
        let (final_tx, final_rx) = mpsc::channel(1);

        let tool_specs: Vec<ToolSpecDecl> = self
            .tools
            .names()
            .into_iter()
            .map(|name| ToolSpecDecl { name: name.to_string(), description: String::new() })
            .collect();

        let stream = try_stream! {
            let profile = profile;
            let mut decoded_attachments = Vec::with_capacity(attachments.len());
            for blob in &attachments {
                match decode_gzip_base64_pdf(blob) {
                    Ok(bytes) => decoded_attachments.push(bytes),
                    Err(err) => warn!(%err, "failed to decode attachment, skipping"),
                }
            }

            history.push(ChatTurn { role: ChatTurnRole::User, text: Some(query.clone()), function_call: None, function_response: None });

            let profile = Arc::new(tokio::sync::Mutex::new(profile));
            let system_instructions = self.system_instructions(&*profile.lock().await)?;
            let mut is_first_round = true;

            loop {
                let (schedule_tx, mut schedule_rx) = mpsc::channel::<Value>(16);
                let mut pending_text = String::new();
                let round_attachments: &[Vec<u8>] = if is_first_round { &decoded_attachments } else { &[] };
                is_first_round = false;

                let turn = {
                    let mut on_text = |delta: String| {
                        pending_text.push_str(&delta);
                    };
                    self.provider
                        .send_turn(&system_instructions, &history, &tool_specs, round_attachments, &mut on_text)
                        .await?
                };

                if !turn.text.is_empty() {
                    yield StreamChunk::Text { content: turn.text.clone() };
                } else if !pending_text.is_empty() {
                    yield StreamChunk::Text { content: pending_text.clone() };
                }

                if turn.tool_calls.is_empty() {
                    history.push(ChatTurn {
                        role: ChatTurnRole::Model,
                        text: Some(if turn.text.is_empty() { pending_text } else { turn.text }),
                        function_call: None,
                        function_response: None,
                    });
                    break;
                }

                history.push(ChatTurn {
                    role: ChatTurnRole::Model,
                    text: None,
                    function_call: Some(serde_json::json!(turn.tool_calls.iter().map(|c| serde_json::json!({
                        "id": c.id,
                        "name": c.name,
                        "arguments": c.arguments,
                    })).collect::<Vec<_>>())),
                    function_response: None,
                });

                let ctx = ToolContext {
                    catalog: self.catalog.clone(),
                    lecturers: self.lecturers.clone(),
                    vector_store: self.vector_store.clone(),
                    cross_encoder: self.cross_encoder.clone(),
                    profile: profile.clone(),
                    term: term.clone(),
                    embedder: self.embedder.clone(),
                };

                let mut responses = Vec::with_capacity(turn.tool_calls.len());
                for call in &turn.tool_calls {
                    let args = unwrap_args_envelope(call.arguments.clone());

                    if call.name == "make_schedule" {
                        let schedule_tx = schedule_tx.clone();
                        let result = run_make_schedule_with_draining(&self.tools, args, &ctx, schedule_tx).await;
                        while let Ok(schedule) = schedule_rx.try_recv() {
                            yield StreamChunk::Schedule { content: schedule };
                        }
                        responses.push((call.id.clone(), call.name.clone(), result));
                    } else {
                        let result = self.tools.call(&call.name, args, &ctx).await;
                        responses.push((call.id.clone(), call.name.clone(), result));
                    }
                }

                drop(schedule_tx);
                while let Some(schedule) = schedule_rx.recv().await {
                    yield StreamChunk::Schedule { content: schedule };
                }

                for (id, name, result) in responses {
                    let payload = match result {
                        Ok(function_result) => serde_json::to_value(&function_result)?,
                        Err(err) => serde_json::json!({ "error": err.to_string() }),
                    };
                    history.push(ChatTurn {
                        role: ChatTurnRole::Model,
                        text: None,
                        function_call: None,
                        function_response: Some(serde_json::json!({ "id": id, "name": name, "response": payload })),
                    });
                }
            }

            let final_profile = Arc::try_unwrap(profile).map(|m| m.into_inner()).unwrap_or_default();
            let _ = final_tx.send((history, final_profile)).await;
        };

        (stream, final_rx)
    }
}

async fn run_make_schedule_with_draining(
    tools: &ToolRegistry,
    args: Value,
    ctx: &ToolContext,
    schedule_tx: mpsc::Sender<Value>,
) -> Result<FunctionResult> {
    let result = tools.call("make_schedule", args, ctx).await?;
    if let Some(schedules) = result.response.get("schedules").and_then(Value::as_array) {
        for schedule in schedules {
            let _ = schedule_tx.send(schedule.clone()).await;
        }
    }
    Ok(result)
}

/// Unwraps a single `{"args": {...}}` envelope some providers emit
/// (spec.md §4.7 step 3b, §9).
fn unwrap_args_envelope(value: Value) -> Value {
    if let Value::Object(ref map) = value {
        if map.len() == 1 {
            if let Some(inner) = map.get("args") {
                return inner.clone();
            }
        }
    }
    value
}

fn decode_gzip_base64_pdf(blob: &str) -> Result<Vec<u8>> {
    let gzipped = base64::engine::general_purpose::STANDARD.decode(blob).context("invalid base64 attachment")?;
    let mut decoder = GzDecoder::new(gzipped.as_slice());
    let mut pdf_bytes = Vec::new();
    decoder.read_to_end(&mut pdf_bytes).context("invalid gzip attachment")?;
    Ok(pdf_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_args_envelope_strips_single_args_key() {
        let wrapped = serde_json::json!({ "args": { "query": "intro" } });
        let unwrapped = unwrap_args_envelope(wrapped);
        assert_eq!(unwrapped, serde_json::json!({ "query": "intro" }));
    }

    #[test]
    fn unwrap_args_envelope_passes_through_plain_object() {
        let plain = serde_json::json!({ "query": "intro" });
        assert_eq!(unwrap_args_envelope(plain.clone()), plain);
    }

    #[test]
    fn decode_gzip_base64_pdf_roundtrips() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"%PDF-1.4 fake").unwrap();
        let gzipped = encoder.finish().unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(gzipped);

        let decoded = decode_gzip_base64_pdf(&encoded).unwrap();
        assert_eq!(decoded, b"%PDF-1.4 fake");
    }
}
