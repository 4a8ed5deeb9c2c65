//! Concrete `ChatProvider` backed by the Gemini REST API. The wire format
//! itself is the out-of-scope "LLM provider" boundary (spec.md §1); this is
//! the thin adapter translating our `ChatTurn` history and tool specs into
//! Gemini's `generateContent` request/response shapes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{ChatTurn, ChatTurnRole};

use super::{AssistantTurn, ChatProvider, ToolCall, ToolSpecDecl};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiChatProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiChatProvider {
    pub fn new(client: reqwest::Client, api_key: String, model: Option<String>) -> Self {
        Self { client, api_key, model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()) }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: SystemInstruction,
    contents: Vec<GeminiContent>,
    tools: Vec<ToolsWrapper>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<TextPartOut>,
}

#[derive(Serialize)]
struct TextPartOut {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolsWrapper {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionCallOut {
    name: String,
    args: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionResponseOut {
    name: String,
    response: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    FunctionCall { #[serde(rename = "functionCall")] function_call: GeminiFunctionCallOut },
    FunctionResponse { #[serde(rename = "functionResponse")] function_response: GeminiFunctionResponseOut },
    InlineData { #[serde(rename = "inlineData")] inline_data: GeminiInlineData },
}

/// Converts one turn of our session history into Gemini's `Content` shape.
/// A model turn with `function_call` set carries the JSON array this
/// orchestrator wrote in `run_turn` (`[{id, name, arguments}, ...]`); a model
/// turn with `function_response` set carries a single `{id, name, response}`
/// object.
fn content_for_turn(turn: &ChatTurn) -> GeminiContent {
    let role = match turn.role {
        ChatTurnRole::User => "user",
        ChatTurnRole::Model => "model",
    };

    let mut parts = Vec::new();

    if let Some(text) = &turn.text {
        parts.push(GeminiPart::Text { text: text.clone() });
    }

    if let Some(calls) = &turn.function_call {
        if let Some(array) = calls.as_array() {
            for call in array {
                let name = call.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let args = call.get("arguments").cloned().unwrap_or(Value::Null);
                parts.push(GeminiPart::FunctionCall { function_call: GeminiFunctionCallOut { name, args } });
            }
        }
    }

    if let Some(response) = &turn.function_response {
        let name = response.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let payload = response.get("response").cloned().unwrap_or(Value::Null);
        parts.push(GeminiPart::FunctionResponse { function_response: GeminiFunctionResponseOut { name, response: payload } });
    }

    GeminiContent { role: role.to_string(), parts }
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentIn>,
}

#[derive(Deserialize)]
struct ContentIn {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<ResponseFunctionCall>,
}

#[derive(Deserialize)]
struct ResponseFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[async_trait]
impl ChatProvider for GeminiChatProvider {
    async fn send_turn(
        &self,
        system_instructions: &str,
        history: &[ChatTurn],
        tool_specs: &[ToolSpecDecl],
        attachments: &[Vec<u8>],
        _on_text: &mut (dyn FnMut(String) + Send),
    ) -> Result<AssistantTurn> {
        let mut contents: Vec<GeminiContent> = history.iter().map(content_for_turn).collect();

        if let Some(last) = contents.last_mut() {
            for blob in attachments {
                last.parts.push(GeminiPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: "application/pdf".to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(blob),
                    },
                });
            }
        }

        let request = GenerateContentRequest {
            system_instruction: SystemInstruction { parts: vec![TextPartOut { text: system_instructions.to_string() }] },
            contents,
            tools: vec![ToolsWrapper {
                function_declarations: tool_specs
                    .iter()
                    .map(|spec| FunctionDeclaration { name: spec.name.clone(), description: spec.description.clone() })
                    .collect(),
            }],
        };

        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("gemini request failed")?
            .error_for_status()
            .context("gemini returned an error status")?;

        let parsed: GenerateContentResponse = response.json().await.context("failed to decode gemini response")?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for candidate in parsed.candidates {
            let Some(content) = candidate.content else { continue };
            for part in content.parts {
                if let Some(chunk) = part.text {
                    text.push_str(&chunk);
                }
                if let Some(call) = part.function_call {
                    tool_calls.push(ToolCall { id: nanoid::nanoid!(), name: call.name, arguments: call.args });
                }
            }
        }

        Ok(AssistantTurn { text, tool_calls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_for_turn_maps_user_text() {
        let turn = ChatTurn { role: ChatTurnRole::User, text: Some("hi".into()), function_call: None, function_response: None };
        let content = content_for_turn(&turn);
        assert_eq!(content.role, "user");
        assert_eq!(content.parts.len(), 1);
    }

    #[test]
    fn content_for_turn_expands_function_call_array() {
        let turn = ChatTurn {
            role: ChatTurnRole::Model,
            text: None,
            function_call: Some(json!([{ "id": "1", "name": "get_term", "arguments": {} }])),
            function_response: None,
        };
        let content = content_for_turn(&turn);
        assert_eq!(content.role, "model");
        assert_eq!(content.parts.len(), 1);
    }

    #[test]
    fn content_for_turn_maps_function_response() {
        let turn = ChatTurn {
            role: ChatTurnRole::Model,
            text: None,
            function_call: None,
            function_response: Some(json!({ "id": "1", "name": "get_term", "response": { "ok": true } })),
        };
        let content = content_for_turn(&turn);
        assert_eq!(content.parts.len(), 1);
    }
}
