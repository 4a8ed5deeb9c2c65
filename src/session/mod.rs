//! C5 Session Store: per-session chat history and prereq-check cache in
//! Redis, with best-effort reads (spec.md §4.5 — missing or malformed data
//! degrades to a fresh default rather than failing the request).

use anyhow::{Context, Result};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::UserProfile;

fn history_key(session_id: &str) -> String {
    format!("{session_id}:history")
}

fn prereqs_key(session_id: &str) -> String {
    format!("{session_id}:prereqs")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatTurnRole {
    User,
    Model,
}

/// A single turn of chat history. Only `text`, `function_call`, and
/// `function_response` survive serialization (spec.md §11): a provider's
/// internal `thought`/`thought_signature` fields are dropped on every
/// write so history stays replayable across provider versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatTurnRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct SessionStore {
    client: redis::Client,
}

impl SessionStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("failed to create redis client for session store")?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("failed to open redis connection for session store")
    }

    /// Best-effort read: any Redis error or malformed payload yields an
    /// empty history rather than propagating, since a fresh session is a
    /// valid outcome for the chat endpoint.
    pub async fn load_history(&self, session_id: &str) -> Vec<ChatTurn> {
        let result: Result<Option<String>> = async {
            let mut conn = self.connection().await?;
            let raw: Option<String> = conn.get(history_key(session_id)).await.context("redis GET history")?;
            Ok(raw)
        }
        .await;

        match result {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(session_id, %err, "failed to deserialize chat history, starting fresh");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(session_id, %err, "failed to load chat history, starting fresh");
                Vec::new()
            }
        }
    }

    /// Writes history exactly once per request, after the LLM turn
    /// completes (spec.md §4.5, §5).
    pub async fn save_history(&self, session_id: &str, history: &[ChatTurn]) -> Result<()> {
        let mut conn = self.connection().await?;
        let serialized = serde_json::to_string(history).context("serialize chat history")?;
        conn.set::<_, _, ()>(history_key(session_id), serialized)
            .await
            .context("redis SET history")?;
        Ok(())
    }

    pub async fn load_profile(&self, session_id: &str) -> UserProfile {
        let result: Result<Option<String>> = async {
            let mut conn = self.connection().await?;
            let raw: Option<String> = conn.get(prereqs_key(session_id)).await.context("redis GET prereqs")?;
            Ok(raw)
        }
        .await;

        match result {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(session_id, %err, "failed to deserialize user profile, using default");
                UserProfile::default()
            }),
            Ok(None) => UserProfile::default(),
            Err(err) => {
                warn!(session_id, %err, "failed to load user profile, using default");
                UserProfile::default()
            }
        }
    }

    pub async fn save_profile(&self, session_id: &str, profile: &UserProfile) -> Result<()> {
        let mut conn = self.connection().await?;
        let serialized = serde_json::to_string(profile).context("serialize user profile")?;
        conn.set::<_, _, ()>(prereqs_key(session_id), serialized)
            .await
            .context("redis SET prereqs")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_turn_drops_unknown_fields_on_roundtrip() {
        let turn = ChatTurn { role: ChatTurnRole::Model, text: Some("hi".into()), function_call: None, function_response: None };
        let serialized = serde_json::to_string(&turn).unwrap();
        assert!(!serialized.contains("thought"));
        let restored: ChatTurn = serde_json::from_str(&serialized).unwrap();
        assert_eq!(restored.text.as_deref(), Some("hi"));
    }

    #[test]
    fn history_key_and_prereqs_key_are_session_scoped() {
        assert_eq!(history_key("abc"), "abc:history");
        assert_eq!(prereqs_key("abc"), "abc:prereqs");
    }
}
