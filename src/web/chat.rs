//! `POST /chat`: streams NDJSON `{type:"text"|"schedule", content}` frames
//! (spec.md §4.7, §6).

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    pub query: String,
    pub term: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

fn is_valid_term(term: &str) -> bool {
    if term.len() != 6 || !term.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    matches!(&term[4..6], "10" | "50" | "90" | "95")
}

pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    if !is_valid_term(&request.term) {
        return ApiError::invalid_term(&request.term).into_response();
    }

    let history = state.sessions.load_history(&request.session_id).await;
    let profile = state.sessions.load_profile(&request.session_id).await;

    let (stream, mut final_rx) =
        state.orchestrator.clone().run_turn(history, profile, request.term, request.query, request.attachments);

    let sessions = state.sessions.clone();
    let session_id = request.session_id.clone();

    let body_stream = async_stream::stream! {
        let mut stream = Box::pin(stream);
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => match serde_json::to_string(&chunk) {
                    Ok(mut line) => {
                        line.push('\n');
                        yield Ok::<_, std::io::Error>(line.into_bytes());
                    }
                    Err(err) => error!(%err, "failed to serialize stream chunk"),
                },
                Err(err) => {
                    error!(%err, "llm orchestrator stream failed");
                    break;
                }
            }
        }
        drop(stream);

        if let Some((history, profile)) = final_rx.recv().await {
            if let Err(err) = sessions.save_history(&session_id, &history).await {
                warn!(session_id, %err, "failed to persist chat history");
            }
            if let Err(err) = sessions.save_profile(&session_id, &profile).await {
                warn!(session_id, %err, "failed to persist user profile");
            }
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .expect("building a static ndjson response cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_terms_accept_each_recognized_season_suffix() {
        assert!(is_valid_term("202610"));
        assert!(is_valid_term("202595"));
        assert!(is_valid_term("202590"));
        assert!(is_valid_term("202550"));
        assert!(!is_valid_term("202699"));
        assert!(!is_valid_term("abcdef"));
    }
}
