//! `POST /getprofs`: maps requested instructor names to their lecturer
//! rating, or `null` when absent (spec.md §6).

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::catalog::LecturerRating;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GetProfsRequest {
    pub profs: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct GetProfsResponse(HashMap<String, Option<LecturerRating>>);

pub async fn get_profs(State(state): State<AppState>, Json(request): Json<GetProfsRequest>) -> Json<GetProfsResponse> {
    let response = request.profs.into_iter().map(|name| {
        let rating = state.lecturers.get(&name);
        (name, rating)
    }).collect();

    Json(GetProfsResponse(response))
}
