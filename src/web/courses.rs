//! `GET /getcourses`: dumps the full catalog map (spec.md §6).

use axum::extract::State;
use axum::Json;

use crate::catalog::Course;
use crate::state::AppState;
use std::collections::HashMap;

pub async fn get_courses(State(state): State<AppState>) -> Json<HashMap<String, Course>> {
    Json(state.catalog.full_map())
}
