//! Shared application state handed to every axum handler.

use std::sync::Arc;

use crate::catalog::{CatalogStore, LecturerStore};
use crate::config::Config;
use crate::llm::Orchestrator;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: CatalogStore,
    pub lecturers: LecturerStore,
    pub sessions: SessionStore,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        catalog: CatalogStore,
        lecturers: LecturerStore,
        sessions: SessionStore,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self { config, catalog, lecturers, sessions, orchestrator }
    }
}
