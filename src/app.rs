//! Application bootstrap: loads configuration, wires every collaborator
//! (catalog, sessions, semantic index, LLM orchestrator) and registers the
//! background services.

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::catalog::{CatalogStore, Course, LecturerRating, LecturerStore};
use crate::cli::ServiceName;
use crate::config::Config;
use crate::llm::{GeminiChatProvider, Orchestrator};
use crate::scraper::course::{CourseScraper, GeminiRequirementDeriver};
use crate::scraper::lecturer::{HttpRatingProxy, LecturerScraper};
use crate::semantic::{HttpCrossEncoder, HttpEmbedder, QdrantVectorStore};
use crate::services::manager::ServiceManager;
use crate::services::scraper::ScraperService;
use crate::services::web::WebService;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::tools::ToolRegistry;

pub struct App {
    config: Arc<Config>,
    state: AppState,
    catalog: CatalogStore,
    lecturers: LecturerStore,
    service_manager: ServiceManager,
}

impl App {
    pub async fn new() -> anyhow::Result<Self> {
        let config = Arc::new(Config::load().context("failed to load config")?);

        let catalog = load_catalog(&config.course_data_file).await;
        let lecturers = load_lecturers(&config.lecturer_data_file).await;
        info!(courses = catalog.len(), "catalog loaded");

        let sessions = SessionStore::new(&config.redis_url).context("failed to create session store")?;

        let http = reqwest::Client::new();

        let vector_store: Arc<dyn crate::semantic::VectorStore> =
            Arc::new(QdrantVectorStore::connect(&config.qdrant_url).context("failed to connect to qdrant")?);
        let cross_encoder: Option<Arc<dyn crate::semantic::CrossEncoder>> = config
            .reranker_url
            .clone()
            .map(|url| Arc::new(HttpCrossEncoder::new(http.clone(), url)) as Arc<dyn crate::semantic::CrossEncoder>);
        let embedder: Arc<dyn crate::semantic::Embedder> =
            Arc::new(HttpEmbedder::new(http.clone(), config.embedder_url.clone()));

        let prompt_template = tokio::fs::read_to_string(&config.prompt_file)
            .await
            .with_context(|| format!("failed to read prompt file {}", config.prompt_file.display()))?;

        let provider = Arc::new(GeminiChatProvider::new(http.clone(), config.gemini_api_key.clone(), None));
        let tools = Arc::new(ToolRegistry::new());

        let orchestrator = Arc::new(Orchestrator::new(
            provider,
            tools,
            prompt_template,
            catalog.clone(),
            lecturers.clone(),
            vector_store,
            cross_encoder,
            embedder,
        ));

        let state = AppState::new(config.clone(), catalog.clone(), lecturers.clone(), sessions, orchestrator);

        Ok(Self { config, state, catalog, lecturers, service_manager: ServiceManager::new() })
    }

    pub fn setup_services(&mut self, services: &[ServiceName]) -> anyhow::Result<()> {
        if services.contains(&ServiceName::Web) {
            let web_service = Box::new(WebService::new(self.config.port, self.state.clone()));
            self.service_manager.register_service(web_service);
        }

        if services.contains(&ServiceName::Scraper) {
            let http = reqwest::Client::new();
            let description_prompt = std::fs::read_to_string(&self.config.description_prompt_file).unwrap_or_else(|err| {
                warn!(%err, path = %self.config.description_prompt_file.display(), "missing description prompt file, using an empty prompt");
                String::new()
            });
            let deriver = Arc::new(GeminiRequirementDeriver::new(
                http.clone(),
                self.config.gemini_api_key.clone(),
                description_prompt,
            ));
            let course_scraper = Arc::new(
                CourseScraper::new(
                    &self.config.redis_url,
                    self.config.banner_base_url.clone(),
                    self.catalog.clone(),
                    Some(deriver),
                )
                .context("failed to build course scraper")?,
            );

            let rating_proxy = Arc::new(
                HttpRatingProxy::new(self.config.rating_proxy_url.clone()).context("failed to build rating proxy")?,
            );
            let lecturer_scraper = Arc::new(
                LecturerScraper::new(
                    &self.config.redis_url,
                    self.catalog.clone(),
                    self.lecturers.clone(),
                    rating_proxy,
                    self.config.lecturer_rating_ttl,
                )
                .context("failed to build lecturer scraper")?,
            );

            let subjects = distinct_subjects(&self.catalog);
            let scraper_service = Box::new(ScraperService::new(
                course_scraper,
                lecturer_scraper,
                self.config.scrape_course_interval,
                self.config.scrape_lecturer_interval,
                self.config.current_term_file.to_string_lossy().into_owned(),
                subjects,
            ));
            self.service_manager.register_service(scraper_service);
        }

        Ok(())
    }

    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    pub async fn run(self) -> ExitCode {
        crate::services::signals::handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }
}

/// Every distinct subject prefix seen in course names (`"CS 101"` -> `"CS"`),
/// used to seed the course scraper's per-subject fetch loop without
/// hardcoding a department list.
fn distinct_subjects(catalog: &CatalogStore) -> Vec<String> {
    let mut subjects: HashSet<String> = HashSet::new();
    for name in catalog.names() {
        if let Some(subject) = name.split_whitespace().next() {
            subjects.insert(subject.to_string());
        }
    }
    let mut subjects: Vec<String> = subjects.into_iter().collect();
    subjects.sort();
    subjects
}

async fn load_catalog(path: &std::path::Path) -> CatalogStore {
    let store = CatalogStore::new();
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str::<std::collections::HashMap<String, Course>>(&contents) {
            Ok(courses) => {
                for (name, course) in courses {
                    store.upsert(name, course);
                }
            }
            Err(err) => warn!(%err, path = %path.display(), "malformed course data file, starting with an empty catalog"),
        },
        Err(err) => warn!(%err, path = %path.display(), "could not read course data file, starting with an empty catalog"),
    }
    store
}

async fn load_lecturers(path: &std::path::Path) -> LecturerStore {
    let store = LecturerStore::new();
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str::<std::collections::HashMap<String, LecturerRating>>(&contents) {
            Ok(ratings) => {
                for (name, rating) in ratings {
                    store.upsert(name, rating);
                }
            }
            Err(err) => warn!(%err, path = %path.display(), "malformed lecturer data file, starting with an empty store"),
        },
        Err(err) => warn!(%err, path = %path.display(), "could not read lecturer data file, starting with an empty store"),
    }
    store
}
