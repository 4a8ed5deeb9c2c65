//! Wraps the two scraper workers (spec.md §4.8) as one `Service`: each
//! runs on its own interval inside a `tokio::select!`, both fail-soft.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tracing::{error, warn};

use crate::scraper::course::CourseScraper;
use crate::scraper::lecturer::LecturerScraper;
use crate::services::Service;

pub struct ScraperService {
    course_scraper: Arc<CourseScraper>,
    lecturer_scraper: Arc<LecturerScraper>,
    course_interval: Duration,
    lecturer_interval: Duration,
    current_term_file: String,
    subjects: Vec<String>,
}

impl ScraperService {
    pub fn new(
        course_scraper: Arc<CourseScraper>,
        lecturer_scraper: Arc<LecturerScraper>,
        course_interval: Duration,
        lecturer_interval: Duration,
        current_term_file: String,
        subjects: Vec<String>,
    ) -> Self {
        Self { course_scraper, lecturer_scraper, course_interval, lecturer_interval, current_term_file, subjects }
    }

    async fn read_current_term(&self) -> String {
        tokio::fs::read_to_string(&self.current_term_file).await.unwrap_or_default()
    }
}

#[async_trait]
impl Service for ScraperService {
    fn name(&self) -> &str {
        "scraper"
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        let mut course_ticker = tokio::time::interval(self.course_interval);
        course_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut lecturer_ticker = tokio::time::interval(self.lecturer_interval);
        lecturer_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = course_ticker.tick() => {
                    let term = self.read_current_term().await;
                    if let Err(err) = self.course_scraper.run_cycle(&term, &self.subjects).await {
                        error!(%err, "course scrape cycle failed");
                    }
                }
                _ = lecturer_ticker.tick() => {
                    if let Err(err) = self.lecturer_scraper.run_cycle().await {
                        warn!(%err, "lecturer scrape cycle failed");
                    }
                }
            }
        }
    }

    async fn shutdown(&mut self) {}
}
