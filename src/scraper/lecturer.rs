//! Lecturer-rating scraper: refreshes stale RateMyProfessors-style ratings
//! for every instructor seen across the catalog (spec.md §4.8).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::catalog::{CatalogStore, LecturerRating, LecturerStore};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The external RateMyProfessors proxy boundary (spec.md §1: out of
/// scope beyond its contract).
#[async_trait]
pub trait RatingProxy: Send + Sync {
    async fn fetch_rating(&self, instructor: &str) -> Result<Option<RawRating>>;
}

#[derive(Debug, Deserialize)]
pub struct RawRating {
    pub avg_rating: String,
    pub would_take_again_percent: String,
    pub avg_difficulty: String,
    pub link: String,
    pub num_ratings: String,
    pub legacy_id: i64,
}

pub struct HttpRatingProxy {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRatingProxy {
    pub fn new(base_url: String) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build().context("failed to build rating proxy client")?;
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl RatingProxy for HttpRatingProxy {
    async fn fetch_rating(&self, instructor: &str) -> Result<Option<RawRating>> {
        let response = self
            .http
            .get(format!("{}/prof", self.base_url))
            .query(&[("q", instructor)])
            .send()
            .await
            .context("rating proxy request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let rating = response.error_for_status().context("rating proxy returned an error status")?.json().await.context("failed to decode rating proxy response")?;
        Ok(Some(rating))
    }
}

pub struct LecturerScraper {
    redis_client: redis::Client,
    catalog: CatalogStore,
    lecturers: LecturerStore,
    proxy: std::sync::Arc<dyn RatingProxy>,
    staleness_threshold: chrono::Duration,
}

impl LecturerScraper {
    pub fn new(
        redis_url: &str,
        catalog: CatalogStore,
        lecturers: LecturerStore,
        proxy: std::sync::Arc<dyn RatingProxy>,
        staleness_threshold: Duration,
    ) -> Result<Self> {
        let redis_client = redis::Client::open(redis_url).context("failed to create redis client for lecturer scraper")?;
        let staleness_threshold = chrono::Duration::from_std(staleness_threshold).unwrap_or(chrono::Duration::hours(5));
        Ok(Self { redis_client, catalog, lecturers, proxy, staleness_threshold })
    }

    /// Runs one scrape cycle over every distinct instructor name found in
    /// the catalog, refetching ratings older than the staleness threshold.
    pub async fn run_cycle(&self) -> Result<()> {
        let instructors = self.distinct_instructors();
        let mut refreshed = 0usize;

        for instructor in instructors {
            if instructor.is_empty() {
                continue;
            }

            let is_stale = match self.lecturers.get(&instructor) {
                Some(existing) => Utc::now().signed_duration_since(existing.last_updated) > self.staleness_threshold,
                None => true,
            };

            if !is_stale {
                continue;
            }

            match self.proxy.fetch_rating(&instructor).await {
                Ok(Some(raw)) => {
                    self.lecturers.upsert(
                        instructor.clone(),
                        LecturerRating {
                            avg_rating: raw.avg_rating,
                            would_take_again_percent: raw.would_take_again_percent,
                            avg_difficulty: raw.avg_difficulty,
                            link: raw.link,
                            num_ratings: raw.num_ratings,
                            legacy_id: raw.legacy_id,
                            last_updated: Utc::now(),
                        },
                    );
                    refreshed += 1;
                }
                Ok(None) => debug!(instructor, "no rating found for instructor"),
                Err(err) => error!(instructor, %err, "failed to fetch lecturer rating"),
            }
        }

        if refreshed > 0 {
            self.persist_to_redis().await?;
            self.publish_refresh().await?;
            info!(refreshed, "lecturer scrape cycle complete");
        }

        Ok(())
    }

    fn distinct_instructors(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .catalog
            .iter_snapshot()
            .into_iter()
            .flat_map(|(_, course)| course.sections.into_values())
            .flat_map(|section_map| section_map.into_values())
            .map(|section| section.instructor)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    async fn persist_to_redis(&self) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await.context("failed to open redis connection for lecturer scraper")?;
        let serialized = serde_json::to_string(&self.lecturers.full_map()).context("failed to serialize lecturer ratings")?;
        conn.set::<_, _, ()>("lecturers", serialized).await.context("failed to persist lecturer ratings to redis")?;
        Ok(())
    }

    async fn publish_refresh(&self) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await.context("failed to open redis connection for lecturer scraper")?;
        conn.publish::<_, _, ()>("lecturer_updates", "refresh").await.context("failed to publish lecturer refresh")?;
        Ok(())
    }
}
