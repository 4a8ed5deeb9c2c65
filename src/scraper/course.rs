//! Course scraper: refreshes section data and derives prereq/coreq trees
//! for newly discovered courses (spec.md §4.8).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::catalog::{Course, CatalogStore, Restriction, RequirementNode, SectionRecord};
use super::obfuscate_params;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const CATALOG_PAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Structured output a description-analysis model produces for a course
/// newly seen by the scraper (spec.md §4.8: "run the description through
/// an LLM to produce `prereq_tree`, `coreq_tree`, `restrictions`").
#[derive(Debug, Clone, Default)]
pub struct DerivedRequirements {
    pub prereq_tree: Option<RequirementNode>,
    pub coreq_tree: Option<RequirementNode>,
    pub restrictions: Vec<Restriction>,
}

#[async_trait]
pub trait RequirementDeriver: Send + Sync {
    async fn derive(&self, course_name: &str, description: &str) -> Result<DerivedRequirements>;
}

#[derive(serde::Serialize)]
struct DeriveRequestBody {
    contents: Vec<DeriveContent>,
    #[serde(rename = "generationConfig")]
    generation_config: DeriveGenerationConfig,
}

#[derive(serde::Serialize)]
struct DeriveContent {
    parts: Vec<DerivePart>,
}

#[derive(serde::Serialize)]
struct DerivePart {
    text: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct DeriveGenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize, Default)]
struct DeriveResponseBody {
    #[serde(default)]
    prereq_tree: Option<RequirementNode>,
    #[serde(default)]
    coreq_tree: Option<RequirementNode>,
    #[serde(default)]
    restrictions: Vec<Restriction>,
}

#[derive(Deserialize)]
struct GenerateContentEnvelope {
    #[serde(default)]
    candidates: Vec<GenerateContentCandidate>,
}

#[derive(Deserialize)]
struct GenerateContentCandidate {
    content: Option<GenerateContentCandidateBody>,
}

#[derive(Deserialize)]
struct GenerateContentCandidateBody {
    #[serde(default)]
    parts: Vec<GenerateContentCandidatePart>,
}

#[derive(Deserialize)]
struct GenerateContentCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Derives `prereq_tree`/`coreq_tree`/`restrictions` from a raw catalog
/// description by asking Gemini for structured JSON output (spec.md §4.8),
/// the same pattern the original one-off graph-building script used.
pub struct GeminiRequirementDeriver {
    client: reqwest::Client,
    api_key: String,
    model: String,
    prompt_template: String,
}

impl GeminiRequirementDeriver {
    pub fn new(client: reqwest::Client, api_key: String, prompt_template: String) -> Self {
        Self { client, api_key, model: "gemini-2.5-flash-lite".to_string(), prompt_template }
    }
}

#[async_trait]
impl RequirementDeriver for GeminiRequirementDeriver {
    async fn derive(&self, course_name: &str, description: &str) -> Result<DerivedRequirements> {
        let prompt = format!("{}\nCOURSE: {course_name}\nINPUT: {description}", self.prompt_template);

        let body = DeriveRequestBody {
            contents: vec![DeriveContent { parts: vec![DerivePart { text: prompt }] }],
            generation_config: DeriveGenerationConfig { response_mime_type: "application/json" },
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("requirement-derivation request failed")?
            .error_for_status()
            .context("requirement-derivation returned an error status")?;

        let envelope: GenerateContentEnvelope =
            response.json().await.context("failed to decode requirement-derivation response")?;

        let text = envelope
            .candidates
            .into_iter()
            .find_map(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
            .unwrap_or_default();

        if text.is_empty() {
            return Ok(DerivedRequirements::default());
        }

        let parsed: DeriveResponseBody = serde_json::from_str(&text).context("failed to parse derived requirements JSON")?;
        Ok(DerivedRequirements {
            prereq_tree: parsed.prereq_tree,
            coreq_tree: parsed.coreq_tree,
            restrictions: parsed.restrictions,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawSectionPage {
    #[serde(default)]
    data: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    course_reference_number: String,
    subject: String,
    course_number: String,
    course_title: String,
    section_number: String,
    credit_hours: Option<f64>,
    seats_available: Option<i64>,
    maximum_enrollment: Option<i64>,
    #[serde(default)]
    meetings_faculty: Vec<RawMeeting>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMeeting {
    #[serde(default)]
    faculty: Vec<RawFaculty>,
    #[serde(default)]
    meeting_time: Option<RawMeetingTime>,
}

#[derive(Debug, Deserialize, Default)]
struct RawFaculty {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawMeetingTime {
    #[serde(default)]
    days: String,
    #[serde(default)]
    times: String,
    #[serde(default)]
    building_description: String,
    #[serde(default)]
    meeting_schedule_type: String,
}

pub struct CourseScraper {
    http: reqwest::Client,
    redis_client: redis::Client,
    banner_base_url: String,
    catalog: CatalogStore,
    deriver: Option<std::sync::Arc<dyn RequirementDeriver>>,
}

impl CourseScraper {
    pub fn new(
        redis_url: &str,
        banner_base_url: String,
        catalog: CatalogStore,
        deriver: Option<std::sync::Arc<dyn RequirementDeriver>>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build scraper http client")?;
        let redis_client = redis::Client::open(redis_url).context("failed to create redis client for course scraper")?;
        Ok(Self { http, redis_client, banner_base_url, catalog, deriver })
    }

    /// Runs one scrape cycle: reads the current-term file, fetches every
    /// known subject's sections, updates the catalog, and publishes a
    /// refresh notice. Any failure is logged and swallowed (spec.md §4.8:
    /// "fail-soft: any exception is logged and the loop continues").
    pub async fn run_cycle(&self, term_file_contents: &str, subjects: &[String]) -> Result<()> {
        let term = term_file_contents.trim();
        if term.is_empty() {
            debug!("current-term file is empty, skipping course scrape cycle");
            return Ok(());
        }

        let mut updated = 0usize;
        for subject in subjects {
            match self.scrape_subject(subject, term).await {
                Ok(count) => updated += count,
                Err(err) => error!(subject, %err, "failed to scrape subject"),
            }
        }

        if updated > 0 {
            self.persist_catalog_to_redis().await?;
            self.publish_refresh().await?;
            info!(updated, term, "course scrape cycle complete");
        }

        Ok(())
    }

    async fn scrape_subject(&self, subject: &str, term: &str) -> Result<usize> {
        let params = obfuscate_params(&[("subject", subject), ("term", term)]);
        let url = format!("{}/StudentRegistrationSsb/ssb/searchResults/searchResults", self.banner_base_url);

        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("request failed for subject {subject}"))?
            .error_for_status()
            .with_context(|| format!("non-success status for subject {subject}"))?;

        let page: RawSectionPage = response.json().await.context("failed to decode section page")?;

        let mut updated = 0;
        for raw in page.data {
            let course_name = format!("{} {}", raw.subject, raw.course_number);
            self.upsert_section(&course_name, term, &raw).await?;
            updated += 1;
        }

        Ok(updated)
    }

    async fn upsert_section(&self, course_name: &str, term: &str, raw: &RawSection) -> Result<()> {
        let is_new = self.catalog.get(course_name).is_none();

        let mut course = self.catalog.get(course_name).unwrap_or_else(|| Course {
            title: raw.course_title.clone(),
            description: String::new(),
            credits: raw.credit_hours,
            prereq_tree: None,
            coreq_tree: None,
            restrictions: Vec::new(),
            sections: HashMap::new(),
        });

        course.title = raw.course_title.clone();
        if let Some(credits) = raw.credit_hours {
            course.credits = Some(credits);
        }

        if is_new {
            if let Err(err) = self.enrich_new_course(course_name, &mut course).await {
                warn!(course = course_name, %err, "failed to derive requirements for new course");
            }
        }

        let meeting = raw.meetings_faculty.first();
        let meeting_time = meeting.and_then(|m| m.meeting_time.as_ref());
        let instructor = meeting
            .and_then(|m| m.faculty.first())
            .map(|f| f.display_name.clone())
            .unwrap_or_default();

        let section = SectionRecord {
            section_id: raw.section_number.clone(),
            crn: raw.course_reference_number.clone(),
            days: meeting_time.map(|t| t.days.clone()).unwrap_or_default(),
            times: meeting_time.map(|t| t.times.clone()).unwrap_or_default(),
            location: meeting_time.map(|t| t.building_description.clone()).unwrap_or_default(),
            status: "Open".to_string(),
            max_seats: raw.maximum_enrollment.map(|n| n.to_string()).unwrap_or_default(),
            current_seats: raw.seats_available.map(|n| n.to_string()).unwrap_or_default(),
            instructor,
            delivery_mode: meeting_time.map(|t| t.meeting_schedule_type.clone()).unwrap_or_default(),
            credits: raw.credit_hours.map(|c| c.to_string()).unwrap_or_default(),
            info: String::new(),
            comments: String::new(),
        };

        course.sections.entry(term.to_string()).or_default().insert(section.section_id.clone(), section);
        self.catalog.upsert(course_name.to_string(), course);

        Ok(())
    }

    async fn enrich_new_course(&self, course_name: &str, course: &mut Course) -> Result<()> {
        let description = self.fetch_catalog_description(course_name).await.unwrap_or_default();
        course.description = description.clone();

        if let Some(deriver) = &self.deriver {
            let derived = deriver.derive(course_name, &description).await?;
            course.prereq_tree = derived.prereq_tree;
            course.coreq_tree = derived.coreq_tree;
            course.restrictions = derived.restrictions;
        }

        Ok(())
    }

    async fn fetch_catalog_description(&self, course_name: &str) -> Result<String> {
        let url = format!("{}/catalog/course/{}", self.banner_base_url, course_name.replace(' ', "-"));
        let response = self
            .http
            .get(&url)
            .timeout(CATALOG_PAGE_TIMEOUT)
            .send()
            .await
            .context("catalog page fetch failed")?
            .error_for_status()
            .context("catalog page returned an error status")?;

        response.text().await.context("failed to read catalog page body")
    }

    async fn persist_catalog_to_redis(&self) -> Result<()> {
        let mut conn = self
            .redis_client
            .get_multiplexed_async_connection()
            .await
            .context("failed to open redis connection for course scraper")?;
        let serialized = serde_json::to_string(&self.catalog.full_map()).context("failed to serialize catalog")?;
        conn.set::<_, _, ()>("courses", serialized).await.context("failed to persist catalog to redis")?;
        Ok(())
    }

    async fn publish_refresh(&self) -> Result<()> {
        let mut conn = self
            .redis_client
            .get_multiplexed_async_connection()
            .await
            .context("failed to open redis connection for course scraper")?;
        conn.publish::<_, _, ()>("course_updates", "refresh").await.context("failed to publish course refresh")?;
        Ok(())
    }
}
