//! Application configuration, loaded via `figment` from a config file and
//! environment variables, with platform env remapping applied before the
//! merge (Railway-style `PORT`/`REDIS_URL` land directly on our fields).

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{de, Deserialize, Deserializer};

fn default_port() -> u16 {
    8080
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_embedder_url() -> String {
    "http://localhost:8000/embed".to_string()
}

fn default_banner_base_url() -> String {
    "https://generalssb-prod.ec.njit.edu/StudentRegistrationSsb/ssb".to_string()
}

fn default_rating_proxy_url() -> String {
    "https://backend-server-black-phi.vercel.app".to_string()
}

fn default_course_data_file() -> PathBuf {
    PathBuf::from("data/graph.json")
}

fn default_lecturer_data_file() -> PathBuf {
    PathBuf::from("data/lecturers.json")
}

fn default_current_term_file() -> PathBuf {
    PathBuf::from("scrapers/currentTerm.txt")
}

fn default_prompt_file() -> PathBuf {
    PathBuf::from("prompts/chatbot_prompt.txt")
}

fn default_description_prompt_file() -> PathBuf {
    PathBuf::from("prompts/description_prompt.txt")
}

fn default_scrape_course_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_scrape_lecturer_interval() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_lecturer_rating_ttl() -> Duration {
    Duration::from_secs(5 * 60 * 60)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    pub redis_url: String,

    pub gemini_api_key: String,

    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    #[serde(default = "default_embedder_url")]
    pub embedder_url: String,

    #[serde(default)]
    pub reranker_url: Option<String>,

    #[serde(default = "default_banner_base_url")]
    pub banner_base_url: String,

    #[serde(default = "default_rating_proxy_url")]
    pub rating_proxy_url: String,

    #[serde(default = "default_course_data_file")]
    pub course_data_file: PathBuf,

    #[serde(default = "default_lecturer_data_file")]
    pub lecturer_data_file: PathBuf,

    #[serde(default = "default_current_term_file")]
    pub current_term_file: PathBuf,

    #[serde(default = "default_prompt_file")]
    pub prompt_file: PathBuf,

    #[serde(default = "default_description_prompt_file")]
    pub description_prompt_file: PathBuf,

    #[serde(default = "default_scrape_course_interval", deserialize_with = "deserialize_duration")]
    pub scrape_course_interval: Duration,

    #[serde(default = "default_scrape_lecturer_interval", deserialize_with = "deserialize_duration")]
    pub scrape_lecturer_interval: Duration,

    #[serde(default = "default_lecturer_rating_ttl", deserialize_with = "deserialize_duration")]
    pub lecturer_rating_ttl: Duration,

    #[serde(default = "default_shutdown_timeout", deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Env::raw().map(|key| {
                match key.as_str() {
                    "PORT" => "port".into(),
                    "REDIS_URL" => "redis_url".into(),
                    "GEMINI_API_KEY" => "gemini_api_key".into(),
                    "QDRANT_URL" => "qdrant_url".into(),
                    "EMBEDDER_URL" => "embedder_url".into(),
                    "RERANKER_URL" => "reranker_url".into(),
                    "BANNER_BASE_URL" => "banner_base_url".into(),
                    "RATING_PROXY_URL" => "rating_proxy_url".into(),
                    "RAILWAY_DEPLOYMENT_DRAINING_SECONDS" => "shutdown_timeout".into(),
                    other => other.to_lowercase().into(),
                }
            }))
            .extract()
    }
}

const DURATION_PARSER: fundu::DurationParser = fundu::DurationParser::builder()
    .time_units(&[fundu::TimeUnit::Second, fundu::TimeUnit::MilliSecond, fundu::TimeUnit::Minute])
    .allow_multiple(true)
    .allow_delimiter(|c| c == ' ')
    .disable_infinity()
    .disable_fraction()
    .disable_exponent()
    .default_unit(fundu::TimeUnit::Second)
    .build();

/// Accepts either a bare number of seconds or a `fundu`-parsed duration
/// string (`"5m"`, `"6 hours"`, `"500ms"`), matching the teacher's flexible
/// duration config fields.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> de::Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or a non-negative number of seconds")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
            DURATION_PARSER
                .parse(value)
                .map_err(E::custom)?
                .try_into()
                .map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Duration, E> {
            if value < 0 {
                return Err(E::custom("duration seconds must not be negative"));
            }
            Ok(Duration::from_secs(value as u64))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
