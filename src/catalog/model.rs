//! Course catalog data model: requirement trees, section records, and the
//! per-course record they hang off of.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A heterogeneous requirement-tree node. Modeled as a single tagged sum
/// (never as a trait-object hierarchy) so the evaluator in `crate::prereq`
/// can be one recursive pattern match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RequirementNode {
    And { children: Vec<RequirementNode> },
    Or { children: Vec<RequirementNode> },
    Course {
        course: String,
        #[serde(default)]
        min_grade: Option<String>,
    },
    Equivalent { courses: Vec<String> },
    Standing {
        standing: String,
        #[serde(default)]
        semesters_left: Option<i32>,
    },
    Placement {
        name: String,
        #[serde(flatten)]
        extra: HashMap<String, serde_json::Value>,
    },
    Permission {
        raw: String,
        #[serde(flatten)]
        extra: HashMap<String, serde_json::Value>,
    },
    Skill { name: String },
}

/// One scheduled offering of a course: the fixed 13-tuple described in
/// spec.md §3, given field names instead of positional indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub section_id: String,
    pub crn: String,
    /// Letters from `M T W R F`.
    pub days: String,
    /// One slot per day, or one slot applied to every day — see
    /// `crate::schedule::time`.
    pub times: String,
    pub location: String,
    pub status: String,
    pub max_seats: String,
    pub current_seats: String,
    pub instructor: String,
    pub delivery_mode: String,
    pub credits: String,
    pub info: String,
    pub comments: String,
}

pub type TermCode = String;
pub type SectionMap = HashMap<String, SectionRecord>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restriction {
    pub raw: String,
    #[serde(default)]
    pub kinds: Option<Vec<String>>,
    #[serde(default)]
    pub entities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub credits: Option<f64>,
    #[serde(default)]
    pub prereq_tree: Option<RequirementNode>,
    #[serde(default)]
    pub coreq_tree: Option<RequirementNode>,
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
    /// term -> (section-id -> section record)
    #[serde(default)]
    pub sections: HashMap<TermCode, SectionMap>,
}

impl Course {
    pub fn content_hash(&self) -> String {
        crate::semantic::content_hash(&self.title, &self.description)
    }
}

/// `{name, grade}` entry in a user's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCourseInfo {
    pub name: String,
    #[serde(default = "default_grade")]
    pub grade: String,
}

fn default_grade() -> String {
    "C".to_string()
}

/// Per-session academic profile. Owned by the request handler, never by a
/// process-global (see spec.md §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default = "default_true")]
    pub new_user: bool,
    #[serde(default)]
    pub courses: HashMap<String, UserCourseInfo>,
    #[serde(default)]
    pub equivalents: Vec<String>,
    #[serde(default)]
    pub standing: Option<String>,
    #[serde(default)]
    pub semesters_left: Option<i32>,
    #[serde(default)]
    pub honors: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            new_user: true,
            courses: HashMap::new(),
            equivalents: Vec::new(),
            standing: None,
            semesters_left: None,
            honors: false,
        }
    }
}

/// `{avgRating, wouldTakeAgainPercent, avgDifficulty, link, numRatings,
/// legacyId, last_updated}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LecturerRating {
    pub avg_rating: String,
    pub would_take_again_percent: String,
    pub avg_difficulty: String,
    pub link: String,
    pub num_ratings: String,
    pub legacy_id: i64,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl LecturerRating {
    /// Parses `avg_rating` as a float for rating-threshold filters.
    /// Unparseable values exclude the section per spec.md §4.4 step 4.
    pub fn avg_rating_f32(&self) -> Option<f32> {
        self.avg_rating.trim().parse().ok()
    }
}
