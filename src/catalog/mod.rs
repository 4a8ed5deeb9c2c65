//! C1 Catalog Store: the authoritative in-memory map of courses. Owned by a
//! single process-global holder with read-mostly semantics; scrapers
//! replace it wholesale at scrape boundaries (spec.md §9).

pub mod model;
pub mod normalize;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

pub use model::{Course, LecturerRating, RequirementNode, SectionRecord, UserCourseInfo, UserProfile};
pub use normalize::NormalizeError;

/// Process-global, read-mostly catalog. `DashMap` gives readers lock-free
/// access while scrapers perform bulk `upsert`s; there is no cross-entry
/// atomicity requirement (spec.md §5: "catalog mutations are not atomic
/// across the process").
#[derive(Clone, Default)]
pub struct CatalogStore {
    courses: Arc<DashMap<String, Course>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self { courses: Arc::new(DashMap::new()) }
    }

    pub fn get(&self, name: &str) -> Option<Course> {
        self.courses.get(name).map(|entry| entry.clone())
    }

    pub fn upsert(&self, name: String, record: Course) {
        self.courses.insert(name, record);
    }

    pub fn names(&self) -> Vec<String> {
        self.courses.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn iter_snapshot(&self) -> Vec<(String, Course)> {
        self.courses.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }

    /// Normalizes a raw course name against the current valid-name set
    /// (spec.md §4.1).
    pub fn normalize(&self, input: &str) -> Result<String, NormalizeError> {
        let valid_names = self.names();
        normalize::normalize(input, &valid_names)
    }

    /// `term_courses[t] = { c | t in c.sections }`, recomputed on demand
    /// rather than incrementally maintained — acceptable because reads are
    /// dominated by scrape-boundary bulk writes, not per-course mutation
    /// (spec.md §3 invariant 3).
    pub fn courses_in_term(&self, term: &str) -> Vec<String> {
        self.courses
            .iter()
            .filter(|entry| entry.value().sections.contains_key(term))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn full_map(&self) -> HashMap<String, Course> {
        self.courses.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }
}

/// Process-global, read-mostly lecturer-rating map, populated by the
/// lecturer scraper (C8) and mirrored to Redis under the `"lecturers"` key.
#[derive(Clone, Default)]
pub struct LecturerStore {
    ratings: Arc<DashMap<String, LecturerRating>>,
}

impl LecturerStore {
    pub fn new() -> Self {
        Self { ratings: Arc::new(DashMap::new()) }
    }

    pub fn get(&self, instructor: &str) -> Option<LecturerRating> {
        self.ratings.get(instructor).map(|entry| entry.clone())
    }

    pub fn upsert(&self, instructor: String, rating: LecturerRating) {
        self.ratings.insert(instructor, rating);
    }

    pub fn names(&self) -> Vec<String> {
        self.ratings.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn full_map(&self) -> HashMap<String, LecturerRating> {
        self.ratings.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }
}
