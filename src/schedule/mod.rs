//! C4 Schedule Enumerator: filters sections per course, enumerates the
//! shuffled Cartesian product, detects day/time conflicts, and stops after
//! 5 emitted schedules (spec.md §4.4).

pub mod time;

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogStore, LecturerStore, SectionRecord};

const MAX_SCHEDULES: usize = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeScheduleRequest {
    pub courses: Vec<String>,
    #[serde(default = "default_max_days")]
    pub max_days: u32,
    #[serde(default)]
    pub locked_in_sections: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    pub min_rmp_rating: Option<f32>,
    #[serde(default)]
    pub days: Option<Vec<String>>,
    #[serde(default)]
    pub honors: bool,
}

fn default_max_days() -> u32 {
    5
}

impl MakeScheduleRequest {
    fn clamped_max_days(&self) -> u32 {
        self.max_days.clamp(1, 5)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleError {
    pub course: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// course -> chosen section id
    pub sections: HashMap<String, String>,
    pub days_used: Vec<char>,
    pub num_days: usize,
}

struct CandidateSection {
    course: String,
    section: SectionRecord,
    day_schedule: HashMap<char, Vec<(u32, u32)>>,
}

/// Builds, per course, the list of sections surviving spec.md §4.4 steps
/// 1-6. Errors for courses that fail to normalize or have no sections in
/// the term are collected rather than aborting the whole request.
fn filter_course_sections(
    catalog: &CatalogStore,
    lecturers: &LecturerStore,
    term: &str,
    request: &MakeScheduleRequest,
) -> (Vec<Vec<CandidateSection>>, Vec<ScheduleError>) {
    let allowed_day_letters: Option<HashSet<char>> = request.days.as_ref().map(|days| {
        days.iter().filter_map(|d| time::weekday_name_to_letter(d)).collect()
    });

    let normalized_locked: Option<HashMap<String, HashSet<String>>> =
        request.locked_in_sections.as_ref().map(|locked| {
            locked
                .iter()
                .map(|(course, ids)| {
                    (
                        course.to_uppercase(),
                        ids.iter().map(|id| crate::catalog::normalize::normalize_section_id(id)).collect(),
                    )
                })
                .collect()
        });

    let mut per_course = Vec::with_capacity(request.courses.len());
    let mut errors = Vec::new();

    for raw_name in &request.courses {
        let name = match catalog.normalize(raw_name) {
            Ok(name) => name,
            Err(err) => {
                errors.push(ScheduleError { course: raw_name.clone(), message: err.error_message });
                continue;
            }
        };

        let Some(course) = catalog.get(&name) else {
            errors.push(ScheduleError { course: name, message: "course has no catalog entry".into() });
            continue;
        };

        let Some(sections) = course.sections.get(term) else {
            errors.push(ScheduleError { course: name, message: format!("no sections offered in term {term}") });
            continue;
        };

        let locked_ids = normalized_locked.as_ref().and_then(|locked| locked.get(&name));

        let mut candidates = Vec::new();
        for (section_id, section) in sections {
            let normalized_id = crate::catalog::normalize::normalize_section_id(section_id);

            if let Some(locked_ids) = locked_ids {
                if !locked_ids.contains(&normalized_id) {
                    continue;
                }
            } else {
                if normalized_id.starts_with("HS") {
                    continue;
                }
                if !request.honors && normalized_id.starts_with('H') {
                    continue;
                }
            }

            if let Some(min_rating) = request.min_rmp_rating {
                let rating = lecturers.get(&section.instructor).and_then(|r| r.avg_rating_f32());
                match rating {
                    Some(avg) if avg >= min_rating => {}
                    _ => continue,
                }
            }

            if let Some(allowed) = &allowed_day_letters {
                let section_days: HashSet<char> = section.days.chars().filter(|c| !c.is_whitespace()).collect();
                if !section_days.is_subset(allowed) {
                    continue;
                }
            }

            let day_schedule = time::parse_section_schedule(&section.days, &section.times);

            candidates.push(CandidateSection { course: name.clone(), section: section.clone(), day_schedule });
        }

        per_course.push(candidates);
    }

    (per_course, errors)
}

fn sections_conflict(a: &CandidateSection, b: &CandidateSection) -> bool {
    for (day, a_ranges) in &a.day_schedule {
        let Some(b_ranges) = b.day_schedule.get(day) else { continue };
        for &(a_start, a_end) in a_ranges {
            for &(b_start, b_end) in b_ranges {
                if a_start < b_end && b_start < a_end {
                    return true;
                }
            }
        }
    }
    false
}

/// Enumerates up to 5 valid schedules. Combinations are produced in shuffled
/// order (spec.md §5 determinism note): callers needing variety across
/// retries get it for free, but tests must assert set-level properties only.
pub fn enumerate(
    catalog: &CatalogStore,
    lecturers: &LecturerStore,
    term: &str,
    request: &MakeScheduleRequest,
) -> (Vec<Schedule>, Vec<ScheduleError>) {
    let max_days = request.clamped_max_days();
    let (per_course, mut errors) = filter_course_sections(catalog, lecturers, term, request);

    if per_course.iter().any(|candidates| candidates.is_empty()) {
        return (Vec::new(), errors);
    }

    let mut combo_indices: Vec<Vec<usize>> = vec![vec![]];
    for candidates in &per_course {
        let mut next = Vec::with_capacity(combo_indices.len() * candidates.len());
        for combo in &combo_indices {
            for i in 0..candidates.len() {
                let mut extended = combo.clone();
                extended.push(i);
                next.push(extended);
            }
        }
        combo_indices = next;
    }

    combo_indices.shuffle(&mut rand::rng());

    let mut schedules = Vec::new();
    for combo in combo_indices {
        let chosen: Vec<&CandidateSection> =
            combo.iter().zip(&per_course).map(|(&i, candidates)| &candidates[i]).collect();

        let day_letters: HashSet<char> = chosen.iter().flat_map(|c| c.day_schedule.keys().copied()).collect();
        if day_letters.len() > max_days as usize {
            continue;
        }

        let mut has_conflict = false;
        'outer: for i in 0..chosen.len() {
            for j in (i + 1)..chosen.len() {
                if sections_conflict(chosen[i], chosen[j]) {
                    has_conflict = true;
                    break 'outer;
                }
            }
        }
        if has_conflict {
            continue;
        }

        let mut sections = HashMap::new();
        for c in &chosen {
            sections.insert(c.course.clone(), c.section.section_id.clone());
        }

        let mut days_used: Vec<char> = day_letters.into_iter().collect();
        days_used.sort();
        let num_days = days_used.len();

        schedules.push(Schedule { sections, days_used, num_days });

        if schedules.len() >= MAX_SCHEDULES {
            break;
        }
    }

    if per_course.is_empty() {
        errors.push(ScheduleError { course: String::new(), message: "no courses requested".into() });
    }

    (schedules, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{Course, SectionRecord};
    use std::collections::HashMap;

    fn section(id: &str, days: &str, times: &str, instructor: &str) -> SectionRecord {
        SectionRecord {
            section_id: id.into(),
            crn: "00000".into(),
            days: days.into(),
            times: times.into(),
            location: "TBD".into(),
            status: "Open".into(),
            max_seats: "30".into(),
            current_seats: "0".into(),
            instructor: instructor.into(),
            delivery_mode: "Face to Face".into(),
            credits: "3".into(),
            info: "".into(),
            comments: "".into(),
        }
    }

    fn catalog_with(courses: Vec<(&str, Vec<SectionRecord>)>) -> CatalogStore {
        let catalog = CatalogStore::new();
        for (name, sections) in courses {
            let mut section_map = HashMap::new();
            for s in sections {
                section_map.insert(s.section_id.clone(), s);
            }
            let mut term_map = HashMap::new();
            term_map.insert("202610".to_string(), section_map);
            catalog.upsert(
                name.to_string(),
                Course {
                    title: name.to_string(),
                    description: "desc".into(),
                    credits: Some(3.0),
                    prereq_tree: None,
                    coreq_tree: None,
                    restrictions: vec![],
                    sections: term_map,
                },
            );
        }
        catalog
    }

    #[test]
    fn conflicting_sections_yield_no_schedules() {
        let catalog = catalog_with(vec![
            ("A", vec![section("001", "MW", "10:00 AM - 11:20 AM", "Smith")]),
            ("B", vec![section("001", "MW", "10:00 AM - 11:20 AM", "Jones")]),
        ]);
        let lecturers = LecturerStore::new();
        let request = MakeScheduleRequest {
            courses: vec!["A".into(), "B".into()],
            max_days: 5,
            locked_in_sections: None,
            min_rmp_rating: None,
            days: None,
            honors: false,
        };
        let (schedules, _) = enumerate(&catalog, &lecturers, "202610", &request);
        assert!(schedules.is_empty());
    }

    #[test]
    fn non_conflicting_sections_yield_one_schedule_with_four_days() {
        let catalog = catalog_with(vec![
            ("A", vec![section("001", "MW", "10:00 AM - 11:20 AM", "Smith")]),
            ("B", vec![section("001", "TR", "10:00 AM - 11:20 AM", "Jones")]),
        ]);
        let lecturers = LecturerStore::new();
        let request = MakeScheduleRequest {
            courses: vec!["A".into(), "B".into()],
            max_days: 5,
            locked_in_sections: None,
            min_rmp_rating: None,
            days: None,
            honors: false,
        };
        let (schedules, _) = enumerate(&catalog, &lecturers, "202610", &request);
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].num_days, 4);
        assert_eq!(schedules[0].days_used, vec!['M', 'R', 'T', 'W']);
    }

    #[test]
    fn honors_filter_excludes_h_sections_by_default() {
        let catalog = catalog_with(vec![(
            "A",
            vec![
                section("001", "M", "10:00 AM - 11:00 AM", "Smith"),
                section("H01", "T", "10:00 AM - 11:00 AM", "Smith"),
            ],
        )]);
        let lecturers = LecturerStore::new();

        let request = MakeScheduleRequest {
            courses: vec!["A".into()],
            max_days: 5,
            locked_in_sections: None,
            min_rmp_rating: None,
            days: None,
            honors: false,
        };
        let (per_course, _) = filter_course_sections(&catalog, &lecturers, "202610", &request);
        assert_eq!(per_course[0].len(), 1);
        assert_eq!(per_course[0][0].section.section_id, "001");

        let request_honors = MakeScheduleRequest { honors: true, ..request };
        let (per_course_honors, _) = filter_course_sections(&catalog, &lecturers, "202610", &request_honors);
        assert_eq!(per_course_honors[0].len(), 2);
    }

    #[test]
    fn missing_term_sections_records_error() {
        let catalog = catalog_with(vec![("A", vec![section("001", "M", "10:00 AM - 11:00 AM", "Smith")])]);
        let lecturers = LecturerStore::new();
        let request = MakeScheduleRequest {
            courses: vec!["A".into()],
            max_days: 5,
            locked_in_sections: None,
            min_rmp_rating: None,
            days: None,
            honors: false,
        };
        let (schedules, errors) = enumerate(&catalog, &lecturers, "999999", &request);
        assert!(schedules.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn max_days_and_top_n_are_clamped() {
        let request = MakeScheduleRequest {
            courses: vec![],
            max_days: 9,
            locked_in_sections: None,
            min_rmp_rating: None,
            days: None,
            honors: false,
        };
        assert_eq!(request.clamped_max_days(), 5);
    }
}
