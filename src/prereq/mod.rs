//! C2 Prereq Evaluator: recursive satisfaction check over the requirement
//! tree (spec.md §4.2). `evaluate` returns `true` on success or a
//! human-readable explanation string on failure — callers treat any
//! non-`true` result as a failure with a user-facing reason.

use crate::catalog::{RequirementNode, UserProfile};

const STANDING_ORDER: &[&str] = &["FRESHMAN", "SOPHOMORE", "JUNIOR", "SENIOR", "GRAD"];

fn grade_order(grade: &str) -> f32 {
    match grade {
        "A" => 4.0,
        "B+" => 3.5,
        "B" => 3.0,
        "C+" => 2.5,
        "C" => 2.0,
        "C-" => 1.7,
        "F" => 0.0,
        _ => 0.0,
    }
}

pub fn is_grade_sufficient(user_grade: &str, min_grade: Option<&str>) -> bool {
    let required = min_grade.map(grade_order).unwrap_or(2.0);
    grade_order(user_grade) >= required
}

fn standing_rank(standing: &str) -> Option<usize> {
    STANDING_ORDER.iter().position(|s| *s == standing)
}

/// Evaluates a requirement node against a profile. `Ok(())` means satisfied;
/// `Err(message)` carries the user-facing reason.
pub fn evaluate(node: Option<&RequirementNode>, profile: &UserProfile) -> Result<(), String> {
    let Some(node) = node else { return Ok(()) };

    match node {
        RequirementNode::And { children } => {
            let failures: Vec<String> =
                children.iter().filter_map(|child| evaluate(Some(child), profile).err()).collect();

            if failures.is_empty() {
                Ok(())
            } else if failures.len() == 1 {
                Err(failures.into_iter().next().unwrap())
            } else {
                Err(format!("All of the following must be met: ({})", failures.join("; ")))
            }
        }

        RequirementNode::Or { children } => {
            if children.is_empty() {
                // Vacuously true: preserves composition (spec.md §4.2).
                return Ok(());
            }

            let mut failures = Vec::with_capacity(children.len());
            for child in children {
                match evaluate(Some(child), profile) {
                    Ok(()) => return Ok(()),
                    Err(message) => failures.push(message),
                }
            }

            Err(format!("At least one of these must be met: ({})", failures.join(" OR ")))
        }

        RequirementNode::Course { course, min_grade } => {
            match profile.courses.get(course) {
                Some(info) if is_grade_sufficient(&info.grade, min_grade.as_deref()) => Ok(()),
                Some(info) => Err(format!(
                    "User has {} in {course}, but {} or better is required.",
                    info.grade,
                    min_grade.as_deref().unwrap_or("C")
                )),
                None => Err(format!("Missing course {course}")),
            }
        }

        RequirementNode::Equivalent { courses } => {
            let missing: Vec<&String> =
                courses.iter().filter(|c| !profile.equivalents.contains(*c)).collect();

            if missing.is_empty() {
                Ok(())
            } else {
                Err(format!(
                    "Missing transfer equivalent for: {}",
                    missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                ))
            }
        }

        RequirementNode::Standing { standing, semesters_left } => {
            let required_rank = standing_rank(standing)
                .ok_or_else(|| format!("Unrecognized standing requirement: {standing}"))?;
            let user_rank = profile
                .standing
                .as_deref()
                .and_then(standing_rank)
                .ok_or_else(|| format!("Requires standing {standing} or higher"))?;

            if user_rank < required_rank {
                return Err(format!("Requires standing {standing} or higher"));
            }

            if let Some(max_left) = semesters_left {
                let user_left = profile
                    .semesters_left
                    .ok_or_else(|| format!("Requires {max_left} or fewer semesters remaining"))?;
                if user_left > *max_left {
                    return Err(format!("Requires {max_left} or fewer semesters remaining"));
                }
            }

            Ok(())
        }

        RequirementNode::Placement { name, .. } => {
            Err(format!("Special requirement needed: PLACEMENT ({name})"))
        }

        RequirementNode::Permission { raw, .. } => {
            Err(format!("Special requirement needed: PERMISSION ({raw})"))
        }

        RequirementNode::Skill { name } => {
            Err(format!("Special requirement needed: SKILL ({name})"))
        }
    }
}

/// Produces the course list for downstream filtering (spec.md §4.2):
/// optionally restricted to a term, skipping courses already completed, and
/// optionally filtered to prereq-satisfied courses only.
pub fn get_available_courses(
    catalog: &crate::catalog::CatalogStore,
    profile: &UserProfile,
    only_prereqs_fulfilled: bool,
    only_current_term: bool,
    term: &str,
) -> Vec<String> {
    let candidates = if only_current_term {
        catalog.courses_in_term(term)
    } else {
        catalog.names()
    };

    candidates
        .into_iter()
        .filter(|name| !profile.courses.contains_key(name))
        .filter(|name| {
            if !only_prereqs_fulfilled {
                return true;
            }
            let Some(course) = catalog.get(name) else { return false };
            evaluate(course.prereq_tree.as_ref(), profile).is_ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::UserCourseInfo;
    use std::collections::HashMap;

    fn profile_with(courses: &[(&str, &str)]) -> UserProfile {
        let mut map = HashMap::new();
        for (name, grade) in courses {
            map.insert(name.to_string(), UserCourseInfo { name: name.to_string(), grade: grade.to_string() });
        }
        UserProfile { courses: map, ..Default::default() }
    }

    #[test]
    fn grade_gating_insufficient() {
        let node = RequirementNode::Course { course: "CS 100".into(), min_grade: Some("B".into()) };
        let profile = profile_with(&[("CS 100", "C")]);
        let err = evaluate(Some(&node), &profile).unwrap_err();
        assert!(err.contains("CS 100"));
    }

    #[test]
    fn grade_gating_sufficient() {
        let node = RequirementNode::Course { course: "CS 100".into(), min_grade: Some("B".into()) };
        let profile = profile_with(&[("CS 100", "A")]);
        assert!(evaluate(Some(&node), &profile).is_ok());
    }

    #[test]
    fn and_or_nesting_satisfied() {
        let node = RequirementNode::And {
            children: vec![
                RequirementNode::Or {
                    children: vec![
                        RequirementNode::Course { course: "MATH 111".into(), min_grade: None },
                        RequirementNode::Course { course: "MATH 112".into(), min_grade: None },
                    ],
                },
                RequirementNode::Course { course: "CS 100".into(), min_grade: None },
            ],
        };
        let profile = profile_with(&[("MATH 111", "C"), ("CS 100", "C")]);
        assert!(evaluate(Some(&node), &profile).is_ok());
    }

    #[test]
    fn and_or_nesting_single_failure_message() {
        let node = RequirementNode::And {
            children: vec![
                RequirementNode::Or {
                    children: vec![RequirementNode::Course { course: "MATH 111".into(), min_grade: None }],
                },
                RequirementNode::Course { course: "CS 100".into(), min_grade: None },
            ],
        };
        let profile = profile_with(&[("MATH 112", "C")]);
        let err = evaluate(Some(&node), &profile).unwrap_err();
        assert!(err.contains("Missing course CS 100"));
    }

    #[test]
    fn empty_and_is_vacuously_true() {
        let node = RequirementNode::And { children: vec![] };
        assert!(evaluate(Some(&node), &UserProfile::default()).is_ok());
    }

    #[test]
    fn empty_or_is_vacuously_true() {
        let node = RequirementNode::Or { children: vec![] };
        assert!(evaluate(Some(&node), &UserProfile::default()).is_ok());
    }

    #[test]
    fn null_node_is_true() {
        assert!(evaluate(None, &UserProfile::default()).is_ok());
    }

    #[test]
    fn placement_is_never_true() {
        let node = RequirementNode::Placement { name: "Math Placement".into(), extra: HashMap::new() };
        assert!(evaluate(Some(&node), &UserProfile::default()).is_err());
    }

    #[test]
    fn skill_is_never_true() {
        let node = RequirementNode::Skill { name: "Portfolio review".into() };
        let err = evaluate(Some(&node), &UserProfile::default()).unwrap_err();
        assert!(err.contains("SKILL (Portfolio review)"));
    }

    #[test]
    fn unmet_skill_leaf_fails_an_and_tree() {
        let node = RequirementNode::And {
            children: vec![
                RequirementNode::Course { course: "CS 100".into(), min_grade: None },
                RequirementNode::Skill { name: "Portfolio review".into() },
            ],
        };
        let profile = profile_with(&[("CS 100", "A")]);
        assert!(evaluate(Some(&node), &profile).is_err());
    }

    #[test]
    fn is_grade_sufficient_table() {
        assert!(is_grade_sufficient("A", Some("B")));
        assert!(!is_grade_sufficient("C", Some("B")));
        assert!(is_grade_sufficient("C", None));
        assert!(!is_grade_sufficient("F", None));
    }
}
