//! Course-name normalization (spec.md §4.1): uppercase, then match against
//! the valid-name set by longest-common-subsequence over space-stripped
//! lowercase strings.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NormalizeError {
    pub error_message: String,
    pub did_you_mean: Vec<String>,
}

/// Longest common subsequence length between two strings, computed with the
/// standard O(|a|·|b|) table reduced to one row.
fn lcs_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

fn strip_spaces_lower(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).flat_map(|c| c.to_lowercase()).collect()
}

/// Normalizes a raw course-name string against the catalog's valid-name set.
///
/// - If the upper-cased input is already a valid name, accept it.
/// - Else rank every valid name by LCS length (space-stripped, lowercase);
///   if exactly one candidate ties for the maximum, accept it.
/// - Otherwise return an error carrying up to 5 best guesses.
pub fn normalize(input: &str, valid_names: &[String]) -> Result<String, NormalizeError> {
    let upper = input.to_uppercase();
    if valid_names.iter().any(|name| name == &upper) {
        return Ok(upper);
    }

    let target = strip_spaces_lower(&upper);

    let mut scored: Vec<(usize, &String)> = valid_names
        .iter()
        .map(|name| (lcs_len(&target, &strip_spaces_lower(name)), name))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let best_score = scored.first().map(|(score, _)| *score).unwrap_or(0);
    let best: Vec<&String> = scored.iter().take_while(|(score, _)| *score == best_score).map(|(_, name)| *name).collect();

    if best.len() == 1 {
        return Ok(best[0].clone());
    }

    let did_you_mean = scored.into_iter().take(5).map(|(_, name)| name.clone()).collect();

    Err(NormalizeError {
        error_message: format!("'{input}' did not match exactly one course"),
        did_you_mean,
    })
}

/// Section-id normalization for locked-in matching (spec.md §4.1): uppercase,
/// then left-pad the digits of a letters-then-digits id so that
/// `len(prefix) + len(digits) == 3`.
pub fn normalize_section_id(input: &str) -> String {
    let upper = input.to_uppercase();

    let split_at = upper.find(|c: char| c.is_ascii_digit());
    let Some(split_at) = split_at else { return upper };

    let (prefix, digits) = upper.split_at(split_at);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return upper;
    }

    let pad_to = 3usize.saturating_sub(prefix.len());
    if digits.len() >= pad_to {
        return upper;
    }

    format!("{prefix}{:0>width$}", digits, width = pad_to)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["CS 101".to_string(), "CS 201".to_string(), "MATH 111".to_string()]
    }

    #[test]
    fn exact_uppercase_match() {
        assert_eq!(normalize("CS 101", &names()).unwrap(), "CS 101");
    }

    #[test]
    fn lowercase_no_space_match() {
        assert_eq!(normalize("cs101", &names()).unwrap(), "CS 101");
    }

    #[test]
    fn unknown_course_returns_did_you_mean() {
        let err = normalize("ZZ 999", &names()).unwrap_err();
        assert!(err.did_you_mean.len() <= 5);
    }

    #[test]
    fn section_id_pads_short_digit_run() {
        assert_eq!(normalize_section_id("2"), "002");
        assert_eq!(normalize_section_id("h2"), "H02");
        assert_eq!(normalize_section_id("hm2"), "HM2");
    }

    #[test]
    fn section_id_already_full_width_unchanged() {
        assert_eq!(normalize_section_id("001"), "001");
    }
}
