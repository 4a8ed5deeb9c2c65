//! Day-letter and time-slot parsing (spec.md §4.1, §4.4).

use std::collections::HashMap;

/// One slot, in minutes-since-midnight.
pub type MinuteRange = (u32, u32);

/// Parses one `"HH:MM AM - HH:MM PM"` slot into minutes-since-midnight.
/// Returns `None` on malformed input; callers treat that as "no meeting
/// time on that day" rather than failing the whole section (spec.md §9,
/// open question b).
pub fn parse_time_str(slot: &str) -> Option<MinuteRange> {
    let (start_raw, end_raw) = slot.trim().split_once(" - ")?;
    let start = parse_hhmm_meridiem(start_raw.trim())?;
    let end = parse_hhmm_meridiem(end_raw.trim())?;
    Some((start, end))
}

fn parse_hhmm_meridiem(token: &str) -> Option<u32> {
    let (hhmm, meridiem) = token.rsplit_once(' ')?;
    let (hh, mm) = hhmm.split_once(':')?;
    let hour: u32 = hh.parse().ok()?;
    let minute: u32 = mm.parse().ok()?;
    if minute > 59 {
        return None;
    }

    let hour24 = match (meridiem.to_uppercase().as_str(), hour) {
        ("AM", 12) => 0,
        ("AM", h) if h <= 11 => h,
        ("PM", 12) => 12,
        ("PM", h) if h <= 11 => h + 12,
        _ => return None,
    };

    Some(hour24 * 60 + minute)
}

/// Maps a full weekday name to its day-letter (spec.md §4.4 step 5).
pub fn weekday_name_to_letter(name: &str) -> Option<char> {
    match name.to_lowercase().as_str() {
        "monday" => Some('M'),
        "tuesday" => Some('T'),
        "wednesday" => Some('W'),
        "thursday" => Some('R'),
        "friday" => Some('F'),
        _ => None,
    }
}

/// Parses a section's `times` string against its `days` string into
/// `day-letter -> [(start, end)]`.
///
/// `times` is either one slot applied to every day in `days`, or one slot
/// per day given one-per-line in the same positional order as `days`'
/// letters.
pub fn parse_section_schedule(days: &str, times: &str) -> HashMap<char, Vec<MinuteRange>> {
    let day_letters: Vec<char> = days.chars().filter(|c| !c.is_whitespace()).collect();
    let lines: Vec<&str> = times.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut out: HashMap<char, Vec<MinuteRange>> = HashMap::new();

    if lines.len() == day_letters.len() && lines.len() > 1 {
        for (letter, line) in day_letters.iter().zip(lines.iter()) {
            if let Some(range) = parse_time_str(line) {
                out.entry(*letter).or_default().push(range);
            }
        }
    } else if let Some(first) = lines.first() {
        if let Some(range) = parse_time_str(first) {
            for letter in &day_letters {
                out.entry(*letter).or_default().push(range);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_am_pm_slot() {
        assert_eq!(parse_time_str("10:00 AM - 11:20 AM"), Some((600, 680)));
    }

    #[test]
    fn midnight_and_noon_boundaries() {
        assert_eq!(parse_time_str("12:00 AM - 1:00 AM"), Some((0, 60)));
        assert_eq!(parse_time_str("12:00 PM - 1:00 PM"), Some((720, 780)));
    }

    #[test]
    fn malformed_slot_is_none() {
        assert_eq!(parse_time_str("garbage"), None);
        assert_eq!(parse_time_str("10:00 XX - 11:00 AM"), None);
    }

    #[test]
    fn same_slot_applies_to_every_day() {
        let schedule = parse_section_schedule("MW", "10:00 AM - 11:20 AM");
        assert_eq!(schedule.get(&'M'), Some(&vec![(600, 680)]));
        assert_eq!(schedule.get(&'W'), Some(&vec![(600, 680)]));
    }

    #[test]
    fn weekday_name_mapping() {
        assert_eq!(weekday_name_to_letter("Thursday"), Some('R'));
        assert_eq!(weekday_name_to_letter("nonsense"), None);
    }
}
