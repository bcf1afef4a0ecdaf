//! Schedule resolver. Finds the next hidden-track reveal.
//!
//! Pure function of `(now, entries, tracks)`: no clock reads, no I/O, no
//! panics. Malformed data degrades to "no result".

use crate::schedule::{ScheduleEntry, WEEKDAY_NAMES};
use crate::track::Track;
use chrono::{Datelike, NaiveDateTime, Timelike};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Day offsets scanned per entry: today plus the following six days.
const SCAN_DAYS: i64 = 7;

/// The nearest qualifying occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingReveal {
    pub track: Track,
    pub entry: ScheduleEntry,
    /// Seconds until the window opens. Always positive.
    pub starts_in_seconds: i64,
    /// Days from today (0 = today).
    pub day_offset: u8,
    /// "Today", "Tomorrow" or a weekday name.
    pub day_label: String,
    /// Start time as HH:MM.
    pub time_label: String,
}

/// Resolve the next reveal among hidden ("leak") tracks.
pub fn resolve(
    now: NaiveDateTime,
    entries: &[ScheduleEntry],
    tracks: &[Track],
) -> Option<UpcomingReveal> {
    resolve_with(now, entries, tracks, |track| track.is_hidden)
}

/// Resolve the next occurrence among entries whose track satisfies
/// `participates`.
///
/// Ties on start time go to the entry that appears first in `entries`.
/// Entries pointing at unknown tracks are skipped.
pub fn resolve_with<P>(
    now: NaiveDateTime,
    entries: &[ScheduleEntry],
    tracks: &[Track],
    participates: P,
) -> Option<UpcomingReveal>
where
    P: Fn(&Track) -> bool,
{
    let by_id: HashMap<&str, &Track> = tracks.iter().map(|t| (t.id.as_str(), t)).collect();
    let today = i64::from(now.weekday().num_days_from_sunday());
    let current_minutes = i64::from(now.hour() * 60 + now.minute());

    let mut best: Option<(i64, i64, &ScheduleEntry, &Track)> = None;

    for entry in entries.iter().filter(|e| e.is_active) {
        let Some(&track) = by_id.get(entry.track_id.as_str()) else {
            debug!(
                "Schedule entry {} references unknown track {}",
                entry.id, entry.track_id
            );
            continue;
        };
        if !participates(track) {
            continue;
        }
        let Some((offset, minutes_until)) = next_occurrence(entry, today, current_minutes) else {
            continue;
        };
        // Strict comparison keeps the earliest entry on ties.
        if best.is_none_or(|(best_minutes, ..)| minutes_until < best_minutes) {
            best = Some((minutes_until, offset, entry, track));
        }
    }

    let (minutes_until, offset, entry, track) = best?;
    Some(UpcomingReveal {
        track: track.clone(),
        entry: entry.clone(),
        starts_in_seconds: minutes_until * 60 - i64::from(now.second()),
        day_offset: offset as u8,
        day_label: day_label(offset, today),
        time_label: entry.time_display(),
    })
}

/// First `(offset, minutes_until)` within the scan window, if any.
///
/// A slot whose start minute equals the current minute has already passed.
fn next_occurrence(entry: &ScheduleEntry, today: i64, current_minutes: i64) -> Option<(i64, i64)> {
    (0..SCAN_DAYS).find_map(|offset| {
        let weekday = (today + offset) % 7;
        if entry
            .day_of_week
            .is_some_and(|day| i64::from(day) != weekday)
        {
            return None;
        }
        let minutes_until = offset * MINUTES_PER_DAY + entry.start_minutes() - current_minutes;
        (minutes_until > 0).then_some((offset, minutes_until))
    })
}

fn day_label(offset: i64, today: i64) -> String {
    match offset {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => WEEKDAY_NAMES[((today + offset) % 7) as usize].to_string(),
    }
}
