use crate::error::ScheduleError;
use chrono::{NaiveTime, Timelike};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

/// Weekday names indexed the way the schedule store numbers days (0 = Sunday).
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// A schedule row exactly as the schedule store sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub track_id: String,
    /// 0 = Sunday .. 6 = Saturday. Null = every day.
    #[serde(default)]
    pub day_of_week: Option<i64>,
    #[serde(default, deserialize_with = "time_text")]
    pub start_time: String,
    #[serde(default, deserialize_with = "time_text")]
    pub end_time: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// A validated recurring window binding a track to a day pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub track_id: String,
    pub day_of_week: Option<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Rotation priority. Not consulted when resolving reveals.
    pub priority: i32,
    pub is_active: bool,
}

impl ScheduleEntry {
    /// Validate a raw record. Rejects unparseable times, windows that do not
    /// end after they start (overnight spans are unsupported) and day numbers
    /// outside 0-6.
    pub fn from_record(record: &ScheduleRecord) -> Result<Self, ScheduleError> {
        let start_time =
            parse_time(&record.start_time).map_err(|_| ScheduleError::MalformedTime {
                entry_id: record.id.clone(),
                value: record.start_time.clone(),
            })?;
        let end_time =
            parse_time(&record.end_time).map_err(|_| ScheduleError::MalformedTime {
                entry_id: record.id.clone(),
                value: record.end_time.clone(),
            })?;

        if start_time >= end_time {
            return Err(ScheduleError::InvertedWindow {
                entry_id: record.id.clone(),
                start: record.start_time.clone(),
                end: record.end_time.clone(),
            });
        }

        let day_of_week = match record.day_of_week {
            None => None,
            Some(day) if (0..=6).contains(&day) => Some(day as u8),
            Some(day) => {
                return Err(ScheduleError::InvalidDay {
                    entry_id: record.id.clone(),
                    day,
                });
            }
        };

        Ok(ScheduleEntry {
            id: record.id.clone(),
            track_id: record.track_id.clone(),
            day_of_week,
            start_time,
            end_time,
            priority: record.priority,
            is_active: record.is_active,
        })
    }

    /// Minutes after midnight at which the window opens.
    pub fn start_minutes(&self) -> i64 {
        i64::from(self.start_time.hour() * 60 + self.start_time.minute())
    }

    /// Format the start time as HH:MM.
    pub fn time_display(&self) -> String {
        self.start_time.format("%H:%M").to_string()
    }

    /// Format the day field for display.
    pub fn day_display(&self) -> &'static str {
        match self.day_of_week {
            None => "daily",
            Some(d) => WEEKDAY_NAMES.get(d as usize).copied().unwrap_or("?"),
        }
    }
}

/// Validate every record, keeping the usable ones in their original order.
///
/// Rejected records are logged as configuration warnings and returned so the
/// caller can report them; they never reach the resolver.
pub fn validate_records(records: &[ScheduleRecord]) -> (Vec<ScheduleEntry>, Vec<ScheduleError>) {
    let mut entries = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for record in records {
        match ScheduleEntry::from_record(record) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!("Skipping schedule entry: {}", e);
                rejected.push(e);
            }
        }
    }
    (entries, rejected)
}

/// Parse a time string in HH:MM or HH:MM:SS format.
pub fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(d)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Times should arrive as text. Nulls and numbers are kept as text so the
/// row fails `parse_time` on its own instead of failing the whole document.
fn time_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(d)? {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    })
}
