use std::cmp::Ordering;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DURATION_MINUTES: u32 = 60;

const INSTANCE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    #[default]
    None,
    Daily,
    Weekly,
    Weekday,
    Monthly,
    Yearly,
}

impl RecurrenceType {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_recurring(self) -> bool {
        !self.is_none()
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Weekday => "weekday",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// A calendar entry as supplied by the host application.
///
/// `time` present means the event is timed; absent means all-day. Producers
/// keep `time` on the same calendar day as `date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveDateTime>,

    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default, skip_serializing_if = "RecurrenceType::is_none")]
    pub recurrence_type: RecurrenceType,
}

impl CalendarEvent {
    pub fn new_all_day(id: impl Into<String>, title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            date,
            time: None,
            duration: None,
            project: None,
            recurrence_type: RecurrenceType::None,
        }
    }

    pub fn new_timed(
        id: impl Into<String>,
        title: impl Into<String>,
        start: NaiveDateTime,
        duration: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            date: start.date(),
            time: Some(start),
            duration: Some(duration),
            project: None,
            recurrence_type: RecurrenceType::None,
        }
    }

    pub fn with_recurrence(mut self, recurrence_type: RecurrenceType) -> Self {
        self.recurrence_type = recurrence_type;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn is_all_day(&self) -> bool {
        self.time.is_none()
    }

    pub fn is_timed(&self) -> bool {
        self.time.is_some()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_type.is_recurring()
    }

    /// `time` when timed, otherwise local midnight of `date`.
    pub fn effective_instant(&self) -> NaiveDateTime {
        self.time
            .unwrap_or_else(|| self.date.and_time(NaiveTime::MIN))
    }

    pub fn effective_duration(&self) -> u32 {
        self.duration.unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    pub fn effective_end(&self) -> NaiveDateTime {
        self.effective_instant() + Duration::minutes(i64::from(self.effective_duration()))
    }

    pub fn time_of_day(&self) -> Option<NaiveTime> {
        self.time.map(|time| time.time())
    }

    /// Half-open interval test; touching events do not overlap.
    pub fn overlaps(&self, other: &CalendarEvent) -> bool {
        self.effective_instant() < other.effective_end()
            && other.effective_instant() < self.effective_end()
    }

    pub fn cmp_by_start(&self, other: &CalendarEvent) -> Ordering {
        self.effective_instant().cmp(&other.effective_instant())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarProject {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CalendarProject {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            color: None,
        }
    }
}

pub fn instance_id(original_id: &str, date: NaiveDate) -> String {
    format!("{original_id}_{}", date.format(INSTANCE_DATE_FORMAT))
}

/// Splits a materialized instance id back into the template id and the
/// occurrence date. Returns `None` for ids without an ISO date suffix.
pub fn parse_instance_id(id: &str) -> Option<(&str, NaiveDate)> {
    let (original, suffix) = id.rsplit_once('_')?;
    let date = NaiveDate::parse_from_str(suffix, INSTANCE_DATE_FORMAT).ok()?;
    Some((original, date))
}
