use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::event::{CalendarEvent, CalendarProject};

/// Events and projects read from an input file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CalendarData {
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    #[serde(default)]
    pub projects: Vec<CalendarProject>,
}

/// Reads a calendar file in one of three shapes: a JSON array of events,
/// an object with `events` and `projects`, or one event per line (JSONL).
#[tracing::instrument]
pub fn load_calendar(path: &Path) -> anyhow::Result<CalendarData> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let trimmed = raw.trim_start();

    let data = if trimmed.starts_with('[') {
        let events: Vec<CalendarEvent> =
            serde_json::from_str(trimmed).with_context(|| format!("failed parsing {}", path.display()))?;
        CalendarData {
            events,
            projects: Vec::new(),
        }
    } else if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed)
        && (map.contains_key("events") || map.contains_key("projects"))
    {
        serde_json::from_value(serde_json::Value::Object(map))
            .with_context(|| format!("failed parsing {}", path.display()))?
    } else {
        CalendarData {
            events: load_jsonl(path)?,
            projects: Vec::new(),
        }
    };

    debug!(
        events = data.events.len(),
        projects = data.projects.len(),
        "loaded calendar file"
    );
    Ok(data)
}

pub fn load_events(path: &Path) -> anyhow::Result<Vec<CalendarEvent>> {
    Ok(load_calendar(path)?.events)
}

fn load_jsonl(path: &Path) -> anyhow::Result<Vec<CalendarEvent>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: CalendarEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(event);
    }
    Ok(out)
}

/// Gives timed events without a duration the configured default. Returns
/// how many events were changed.
pub fn fill_default_duration(events: &mut [CalendarEvent], minutes: u32) -> usize {
    let mut filled = 0;
    for event in events.iter_mut().filter(|event| event.is_timed() && event.duration.is_none()) {
        event.duration = Some(minutes);
        filled += 1;
    }
    filled
}
