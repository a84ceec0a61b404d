use chrono::{Duration, Months, NaiveDateTime};
use tracing::{debug, instrument, trace};

use crate::datetime::is_weekend;
use crate::event::{CalendarEvent, RecurrenceType, instance_id};

/// Upper bound on cursor advances per recurring event.
pub const MAX_RECURRENCE_STEPS: usize = 1000;

/// Advances `cursor` by one step of `rule`. `None` for non-recurring events
/// or when the calendar arithmetic overflows.
pub fn next_occurrence(rule: RecurrenceType, cursor: NaiveDateTime) -> Option<NaiveDateTime> {
    match rule {
        RecurrenceType::None => None,
        RecurrenceType::Daily => cursor.checked_add_signed(Duration::days(1)),
        RecurrenceType::Weekly => cursor.checked_add_signed(Duration::weeks(1)),
        RecurrenceType::Weekday => {
            let mut next = cursor.checked_add_signed(Duration::days(1))?;
            while is_weekend(next.date()) {
                next = next.checked_add_signed(Duration::days(1))?;
            }
            Some(next)
        }
        RecurrenceType::Monthly => cursor.checked_add_months(Months::new(1)),
        RecurrenceType::Yearly => cursor.checked_add_months(Months::new(12)),
    }
}

/// Occurrence instants of one event: the anchor first, then every step of
/// its rule until [`MAX_RECURRENCE_STEPS`] advances have been made.
#[derive(Debug, Clone)]
pub struct Occurrences {
    rule: RecurrenceType,
    next: Option<NaiveDateTime>,
    steps: usize,
    event_id: String,
}

impl Iterator for Occurrences {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if self.steps >= MAX_RECURRENCE_STEPS {
            debug!(
                event_id = %self.event_id,
                steps = self.steps,
                "recurrence step cap reached; truncating"
            );
            None
        } else {
            self.steps += 1;
            next_occurrence(self.rule, current)
        };
        Some(current)
    }
}

pub fn occurrences(event: &CalendarEvent) -> Occurrences {
    Occurrences {
        rule: event.recurrence_type,
        next: Some(event.effective_instant()),
        steps: 0,
        event_id: event.id.clone(),
    }
}

/// Concrete copy of `template` placed on the day of `occurrence`.
///
/// The id becomes `{id}_{YYYY-MM-DD}`; a timed template keeps its full
/// time-of-day (including sub-second precision) on the new day.
pub fn materialize(template: &CalendarEvent, occurrence: NaiveDateTime) -> CalendarEvent {
    let date = occurrence.date();
    CalendarEvent {
        id: instance_id(&template.id, date),
        date,
        time: template.time.map(|time| date.and_time(time.time())),
        ..template.clone()
    }
}

/// Events whose effective instant falls inside `[window_start, window_end]`,
/// with recurring templates expanded into one instance per occurrence.
///
/// A recurring template's own occurrence is returned unchanged (original
/// id); later occurrences are materialized. Output is not sorted.
#[instrument(skip(events), fields(events = events.len()))]
pub fn expand(
    events: &[CalendarEvent],
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Vec<CalendarEvent> {
    let in_window = |instant: NaiveDateTime| instant >= window_start && instant <= window_end;
    let mut expanded = Vec::new();

    for event in events {
        if in_window(event.effective_instant()) {
            expanded.push(event.clone());
        }

        if !event.is_recurring() {
            continue;
        }

        let mut produced = 0usize;
        for occurrence in occurrences(event).skip(1) {
            if occurrence > window_end {
                break;
            }
            if occurrence >= window_start {
                expanded.push(materialize(event, occurrence));
                produced += 1;
            }
        }
        trace!(
            event_id = %event.id,
            rule = event.recurrence_type.as_key(),
            produced,
            "expanded recurring event"
        );
    }

    debug!(instances = expanded.len(), "expansion finished");
    expanded
}

/// Stable chronological order by effective instant.
pub fn sort_chronologically(events: &mut [CalendarEvent]) {
    events.sort_by(CalendarEvent::cmp_by_start);
}
