use chrono::{
  NaiveDate,
  NaiveTime
};
use serde::Serialize;
use tracing::trace;

use crate::datetime::{
  add_days,
  end_of_day,
  last_day_of_month,
  minutes_since_midnight,
  start_of_day
};
use crate::event::CalendarEvent;

/// Layout units of one all-day chip
/// including its margin.
const ALL_DAY_CHIP_HEIGHT: f64 = 1.75;
const ALL_DAY_ROW_PADDING: f64 = 0.5;
const ALL_DAY_ROW_MIN_HEIGHT: f64 = 2.0;

fn in_days(
  event: &CalendarEvent,
  first: NaiveDate,
  last: NaiveDate
) -> bool {
  let instant =
    event.effective_instant();
  instant >= start_of_day(first)
    && instant <= end_of_day(last)
}

/// Events whose effective instant
/// falls on `date`.
pub fn events_on(
  events: &[CalendarEvent],
  date: NaiveDate
) -> Vec<CalendarEvent> {
  events
    .iter()
    .filter(|event| {
      event.effective_instant().date()
        == date
    })
    .cloned()
    .collect()
}

pub fn events_in_week(
  events: &[CalendarEvent],
  week_start: NaiveDate
) -> Vec<CalendarEvent> {
  let last = add_days(week_start, 6);
  events
    .iter()
    .filter(|event| {
      in_days(event, week_start, last)
    })
    .cloned()
    .collect()
}

pub fn events_in_month(
  events: &[CalendarEvent],
  month_start: NaiveDate
) -> Vec<CalendarEvent> {
  let last =
    last_day_of_month(month_start);
  events
    .iter()
    .filter(|event| {
      in_days(event, month_start, last)
    })
    .cloned()
    .collect()
}

pub fn all_day_events(
  events: &[CalendarEvent],
  date: NaiveDate
) -> Vec<CalendarEvent> {
  events
    .iter()
    .filter(|event| {
      event.is_all_day()
        && event.date == date
    })
    .cloned()
    .collect()
}

/// Timed events on `date` in start
/// order.
pub fn timed_events(
  events: &[CalendarEvent],
  date: NaiveDate
) -> Vec<CalendarEvent> {
  let mut timed: Vec<CalendarEvent> =
    events
      .iter()
      .filter(|event| {
        event
          .time
          .is_some_and(|time| {
            time.date() == date
          })
      })
      .cloned()
      .collect();
  timed.sort_by(
    CalendarEvent::cmp_by_start
  );
  timed
}

/// Timed events on `date` that start
/// inside `[slot_start, slot_start +
/// slot_minutes)`.
pub fn events_starting_in_slot(
  events: &[CalendarEvent],
  date: NaiveDate,
  slot_start: NaiveTime,
  slot_minutes: u32
) -> Vec<CalendarEvent> {
  let from =
    minutes_since_midnight(slot_start);
  let to = from + slot_minutes;

  let matched: Vec<CalendarEvent> =
    timed_events(events, date)
      .into_iter()
      .filter(|event| {
        event.time_of_day().is_some_and(
          |time| {
            let start =
              minutes_since_midnight(
                time
              );
            start >= from && start < to
          }
        )
      })
      .collect();

  trace!(
    %date,
    slot = %slot_start.format("%H:%M"),
    matched = matched.len(),
    "selected slot events"
  );
  matched
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct Visible {
  pub shown:  Vec<CalendarEvent>,
  pub hidden: usize
}

/// First `max` events plus the count
/// behind the "N more" link.
pub fn visible_events(
  events: &[CalendarEvent],
  max: usize
) -> Visible {
  let shown_len = events.len().min(max);
  Visible {
    shown:  events[..shown_len]
      .to_vec(),
    hidden: events.len() - shown_len
  }
}

/// Height in layout units of the
/// all-day row holding `max_events`
/// chips.
pub fn all_day_row_height(
  max_events: usize
) -> f64 {
  if max_events == 0 {
    return ALL_DAY_ROW_MIN_HEIGHT;
  }
  max_events as f64
    * ALL_DAY_CHIP_HEIGHT
    + ALL_DAY_ROW_PADDING
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDateTime;

  use super::*;

  fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, d)
      .expect("valid date")
  }

  fn at(
    d: u32,
    h: u32,
    m: u32
  ) -> NaiveDateTime {
    date(d)
      .and_hms_opt(h, m, 0)
      .expect("valid time")
  }

  fn sample() -> Vec<CalendarEvent> {
    vec![
      CalendarEvent::new_timed(
        "late",
        "Late",
        at(16, 14, 10),
        30
      ),
      CalendarEvent::new_all_day(
        "holiday",
        "Holiday",
        date(16)
      ),
      CalendarEvent::new_timed(
        "early",
        "Early",
        at(16, 9, 0),
        60
      ),
      CalendarEvent::new_timed(
        "sunday",
        "Sunday",
        at(22, 23, 30),
        30
      ),
      CalendarEvent::new_all_day(
        "march",
        "March",
        NaiveDate::from_ymd_opt(
          2026, 3, 1
        )
        .expect("valid date")
      ),
    ]
  }

  fn ids(
    events: &[CalendarEvent]
  ) -> Vec<&str> {
    events
      .iter()
      .map(|event| event.id.as_str())
      .collect()
  }

  #[test]
  fn day_selection_splits_all_day_and_timed()
   {
    let events = sample();
    assert_eq!(
      ids(&events_on(&events, date(16))),
      vec!["late", "holiday", "early"]
    );
    assert_eq!(
      ids(&all_day_events(
        &events,
        date(16)
      )),
      vec!["holiday"]
    );
    assert_eq!(
      ids(&timed_events(
        &events,
        date(16)
      )),
      vec!["early", "late"]
    );
  }

  #[test]
  fn week_includes_late_sunday_event()
  {
    let events = sample();
    assert_eq!(
      ids(&events_in_week(
        &events,
        date(16)
      )),
      vec![
        "late", "holiday", "early",
        "sunday"
      ]
    );
  }

  #[test]
  fn month_stops_at_last_day() {
    let events = sample();
    let feb =
      events_in_month(&events, date(1));
    assert_eq!(feb.len(), 4);
    assert!(
      !ids(&feb).contains(&"march")
    );
  }

  #[test]
  fn slot_selection_uses_start_only() {
    let events = sample();
    let slot = NaiveTime::from_hms_opt(
      14, 0, 0
    )
    .expect("valid time");
    assert_eq!(
      ids(&events_starting_in_slot(
        &events,
        date(16),
        slot,
        30
      )),
      vec!["late"]
    );

    let nine_thirty =
      NaiveTime::from_hms_opt(9, 30, 0)
        .expect("valid time");
    assert!(
      events_starting_in_slot(
        &events,
        date(16),
        nine_thirty,
        30
      )
      .is_empty()
    );
  }

  #[test]
  fn visible_events_reports_overflow() {
    let events = sample();
    let visible =
      visible_events(&events, 3);
    assert_eq!(visible.shown.len(), 3);
    assert_eq!(visible.hidden, 2);

    let all =
      visible_events(&events[..2], 3);
    assert_eq!(all.hidden, 0);
  }

  #[test]
  fn all_day_row_grows_with_chips() {
    assert_eq!(
      all_day_row_height(0),
      2.0
    );
    assert_eq!(
      all_day_row_height(2),
      4.0
    );
  }
}
