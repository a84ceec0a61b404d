use chrono::{
  Datelike,
  NaiveDate,
  NaiveDateTime,
  NaiveTime
};
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  add_days,
  end_of_day,
  end_of_week,
  first_day_of_month,
  shift_months,
  start_of_day,
  start_of_week
};

/// Cells of a month grid: six full
/// weeks.
pub const MONTH_GRID_DAYS: usize = 42;

const MONTH_OPTION_SPAN: i32 = 6;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
  Day,
  #[default]
  Week,
  Month
}

impl ViewType {
  pub fn all() -> [Self; 3] {
    [Self::Day, Self::Week, Self::Month]
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Day => "day",
      | Self::Week => "week",
      | Self::Month => "month"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Day => "Day",
      | Self::Week => "Week",
      | Self::Month => "Month"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "day" => Some(Self::Day),
      | "week" => Some(Self::Week),
      | "month" => Some(Self::Month),
      | _ => None
    }
  }
}

/// Inclusive range of calendar days.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate
}

impl DateRange {
  pub fn new(
    start: NaiveDate,
    end: NaiveDate
  ) -> Self {
    Self {
      start,
      end
    }
  }

  /// Query window for the recurrence
  /// expander: start of the first day
  /// through the last millisecond of
  /// the last day.
  pub fn bounds(
    &self
  ) -> (NaiveDateTime, NaiveDateTime)
  {
    (
      start_of_day(self.start),
      end_of_day(self.end)
    )
  }

  pub fn contains(
    &self,
    date: NaiveDate
  ) -> bool {
    date >= self.start
      && date <= self.end
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = NaiveDate>
  {
    self
      .start
      .iter_days()
      .take_while({
        let end = self.end;
        move |day| *day <= end
      })
  }

  pub fn len(&self) -> usize {
    self.days().count()
  }

  pub fn is_empty(&self) -> bool {
    self.end < self.start
  }
}

/// Day: the day. Week: the ISO week
/// around it. Month: the 42-day grid
/// that shows the month.
pub fn view_window(
  current: NaiveDate,
  view: ViewType
) -> DateRange {
  match view {
    | ViewType::Day => {
      DateRange::new(current, current)
    }
    | ViewType::Week => {
      DateRange::new(
        start_of_week(current),
        end_of_week(current)
      )
    }
    | ViewType::Month => {
      let start = start_of_week(
        first_day_of_month(current)
      );
      DateRange::new(
        start,
        add_days(
          start,
          MONTH_GRID_DAYS as i64 - 1
        )
      )
    }
  }
}

pub fn month_grid(
  date: NaiveDate
) -> Vec<NaiveDate> {
  view_window(date, ViewType::Month)
    .days()
    .collect()
}

pub fn week_days(
  date: NaiveDate
) -> Vec<NaiveDate> {
  view_window(date, ViewType::Week)
    .days()
    .collect()
}

/// Visible part of the day. Absent
/// fields default to a full day.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct WorkingHours {
  #[serde(default)]
  pub start_hour:   u32,
  #[serde(default)]
  pub start_minute: u32,
  #[serde(default = "full_day_end_hour")]
  pub end_hour:     u32,
  #[serde(default)]
  pub end_minute:   u32
}

fn full_day_end_hour() -> u32 {
  24
}

impl Default for WorkingHours {
  fn default() -> Self {
    Self {
      start_hour:   0,
      start_minute: 0,
      end_hour:     full_day_end_hour(),
      end_minute:   0
    }
  }
}

impl WorkingHours {
  pub fn start_minutes(&self) -> u32 {
    self.start_hour * 60
      + self.start_minute
  }

  pub fn end_minutes(&self) -> u32 {
    self.end_hour * 60 + self.end_minute
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct TimeSlot {
  pub time:  NaiveTime,
  pub label: String
}

/// Slots from the working start up to
/// (not including) the working end,
/// never past 23:59.
pub fn time_slots(
  slot_minutes: u32,
  working_hours: Option<&WorkingHours>
) -> Vec<TimeSlot> {
  let hours = working_hours
    .copied()
    .unwrap_or_default();
  let step = slot_minutes.max(1);
  let end = hours.end_minutes();

  let mut slots = Vec::new();
  let mut total = hours.start_minutes();
  while total < end {
    let hour = total / 60;
    if hour >= 24 {
      break;
    }
    let Some(time) =
      NaiveTime::from_hms_opt(
        hour,
        total % 60,
        0
      )
    else {
      break;
    };
    slots.push(TimeSlot {
      time,
      label: time
        .format("%H:%M")
        .to_string()
    });
    total += step;
  }

  tracing::trace!(
    slot_minutes,
    slots = slots.len(),
    "generated time slots"
  );
  slots
}

/// Moves the focus date by `step`
/// periods of `view`.
pub fn navigate(
  current: NaiveDate,
  view: ViewType,
  step: i32
) -> NaiveDate {
  match view {
    | ViewType::Day => {
      add_days(current, i64::from(step))
    }
    | ViewType::Week => {
      add_days(
        current,
        i64::from(step) * 7
      )
    }
    | ViewType::Month => {
      shift_months(current, step)
    }
  }
}

pub fn title_for(
  date: NaiveDate,
  view: ViewType
) -> String {
  match view {
    | ViewType::Day => {
      date
        .format("%A, %B %-d, %Y")
        .to_string()
    }
    | ViewType::Week => {
      let start = start_of_week(date);
      let end = end_of_week(date);
      format!(
        "{} - {}",
        start.format("%b %-d"),
        end.format("%b %-d, %Y")
      )
    }
    | ViewType::Month => {
      date
        .format("%B %Y")
        .to_string()
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct MonthOption {
  pub value: NaiveDate,
  pub label: String
}

/// Jump targets six months either
/// side of `current`, day clamped.
pub fn month_options(
  current: NaiveDate
) -> Vec<MonthOption> {
  (-MONTH_OPTION_SPAN
    ..=MONTH_OPTION_SPAN)
    .map(|offset| {
      let value =
        shift_months(current, offset);
      MonthOption {
        value,
        label: value
          .format("%B %Y")
          .to_string()
      }
    })
    .collect()
}

pub fn is_same_month(
  a: NaiveDate,
  b: NaiveDate
) -> bool {
  a.year() == b.year()
    && a.month() == b.month()
}

#[cfg(test)]
mod tests {
  use chrono::Weekday;

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn week_window_runs_monday_to_sunday()
  {
    let range = view_window(
      date(2026, 2, 18),
      ViewType::Week
    );
    assert_eq!(
      range.start,
      date(2026, 2, 16)
    );
    assert_eq!(
      range.end,
      date(2026, 2, 22)
    );
    assert_eq!(range.len(), 7);
  }

  #[test]
  fn sunday_belongs_to_preceding_week()
  {
    let range = view_window(
      date(2026, 2, 22),
      ViewType::Week
    );
    assert_eq!(
      range.start,
      date(2026, 2, 16)
    );
  }

  #[test]
  fn month_grid_always_has_42_days() {
    for month in 1..=12 {
      let grid =
        month_grid(date(2026, month, 15));
      assert_eq!(
        grid.len(),
        MONTH_GRID_DAYS
      );
      assert_eq!(
        grid[0].weekday(),
        Weekday::Mon
      );
      assert!(
        grid.contains(&date(
          2026, month, 1
        ))
      );
    }

    let feb = month_grid(date(2026, 2, 1));
    assert_eq!(feb[0], date(2026, 1, 26));
    assert_eq!(feb[41], date(2026, 3, 8));
  }

  #[test]
  fn bounds_cover_whole_days() {
    let range = view_window(
      date(2026, 2, 16),
      ViewType::Day
    );
    let (start, end) = range.bounds();
    assert_eq!(
      start,
      start_of_day(date(2026, 2, 16))
    );
    assert_eq!(
      end,
      end_of_day(date(2026, 2, 16))
    );
  }

  #[test]
  fn full_day_hourly_slots() {
    let slots = time_slots(60, None);
    assert_eq!(slots.len(), 24);
    assert_eq!(slots[0].label, "00:00");
    assert_eq!(slots[23].label, "23:00");
  }

  #[test]
  fn working_hours_bound_the_slots() {
    let hours = WorkingHours {
      start_hour:   9,
      start_minute: 0,
      end_hour:     17,
      end_minute:   0
    };
    let slots =
      time_slots(30, Some(&hours));
    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0].label, "09:00");
    assert_eq!(
      slots
        .last()
        .map(|slot| slot.label.as_str()),
      Some("16:30")
    );
  }

  #[test]
  fn slots_stop_at_midnight() {
    let hours = WorkingHours {
      start_hour:   22,
      start_minute: 0,
      end_hour:     26,
      end_minute:   0
    };
    let slots =
      time_slots(60, Some(&hours));
    let labels: Vec<&str> = slots
      .iter()
      .map(|slot| slot.label.as_str())
      .collect();
    assert_eq!(labels, vec![
      "22:00", "23:00"
    ]);
  }

  #[test]
  fn navigation_steps_by_period() {
    let focus = date(2026, 1, 31);
    assert_eq!(
      navigate(focus, ViewType::Day, 1),
      date(2026, 2, 1)
    );
    assert_eq!(
      navigate(
        focus,
        ViewType::Week,
        -1
      ),
      date(2026, 1, 24)
    );
    assert_eq!(
      navigate(
        focus,
        ViewType::Month,
        1
      ),
      date(2026, 2, 28)
    );
  }

  #[test]
  fn titles_per_view() {
    let focus = date(2026, 2, 16);
    assert_eq!(
      title_for(focus, ViewType::Day),
      "Monday, February 16, 2026"
    );
    assert_eq!(
      title_for(focus, ViewType::Week),
      "Feb 16 - Feb 22, 2026"
    );
    assert_eq!(
      title_for(
        focus,
        ViewType::Month
      ),
      "February 2026"
    );
  }

  #[test]
  fn month_options_span_a_year_each_way()
  {
    let options =
      month_options(date(2026, 8, 31));
    assert_eq!(options.len(), 13);
    assert_eq!(
      options[0].value,
      date(2026, 2, 28)
    );
    assert_eq!(
      options[6].label,
      "August 2026"
    );
    assert_eq!(
      options[12].label,
      "February 2027"
    );
  }

  #[test]
  fn view_keys_round_trip() {
    for view in ViewType::all() {
      assert_eq!(
        ViewType::from_key(
          view.as_key()
        ),
        Some(view)
      );
    }
    assert_eq!(
      ViewType::from_key(" Month "),
      Some(ViewType::Month)
    );
    assert_eq!(
      ViewType::from_key("year"),
      None
    );
  }
}
