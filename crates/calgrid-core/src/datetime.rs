use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Months,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeDelta,
  Timelike,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const DEFAULT_TIMEZONE: &str = "UTC";

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn today_in(tz: Tz) -> NaiveDate {
  Utc::now()
    .with_timezone(&tz)
    .date_naive()
}

#[must_use]
pub fn start_of_day(
  date: NaiveDate
) -> NaiveDateTime {
  date.and_time(NaiveTime::MIN)
}

/// Last representable millisecond of
/// the day.
#[must_use]
pub fn end_of_day(
  date: NaiveDate
) -> NaiveDateTime {
  let end = NaiveTime::from_hms_milli_opt(
    23, 59, 59, 999
  )
  .unwrap_or(NaiveTime::MIN);
  date.and_time(end)
}

/// Saturates to `date` when the result
/// is out of range.
#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  checked_add_days(date, days)
    .unwrap_or(date)
}

#[must_use]
pub fn checked_add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  TimeDelta::try_days(days).and_then(
    |delta| {
      date.checked_add_signed(delta)
    }
  )
}

fn offset_regex()
-> &'static Result<Regex, regex::Error> {
  static OFFSET_RE: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  OFFSET_RE.get_or_init(|| {
    Regex::new(r"^([+-])(\d+)([dwm])$")
  })
}

fn clock_regex()
-> &'static Result<Regex, regex::Error> {
  static CLOCK_RE: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  CLOCK_RE.get_or_init(|| {
    Regex::new(
      r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
    )
  })
}

/// Day of month is clamped to the
/// length of the target month.
#[must_use]
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let magnitude =
    Months::new(months.unsigned_abs());
  let shifted = if months >= 0 {
    date.checked_add_months(magnitude)
  } else {
    date.checked_sub_months(magnitude)
  };
  shifted.unwrap_or(date)
}

#[must_use]
pub fn shift_years(
  date: NaiveDate,
  years: i32
) -> NaiveDate {
  shift_months(
    date,
    years.saturating_mul(12)
  )
}

#[must_use]
pub fn first_day_of_month(
  date: NaiveDate
) -> NaiveDate {
  date.with_day(1).unwrap_or(date)
}

#[must_use]
pub fn last_day_of_month(
  date: NaiveDate
) -> NaiveDate {
  add_days(
    shift_months(
      first_day_of_month(date),
      1
    ),
    -1
  )
}

#[must_use]
pub fn days_in_month(
  date: NaiveDate
) -> u32 {
  last_day_of_month(date).day()
}

/// ISO week: Monday starts the week.
#[must_use]
pub fn start_of_week(
  day: NaiveDate
) -> NaiveDate {
  let diff = day
    .weekday()
    .num_days_from_monday()
    as i64;
  add_days(day, -diff)
}

#[must_use]
pub fn end_of_week(
  day: NaiveDate
) -> NaiveDate {
  add_days(start_of_week(day), 6)
}

#[must_use]
pub fn is_weekend(
  date: NaiveDate
) -> bool {
  matches!(
    date.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

#[must_use]
pub fn minutes_since_midnight(
  time: NaiveTime
) -> u32 {
  time.hour() * 60 + time.minute()
}

/// Resolves a focus-date expression
/// against `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let lower =
    input.trim().to_ascii_lowercase();

  let named = match lower.as_str() {
    | "now" | "today" => Some(today),
    | "tomorrow" => {
      Some(add_days(today, 1))
    }
    | "yesterday" => {
      Some(add_days(today, -1))
    }
    | other => {
      parse_weekday_name(other)
        .map(|weekday| {
          next_weekday_date(
            today, weekday
          )
        })
        .or_else(|| {
          parse_month_name(other)
            .and_then(|month| {
              next_month_start(
                today, month
              )
            })
        })
    }
  };
  if let Some(date) = named {
    return Ok(date);
  }

  if let Some(date) =
    apply_offset(&lower, today)?
  {
    return Ok(date);
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      &lower, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if lower.len() == 4
    && lower
      .bytes()
      .all(|b| b.is_ascii_digit())
    && let Ok(year) = lower.parse::<i32>()
    && let Some(date) =
      NaiveDate::from_ymd_opt(year, 1, 1)
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .context(
    "expected today, tomorrow, \
     yesterday, a weekday or month \
     name, +Nd/+Nw/+Nm, a year or \
     YYYY-MM-DD"
  )
}

/// `+Nd`, `-Nw`, `+Nm` offsets.
/// `Ok(None)` when `token` is not an
/// offset.
fn apply_offset(
  token: &str,
  today: NaiveDate
) -> anyhow::Result<Option<NaiveDate>>
{
  let offset_re = offset_regex()
    .as_ref()
    .map_err(|e| {
      anyhow!("offset pattern: {e}")
    })?;
  let Some(caps) =
    offset_re.captures(token)
  else {
    return Ok(None);
  };

  let amount: i64 = caps[2]
    .parse()
    .context("offset out of range")?;
  let amount = if &caps[1] == "-" {
    -amount
  } else {
    amount
  };

  let date = match &caps[3] {
    | "d" => {
      checked_add_days(today, amount)
    }
    | "w" => {
      amount.checked_mul(7).and_then(
        |days| {
          checked_add_days(today, days)
        }
      )
    }
    | _ => {
      let months =
        u32::try_from(amount.unsigned_abs())
          .context(
            "month offset out of range"
          )?;
      if amount < 0 {
        today.checked_sub_months(
          Months::new(months)
        )
      } else {
        today.checked_add_months(
          Months::new(months)
        )
      }
    }
  };
  date
    .map(Some)
    .ok_or_else(|| {
      anyhow!(
        "offset out of range: {token}"
      )
    })
}

/// First day of the next `month`
/// strictly after the current one.
fn next_month_start(
  today: NaiveDate,
  month: u32
) -> Option<NaiveDate> {
  let year = if month <= today.month() {
    today.year().saturating_add(1)
  } else {
    today.year()
  };
  NaiveDate::from_ymd_opt(year, month, 1)
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

/// Accepts `15:23`, `9:05` and
/// `3:23pm` style clock times.
pub fn parse_clock_time(
  token: &str
) -> Option<NaiveTime> {
  let clock_re =
    clock_regex().as_ref().ok()?;
  let captures =
    clock_re.captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  if minute > 59 {
    return None;
  }

  let hour = if let Some(ampm_match) =
    captures.name("ampm")
  {
    let ampm = ampm_match
      .as_str()
      .to_ascii_lowercase();
    if raw_hour == 0 || raw_hour > 12 {
      return None;
    }
    match ampm.as_str() {
      | "am" => {
        if raw_hour == 12 {
          0
        } else {
          raw_hour
        }
      }
      | "pm" => {
        if raw_hour == 12 {
          12
        } else {
          raw_hour + 12
        }
      }
      | _ => return None
    }
  } else {
    if raw_hour > 23 {
      return None;
    }
    raw_hour
  };

  NaiveTime::from_hms_opt(
    hour, minute, 0
  )
}

#[cfg(test)]
mod tests {
  use chrono::{
    Datelike,
    NaiveDate,
    NaiveTime,
    Weekday
  };

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
  fn week_starts_on_monday() {
    let sunday = date(2026, 2, 22);
    assert_eq!(
      start_of_week(sunday),
      date(2026, 2, 16)
    );
    assert_eq!(
      start_of_week(date(2026, 2, 16)),
      date(2026, 2, 16)
    );
    assert_eq!(
      end_of_week(date(2026, 2, 18))
        .weekday(),
      Weekday::Sun
    );
  }

  #[test]
  fn shift_months_clamps_day() {
    assert_eq!(
      shift_months(date(2026, 1, 31), 1),
      date(2026, 2, 28)
    );
    assert_eq!(
      shift_months(date(2026, 3, 31), -1),
      date(2026, 2, 28)
    );
    assert_eq!(
      shift_years(date(2024, 2, 29), 1),
      date(2025, 2, 28)
    );
  }

  #[test]
  fn month_boundaries() {
    assert_eq!(
      last_day_of_month(date(2024, 2, 10)),
      date(2024, 2, 29)
    );
    assert_eq!(
      days_in_month(date(2026, 12, 3)),
      31
    );
    assert_eq!(
      first_day_of_month(date(2026, 12, 3)),
      date(2026, 12, 1)
    );
  }

  #[test]
  fn end_of_day_is_last_millisecond() {
    let end = end_of_day(date(2026, 2, 16));
    assert_eq!(
      end.time(),
      NaiveTime::from_hms_milli_opt(
        23, 59, 59, 999
      )
      .expect("valid time")
    );
  }

  #[test]
  fn parses_relative_and_named_dates() {
    let today = date(2026, 2, 17);
    assert_eq!(
      parse_date_expr("tomorrow", today)
        .expect("parse tomorrow"),
      date(2026, 2, 18)
    );
    assert_eq!(
      parse_date_expr("+2w", today)
        .expect("parse weeks"),
      date(2026, 3, 3)
    );
    assert_eq!(
      parse_date_expr("-1m", today)
        .expect("parse months"),
      date(2026, 1, 17)
    );
    assert_eq!(
      parse_date_expr("wednesday", today)
        .expect("parse weekday"),
      date(2026, 2, 18)
    );
    assert_eq!(
      parse_date_expr("march", today)
        .expect("parse month"),
      date(2026, 3, 1)
    );
    assert_eq!(
      parse_date_expr("2026-05-04", today)
        .expect("parse iso"),
      date(2026, 5, 4)
    );
    assert_eq!(
      parse_date_expr("2027", today)
        .expect("parse year"),
      date(2027, 1, 1)
    );
    assert!(
      parse_date_expr("someday", today)
        .is_err()
    );
    assert!(
      parse_date_expr("-999", today)
        .is_err()
    );
  }

  #[test]
  fn huge_offsets_are_errors() {
    let today = date(2026, 2, 18);
    for expr in [
      "+999999999999999d",
      "-999999999999999w",
      "+99999999m",
      "+99999999999999999999d"
    ] {
      let err = parse_date_expr(
        expr, today
      )
      .expect_err("out of range");
      assert!(
        format!("{err:#}")
          .contains("out of range"),
        "{expr}: {err:#}"
      );
    }
  }

  #[test]
  fn parses_clock_times() {
    assert_eq!(
      parse_clock_time("3:23pm"),
      NaiveTime::from_hms_opt(15, 23, 0)
    );
    assert_eq!(
      parse_clock_time("09:30"),
      NaiveTime::from_hms_opt(9, 30, 0)
    );
    assert_eq!(
      parse_clock_time("24:00"),
      None
    );
  }

  #[test]
  fn parses_known_timezone() {
    assert!(
      parse_timezone(
        "Europe/Berlin",
        "test"
      )
      .is_some()
    );
    assert!(
      parse_timezone("Nowhere/Else", "test")
        .is_none()
    );
  }
}
