use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::{
  DEFAULT_TIMEZONE,
  minutes_since_midnight,
  parse_clock_time,
  parse_timezone,
  today_in
};
use crate::event::DEFAULT_DURATION_MINUTES;
use crate::view::{
  ViewType,
  WorkingHours
};

pub const CONFIG_ENV: &str =
  "CALGRID_CONFIG";
const CONFIG_DIR: &str = "calgrid";
const CONFIG_FILE: &str =
  "calgrid.toml";

pub const SLOT_DURATIONS: [u32; 3] =
  [15, 30, 60];

fn default_duration() -> u32 {
  DEFAULT_DURATION_MINUTES
}

fn default_slot_duration() -> u32 {
  30
}

fn default_max_events_per_day() -> usize
{
  3
}

fn default_timezone() -> String {
  DEFAULT_TIMEZONE.to_string()
}

fn config_true() -> bool {
  true
}

/// Calendar settings. Dates in TOML
/// are quoted ISO strings
/// (`default_view_date =
/// "2026-02-16"`).
#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct CalendarConfig {
  #[serde(default = "default_duration")]
  pub default_duration:        u32,
  #[serde(default)]
  pub default_view_type:       ViewType,
  #[serde(default)]
  pub default_view_date:
    Option<NaiveDate>,
  #[serde(default = "config_true")]
  pub show_view_type_selector: bool,
  #[serde(
    default = "default_slot_duration"
  )]
  pub time_slot_duration:      u32,
  #[serde(
    default = "default_max_events_per_day"
  )]
  pub max_events_per_day:      usize,
  #[serde(default)]
  pub working_hours:
    Option<WorkingHours>,
  #[serde(default = "default_timezone")]
  pub timezone:                String,
  #[serde(default = "config_true")]
  pub color:                   bool,
  #[serde(skip)]
  pub loaded_from:
    Option<PathBuf>
}

impl Default for CalendarConfig {
  fn default() -> Self {
    Self {
      default_duration:
        default_duration(),
      default_view_type:
        ViewType::default(),
      default_view_date:       None,
      show_view_type_selector: true,
      time_slot_duration:
        default_slot_duration(),
      max_events_per_day:
        default_max_events_per_day(),
      working_hours:           None,
      timezone:
        default_timezone(),
      color:                   true,
      loaded_from:             None
    }
  }
}

impl CalendarConfig {
  /// Reads the config file chosen by
  /// [`resolve_config_path`]. An
  /// explicit path must exist; the
  /// implicit locations fall back to
  /// defaults.
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let explicit =
      override_path.is_some();
    let Some(path) =
      resolve_config_path(override_path)
    else {
      warn!(
        "no config file found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    if !path.exists() {
      if explicit {
        return Err(anyhow!(
          "config file {} does not \
           exist",
          path.display()
        ));
      }
      warn!(path = %path.display(), "config file missing; using defaults");
      return Ok(Self::default());
    }

    info!(path = %path.display(), "loading config");
    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg = Self::from_toml_str(
      &raw
    )
    .with_context(|| {
      format!(
        "failed to parse {}",
        path.display()
      )
    })?;
    cfg.loaded_from = Some(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut cfg: Self =
      toml::from_str(raw)
        .context("invalid config toml")?;
    cfg.sanitize();
    Ok(cfg)
  }

  /// Applies `key=value` pairs (an
  /// optional `rc.` prefix is
  /// stripped), then sanitizes.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self
        .set(&key, v.trim())
        .with_context(|| {
          format!(
            "invalid override \
             {key}={v}"
          )
        })?;
    }
    self.sanitize();
    Ok(())
  }

  fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    match key {
      | "default_duration" => {
        self.default_duration =
          value.parse()?;
      }
      | "default_view_type" => {
        self.default_view_type =
          ViewType::from_key(value)
            .ok_or_else(|| {
              anyhow!(
                "unknown view type"
              )
            })?;
      }
      | "default_view_date" => {
        self.default_view_date =
          if is_unset(value) {
            None
          } else {
            Some(
              NaiveDate::parse_from_str(
                value, "%Y-%m-%d"
              )?
            )
          };
      }
      | "show_view_type_selector" => {
        self.show_view_type_selector =
          parse_bool(value);
      }
      | "time_slot_duration" => {
        self.time_slot_duration =
          value.parse()?;
      }
      | "max_events_per_day" => {
        self.max_events_per_day =
          value.parse()?;
      }
      | "working_hours" => {
        self.working_hours =
          parse_working_hours(value)?;
      }
      | "timezone" => {
        self.timezone =
          value.to_string();
      }
      | "color" => {
        self.color = parse_bool(value);
      }
      | other => {
        return Err(anyhow!(
          "unknown config key \
           `{other}`"
        ));
      }
    }
    Ok(())
  }

  /// Replaces out-of-range values
  /// with defaults.
  pub fn sanitize(&mut self) {
    if !SLOT_DURATIONS
      .contains(&self.time_slot_duration)
    {
      warn!(
        value = self.time_slot_duration,
        "unsupported time slot \
         duration; using 30"
      );
      self.time_slot_duration =
        default_slot_duration();
    }

    if self.default_duration == 0 {
      self.default_duration =
        default_duration();
    }

    if self.max_events_per_day == 0 {
      self.max_events_per_day =
        default_max_events_per_day();
    }

    if let Some(hours) =
      self.working_hours.as_mut()
    {
      hours.start_hour =
        hours.start_hour.min(23);
      hours.start_minute =
        hours.start_minute.min(59);
      hours.end_hour =
        hours.end_hour.min(24);
      hours.end_minute =
        hours.end_minute.min(59);
      if hours.end_minutes()
        <= hours.start_minutes()
      {
        warn!(
          "working hours end before \
           they start; showing the \
           full day"
        );
        self.working_hours = None;
      }
    }

    if parse_timezone(
      &self.timezone,
      "config"
    )
    .is_none()
    {
      self.timezone =
        default_timezone();
    }
  }

  pub fn tz(&self) -> Tz {
    self
      .timezone
      .parse::<Tz>()
      .unwrap_or(Tz::UTC)
  }

  pub fn today(&self) -> NaiveDate {
    today_in(self.tz())
  }

  pub fn slot_minutes(&self) -> u32 {
    self.time_slot_duration
  }
}

/// `--config`, then `$CALGRID_CONFIG`
/// (`/dev/null` disables), then the
/// per-user config dir.
#[tracing::instrument(skip(
  override_path
))]
pub fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(expand_tilde(path));
  }

  if let Ok(from_env) =
    std::env::var(CONFIG_ENV)
  {
    if from_env == "/dev/null"
      || from_env.trim().is_empty()
    {
      return None;
    }
    return Some(expand_tilde(
      Path::new(&from_env)
    ));
  }

  let candidate = dirs::config_dir()?
    .join(CONFIG_DIR)
    .join(CONFIG_FILE);
  candidate
    .exists()
    .then_some(candidate)
}

/// `09:00-17:30`, or `none`/`off` for
/// the full day.
fn parse_working_hours(
  value: &str
) -> anyhow::Result<Option<WorkingHours>>
{
  if is_unset(value) {
    return Ok(None);
  }

  let (start, end) = value
    .split_once('-')
    .ok_or_else(|| {
      anyhow!("expected HH:MM-HH:MM")
    })?;
  let start = parse_clock_time(start)
    .ok_or_else(|| {
      anyhow!(
        "invalid start time `{start}`"
      )
    })?;

  let (end_hour, end_minute) =
    if end.trim() == "24:00" {
      (24, 0)
    } else {
      let end = parse_clock_time(end)
        .ok_or_else(|| {
          anyhow!(
            "invalid end time `{end}`"
          )
        })?;
      let minutes =
        minutes_since_midnight(end);
      (minutes / 60, minutes % 60)
    };

  let start_minutes =
    minutes_since_midnight(start);
  Ok(Some(WorkingHours {
    start_hour: start_minutes / 60,
    start_minute: start_minutes % 60,
    end_hour,
    end_minute
  }))
}

fn is_unset(value: &str) -> bool {
  matches!(
    value
      .trim()
      .to_ascii_lowercase()
      .as_str(),
    "" | "none" | "off"
  )
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
