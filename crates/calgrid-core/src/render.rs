use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::config::CalendarConfig;
use crate::drag::MoveRequest;
use crate::event::{CalendarEvent, CalendarProject};
use crate::gesture::GestureOutcome;
use crate::layout::{DayLayout, ViewLayout};
use crate::view::{TimeSlot, ViewType, is_same_month};

pub struct Renderer<'a> {
    color: bool,
    out: Box<dyn Write + 'a>,
}

impl Renderer<'static> {
    pub fn stdout(cfg: &CalendarConfig) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
            out: Box::new(io::stdout()),
        }
    }
}

impl<'a> Renderer<'a> {
    pub fn with_writer(color: bool, out: impl Write + 'a) -> Self {
        Self {
            color,
            out: Box::new(out),
        }
    }

    pub fn print_json<T: Serialize + ?Sized>(&mut self, value: &T) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, value)?;
        writeln!(self.out)?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(view = layout.view.as_key()))]
    pub fn print_layout(&mut self, layout: &ViewLayout, projects: &[CalendarProject]) -> anyhow::Result<()> {
        let heading = self.paint(&layout.title, "1");
        writeln!(self.out, "{heading}")?;

        match layout.view {
            ViewType::Month => self.print_month(layout),
            ViewType::Day | ViewType::Week => {
                writeln!(
                    self.out,
                    "{}-minute slots, {} rows",
                    layout.slot_minutes,
                    layout.slots.len()
                )?;
                for day in &layout.days {
                    self.print_grid_day(day, projects)?;
                }
                Ok(())
            }
        }
    }

    fn print_grid_day(&mut self, day: &DayLayout, projects: &[CalendarProject]) -> anyhow::Result<()> {
        writeln!(self.out)?;
        let label = self.paint(&day.date.format("%a %Y-%m-%d").to_string(), "33");
        writeln!(self.out, "{label}")?;

        if !day.all_day.is_empty() {
            let titles: Vec<&str> = day.all_day.iter().map(|event| event.title.as_str()).collect();
            writeln!(self.out, "  all-day: {}", titles.join(", "))?;
        }

        if day.timed.is_empty() {
            if day.all_day.is_empty() {
                writeln!(self.out, "  (no events)")?;
            }
        } else {
            let headers = ["Start", "End", "Title", "Stack", "Top", "Height", "Left", "Width"]
                .map(str::to_string)
                .to_vec();
            let rows: Vec<Vec<String>> = day
                .timed
                .iter()
                .map(|placed| {
                    let event = &placed.event;
                    let start = event.effective_instant().format("%H:%M").to_string();
                    let end = event.effective_end().format("%H:%M").to_string();
                    let swatch = self.swatch(&crate::color::event_color(event, projects));
                    vec![
                        start,
                        end,
                        format!("{swatch}{}", event.title),
                        placed.position.z_index.to_string(),
                        format!("{:.2}", placed.position.top),
                        format!("{:.2}", placed.position.height),
                        format!("{:.2}", placed.position.left),
                        format!("{:.2}", placed.position.width),
                    ]
                })
                .collect();
            write_table(&mut self.out, headers, rows)?;
        }

        if day.clipped > 0 {
            writeln!(self.out, "  ({} outside the visible hours)", day.clipped)?;
        }
        Ok(())
    }

    fn print_month(&mut self, layout: &ViewLayout) -> anyhow::Result<()> {
        let headers = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
            .map(str::to_string)
            .to_vec();
        let rows: Vec<Vec<String>> = layout
            .days
            .chunks(7)
            .map(|week| {
                week.iter()
                    .map(|day| {
                        let count = day.all_day.len() + day.timed.len() + day.hidden;
                        let cell = if count == 0 {
                            format!("{:>2}", day.date.day())
                        } else {
                            format!("{:>2} [{count}]", day.date.day())
                        };
                        if day.in_focus_month {
                            cell
                        } else {
                            self.paint(&cell, "2")
                        }
                    })
                    .collect()
            })
            .collect();
        write_table(&mut self.out, headers, rows)?;

        for day in layout.days.iter().filter(|day| !day.all_day.is_empty() || !day.timed.is_empty()) {
            let mut items: Vec<String> = day.all_day.iter().map(|event| event.title.clone()).collect();
            items.extend(day.timed.iter().map(|placed| {
                format!(
                    "{} {}",
                    placed.event.effective_instant().format("%H:%M"),
                    placed.event.title
                )
            }));
            if day.hidden > 0 {
                items.push(format!("+{} more", day.hidden));
            }
            writeln!(self.out, "{}  {}", day.date.format("%b %d"), items.join(", "))?;
        }
        Ok(())
    }

    pub fn print_events(&mut self, events: &[CalendarEvent]) -> anyhow::Result<()> {
        let headers = ["ID", "Date", "Time", "Dur", "Repeat", "Project", "Title"]
            .map(str::to_string)
            .to_vec();
        let rows: Vec<Vec<String>> = events
            .iter()
            .map(|event| {
                let time = event
                    .time_of_day()
                    .map(|time| time.format("%H:%M").to_string())
                    .unwrap_or_else(|| "all-day".to_string());
                vec![
                    self.paint(&event.id, "33"),
                    event.date.format("%Y-%m-%d").to_string(),
                    time,
                    format!("{}m", event.effective_duration()),
                    event.recurrence_type.as_key().to_string(),
                    event.project.clone().unwrap_or_default(),
                    event.title.clone(),
                ]
            })
            .collect();
        write_table(&mut self.out, headers, rows)?;
        writeln!(self.out, "{} event(s)", events.len())?;
        Ok(())
    }

    pub fn print_slots(&mut self, slots: &[TimeSlot], slot_minutes: u32) -> anyhow::Result<()> {
        let headers = vec!["#".to_string(), "Slot".to_string()];
        let rows: Vec<Vec<String>> = slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| vec![(idx + 1).to_string(), slot.label.clone()])
            .collect();
        write_table(&mut self.out, headers, rows)?;
        writeln!(self.out, "{} slot(s) of {slot_minutes} minutes", slots.len())?;
        Ok(())
    }

    pub fn print_grid(&mut self, days: &[NaiveDate], focus: NaiveDate) -> anyhow::Result<()> {
        let heading = self.paint(&focus.format("%B %Y").to_string(), "1");
        writeln!(self.out, "{heading}")?;
        let headers = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
            .map(str::to_string)
            .to_vec();
        let rows: Vec<Vec<String>> = days
            .chunks(7)
            .map(|week| {
                week.iter()
                    .map(|day| {
                        let cell = format!("{:>2}", day.day());
                        if *day == focus {
                            self.paint(&cell, "7")
                        } else if is_same_month(*day, focus) {
                            cell
                        } else {
                            self.paint(&cell, "2")
                        }
                    })
                    .collect()
            })
            .collect();
        write_table(&mut self.out, headers, rows)
    }

    pub fn print_move(&mut self, request: &MoveRequest, moved: &CalendarEvent) -> anyhow::Result<()> {
        let before = &request.event;
        writeln!(self.out, "event     {}", before.id)?;
        writeln!(self.out, "title     {}", before.title)?;
        writeln!(self.out, "from      {}", describe_when(before))?;
        writeln!(self.out, "to        {}", describe_when(moved))?;
        if let Some(time) = request.new_time {
            writeln!(self.out, "slot      {}", time.format("%H:%M"))?;
        }
        Ok(())
    }

    pub fn print_colors(&mut self, colors: &[String]) -> anyhow::Result<()> {
        let headers = vec!["#".to_string(), "Color".to_string()];
        let rows: Vec<Vec<String>> = colors
            .iter()
            .enumerate()
            .map(|(idx, color)| vec![(idx + 1).to_string(), format!("{}{color}", self.swatch(color))])
            .collect();
        write_table(&mut self.out, headers, rows)
    }

    pub fn print_outcomes(&mut self, outcomes: &[GestureOutcome]) -> anyhow::Result<()> {
        for (idx, outcome) in outcomes.iter().enumerate() {
            let line = match outcome {
                GestureOutcome::Ignored => "ignored".to_string(),
                GestureOutcome::DragStarted { event_id } => format!("drag started: {event_id}"),
                GestureOutcome::DragMoved => "drag moved".to_string(),
                GestureOutcome::Dropped(None) => "dropped outside a target".to_string(),
                GestureOutcome::Dropped(Some(request)) => {
                    let time = request
                        .new_time
                        .map(|time| format!(" {}", time.format("%H:%M")))
                        .unwrap_or_default();
                    format!("move {} -> {}{time}", request.event.id, request.new_date)
                }
                GestureOutcome::Navigated(date) => format!("navigated to {date}"),
            };
            writeln!(self.out, "{:>3}  {line}", idx + 1)?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    /// Coloured block for `#rrggbb` colours; empty when colour is off or
    /// the colour is not hex.
    fn swatch(&self, color: &str) -> String {
        if !self.color {
            return String::new();
        }
        match parse_hex(color) {
            Some((r, g, b)) => format!("\x1b[38;2;{r};{g};{b}m■\x1b[0m "),
            None => String::new(),
        }
    }
}

fn describe_when(event: &CalendarEvent) -> String {
    match event.time {
        Some(time) => format!("{} ({}m)", time.format("%Y-%m-%d %H:%M"), event.effective_duration()),
        None => format!("{} (all-day)", event.date.format("%Y-%m-%d")),
    }
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() < 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn write_table<W: Write + ?Sized>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, width) in widths.iter().enumerate() {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
