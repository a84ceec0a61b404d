use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::cli::Command;
use crate::color::ColorAllocator;
use crate::datetime::{end_of_day, parse_clock_time, parse_date_expr, start_of_day};
use crate::drag::{DropTarget, MoveRequest, apply_move, resolve_drop};
use crate::gesture::{GestureOutcome, GestureSignal};
use crate::recurrence::{expand, sort_chronologically};
use crate::render::Renderer;
use crate::state::CalendarSession;
use crate::view::{ViewType, month_grid, time_slots};

/// Per-invocation context shared by every command.
pub struct Invocation<'r, 'w> {
    pub session: CalendarSession,
    pub renderer: &'r mut Renderer<'w>,
    pub today: NaiveDate,
    pub json: bool,
}

#[instrument(skip(inv))]
pub fn dispatch(inv: &mut Invocation<'_, '_>, command: Command) -> anyhow::Result<()> {
    debug!(
        date = %inv.session.current_date(),
        view = inv.session.view_type().as_key(),
        json = inv.json,
        "dispatching command"
    );

    match command {
        Command::View { view } => cmd_view(inv, view),
        Command::Expand { from, to } => cmd_expand(inv, &from, &to),
        Command::Slots => cmd_slots(inv),
        Command::Grid => cmd_grid(inv),
        Command::Move { id, to, at, view } => cmd_move(inv, &id, &to, at.as_deref(), view),
        Command::Colors { count } => cmd_colors(inv, count),
        Command::Gestures { file } => cmd_gestures(inv, &file),
    }
}

fn cmd_view(inv: &mut Invocation<'_, '_>, view: Option<ViewType>) -> anyhow::Result<()> {
    info!("command view");
    if let Some(view) = view {
        inv.session.set_view_type(view);
    }

    let layout = inv.session.layout().clone();
    if inv.json {
        return inv.renderer.print_json(&layout);
    }
    inv.renderer.print_layout(&layout, inv.session.projects())
}

fn cmd_expand(inv: &mut Invocation<'_, '_>, from: &str, to: &str) -> anyhow::Result<()> {
    info!("command expand");
    let start = parse_date_expr(from, inv.today).context("invalid --from")?;
    let end = parse_date_expr(to, inv.today).context("invalid --to")?;
    if end < start {
        bail!("--to ({end}) is before --from ({start})");
    }

    let mut instances = expand(inv.session.events(), start_of_day(start), end_of_day(end));
    sort_chronologically(&mut instances);
    debug!(instances = instances.len(), %start, %end, "expanded range");

    if inv.json {
        return inv.renderer.print_json(&instances);
    }
    inv.renderer.print_events(&instances)
}

fn cmd_slots(inv: &mut Invocation<'_, '_>) -> anyhow::Result<()> {
    info!("command slots");
    let cfg = inv.session.config();
    let slot_minutes = cfg.slot_minutes();
    let slots = time_slots(slot_minutes, cfg.working_hours.as_ref());

    if inv.json {
        return inv.renderer.print_json(&slots);
    }
    inv.renderer.print_slots(&slots, slot_minutes)
}

fn cmd_grid(inv: &mut Invocation<'_, '_>) -> anyhow::Result<()> {
    info!("command grid");
    let focus = inv.session.current_date();
    let days = month_grid(focus);

    if inv.json {
        return inv.renderer.print_json(&days);
    }
    inv.renderer.print_grid(&days, focus)
}

fn cmd_move(
    inv: &mut Invocation<'_, '_>,
    id: &str,
    to: &str,
    at: Option<&str>,
    view: Option<ViewType>,
) -> anyhow::Result<()> {
    info!("command move");
    let event = inv
        .session
        .find_event(id)
        .ok_or_else(|| anyhow!("no event with id `{id}` around {}", inv.session.current_date()))?;

    let date = parse_date_expr(to, inv.today).context("invalid --to")?;
    let target = match at {
        Some(raw) => {
            let time = parse_clock_time(raw).ok_or_else(|| anyhow!("invalid --at time: {raw}"))?;
            DropTarget::slot(date, time)
        }
        None => DropTarget::day(date),
    };

    let view = view.unwrap_or_else(|| inv.session.view_type());
    let request = resolve_drop(event.clone(), target, view);
    let moved = apply_move(&event, &request);
    debug!(event_id = %moved.id, new_date = %request.new_date, "resolved move");

    if inv.json {
        return inv.renderer.print_json(&json!({ "request": request, "event": moved }));
    }
    inv.renderer.print_move(&request, &moved)
}

fn cmd_colors(inv: &mut Invocation<'_, '_>, count: usize) -> anyhow::Result<()> {
    info!("command colors");
    let mut allocator = ColorAllocator::new();
    let colors: Vec<String> = (0..count).map(|_| allocator.allocate()).collect();

    if inv.json {
        return inv.renderer.print_json(&colors);
    }
    inv.renderer.print_colors(&colors)
}

fn cmd_gestures(inv: &mut Invocation<'_, '_>, file: &Path) -> anyhow::Result<()> {
    info!("command gestures");
    let signals = read_signals(file)?;

    let mut outcomes = Vec::with_capacity(signals.len());
    let mut moves: Vec<MoveRequest> = Vec::new();
    for signal in signals {
        let outcome = inv.session.handle_gesture(signal);
        if let GestureOutcome::Dropped(Some(request)) = &outcome {
            moves.push(request.clone());
        }
        outcomes.push(outcome);
    }

    let moved = inv.session.apply_moves(&moves);
    if moved < moves.len() {
        warn!(
            requested = moves.len(),
            moved, "some drops targeted recurring instances and were not stored"
        );
    }

    if inv.json {
        return inv.renderer.print_json(&json!({
            "outcomes": outcomes,
            "moved": moved,
            "currentDate": inv.session.current_date(),
        }));
    }
    inv.renderer.print_outcomes(&outcomes)
}

fn read_signals(path: &Path) -> anyhow::Result<Vec<GestureSignal>> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut signals = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let signal: GestureSignal = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        signals.push(signal);
    }
    debug!(signals = signals.len(), "read gesture signals");
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::CalendarConfig;
    use crate::event::CalendarEvent;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).expect("valid date")
    }

    fn session() -> CalendarSession {
        let mut session = CalendarSession::new(CalendarConfig::default(), date(2, 18));
        let start = date(2, 17).and_hms_opt(14, 0, 0).expect("valid time");
        session.set_events(vec![CalendarEvent::new_timed("review", "Review", start, 60)]);
        session
    }

    fn run(command: Command) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        {
            let mut renderer = Renderer::with_writer(false, &mut buf);
            let mut inv = Invocation {
                session: session(),
                renderer: &mut renderer,
                today: date(2, 18),
                json: true,
            };
            dispatch(&mut inv, command)?;
        }
        Ok(String::from_utf8(buf).expect("utf8"))
    }

    #[test]
    fn expand_rejects_inverted_range() {
        let err = run(Command::Expand {
            from: "2026-02-20".into(),
            to: "2026-02-10".into(),
        })
        .expect_err("inverted range");
        assert!(err.to_string().contains("before"));
    }

    #[test]
    fn move_to_slot_sets_new_time() {
        let out = run(Command::Move {
            id: "review".into(),
            to: "2026-02-19".into(),
            at: Some("9:30".into()),
            view: Some(ViewType::Week),
        })
        .expect("move");
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["request"]["newDate"], "2026-02-19");
        assert_eq!(value["event"]["time"], "2026-02-19T09:30:00");
    }

    #[test]
    fn move_unknown_event_fails() {
        let err = run(Command::Move {
            id: "missing".into(),
            to: "today".into(),
            at: None,
            view: None,
        })
        .expect_err("unknown id");
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn gestures_drag_and_drop_moves_stored_event() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"kind":"pan_start","point":{{"x":1.0,"y":1.0}},"event_id":"review"}}"#).expect("write");
        writeln!(file, "# hover").expect("write");
        writeln!(
            file,
            r#"{{"kind":"pan_move","point":{{"x":9.0,"y":4.0}},"target":{{"date":"2026-02-18","time":"11:00:00"}}}}"#
        )
        .expect("write");
        writeln!(file, r#"{{"kind":"pan_end"}}"#).expect("write");
        writeln!(file, r#"{{"kind":"swipe_left"}}"#).expect("write");

        let out = run(Command::Gestures {
            file: file.path().to_path_buf(),
        })
        .expect("gestures");
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["moved"], 1);
        assert_eq!(value["outcomes"].as_array().map(Vec::len), Some(4));
        assert_eq!(value["currentDate"], "2026-02-25");
    }

    #[test]
    fn slots_follow_configured_duration() {
        let out = run(Command::Slots).expect("slots");
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");
        let slots = value.as_array().expect("array");
        assert_eq!(slots.len(), 48);
        assert_eq!(slots[1]["time"], "00:30:00");
    }
}
