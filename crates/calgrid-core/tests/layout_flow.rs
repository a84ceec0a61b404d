use std::io::Write;

use calgrid_core::color::DEFAULT_EVENT_COLOR;
use calgrid_core::commands::{Invocation, dispatch};
use calgrid_core::config::CalendarConfig;
use calgrid_core::render::Renderer;
use calgrid_core::source::{fill_default_duration, load_calendar};
use calgrid_core::state::CalendarSession;
use calgrid_core::view::ViewType;
use chrono::NaiveDate;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
default_view_type = "week"
default_view_date = "2026-02-18"
time_slot_duration = 60
max_events_per_day = 2
timezone = "UTC"
color = false

[working_hours]
start_hour = 8
end_hour = 18
"#;

const EVENTS: &str = r##"{
    "projects": [{"title": "Work", "color": "#3b82f6"}, {"title": "Home"}],
    "events": [
        {"id": "plan", "title": "Planning", "date": "2026-02-16", "time": "2026-02-16T09:00:00", "duration": 60, "project": "Work"},
        {"id": "sync", "title": "Sync", "date": "2026-02-16", "time": "2026-02-16T09:30:00", "duration": 60},
        {"id": "early", "title": "Early run", "date": "2026-02-16", "time": "2026-02-16T07:00:00", "duration": 30},
        {"id": "standup", "title": "Standup", "date": "2026-02-16", "time": "2026-02-16T10:00:00", "recurrenceType": "daily", "project": "Home"},
        {"id": "offsite", "title": "Offsite", "date": "2026-02-20"}
    ]
}"##;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, d).expect("valid date")
}

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

fn session() -> CalendarSession {
    let cfg = CalendarConfig::from_toml_str(CONFIG).expect("config");
    let events_file = temp_file(EVENTS);
    let mut data = load_calendar(events_file.path()).expect("load calendar");
    assert_eq!(fill_default_duration(&mut data.events, cfg.default_duration), 1);

    let mut session = CalendarSession::new(cfg, date(18));
    session.set_events(data.events);
    session.set_projects(data.projects);
    session
}

#[test]
fn week_layout_stacks_overlapping_events() {
    let mut session = session();
    assert_eq!(session.current_date(), date(18));
    let layout = session.layout().clone();

    assert_eq!(layout.view, ViewType::Week);
    assert_eq!(layout.days.len(), 7);
    assert_eq!(layout.slots.len(), 10);
    assert_eq!(layout.all_day_row_height, 2.25);

    let monday = layout.day(date(16)).expect("monday");
    assert_eq!(monday.clipped, 1);
    assert_eq!(monday.timed.len(), 3);

    let plan = monday.timed.iter().find(|p| p.event.id == "plan").expect("plan");
    let sync = monday.timed.iter().find(|p| p.event.id == "sync").expect("sync");
    let standup = monday.timed.iter().find(|p| p.event.id == "standup").expect("standup");
    assert_eq!(plan.position.top, 2.0);
    assert_eq!(plan.position.height, 2.0);
    assert_eq!(plan.position.left, 3.0);
    assert_eq!(sync.position.left, 3.0 + 48.25);
    assert_eq!(sync.position.width, 48.25);
    assert_eq!(standup.position.left, plan.position.left);
    assert!(!plan.shows_description);

    let recurring = layout
        .days
        .iter()
        .flat_map(|day| day.timed.iter())
        .filter(|placed| placed.event.id.starts_with("standup"))
        .count();
    assert_eq!(recurring, 7);

    let friday = layout.day(date(20)).expect("friday");
    assert_eq!(friday.all_day.len(), 1);
}

#[test]
fn month_cells_respect_the_event_limit() {
    let mut session = session();
    session.set_view_type(ViewType::Month);
    let layout = session.layout();

    assert_eq!(layout.days.len(), 42);
    let monday = layout.day(date(16)).expect("monday");
    assert_eq!(monday.all_day.len() + monday.timed.len(), 2);
    assert_eq!(monday.hidden, 2);
    assert!(layout.day(date(1)).is_some_and(|day| day.in_focus_month));
}

#[test]
fn projects_colour_their_events() {
    let session = session();
    let plan = session.find_event("plan").expect("plan");
    assert_eq!(session.event_color(&plan), "#3b82f699");

    let sync = session.find_event("sync").expect("sync");
    assert_eq!(session.event_color(&sync), format!("{DEFAULT_EVENT_COLOR}99"));

    let home = &session.projects()[1];
    assert_eq!(home.color.as_deref(), Some("#ef4444"));
}

#[test]
fn navigation_invalidates_the_cached_layout() {
    let mut session = session();
    let first = session.layout().title.clone();
    session.layout();
    assert_eq!(session.recomputations(), 1);

    session.navigate_next();
    let next = session.layout().title.clone();
    assert_ne!(first, next);
    assert_eq!(session.recomputations(), 2);
}

#[test]
fn expand_command_lists_recurring_instances() {
    let mut buf = Vec::new();
    {
        let mut renderer = Renderer::with_writer(false, &mut buf);
        let mut inv = Invocation {
            session: session(),
            renderer: &mut renderer,
            today: date(18),
            json: true,
        };
        dispatch(
            &mut inv,
            calgrid_core::cli::Command::Expand {
                from: "2026-02-17".into(),
                to: "2026-02-19".into(),
            },
        )
        .expect("expand");
    }

    let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
    let ids: Vec<&str> = value
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|event| event["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["standup_2026-02-17", "standup_2026-02-18", "standup_2026-02-19"]);
}
