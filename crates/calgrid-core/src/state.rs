use chrono::NaiveDate;
use tracing::{debug, info, instrument, trace};

use crate::color::{ColorAllocator, assign_project_colors, event_color};
use crate::config::CalendarConfig;
use crate::drag::{DragSession, MoveRequest, apply_move};
use crate::event::{CalendarEvent, CalendarProject};
use crate::gesture::{GestureOutcome, GestureSignal};
use crate::layout::{ViewLayout, build_layout};
use crate::recurrence::expand;
use crate::view::{ViewType, navigate, view_window};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LayoutKey {
    events_version: u64,
    current_date: NaiveDate,
    view_type: ViewType,
    config_version: u64,
}

/// One calendar instance: focus date, view, events, projects, config, the
/// drag record and the colour allocator. Layouts are cached until one of
/// their inputs changes.
#[derive(Debug)]
pub struct CalendarSession {
    today: NaiveDate,
    current_date: NaiveDate,
    view_type: ViewType,
    events: Vec<CalendarEvent>,
    projects: Vec<CalendarProject>,
    config: CalendarConfig,
    events_version: u64,
    config_version: u64,
    drag: DragSession,
    colors: ColorAllocator,
    cached: Option<(LayoutKey, ViewLayout)>,
    recomputations: u64,
}

impl CalendarSession {
    pub fn new(config: CalendarConfig, today: NaiveDate) -> Self {
        Self::with_allocator(config, today, ColorAllocator::new())
    }

    pub fn with_allocator(config: CalendarConfig, today: NaiveDate, colors: ColorAllocator) -> Self {
        let current_date = config.default_view_date.unwrap_or(today);
        let view_type = config.default_view_type;
        debug!(%today, %current_date, view = view_type.as_key(), "session created");
        Self {
            today,
            current_date,
            view_type,
            events: Vec::new(),
            projects: Vec::new(),
            config,
            events_version: 0,
            config_version: 0,
            drag: DragSession::new(),
            colors,
            cached: None,
            recomputations: 0,
        }
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn projects(&self) -> &[CalendarProject] {
        &self.projects
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn drag(&self) -> &DragSession {
        &self.drag
    }

    /// Layout rebuilds so far; cache hits do not count.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn set_events(&mut self, events: Vec<CalendarEvent>) {
        self.events = events;
        self.events_version += 1;
    }

    /// Replaces the project list, colouring projects that have none. The
    /// allocator starts over so colours follow the list order.
    pub fn set_projects(&mut self, projects: Vec<CalendarProject>) {
        self.colors.reset();
        self.projects = projects;
        let assigned = assign_project_colors(&mut self.projects, &mut self.colors);
        debug!(projects = self.projects.len(), assigned, "projects updated");
    }

    pub fn set_config(&mut self, mut config: CalendarConfig) {
        config.sanitize();
        self.config = config;
        self.config_version += 1;
    }

    pub fn set_current_date(&mut self, date: NaiveDate) {
        self.current_date = date;
    }

    pub fn set_view_type(&mut self, view: ViewType) {
        self.view_type = view;
    }

    pub fn navigate_previous(&mut self) -> NaiveDate {
        self.current_date = navigate(self.current_date, self.view_type, -1);
        self.current_date
    }

    pub fn navigate_next(&mut self) -> NaiveDate {
        self.current_date = navigate(self.current_date, self.view_type, 1);
        self.current_date
    }

    pub fn navigate_today(&mut self) -> NaiveDate {
        self.current_date = self.today;
        self.current_date
    }

    fn key(&self) -> LayoutKey {
        LayoutKey {
            events_version: self.events_version,
            current_date: self.current_date,
            view_type: self.view_type,
            config_version: self.config_version,
        }
    }

    /// Layout of the current view, rebuilt only when events, focus date,
    /// view type or config changed since the last call.
    pub fn layout(&mut self) -> &ViewLayout {
        let key = self.key();
        if self.cached.as_ref().is_some_and(|(cached_key, _)| *cached_key != key) {
            self.cached = None;
        }

        let (_, layout) = self.cached.get_or_insert_with(|| {
            self.recomputations += 1;
            trace!(?key, "recomputing layout");
            (key, build_layout(&self.events, self.current_date, self.view_type, &self.config))
        });
        layout
    }

    pub fn event_color(&self, event: &CalendarEvent) -> String {
        event_color(event, &self.projects)
    }

    /// Finds `id` among the stored events, then among the recurring
    /// instances visible in the current view.
    pub fn find_event(&self, id: &str) -> Option<CalendarEvent> {
        if let Some(event) = self.events.iter().find(|event| event.id == id) {
            return Some(event.clone());
        }
        let (start, end) = view_window(self.current_date, self.view_type).bounds();
        expand(&self.events, start, end)
            .into_iter()
            .find(|event| event.id == id)
    }

    #[instrument(skip(self), fields(view = self.view_type.as_key()))]
    pub fn handle_gesture(&mut self, signal: GestureSignal) -> GestureOutcome {
        if let Some(step) = signal.swipe_step() {
            let date = navigate(self.current_date, self.view_type, step);
            self.current_date = date;
            return GestureOutcome::Navigated(date);
        }

        match signal {
            GestureSignal::PanStart { point, event_id } => {
                let Some(event) = event_id.as_deref().and_then(|id| self.find_event(id)) else {
                    trace!(?event_id, "pan started away from an event");
                    return GestureOutcome::Ignored;
                };
                let event_id = event.id.clone();
                self.drag.start(event, point);
                GestureOutcome::DragStarted { event_id }
            }
            GestureSignal::PanMove { point, target } => {
                if !self.drag.is_dragging() {
                    return GestureOutcome::Ignored;
                }
                self.drag.update_position(point);
                self.drag.set_drop_target(target);
                self.drag.set_hovered_slot(target.filter(|target| target.is_slot()));
                GestureOutcome::DragMoved
            }
            GestureSignal::PanEnd => {
                if !self.drag.is_dragging() {
                    return GestureOutcome::Ignored;
                }
                GestureOutcome::Dropped(self.drag.finish(self.view_type))
            }
            GestureSignal::SwipeLeft | GestureSignal::SwipeRight => GestureOutcome::Ignored,
        }
    }

    /// Applies move requests to the stored events. A request for a
    /// materialized recurring instance has no stored counterpart and is
    /// skipped. Returns the number of events changed.
    pub fn apply_moves(&mut self, requests: &[MoveRequest]) -> usize {
        let mut moved = 0;
        for request in requests {
            let Some(stored) = self.events.iter_mut().find(|event| event.id == request.event.id) else {
                debug!(event_id = %request.event.id, "no stored event for move");
                continue;
            };
            *stored = apply_move(stored, request);
            moved += 1;
        }
        if moved > 0 {
            self.events_version += 1;
            info!(moved, "applied moves");
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDateTime, NaiveTime};

    use super::*;
    use crate::drag::{DragPoint, DropTarget};
    use crate::event::RecurrenceType;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).expect("valid date")
    }

    fn at(m: u32, d: u32, h: u32) -> NaiveDateTime {
        date(m, d).and_hms_opt(h, 0, 0).expect("valid time")
    }

    fn session() -> CalendarSession {
        let mut session = CalendarSession::new(CalendarConfig::default(), date(2, 18));
        session.set_events(vec![
            CalendarEvent::new_timed("review", "Review", at(2, 17, 14), 60),
            CalendarEvent::new_all_day("trip", "Trip", date(2, 19)),
            CalendarEvent::new_timed("gym", "Gym", at(2, 16, 7), 45).with_recurrence(RecurrenceType::Daily),
        ]);
        session
    }

    #[test]
    fn config_defaults_seed_the_session() {
        let config = CalendarConfig {
            default_view_type: ViewType::Month,
            default_view_date: Some(date(3, 1)),
            ..CalendarConfig::default()
        };
        let session = CalendarSession::new(config, date(2, 18));
        assert_eq!(session.view_type(), ViewType::Month);
        assert_eq!(session.current_date(), date(3, 1));
    }

    #[test]
    fn layout_is_cached_until_an_input_changes() {
        let mut session = session();
        let first = session.layout().clone();
        session.layout();
        assert_eq!(session.recomputations(), 1);

        session.set_current_date(date(2, 18));
        session.layout();
        assert_eq!(session.recomputations(), 1);

        session.navigate_next();
        let next = session.layout().clone();
        assert_eq!(session.recomputations(), 2);
        assert_ne!(first.range, next.range);

        session.set_view_type(ViewType::Month);
        session.layout();
        session.set_config(CalendarConfig::default());
        session.layout();
        session.set_events(Vec::new());
        session.layout();
        assert_eq!(session.recomputations(), 5);
    }

    #[test]
    fn navigation_follows_view_type() {
        let mut session = session();
        assert_eq!(session.navigate_next(), date(2, 25));
        session.set_view_type(ViewType::Month);
        assert_eq!(session.navigate_previous(), date(1, 25));
        session.set_view_type(ViewType::Day);
        assert_eq!(session.navigate_today(), date(2, 18));
    }

    #[test]
    fn swipes_navigate() {
        let mut session = session();
        assert_eq!(
            session.handle_gesture(GestureSignal::SwipeLeft),
            GestureOutcome::Navigated(date(2, 25))
        );
        assert_eq!(
            session.handle_gesture(GestureSignal::SwipeRight),
            GestureOutcome::Navigated(date(2, 18))
        );
    }

    #[test]
    fn pan_sequence_emits_move_and_applies_it() {
        let mut session = session();
        let started = session.handle_gesture(GestureSignal::PanStart {
            point: DragPoint::new(5.0, 5.0),
            event_id: Some("review".to_string()),
        });
        assert_eq!(started, GestureOutcome::DragStarted { event_id: "review".to_string() });

        let target = DropTarget::slot(date(2, 20), NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"));
        session.handle_gesture(GestureSignal::PanMove {
            point: DragPoint::new(50.0, 90.0),
            target: Some(target),
        });
        assert!(session.drag().is_hovered(target.date, NaiveTime::from_hms_opt(10, 0, 0).expect("valid time")));

        let GestureOutcome::Dropped(Some(request)) = session.handle_gesture(GestureSignal::PanEnd) else {
            panic!("expected a drop");
        };
        assert!(!session.drag().is_dragging());

        let before = session.recomputations();
        session.layout();
        assert_eq!(session.apply_moves(&[request]), 1);
        session.layout();
        assert_eq!(session.recomputations(), before + 2);

        let moved = session.find_event("review").expect("stored");
        assert_eq!(moved.time, Some(at(2, 20, 10)));
    }

    #[test]
    fn day_drop_in_week_view_stores_an_all_day_event() {
        let mut session = session();
        session.handle_gesture(GestureSignal::PanStart {
            point: DragPoint::default(),
            event_id: Some("review".to_string()),
        });
        session.handle_gesture(GestureSignal::PanMove {
            point: DragPoint::default(),
            target: Some(DropTarget::day(date(2, 19))),
        });
        let GestureOutcome::Dropped(Some(request)) = session.handle_gesture(GestureSignal::PanEnd) else {
            panic!("expected a drop");
        };
        assert_eq!(request.new_time, None);
        assert_eq!(session.apply_moves(&[request]), 1);

        let moved = session.find_event("review").expect("stored");
        assert!(moved.is_all_day());
        assert_eq!(moved.date, date(2, 19));
    }

    #[test]
    fn pan_over_recurring_instance_drags_the_instance() {
        let mut session = session();
        let outcome = session.handle_gesture(GestureSignal::PanStart {
            point: DragPoint::default(),
            event_id: Some("gym_2026-02-18".to_string()),
        });
        assert_eq!(outcome, GestureOutcome::DragStarted { event_id: "gym_2026-02-18".to_string() });

        session.handle_gesture(GestureSignal::PanMove {
            point: DragPoint::default(),
            target: Some(DropTarget::day(date(2, 21))),
        });
        let GestureOutcome::Dropped(Some(request)) = session.handle_gesture(GestureSignal::PanEnd) else {
            panic!("expected a drop");
        };
        assert_eq!(request.new_time, None);
        assert_eq!(session.apply_moves(&[request]), 0);
    }

    #[test]
    fn pan_without_drag_is_ignored() {
        let mut session = session();
        assert_eq!(session.handle_gesture(GestureSignal::PanEnd), GestureOutcome::Ignored);
        assert_eq!(
            session.handle_gesture(GestureSignal::PanStart {
                point: DragPoint::default(),
                event_id: Some("missing".to_string()),
            }),
            GestureOutcome::Ignored
        );
    }

    #[test]
    fn projects_get_palette_colors() {
        let mut session = session();
        session.set_projects(vec![CalendarProject::new("Work"), CalendarProject::new("Home")]);
        let event = CalendarEvent::new_all_day("x", "X", date(2, 18)).with_project("Home");
        assert_eq!(session.event_color(&event), "#f9731699");

        session.set_projects(vec![CalendarProject::new("Home")]);
        assert_eq!(session.event_color(&event), "#ef444499");
    }
}
