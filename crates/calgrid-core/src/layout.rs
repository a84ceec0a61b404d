use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::CalendarConfig;
use crate::datetime::minutes_since_midnight;
use crate::event::CalendarEvent;
use crate::filter::{all_day_events, all_day_row_height, events_on, timed_events, visible_events};
use crate::geometry::{EventPosition, position, position_in_slot, shows_description};
use crate::overlap::{StackMetrics, placements_by_index};
use crate::recurrence::{expand, sort_chronologically};
use crate::view::{DateRange, TimeSlot, ViewType, is_same_month, time_slots, title_for, view_window};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedEvent {
    pub event: CalendarEvent,
    pub position: EventPosition,
    pub shows_description: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayLayout {
    pub date: NaiveDate,
    pub in_focus_month: bool,
    pub all_day: Vec<CalendarEvent>,
    pub timed: Vec<PlacedEvent>,
    /// Events cut by the month cell limit.
    pub hidden: usize,
    /// Timed events starting outside the generated slots.
    pub clipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewLayout {
    pub view: ViewType,
    pub range: DateRange,
    pub title: String,
    pub slot_minutes: u32,
    pub slots: Vec<TimeSlot>,
    pub all_day_row_height: f64,
    pub days: Vec<DayLayout>,
}

impl ViewLayout {
    pub fn day(&self, date: NaiveDate) -> Option<&DayLayout> {
        self.days.iter().find(|day| day.date == date)
    }

    pub fn event_count(&self) -> usize {
        self.days
            .iter()
            .map(|day| day.all_day.len() + day.timed.len())
            .sum()
    }
}

/// Full pipeline for one view: window, recurrence expansion, per-day
/// selection, stacking and geometry.
#[instrument(skip(events, config), fields(events = events.len(), view = view.as_key()))]
pub fn build_layout(
    events: &[CalendarEvent],
    current: NaiveDate,
    view: ViewType,
    config: &CalendarConfig,
) -> ViewLayout {
    let range = view_window(current, view);
    let (window_start, window_end) = range.bounds();
    let mut instances = expand(events, window_start, window_end);
    sort_chronologically(&mut instances);

    let slot_minutes = config.slot_minutes();
    let (slots, days): (Vec<TimeSlot>, Vec<DayLayout>) = match view {
        ViewType::Day | ViewType::Week => {
            let slots = time_slots(slot_minutes, config.working_hours.as_ref());
            let days = range
                .days()
                .map(|date| grid_day(&instances, date, current, &slots, slot_minutes))
                .collect();
            (slots, days)
        }
        ViewType::Month => {
            let days = range
                .days()
                .map(|date| month_day(&instances, date, current, config))
                .collect();
            (Vec::new(), days)
        }
    };

    let row_height = match view {
        ViewType::Month => 0.0,
        ViewType::Day | ViewType::Week => {
            let max_all_day = days.iter().map(|day| day.all_day.len()).max().unwrap_or(0);
            all_day_row_height(max_all_day)
        }
    };

    let layout = ViewLayout {
        view,
        range,
        title: title_for(current, view),
        slot_minutes,
        slots,
        all_day_row_height: row_height,
        days,
    };
    debug!(
        instances = instances.len(),
        placed = layout.event_count(),
        "layout built"
    );
    layout
}

/// Day/week column. `top` is relative to the first slot; timed events
/// starting outside the slot range are only counted.
fn grid_day(
    instances: &[CalendarEvent],
    date: NaiveDate,
    current: NaiveDate,
    slots: &[TimeSlot],
    slot_minutes: u32,
) -> DayLayout {
    let all_day = all_day_events(instances, date);
    let timed = timed_events(instances, date);

    let Some(origin) = slots.first().map(|slot| slot.time) else {
        return DayLayout {
            date,
            in_focus_month: is_same_month(date, current),
            all_day,
            clipped: timed.len(),
            timed: Vec::new(),
            hidden: 0,
        };
    };

    let from = minutes_since_midnight(origin);
    let to = from + slot_minutes * slots.len() as u32;
    let (inside, outside): (Vec<CalendarEvent>, Vec<CalendarEvent>) =
        timed.into_iter().partition(|event| {
            event
                .time_of_day()
                .map(minutes_since_midnight)
                .is_some_and(|start| start >= from && start < to)
        });

    let placements = placements_by_index(&inside, &StackMetrics::default());
    let placed = inside
        .into_iter()
        .zip(placements)
        .map(|(event, placement)| {
            let span = position_in_slot(&event, origin, slot_minutes);
            PlacedEvent {
                position: EventPosition::combine(span, &placement),
                shows_description: shows_description(&event, slot_minutes),
                event,
            }
        })
        .collect();

    DayLayout {
        date,
        in_focus_month: is_same_month(date, current),
        all_day,
        timed: placed,
        hidden: 0,
        clipped: outside.len(),
    }
}

/// Month cell: all-day events first, then timed ones, cut at the per-day
/// limit.
fn month_day(
    instances: &[CalendarEvent],
    date: NaiveDate,
    current: NaiveDate,
    config: &CalendarConfig,
) -> DayLayout {
    let mut ordered = events_on(instances, date);
    ordered.sort_by_key(|event| event.is_timed());
    let visible = visible_events(&ordered, config.max_events_per_day);

    let (all_day, timed): (Vec<CalendarEvent>, Vec<CalendarEvent>) =
        visible.shown.into_iter().partition(CalendarEvent::is_all_day);
    let timed = timed
        .into_iter()
        .map(|event| PlacedEvent {
            position: EventPosition::full_width(position(&event, config.slot_minutes())),
            shows_description: false,
            event,
        })
        .collect();

    DayLayout {
        date,
        in_focus_month: is_same_month(date, current),
        all_day,
        timed,
        hidden: visible.hidden,
        clipped: 0,
    }
}
