use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::event::CalendarEvent;
use crate::view::ViewType;

/// Pointer position in host screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DragPoint {
    pub x: f64,
    pub y: f64,
}

impl DragPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Where the host resolved the pointer to: a time slot (`time` set) or a
/// whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
}

impl DropTarget {
    pub fn day(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    pub fn slot(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time: Some(time),
        }
    }

    pub fn is_slot(&self) -> bool {
        self.time.is_some()
    }
}

/// Reschedule request emitted on drop. The host owns the event list and
/// decides whether to apply it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub event: CalendarEvent,
    pub new_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveDrag {
    event: CalendarEvent,
    position: DragPoint,
    drop_target: Option<DropTarget>,
    hovered_slot: Option<DropTarget>,
}

/// Single drag record: idle, or one event being dragged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragSession {
    active: Option<ActiveDrag>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins dragging `event`, replacing any drag in progress.
    pub fn start(&mut self, event: CalendarEvent, position: DragPoint) {
        debug!(event_id = %event.id, "drag started");
        self.active = Some(ActiveDrag {
            event,
            position,
            drop_target: None,
            hovered_slot: None,
        });
    }

    pub fn update_position(&mut self, position: DragPoint) {
        if let Some(active) = self.active.as_mut() {
            active.position = position;
        }
    }

    pub fn set_drop_target(&mut self, target: Option<DropTarget>) {
        if let Some(active) = self.active.as_mut() {
            trace!(?target, "drop target changed");
            active.drop_target = target;
        }
    }

    pub fn set_hovered_slot(&mut self, slot: Option<DropTarget>) {
        if let Some(active) = self.active.as_mut() {
            active.hovered_slot = slot;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn dragged_event(&self) -> Option<&CalendarEvent> {
        self.active.as_ref().map(|active| &active.event)
    }

    pub fn position(&self) -> Option<DragPoint> {
        self.active.as_ref().map(|active| active.position)
    }

    pub fn drop_target(&self) -> Option<DropTarget> {
        self.active.as_ref().and_then(|active| active.drop_target)
    }

    pub fn hovered_slot(&self) -> Option<DropTarget> {
        self.active.as_ref().and_then(|active| active.hovered_slot)
    }

    pub fn is_hovered(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.hovered_slot() == Some(DropTarget::slot(date, time))
    }

    pub fn cancel(&mut self) {
        if self.active.take().is_some() {
            debug!("drag cancelled");
        }
    }

    /// Ends the drag. Yields a move request when an event was dropped on a
    /// target; the session is idle afterwards either way.
    pub fn finish(&mut self, view: ViewType) -> Option<MoveRequest> {
        let active = self.active.take()?;
        let Some(target) = active.drop_target else {
            debug!(event_id = %active.event.id, "drag ended without a drop target");
            return None;
        };
        Some(resolve_drop(active.event, target, view))
    }
}

/// New date/time for a dropped event: the slot's time when dropped on a
/// slot; a timed event dropped on a month-view day keeps its time-of-day;
/// otherwise no time.
pub fn resolve_drop(event: CalendarEvent, target: DropTarget, view: ViewType) -> MoveRequest {
    let new_time = match (target.time, event.time_of_day(), view) {
        (Some(time), _, _) => Some(time),
        (None, Some(original), ViewType::Month) => Some(original),
        (None, _, _) => None,
    };
    debug!(
        event_id = %event.id,
        new_date = %target.date,
        new_time = ?new_time,
        view = view.as_key(),
        "resolved drop"
    );
    MoveRequest {
        event,
        new_date: target.date,
        new_time,
    }
}

/// Host-side update for a move: the date is replaced and the event takes
/// the requested time. A request without a time yields an all-day event.
pub fn apply_move(event: &CalendarEvent, request: &MoveRequest) -> CalendarEvent {
    let time = request.new_time.map(|time| request.new_date.and_time(time));
    CalendarEvent {
        date: request.new_date,
        time,
        ..event.clone()
    }
}
