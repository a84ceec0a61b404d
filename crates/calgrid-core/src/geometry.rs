use chrono::NaiveTime;
use serde::Serialize;

use crate::datetime::minutes_since_midnight;
use crate::event::CalendarEvent;
use crate::overlap::StackPlacement;

/// Layout units covered by one time slot.
pub const UNITS_PER_SLOT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlotSpan {
    pub top: f64,
    pub height: f64,
}

/// Render rectangle of one event. `top`/`height` are layout units, `left`/
/// `width` percentages of the day column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPosition {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    pub z_index: u32,
}

impl EventPosition {
    pub fn full_width(span: SlotSpan) -> Self {
        Self {
            top: span.top,
            left: 0.0,
            width: 100.0,
            height: span.height,
            z_index: 1,
        }
    }

    pub fn combine(span: SlotSpan, placement: &StackPlacement) -> Self {
        Self {
            top: span.top,
            left: placement.left,
            width: placement.width,
            height: span.height,
            z_index: stack_z_index(placement.stack_index),
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

pub fn stack_z_index(stack_index: usize) -> u32 {
    u32::try_from(stack_index)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1)
}

fn slot_length(slot_minutes: u32) -> f64 {
    f64::from(slot_minutes.max(1))
}

fn to_units(minutes: f64, slot_minutes: u32) -> f64 {
    minutes / slot_length(slot_minutes) * UNITS_PER_SLOT
}

/// Vertical span measured from midnight. All-day events sit at minute 0.
/// Short events are not clamped to a minimum height.
pub fn position(event: &CalendarEvent, slot_minutes: u32) -> SlotSpan {
    let start = minutes_since_midnight(event.effective_instant().time());
    SlotSpan {
        top: to_units(f64::from(start), slot_minutes),
        height: to_units(f64::from(event.effective_duration()), slot_minutes),
    }
}

/// Like [`position`] but with `top` measured from `slot_start`; negative when
/// the event starts before that slot.
pub fn position_in_slot(event: &CalendarEvent, slot_start: NaiveTime, slot_minutes: u32) -> SlotSpan {
    let start = i64::from(minutes_since_midnight(event.effective_instant().time()));
    let offset = start - i64::from(minutes_since_midnight(slot_start));
    SlotSpan {
        top: to_units(offset as f64, slot_minutes),
        height: to_units(f64::from(event.effective_duration()), slot_minutes),
    }
}

/// Events spanning at least two slots have room for their description.
pub fn shows_description(event: &CalendarEvent, slot_minutes: u32) -> bool {
    event.effective_duration() >= slot_minutes.saturating_mul(2)
}

pub fn description_min_height(slot_minutes: u32) -> f64 {
    to_units(f64::from(slot_minutes.saturating_mul(2)), slot_minutes)
}
