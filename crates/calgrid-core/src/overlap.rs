use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::event::CalendarEvent;
use crate::geometry::{EventPosition, position};

/// Horizontal budget of a day column in percent. `label_margin` is kept
/// free for the time labels; `reserved` is the total width not available to
/// stacks (labels plus trailing gap).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StackMetrics {
    pub label_margin: f64,
    pub reserved: f64,
}

impl Default for StackMetrics {
    fn default() -> Self {
        Self {
            label_margin: 3.0,
            reserved: 3.5,
        }
    }
}

impl StackMetrics {
    pub fn available_width(&self) -> f64 {
        (100.0 - self.reserved).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackPlacement {
    pub event_id: String,
    pub stack_index: usize,
    pub stack_count: usize,
    pub left: f64,
    pub width: f64,
}

fn sorted_by_start(events: &[CalendarEvent]) -> Vec<&CalendarEvent> {
    let mut sorted: Vec<&CalendarEvent> = events.iter().collect();
    sorted.sort_by(|a, b| a.cmp_by_start(b));
    sorted
}

/// Greedy first-fit over input indices, in start order.
fn stack_indices(events: &[CalendarEvent]) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by(|&a, &b| events[a].cmp_by_start(&events[b]));

    let mut stacks: Vec<Vec<usize>> = Vec::new();
    for idx in order {
        let event = &events[idx];
        let free = stacks
            .iter_mut()
            .find(|stack| stack.iter().all(|&member| !events[member].overlaps(event)));
        match free {
            Some(stack) => stack.push(idx),
            None => stacks.push(vec![idx]),
        }
    }
    stacks
}

/// Greedy first-fit: each event joins the first stack none of whose members
/// it overlaps, else opens a new stack. Ties keep input order.
pub fn assign_stacks(events: &[CalendarEvent]) -> Vec<Vec<&CalendarEvent>> {
    stack_indices(events)
        .into_iter()
        .map(|stack| stack.into_iter().map(|idx| &events[idx]).collect())
        .collect()
}

/// Column assignment for the events of one day, ordered by stack.
#[instrument(skip(events, metrics), fields(events = events.len()))]
pub fn partition(events: &[CalendarEvent], metrics: &StackMetrics) -> Vec<StackPlacement> {
    let stacks = assign_stacks(events);
    let stack_count = stacks.len();
    if stack_count == 0 {
        return Vec::new();
    }

    let width = metrics.available_width() / stack_count as f64;
    debug!(stacks = stack_count, width, "partitioned day");

    stacks
        .into_iter()
        .enumerate()
        .flat_map(|(stack_index, stack)| {
            stack.into_iter().map(move |event| StackPlacement {
                event_id: event.id.clone(),
                stack_index,
                stack_count,
                left: metrics.label_margin + stack_index as f64 * width,
                width,
            })
        })
        .collect()
}

/// One placement per event, aligned with the input slice. Unlike
/// [`placement_map`] this stays correct when ids repeat.
pub fn placements_by_index(events: &[CalendarEvent], metrics: &StackMetrics) -> Vec<StackPlacement> {
    let stacks = stack_indices(events);
    let stack_count = stacks.len();
    let width = if stack_count == 0 {
        0.0
    } else {
        metrics.available_width() / stack_count as f64
    };

    let mut slots: Vec<Option<StackPlacement>> = vec![None; events.len()];
    for (stack_index, stack) in stacks.into_iter().enumerate() {
        for idx in stack {
            slots[idx] = Some(StackPlacement {
                event_id: events[idx].id.clone(),
                stack_index,
                stack_count,
                left: metrics.label_margin + stack_index as f64 * width,
                width,
            });
        }
    }
    slots.into_iter().flatten().collect()
}

pub fn placement_map(placements: &[StackPlacement]) -> HashMap<String, StackPlacement> {
    placements
        .iter()
        .map(|placement| (placement.event_id.clone(), placement.clone()))
        .collect()
}

/// Clusters of chained overlaps. An event joins the current cluster when it
/// starts before the end of the cluster's last event; membership therefore
/// propagates transitively rather than by pairwise tests.
pub fn overlap_groups(events: &[CalendarEvent]) -> Vec<Vec<CalendarEvent>> {
    let mut groups: Vec<Vec<CalendarEvent>> = Vec::new();
    let mut current: Vec<CalendarEvent> = Vec::new();

    for event in sorted_by_start(events) {
        let chained = current
            .last()
            .is_some_and(|last| event.effective_instant() < last.effective_end());
        if !chained && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
        current.push(event.clone());
    }

    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Coarse column packing across the full column width. A column accepts an
/// event when it starts at or after the end of the column's last event;
/// `z_index` grows with the column.
pub fn column_positions(
    events: &[CalendarEvent],
    slot_minutes: u32,
) -> HashMap<String, Vec<EventPosition>> {
    let mut columns: Vec<Vec<&CalendarEvent>> = Vec::new();

    for event in sorted_by_start(events) {
        let free = columns.iter_mut().find(|column| {
            column
                .last()
                .is_none_or(|last| event.effective_instant() >= last.effective_end())
        });
        match free {
            Some(column) => column.push(event),
            None => columns.push(vec![event]),
        }
    }

    let column_width = 100.0 / columns.len().max(1) as f64;
    let mut positions: HashMap<String, Vec<EventPosition>> = HashMap::new();
    for (column_index, column) in columns.iter().enumerate() {
        for event in column {
            let span = position(event, slot_minutes);
            positions
                .entry(event.id.clone())
                .or_default()
                .push(EventPosition {
                    top: span.top,
                    left: column_index as f64 * column_width,
                    width: column_width,
                    height: span.height,
                    z_index: crate::geometry::stack_z_index(column_index),
                });
        }
    }
    positions
}
