use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, trace};

use crate::event::{CalendarEvent, CalendarProject};

pub const PALETTE: [&str; 10] = [
    "#ef4444", // red
    "#f97316", // orange
    "#eab308", // yellow
    "#22c55e", // green
    "#06b6d4", // cyan
    "#3b82f6", // blue
    "#8b5cf6", // violet
    "#ec4899", // pink
    "#84cc16", // lime
    "#14b8a6", // teal
];

pub const DEFAULT_EVENT_COLOR: &str = "#64748b";

/// Hex alpha appended to event card colours.
pub const EVENT_OPACITY_SUFFIX: &str = "99";

type HueSource = Box<dyn FnMut() -> u16 + Send>;

fn random_hue() -> u16 {
    (uuid::Uuid::new_v4().as_u128() % 360) as u16
}

/// Hands out palette colours in order, then random `hsl(...)` colours once
/// the palette is exhausted. One allocator per calendar session.
pub struct ColorAllocator {
    used: BTreeSet<String>,
    hue_source: HueSource,
}

impl fmt::Debug for ColorAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorAllocator")
            .field("used", &self.used)
            .finish_non_exhaustive()
    }
}

impl Default for ColorAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorAllocator {
    pub fn new() -> Self {
        Self::with_hue_source(random_hue)
    }

    /// Replaces the random hue generator; values are taken modulo 360.
    pub fn with_hue_source(source: impl FnMut() -> u16 + Send + 'static) -> Self {
        Self {
            used: BTreeSet::new(),
            hue_source: Box::new(source),
        }
    }

    pub fn allocate(&mut self) -> String {
        if let Some(color) = PALETTE.iter().find(|color| !self.used.contains(**color)) {
            self.used.insert((*color).to_string());
            trace!(color, "allocated palette color");
            return (*color).to_string();
        }

        let hue = (self.hue_source)() % 360;
        let color = format!("hsl({hue}, 70%, 50%)");
        debug!(%color, used = self.used.len(), "palette exhausted; generated color");
        self.used.insert(color.clone());
        color
    }

    /// Marks a colour chosen elsewhere as taken.
    pub fn reserve(&mut self, color: &str) {
        self.used.insert(color.to_string());
    }

    /// Returns `color` to the pool. Unknown colours are ignored.
    pub fn release(&mut self, color: &str) {
        self.used.remove(color);
    }

    pub fn reset(&mut self) {
        self.used.clear();
    }

    pub fn is_used(&self, color: &str) -> bool {
        self.used.contains(color)
    }

    pub fn used_count(&self) -> usize {
        self.used.len()
    }
}

/// Fills in a colour for every project that has none, skipping colours
/// other projects already carry. Returns how many projects were coloured.
pub fn assign_project_colors(projects: &mut [CalendarProject], allocator: &mut ColorAllocator) -> usize {
    for color in projects.iter().filter_map(|project| project.color.as_deref()) {
        allocator.reserve(color);
    }

    let mut assigned = 0;
    for project in projects.iter_mut().filter(|project| project.color.is_none()) {
        let color = allocator.allocate();
        debug!(project = %project.title, %color, "assigned project color");
        project.color = Some(color);
        assigned += 1;
    }
    assigned
}

/// Card colour of `event`: its project's colour or the neutral default,
/// with the opacity suffix appended.
pub fn event_color(event: &CalendarEvent, projects: &[CalendarProject]) -> String {
    let base = event
        .project
        .as_deref()
        .and_then(|title| projects.iter().find(|project| project.title == title))
        .and_then(|project| project.color.as_deref())
        .unwrap_or(DEFAULT_EVENT_COLOR);
    format!("{base}{EVENT_OPACITY_SUFFIX}")
}
