use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::drag::{DragPoint, DropTarget, MoveRequest};

/// Discrete signals from the host's gesture recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GestureSignal {
    /// Pan began over the card of `event_id` (or over empty space).
    PanStart {
        point: DragPoint,
        event_id: Option<String>,
    },
    /// Pointer moved; `target` is what the host resolved the point to.
    PanMove {
        point: DragPoint,
        target: Option<DropTarget>,
    },
    PanEnd,
    SwipeLeft,
    SwipeRight,
}

impl GestureSignal {
    /// Navigation step of a swipe: left moves forward, right moves back.
    pub fn swipe_step(&self) -> Option<i32> {
        match self {
            Self::SwipeLeft => Some(1),
            Self::SwipeRight => Some(-1),
            Self::PanStart { .. } | Self::PanMove { .. } | Self::PanEnd => None,
        }
    }
}

/// What a session did with one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureOutcome {
    Ignored,
    DragStarted { event_id: String },
    DragMoved,
    Dropped(Option<MoveRequest>),
    Navigated(NaiveDate),
}
