//! Published viewer state, read-only to the presentation shell

use serde::{Deserialize, Serialize};

/// Placeholder shown before a value is known
pub const UNKNOWN_FIELD: &str = "-";
/// Placeholder shown when no memory probe is available
pub const MEMORY_UNAVAILABLE: &str = "N/A";

/// Lifecycle phase derived from the state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    /// No scene loaded, drop zone visible
    Empty,
    /// A scene is streaming into the renderer
    Loading,
    /// A scene is on screen
    Active,
}

/// Snapshot of everything the presentation shell renders.
///
/// Recomputed by the lifecycle manager; the shell never writes it. At most
/// one of `is_loading` / `is_viewer_active` is true at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    pub is_loading: bool,
    /// Load progress percent, 0-100, monotonic within one load
    pub progress: u8,
    pub is_viewer_active: bool,
    pub filename: String,
    /// Digit-grouped splat count, or "-" until known
    pub splat_count: String,
    /// Frames rendered during the last one-second window
    pub fps: u32,
    /// User-facing failure message, if any
    pub error: Option<String>,
    /// Formatted byte string, or "N/A"
    pub memory_usage: String,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            is_loading: false,
            progress: 0,
            is_viewer_active: false,
            filename: UNKNOWN_FIELD.to_string(),
            splat_count: UNKNOWN_FIELD.to_string(),
            fps: 0,
            error: None,
            memory_usage: MEMORY_UNAVAILABLE.to_string(),
        }
    }
}

impl ViewerState {
    /// Derive the lifecycle phase from the flags
    pub fn phase(&self) -> ViewerPhase {
        if self.is_loading {
            ViewerPhase::Loading
        } else if self.is_viewer_active {
            ViewerPhase::Active
        } else {
            ViewerPhase::Empty
        }
    }
}

/// Format a count with thousands separators, e.g. `12345` -> `"12,345"`
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
