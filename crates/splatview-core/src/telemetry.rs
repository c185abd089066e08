//! Frame-rate and memory telemetry
//!
//! Both samplers run only while a scene is active and are driven from the
//! per-frame pump with a monotonic `Duration` clock, so tests can feed
//! synthetic timelines.

use std::time::Duration;

/// Width of one sampling window
const WINDOW: Duration = Duration::from_secs(1);

/// Counts rendered frames and publishes the total once per second.
#[derive(Debug, Default)]
pub struct FpsCounter {
    frames: u32,
    window_start: Option<Duration>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any partial window and anchor the next one at `now`
    pub fn restart(&mut self, now: Duration) {
        self.frames = 0;
        self.window_start = Some(now);
    }

    /// Record one rendered frame. Returns the frame count when a full
    /// one-second window has elapsed, then starts a new window.
    pub fn frame(&mut self, now: Duration) -> Option<u32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        if now.saturating_sub(start) >= WINDOW {
            let fps = self.frames;
            self.frames = 0;
            self.window_start = Some(now);
            Some(fps)
        } else {
            None
        }
    }
}

/// A source of approximate memory-usage figures.
///
/// Probes are chained: the renderer's GPU estimate is preferred, then a
/// host heap probe, and when neither responds the display falls back to
/// "N/A". Concrete probes are per-platform capabilities, not guarantees.
pub trait MemoryProbe {
    fn sample(&mut self) -> Option<u64>;
}

/// Resident-set probe for the host process.
///
/// Reads `/proc/self/statm` where available; other platforms report
/// nothing and the chain falls through.
#[derive(Debug, Default)]
pub struct HeapProbe;

impl MemoryProbe for HeapProbe {
    fn sample(&mut self) -> Option<u64> {
        resident_bytes()
    }
}

#[cfg(target_os = "linux")]
fn resident_bytes() -> Option<u64> {
    // statm reports sizes in pages; the kernel page size is 4 KiB on every
    // target this probe compiles for.
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn resident_bytes() -> Option<u64> {
    None
}

/// Format a byte count with the largest unit that keeps the mantissa >= 1,
/// one decimal place for KB and above.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_048_576), "1.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_fps_counter_publishes_once_per_second() {
        let mut counter = FpsCounter::new();
        counter.restart(Duration::ZERO);
        let mut published = None;
        for frame in 1..=60 {
            let now = Duration::from_millis(frame * 1000 / 60);
            if let Some(fps) = counter.frame(now) {
                published = Some(fps);
            }
        }
        assert_eq!(published, Some(60));
    }

    #[test]
    fn test_fps_counter_resets_between_windows() {
        let mut counter = FpsCounter::new();
        counter.restart(Duration::ZERO);
        for frame in 1..=30 {
            counter.frame(Duration::from_millis(frame * 33));
        }
        let fps = counter.frame(Duration::from_millis(1020)).unwrap();
        assert_eq!(fps, 31);
        // The next window starts from zero frames.
        assert_eq!(counter.frame(Duration::from_millis(1050)), None);
    }
}
