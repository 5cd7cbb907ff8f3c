//! Time reporting for timeline and tick-mark collaborators.
//!
//! Rasterization always works on absolute peak columns; this module only decides which
//! absolute window is visible and how times are labelled, including the origin rebase used
//! by relative-time reporting and the trimmed view.

/// Candidate spacings between tick marks, in seconds.
const TICK_INTERVALS: [f64; 15] = [
    0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1_800.0,
];
/// Every n-th tick (counted from the origin) carries a primary label.
const PRIMARY_EVERY: i64 = 5;

/// Visible absolute window plus the origin reported times are measured from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineMapping {
    origin_seconds: f64,
    visible_start: f64,
    visible_end: f64,
}

impl TimelineMapping {
    /// Whole file visible, times reported as-is.
    pub fn identity(duration_seconds: f64) -> Self {
        Self::new(0.0, 0.0, duration_seconds)
    }

    pub fn new(origin_seconds: f64, visible_start: f64, visible_end: f64) -> Self {
        let start = finite_or_zero(visible_start).max(0.0);
        let end = finite_or_zero(visible_end).max(start);
        Self {
            origin_seconds: finite_or_zero(origin_seconds),
            visible_start: start,
            visible_end: end,
        }
    }

    /// Absolute time that reports as zero.
    pub fn origin_seconds(&self) -> f64 {
        self.origin_seconds
    }

    pub fn visible_start(&self) -> f64 {
        self.visible_start
    }

    pub fn visible_end(&self) -> f64 {
        self.visible_end
    }

    pub fn visible_duration(&self) -> f64 {
        self.visible_end - self.visible_start
    }

    /// Convert an absolute time into the time shown to the user.
    pub fn report(&self, absolute_seconds: f64) -> f64 {
        absolute_seconds - self.origin_seconds
    }

    /// Inverse of [`Self::report`].
    pub fn absolute(&self, reported_seconds: f64) -> f64 {
        reported_seconds + self.origin_seconds
    }

    /// Position of an absolute time within the visible window (0.0-1.0), if inside it.
    pub fn visible_fraction(&self, absolute_seconds: f64) -> Option<f64> {
        let duration = self.visible_duration();
        if duration <= 0.0 || !absolute_seconds.is_finite() {
            return None;
        }
        let fraction = (absolute_seconds - self.visible_start) / duration;
        (0.0..=1.0).contains(&fraction).then_some(fraction)
    }

    /// Absolute time at a fraction of the visible window.
    pub fn time_at_fraction(&self, fraction: f64) -> f64 {
        self.visible_start + self.visible_duration() * fraction.clamp(0.0, 1.0)
    }
}

/// A labelled position on the timeline ruler.
#[derive(Clone, Debug, PartialEq)]
pub struct TickMark {
    /// Column within the rendered width.
    pub x_px: u32,
    /// Reported (possibly rebased) time of the tick.
    pub seconds: f64,
    pub label: String,
    pub primary: bool,
}

/// Tick marks for the visible window rendered across `width_px` pixels.
///
/// Ticks sit on multiples of an interval measured in reported time, chosen as the
/// smallest candidate leaving at least `min_spacing_px` between neighbours.
pub fn tick_marks(mapping: &TimelineMapping, width_px: u32, min_spacing_px: u32) -> Vec<TickMark> {
    let duration = mapping.visible_duration();
    if width_px == 0 || duration <= 0.0 {
        return Vec::new();
    }
    let px_per_second = f64::from(width_px) / duration;
    let interval = tick_interval(px_per_second, f64::from(min_spacing_px.max(1)));
    let reported_start = mapping.report(mapping.visible_start());
    let reported_end = mapping.report(mapping.visible_end());
    let first_step = (reported_start / interval - 1e-9).ceil() as i64;
    let last_step = (reported_end / interval + 1e-9).floor() as i64;
    (first_step..=last_step)
        .map(|step| {
            let seconds = step as f64 * interval;
            let offset = mapping.absolute(seconds) - mapping.visible_start();
            let x = (offset * px_per_second).round().clamp(0.0, f64::from(width_px - 1));
            TickMark {
                x_px: x as u32,
                seconds,
                label: format_tick_label(seconds, interval),
                primary: step.rem_euclid(PRIMARY_EVERY) == 0,
            }
        })
        .collect()
}

fn tick_interval(px_per_second: f64, min_spacing_px: f64) -> f64 {
    TICK_INTERVALS
        .iter()
        .copied()
        .find(|interval| interval * px_per_second >= min_spacing_px)
        .unwrap_or(TICK_INTERVALS[TICK_INTERVALS.len() - 1])
}

/// Format a tick time as `m:ss`, adding tenths or hundredths when ticks are sub-second.
pub fn format_tick_label(seconds: f64, interval: f64) -> String {
    if !seconds.is_finite() {
        return "0:00".to_string();
    }
    let sign = if seconds < -1e-9 { "-" } else { "" };
    let decimals = if interval >= 1.0 {
        0
    } else if interval >= 0.1 {
        1
    } else {
        2
    };
    let scale = 10_f64.powi(decimals);
    let total = (seconds.abs() * scale).round() / scale;
    let minutes = (total / 60.0).floor() as u64;
    let remaining = total - minutes as f64 * 60.0;
    match decimals {
        0 => format!("{sign}{minutes}:{remaining:02.0}"),
        1 => format!("{sign}{minutes}:{remaining:04.1}"),
        _ => format!("{sign}{minutes}:{remaining:05.2}"),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
