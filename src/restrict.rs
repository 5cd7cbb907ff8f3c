//! Restricted-region state: the Disabled / Trim / Trimmed machine that decides which part
//! of the file is highlighted, masked or shown.
//!
//! The controller is pure state plus notifications. Callers apply the returned
//! [`RestrictOutcome`] by redrawing; the renderer reads [`RestrictController::view_window`]
//! and [`RestrictController::overlay_times`] when it builds a pass.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timeline::TimelineMapping;
use crate::waveform::PeakBuffer;

/// Narrowest region the controller keeps, in seconds.
pub const MIN_RANGE_SECONDS: f64 = 0.001;

/// How an enabled restriction is presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictMode {
    /// Whole file visible, outside of the region masked.
    #[default]
    Trim,
    /// Only the region is visible and fills the rendered width.
    Trimmed,
}

/// Effective controller state; `Disabled` wins over any stored mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestrictPhase {
    Disabled,
    Trim,
    Trimmed,
}

impl fmt::Display for RestrictPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disabled => "disabled",
            Self::Trim => "trim",
            Self::Trimmed => "trimmed",
        };
        f.write_str(label)
    }
}

/// Restricted region and presentation flags.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RestrictState {
    pub enabled: bool,
    pub start_time: f64,
    pub end_time: f64,
    pub mode: RestrictMode,
    pub relative_time: bool,
}

impl RestrictState {
    fn full(duration: f64) -> Self {
        Self {
            enabled: false,
            start_time: 0.0,
            end_time: duration,
            mode: RestrictMode::Trim,
            relative_time: false,
        }
    }

    pub fn phase(&self) -> RestrictPhase {
        match (self.enabled, self.mode) {
            (false, _) => RestrictPhase::Disabled,
            (true, RestrictMode::Trim) => RestrictPhase::Trim,
            (true, RestrictMode::Trimmed) => RestrictPhase::Trimmed,
        }
    }

    pub fn width(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Problems reported through the diagnostic channel instead of being raised.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RestrictDiagnostic {
    #[error(
        "Restricted range {requested_start}..{requested_end} is invalid for a {duration}s file; \
         using {start}..{end}"
    )]
    InvalidRange {
        requested_start: f64,
        requested_end: f64,
        start: f64,
        end: f64,
        duration: f64,
    },
}

/// What the caller must do after a state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderRequest {
    None,
    Redraw,
}

/// Result of a controller operation.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct RestrictOutcome {
    pub state: RestrictState,
    pub render: RenderRequest,
    pub diagnostic: Option<RestrictDiagnostic>,
}

impl RestrictOutcome {
    pub fn needs_redraw(&self) -> bool {
        self.render == RenderRequest::Redraw
    }
}

/// Serializable snapshot of the restriction, stored in settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictRecord {
    pub enabled: bool,
    pub start_time: f64,
    pub end_time: f64,
    pub mode: RestrictMode,
    pub relative_time: bool,
}

impl Default for RestrictRecord {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: 0.0,
            end_time: 0.0,
            mode: RestrictMode::Trim,
            relative_time: false,
        }
    }
}

type DiagnosticHandler = Box<dyn FnMut(&RestrictDiagnostic)>;

/// Owner of the restricted region for one loaded file.
pub struct RestrictController {
    state: RestrictState,
    total_duration: f64,
    dragging: bool,
    on_diagnostic: Option<DiagnosticHandler>,
}

impl fmt::Debug for RestrictController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestrictController")
            .field("state", &self.state)
            .field("total_duration", &self.total_duration)
            .field("dragging", &self.dragging)
            .finish_non_exhaustive()
    }
}

impl RestrictController {
    /// Disabled controller covering the whole of a `total_duration` second file.
    pub fn new(total_duration: f64) -> Self {
        let duration = non_negative(total_duration);
        Self {
            state: RestrictState::full(duration),
            total_duration: duration,
            dragging: false,
            on_diagnostic: None,
        }
    }

    /// Route diagnostics to `handler` in addition to the returned outcome.
    pub fn set_diagnostic_handler(&mut self, handler: impl FnMut(&RestrictDiagnostic) + 'static) {
        self.on_diagnostic = Some(Box::new(handler));
    }

    pub fn state(&self) -> RestrictState {
        self.state
    }

    pub fn phase(&self) -> RestrictPhase {
        self.state.phase()
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Adopt a new file length.
    ///
    /// A region spanning the whole previous file keeps spanning the whole new one; any
    /// other region is pulled inside the new length.
    pub fn set_total_duration(&mut self, total_duration: f64) -> RestrictOutcome {
        let covered_all = self.state.start_time == 0.0 && self.state.end_time == self.total_duration;
        self.total_duration = non_negative(total_duration);
        if covered_all {
            let changed = self.state.end_time != self.total_duration;
            self.state.end_time = self.total_duration;
            return self.outcome(changed && self.state.enabled, None);
        }
        let (start, end) = (self.state.start_time, self.state.end_time);
        self.apply_range(start, end)
    }

    /// Turn the restriction on in `mode`, keeping the current region.
    pub fn enable(&mut self, mode: RestrictMode) -> RestrictOutcome {
        let changed = !self.state.enabled || self.state.mode != mode;
        self.state.enabled = true;
        self.state.mode = mode;
        if changed {
            tracing::debug!("Restriction enabled in {} mode", self.phase());
        }
        self.outcome(changed, None)
    }

    /// Turn the restriction off; the region is remembered for the next enable.
    pub fn disable(&mut self) -> RestrictOutcome {
        let changed = self.state.enabled;
        self.state.enabled = false;
        self.dragging = false;
        if changed {
            tracing::debug!("Restriction disabled");
        }
        self.outcome(changed, None)
    }

    /// Switch between masking and showing only the region. The region is preserved.
    pub fn set_mode(&mut self, mode: RestrictMode) -> RestrictOutcome {
        let changed = self.state.mode != mode;
        self.state.mode = mode;
        self.outcome(changed && self.state.enabled, None)
    }

    /// Report times relative to the region start instead of the file start.
    pub fn set_relative_time(&mut self, relative: bool) -> RestrictOutcome {
        let changed = self.state.relative_time != relative;
        self.state.relative_time = relative;
        self.outcome(changed && self.state.enabled, None)
    }

    /// Replace the region. Inverted or out-of-range bounds are repaired and reported.
    pub fn set_range(&mut self, start: f64, end: f64) -> RestrictOutcome {
        self.apply_range(start, end)
    }

    /// A handle drag moved the region bounds.
    pub fn on_region_dragged(&mut self, start: f64, end: f64) -> RestrictOutcome {
        self.dragging = true;
        self.apply_range(start, end)
    }

    /// A handle drag finished; the final bounds are committed.
    pub fn on_region_update_end(&mut self, start: f64, end: f64) -> RestrictOutcome {
        self.dragging = false;
        self.apply_range(start, end)
    }

    /// Bounds the interactive handles should sit at, present only in trim mode.
    pub fn handle_bounds(&self) -> Option<(f64, f64)> {
        (self.phase() == RestrictPhase::Trim).then_some((self.state.start_time, self.state.end_time))
    }

    /// Absolute times outside of which the overlay masks the waveform.
    pub fn overlay_times(&self) -> Option<(f64, f64)> {
        self.handle_bounds()
    }

    /// Peak columns to render instead of the caller's window, present only when trimmed.
    pub fn view_window(&self, buffer: &PeakBuffer) -> Option<Range<usize>> {
        if self.phase() != RestrictPhase::Trimmed {
            return None;
        }
        let first = buffer.column_at_time(self.state.start_time);
        let end = buffer.column_at_time(self.state.end_time).max(first);
        Some(first..end)
    }

    /// Visible window and reporting origin implied by the current state.
    pub fn timeline_mapping(&self) -> TimelineMapping {
        let RestrictState {
            start_time,
            end_time,
            relative_time,
            ..
        } = self.state;
        match self.phase() {
            RestrictPhase::Disabled => TimelineMapping::identity(self.total_duration),
            RestrictPhase::Trim => {
                let origin = if relative_time { start_time } else { 0.0 };
                TimelineMapping::new(origin, 0.0, self.total_duration)
            }
            RestrictPhase::Trimmed => TimelineMapping::new(start_time, start_time, end_time),
        }
    }

    /// Time shown to the user for an absolute playback time.
    pub fn report_time(&self, absolute_seconds: f64) -> f64 {
        self.timeline_mapping().report(absolute_seconds)
    }

    pub fn to_record(&self) -> RestrictRecord {
        RestrictRecord {
            enabled: self.state.enabled,
            start_time: self.state.start_time,
            end_time: self.state.end_time,
            mode: self.state.mode,
            relative_time: self.state.relative_time,
        }
    }

    /// Restore a stored record; its region is validated against the current duration.
    pub fn apply_record(&mut self, record: &RestrictRecord) -> RestrictOutcome {
        self.state.enabled = record.enabled;
        self.state.mode = record.mode;
        self.state.relative_time = record.relative_time;
        let outcome = self.apply_range(record.start_time, record.end_time);
        RestrictOutcome {
            render: RenderRequest::Redraw,
            ..outcome
        }
    }

    fn apply_range(&mut self, start: f64, end: f64) -> RestrictOutcome {
        let (clamped_start, clamped_end) = clamp_range(start, end, self.total_duration);
        let diagnostic = if clamped_start != start || clamped_end != end {
            Some(RestrictDiagnostic::InvalidRange {
                requested_start: start,
                requested_end: end,
                start: clamped_start,
                end: clamped_end,
                duration: self.total_duration,
            })
        } else {
            None
        };
        let changed =
            clamped_start != self.state.start_time || clamped_end != self.state.end_time;
        self.state.start_time = clamped_start;
        self.state.end_time = clamped_end;
        if let Some(diagnostic) = &diagnostic {
            tracing::warn!("{diagnostic}");
            if let Some(handler) = self.on_diagnostic.as_mut() {
                handler(diagnostic);
            }
        }
        self.outcome(changed && self.state.enabled, diagnostic)
    }

    fn outcome(&self, redraw: bool, diagnostic: Option<RestrictDiagnostic>) -> RestrictOutcome {
        RestrictOutcome {
            state: self.state,
            render: if redraw {
                RenderRequest::Redraw
            } else {
                RenderRequest::None
            },
            diagnostic,
        }
    }
}

/// Order, bound and widen a region so `0 <= start < end <= duration` holds.
///
/// A zero-length file collapses every region to `0..0`.
fn clamp_range(start: f64, end: f64, duration: f64) -> (f64, f64) {
    let start = if start.is_finite() { start } else { 0.0 };
    let end = if end.is_finite() { end } else { duration };
    let (a, b) = if start <= end { (start, end) } else { (end, start) };
    let mut a = a.clamp(0.0, duration);
    let mut b = b.clamp(0.0, duration);
    let min_width = MIN_RANGE_SECONDS.min(duration);
    if b - a < min_width {
        b = (a + min_width).min(duration);
        a = (b - min_width).max(0.0);
    }
    (a, b)
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
