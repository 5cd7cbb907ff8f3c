use std::ops::Range;

use egui::Color32;

use super::error::{ExportError, RenderError, SurfaceKind};
use super::export::{ExportFormat, ExportKind, ExportedImage, export_color_image};
use super::peaks::PeakBuffer;
use super::raster::draw_envelope;
use super::surface::Surface;

/// Fraction `[start, end)` of the full timeline owned by one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineSpan {
    start: f64,
    end: f64,
}

impl TimelineSpan {
    /// Create a clamped span, ordering the bounds if needed.
    pub fn new(start: f64, end: f64) -> Self {
        let a = clamp_fraction(start);
        let b = clamp_fraction(end);
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn full() -> Self {
        Self {
            start: 0.0,
            end: 1.0,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Peak columns `first..last` this span draws from the view window `view`.
    ///
    /// Unless the span ends the timeline, `last` includes one trailing column that is
    /// also the first column of the next tile, so neighbouring envelopes meet without a
    /// seam. The range never reaches past `view.end`; an empty view or span yields
    /// `first == last`.
    pub fn columns(&self, view: &Range<usize>) -> (usize, usize) {
        let len = view.end.saturating_sub(view.start);
        let first = view.start + (len as f64 * self.start).round() as usize;
        if len == 0 || self.width() <= 0.0 {
            return (first, first);
        }
        let mut last = view.start + (len as f64 * self.end).round() as usize;
        if self.end < 1.0 {
            last += 1;
        }
        (first, last.min(view.end).max(first))
    }
}

impl Default for TimelineSpan {
    fn default() -> Self {
        Self::full()
    }
}

/// Optional surfaces a tile is expected to own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileFeatures {
    pub progress: bool,
    pub restrict: bool,
}

/// Fill colours for each surface of a tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillStyles {
    pub wave: Color32,
    pub progress: Color32,
    pub restrict: Color32,
}

impl Default for FillStyles {
    fn default() -> Self {
        Self {
            wave: Color32::from_rgb(250, 246, 240),
            progress: Color32::from_rgb(255, 140, 40),
            restrict: Color32::from_rgba_unmultiplied(120, 120, 120, 200),
        }
    }
}

/// Surface handles passed to [`RenderTile::initialize`].
pub struct TileSurfaces<S> {
    pub wave: Option<S>,
    pub progress: Option<S>,
    pub restrict_left: Option<S>,
    pub restrict_right: Option<S>,
}

impl<S> Default for TileSurfaces<S> {
    fn default() -> Self {
        Self {
            wave: None,
            progress: None,
            restrict_left: None,
            restrict_right: None,
        }
    }
}

/// Columns of a restrict overlay in tile-local pixels.
///
/// The left mask covers `0..left_end_px`, the right mask covers `right_start_px..width`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestrictColumns {
    pub left_end_px: u32,
    pub right_start_px: u32,
}

/// Read-only overlay parameters for one tile and one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileOverlay {
    /// Progress surface is visible up to this column.
    pub progress_px: Option<u32>,
    /// Restrict masks to draw; `None` suppresses both.
    pub restrict: Option<RestrictColumns>,
}

/// One bounded-width slice of the rendered waveform.
pub struct RenderTile<S> {
    span: TimelineSpan,
    left_offset_px: u32,
    owned_width_px: u32,
    surface_width_px: u32,
    surface_height_px: u32,
    features: TileFeatures,
    styles: FillStyles,
    wave: Option<S>,
    progress: Option<S>,
    restrict_left: Option<S>,
    restrict_right: Option<S>,
}

impl<S: Surface> RenderTile<S> {
    pub fn new(features: TileFeatures, styles: FillStyles) -> Self {
        Self {
            span: TimelineSpan::full(),
            left_offset_px: 0,
            owned_width_px: 0,
            surface_width_px: 0,
            surface_height_px: 0,
            features,
            styles,
            wave: None,
            progress: None,
            restrict_left: None,
            restrict_right: None,
        }
    }

    /// Bind drawing targets; every surface required by the tile's features must be present.
    pub fn initialize(&mut self, surfaces: TileSurfaces<S>) -> Result<(), RenderError> {
        let TileSurfaces {
            wave,
            progress,
            restrict_left,
            restrict_right,
        } = surfaces;
        let wave = wave.ok_or(RenderError::MissingSurface {
            kind: SurfaceKind::Wave,
        })?;
        let progress = require(self.features.progress, progress, SurfaceKind::Progress)?;
        let restrict_left = require(self.features.restrict, restrict_left, SurfaceKind::RestrictLeft)?;
        let restrict_right =
            require(self.features.restrict, restrict_right, SurfaceKind::RestrictRight)?;
        self.wave = Some(wave);
        self.progress = progress;
        self.restrict_left = restrict_left;
        self.restrict_right = restrict_right;
        let (width, height) = (self.surface_width_px, self.surface_height_px);
        self.for_each_surface(|surface| surface.resize(width, height));
        self.apply_fill_styles();
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.wave.is_some()
    }

    /// Recompute the owned span and resize every surface.
    pub fn update_dimensions(
        &mut self,
        left_offset_px: u32,
        owned_width_px: u32,
        total_width_px: u32,
        surface_width_px: u32,
        surface_height_px: u32,
    ) {
        let total = f64::from(total_width_px.max(1));
        let start = f64::from(left_offset_px) / total;
        // Same expression as the next tile's start so shared boundaries compare equal.
        let end = f64::from(left_offset_px.saturating_add(owned_width_px)) / total;
        self.span = TimelineSpan::new(start, end);
        self.left_offset_px = left_offset_px;
        self.owned_width_px = owned_width_px;
        self.surface_width_px = surface_width_px;
        self.surface_height_px = surface_height_px;
        self.for_each_surface(|surface| surface.resize(surface_width_px, surface_height_px));
    }

    pub fn clear(&mut self) {
        self.for_each_surface(|surface| surface.clear());
    }

    /// Replace fill colours; nothing is redrawn until the next pass.
    pub fn set_fill_styles(
        &mut self,
        wave: Color32,
        progress: Option<Color32>,
        restrict: Option<Color32>,
    ) {
        self.styles.wave = wave;
        if let Some(color) = progress {
            self.styles.progress = color;
        }
        if let Some(color) = restrict {
            self.styles.restrict = color;
        }
        self.apply_fill_styles();
    }

    /// Draw the envelope for this tile's share of the view window on every owned surface.
    ///
    /// `view` holds absolute peak columns shown by the whole pass. Returns `false` when
    /// the tile's slice was empty and nothing was filled.
    pub fn draw_envelope(
        &mut self,
        buffer: &PeakBuffer,
        half_height: f64,
        offset_y: f64,
        view: Range<usize>,
        overlay: &TileOverlay,
    ) -> Result<bool, RenderError> {
        if !(half_height.is_finite() && half_height > 0.0) {
            return Err(RenderError::InvalidHalfHeight { half_height });
        }
        if !self.is_initialized() {
            return Err(RenderError::NotInitialized);
        }
        let (first, last) = self.span.columns(&view);
        let width = self.surface_width_px;
        self.clear();

        let mut drawn = false;
        if let Some(wave) = self.wave.as_mut() {
            wave.set_clip(None);
            drawn = draw_envelope(wave, buffer, first, last, half_height, offset_y);
        }
        if let Some(progress) = self.progress.as_mut() {
            let visible = overlay.progress_px.unwrap_or(0).min(width);
            if visible > 0 {
                progress.set_clip(Some(0..visible));
                draw_envelope(progress, buffer, first, last, half_height, offset_y);
            }
        }
        if let Some(columns) = overlay.restrict {
            let left_end = columns.left_end_px.min(width);
            let right_start = columns.right_start_px.min(width);
            if let Some(left) = self.restrict_left.as_mut()
                && left_end > 0
            {
                left.set_clip(Some(0..left_end));
                draw_envelope(left, buffer, first, last, half_height, offset_y);
            }
            if let Some(right) = self.restrict_right.as_mut()
                && right_start < width
            {
                right.set_clip(Some(right_start..width));
                draw_envelope(right, buffer, first, last, half_height, offset_y);
            }
        }
        Ok(drawn)
    }

    /// Release all surfaces; calling it again is a no-op.
    pub fn destroy(&mut self) {
        if !self.is_initialized() {
            return;
        }
        self.wave = None;
        self.progress = None;
        self.restrict_left = None;
        self.restrict_right = None;
    }

    /// Encode the wave surface without touching renderer state.
    pub fn export_image(
        &self,
        format: ExportFormat,
        quality: f32,
        kind: ExportKind,
    ) -> Result<ExportedImage, ExportError> {
        let wave = self.wave.as_ref().ok_or(RenderError::NotInitialized)?;
        export_color_image(wave.snapshot(), format, quality, kind)
    }

    pub fn span(&self) -> TimelineSpan {
        self.span
    }

    pub fn left_offset_px(&self) -> u32 {
        self.left_offset_px
    }

    pub fn owned_width_px(&self) -> u32 {
        self.owned_width_px
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_width_px, self.surface_height_px)
    }

    pub fn features(&self) -> TileFeatures {
        self.features
    }

    pub fn fill_styles(&self) -> FillStyles {
        self.styles
    }

    pub fn surface(&self, kind: SurfaceKind) -> Option<&S> {
        match kind {
            SurfaceKind::Wave => self.wave.as_ref(),
            SurfaceKind::Progress => self.progress.as_ref(),
            SurfaceKind::RestrictLeft => self.restrict_left.as_ref(),
            SurfaceKind::RestrictRight => self.restrict_right.as_ref(),
        }
    }

    fn apply_fill_styles(&mut self) {
        let styles = self.styles;
        if let Some(wave) = self.wave.as_mut() {
            wave.set_fill_style(styles.wave);
        }
        if let Some(progress) = self.progress.as_mut() {
            progress.set_fill_style(styles.progress);
        }
        for surface in [self.restrict_left.as_mut(), self.restrict_right.as_mut()]
            .into_iter()
            .flatten()
        {
            surface.set_fill_style(styles.restrict);
        }
    }

    fn for_each_surface(&mut self, mut op: impl FnMut(&mut S)) {
        for surface in [
            self.wave.as_mut(),
            self.progress.as_mut(),
            self.restrict_left.as_mut(),
            self.restrict_right.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            op(surface);
        }
    }
}

fn require<S>(enabled: bool, surface: Option<S>, kind: SurfaceKind) -> Result<Option<S>, RenderError> {
    match (enabled, surface) {
        (true, None) => Err(RenderError::MissingSurface { kind }),
        (true, Some(surface)) => Ok(Some(surface)),
        (false, _) => Ok(None),
    }
}

fn clamp_fraction(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
