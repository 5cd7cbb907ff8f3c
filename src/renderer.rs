//! Caller-owned facade tying peaks, tiles, the restrict controller and the timeline together.

use std::ops::Range;

use egui::ColorImage;

use crate::restrict::{
    RestrictController, RestrictDiagnostic, RestrictMode, RestrictOutcome, RestrictPhase,
    RestrictRecord,
};
use crate::timeline::{TickMark, TimelineMapping, tick_marks};
use crate::waveform::{
    ExportError, ExportFormat, ExportKind, ExportedImage, FillStyles, PassReport, PeakBuffer,
    RasterSurfaceFactory, RenderError, RenderTile, RestrictColumns, Surface, SurfaceFactory,
    TileFeatures, TileOverlay, TileSet,
};

/// Pixel layout supplied by the geometry provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub total_width_px: u32,
    pub max_tile_width_px: u32,
    pub height_px: u32,
}

/// Renders one file's peaks across a set of tiles.
pub struct WaveformRenderer<F: SurfaceFactory = RasterSurfaceFactory> {
    tiles: TileSet<F>,
    geometry: Option<Geometry>,
    peaks: PeakBuffer,
    view: Option<Range<usize>>,
    progress_seconds: Option<f64>,
    offset_y: f64,
    restrict: RestrictController,
    needs_redraw: bool,
}

impl WaveformRenderer<RasterSurfaceFactory> {
    /// Renderer drawing into in-memory images.
    pub fn in_memory(features: TileFeatures, styles: FillStyles) -> Self {
        Self::new(RasterSurfaceFactory, features, styles)
    }
}

impl<F: SurfaceFactory> WaveformRenderer<F> {
    pub fn new(factory: F, features: TileFeatures, styles: FillStyles) -> Self {
        Self {
            tiles: TileSet::new(factory, features, styles),
            geometry: None,
            peaks: PeakBuffer::empty(),
            view: None,
            progress_seconds: None,
            offset_y: 0.0,
            restrict: RestrictController::new(0.0),
            needs_redraw: true,
        }
    }

    /// Apply a new layout, repartitioning tiles only when it actually changed.
    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<(), RenderError> {
        if self.geometry == Some(geometry) {
            return Ok(());
        }
        self.geometry = None;
        self.tiles.repartition(
            geometry.total_width_px,
            geometry.max_tile_width_px,
            geometry.height_px,
        )?;
        self.geometry = Some(geometry);
        self.needs_redraw = true;
        Ok(())
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    /// Replace the peak data; the view window resets to the whole file.
    ///
    /// The restricted region is refitted to the new duration; the outcome carries any
    /// adjustment made to it.
    pub fn set_peaks(&mut self, peaks: PeakBuffer) -> RestrictOutcome {
        let duration = peaks.duration_seconds();
        self.peaks = peaks;
        self.view = None;
        self.needs_redraw = true;
        self.edit_restrict(|restrict| restrict.set_total_duration(duration))
    }

    pub fn peaks(&self) -> &PeakBuffer {
        &self.peaks
    }

    /// Show absolute peak columns `first..end` outside of trimmed mode.
    pub fn set_view_window(&mut self, first: usize, end: usize) {
        self.view = Some(first.min(end)..first.max(end));
        self.needs_redraw = true;
    }

    pub fn reset_view_window(&mut self) {
        self.view = None;
        self.needs_redraw = true;
    }

    /// Columns the next pass will draw.
    pub fn view_window(&self) -> Range<usize> {
        self.restrict
            .view_window(&self.peaks)
            .unwrap_or_else(|| self.base_view())
    }

    /// Absolute playback position for the progress overlay; `None` hides it.
    pub fn set_progress_seconds(&mut self, seconds: Option<f64>) {
        let seconds = seconds.filter(|value| value.is_finite());
        if self.progress_seconds != seconds {
            self.progress_seconds = seconds;
            self.needs_redraw = true;
        }
    }

    pub fn progress_seconds(&self) -> Option<f64> {
        self.progress_seconds
    }

    pub fn set_offset_y(&mut self, offset_y: f64) {
        self.offset_y = offset_y;
        self.needs_redraw = true;
    }

    pub fn set_fill_styles(&mut self, styles: FillStyles) {
        self.tiles.set_fill_styles(styles);
        self.needs_redraw = true;
    }

    pub fn restrict(&self) -> &RestrictController {
        &self.restrict
    }

    pub fn set_restrict_diagnostic_handler(
        &mut self,
        handler: impl FnMut(&RestrictDiagnostic) + 'static,
    ) {
        self.restrict.set_diagnostic_handler(handler);
    }

    /// Run a controller edit and honour the render request it returns.
    pub fn edit_restrict(
        &mut self,
        edit: impl FnOnce(&mut RestrictController) -> RestrictOutcome,
    ) -> RestrictOutcome {
        let outcome = edit(&mut self.restrict);
        if outcome.needs_redraw() {
            self.needs_redraw = true;
        }
        outcome
    }

    pub fn enable_restrict(&mut self, mode: RestrictMode) -> RestrictOutcome {
        self.edit_restrict(|restrict| restrict.enable(mode))
    }

    pub fn disable_restrict(&mut self) -> RestrictOutcome {
        self.edit_restrict(RestrictController::disable)
    }

    pub fn set_restrict_mode(&mut self, mode: RestrictMode) -> RestrictOutcome {
        self.edit_restrict(|restrict| restrict.set_mode(mode))
    }

    pub fn set_restrict_range(&mut self, start: f64, end: f64) -> RestrictOutcome {
        self.edit_restrict(|restrict| restrict.set_range(start, end))
    }

    pub fn set_relative_time(&mut self, relative: bool) -> RestrictOutcome {
        self.edit_restrict(|restrict| restrict.set_relative_time(relative))
    }

    pub fn on_region_dragged(&mut self, start: f64, end: f64) -> RestrictOutcome {
        self.edit_restrict(|restrict| restrict.on_region_dragged(start, end))
    }

    pub fn on_region_update_end(&mut self, start: f64, end: f64) -> RestrictOutcome {
        self.edit_restrict(|restrict| restrict.on_region_update_end(start, end))
    }

    pub fn apply_restrict_record(&mut self, record: &RestrictRecord) -> RestrictOutcome {
        self.edit_restrict(|restrict| restrict.apply_record(record))
    }

    /// Mapping between the drawn columns and reported times.
    pub fn timeline_mapping(&self) -> TimelineMapping {
        let mapping = self.restrict.timeline_mapping();
        let columns = self.peaks.column_count();
        if columns == 0 {
            return mapping;
        }
        let duration = self.peaks.duration_seconds();
        let time_of = |column: usize| column as f64 / columns as f64 * duration;
        let view = self.view_window();
        TimelineMapping::new(mapping.origin_seconds(), time_of(view.start), time_of(view.end))
    }

    /// Tick marks across the rendered width.
    pub fn tick_marks(&self, min_spacing_px: u32) -> Vec<TickMark> {
        let width = self.geometry.map(|g| g.total_width_px).unwrap_or(0);
        tick_marks(&self.timeline_mapping(), width, min_spacing_px)
    }

    /// Whether state changed since the last pass.
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Draw every tile with the current peaks, view window and overlays.
    #[tracing::instrument(level = "debug", skip_all, fields(phase = %self.restrict.phase()))]
    pub fn render(&mut self) -> Result<PassReport, RenderError> {
        let geometry = self.geometry.ok_or(RenderError::NotInitialized)?;
        let half_height = f64::from(geometry.height_px) / 2.0;
        let view = self.view_window();
        let mapping = self.timeline_mapping();
        let total_width = geometry.total_width_px;
        let progress_px = self
            .progress_seconds
            .map(|seconds| global_px(&mapping, seconds, total_width));
        let restrict_px = self.restrict.overlay_times().map(|(start, end)| {
            (
                global_px(&mapping, start, total_width),
                global_px(&mapping, end, total_width),
            )
        });
        let report = self.tiles.draw_pass(
            &self.peaks,
            half_height,
            self.offset_y,
            view.clone(),
            |tile| tile_overlay(tile, progress_px, restrict_px),
        );
        tracing::debug!(
            "Rendered columns {}..{} in {} phase: {} drawn, {} empty, {} failed",
            view.start,
            view.end,
            self.restrict.phase(),
            report.tiles_drawn,
            report.tiles_empty,
            report.failures.len()
        );
        self.needs_redraw = false;
        Ok(report)
    }

    /// Render only when an edit asked for it.
    pub fn render_if_needed(&mut self) -> Result<Option<PassReport>, RenderError> {
        if !self.needs_redraw {
            return Ok(None);
        }
        self.render().map(Some)
    }

    /// All tiles stitched into one image of the full rendered width.
    pub fn composite_image(&self) -> ColorImage {
        self.tiles.composite()
    }

    /// One encoded wave image per tile, left to right.
    pub fn export_images(
        &self,
        format: ExportFormat,
        quality: f32,
        kind: ExportKind,
    ) -> Result<Vec<ExportedImage>, ExportError> {
        self.tiles.export_images(format, quality, kind)
    }

    pub fn tiles(&self) -> &TileSet<F> {
        &self.tiles
    }

    /// Release every tile surface; the next geometry change rebuilds them.
    pub fn destroy(&mut self) {
        self.tiles.destroy();
        self.geometry = None;
        self.needs_redraw = true;
    }

    fn base_view(&self) -> Range<usize> {
        let columns = self.peaks.column_count();
        match &self.view {
            Some(view) if self.restrict.phase() != RestrictPhase::Trimmed => {
                let end = view.end.min(columns);
                view.start.min(end)..end
            }
            _ => 0..columns,
        }
    }
}

/// Position of an absolute time across the full rendered width, clamped to the view.
fn global_px(mapping: &TimelineMapping, seconds: f64, total_width_px: u32) -> u32 {
    let duration = mapping.visible_duration();
    if duration <= 0.0 {
        return 0;
    }
    let fraction = ((seconds - mapping.visible_start()) / duration).clamp(0.0, 1.0);
    (fraction * f64::from(total_width_px)).round() as u32
}

fn tile_overlay<S: Surface>(
    tile: &RenderTile<S>,
    progress_px: Option<u32>,
    restrict_px: Option<(u32, u32)>,
) -> TileOverlay {
    let left = tile.left_offset_px();
    let owned = tile.owned_width_px();
    let local = |px: u32| px.saturating_sub(left).min(owned);
    TileOverlay {
        progress_px: progress_px.map(local),
        restrict: restrict_px.map(|(start, end)| RestrictColumns {
            left_end_px: local(start),
            right_start_px: local(end),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::SurfaceKind;
    use egui::Color32;

    const GEOMETRY: Geometry = Geometry {
        total_width_px: 300,
        max_tile_width_px: 128,
        height_px: 32,
    };

    fn all_features() -> TileFeatures {
        TileFeatures {
            progress: true,
            restrict: true,
        }
    }

    fn renderer() -> WaveformRenderer {
        let mut renderer = WaveformRenderer::in_memory(all_features(), FillStyles::default());
        renderer.set_geometry(GEOMETRY).unwrap();
        // Thirty seconds at two columns per second, ramping so every window differs.
        let peaks: Vec<f64> = (0..60)
            .flat_map(|i| {
                let value = 0.2 + (i % 10) as f64 * 0.08;
                [value, -value]
            })
            .collect();
        let _ = renderer.set_peaks(PeakBuffer::new(peaks, 1.0, 30.0));
        renderer
    }

    fn pixel(image: &ColorImage, x: usize, y: usize) -> Color32 {
        image.pixels[y * image.size[0] + x]
    }

    #[test]
    fn render_without_geometry_is_not_initialized() {
        let mut renderer = WaveformRenderer::in_memory(TileFeatures::default(), FillStyles::default());
        assert!(matches!(renderer.render(), Err(RenderError::NotInitialized)));
    }

    #[test]
    fn unchanged_geometry_keeps_tiles() {
        let mut renderer = renderer();
        assert_eq!(renderer.tiles().len(), 3);
        renderer.render().unwrap();
        assert!(!renderer.needs_redraw());
        renderer.set_geometry(GEOMETRY).unwrap();
        assert!(!renderer.needs_redraw());
        renderer
            .set_geometry(Geometry {
                max_tile_width_px: 100,
                ..GEOMETRY
            })
            .unwrap();
        assert!(renderer.needs_redraw());
        assert_eq!(renderer.tiles().len(), 3);
        assert_eq!(renderer.tiles().tiles()[2].owned_width_px(), 100);
    }

    #[test]
    fn trim_round_trip_restores_output() {
        let mut renderer = renderer();
        let _ = renderer.set_restrict_range(5.0, 15.0);
        let _ = renderer.enable_restrict(RestrictMode::Trim);
        renderer.render().unwrap();
        let trim = renderer.composite_image();

        assert!(renderer.set_restrict_mode(RestrictMode::Trimmed).needs_redraw());
        renderer.render().unwrap();
        let trimmed = renderer.composite_image();
        assert_ne!(trim.pixels, trimmed.pixels);

        let _ = renderer.set_restrict_mode(RestrictMode::Trim);
        renderer.render().unwrap();
        assert_eq!(renderer.composite_image().pixels, trim.pixels);
    }

    #[test]
    fn trimmed_mode_rebases_view_and_ticks() {
        let mut renderer = renderer();
        let _ = renderer.set_restrict_range(5.0, 15.0);
        let _ = renderer.enable_restrict(RestrictMode::Trimmed);
        assert_eq!(renderer.view_window(), 10..30);
        let mapping = renderer.timeline_mapping();
        assert_eq!(mapping.report(5.0), 0.0);
        assert_eq!(mapping.report(15.0), 10.0);
        let ticks = renderer.tick_marks(50);
        assert_eq!(ticks.first().map(|t| t.label.as_str()), Some("0:00"));
        assert_eq!(ticks.last().map(|t| t.seconds), Some(10.0));
        let report = renderer.render().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.tiles_drawn, 3);
    }

    #[test]
    fn trim_masks_outside_region() {
        let mut renderer = renderer();
        let _ = renderer.set_restrict_range(5.0, 15.0);
        let _ = renderer.enable_restrict(RestrictMode::Trim);
        renderer.render().unwrap();
        let image = renderer.composite_image();
        let styles = FillStyles::default();
        assert_eq!(pixel(&image, 20, 16), styles.restrict);
        assert_eq!(pixel(&image, 100, 16), styles.wave);
        assert_eq!(pixel(&image, 200, 16), styles.restrict);
    }

    #[test]
    fn disabled_restrict_draws_no_masks() {
        let mut renderer = renderer();
        let _ = renderer.set_restrict_range(5.0, 15.0);
        let _ = renderer.enable_restrict(RestrictMode::Trim);
        let _ = renderer.disable_restrict();
        renderer.render().unwrap();
        for tile in renderer.tiles().tiles() {
            for kind in [SurfaceKind::RestrictLeft, SurfaceKind::RestrictRight] {
                let surface = tile.surface(kind).unwrap();
                assert!(surface.image().pixels.iter().all(|p| *p == Color32::TRANSPARENT));
            }
        }
    }

    #[test]
    fn progress_overlay_follows_playback_time() {
        let mut renderer = renderer();
        renderer.set_progress_seconds(Some(15.0));
        renderer.render().unwrap();
        let image = renderer.composite_image();
        let styles = FillStyles::default();
        assert_eq!(pixel(&image, 100, 16), styles.progress);
        assert_eq!(pixel(&image, 200, 16), styles.wave);
    }

    #[test]
    fn shorter_peaks_report_refitted_region() {
        let mut renderer = renderer();
        let _ = renderer.set_restrict_range(20.0, 28.0);
        let _ = renderer.enable_restrict(RestrictMode::Trim);
        renderer.render().unwrap();

        let outcome = renderer.set_peaks(PeakBuffer::new(vec![0.5, -0.5].repeat(20), 1.0, 10.0));
        assert!(matches!(
            outcome.diagnostic,
            Some(RestrictDiagnostic::InvalidRange { duration, .. }) if duration == 10.0
        ));
        assert!(outcome.state.end_time <= 10.0);
        assert!(renderer.needs_redraw());
    }

    #[test]
    fn full_region_follows_new_peaks_silently() {
        let mut renderer = renderer();
        let outcome = renderer.set_peaks(PeakBuffer::new(vec![0.5, -0.5].repeat(20), 1.0, 10.0));
        assert_eq!(outcome.diagnostic, None);
        assert_eq!(renderer.restrict().state().end_time, 10.0);
    }

    #[test]
    fn view_window_narrows_timeline() {
        let mut renderer = renderer();
        renderer.set_view_window(0, 30);
        assert_eq!(renderer.view_window(), 0..30);
        assert_eq!(renderer.timeline_mapping().visible_end(), 15.0);
        renderer.set_view_window(50, 500);
        assert_eq!(renderer.view_window(), 50..60);
        renderer.reset_view_window();
        assert_eq!(renderer.view_window(), 0..60);
    }

    #[test]
    fn render_if_needed_skips_clean_state() {
        let mut renderer = renderer();
        assert!(renderer.render_if_needed().unwrap().is_some());
        assert!(renderer.render_if_needed().unwrap().is_none());
        let _ = renderer.set_restrict_range(1.0, 2.0);
        // Edits while disabled do not invalidate the picture.
        assert!(renderer.render_if_needed().unwrap().is_none());
    }

    #[test]
    fn export_images_follow_tiles() {
        let mut renderer = renderer();
        renderer.render().unwrap();
        let images = renderer
            .export_images(ExportFormat::Png, 1.0, ExportKind::Bytes)
            .unwrap();
        assert_eq!(images.len(), renderer.tiles().len());
    }
}
