use std::ops::Range;

use egui::{Color32, ColorImage};

use super::error::{ExportError, RenderError, SurfaceKind};
use super::export::{ExportFormat, ExportKind, ExportedImage};
use super::peaks::PeakBuffer;
use super::surface::{Surface, SurfaceFactory, blank_image};
use super::tile::{FillStyles, RenderTile, TileFeatures, TileOverlay, TileSurfaces};

/// A tile that failed during a pass, with the reason.
#[derive(Debug)]
pub struct TileFailure {
    pub index: usize,
    pub error: RenderError,
}

/// Outcome of drawing every tile once.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Tiles whose wave surface received an envelope path.
    pub tiles_drawn: usize,
    /// Tiles whose slice of the view was empty.
    pub tiles_empty: usize,
    pub failures: Vec<TileFailure>,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered, left-to-right sequence of render tiles covering the whole timeline.
pub struct TileSet<F: SurfaceFactory> {
    factory: F,
    tiles: Vec<RenderTile<F::Surface>>,
    features: TileFeatures,
    styles: FillStyles,
    total_width_px: u32,
    max_tile_width_px: u32,
    height_px: u32,
}

impl<F: SurfaceFactory> TileSet<F> {
    pub fn new(factory: F, features: TileFeatures, styles: FillStyles) -> Self {
        Self {
            factory,
            tiles: Vec::new(),
            features,
            styles,
            total_width_px: 0,
            max_tile_width_px: 0,
            height_px: 0,
        }
    }

    /// Destroy every tile and rebuild `ceil(total / max)` tiles of at most `max` pixels.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn repartition(
        &mut self,
        total_width_px: u32,
        max_tile_width_px: u32,
        height_px: u32,
    ) -> Result<(), RenderError> {
        self.destroy();
        let max_width = max_tile_width_px.max(1);
        self.total_width_px = total_width_px;
        self.max_tile_width_px = max_width;
        self.height_px = height_px;

        let count = total_width_px.div_ceil(max_width);
        let mut tiles = Vec::with_capacity(count as usize);
        for index in 0..count {
            let left = index * max_width;
            let owned = max_width.min(total_width_px - left);
            let mut tile = RenderTile::new(self.features, self.styles);
            tile.update_dimensions(left, owned, total_width_px, owned, height_px);
            let surfaces = self.create_surfaces(owned, height_px);
            tile.initialize(surfaces)?;
            tiles.push(tile);
        }
        self.tiles = tiles;
        tracing::debug!(
            "Partitioned {total_width_px}px waveform into {count} tile(s) of at most {max_width}px"
        );
        Ok(())
    }

    /// Run `op` on every tile, left to right.
    pub fn for_each_tile(&self, mut op: impl FnMut(usize, &RenderTile<F::Surface>)) {
        for (index, tile) in self.tiles.iter().enumerate() {
            op(index, tile);
        }
    }

    /// Run `op` on every tile mutably, left to right.
    pub fn for_each_tile_mut(&mut self, mut op: impl FnMut(usize, &mut RenderTile<F::Surface>)) {
        for (index, tile) in self.tiles.iter_mut().enumerate() {
            op(index, tile);
        }
    }

    pub fn clear(&mut self) {
        self.for_each_tile_mut(|_, tile| tile.clear());
    }

    pub fn set_fill_styles(&mut self, styles: FillStyles) {
        self.styles = styles;
        self.for_each_tile_mut(|_, tile| {
            tile.set_fill_styles(styles.wave, Some(styles.progress), Some(styles.restrict))
        });
    }

    /// Draw every tile over the view window `view`.
    ///
    /// A failing tile is recorded and skipped; the remaining tiles still draw.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(tiles = self.tiles.len(), first = view.start, end = view.end)
    )]
    pub fn draw_pass(
        &mut self,
        buffer: &PeakBuffer,
        half_height: f64,
        offset_y: f64,
        view: Range<usize>,
        mut overlay_for: impl FnMut(&RenderTile<F::Surface>) -> TileOverlay,
    ) -> PassReport {
        let mut report = PassReport::default();
        for (index, tile) in self.tiles.iter_mut().enumerate() {
            let overlay = overlay_for(tile);
            match tile.draw_envelope(buffer, half_height, offset_y, view.clone(), &overlay) {
                Ok(true) => report.tiles_drawn += 1,
                Ok(false) => report.tiles_empty += 1,
                Err(error) => {
                    tracing::warn!("Waveform tile {index} failed to draw: {error}");
                    report.failures.push(TileFailure { index, error });
                }
            }
        }
        report
    }

    /// Release every tile; safe to call repeatedly.
    pub fn destroy(&mut self) {
        self.for_each_tile_mut(|_, tile| tile.destroy());
        self.tiles.clear();
    }

    /// Export the wave surface of each tile in order.
    #[tracing::instrument(level = "debug", skip(self), fields(tiles = self.tiles.len()))]
    pub fn export_images(
        &self,
        format: ExportFormat,
        quality: f32,
        kind: ExportKind,
    ) -> Result<Vec<ExportedImage>, ExportError> {
        self.tiles
            .iter()
            .map(|tile| tile.export_image(format, quality, kind))
            .collect()
    }

    /// Stitch every tile's surfaces into one image the width of the whole timeline.
    ///
    /// Layers are stacked wave, progress, then restrict masks.
    pub fn composite(&self) -> ColorImage {
        let mut image = blank_image(self.total_width_px, self.height_px);
        let layers = [
            SurfaceKind::Wave,
            SurfaceKind::Progress,
            SurfaceKind::RestrictLeft,
            SurfaceKind::RestrictRight,
        ];
        for tile in &self.tiles {
            for kind in layers {
                if let Some(surface) = tile.surface(kind) {
                    blit_over(&mut image, &surface.snapshot(), tile.left_offset_px() as usize);
                }
            }
        }
        image
    }

    pub fn tiles(&self) -> &[RenderTile<F::Surface>] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn total_width_px(&self) -> u32 {
        self.total_width_px
    }

    pub fn max_tile_width_px(&self) -> u32 {
        self.max_tile_width_px
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }

    pub fn fill_styles(&self) -> FillStyles {
        self.styles
    }

    fn create_surfaces(&mut self, width: u32, height: u32) -> TileSurfaces<F::Surface> {
        let features = self.features;
        let factory = &mut self.factory;
        TileSurfaces {
            wave: Some(factory.create(SurfaceKind::Wave, width, height)),
            progress: features
                .progress
                .then(|| factory.create(SurfaceKind::Progress, width, height)),
            restrict_left: features
                .restrict
                .then(|| factory.create(SurfaceKind::RestrictLeft, width, height)),
            restrict_right: features
                .restrict
                .then(|| factory.create(SurfaceKind::RestrictRight, width, height)),
        }
    }
}

impl<F: SurfaceFactory> Drop for TileSet<F> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Copy non-transparent pixels of `source` into `target` starting at column `x_offset`.
fn blit_over(target: &mut ColorImage, source: &ColorImage, x_offset: usize) {
    let [target_width, target_height] = target.size;
    let [source_width, source_height] = source.size;
    if x_offset >= target_width {
        return;
    }
    let len = source_width.min(target_width - x_offset);
    for y in 0..source_height.min(target_height) {
        let dest_offset = y * target_width + x_offset;
        let src_offset = y * source_width;
        if let (Some(dest), Some(src)) = (
            target.pixels.get_mut(dest_offset..dest_offset + len),
            source.pixels.get(src_offset..src_offset + len),
        ) {
            for (out, pixel) in dest.iter_mut().zip(src) {
                if *pixel != Color32::TRANSPARENT {
                    *out = *pixel;
                }
            }
        }
    }
}
