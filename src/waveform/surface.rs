//! Drawing targets a tile can paint into.
//!
//! A surface only needs the handful of operations the envelope pass uses: resize, clear,
//! a fill style, an optional column clip and a polygon fill. [`RasterSurface`] keeps its
//! pixels in an [`egui::ColorImage`] so the output can be uploaded as a texture or encoded
//! to an image file without conversion passes.

use std::ops::Range;

use egui::{Color32, ColorImage};

use super::error::SurfaceKind;
use super::raster::EnvelopePath;

/// Owned 2D raster target with the draw capability set used by render tiles.
pub trait Surface {
    /// Resize the backing store, discarding its content.
    fn resize(&mut self, width: u32, height: u32);
    /// Current `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);
    /// Reset every pixel to transparent.
    fn clear(&mut self);
    /// Colour used by subsequent fills.
    fn set_fill_style(&mut self, color: Color32);
    fn fill_style(&self) -> Color32;
    /// Restrict fills to a column range; `None` removes the clip.
    fn set_clip(&mut self, columns: Option<Range<u32>>);
    /// Fill a closed polygon with the current fill style.
    fn fill_path(&mut self, path: &EnvelopePath);
    /// Copy of the current pixels.
    fn snapshot(&self) -> ColorImage;
}

/// Creates surfaces for freshly partitioned tiles.
pub trait SurfaceFactory {
    type Surface: Surface;

    fn create(&mut self, kind: SurfaceKind, width: u32, height: u32) -> Self::Surface;
}

/// In-memory surface backed by an egui colour image.
#[derive(Clone, Debug)]
pub struct RasterSurface {
    image: ColorImage,
    width: u32,
    height: u32,
    fill: Color32,
    clip: Option<Range<u32>>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: blank_image(width, height),
            width,
            height,
            fill: Color32::WHITE,
            clip: None,
        }
    }

    /// Borrow the pixels without copying.
    pub fn image(&self) -> &ColorImage {
        &self.image
    }

    /// Pixel at `(x, y)`, if inside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.image
            .pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    fn column_bounds(&self) -> (usize, usize) {
        let width = self.width as usize;
        match &self.clip {
            Some(range) => (
                (range.start as usize).min(width),
                (range.end as usize).min(width),
            ),
            None => (0, width),
        }
    }
}

impl Surface for RasterSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.image = blank_image(width, height);
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.image.pixels.fill(Color32::TRANSPARENT);
    }

    fn set_fill_style(&mut self, color: Color32) {
        self.fill = color;
    }

    fn fill_style(&self) -> Color32 {
        self.fill
    }

    fn set_clip(&mut self, columns: Option<Range<u32>>) {
        self.clip = columns;
    }

    fn fill_path(&mut self, path: &EnvelopePath) {
        let (min_x, max_x) = self.column_bounds();
        if min_x >= max_x || self.height == 0 {
            return;
        }
        fill_polygon(
            &mut self.image,
            self.width as usize,
            self.height as usize,
            path.points(),
            self.fill,
            min_x..max_x,
        );
    }

    fn snapshot(&self) -> ColorImage {
        self.image.clone()
    }
}

/// Factory producing [`RasterSurface`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct RasterSurfaceFactory;

impl SurfaceFactory for RasterSurfaceFactory {
    type Surface = RasterSurface;

    fn create(&mut self, _kind: SurfaceKind, width: u32, height: u32) -> RasterSurface {
        RasterSurface::new(width, height)
    }
}

pub(crate) fn blank_image(width: u32, height: u32) -> ColorImage {
    ColorImage::new(
        [width as usize, height as usize],
        vec![Color32::TRANSPARENT; (width as usize) * (height as usize)],
    )
}

/// Even-odd scanline fill sampled at pixel centres.
///
/// Covered pixels are overwritten rather than blended so repeated fills of the same path
/// leave identical pixels.
fn fill_polygon(
    image: &mut ColorImage,
    width: usize,
    height: usize,
    points: &[(f64, f64)],
    color: Color32,
    columns: Range<usize>,
) {
    if points.len() < 3 {
        return;
    }
    let (min_y, max_y) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }
    let first_row = (min_y - 0.5).ceil().max(0.0) as usize;
    let last_row = ((max_y - 0.5).ceil().max(0.0) as usize).min(height);
    let mut crossings: Vec<f64> = Vec::with_capacity(8);
    for y in first_row..last_row {
        let center_y = y as f64 + 0.5;
        crossings.clear();
        for (idx, &(x0, y0)) in points.iter().enumerate() {
            let (x1, y1) = points[(idx + 1) % points.len()];
            let crosses = (y0 <= center_y && y1 > center_y) || (y1 <= center_y && y0 > center_y);
            if crosses {
                let t = (center_y - y0) / (y1 - y0);
                crossings.push(x0 + t * (x1 - x0));
            }
        }
        crossings.sort_by(f64::total_cmp);
        let row = y * width;
        for pair in crossings.chunks_exact(2) {
            let start = ((pair[0] - 0.5).ceil().max(0.0) as usize).max(columns.start);
            let end = ((pair[1] - 0.5).ceil().max(0.0) as usize).min(columns.end);
            if start >= end {
                continue;
            }
            if let Some(span) = image.pixels.get_mut(row + start..row + end) {
                span.fill(color);
            }
        }
    }
}
