//! Peak-to-polygon conversion for the amplitude envelope.
//!
//! The envelope is a single closed polygon: the top edge walks the max samples forward,
//! the bottom edge walks the min samples back, and the path closes on the starting point.

use super::peaks::PeakBuffer;
use super::surface::Surface;

/// Closed polygon in surface pixel coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvelopePath {
    points: Vec<(f64, f64)>,
}

impl EnvelopePath {
    pub fn from_points(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Vertices in drawing order; the closing edge back to the first point is implicit.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Vertices of the forward (max) edge, including the initial move-to point.
    pub fn top_edge(&self) -> &[(f64, f64)] {
        let split = self.points.len().saturating_add(1) / 2;
        &self.points[..split]
    }

    /// Vertices of the backward (min) edge.
    pub fn bottom_edge(&self) -> &[(f64, f64)] {
        let split = self.points.len().saturating_add(1) / 2;
        &self.points[split..]
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Geometry shared by every envelope drawn in a pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeGeometry {
    /// Pixel width of the surface receiving the envelope.
    pub width: u32,
    /// Half of the drawable height; the envelope's amplitude scale.
    pub half_height: f64,
    /// Vertical offset of the centre line.
    pub offset_y: f64,
}

/// Convert a raw peak value into a pixel offset from the centre line.
///
/// `abs_max` maps to `half_height`; a zero `abs_max` flattens every value to zero.
pub fn amp_to_px(value: f64, abs_max: f64, half_height: f64) -> f64 {
    if abs_max <= 0.0 || !abs_max.is_finite() || !value.is_finite() {
        return 0.0;
    }
    (value / (abs_max / half_height)).round()
}

/// Build the envelope polygon for columns `first..last`.
///
/// Returns `None` for an empty slice. Columns beyond the buffer read as silence.
pub fn envelope_path(
    buffer: &PeakBuffer,
    first: usize,
    last: usize,
    geometry: EnvelopeGeometry,
) -> Option<EnvelopePath> {
    if last <= first {
        return None;
    }
    let abs_max = buffer.abs_max();
    let half = geometry.half_height + geometry.offset_y;
    let columns = last - first;
    let scale = f64::from(geometry.width.saturating_sub(1)) / columns as f64;
    let y_for = |value: f64| half - amp_to_px(value, abs_max, geometry.half_height);

    let mut points = Vec::with_capacity(columns * 2 + 1);
    points.push((0.0, y_for(buffer.max_at(first))));
    for i in first..last {
        points.push(((i - first) as f64 * scale, y_for(buffer.max_at(i))));
    }
    for j in (first..last).rev() {
        points.push(((j - first) as f64 * scale, y_for(buffer.min_at(j))));
    }
    Some(EnvelopePath { points })
}

/// Rasterize the envelope for `first..last` into `surface` with its current fill style.
///
/// Returns `false` when the slice was empty and nothing was filled.
pub fn draw_envelope<S: Surface + ?Sized>(
    surface: &mut S,
    buffer: &PeakBuffer,
    first: usize,
    last: usize,
    half_height: f64,
    offset_y: f64,
) -> bool {
    let (width, _) = surface.dimensions();
    let geometry = EnvelopeGeometry {
        width,
        half_height,
        offset_y,
    };
    match envelope_path(buffer, first, last, geometry) {
        Some(path) => {
            surface.fill_path(&path);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::surface::RasterSurface;
    use egui::Color32;

    fn three_columns() -> PeakBuffer {
        PeakBuffer::new(vec![1.0, -0.5, 0.8, -0.8, 0.2, -0.2], 1.0, 3.0)
    }

    fn geometry(width: u32) -> EnvelopeGeometry {
        EnvelopeGeometry {
            width,
            half_height: 50.0,
            offset_y: 0.0,
        }
    }

    #[test]
    fn amp_to_px_hits_half_height_and_zero() {
        assert_eq!(amp_to_px(1.0, 1.0, 50.0), 50.0);
        assert_eq!(amp_to_px(0.0, 1.0, 50.0), 0.0);
        assert_eq!(amp_to_px(0.37, 0.37, 64.0), 64.0);
        assert_eq!(amp_to_px(0.5, 0.0, 50.0), 0.0);
    }

    #[test]
    fn amp_to_px_is_monotonic() {
        let mut previous = f64::NEG_INFINITY;
        for step in -100..=100 {
            let value = step as f64 / 100.0;
            let px = amp_to_px(value, 1.0, 37.0);
            assert!(px >= previous);
            previous = px;
        }
    }

    #[test]
    fn three_column_scenario_matches_expected_polygon() {
        let path = envelope_path(&three_columns(), 0, 3, geometry(3)).unwrap();
        let top: Vec<f64> = path.top_edge().iter().map(|p| p.1).collect();
        let bottom: Vec<f64> = path.bottom_edge().iter().map(|p| p.1).collect();
        assert_eq!(path.points().len(), 7);
        assert_eq!(top, vec![0.0, 0.0, 10.0, 40.0]);
        assert_eq!(bottom, vec![60.0, 90.0, 75.0]);
        let xs: Vec<f64> = path.top_edge()[1..].iter().map(|p| p.0).collect();
        let expected = [0.0, 2.0 / 3.0, 4.0 / 3.0];
        for (x, want) in xs.iter().zip(expected) {
            assert!((x - want).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_slice_produces_no_path() {
        assert!(envelope_path(&three_columns(), 2, 2, geometry(10)).is_none());
        assert!(envelope_path(&three_columns(), 3, 1, geometry(10)).is_none());
    }

    #[test]
    fn offset_shifts_centre_line() {
        let geometry = EnvelopeGeometry {
            width: 3,
            half_height: 50.0,
            offset_y: 10.0,
        };
        let path = envelope_path(&three_columns(), 0, 1, geometry).unwrap();
        assert_eq!(path.points()[0], (0.0, 10.0));
    }

    #[test]
    fn absent_peaks_draw_zero_area() {
        let mut surface = RasterSurface::new(8, 8);
        surface.set_fill_style(Color32::RED);
        assert!(draw_envelope(&mut surface, &PeakBuffer::empty(), 0, 5, 4.0, 0.0));
        assert!(surface.image().pixels.iter().all(|p| *p == Color32::TRANSPARENT));
    }

    #[test]
    fn draw_is_idempotent() {
        let buffer = PeakBuffer::from_peaks(
            (0..200)
                .map(|i| if i % 2 == 0 { (i as f64 * 0.1).sin().abs() } else { -(i as f64 * 0.07).cos().abs() })
                .collect::<Vec<_>>(),
            10.0,
        );
        let mut surface = RasterSurface::new(64, 32);
        surface.set_fill_style(Color32::LIGHT_BLUE);
        draw_envelope(&mut surface, &buffer, 0, 101, 16.0, 0.0);
        let first = surface.snapshot();
        draw_envelope(&mut surface, &buffer, 0, 101, 16.0, 0.0);
        assert_eq!(surface.snapshot().pixels, first.pixels);
        assert!(first.pixels.iter().any(|p| *p == Color32::LIGHT_BLUE));
    }
}
