//! Tiled envelope rasterization of precomputed waveform peaks.
//!
//! A [`PeakBuffer`] holds the whole file's `(max, min)` columns. A [`TileSet`] splits the
//! rendered width into bounded [`RenderTile`]s, each drawing its share of the view window
//! onto its own [`Surface`]s.

mod error;
mod export;
mod peaks;
mod raster;
mod surface;
mod tile;
mod tiles;

pub use error::{ExportError, RenderError, SurfaceKind};
pub use export::{
    DEFAULT_EXPORT_QUALITY, ExportFormat, ExportHandle, ExportKind, ExportedImage, data_url,
    encode_image, export_color_image, write_image,
};
pub use peaks::PeakBuffer;
pub use raster::{EnvelopeGeometry, EnvelopePath, amp_to_px, draw_envelope, envelope_path};
pub use surface::{RasterSurface, RasterSurfaceFactory, Surface, SurfaceFactory};
pub use tile::{
    FillStyles, RenderTile, RestrictColumns, TileFeatures, TileOverlay, TileSurfaces,
    TimelineSpan,
};
pub use tiles::{PassReport, TileFailure, TileSet};
