use std::path::PathBuf;
use thiserror::Error;

/// Drawing surfaces a tile can own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Wave,
    Progress,
    RestrictLeft,
    RestrictRight,
}

impl std::fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Wave => "wave",
            Self::Progress => "progress",
            Self::RestrictLeft => "restrict-left",
            Self::RestrictRight => "restrict-right",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Tile is missing its {kind} surface")]
    MissingSurface { kind: SurfaceKind },
    #[error("Tile has not been initialized with surfaces")]
    NotInitialized,
    #[error("Half height must be positive and finite, got {half_height}")]
    InvalidHalfHeight { half_height: f64 },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to encode {format} image: {source}")]
    Encode {
        format: &'static str,
        source: image::ImageError,
    },
    #[error("Image format {0} is not supported for export")]
    UnsupportedFormat(String),
    #[error("Export worker stopped before producing an image")]
    Worker,
    #[error("Malformed data URL payload: {0}")]
    DataUrl(#[from] base64::DecodeError),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}
