//! Library exports for the CLI, benchmarks and tests.
/// Settings, log and export directories.
pub mod app_dirs;
/// Persisted render settings.
pub mod config;
/// Tracing subscriber setup.
pub mod logging;
/// Facade driving a full render pass.
pub mod renderer;
/// Restricted-region state and trim modes.
pub mod restrict;
/// Time reporting and tick marks.
pub mod timeline;
/// Peak buffers, envelope rasterization and tiles.
pub mod waveform;
