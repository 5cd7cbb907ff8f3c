use crate::waveform::DEFAULT_EXPORT_QUALITY;

pub(super) const MAX_TILE_WIDTH_PX: u32 = 16_384;
pub(super) const MAX_HEIGHT_PX: u32 = 4_096;
pub(super) const MAX_PIXELS_PER_SECOND: f64 = 10_000.0;

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_max_tile_width_px() -> u32 {
    4_000
}

pub(super) fn default_height_px() -> u32 {
    128
}

pub(super) fn default_pixels_per_second() -> f64 {
    50.0
}

pub(super) fn default_export_quality() -> f32 {
    DEFAULT_EXPORT_QUALITY
}

pub(super) fn default_wave_color() -> String {
    "#faf6f0".to_string()
}

pub(super) fn default_progress_color() -> String {
    "#ff8c28".to_string()
}

pub(super) fn default_restrict_color() -> String {
    "#787878c8".to_string()
}

pub(super) fn clamp_tile_width(value: u32) -> u32 {
    value.clamp(1, MAX_TILE_WIDTH_PX)
}

pub(super) fn clamp_height(value: u32) -> u32 {
    value.clamp(1, MAX_HEIGHT_PX)
}

pub(super) fn clamp_pixels_per_second(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value.min(MAX_PIXELS_PER_SECOND)
    } else {
        default_pixels_per_second()
    }
}

pub(super) fn clamp_quality(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        DEFAULT_EXPORT_QUALITY
    }
}
