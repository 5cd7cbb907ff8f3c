use std::path::Path;

use peakwave::waveform::PeakBuffer;

/// Interleaved peaks for `columns` columns following a slow triangle wave.
pub fn triangle_peaks(columns: usize) -> Vec<f64> {
    (0..columns)
        .flat_map(|i| {
            let phase = (i % 40) as f64 / 20.0;
            let level = 0.1 + 0.8 * if phase <= 1.0 { phase } else { 2.0 - phase };
            [level, -level * 0.75]
        })
        .collect()
}

pub fn triangle_buffer(columns: usize, duration_seconds: f64) -> PeakBuffer {
    PeakBuffer::new(triangle_peaks(columns), 1.0, duration_seconds)
}

/// Write a JSON peak file in the layout the CLI reads.
pub fn write_peak_file(path: &Path, columns: usize, duration_seconds: f64) {
    let body = serde_json::json!({
        "peaks": triangle_peaks(columns),
        "abs_max": 1.0,
        "duration_seconds": duration_seconds,
    });
    std::fs::write(path, body.to_string()).expect("write peak file");
}
