use std::sync::Arc;

/// Precomputed min/max envelope for a whole file, one `(max, min)` pair per column.
///
/// Peaks are stored interleaved exactly as the peak source hands them over, so column `i`
/// lives at `peaks[2 * i]` (max) and `peaks[2 * i + 1]` (min). The buffer is immutable and
/// cheap to clone, which lets every tile of a pass borrow the same samples.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakBuffer {
    peaks: Arc<[f64]>,
    abs_max: f64,
    duration_seconds: f64,
}

impl PeakBuffer {
    /// Wrap interleaved `(max, min)` peaks with their normalization magnitude and duration.
    ///
    /// Non-finite or negative magnitudes and durations collapse to zero.
    pub fn new(peaks: impl Into<Arc<[f64]>>, abs_max: f64, duration_seconds: f64) -> Self {
        Self {
            peaks: peaks.into(),
            abs_max: non_negative(abs_max),
            duration_seconds: non_negative(duration_seconds),
        }
    }

    /// Build a buffer whose `abs_max` is the largest magnitude found in `peaks`.
    pub fn from_peaks(peaks: impl Into<Arc<[f64]>>, duration_seconds: f64) -> Self {
        let peaks: Arc<[f64]> = peaks.into();
        let abs_max = peaks
            .iter()
            .filter(|value| value.is_finite())
            .fold(0.0_f64, |acc, value| acc.max(value.abs()));
        Self::new(peaks, abs_max, duration_seconds)
    }

    /// An empty buffer; every draw over it produces a zero-area envelope.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0.0, 0.0)
    }

    /// Raw interleaved samples.
    pub fn samples(&self) -> &[f64] {
        &self.peaks
    }

    /// Largest absolute amplitude, used to scale peaks to pixels.
    pub fn abs_max(&self) -> f64 {
        self.abs_max
    }

    /// Total duration of the underlying audio in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Number of logical columns (`(max, min)` pairs).
    pub fn column_count(&self) -> usize {
        self.peaks.len() / 2
    }

    /// True when the buffer holds no complete column.
    pub fn is_empty(&self) -> bool {
        self.column_count() == 0
    }

    /// Max sample for a column, or `0.0` when the column does not exist.
    pub fn max_at(&self, column: usize) -> f64 {
        self.sample_at(column.saturating_mul(2))
    }

    /// Min sample for a column, or `0.0` when the column does not exist.
    pub fn min_at(&self, column: usize) -> f64 {
        self.sample_at(column.saturating_mul(2).saturating_add(1))
    }

    /// Column index nearest to an absolute time in seconds.
    pub fn column_at_time(&self, seconds: f64) -> usize {
        if self.duration_seconds <= 0.0 || !seconds.is_finite() {
            return 0;
        }
        let fraction = (seconds / self.duration_seconds).clamp(0.0, 1.0);
        (fraction * self.column_count() as f64).round() as usize
    }

    fn sample_at(&self, index: usize) -> f64 {
        self.peaks
            .get(index)
            .copied()
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }
}

impl Default for PeakBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_read_as_max_min_pairs() {
        let buffer = PeakBuffer::new(vec![1.0, -0.5, 0.8, -0.8], 1.0, 2.0);
        assert_eq!(buffer.column_count(), 2);
        assert_eq!(buffer.max_at(1), 0.8);
        assert_eq!(buffer.min_at(0), -0.5);
    }

    #[test]
    fn missing_and_non_finite_samples_read_as_zero() {
        let buffer = PeakBuffer::new(vec![f64::NAN, -0.5, 0.3], 1.0, 1.0);
        assert_eq!(buffer.max_at(0), 0.0);
        assert_eq!(buffer.min_at(1), 0.0);
        assert_eq!(buffer.max_at(40), 0.0);
        assert_eq!(buffer.column_count(), 1);
    }

    #[test]
    fn from_peaks_derives_abs_max() {
        let buffer = PeakBuffer::from_peaks(vec![0.2, -0.9, 0.4, -0.1], 1.0);
        assert!((buffer.abs_max() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn column_at_time_scales_by_duration() {
        let buffer = PeakBuffer::new(vec![0.0; 60], 1.0, 30.0);
        assert_eq!(buffer.column_at_time(5.0), 5);
        assert_eq!(buffer.column_at_time(15.0), 15);
        assert_eq!(buffer.column_at_time(90.0), 30);
        assert_eq!(PeakBuffer::empty().column_at_time(3.0), 0);
    }
}
