use ndarray::ArrayView1;
use rustfft::{num_complex::Complex64, FftPlanner};
/// One-sided magnitude spectrum of a single trace.
#[derive(Clone, Debug)]
pub struct FrequencySpectrum {
    pub frequencies_hz: Vec<f64>,
    pub magnitudes: Vec<f64>,
}
impl FrequencySpectrum {
    pub fn compute(signal: ArrayView1<'_, f64>, sample_rate_hz: f64) -> Self {
        let n = signal.len();
        if n == 0 {
            return Self {
                frequencies_hz: Vec::new(),
                magnitudes: Vec::new(),
            };
        }
        let mean = signal.sum() / n as f64;
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex64> = signal
            .iter()
            .map(|&v| Complex64::new(v - mean, 0.0))
            .collect();
        fft.process(&mut buffer);
        let bins = n / 2 + 1;
        let frequencies_hz = (0..bins)
            .map(|k| k as f64 * sample_rate_hz / n as f64)
            .collect();
        let magnitudes = buffer
            .iter()
            .take(bins)
            .map(|c| c.norm() / n as f64)
            .collect();
        Self {
            frequencies_hz,
            magnitudes,
        }
    }
    /// Frequency of the strongest non-DC bin.
    pub fn peak_frequency(&self) -> Option<f64> {
        let (idx, mag) = self
            .magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        (*mag > f64::EPSILON).then(|| self.frequencies_hz[idx])
    }
}
/// Dominant sweep frequency of a voltage trace, `None` for short or flat input.
pub fn dominant_frequency(signal: ArrayView1<'_, f64>, sample_rate_hz: f64) -> Option<f64> {
    if signal.len() < 4 || sample_rate_hz <= 0.0 {
        return None;
    }
    FrequencySpectrum::compute(signal, sample_rate_hz).peak_frequency()
}
/// Turning-point spacing implied by a sweep frequency: half a period, minus
/// a margin so jittered turning points are not merged.
pub fn turning_point_distance(sweep_hz: f64, sample_rate_hz: f64) -> usize {
    let half_period = 0.5 * sample_rate_hz / sweep_hz;
    ((half_period * 0.8).floor() as usize).max(1)
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use std::f64::consts::PI;
    #[test]
    fn finds_sweep_frequency() {
        let fs = 1000.0;
        let signal = Array1::from_shape_fn(2000, |i| 0.3 + (2.0 * PI * 25.0 * i as f64 / fs).sin());
        let f = dominant_frequency(signal.view(), fs).unwrap();
        assert!((f - 25.0).abs() < 0.5);
    }
    #[test]
    fn flat_or_short_signal_has_no_frequency() {
        assert_eq!(dominant_frequency(Array1::from_elem(64, 1.0).view(), 100.0), None);
        assert_eq!(dominant_frequency(Array1::from_elem(3, 1.0).view(), 100.0), None);
    }
    #[test]
    fn distance_is_shorter_than_half_period() {
        assert_eq!(turning_point_distance(10.0, 1000.0), 40);
        assert_eq!(turning_point_distance(1.0e6, 10.0), 1);
    }
}
