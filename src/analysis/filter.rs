use std::f64::consts::PI;
use ndarray::{Array1, ArrayView1};
use crate::analysis::{LpError, LpResult};
#[derive(Clone, Copy, Debug)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}
impl BiquadCoeffs {
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }
}
#[derive(Clone, Copy, Debug, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}
#[derive(Clone, Copy, Debug)]
struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}
impl BiquadFilter {
    fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }
    /// Load the state a constant input `x0` would settle to.
    fn prime(&mut self, x0: f64) -> f64 {
        let c = self.coeffs;
        let y0 = c.dc_gain() * x0;
        self.state.z2 = c.b2 * x0 - c.a2 * y0;
        self.state.z1 = c.b1 * x0 - c.a1 * y0 + self.state.z2;
        y0
    }
    fn process(&mut self, input: f64) -> f64 {
        // Transposed direct form II
        let y = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * y + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * y;
        y
    }
}
/// Butterworth low-pass built from cascaded biquads, applied forward and
/// backward so the output has no phase lag.
#[derive(Clone, Debug)]
pub struct LowpassFilter {
    sections: Vec<BiquadFilter>,
}
impl LowpassFilter {
    pub fn butterworth(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> LpResult<Self> {
        if sample_rate_hz <= 0.0 {
            return Err(LpError::InvalidSampleRate);
        }
        if order == 0 || order % 2 != 0 {
            return Err(LpError::Config(format!(
                "butterworth order must be a positive even number, got {order}"
            )));
        }
        if cutoff_hz <= 0.0 || cutoff_hz >= 0.5 * sample_rate_hz {
            return Err(LpError::Config(format!(
                "cutoff {cutoff_hz} Hz outside (0, nyquist) for {sample_rate_hz} Hz sampling"
            )));
        }
        let sections = (0..order / 2)
            .map(|k| {
                let theta = (2 * k + 1) as f64 * PI / (2 * order) as f64;
                let q = 1.0 / (2.0 * theta.cos());
                BiquadFilter::new(lowpass(cutoff_hz, sample_rate_hz, q))
            })
            .collect();
        Ok(Self { sections })
    }
    pub fn order(&self) -> usize {
        self.sections.len() * 2
    }
    fn run_pass(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };
        let mut sections = self.sections.clone();
        let mut x0 = first;
        for section in &mut sections {
            x0 = section.prime(x0);
        }
        for value in data.iter_mut() {
            let mut v = *value;
            for section in &mut sections {
                v = section.process(v);
            }
            *value = v;
        }
    }
    /// Zero-phase filtering with odd-reflection padding at both ends.
    pub fn filtfilt(&self, signal: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_owned();
        }
        let pad = (3 * (self.order() + 1)).min(n - 1);
        let (first, last) = (signal[0], signal[n - 1]);
        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|k| 2.0 * first - signal[k]));
        ext.extend(signal.iter().copied());
        ext.extend((1..=pad).map(|k| 2.0 * last - signal[n - 1 - k]));
        self.run_pass(&mut ext);
        ext.reverse();
        self.run_pass(&mut ext);
        ext.reverse();
        Array1::from(ext[pad..pad + n].to_vec())
    }
}
fn lowpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 - cos_w0) * 0.5;
    let b1 = 1.0 - cos_w0;
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}
fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadCoeffs {
    let a0_inv = 1.0 / a0;
    BiquadCoeffs {
        b0: b0 * a0_inv,
        b1: b1 * a0_inv,
        b2: b2 * a0_inv,
        a1: a1 * a0_inv,
        a2: a2 * a0_inv,
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn tone(freq_hz: f64, fs: f64, n: usize) -> Array1<f64> {
        Array1::from_shape_fn(n, |i| (2.0 * PI * freq_hz * i as f64 / fs).sin())
    }
    fn rms(values: &[f64]) -> f64 {
        (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
    }
    #[test]
    fn constant_signal_is_unchanged() {
        let filter = LowpassFilter::butterworth(4, 50.0, 1000.0).unwrap();
        let out = filter.filtfilt(Array1::from_elem(300, 2.5).view());
        assert_eq!(out.len(), 300);
        assert!(out.iter().all(|v| (v - 2.5).abs() < 1e-9));
    }
    #[test]
    fn passband_kept_stopband_removed() {
        let fs = 1000.0;
        let filter = LowpassFilter::butterworth(4, 50.0, fs).unwrap();
        let low = filter.filtfilt(tone(5.0, fs, 2000).view());
        let high = filter.filtfilt(tone(400.0, fs, 2000).view());
        let mid = 500..1500;
        let low_in = tone(5.0, fs, 2000);
        let ratio = rms(&low.as_slice().unwrap()[mid.clone()])
            / rms(&low_in.as_slice().unwrap()[mid.clone()]);
        assert!((ratio - 1.0).abs() < 0.02, "passband ratio {ratio}");
        assert!(rms(&high.as_slice().unwrap()[mid]) < 1e-2);
    }
    #[test]
    fn zero_phase_keeps_peak_position() {
        let fs = 1000.0;
        let filter = LowpassFilter::butterworth(4, 50.0, fs).unwrap();
        let input = tone(5.0, fs, 2000);
        let out = filter.filtfilt(input.view());
        // 5 Hz sine peaks at 50 ms + k*200 ms; check the one at 1050 ms
        let window = 1000..1100;
        let argmax = window
            .max_by(|&a, &b| out[a].partial_cmp(&out[b]).unwrap())
            .unwrap();
        assert!((argmax as i64 - 1050).abs() <= 1);
    }
    #[test]
    fn rejects_odd_order_and_bad_cutoff() {
        assert!(LowpassFilter::butterworth(3, 50.0, 1000.0).is_err());
        assert!(LowpassFilter::butterworth(2, 600.0, 1000.0).is_err());
        assert!(matches!(
            LowpassFilter::butterworth(2, 10.0, 0.0),
            Err(LpError::InvalidSampleRate)
        ));
    }
}
