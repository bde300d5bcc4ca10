use std::collections::BTreeMap;
use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use crate::analysis::LpError;
/// Acquisition metadata, key -> one or more values as written by the scope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata(pub BTreeMap<String, Vec<String>>);
impl Metadata {
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(|v| v.as_slice())
    }
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(|s| s.as_str())
    }
    /// First value of `key` parsed as a float, if present and numeric.
    pub fn first_f64(&self, key: &str) -> Option<f64> {
        self.first(key).and_then(|s| s.parse().ok())
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
/// One acquisition run: time, probe voltage and probe current, sample-aligned.
#[derive(Clone, Debug)]
pub struct Recording {
    time: Array1<f64>,
    voltage: Array1<f64>,
    current: Array1<f64>,
    pub metadata: Metadata,
}
impl Recording {
    pub fn new(
        time: Array1<f64>,
        voltage: Array1<f64>,
        current: Array1<f64>,
        metadata: Metadata,
    ) -> Result<Self, LpError> {
        let len = time.len();
        for column in [&voltage, &current] {
            if column.len() != len {
                return Err(LpError::LengthMismatch {
                    expected: len,
                    actual: column.len(),
                });
            }
        }
        for (name, column) in [("time", &time), ("voltage", &voltage), ("current", &current)] {
            if let Some(idx) = column.iter().position(|x| !x.is_finite()) {
                return Err(LpError::format(
                    idx + 2,
                    format!("non-finite {name} at sample {idx}"),
                ));
            }
        }
        if let Some(idx) = time.windows(2).into_iter().position(|w| w[1] < w[0]) {
            return Err(LpError::format(
                idx + 2,
                format!("time decreases at sample {}", idx + 1),
            ));
        }
        Ok(Self {
            time,
            voltage,
            current,
            metadata,
        })
    }
    /// Build a recording with time `i / sample_rate_hz`.
    pub fn from_uniform(
        sample_rate_hz: f64,
        voltage: Array1<f64>,
        current: Array1<f64>,
        metadata: Metadata,
    ) -> Result<Self, LpError> {
        if sample_rate_hz <= 0.0 || !sample_rate_hz.is_finite() {
            return Err(LpError::InvalidSampleRate);
        }
        let time = Array1::from_shape_fn(voltage.len(), |i| i as f64 / sample_rate_hz);
        Self::new(time, voltage, current, metadata)
    }
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.time.view()
    }
    pub fn voltage(&self) -> ArrayView1<'_, f64> {
        self.voltage.view()
    }
    pub fn current(&self) -> ArrayView1<'_, f64> {
        self.current.view()
    }
    /// Mean sample rate estimated from the time span.
    pub fn sample_rate_hz(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let span = self.time[self.len() - 1] - self.time[0];
        (span > 0.0).then(|| (self.len() - 1) as f64 / span)
    }
    pub fn duration_seconds(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.time[self.len() - 1] - self.time[0]
        }
    }
    /// Convert recorded signals to physical units: volts and amperes with
    /// electron collection positive.
    pub fn scaled(&self, voltage_multiplier: f64, current_multiplier: f64) -> Recording {
        Recording {
            time: self.time.clone(),
            voltage: self.voltage.mapv(|v| v * voltage_multiplier),
            current: self.current.mapv(|i| i * current_multiplier),
            metadata: self.metadata.clone(),
        }
    }
    /// Same time base with replaced voltage and current traces.
    pub fn with_signals(
        &self,
        voltage: Array1<f64>,
        current: Array1<f64>,
    ) -> Result<Recording, LpError> {
        Recording::new(self.time.clone(), voltage, current, self.metadata.clone())
    }
    /// Keep every `factor`-th sample.
    pub fn decimated(&self, factor: usize) -> Recording {
        let step = factor.max(1) as isize;
        Recording {
            time: self.time.slice(s![..;step]).to_owned(),
            voltage: self.voltage.slice(s![..;step]).to_owned(),
            current: self.current.slice(s![..;step]).to_owned(),
            metadata: self.metadata.clone(),
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    #[test]
    fn rejects_mismatched_columns() {
        let err = Recording::new(
            array![0.0, 1.0],
            array![1.0],
            array![1.0, 2.0],
            Metadata::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LpError::LengthMismatch { expected: 2, actual: 1 }));
    }
    #[test]
    fn rejects_decreasing_time() {
        let err = Recording::new(
            array![0.0, 2.0, 1.0],
            Array1::zeros(3),
            Array1::zeros(3),
            Metadata::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LpError::Format { .. }));
    }
    #[test]
    fn rejects_non_finite_samples() {
        let err = Recording::new(
            array![f64::NAN, 1.0, 2.0],
            Array1::zeros(3),
            Array1::zeros(3),
            Metadata::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LpError::Format { line: 2, .. }));
        let err = Recording::from_uniform(
            10.0,
            array![0.0, f64::INFINITY],
            Array1::zeros(2),
            Metadata::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("voltage"), "{err}");
    }
    #[test]
    fn uniform_time_base_and_rate() {
        let rec = Recording::from_uniform(
            1000.0,
            array![0.0, 1.0, 2.0, 3.0, 4.0],
            Array1::zeros(5),
            Metadata::default(),
        )
        .unwrap();
        assert!((rec.time()[4] - 0.004).abs() < 1e-12);
        assert!((rec.sample_rate_hz().unwrap() - 1000.0).abs() < 1e-6);
        let dec = rec.decimated(2);
        assert_eq!(dec.len(), 3);
        assert_eq!(dec.voltage()[2], 4.0);
    }
    #[test]
    fn scaling_applies_multipliers() {
        let rec = Recording::from_uniform(
            1.0,
            array![0.01, -0.02],
            array![0.5, -0.5],
            Metadata::default(),
        )
        .unwrap();
        let phys = rec.scaled(1000.0, -0.1);
        assert!((phys.voltage()[0] - 10.0).abs() < 1e-12);
        assert!((phys.current()[1] - 0.05).abs() < 1e-12);
    }
}
