use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::analysis::{LpError, LpResult};
/// Every analysis knob, loadable from a JSON file. Missing keys take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub acquisition: AcquisitionConfig,
    pub scaling: ScalingConfig,
    pub filter: FilterConfig,
    pub segment: SegmentConfig,
    pub probe: ProbeConfig,
    pub fit: FitConfig,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionConfig {
    pub sample_rate_hz: f64,
    pub voltage_column: String,
    pub current_column: String,
    pub time_column: Option<String>,
    /// Replaces the TraceName row of Yokogawa exports.
    pub trace_names: Option<Vec<String>>,
}
impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 1.0e6,
            voltage_column: "V".into(),
            current_column: "I".into(),
            time_column: Some("time".into()),
            trace_names: None,
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalingConfig {
    /// Divider ratio between probe and recorded voltage.
    pub voltage_multiplier: f64,
    /// Amperes per recorded volt across the shunt.
    pub current_multiplier: f64,
    /// -1 when electron collection is recorded as a negative shunt voltage.
    pub current_sign: f64,
}
impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            voltage_multiplier: 1000.0,
            current_multiplier: 0.1,
            current_sign: -1.0,
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub enabled: bool,
    pub cutoff_hz: f64,
    pub order: usize,
}
impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cutoff_hz: 1.0e4,
            order: 4,
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMode {
    /// Monotonic runs between consecutive turning points.
    Ramp,
    /// Full sweep periods between consecutive voltage minima.
    Period,
    /// Fixed-length windows ending at each voltage maximum.
    Window,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentConfig {
    pub mode: SegmentMode,
    /// Minimum excursion of a turning point from the mean voltage, in
    /// recorded volts. Measured from the mean, not from zero, so a biased
    /// sweep needs no retuning.
    pub height: f64,
    /// Minimum spacing between turning points in samples. `None` derives it
    /// from the dominant sweep frequency.
    pub distance: Option<usize>,
    pub trim_start: f64,
    pub trim_end: f64,
    /// Selection window before each voltage minimum, seconds.
    pub window_seconds: f64,
}
impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            mode: SegmentMode::Period,
            height: 0.1,
            distance: Some(150_000),
            trim_start: 0.0,
            trim_end: 0.0,
            window_seconds: 0.33,
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    pub area_m2: f64,
    pub ion_mass_amu: f64,
}
impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            area_m2: 1.0e-5,
            ion_mass_amu: 40.0,
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    /// Ion region ends this many Te below the floating potential.
    pub ion_margin_te: f64,
    /// Retardation region spans this many Te above the floating potential.
    pub electron_window_te: f64,
    pub initial_te_ev: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub min_points: usize,
    pub min_r_squared: f64,
}
impl Default for FitConfig {
    fn default() -> Self {
        Self {
            ion_margin_te: 3.0,
            electron_window_te: 3.0,
            initial_te_ev: 2.0,
            tolerance: 1.0e-3,
            max_iterations: 50,
            min_points: 5,
            min_r_squared: 0.9,
        }
    }
}
impl AnalysisConfig {
    pub fn load(path: impl AsRef<Path>) -> LpResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("loaded analysis config from {}", path.display());
        Ok(config)
    }
    pub fn validate(&self) -> LpResult<()> {
        let fs = self.acquisition.sample_rate_hz;
        if !(fs > 0.0 && fs.is_finite()) {
            return Err(LpError::InvalidSampleRate);
        }
        if self.filter.enabled {
            if self.filter.cutoff_hz <= 0.0 || self.filter.cutoff_hz >= 0.5 * fs {
                return Err(LpError::Config(format!(
                    "filter cutoff {} Hz must lie in (0, {}) Hz",
                    self.filter.cutoff_hz,
                    0.5 * fs
                )));
            }
            if self.filter.order == 0 || self.filter.order % 2 != 0 {
                return Err(LpError::Config(format!(
                    "filter order must be a positive even number, got {}",
                    self.filter.order
                )));
            }
        }
        let trims = [self.segment.trim_start, self.segment.trim_end];
        if trims.iter().any(|t| !(0.0..1.0).contains(t)) || trims.iter().sum::<f64>() >= 1.0 {
            return Err(LpError::Config(
                "segment trim fractions must be in [0, 1) and sum below 1".into(),
            ));
        }
        let scaling = &self.scaling;
        let gains = [scaling.voltage_multiplier, scaling.current_multiplier];
        if gains.iter().any(|g| *g == 0.0 || !g.is_finite()) {
            return Err(LpError::Config(
                "voltage and current multipliers must be finite and non-zero".into(),
            ));
        }
        if scaling.current_sign.abs() != 1.0 {
            return Err(LpError::Config(format!(
                "current sign must be 1 or -1, got {}",
                scaling.current_sign
            )));
        }
        if !(self.segment.window_seconds > 0.0) {
            return Err(LpError::Config("selection window must be positive".into()));
        }
        if self.probe.area_m2 <= 0.0 || self.probe.ion_mass_amu <= 0.0 {
            return Err(LpError::Config(
                "probe area and ion mass must be positive".into(),
            ));
        }
        if self.fit.min_points < 2 || self.fit.initial_te_ev <= 0.0 {
            return Err(LpError::Config(
                "fit needs min_points >= 2 and a positive initial Te".into(),
            ));
        }
        let fit = &self.fit;
        if !(fit.tolerance > 0.0) || fit.max_iterations == 0 {
            return Err(LpError::Config(
                "fit tolerance must be positive and max_iterations at least 1".into(),
            ));
        }
        if !(fit.ion_margin_te >= 0.0 && fit.electron_window_te > 0.0) {
            return Err(LpError::Config(
                "fit region widths must be positive".into(),
            ));
        }
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn defaults_are_valid() {
        AnalysisConfig::default().validate().unwrap();
    }
    #[test]
    fn partial_json_fills_defaults() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"probe": {"area_m2": 2e-6}, "segment": {"mode": "ramp"}}"#)
                .unwrap();
        assert_eq!(cfg.probe.area_m2, 2e-6);
        assert_eq!(cfg.probe.ion_mass_amu, 40.0);
        assert_eq!(cfg.segment.mode, SegmentMode::Ramp);
        assert_eq!(cfg.filter, FilterConfig::default());
    }
    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<AnalysisConfig, _> = serde_json::from_str(r#"{"probe": {"radius": 1}}"#);
        assert!(res.is_err());
    }
    #[test]
    fn validation_catches_bad_values() {
        let mut cfg = AnalysisConfig::default();
        cfg.filter.cutoff_hz = 6.0e5;
        assert!(matches!(cfg.validate(), Err(LpError::Config(_))));
        let mut cfg = AnalysisConfig::default();
        cfg.filter.order = 3;
        assert!(cfg.validate().is_err());
        let mut cfg = AnalysisConfig::default();
        cfg.segment.trim_start = 0.6;
        cfg.segment.trim_end = 0.5;
        assert!(cfg.validate().is_err());
        let mut cfg = AnalysisConfig::default();
        cfg.acquisition.sample_rate_hz = 0.0;
        assert!(matches!(cfg.validate(), Err(LpError::InvalidSampleRate)));
    }
    #[test]
    fn validation_rejects_zero_gains_and_empty_fit_budget() {
        let broken: [fn(&mut AnalysisConfig); 7] = [
            |c| c.scaling.voltage_multiplier = 0.0,
            |c| c.scaling.current_multiplier = 0.0,
            |c| c.scaling.current_sign = 0.0,
            |c| c.fit.tolerance = 0.0,
            |c| c.fit.tolerance = -1.0e-3,
            |c| c.fit.max_iterations = 0,
            |c| c.segment.window_seconds = 0.0,
        ];
        for (k, breaks) in broken.iter().enumerate() {
            let mut cfg = AnalysisConfig::default();
            breaks(&mut cfg);
            assert!(matches!(cfg.validate(), Err(LpError::Config(_))), "case {k}");
        }
        let mut cfg = AnalysisConfig::default();
        cfg.scaling.current_sign = 1.0;
        cfg.scaling.current_multiplier = -0.1;
        cfg.validate().unwrap();
    }
    #[test]
    fn load_roundtrips_through_file() {
        let path = std::env::temp_dir().join(format!(
            "lpkit_cfg_{}_{}.json",
            std::process::id(),
            line!()
        ));
        let mut cfg = AnalysisConfig::default();
        cfg.fit.max_iterations = 7;
        fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
        let loaded = AnalysisConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, cfg);
    }
}
