//! Analytic probe characteristics and synthetic sweep recordings.
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use crate::analysis::fit::{bohm_speed, floating_offset, BOHM_FACTOR, M_ELECTRON, Q_ELECTRON};
use crate::analysis::{LpError, LpResult, Metadata, Recording};
use crate::config::{ProbeConfig, ScalingConfig};
/// Single Langmuir probe in a Maxwellian plasma.
#[derive(Clone, Debug, PartialEq)]
pub struct IvModel {
    pub electron_temperature_ev: f64,
    pub density_m3: f64,
    pub plasma_potential_v: f64,
    pub probe: ProbeConfig,
    /// Relative growth of the ion current per volt below the floating potential.
    pub sheath_slope: f64,
    /// Relative growth of the electron current per volt above the plasma potential.
    pub esat_slope: f64,
}
impl IvModel {
    pub fn new(te_ev: f64, density_m3: f64, plasma_potential_v: f64, probe: ProbeConfig) -> Self {
        Self {
            electron_temperature_ev: te_ev,
            density_m3,
            plasma_potential_v,
            probe,
            sheath_slope: 0.01,
            esat_slope: 0.01,
        }
    }
    /// Default probe in argon.
    #[cfg(test)]
    pub fn argon(te_ev: f64, density_m3: f64, plasma_potential_v: f64) -> Self {
        Self::new(te_ev, density_m3, plasma_potential_v, ProbeConfig::default())
    }
    pub fn ion_saturation_current(&self) -> f64 {
        BOHM_FACTOR
            * Q_ELECTRON
            * self.density_m3
            * self.probe.area_m2
            * bohm_speed(self.electron_temperature_ev, self.probe.ion_mass_amu)
    }
    pub fn electron_saturation_current(&self) -> f64 {
        let thermal = (Q_ELECTRON * self.electron_temperature_ev
            / (2.0 * std::f64::consts::PI * M_ELECTRON))
            .sqrt();
        Q_ELECTRON * self.density_m3 * self.probe.area_m2 * thermal
    }
    pub fn floating_potential(&self) -> f64 {
        self.plasma_potential_v
            - floating_offset(self.electron_temperature_ev, self.probe.ion_mass_amu)
    }
    /// Net probe current in amperes, electron collection positive.
    pub fn current(&self, voltage: f64) -> f64 {
        let te = self.electron_temperature_ev;
        let v_p = self.plasma_potential_v;
        let i_es = self.electron_saturation_current();
        let electron = if voltage < v_p {
            i_es * ((voltage - v_p) / te).exp()
        } else {
            i_es * (1.0 + self.esat_slope * (voltage - v_p))
        };
        let sheath = (1.0 + self.sheath_slope * (self.floating_potential() - voltage)).max(0.0);
        electron - self.ion_saturation_current() * sheath
    }
    /// Model current at every voltage plus seeded Gaussian noise of `sigma` amperes.
    pub fn sample(&self, voltage: ArrayView1<'_, f64>, sigma: f64, seed: u64) -> Array1<f64> {
        voltage.mapv(|v| self.current(v)) + gaussian_noise(voltage.len(), sigma, seed)
    }
}
/// `n` samples of zero-mean white noise. Non-positive `sigma` gives zeros.
pub fn gaussian_noise(n: usize, sigma: f64, seed: u64) -> Array1<f64> {
    let normal = match Normal::new(0.0, sigma) {
        Ok(normal) if sigma > 0.0 => normal,
        _ => return Array1::zeros(n),
    };
    let mut rng = StdRng::seed_from_u64(seed);
    Array1::from_shape_simple_fn(n, || normal.sample(&mut rng))
}
/// Triangular bias sweep applied to an [`IvModel`], recorded the way the
/// acquisition chain sees it.
#[derive(Clone, Debug)]
pub struct SweepSynth {
    pub model: IvModel,
    pub sample_rate_hz: f64,
    pub sweep_hz: f64,
    pub periods: usize,
    pub v_min: f64,
    pub v_max: f64,
    /// Current noise in amperes.
    pub noise_a: f64,
    pub seed: u64,
}
impl SweepSynth {
    pub fn new(model: IvModel) -> Self {
        Self {
            model,
            sample_rate_hz: 1.0e6,
            sweep_hz: 2.0,
            periods: 4,
            v_min: -200.0,
            v_max: 50.0,
            noise_a: 0.0,
            seed: 0,
        }
    }
    /// Probe bias at time `t`. Starts halfway up a rising ramp so every
    /// turning point falls inside the record.
    pub fn bias(&self, t: f64) -> f64 {
        let phase = (t * self.sweep_hz + 0.25).fract();
        let tri = if phase < 0.5 {
            4.0 * phase - 1.0
        } else {
            3.0 - 4.0 * phase
        };
        0.5 * (self.v_max + self.v_min) + 0.5 * (self.v_max - self.v_min) * tri
    }
    /// Physical-unit traces converted back to recorded volts with `scaling`.
    pub fn generate(&self, scaling: &ScalingConfig) -> LpResult<Recording> {
        let current_gain = scaling.current_multiplier * scaling.current_sign;
        if scaling.voltage_multiplier == 0.0 || current_gain == 0.0 {
            return Err(LpError::Config("scaling gains must be non-zero".into()));
        }
        let n = (self.periods as f64 * self.sample_rate_hz / self.sweep_hz).round() as usize;
        let voltage = Array1::from_shape_fn(n, |i| self.bias(i as f64 / self.sample_rate_hz));
        let current = self.model.sample(voltage.view(), self.noise_a, self.seed);
        let mut metadata = Metadata::default();
        metadata.insert("Source", vec!["synthetic".into()]);
        metadata.insert(
            "Model",
            vec![
                format!("Te={}", self.model.electron_temperature_ev),
                format!("n={:e}", self.model.density_m3),
                format!("Vp={}", self.model.plasma_potential_v),
            ],
        );
        metadata.insert("HResolution", vec![format!("{:e}", 1.0 / self.sample_rate_hz)]);
        log::info!(
            "synthesised {n} samples: {} periods at {} Hz, Te {} eV",
            self.periods,
            self.sweep_hz,
            self.model.electron_temperature_ev
        );
        Recording::from_uniform(
            self.sample_rate_hz,
            voltage / scaling.voltage_multiplier,
            current / current_gain,
            metadata,
        )
    }
}
