//! Two-stage Langmuir probe fit.
//!
//! The ion branch is modelled as a straight line (sheath expansion makes it
//! tilt slightly), the electron retardation branch as `I_e = I_0 exp(V / Te)`
//! with `Te` in eV. Both regions are placed relative to the floating potential
//! in units of the current `Te` estimate, so the fit is repeated until `Te`
//! stops moving.
use std::f64::consts::PI;
use std::fmt;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use crate::analysis::average::IvCurve;
use crate::analysis::FitError;
use crate::config::{FitConfig, ProbeConfig};
/// Elementary charge (C).
pub const Q_ELECTRON: f64 = 1.602176634e-19;
/// Electron mass (kg).
pub const M_ELECTRON: f64 = 9.1093837015e-31;
/// Atomic mass unit (kg).
pub const AMU: f64 = 1.66053906660e-27;
/// Ion flux factor at the sheath edge, `exp(-1/2)`.
pub const BOHM_FACTOR: f64 = 0.61;
/// Least-squares straight line `y = intercept + slope * x`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub rms_residual: f64,
    pub points: usize,
}
impl LineFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<LineFit> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let xs = ArrayView1::from(&x[..n]);
    let ys = ArrayView1::from(&y[..n]);
    let x_mean = xs.mean()?;
    let y_mean = ys.mean()?;
    let dx: Array1<f64> = xs.mapv(|v| v - x_mean);
    let dy: Array1<f64> = ys.mapv(|v| v - y_mean);
    let sxx = dx.dot(&dx);
    if sxx <= f64::EPSILON * n as f64 {
        return None;
    }
    let slope = dx.dot(&dy) / sxx;
    let intercept = y_mean - slope * x_mean;
    let residuals = &dy - &(&dx * slope);
    let rss = residuals.dot(&residuals);
    let tss = dy.dot(&dy);
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 1.0 };
    Some(LineFit {
        slope,
        intercept,
        r_squared,
        rms_residual: (rss / n as f64).sqrt(),
        points: n,
    })
}
/// Plasma parameters extracted from one I-V characteristic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub electron_temperature_ev: f64,
    pub density_m3: f64,
    pub floating_potential_v: f64,
    pub plasma_potential_v: f64,
    pub ion_saturation_current_a: f64,
    pub electron_saturation_current_a: f64,
    /// Ion branch, current (A) against voltage.
    pub ion_fit: LineFit,
    /// Retardation branch, ln(electron current) against voltage.
    pub electron_fit: LineFit,
    pub iterations: usize,
}
impl FitResult {
    /// Modelled probe current at `voltage`, valid below the plasma potential.
    pub fn model_current(&self, voltage: f64) -> f64 {
        let v = voltage.min(self.plasma_potential_v);
        self.ion_fit.eval(voltage) + self.electron_fit.eval(v).exp()
    }
    /// `points` samples of the model from `lo` up to `hi` or the plasma
    /// potential, whichever is lower. Empty when that range is empty.
    pub fn model_curve(&self, lo: f64, hi: f64, points: usize) -> Vec<(f64, f64)> {
        let hi = hi.min(self.plasma_potential_v);
        if hi.is_nan() || lo.is_nan() || hi <= lo || points < 2 {
            return Vec::new();
        }
        let dv = (hi - lo) / (points - 1) as f64;
        (0..points)
            .map(|k| {
                let v = lo + dv * k as f64;
                (v, self.model_current(v))
            })
            .collect()
    }
}
impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Te   = {:.3} eV", self.electron_temperature_ev)?;
        writeln!(f, "n    = {:.3e} m^-3", self.density_m3)?;
        writeln!(f, "V_f  = {:.3} V", self.floating_potential_v)?;
        writeln!(f, "V_p  = {:.3} V", self.plasma_potential_v)?;
        writeln!(f, "I_is = {:.4e} A", self.ion_saturation_current_a)?;
        writeln!(
            f,
            "R^2  = {:.5} (exp, {} pts) / {:.5} (ion, {} pts), {} iterations",
            self.electron_fit.r_squared,
            self.electron_fit.points,
            self.ion_fit.r_squared,
            self.ion_fit.points,
            self.iterations
        )
    }
}
/// Ion sound speed (m/s) for electron temperature `te_ev`.
pub fn bohm_speed(te_ev: f64, ion_mass_amu: f64) -> f64 {
    (Q_ELECTRON * te_ev / (ion_mass_amu * AMU)).sqrt()
}
/// Density from ion saturation current via the Bohm criterion.
pub fn bohm_density(i_isat: f64, te_ev: f64, probe: &ProbeConfig) -> f64 {
    i_isat / (BOHM_FACTOR * Q_ELECTRON * probe.area_m2 * bohm_speed(te_ev, probe.ion_mass_amu))
}
/// Plasma minus floating potential for a Maxwellian plasma, in volts.
pub fn floating_offset(te_ev: f64, ion_mass_amu: f64) -> f64 {
    te_ev * ((ion_mass_amu * AMU / (2.0 * PI * M_ELECTRON)).sqrt() / BOHM_FACTOR).ln()
}
/// First negative-to-positive crossing of `current`, linearly interpolated.
/// Points must be sorted by voltage.
fn floating_potential(points: &[(f64, f64)]) -> Option<f64> {
    points.windows(2).find_map(|w| {
        let ((v0, i0), (v1, i1)) = (w[0], w[1]);
        if i0 <= 0.0 && i1 > 0.0 {
            Some(if i1 == i0 { v0 } else { v0 - i0 * (v1 - v0) / (i1 - i0) })
        } else {
            None
        }
    })
}
#[derive(Clone, Debug)]
pub struct LangmuirFitter {
    pub probe: ProbeConfig,
    pub fit: FitConfig,
}
impl LangmuirFitter {
    pub fn new(probe: ProbeConfig, fit: FitConfig) -> Self {
        Self { probe, fit }
    }
    pub fn fit_curve(&self, curve: &IvCurve) -> Result<FitResult, FitError> {
        self.fit(&curve.voltage, &curve.current)
    }
    /// Fit a characteristic given in volts and amperes, electron current positive.
    pub fn fit(&self, voltage: &[f64], current: &[f64]) -> Result<FitResult, FitError> {
        let cfg = &self.fit;
        let mut points: Vec<(f64, f64)> = voltage
            .iter()
            .copied()
            .zip(current.iter().copied())
            .filter(|(v, i)| v.is_finite() && i.is_finite())
            .collect();
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let v_f = floating_potential(&points).ok_or(FitError::NoFloatingPotential)?;
        log::debug!("floating potential {v_f:.4} V from {} points", points.len());
        let mut te = cfg.initial_te_ev;
        let mut electron: Option<LineFit> = None;
        for iteration in 1..=cfg.max_iterations {
            // ion branch, with the previous electron estimate removed
            let (ion_v, ion_i): (Vec<f64>, Vec<f64>) = points
                .iter()
                .filter(|(v, _)| *v < v_f - cfg.ion_margin_te * te)
                .map(|&(v, i)| {
                    let i_e = electron.map_or(0.0, |e| e.eval(v).exp());
                    (v, i - i_e)
                })
                .unzip();
            if ion_v.len() < cfg.min_points {
                return Err(FitError::InsufficientPoints {
                    region: "ion saturation",
                    found: ion_v.len(),
                    required: cfg.min_points,
                });
            }
            let ion = fit_line(&ion_v, &ion_i)
                .ok_or_else(|| FitError::NonPhysical("degenerate ion branch voltages".into()))?;
            let (ret_v, ret_ln): (Vec<f64>, Vec<f64>) = points
                .iter()
                .filter(|(v, _)| *v >= v_f && *v <= v_f + cfg.electron_window_te * te)
                .filter_map(|&(v, i)| {
                    let i_e = i - ion.eval(v);
                    (i_e > 0.0).then(|| (v, i_e.ln()))
                })
                .unzip();
            if ret_v.len() < cfg.min_points {
                return Err(FitError::InsufficientPoints {
                    region: "electron retardation",
                    found: ret_v.len(),
                    required: cfg.min_points,
                });
            }
            let exp_fit = fit_line(&ret_v, &ret_ln).ok_or_else(|| {
                FitError::NonPhysical("degenerate retardation branch voltages".into())
            })?;
            if exp_fit.slope <= 0.0 || !exp_fit.slope.is_finite() {
                return Err(FitError::NonPhysical(format!(
                    "retardation slope {:.4e} 1/V is not positive",
                    exp_fit.slope
                )));
            }
            let new_te = 1.0 / exp_fit.slope;
            log::debug!(
                "iteration {iteration}: Te {new_te:.5} eV, ion pts {}, exp pts {}",
                ion.points,
                exp_fit.points
            );
            let converged = ((new_te - te) / new_te).abs() < cfg.tolerance;
            te = new_te;
            electron = Some(exp_fit);
            if converged {
                return self.finish(v_f, te, ion, exp_fit, iteration);
            }
        }
        Err(FitError::NotConverged {
            iterations: cfg.max_iterations,
            last_te: te,
        })
    }
    fn finish(
        &self,
        v_f: f64,
        te: f64,
        ion: LineFit,
        exp_fit: LineFit,
        iterations: usize,
    ) -> Result<FitResult, FitError> {
        if exp_fit.r_squared < self.fit.min_r_squared {
            return Err(FitError::PoorFit {
                r_squared: exp_fit.r_squared,
                min: self.fit.min_r_squared,
            });
        }
        let i_isat = -ion.eval(v_f);
        if i_isat <= 0.0 {
            return Err(FitError::NonPhysical(format!(
                "ion saturation current {i_isat:.4e} A is not positive"
            )));
        }
        let density = bohm_density(i_isat, te, &self.probe);
        let v_p = v_f + floating_offset(te, self.probe.ion_mass_amu);
        let result = FitResult {
            electron_temperature_ev: te,
            density_m3: density,
            floating_potential_v: v_f,
            plasma_potential_v: v_p,
            ion_saturation_current_a: i_isat,
            electron_saturation_current_a: exp_fit.eval(v_p).exp(),
            ion_fit: ion,
            electron_fit: exp_fit,
            iterations,
        };
        log::info!(
            "fit converged in {iterations} iterations: Te {:.3} eV, n {:.3e} m^-3",
            te,
            density
        );
        Ok(result)
    }
}
