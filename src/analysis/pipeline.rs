use serde::Serialize;
use crate::analysis::average::{average_masked, average_segments, selection_mask};
use crate::analysis::filter::LowpassFilter;
use crate::analysis::segment::{RampDirection, Segment, Segmenter, TurningKind};
use crate::analysis::{FitError, FitResult, IvCurve, LangmuirFitter, LpError, LpResult, Recording};
use crate::config::{AnalysisConfig, SegmentMode};
/// Filtered traces and sweep landmarks, still in recorded units.
#[derive(Clone, Debug)]
pub struct ProcessedSweep {
    pub raw: Recording,
    pub filtered: Recording,
    pub sample_rate_hz: f64,
    pub segmenter: Segmenter,
    /// Voltage minima closing a selection window, first minimum and
    /// incomplete windows left out.
    pub peaks: Vec<usize>,
    pub mask: Vec<bool>,
}
/// Everything one analysis run produced.
#[derive(Clone, Debug)]
pub struct SweepAnalysis {
    pub processed: ProcessedSweep,
    pub segment_count: usize,
    /// Averaged characteristic in volts and amperes.
    pub curve: IvCurve,
    pub fit: Result<FitResult, FitError>,
}
/// JSON report of an analysis run.
#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    pub samples: usize,
    pub sample_rate_hz: f64,
    pub mode: SegmentMode,
    pub segments: usize,
    pub sweeps_averaged: usize,
    pub curve_points: usize,
    pub fit: Option<&'a FitResult>,
    pub error: Option<String>,
}
impl SweepAnalysis {
    pub fn fit_result(&self) -> LpResult<&FitResult> {
        self.fit.as_ref().map_err(|e| LpError::Fit(e.clone()))
    }
    pub fn report(&self, mode: SegmentMode) -> AnalysisReport<'_> {
        AnalysisReport {
            samples: self.processed.raw.len(),
            sample_rate_hz: self.processed.sample_rate_hz,
            mode,
            segments: self.segment_count,
            sweeps_averaged: self.curve.sweeps,
            curve_points: self.curve.len(),
            fit: self.fit.as_ref().ok(),
            error: self.fit.as_ref().err().map(|e| e.to_string()),
        }
    }
}
/// Scale, filter, segment, average and fit one recording.
#[derive(Clone, Debug)]
pub struct SweepPipeline {
    config: AnalysisConfig,
    fitter: LangmuirFitter,
}
impl SweepPipeline {
    pub fn new(config: AnalysisConfig) -> LpResult<Self> {
        config.validate()?;
        let fitter = LangmuirFitter::new(config.probe.clone(), config.fit.clone());
        Ok(Self { config, fitter })
    }
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }
    fn sample_rate(&self, recording: &Recording) -> f64 {
        let configured = self.config.acquisition.sample_rate_hz;
        match recording.sample_rate_hz() {
            Some(measured) => {
                if ((measured - configured) / configured).abs() > 0.01 {
                    log::warn!(
                        "time axis implies {measured:.3} Hz, configured {configured:.3} Hz; using the time axis"
                    );
                }
                measured
            }
            None => configured,
        }
    }
    /// Filter the traces and locate turning points and selection windows.
    pub fn process(&self, recording: &Recording) -> LpResult<ProcessedSweep> {
        if recording.len() < 2 {
            return Err(LpError::DegenerateSweep);
        }
        let fs = self.sample_rate(recording);
        let filter_cfg = &self.config.filter;
        let filtered = if filter_cfg.enabled {
            let filter = LowpassFilter::butterworth(filter_cfg.order, filter_cfg.cutoff_hz, fs)?;
            log::info!(
                "low-pass filtering {} samples at {} Hz (order {})",
                recording.len(),
                filter_cfg.cutoff_hz,
                filter.order()
            );
            recording.with_signals(
                filter.filtfilt(recording.voltage()),
                filter.filtfilt(recording.current()),
            )?
        } else {
            recording.clone()
        };
        let seg_cfg = &self.config.segment;
        let segmenter = Segmenter::from_config(seg_cfg, filtered.voltage(), fs);
        let turning_points = segmenter.turning_points(filtered.voltage());
        let time = filtered.time();
        let t0 = time[0];
        let peaks: Vec<usize> = turning_points
            .iter()
            .filter(|p| p.kind == TurningKind::Minimum)
            .skip(1)
            .map(|p| p.index)
            .filter(|&idx| time[idx] - seg_cfg.window_seconds >= t0)
            .collect();
        let mask = selection_mask(time, &peaks, seg_cfg.window_seconds);
        log::info!(
            "{} turning points, {} selection windows of {} s",
            turning_points.len(),
            peaks.len(),
            seg_cfg.window_seconds
        );
        Ok(ProcessedSweep {
            raw: recording.clone(),
            filtered,
            sample_rate_hz: fs,
            segmenter,
            peaks,
            mask,
        })
    }
    /// Fit every segment on its own instead of their average.
    pub fn fit_each_segment(
        &self,
        processed: &ProcessedSweep,
    ) -> Vec<(usize, Result<FitResult, FitError>)> {
        let scaling = &self.config.scaling;
        let physical = processed.filtered.scaled(
            scaling.voltage_multiplier,
            scaling.current_multiplier * scaling.current_sign,
        );
        processed
            .segmenter
            .segments(&physical)
            .map(|seg| {
                let fit = self.fitter.fit(&seg.voltage.to_vec(), &seg.current.to_vec());
                (seg.index, fit)
            })
            .collect()
    }
    pub fn run(&self, recording: &Recording) -> LpResult<SweepAnalysis> {
        let processed = self.process(recording)?;
        let filtered = &processed.filtered;
        let segments = processed.segmenter.segments(filtered);
        let segment_count = segments.len();
        log::info!("{segment_count} segments in {:?} mode", self.config.segment.mode);
        let averaged = match self.config.segment.mode {
            SegmentMode::Period => average_segments(segments)?,
            SegmentMode::Ramp => average_segments(interior_rising(segments.collect(), filtered.len()))?,
            SegmentMode::Window => average_masked(
                filtered.time(),
                filtered.voltage(),
                filtered.current(),
                &processed.peaks,
                self.config.segment.window_seconds,
            )?,
        };
        let scaling = &self.config.scaling;
        let curve = averaged.scaled(
            scaling.voltage_multiplier,
            scaling.current_multiplier * scaling.current_sign,
        );
        log::info!("averaged {} sweeps into {} points", curve.sweeps, curve.len());
        let fit = self.fitter.fit_curve(&curve);
        if let Err(err) = &fit {
            log::warn!("fit rejected: {err}");
        }
        Ok(SweepAnalysis {
            processed,
            segment_count,
            curve,
            fit,
        })
    }
}
/// Rising ramps bounded by turning points on both sides. Ramps that run into
/// the ends of the record are partial and only used when nothing else is left.
fn interior_rising(segments: Vec<Segment<'_>>, len: usize) -> Vec<Segment<'_>> {
    let rising: Vec<Segment<'_>> = segments
        .into_iter()
        .filter(|seg| seg.direction == RampDirection::Rising)
        .collect();
    let interior: Vec<Segment<'_>> = rising
        .iter()
        .filter(|seg| seg.start > 0 && seg.end < len)
        .cloned()
        .collect();
    if interior.is_empty() {
        rising
    } else {
        interior
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::recording::Metadata;
    use crate::analysis::synth::{IvModel, SweepSynth};
    use crate::config::ScalingConfig;
    use ndarray::Array1;
    fn test_config(mode: SegmentMode) -> AnalysisConfig {
        let mut cfg = AnalysisConfig::default();
        cfg.acquisition.sample_rate_hz = 2.0e4;
        cfg.filter.cutoff_hz = 1.0e3;
        cfg.segment.mode = mode;
        cfg.segment.distance = Some(1000);
        cfg.segment.window_seconds = 0.08;
        cfg
    }
    /// Four 5 Hz sweeps from -200 V to 50 V sampled at 20 kHz.
    fn synthetic(model: &IvModel) -> Recording {
        let mut synth = SweepSynth::new(model.clone());
        synth.sample_rate_hz = 2.0e4;
        synth.sweep_hz = 5.0;
        synth.periods = 4;
        synth.generate(&ScalingConfig::default()).unwrap()
    }
    fn assert_recovers(analysis: &SweepAnalysis, model: &IvModel) {
        let fit = analysis.fit_result().unwrap();
        let te_err = (fit.electron_temperature_ev / model.electron_temperature_ev - 1.0).abs();
        let n_err = (fit.density_m3 / model.density_m3 - 1.0).abs();
        assert!(te_err < 0.03, "Te {}", fit.electron_temperature_ev);
        assert!(n_err < 0.05, "n {:e}", fit.density_m3);
    }
    #[test]
    fn period_mode_recovers_plasma() {
        let model = IvModel::argon(3.0, 1.0e16, 10.0);
        let pipeline = SweepPipeline::new(test_config(SegmentMode::Period)).unwrap();
        let analysis = pipeline.run(&synthetic(&model)).unwrap();
        // minima at 0.15, 0.35, 0.55 and 0.75 s
        assert_eq!(analysis.segment_count, 3);
        assert_eq!(analysis.curve.sweeps, 3);
        assert!((analysis.processed.sample_rate_hz - 2.0e4).abs() < 1e-6);
        assert_recovers(&analysis, &model);
    }
    #[test]
    fn window_mode_averages_falling_ramps_before_minima() {
        let model = IvModel::argon(4.0, 5.0e15, 5.0);
        let pipeline = SweepPipeline::new(test_config(SegmentMode::Window)).unwrap();
        let analysis = pipeline.run(&synthetic(&model)).unwrap();
        // minima at 3000, 7000, 11000 and 15000; the first one is skipped
        assert_eq!(analysis.processed.peaks, vec![7000, 11000, 15000]);
        assert_eq!(analysis.curve.sweeps, 3);
        // 0.08 s at 20 kHz, give or take the rounding of the window start
        assert!((1600..=1601).contains(&analysis.curve.len()));
        assert!(analysis.processed.mask[6000]);
        assert!(!analysis.processed.mask[5000]);
        assert!(!analysis.processed.mask[7500]);
        // the window ends on the falling ramp's minimum
        let v = &analysis.curve.voltage;
        assert!(v[0] > v[v.len() - 1]);
        assert_recovers(&analysis, &model);
    }
    #[test]
    fn window_mode_skips_first_minimum_even_with_room() {
        let pipeline = SweepPipeline::new(test_config(SegmentMode::Window)).unwrap();
        let mut synth = SweepSynth::new(IvModel::argon(3.0, 1.0e16, 10.0));
        synth.sample_rate_hz = 2.0e4;
        synth.sweep_hz = 5.0;
        synth.periods = 4;
        let rec = synth.generate(&ScalingConfig::default()).unwrap();
        let processed = pipeline.process(&rec).unwrap();
        // 3000 samples precede the first minimum, enough for a 1600 sample window
        let minima: Vec<usize> = processed
            .segmenter
            .turning_points(processed.filtered.voltage())
            .into_iter()
            .filter(|p| p.kind == TurningKind::Minimum)
            .map(|p| p.index)
            .collect();
        assert_eq!(minima[0], 3000);
        assert!(!processed.peaks.contains(&3000));
        assert!(!processed.mask[2500]);
    }
    #[test]
    fn ramp_mode_averages_interior_rising_ramps() {
        let model = IvModel::argon(3.0, 1.0e16, 10.0);
        let pipeline = SweepPipeline::new(test_config(SegmentMode::Ramp)).unwrap();
        let analysis = pipeline.run(&synthetic(&model)).unwrap();
        let points = analysis
            .processed
            .segmenter
            .turning_points(analysis.processed.filtered.voltage());
        assert_eq!(points.len(), 8);
        assert_eq!(analysis.segment_count, 9);
        assert_eq!(analysis.curve.sweeps, 3);
        assert_recovers(&analysis, &model);
        let report = analysis.report(SegmentMode::Ramp);
        assert!(report.fit.is_some());
        assert!(report.error.is_none());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"mode\":\"ramp\""));
    }
    #[test]
    fn each_period_fits_alone() {
        let model = IvModel::argon(3.0, 1.0e16, 10.0);
        let pipeline = SweepPipeline::new(test_config(SegmentMode::Period)).unwrap();
        let processed = pipeline.process(&synthetic(&model)).unwrap();
        let fits = pipeline.fit_each_segment(&processed);
        assert_eq!(fits.len(), 3);
        for (idx, (k, fit)) in fits.iter().enumerate() {
            assert_eq!(*k, idx);
            let te = fit.as_ref().unwrap().electron_temperature_ev;
            assert!((te / 3.0 - 1.0).abs() < 0.03, "segment {k}: Te {te}");
        }
    }
    #[test]
    fn flat_recording_is_degenerate() {
        let rec = Recording::from_uniform(
            2.0e4,
            Array1::from_elem(4000, -0.05),
            Array1::zeros(4000),
            Metadata::default(),
        )
        .unwrap();
        let pipeline = SweepPipeline::new(test_config(SegmentMode::Period)).unwrap();
        assert!(matches!(pipeline.run(&rec), Err(LpError::DegenerateSweep)));
    }
    #[test]
    fn fit_failure_is_kept_in_analysis() {
        let model = IvModel::argon(3.0, 1.0e16, 10.0);
        let mut cfg = test_config(SegmentMode::Period);
        cfg.fit.min_points = 100_000;
        let analysis = SweepPipeline::new(cfg).unwrap().run(&synthetic(&model)).unwrap();
        assert!(matches!(analysis.fit, Err(FitError::InsufficientPoints { .. })));
        assert!(matches!(analysis.fit_result(), Err(LpError::Fit(_))));
        assert!(analysis.report(SegmentMode::Period).error.is_some());
    }
}
