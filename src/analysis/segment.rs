use ndarray::{s, ArrayView1};
use crate::analysis::peaks::find_peaks;
use crate::analysis::recording::Recording;
use crate::analysis::spectrum::{dominant_frequency, turning_point_distance};
use crate::config::{SegmentConfig, SegmentMode};
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurningKind {
    Maximum,
    Minimum,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurningPoint {
    pub index: usize,
    pub kind: TurningKind,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampDirection {
    Rising,
    Falling,
}
/// One voltage ramp (or full period) borrowed from a recording.
#[derive(Clone, Debug)]
pub struct Segment<'a> {
    pub index: usize,
    /// First sample, inclusive.
    pub start: usize,
    /// Last sample, exclusive.
    pub end: usize,
    pub direction: RampDirection,
    pub time: ArrayView1<'a, f64>,
    pub voltage: ArrayView1<'a, f64>,
    pub current: ArrayView1<'a, f64>,
}
impl Segment<'_> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}
/// Splits a recording at the turning points of its voltage trace.
#[derive(Clone, Debug)]
pub struct Segmenter {
    pub mode: SegmentMode,
    /// Minimum excursion of a turning point from the mean voltage. This is
    /// relative to the mean, not an absolute level on `+V` / `-V`.
    pub height: f64,
    /// Minimum spacing between turning points of the same kind, in samples.
    pub distance: usize,
    pub trim_start: f64,
    pub trim_end: f64,
}
impl Segmenter {
    pub fn new(mode: SegmentMode, height: f64, distance: usize) -> Self {
        Self {
            mode,
            height,
            distance,
            trim_start: 0.0,
            trim_end: 0.0,
        }
    }
    pub fn with_trim(mut self, start: f64, end: f64) -> Self {
        self.trim_start = start;
        self.trim_end = end;
        self
    }
    /// Build from config, deriving the turning-point distance from the
    /// dominant sweep frequency when none is configured.
    pub fn from_config(cfg: &SegmentConfig, voltage: ArrayView1<'_, f64>, sample_rate_hz: f64) -> Self {
        let distance = cfg.distance.unwrap_or_else(|| {
            match dominant_frequency(voltage, sample_rate_hz) {
                Some(sweep_hz) => {
                    let d = turning_point_distance(sweep_hz, sample_rate_hz);
                    log::info!("sweep frequency {sweep_hz:.3} Hz -> turning point distance {d}");
                    d
                }
                None => {
                    log::warn!("could not estimate sweep frequency; turning point distance = 1");
                    1
                }
            }
        });
        Self::new(cfg.mode, cfg.height, distance).with_trim(cfg.trim_start, cfg.trim_end)
    }
    /// Voltage maxima and minima merged in time order.
    pub fn turning_points(&self, voltage: ArrayView1<'_, f64>) -> Vec<TurningPoint> {
        if voltage.is_empty() {
            return Vec::new();
        }
        let mean = voltage.sum() / voltage.len() as f64;
        let above = voltage.mapv(|v| v - mean);
        let below = voltage.mapv(|v| mean - v);
        let mut points: Vec<TurningPoint> = find_peaks(above.view(), Some(self.height), self.distance)
            .into_iter()
            .map(|index| TurningPoint {
                index,
                kind: TurningKind::Maximum,
            })
            .chain(
                find_peaks(below.view(), Some(self.height), self.distance)
                    .into_iter()
                    .map(|index| TurningPoint {
                        index,
                        kind: TurningKind::Minimum,
                    }),
            )
            .collect();
        points.sort_by_key(|p| p.index);
        points
    }
    /// Half-open sample ranges of every segment, after trimming.
    pub fn boundaries(&self, voltage: ArrayView1<'_, f64>) -> Vec<(usize, usize)> {
        let points = self.turning_points(voltage);
        let edges: Vec<usize> = match self.mode {
            SegmentMode::Ramp => {
                if points.is_empty() {
                    return Vec::new();
                }
                std::iter::once(0)
                    .chain(points.iter().map(|p| p.index))
                    .chain(std::iter::once(voltage.len()))
                    .collect()
            }
            SegmentMode::Period | SegmentMode::Window => points
                .iter()
                .filter(|p| p.kind == TurningKind::Minimum)
                .map(|p| p.index)
                .collect(),
        };
        edges
            .windows(2)
            .filter_map(|w| self.trimmed(w[0], w[1]))
            .collect()
    }
    fn trimmed(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let len = (end - start) as f64;
        let s = start + (len * self.trim_start).floor() as usize;
        let e = start + (len * (1.0 - self.trim_end)).floor() as usize;
        (e > s + 1).then_some((s, e))
    }
    /// Lazily yields the segments of `recording`. Call again to restart.
    pub fn segments<'a>(&self, recording: &'a Recording) -> Segments<'a> {
        let bounds = self.boundaries(recording.voltage());
        log::debug!("{} segments found ({:?} mode)", bounds.len(), self.mode);
        Segments {
            recording,
            bounds,
            next: 0,
        }
    }
}
/// Iterator over the segments of one recording, in time order.
#[derive(Clone, Debug)]
pub struct Segments<'a> {
    recording: &'a Recording,
    bounds: Vec<(usize, usize)>,
    next: usize,
}
impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;
    fn next(&mut self) -> Option<Segment<'a>> {
        let &(start, end) = self.bounds.get(self.next)?;
        let index = self.next;
        self.next += 1;
        let rec = self.recording;
        let voltage = rec.voltage().slice_move(s![start..end]);
        let direction = if voltage[voltage.len() - 1] >= voltage[0] {
            RampDirection::Rising
        } else {
            RampDirection::Falling
        };
        Some(Segment {
            index,
            start,
            end,
            direction,
            time: rec.time().slice_move(s![start..end]),
            voltage,
            current: rec.current().slice_move(s![start..end]),
        })
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.bounds.len() - self.next;
        (left, Some(left))
    }
}
impl ExactSizeIterator for Segments<'_> {}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::recording::Metadata;
    use ndarray::Array1;
    /// `ramps` alternating rising/falling ramps of `per_ramp` samples between -1 and 1.
    fn triangle(ramps: usize, per_ramp: usize) -> Recording {
        let p = per_ramp as f64;
        let voltage = Array1::from_shape_fn(ramps * per_ramp, |i| {
            let phase = (i % (2 * per_ramp)) as f64;
            if phase < p {
                -1.0 + 2.0 * phase / p
            } else {
                3.0 - 2.0 * phase / p
            }
        });
        let current = voltage.mapv(|v| 0.01 * v);
        Recording::from_uniform(1000.0, voltage, current, Metadata::default()).unwrap()
    }
    #[test]
    fn n_ramps_give_n_segments_in_order() {
        for ramps in [2, 3, 6, 9] {
            let rec = triangle(ramps, 100);
            let segmenter = Segmenter::new(SegmentMode::Ramp, 0.5, 50);
            let segments: Vec<_> = segmenter.segments(&rec).collect();
            assert_eq!(segments.len(), ramps);
            for (k, seg) in segments.iter().enumerate() {
                assert_eq!(seg.index, k);
                assert_eq!(seg.start, k * 100);
                assert_eq!(seg.len(), 100);
                let expected = if k % 2 == 0 {
                    RampDirection::Rising
                } else {
                    RampDirection::Falling
                };
                assert_eq!(seg.direction, expected);
            }
            assert!(segments.windows(2).all(|w| w[0].time[0] < w[1].time[0]));
        }
    }
    #[test]
    fn period_mode_splits_on_minima() {
        let rec = triangle(8, 100);
        let segmenter = Segmenter::new(SegmentMode::Period, 0.5, 50);
        let bounds = segmenter.boundaries(rec.voltage());
        // minima at 200, 400, 600
        assert_eq!(bounds, vec![(200, 400), (400, 600)]);
    }
    #[test]
    fn height_is_measured_from_the_mean() {
        let rec = triangle(6, 100);
        let biased = rec
            .with_signals(rec.voltage().mapv(|v| v + 5.0), rec.current().to_owned())
            .unwrap();
        let segmenter = Segmenter::new(SegmentMode::Ramp, 0.5, 50);
        let plain: Vec<usize> = segmenter.turning_points(rec.voltage()).iter().map(|p| p.index).collect();
        let shifted: Vec<usize> = segmenter
            .turning_points(biased.voltage())
            .iter()
            .map(|p| p.index)
            .collect();
        assert_eq!(plain, vec![100, 200, 300, 400, 500]);
        assert_eq!(plain, shifted);
        // the biased maxima sit near +6 V but only about 1 V above the mean
        let strict = Segmenter::new(SegmentMode::Ramp, 1.5, 50);
        assert!(strict.turning_points(biased.voltage()).is_empty());
    }
    #[test]
    fn trimming_shrinks_each_segment() {
        let rec = triangle(4, 100);
        let segmenter = Segmenter::new(SegmentMode::Ramp, 0.5, 50).with_trim(0.1, 0.2);
        let bounds = segmenter.boundaries(rec.voltage());
        assert_eq!(bounds[0], (10, 80));
        assert_eq!(bounds[1], (110, 180));
    }
    #[test]
    fn monotonic_recording_has_no_segments() {
        let voltage = Array1::linspace(-1.0, 1.0, 500);
        let current = voltage.clone();
        let rec = Recording::from_uniform(1000.0, voltage, current, Metadata::default()).unwrap();
        let segmenter = Segmenter::new(SegmentMode::Ramp, 0.1, 10);
        assert_eq!(segmenter.segments(&rec).count(), 0);
    }
    #[test]
    fn segments_are_restartable() {
        let rec = triangle(5, 40);
        let segmenter = Segmenter::new(SegmentMode::Ramp, 0.5, 20);
        let first = segmenter.segments(&rec);
        assert_eq!(first.len(), 5);
        let cloned = first.clone();
        let a: Vec<usize> = first.map(|s| s.start).collect();
        let b: Vec<usize> = cloned.map(|s| s.start).collect();
        let c: Vec<usize> = segmenter.segments(&rec).map(|s| s.start).collect();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }
    #[test]
    fn distance_derived_from_sweep_frequency() {
        let rec = triangle(10, 100);
        let mut cfg = SegmentConfig::default();
        cfg.distance = None;
        cfg.mode = SegmentMode::Ramp;
        cfg.height = 0.5;
        let segmenter = Segmenter::from_config(&cfg, rec.voltage(), 1000.0);
        // sweep period 200 samples -> 5 Hz at 1 kHz
        assert_eq!(segmenter.distance, 80);
        assert_eq!(segmenter.segments(&rec).count(), 10);
    }
}
