use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use crate::analysis::segment::Segment;
use crate::analysis::{LpError, LpResult};
/// Voltage/current pairs of one characteristic, with the mean sample times.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IvCurve {
    pub time: Vec<f64>,
    pub voltage: Vec<f64>,
    pub current: Vec<f64>,
    /// Number of sweeps averaged into this curve.
    pub sweeps: usize,
}
impl IvCurve {
    pub fn len(&self) -> usize {
        self.voltage.len()
    }
    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }
    /// Recorded volts to probe volts and amperes.
    pub fn scaled(mut self, voltage_gain: f64, current_gain: f64) -> Self {
        self.voltage.iter_mut().for_each(|v| *v *= voltage_gain);
        self.current.iter_mut().for_each(|i| *i *= current_gain);
        self
    }
}
fn mean_truncated(traces: &[ArrayView1<'_, f64>], len: usize) -> Vec<f64> {
    let mut acc = Array1::<f64>::zeros(len);
    for trace in traces {
        acc += &trace.slice(s![..len]);
    }
    (acc / traces.len() as f64).to_vec()
}
/// Average segments sample by sample after cutting each to the shortest one.
pub fn average_segments<'a>(segments: impl IntoIterator<Item = Segment<'a>>) -> LpResult<IvCurve> {
    let segments: Vec<Segment<'a>> = segments.into_iter().collect();
    if segments.is_empty() || segments.iter().any(Segment::is_empty) {
        return Err(LpError::DegenerateSweep);
    }
    let len = segments.iter().map(Segment::len).min().unwrap_or(0);
    let times: Vec<ArrayView1<'_, f64>> = segments.iter().map(|seg| seg.time).collect();
    let voltages: Vec<ArrayView1<'_, f64>> = segments.iter().map(|seg| seg.voltage).collect();
    let currents: Vec<ArrayView1<'_, f64>> = segments.iter().map(|seg| seg.current).collect();
    Ok(IvCurve {
        time: mean_truncated(&times, len),
        voltage: mean_truncated(&voltages, len),
        current: mean_truncated(&currents, len),
        sweeps: segments.len(),
    })
}
/// Samples inside `window_seconds` before any of the `peaks`.
pub fn selection_mask(time: ArrayView1<'_, f64>, peaks: &[usize], window_seconds: f64) -> Vec<bool> {
    let mut mask = vec![false; time.len()];
    for &peak in peaks {
        let t_peak = time[peak];
        let start = t_peak - window_seconds;
        for (k, &t) in time.iter().enumerate().take(peak + 1) {
            if t >= start && t <= t_peak {
                mask[k] = true;
            }
        }
    }
    mask
}
/// Average the selection windows ending at each peak, aligned on their first
/// selected sample.
pub fn average_masked(
    time: ArrayView1<'_, f64>,
    voltage: ArrayView1<'_, f64>,
    current: ArrayView1<'_, f64>,
    peaks: &[usize],
    window_seconds: f64,
) -> LpResult<IvCurve> {
    let windows: Vec<(usize, usize)> = peaks
        .iter()
        .map(|&peak| {
            let start_time = time[peak] - window_seconds;
            let first = time
                .iter()
                .position(|&t| t >= start_time)
                .unwrap_or(peak);
            (first, peak + 1)
        })
        .collect();
    let len = windows
        .iter()
        .map(|(a, b)| b - a)
        .min()
        .ok_or(LpError::DegenerateSweep)?;
    if len == 0 {
        return Err(LpError::DegenerateSweep);
    }
    let cut = |x: ArrayView1<'_, f64>| -> Vec<f64> {
        let views: Vec<ArrayView1<'_, f64>> = windows
            .iter()
            .map(|&(a, b)| x.slice_move(s![a..b]))
            .collect();
        mean_truncated(&views, len)
    };
    Ok(IvCurve {
        time: cut(time),
        voltage: cut(voltage),
        current: cut(current),
        sweeps: windows.len(),
    })
}
