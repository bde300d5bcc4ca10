use std::io::Cursor;
use std::ops::Range;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use crate::analysis::average::IvCurve;
use crate::analysis::fit::FitResult;
use crate::analysis::pipeline::ProcessedSweep;
use crate::analysis::{LpError, LpResult};
/// Samples of the fitted model drawn over the I-V curve.
pub const FIT_POINTS: usize = 400;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
    /// Captions, axis labels and legend. Needs a system sans-serif font.
    pub annotate: bool,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            background: RGBColor(46, 46, 46),
            palette: vec![
                RGBColor(117, 188, 255),
                RED,
                RGBColor(255, 165, 0),
                YELLOW,
                WHITE,
                GREEN,
            ],
            annotate: true,
        }
    }
}
impl PlotStyle {
    /// Portrait layout for I-V characteristics.
    pub fn portrait() -> Self {
        Self {
            width: 600,
            height: 900,
            ..Self::default()
        }
    }
    fn color(&self, idx: usize) -> RGBColor {
        if self.palette.is_empty() {
            WHITE
        } else {
            self.palette[idx % self.palette.len()]
        }
    }
}
/// Padded range covering the finite values.
fn span(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return -1.0..1.0;
    }
    if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
        return lo - 1.0..hi + 1.0;
    }
    let pad = 0.05 * (hi - lo);
    lo - pad..hi + pad
}
fn check_range(lo: f64, hi: f64) -> LpResult<Range<f64>> {
    if lo.is_finite() && hi.is_finite() && hi > lo {
        Ok(lo..hi)
    } else {
        Err(LpError::Plot(format!("invalid axis range {lo}..{hi}")))
    }
}
/// Consecutive runs of `indices` whose mask entry is set.
fn mask_runs(mask: &[bool], indices: &[usize]) -> Vec<Vec<usize>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for &k in indices {
        if mask.get(k).copied().unwrap_or(false) {
            current.push(k);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}
/// Raw voltage, negated raw and filtered current, the voltage minima closing
/// each selection window and the selected voltage against time, in recorded
/// units.
pub fn render_raw_png(
    sweep: &ProcessedSweep,
    style: &PlotStyle,
    xlim: Option<(f64, f64)>,
) -> LpResult<Vec<u8>> {
    let raw = &sweep.raw;
    if raw.is_empty() {
        return Err(LpError::Plot("recording has no samples".into()));
    }
    let time = raw.time();
    let (t_lo, t_hi) = xlim.unwrap_or((time[0], time[time.len() - 1]));
    let x_range = check_range(t_lo, t_hi)?;
    let visible: Vec<usize> = (0..raw.len())
        .filter(|&k| x_range.contains(&time[k]) || time[k] == t_hi)
        .collect();
    if visible.is_empty() {
        return Err(LpError::Plot(format!("no samples between {t_lo} s and {t_hi} s")));
    }
    let step = (visible.len() / (2 * style.width as usize)).max(1);
    let picked: Vec<usize> = visible.iter().copied().step_by(step).collect();
    let voltage = raw.voltage();
    let current = raw.current();
    let filtered_v = sweep.filtered.voltage();
    let filtered_i = sweep.filtered.current();
    let y_range = span(
        picked
            .iter()
            .flat_map(|&k| [voltage[k], -current[k], -filtered_i[k]]),
    );
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if style.annotate {
            builder
                .caption("Probe signals", ("sans-serif", 20).into_font().color(&WHITE))
                .set_label_area_size(LabelAreaPosition::Left, 55)
                .set_label_area_size(LabelAreaPosition::Bottom, 40);
        }
        let mut chart = builder.build_cartesian_2d(x_range.clone(), y_range.clone())?;
        if style.annotate {
            chart
                .configure_mesh()
                .x_desc("Time (s)")
                .y_desc("Signal (V)")
                .label_style(("sans-serif", 12).into_font().color(&WHITE))
                .axis_desc_style(("sans-serif", 14).into_font().color(&WHITE))
                .light_line_style(&WHITE.mix(0.1))
                .draw()?;
        }
        // currents are drawn negated, as recorded across the shunt
        let traces = [
            ("Voltage", voltage, 1.0),
            ("Current", current, -1.0),
            ("Filtered current", filtered_i, -1.0),
        ];
        for (idx, (label, trace, sign)) in traces.into_iter().enumerate() {
            let color = style.color(idx);
            chart
                .draw_series(LineSeries::new(
                    picked.iter().map(|&k| (time[k], sign * trace[k])),
                    &color,
                ))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        let peaks: Vec<usize> = sweep
            .peaks
            .iter()
            .copied()
            .filter(|&k| x_range.contains(&time[k]))
            .collect();
        let marker = style.color(3);
        for &k in &peaks {
            chart.draw_series(LineSeries::new(
                [(time[k], y_range.start), (time[k], y_range.end)],
                &WHITE.mix(0.3),
            ))?;
        }
        chart
            .draw_series(
                peaks
                    .iter()
                    .map(|&k| Cross::new((time[k], voltage[k]), 5, &marker)),
            )?
            .label("Peaks")
            .legend(move |(x, y)| Cross::new((x + 10, y), 4, &marker));
        let select = style.color(4);
        for (n, run) in mask_runs(&sweep.mask, &picked).iter().enumerate() {
            let anno = chart.draw_series(LineSeries::new(
                run.iter().map(|&k| (time[k], filtered_v[k])),
                select.stroke_width(2),
            ))?;
            if n == 0 {
                anno.label("Voltage select").legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], select.stroke_width(2))
                });
            }
        }
        if style.annotate {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .label_font(("sans-serif", 12).into_font().color(&WHITE))
                .border_style(&WHITE.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
/// I-V characteristic in volts and milliamperes with the fitted model and
/// the floating and plasma potentials marked.
pub fn render_iv_png(
    curve: &IvCurve,
    fit: Option<&FitResult>,
    style: &PlotStyle,
    xlim: Option<(f64, f64)>,
) -> LpResult<Vec<u8>> {
    if curve.is_empty() {
        return Err(LpError::Plot("I-V curve has no points".into()));
    }
    let points: Vec<(f64, f64)> = curve
        .voltage
        .iter()
        .zip(&curve.current)
        .map(|(&v, &i)| (v, i * 1.0e3))
        .collect();
    let x_range = match xlim {
        Some((lo, hi)) => check_range(lo, hi)?,
        None => span(points.iter().map(|p| p.0)),
    };
    let y_range = span(
        points
            .iter()
            .filter(|p| x_range.contains(&p.0))
            .map(|p| p.1)
            .chain(std::iter::once(0.0)),
    );
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if style.annotate {
            builder
                .caption("I-V characteristic", ("sans-serif", 20).into_font().color(&WHITE))
                .set_label_area_size(LabelAreaPosition::Left, 55)
                .set_label_area_size(LabelAreaPosition::Bottom, 40);
        }
        let mut chart = builder.build_cartesian_2d(x_range.clone(), y_range.clone())?;
        if style.annotate {
            chart
                .configure_mesh()
                .x_desc("Voltage (V)")
                .y_desc("Current (mA)")
                .label_style(("sans-serif", 12).into_font().color(&WHITE))
                .axis_desc_style(("sans-serif", 14).into_font().color(&WHITE))
                .light_line_style(&WHITE.mix(0.1))
                .draw()?;
        }
        let axis = WHITE.mix(0.4);
        chart.draw_series(LineSeries::new(
            [(x_range.start, 0.0), (x_range.end, 0.0)],
            &axis,
        ))?;
        if x_range.contains(&0.0) {
            chart.draw_series(LineSeries::new(
                [(0.0, y_range.start), (0.0, y_range.end)],
                &axis,
            ))?;
        }
        let data_color = style.color(0);
        chart
            .draw_series(LineSeries::new(points.iter().copied(), &data_color))?
            .label(format!("Average of {} sweeps", curve.sweeps))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &data_color));
        if let Some(fit) = fit {
            let model_color = style.color(1);
            let model = fit.model_curve(x_range.start, x_range.end, FIT_POINTS);
            if !model.is_empty() {
                chart
                    .draw_series(LineSeries::new(
                        model.into_iter().map(|(v, i)| (v, i * 1.0e3)),
                        model_color.stroke_width(2),
                    ))?
                    .label(format!("Fit, Te = {:.2} eV", fit.electron_temperature_ev))
                    .legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], model_color.stroke_width(2))
                    });
            }
            let markers = [
                ("V_f", fit.floating_potential_v, style.color(2)),
                ("V_p", fit.plasma_potential_v, style.color(3)),
            ];
            for (label, v, color) in markers {
                if !x_range.contains(&v) {
                    continue;
                }
                chart
                    .draw_series(LineSeries::new(
                        [(v, y_range.start), (v, y_range.end)],
                        &color,
                    ))?
                    .label(format!("{label} = {v:.2} V"))
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
            }
        }
        if style.annotate {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .label_font(("sans-serif", 12).into_font().color(&WHITE))
                .border_style(&WHITE.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> LpResult<Vec<u8>> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| LpError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
