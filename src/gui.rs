// src/gui.rs
use eframe::egui;
use egui::Color32;
use egui_plot::{Legend, Line, MarkerShape, Plot, PlotPoints, Points, VLine};
use crate::analysis::pipeline::ProcessedSweep;
use crate::analysis::plot::FIT_POINTS;
use crate::analysis::{FitResult, IvCurve, SweepAnalysis};

const VOLTAGE_COLOR: Color32 = Color32::from_rgb(117, 188, 255);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tab {
    Raw,
    Iv,
}

/// What the viewer shows: always the processed traces, plus the averaged
/// curve and fit when the analysis got that far.
pub struct ViewerData {
    pub title: String,
    pub processed: ProcessedSweep,
    pub curve: Option<IvCurve>,
    pub fit: Option<FitResult>,
    pub status: String,
}

impl ViewerData {
    pub fn from_analysis(title: String, analysis: SweepAnalysis) -> Self {
        let status = match &analysis.fit {
            Ok(_) => format!(
                "{} segments, {} sweeps averaged",
                analysis.segment_count, analysis.curve.sweeps
            ),
            Err(err) => format!("fit rejected: {err}"),
        };
        Self {
            title,
            processed: analysis.processed,
            fit: analysis.fit.ok(),
            curve: Some(analysis.curve),
            status,
        }
    }
}

pub struct LpViewerApp {
    title: String,
    status: String,
    tab: Tab,
    show_raw_current: bool,
    show_filtered: bool,

    // raw tab, decimated
    voltage: Vec<[f64; 2]>,
    current: Vec<[f64; 2]>,
    filtered_current: Vec<[f64; 2]>,
    selected: Vec<Vec<[f64; 2]>>,
    peaks: Vec<[f64; 2]>,

    // I-V tab, volts and mA
    iv: Vec<[f64; 2]>,
    model: Vec<[f64; 2]>,
    fit: Option<FitResult>,
}

impl LpViewerApp {
    pub fn new(data: ViewerData, decimate: usize) -> Self {
        let step = decimate.max(1);
        let processed = &data.processed;
        let raw = processed.raw.decimated(step);
        let filtered = processed.filtered.decimated(step);
        let t = raw.time();
        let pairs = |values: ndarray::ArrayView1<'_, f64>, sign: f64| -> Vec<[f64; 2]> {
            t.iter().zip(values.iter()).map(|(&x, &y)| [x, sign * y]).collect()
        };
        let voltage = pairs(raw.voltage(), 1.0);
        let current = pairs(raw.current(), -1.0);
        let filtered_current = pairs(filtered.current(), -1.0);

        // contiguous runs of selected samples
        let mut selected = Vec::new();
        let mut run = Vec::new();
        let fv = filtered.voltage();
        for (k, keep) in processed.mask.iter().step_by(step).enumerate() {
            if *keep && k < fv.len() {
                run.push([t[k], fv[k]]);
            } else if !run.is_empty() {
                selected.push(std::mem::take(&mut run));
            }
        }
        if !run.is_empty() {
            selected.push(run);
        }

        let full_t = processed.raw.time();
        let full_v = processed.raw.voltage();
        let peaks = processed
            .peaks
            .iter()
            .map(|&k| [full_t[k], full_v[k]])
            .collect();

        let iv: Vec<[f64; 2]> = data
            .curve
            .as_ref()
            .map(|c| {
                c.voltage
                    .iter()
                    .zip(&c.current)
                    .map(|(&v, &i)| [v, i * 1.0e3])
                    .collect()
            })
            .unwrap_or_default();
        let model = match (&data.fit, iv.is_empty()) {
            (Some(fit), false) => {
                let lo = iv.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
                fit.model_curve(lo, f64::INFINITY, FIT_POINTS)
                    .into_iter()
                    .map(|(v, i)| [v, i * 1.0e3])
                    .collect()
            }
            _ => Vec::new(),
        };

        Self {
            title: data.title,
            status: data.status,
            tab: if data.fit.is_some() { Tab::Iv } else { Tab::Raw },
            show_raw_current: true,
            show_filtered: true,
            voltage,
            current,
            filtered_current,
            selected,
            peaks,
            iv,
            model,
            fit: data.fit,
        }
    }

    fn draw_raw(&self, ui: &mut egui::Ui) {
        Plot::new("raw_plot")
            .legend(Legend::default())
            .x_axis_label("Time (s)")
            .y_axis_label("Signal (V)")
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(self.voltage.clone()))
                        .name("Voltage")
                        .color(VOLTAGE_COLOR),
                );
                if self.show_raw_current {
                    plot_ui.line(
                        Line::new(PlotPoints::new(self.current.clone()))
                            .name("Current")
                            .color(Color32::RED),
                    );
                }
                if self.show_filtered {
                    plot_ui.line(
                        Line::new(PlotPoints::new(self.filtered_current.clone()))
                            .name("Filtered current")
                            .color(Color32::from_rgb(255, 165, 0)),
                    );
                }
                for run in &self.selected {
                    plot_ui.line(
                        Line::new(PlotPoints::new(run.clone()))
                            .name("Voltage select")
                            .color(Color32::WHITE)
                            .width(2.0),
                    );
                }
                plot_ui.points(
                    Points::new(PlotPoints::new(self.peaks.clone()))
                        .name("Peaks")
                        .shape(MarkerShape::Cross)
                        .radius(5.0)
                        .color(Color32::YELLOW),
                );
            });
    }

    fn draw_iv(&self, ui: &mut egui::Ui) {
        if self.iv.is_empty() {
            ui.label("No averaged I-V curve for this recording.");
            return;
        }
        Plot::new("iv_plot")
            .legend(Legend::default())
            .x_axis_label("Voltage (V)")
            .y_axis_label("Current (mA)")
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(self.iv.clone()))
                        .name("I-V")
                        .color(VOLTAGE_COLOR),
                );
                if !self.model.is_empty() {
                    plot_ui.line(
                        Line::new(PlotPoints::new(self.model.clone()))
                            .name("Fit")
                            .color(Color32::RED)
                            .width(2.0),
                    );
                }
                if let Some(fit) = &self.fit {
                    plot_ui.vline(
                        VLine::new(fit.floating_potential_v)
                            .name("V_f")
                            .color(Color32::from_rgb(255, 165, 0)),
                    );
                    plot_ui.vline(
                        VLine::new(fit.plasma_potential_v)
                            .name("V_p")
                            .color(Color32::YELLOW),
                    );
                }
            });
    }
}

impl eframe::App for LpViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(&self.title);
                ui.separator();
                ui.selectable_value(&mut self.tab, Tab::Raw, "Raw traces");
                ui.selectable_value(&mut self.tab, Tab::Iv, "I-V curve");
                if self.tab == Tab::Raw {
                    ui.separator();
                    ui.checkbox(&mut self.show_raw_current, "Raw current");
                    ui.checkbox(&mut self.show_filtered, "Filtered current");
                }
            });
        });

        egui::SidePanel::right("summary").min_width(220.0).show(ctx, |ui| {
            ui.heading("Fit");
            match &self.fit {
                Some(fit) => {
                    egui::Grid::new("fit_grid").num_columns(2).show(ui, |ui| {
                        let rows = [
                            ("Te", format!("{:.3} eV", fit.electron_temperature_ev)),
                            ("n", format!("{:.3e} m^-3", fit.density_m3)),
                            ("V_f", format!("{:.2} V", fit.floating_potential_v)),
                            ("V_p", format!("{:.2} V", fit.plasma_potential_v)),
                            ("I_isat", format!("{:.3e} A", fit.ion_saturation_current_a)),
                            ("R^2", format!("{:.4}", fit.electron_fit.r_squared)),
                            ("iterations", fit.iterations.to_string()),
                        ];
                        for (name, value) in rows {
                            ui.label(name);
                            ui.monospace(value);
                            ui.end_row();
                        }
                    });
                }
                None => {
                    ui.label(egui::RichText::new("No fit").color(Color32::YELLOW));
                }
            }
            ui.add_space(10.0);
            ui.label(egui::RichText::new(&self.status).small());
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Raw => self.draw_raw(ui),
            Tab::Iv => self.draw_iv(ui),
        });
    }
}

pub fn run(data: ViewerData, decimate: usize) -> eframe::Result<()> {
    let title = format!("lpkit - {}", data.title);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([800.0, 500.0])
        .with_title(title.clone());
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Box::new(LpViewerApp::new(data, decimate))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pipeline::SweepPipeline;
    use crate::analysis::synth::{IvModel, SweepSynth};
    use crate::config::{AnalysisConfig, ScalingConfig};

    #[test]
    fn viewer_prepares_decimated_series() {
        let mut synth = SweepSynth::new(IvModel::argon(3.0, 1.0e16, 10.0));
        synth.sample_rate_hz = 2.0e4;
        synth.sweep_hz = 5.0;
        let rec = synth.generate(&ScalingConfig::default()).unwrap();
        let mut cfg = AnalysisConfig::default();
        cfg.acquisition.sample_rate_hz = 2.0e4;
        cfg.filter.cutoff_hz = 1.0e3;
        cfg.segment.distance = Some(1000);
        cfg.segment.window_seconds = 0.08;
        let analysis = SweepPipeline::new(cfg).unwrap().run(&rec).unwrap();
        let app = LpViewerApp::new(ViewerData::from_analysis("synthetic".into(), analysis), 10);
        assert_eq!(app.voltage.len(), 1600);
        assert_eq!(app.current.len(), app.voltage.len());
        assert_eq!(app.peaks.len(), 3);
        assert_eq!(app.selected.len(), 3);
        assert_eq!(app.model.len(), FIT_POINTS);
        assert_eq!(app.tab, Tab::Iv);
        // recorded shunt voltage is negative, drawn flipped
        assert!(app.current.iter().any(|p| p[1] > 0.0));
    }
}
