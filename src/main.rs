// src/main.rs
mod analysis;
mod cli;
mod config;
mod gui;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use crate::analysis::wdf;
use crate::analysis::{
    load_recording, render_iv_png, render_raw_png, save_npz, write_csv, IvModel, PlotStyle,
    SourceFormat, SweepPipeline, SweepSynth,
};
use crate::cli::{AnalyzeArgs, Cli, Command, ConvertArgs, SynthArgs, ViewArgs, WdfArgs};
use crate::config::AnalysisConfig;
fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}
fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}
fn analyze(args: AnalyzeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.segment.mode = mode;
    }
    let recording = load_recording(&args.input, &config.acquisition)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    let pipeline = SweepPipeline::new(config).context("invalid analysis config")?;
    let mode = pipeline.config().segment.mode;
    let analysis = pipeline
        .run(&recording)
        .with_context(|| format!("failed to analyse {}", args.input.display()))?;
    if let Some(path) = &args.png_raw {
        let png = render_raw_png(
            &analysis.processed,
            &PlotStyle::default(),
            cli::range(args.xlim.as_deref()),
        )?;
        write_file(path, &png)?;
    }
    if let Some(path) = &args.png_iv {
        let png = render_iv_png(
            &analysis.curve,
            analysis.fit.as_ref().ok(),
            &PlotStyle::portrait(),
            cli::range(args.iv_xlim.as_deref()),
        )?;
        write_file(path, &png)?;
    }
    if let Some(path) = &args.json {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &analysis.report(mode))?;
        log::info!("wrote {}", path.display());
    }
    println!(
        "{}: {} segments, {} sweeps averaged into {} points",
        args.input.display(),
        analysis.segment_count,
        analysis.curve.sweeps,
        analysis.curve.len()
    );
    if args.per_segment {
        for (index, fit) in pipeline.fit_each_segment(&analysis.processed) {
            match fit {
                Ok(fit) => println!(
                    "segment {index:>3}: Te {:>8.3} eV  n {:.3e} m^-3  V_f {:>8.3} V",
                    fit.electron_temperature_ev, fit.density_m3, fit.floating_potential_v
                ),
                Err(err) => println!("segment {index:>3}: {err}"),
            }
        }
    }
    let fit = analysis.fit_result().context("no plasma parameters")?;
    print!("{fit}");
    Ok(())
}
fn export(recording: &analysis::Recording, path: &Path, config: &AnalysisConfig) -> Result<()> {
    match SourceFormat::from_path(path) {
        SourceFormat::Npz => save_npz(recording, path, &config.acquisition),
        _ => write_csv(recording, path, &config.acquisition),
    }
    .with_context(|| format!("failed to write {}", path.display()))
}
fn convert(args: ConvertArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let recording = load_recording(&args.input, &config.acquisition)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    export(&recording, &args.output, &config)?;
    println!(
        "{} -> {} ({} samples)",
        args.input.display(),
        args.output.display(),
        recording.len()
    );
    Ok(())
}
fn view(args: ViewArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let recording = load_recording(&args.input, &config.acquisition)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    let title = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.input.display().to_string());
    let pipeline = SweepPipeline::new(config).context("invalid analysis config")?;
    let data = match pipeline.run(&recording) {
        Ok(analysis) => gui::ViewerData::from_analysis(title, analysis),
        Err(err) => {
            log::warn!("analysis failed, showing traces only: {err}");
            gui::ViewerData {
                title,
                processed: pipeline.process(&recording)?,
                curve: None,
                fit: None,
                status: err.to_string(),
            }
        }
    };
    gui::run(data, args.decimate).map_err(|e| anyhow!("viewer failed: {e}"))
}
fn synth(args: SynthArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    if args.te <= 0.0 || args.density <= 0.0 || args.sweep_hz <= 0.0 || args.v_max <= args.v_min {
        bail!("need positive Te, density and sweep frequency, and v_max above v_min");
    }
    let model = IvModel::new(
        args.te,
        args.density,
        args.plasma_potential,
        config.probe.clone(),
    );
    let mut synth = SweepSynth::new(model);
    synth.sample_rate_hz = config.acquisition.sample_rate_hz;
    synth.sweep_hz = args.sweep_hz;
    synth.periods = args.periods;
    synth.v_min = args.v_min;
    synth.v_max = args.v_max;
    synth.noise_a = args.noise;
    synth.seed = args.seed;
    let recording = synth.generate(&config.scaling)?;
    export(&recording, &args.output, &config)?;
    println!(
        "wrote {} samples to {} (V_f = {:.3} V, I_isat = {:.4e} A)",
        recording.len(),
        args.output.display(),
        synth.model.floating_potential(),
        synth.model.ion_saturation_current()
    );
    Ok(())
}
fn wdf_inspect(args: WdfArgs) -> Result<()> {
    let file = &args.file;
    let header = wdf::header_bytes(file, args.bytes.max(wdf::OFFSET_SCAN_BYTES))
        .with_context(|| format!("failed to read {}", file.display()))?;
    println!("Hex dump of the first {} bytes:", args.bytes.min(header.len()));
    println!("{}", wdf::hex_dump(&header[..args.bytes.min(header.len())]));
    let detected = wdf::find_data_offset(&header);
    match detected {
        Some(offset) => println!("Possible data offset: {offset} bytes"),
        None => println!("No data offset found in the first {} bytes", wdf::OFFSET_SCAN_BYTES),
    }
    if let Some(out) = &args.dump {
        wdf::save_hex_dump(file, out, args.bytes)?;
        log::info!("saved hex dump to {}", out.display());
    }
    if let Some(format) = args.decode {
        let offset = args
            .offset
            .or(detected.map(|o| o as u64))
            .context("no data offset given or detected")?;
        let data = wdf::read_waveform(file, offset, args.channels, format)?;
        println!("{} frames x {} channels from offset {offset}", data.nrows(), data.ncols());
        for row in data.rows().into_iter().take(10) {
            println!("{}", row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\t"));
        }
    }
    Ok(())
}
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => analyze(args),
        Command::Convert(args) => convert(args),
        Command::View(args) => view(args),
        Command::Synth(args) => synth(args),
        Command::WdfInspect(args) => wdf_inspect(args),
    }
}
