use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};
use crate::analysis::wdf::SampleFormat;
use crate::config::SegmentMode;
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter, segment, average and fit a recording
    Analyze(AnalyzeArgs),
    /// Re-export a recording as CSV or NPZ (chosen by the output extension)
    Convert(ConvertArgs),
    /// Open the interactive viewer
    View(ViewArgs),
    /// Write a synthetic sweep recording
    Synth(SynthArgs),
    /// Hex dump and probable data offset of a raw WDF file
    WdfInspect(WdfArgs),
}
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Recording (.csv, Yokogawa .csv or .npz)
    pub input: PathBuf,
    /// Analysis config JSON
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override the segmentation mode from the config
    #[arg(long, value_enum)]
    pub mode: Option<SegmentMode>,
    /// Write the raw signal plot here
    #[arg(long, value_name = "PNG")]
    pub png_raw: Option<PathBuf>,
    /// Write the I-V characteristic plot here
    #[arg(long, value_name = "PNG")]
    pub png_iv: Option<PathBuf>,
    /// Write a JSON report here
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,
    /// Time range of the raw plot, seconds
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub xlim: Option<Vec<f64>>,
    /// Voltage range of the I-V plot, volts
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub iv_xlim: Option<Vec<f64>>,
    /// Also fit every segment on its own
    #[arg(long)]
    pub per_segment: bool,
}
#[derive(Args, Debug)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Column names and sample rate
    #[arg(long)]
    pub config: Option<PathBuf>,
}
#[derive(Args, Debug)]
pub struct ViewArgs {
    pub input: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Keep every Nth sample of the raw traces
    #[arg(long, default_value_t = 10)]
    pub decimate: usize,
}
#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Output recording (.csv or .npz)
    pub output: PathBuf,
    /// Sample rate, scaling and column names
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Electron temperature, eV
    #[arg(long, default_value_t = 3.0)]
    pub te: f64,
    /// Plasma density, m^-3
    #[arg(long, default_value_t = 1.0e16)]
    pub density: f64,
    /// Plasma potential, V
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    pub plasma_potential: f64,
    #[arg(long, default_value_t = 4)]
    pub periods: usize,
    /// Sweep frequency, Hz
    #[arg(long, default_value_t = 2.0)]
    pub sweep_hz: f64,
    #[arg(long, default_value_t = -200.0, allow_negative_numbers = true)]
    pub v_min: f64,
    #[arg(long, default_value_t = 50.0, allow_negative_numbers = true)]
    pub v_max: f64,
    /// Current noise, A rms
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}
#[derive(Args, Debug)]
pub struct WdfArgs {
    pub file: PathBuf,
    /// Header bytes to dump
    #[arg(long, default_value_t = 128)]
    pub bytes: usize,
    /// Save the hex dump to this file
    #[arg(long)]
    pub dump: Option<PathBuf>,
    /// Decode samples in this format and print the first frames
    #[arg(long, value_enum)]
    pub decode: Option<SampleFormat>,
    #[arg(long, default_value_t = 1)]
    pub channels: usize,
    /// Data offset in bytes; detected when omitted
    #[arg(long)]
    pub offset: Option<u64>,
}
/// `[min, max]` from a two-value option.
pub fn range(values: Option<&[f64]>) -> Option<(f64, f64)> {
    match values? {
        [lo, hi] => Some((*lo, *hi)),
        _ => None,
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn parses_analyze_with_negative_xlim() {
        let cli = Cli::try_parse_from([
            "lpkit", "analyze", "run.csv", "--mode", "ramp", "--iv-xlim", "-20", "120",
            "--png-iv", "iv.png",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.mode, Some(SegmentMode::Ramp));
        assert_eq!(range(args.iv_xlim.as_deref()), Some((-20.0, 120.0)));
        assert_eq!(range(args.xlim.as_deref()), None);
        assert_eq!(args.png_iv, Some(PathBuf::from("iv.png")));
    }
    #[test]
    fn parses_synth_and_wdf() {
        let cli = Cli::try_parse_from(["lpkit", "synth", "out.npz", "--te", "5", "--noise", "1e-6"])
            .unwrap();
        let Command::Synth(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.te, 5.0);
        assert_eq!(args.periods, 4);
        assert_eq!(args.v_min, -200.0);
        let cli = Cli::try_parse_from(["lpkit", "wdf-inspect", "a.wdf", "--decode", "f4"]).unwrap();
        let Command::WdfInspect(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.decode, Some(SampleFormat::F4));
        assert_eq!(args.bytes, 128);
    }
}
