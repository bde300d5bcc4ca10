// src/analysis/mod.rs
pub mod average;
pub mod error;
pub mod filter;
pub mod fit;
pub mod loader;
pub mod peaks;
pub mod pipeline;
pub mod plot;
pub mod recording;
pub mod segment;
pub mod spectrum;
pub mod synth;
pub mod wdf;
pub use average::IvCurve;
pub use error::{FitError, LpError, LpResult};
pub use fit::{FitResult, LangmuirFitter};
pub use loader::{load_recording, save_npz, write_csv, SourceFormat};
pub use pipeline::{SweepAnalysis, SweepPipeline};
pub use plot::{render_iv_png, render_raw_png, PlotStyle};
pub use recording::{Metadata, Recording};
pub use synth::{IvModel, SweepSynth};
