//! Readers and writers for recorded probe sweeps.
//!
//! Three on-disk layouts are understood:
//! - plain CSV with a header row naming the columns,
//! - the Yokogawa SL1000 CSV export (metadata block, then data rows whose first
//!   field is empty),
//! - NPZ archives written by [`save_npz`].
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use ndarray::Array1;
use ndarray_npy::{NpzReader, NpzWriter};
use crate::analysis::{LpError, LpResult, Metadata, Recording};
use crate::config::AcquisitionConfig;
/// Metadata keys whose rows end with a trailing separator in SL1000 exports.
const TRAILING_VALUE_KEYS: [&str; 8] = [
    "TraceName",
    "BlockSize",
    "Date",
    "Time",
    "VUnit",
    "HResolution",
    "HOffset",
    "HUnit",
];
const METADATA_SCAN_LINES: usize = 64;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Yokogawa,
    Npz,
}
impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("npz") => SourceFormat::Npz,
            _ => SourceFormat::Csv,
        }
    }
}
pub fn load_recording(path: impl AsRef<Path>, cfg: &AcquisitionConfig) -> LpResult<Recording> {
    let path = path.as_ref();
    let recording = match SourceFormat::from_path(path) {
        SourceFormat::Npz => load_npz(path, cfg)?,
        _ => {
            let text = fs::read_to_string(path)?;
            read_csv_str(&text, cfg)?
        }
    };
    log::info!(
        "loaded {} samples ({:.3} s) from {}",
        recording.len(),
        recording.duration_seconds(),
        path.display()
    );
    if !recording.metadata.is_empty() {
        log::debug!("metadata keys: {:?}", recording.metadata.0.keys().collect::<Vec<_>>());
    }
    Ok(recording)
}
/// Parse CSV text, picking the Yokogawa dialect when a metadata block is present.
pub fn read_csv_str(text: &str, cfg: &AcquisitionConfig) -> LpResult<Recording> {
    match detect_csv_dialect(text) {
        SourceFormat::Yokogawa => read_yokogawa_str(text, cfg),
        _ => read_plain_csv_str(text, cfg),
    }
}
fn detect_csv_dialect(text: &str) -> SourceFormat {
    for line in text.lines().take(METADATA_SCAN_LINES) {
        let key = clean_field(line.split(',').next().unwrap_or(""));
        if key.is_empty() {
            break;
        }
        if key == "TraceName" {
            return SourceFormat::Yokogawa;
        }
    }
    SourceFormat::Csv
}
fn clean_field(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}
fn find_column(names: &[String], wanted: &str) -> Option<usize> {
    names.iter().position(|n| n.eq_ignore_ascii_case(wanted))
}
fn parse_cell(field: &str, line: usize, column: &str) -> LpResult<f64> {
    let cleaned = clean_field(field);
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(LpError::format(
            line,
            format!("column `{column}`: `{cleaned}` is not a finite number"),
        )),
    }
}
fn read_plain_csv_str(text: &str, cfg: &AcquisitionConfig) -> LpResult<Recording> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let (_, header) = lines
        .next()
        .ok_or_else(|| LpError::format(1, "file is empty"))?;
    let names: Vec<String> = header.split(',').map(|f| clean_field(f).to_owned()).collect();
    let v_idx = find_column(&names, &cfg.voltage_column)
        .ok_or_else(|| LpError::MissingColumn(cfg.voltage_column.clone()))?;
    let i_idx = find_column(&names, &cfg.current_column)
        .ok_or_else(|| LpError::MissingColumn(cfg.current_column.clone()))?;
    let t_idx = cfg
        .time_column
        .as_deref()
        .and_then(|name| find_column(&names, name));
    let mut time = Vec::new();
    let mut voltage = Vec::new();
    let mut current = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != names.len() {
            return Err(LpError::format(
                line_no,
                format!("expected {} fields, found {}", names.len(), fields.len()),
            ));
        }
        voltage.push(parse_cell(fields[v_idx], line_no, &names[v_idx])?);
        current.push(parse_cell(fields[i_idx], line_no, &names[i_idx])?);
        if let Some(t) = t_idx {
            time.push(parse_cell(fields[t], line_no, &names[t])?);
        }
    }
    if voltage.is_empty() {
        return Err(LpError::format(1, "no data rows after header"));
    }
    let (voltage, current) = (Array1::from(voltage), Array1::from(current));
    match t_idx {
        Some(_) => Recording::new(Array1::from(time), voltage, current, Metadata::default()),
        None => Recording::from_uniform(cfg.sample_rate_hz, voltage, current, Metadata::default()),
    }
}
/// Parse the SL1000 metadata block. Returns the zero-based index of the
/// first data line together with the metadata.
pub fn parse_yokogawa_header(text: &str) -> (usize, Metadata) {
    let mut metadata = Metadata::default();
    for (idx, line) in text.lines().enumerate() {
        let mut parts = line.trim().split(',');
        let key = clean_field(parts.next().unwrap_or(""));
        if key.is_empty() {
            return (idx, metadata);
        }
        let mut values: Vec<String> = parts.map(|v| clean_field(v).to_owned()).collect();
        if TRAILING_VALUE_KEYS.contains(&key) {
            values.pop();
        }
        metadata.insert(key, values);
    }
    (text.lines().count(), metadata)
}
fn read_yokogawa_str(text: &str, cfg: &AcquisitionConfig) -> LpResult<Recording> {
    let (data_start, mut metadata) = parse_yokogawa_header(text);
    if let Some(names) = &cfg.trace_names {
        metadata.insert("TraceName", names.clone());
    }
    let names: Vec<String> = metadata
        .get("TraceName")
        .map(|n| n.to_vec())
        .ok_or_else(|| LpError::MissingColumn("TraceName".into()))?;
    let v_idx = find_column(&names, &cfg.voltage_column)
        .ok_or_else(|| LpError::MissingColumn(cfg.voltage_column.clone()))?;
    let i_idx = find_column(&names, &cfg.current_column)
        .ok_or_else(|| LpError::MissingColumn(cfg.current_column.clone()))?;
    let mut voltage = Vec::new();
    let mut current = Vec::new();
    for (idx, line) in text.lines().enumerate().skip(data_start) {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        // first field is the empty row key
        let fields: Vec<&str> = line.split(',').skip(1).collect();
        if fields.len() < names.len() {
            return Err(LpError::format(
                line_no,
                format!("expected {} traces, found {}", names.len(), fields.len()),
            ));
        }
        voltage.push(parse_cell(fields[v_idx], line_no, &names[v_idx])?);
        current.push(parse_cell(fields[i_idx], line_no, &names[i_idx])?);
    }
    if voltage.is_empty() {
        return Err(LpError::format(data_start + 1, "no data rows after metadata"));
    }
    let voltage = Array1::from(voltage);
    let current = Array1::from(current);
    match (
        metadata.first_f64("HResolution"),
        metadata.first_f64("HOffset"),
    ) {
        (Some(res), Some(offset)) if res > 0.0 => {
            let time = Array1::from_shape_fn(voltage.len(), |i| offset + i as f64 * res);
            Recording::new(time, voltage, current, metadata)
        }
        _ => Recording::from_uniform(cfg.sample_rate_hz, voltage, current, metadata),
    }
}
/// Write time, voltage and current rows with round-trip float formatting,
/// headed by the configured column names so the file loads back unchanged.
pub fn write_csv_to<W: Write>(
    recording: &Recording,
    mut w: W,
    cfg: &AcquisitionConfig,
) -> LpResult<()> {
    writeln!(
        w,
        "{},{},{}",
        cfg.time_column.as_deref().unwrap_or("time"),
        cfg.voltage_column,
        cfg.current_column
    )?;
    let (t, v, i) = (recording.time(), recording.voltage(), recording.current());
    for k in 0..recording.len() {
        writeln!(w, "{:?},{:?},{:?}", t[k], v[k], i[k])?;
    }
    w.flush()?;
    Ok(())
}
pub fn write_csv(
    recording: &Recording,
    path: impl AsRef<Path>,
    cfg: &AcquisitionConfig,
) -> LpResult<()> {
    let file = File::create(path.as_ref())?;
    write_csv_to(recording, BufWriter::new(file), cfg)?;
    log::info!("wrote {} samples to {}", recording.len(), path.as_ref().display());
    Ok(())
}
pub fn save_npz(
    recording: &Recording,
    path: impl AsRef<Path>,
    cfg: &AcquisitionConfig,
) -> LpResult<()> {
    let file = File::create(path.as_ref())?;
    let mut npz = NpzWriter::new_compressed(file);
    npz.add_array("time", &recording.time())?;
    npz.add_array(cfg.voltage_column.as_str(), &recording.voltage())?;
    npz.add_array(cfg.current_column.as_str(), &recording.current())?;
    let meta = Array1::from(serde_json::to_vec(&recording.metadata)?);
    npz.add_array("metadata", &meta)?;
    npz.finish()?;
    log::info!("wrote {} samples to {}", recording.len(), path.as_ref().display());
    Ok(())
}
fn read_npz_array<T: ndarray_npy::ReadableElement>(
    npz: &mut NpzReader<File>,
    key: &str,
) -> Option<Array1<T>> {
    npz.by_name::<ndarray::OwnedRepr<T>, ndarray::Ix1>(&format!("{key}.npy"))
        .or_else(|_| npz.by_name::<ndarray::OwnedRepr<T>, ndarray::Ix1>(key))
        .ok()
}
pub fn load_npz(path: impl AsRef<Path>, cfg: &AcquisitionConfig) -> LpResult<Recording> {
    let mut npz = NpzReader::new(File::open(path.as_ref())?)?;
    let metadata = match read_npz_array::<u8>(&mut npz, "metadata") {
        Some(bytes) => serde_json::from_slice(&bytes.to_vec())?,
        None => Metadata::default(),
    };
    let voltage = read_npz_array::<f64>(&mut npz, &cfg.voltage_column)
        .ok_or_else(|| LpError::MissingColumn(cfg.voltage_column.clone()))?;
    let current = read_npz_array::<f64>(&mut npz, &cfg.current_column)
        .ok_or_else(|| LpError::MissingColumn(cfg.current_column.clone()))?;
    match read_npz_array::<f64>(&mut npz, "time") {
        Some(time) => Recording::new(time, voltage, current, metadata),
        None => Recording::from_uniform(cfg.sample_rate_hz, voltage, current, metadata),
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    fn temp_path(tag: &str, ext: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("lpkit_{tag}_{}_{nanos}.{ext}", std::process::id()))
    }
    const YOKOGAWA: &str = "\"Model\",\"SL1000\",\n\
\"TraceName\",\"CH1\",\"CH2\",\n\
\"BlockSize\",4,4,\n\
\"HResolution\",1.0E-03,1.0E-03,\n\
\"HOffset\",0.0E+00,0.0E+00,\n\
\"VUnit\",\"V\",\"V\",\n\
,0.010,-0.20\n\
,0.020,-0.10\n\
,0.030,0.00\n\
,0.040,0.10\n";
    #[test]
    fn plain_csv_with_time_column() {
        let text = "time,V,I\n0.0,1.0,-0.5\n0.1,2.0,-0.4\n0.2,3.0,-0.3\n";
        let rec = read_csv_str(text, &AcquisitionConfig::default()).unwrap();
        assert_eq!(rec.len(), 3);
        assert_eq!(rec.voltage()[2], 3.0);
        assert_eq!(rec.current()[0], -0.5);
        assert!((rec.time()[1] - 0.1).abs() < 1e-12);
    }
    #[test]
    fn plain_csv_without_time_uses_sample_rate() {
        let text = "\"v\", \"I\"\n1,2\n3,4\n";
        let mut cfg = AcquisitionConfig::default();
        cfg.sample_rate_hz = 10.0;
        let rec = read_csv_str(text, &cfg).unwrap();
        assert!((rec.time()[1] - 0.1).abs() < 1e-12);
    }
    #[test]
    fn rejects_missing_current_column() {
        let text = "time,V\n0,1\n1,2\n";
        let err = read_csv_str(text, &AcquisitionConfig::default()).unwrap_err();
        match err {
            LpError::MissingColumn(name) => assert_eq!(name, "I"),
            other => panic!("unexpected error {other:?}"),
        }
    }
    #[test]
    fn rejects_malformed_cells_with_line_number() {
        let text = "time,V,I\n0,1,2\n1,abc,3\n";
        let err = read_csv_str(text, &AcquisitionConfig::default()).unwrap_err();
        assert!(matches!(err, LpError::Format { line: 3, .. }));
        let text = "time,V,I\n0,1\n";
        let err = read_csv_str(text, &AcquisitionConfig::default()).unwrap_err();
        assert!(matches!(err, LpError::Format { line: 2, .. }));
    }
    #[test]
    fn rejects_nan_and_infinite_cells() {
        let cfg = AcquisitionConfig::default();
        let err = read_csv_str("time,V,I\n0,1,1\n1,nan,1\n", &cfg).unwrap_err();
        assert!(matches!(err, LpError::Format { line: 3, .. }), "{err}");
        let err = read_csv_str("time,V,I\n0,2,inf\n", &cfg).unwrap_err();
        assert!(matches!(err, LpError::Format { line: 2, .. }), "{err}");
        let err = read_csv_str("time,V,I\nNaN,2,1\n1,2,1\n", &cfg).unwrap_err();
        assert!(matches!(err, LpError::Format { line: 2, .. }), "{err}");
        let text = YOKOGAWA.replace(",0.030,0.00", ",0.030,-Infinity");
        let mut cfg = cfg;
        cfg.trace_names = Some(vec!["V".into(), "I".into()]);
        let err = read_csv_str(&text, &cfg).unwrap_err();
        assert!(matches!(err, LpError::Format { line: 9, .. }), "{err}");
    }
    #[test]
    fn header_only_is_a_format_error() {
        let err = read_csv_str("time,V,I\n", &AcquisitionConfig::default()).unwrap_err();
        assert!(matches!(err, LpError::Format { .. }));
    }
    #[test]
    fn yokogawa_header_drops_trailing_values() {
        let (start, meta) = parse_yokogawa_header(YOKOGAWA);
        assert_eq!(start, 6);
        assert_eq!(meta.get("TraceName").unwrap(), ["CH1", "CH2"]);
        assert_eq!(meta.get("Model").unwrap(), ["SL1000", ""]);
        assert_eq!(meta.first_f64("HResolution"), Some(1.0e-3));
    }
    #[test]
    fn yokogawa_with_trace_name_override() {
        let mut cfg = AcquisitionConfig::default();
        cfg.trace_names = Some(vec!["V".into(), "I".into()]);
        let rec = read_csv_str(YOKOGAWA, &cfg).unwrap();
        assert_eq!(rec.len(), 4);
        assert_eq!(rec.voltage()[3], 0.04);
        assert_eq!(rec.current()[0], -0.2);
        assert!((rec.time()[3] - 3.0e-3).abs() < 1e-12);
        assert_eq!(rec.metadata.get("TraceName").unwrap(), ["V", "I"]);
    }
    #[test]
    fn yokogawa_without_matching_trace_is_missing_column() {
        let err = read_csv_str(YOKOGAWA, &AcquisitionConfig::default()).unwrap_err();
        assert!(matches!(err, LpError::MissingColumn(_)));
    }
    #[test]
    fn csv_export_roundtrip_preserves_samples() {
        let voltage = Array1::from_shape_fn(257, |i| (i as f64 * 0.37).sin() * 0.11);
        let current = Array1::from_shape_fn(257, |i| -(i as f64 * 0.013).exp() * 1.0e-3);
        let rec = Recording::from_uniform(1.0e6, voltage, current, Metadata::default()).unwrap();
        let path = temp_path("roundtrip", "csv");
        write_csv(&rec, &path, &AcquisitionConfig::default()).unwrap();
        let back = load_recording(&path, &AcquisitionConfig::default()).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(back.len(), rec.len());
        for k in 0..rec.len() {
            assert!((back.time()[k] - rec.time()[k]).abs() < 1e-15);
            assert!((back.voltage()[k] - rec.voltage()[k]).abs() < 1e-15);
            assert!((back.current()[k] - rec.current()[k]).abs() < 1e-15);
        }
    }
    #[test]
    fn npz_roundtrip_keeps_metadata() {
        let mut cfg = AcquisitionConfig::default();
        cfg.trace_names = Some(vec!["V".into(), "I".into()]);
        let rec = read_csv_str(YOKOGAWA, &cfg).unwrap();
        let path = temp_path("roundtrip", "npz");
        save_npz(&rec, &path, &cfg).unwrap();
        let back = load_recording(&path, &cfg).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(back.len(), 4);
        assert_eq!(back.voltage(), rec.voltage());
        assert_eq!(back.time(), rec.time());
        assert_eq!(back.metadata, rec.metadata);
        assert_eq!(back.metadata.first("Model"), Some("SL1000"));
    }
}
