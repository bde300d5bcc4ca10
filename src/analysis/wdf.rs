//! Helpers for poking at raw Yokogawa WDF waveform files, whose header layout
//! is undocumented: hex dumps, a guess at where samples begin, and a plain
//! little-endian sample decoder.
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use byteorder::{LittleEndian, ReadBytesExt};
use ndarray::Array2;
use crate::analysis::{LpError, LpResult};
/// Bytes scanned by [`find_data_offset`].
pub const OFFSET_SCAN_BYTES: usize = 512;
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SampleFormat {
    /// 16-bit signed integer.
    I2,
    /// 32-bit signed integer.
    I4,
    /// 32-bit IEEE float.
    F4,
}
impl SampleFormat {
    pub fn width(self) -> usize {
        match self {
            SampleFormat::I2 => 2,
            SampleFormat::I4 | SampleFormat::F4 => 4,
        }
    }
    fn read<R: Read>(self, reader: &mut R) -> std::io::Result<f64> {
        Ok(match self {
            SampleFormat::I2 => reader.read_i16::<LittleEndian>()? as f64,
            SampleFormat::I4 => reader.read_i32::<LittleEndian>()? as f64,
            SampleFormat::F4 => reader.read_f32::<LittleEndian>()? as f64,
        })
    }
}
/// Up to `n` leading bytes of the file.
pub fn header_bytes(path: impl AsRef<Path>, n: usize) -> LpResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(n);
    File::open(path)?.take(n as u64).read_to_end(&mut bytes)?;
    Ok(bytes)
}
/// Space separated upper-case hex pairs.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
/// First byte that is neither a low control code nor ASCII; the header is
/// text, so this is a reasonable guess for where binary samples start.
pub fn find_data_offset(bytes: &[u8]) -> Option<usize> {
    bytes
        .iter()
        .take(OFFSET_SCAN_BYTES)
        .position(|&b| b < 9 || b > 127)
}
/// Decode interleaved samples from `offset` to the end of the file into a
/// samples x channels array.
pub fn read_waveform(
    path: impl AsRef<Path>,
    offset: u64,
    channels: usize,
    format: SampleFormat,
) -> LpResult<Array2<f64>> {
    if channels == 0 {
        return Err(LpError::Config("channel count must be at least 1".into()));
    }
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if offset > len {
        return Err(LpError::format(
            0,
            format!("data offset {offset} beyond end of {len}-byte file"),
        ));
    }
    file.seek(SeekFrom::Start(offset))?;
    let payload = (len - offset) as usize;
    let frame = channels * format.width();
    let frames = payload / frame;
    if payload % frame != 0 {
        log::warn!(
            "{}: dropping {} trailing bytes of a partial frame",
            path.display(),
            payload % frame
        );
    }
    let mut reader = BufReader::new(file);
    let mut samples = Vec::with_capacity(frames * channels);
    for _ in 0..frames * channels {
        samples.push(format.read(&mut reader)?);
    }
    log::debug!("decoded {frames} frames x {channels} channels as {format:?}");
    Array2::from_shape_vec((frames, channels), samples)
        .map_err(|e| LpError::format(0, e.to_string()))
}
/// Write the hex dump of the first `n` bytes of `path` to `out`.
pub fn save_hex_dump(path: impl AsRef<Path>, out: impl AsRef<Path>, n: usize) -> LpResult<()> {
    let bytes = header_bytes(path, n)?;
    fs::write(out, hex_dump(&bytes))?;
    Ok(())
}
