//! Safetensors persistence for every pipeline artifact.
//!
//! Files use the plain safetensors layout: an 8-byte little-endian header
//! length, a JSON header (`dtype`, `shape`, `data_offsets` per tensor, plus an
//! optional string map under `__metadata__`) padded with spaces to a multiple
//! of 8, then the raw little-endian tensor bytes. String lists are stored as
//! newline-joined `U8` tensors.
//!
//! | artifact | tensors | metadata |
//! |---|---|---|
//! | [`Recording`] | `data [C,T] F32`, `sfreq [1] F32`, `label [1] I64`, `ch_names`, optional `event_onsets [E] I64` + `event_labels [E] I64` | `subject` |
//! | segments | `data [N,K,T] F32`, `labels [N] I64`, `windows [N] I64`, `starts [N] I64`, `ch_names` | `subject`, `action` |
//! | [`AugmentedBatch`] | `data [M,K,T] F32`, `labels [M] I64`, `identifiers` | |
//! | [`WaveletBatch`] | `s{e}_c{c}_a{L}`, `s{e}_c{c}_d{l}` (F32) | `wavelet`, `levels`, `n_segments`, `n_channels` |
use log::info;
use ndarray::{s, Array1, Array2, Array3};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::augment::{AugmentedBatch, Provenance};
use crate::error::{PrepError, Result};
use crate::recording::{ActionKind, Event, Label, Recording};
use crate::segment::{stack, Segment};
use crate::wavelet::{CoeffKind, Coefficients, Wavelet, WaveletBatch, WaveletResult};

// ── Reader ────────────────────────────────────────────────────────────────────

/// A safetensors file held in memory.
pub struct StFile {
    path: PathBuf,
    bytes: Vec<u8>,
    header: HashMap<String, serde_json::Value>,
    data_start: usize,
}

impl StFile {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(path, bytes)
    }

    fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self> {
        let bad = |reason: &str| PrepError::format(path, reason);
        let len_bytes: [u8; 8] = bytes
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| bad("file too small for a safetensors header"))?;
        let data_start = usize::try_from(u64::from_le_bytes(len_bytes))
            .ok()
            .and_then(|n| n.checked_add(8))
            .ok_or_else(|| bad("header length overflows"))?;
        let raw_header = bytes
            .get(8..data_start)
            .ok_or_else(|| bad("header length exceeds file size"))?;
        let header: HashMap<String, serde_json::Value> = serde_json::from_slice(raw_header)
            .map_err(|e| PrepError::format(path, format!("failed to parse header: {e}")))?;
        Ok(Self { path: path.to_path_buf(), bytes, header, data_start })
    }

    fn err(&self, reason: impl Into<String>) -> PrepError {
        PrepError::format(&self.path, reason)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    /// Raw bytes, dtype and shape of tensor `name`.
    fn raw(&self, name: &str) -> Result<(&[u8], &str, Vec<usize>)> {
        let entry = self
            .header
            .get(name)
            .ok_or_else(|| self.err(format!("missing '{name}' tensor")))?;
        let dtype = entry["dtype"]
            .as_str()
            .ok_or_else(|| self.err(format!("'{name}': missing dtype")))?;
        let shape = entry["shape"]
            .as_array()
            .and_then(|dims| dims.iter().map(|v| v.as_u64().map(|d| d as usize)).collect())
            .ok_or_else(|| self.err(format!("'{name}': malformed shape")))?;
        let offsets: Option<Vec<usize>> = entry["data_offsets"]
            .as_array()
            .and_then(|o| o.iter().map(|v| v.as_u64().and_then(|d| usize::try_from(d).ok())).collect());
        let (s, e) = match offsets.as_deref() {
            Some(&[s, e]) if s <= e => (s, e),
            _ => return Err(self.err(format!("'{name}': malformed data_offsets"))),
        };
        let data = self
            .data_start
            .checked_add(s)
            .zip(self.data_start.checked_add(e))
            .and_then(|(s, e)| self.bytes.get(s..e))
            .ok_or_else(|| self.err(format!("'{name}': data past end of file")))?;
        Ok((data, dtype, shape))
    }

    pub fn f32_tensor(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
        let (raw, dtype, shape) = self.raw(name)?;
        if dtype != "F32" {
            return Err(self.err(format!("'{name}': expected F32, found {dtype}")));
        }
        let vals = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok((vals, shape))
    }

    pub fn i64_tensor(&self, name: &str) -> Result<Vec<i64>> {
        let (raw, dtype, _) = self.raw(name)?;
        if dtype != "I64" {
            return Err(self.err(format!("'{name}': expected I64, found {dtype}")));
        }
        Ok(raw
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect())
    }

    /// I64 tensor of sample or window positions; negative entries are malformed.
    pub fn index_tensor(&self, name: &str) -> Result<Vec<usize>> {
        self.i64_tensor(name)?
            .into_iter()
            .map(|v| {
                usize::try_from(v)
                    .map_err(|_| self.err(format!("'{name}': negative index {v}")))
            })
            .collect()
    }

    /// Newline-separated string list stored as a U8 tensor.
    pub fn lines(&self, name: &str) -> Result<Vec<String>> {
        let (raw, _, _) = self.raw(name)?;
        let text = std::str::from_utf8(raw)
            .map_err(|e| self.err(format!("'{name}': not UTF-8: {e}")))?;
        Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
    }

    pub fn metadata(&self, key: &str) -> Result<&str> {
        self.header
            .get("__metadata__")
            .and_then(|m| m[key].as_str())
            .ok_or_else(|| self.err(format!("missing metadata '{key}'")))
    }

    fn metadata_usize(&self, key: &str) -> Result<usize> {
        let v = self.metadata(key)?;
        v.parse()
            .map_err(|_| self.err(format!("metadata '{key}' = {v:?} is not an integer")))
    }

    fn array2(&self, name: &str) -> Result<Array2<f32>> {
        let (vals, shape) = self.f32_tensor(name)?;
        match shape[..] {
            [r, c] => Array2::from_shape_vec((r, c), vals)
                .map_err(|e| self.err(format!("'{name}': {e}"))),
            _ => Err(self.err(format!("'{name}': expected 2-D, found shape {shape:?}"))),
        }
    }

    fn array3(&self, name: &str) -> Result<Array3<f32>> {
        let (vals, shape) = self.f32_tensor(name)?;
        match shape[..] {
            [a, b, c] => Array3::from_shape_vec((a, b, c), vals)
                .map_err(|e| self.err(format!("'{name}': {e}"))),
            _ => Err(self.err(format!("'{name}': expected 3-D, found shape {shape:?}"))),
        }
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Simple safetensors file writer for F32, I64 and string-list tensors.
///
/// ```rust,no_run
/// use eegprep::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_i64("labels", &[0, 1, 1]);
/// w.add_lines("names", &["Fz".to_string(), "Cz".to_string()]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: BTreeMap<String, String>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f32_iter<'a>(&mut self, name: &str, data: impl IntoIterator<Item = &'a f32>, shape: &[usize]) {
        let bytes: Vec<u8> = data.into_iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_i64(&mut self, name: &str, data: &[i64]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I64", vec![data.len()]));
    }

    pub fn add_lines(&mut self, name: &str, lines: &[String]) {
        let bytes = lines.join("\n").into_bytes();
        let n = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![n]));
    }

    pub fn set_metadata(&mut self, key: &str, value: impl ToString) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::json!(self.metadata));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)
            .map_err(|e| PrepError::format(path, format!("cannot encode header: {e}")))?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::io::BufWriter::new(std::fs::File::create(path)?);
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        f.flush()?;
        Ok(())
    }
}

// ── Recordings ────────────────────────────────────────────────────────────────

/// Read a recording; a missing file is reported as [`PrepError::DataNotFound`].
pub fn load_recording(path: &Path, subject: &str) -> Result<Recording> {
    if !path.is_file() {
        return Err(PrepError::DataNotFound {
            subject: subject.to_string(),
            path: path.to_path_buf(),
        });
    }
    let f = StFile::open(path)?;
    let data = f.array2("data")?;
    let (sfreq, _) = f.f32_tensor("sfreq")?;
    let sfreq = *sfreq.first().ok_or_else(|| f.err("'sfreq' is empty"))?;
    let label = if f.contains("label") {
        f.i64_tensor("label")?.first().copied().unwrap_or(0)
    } else {
        0
    };
    let ch_names = if f.contains("ch_names") {
        f.lines("ch_names")?
    } else {
        (0..data.nrows()).map(|c| format!("ch{c}")).collect()
    };
    let events = if f.contains("event_onsets") {
        let onsets = f.index_tensor("event_onsets")?;
        let labels = f.i64_tensor("event_labels")?;
        if onsets.len() != labels.len() {
            return Err(f.err(format!("{} event onsets but {} event labels", onsets.len(), labels.len())));
        }
        onsets.into_iter().zip(labels).map(|(onset, label)| Event { onset, label }).collect()
    } else {
        Vec::new()
    };
    info!(
        "{subject}: loaded {} ch × {} samples @ {sfreq} Hz, {} events",
        data.nrows(),
        data.ncols(),
        events.len()
    );
    Recording::new(subject, ch_names, sfreq, data, label)?.with_events(events)
}

pub fn save_recording(rec: &Recording, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.set_metadata("subject", &rec.subject);
    w.add_f32_iter("data", rec.data.iter(), &[rec.n_channels(), rec.n_samples()]);
    w.add_f32("sfreq", &[rec.sfreq], &[1]);
    w.add_i64("label", &[rec.label]);
    w.add_lines("ch_names", &rec.ch_names);
    if !rec.events.is_empty() {
        let onsets: Vec<i64> = rec.events.iter().map(|e| e.onset as i64).collect();
        let labels: Vec<i64> = rec.events.iter().map(|e| e.label).collect();
        w.add_i64("event_onsets", &onsets);
        w.add_i64("event_labels", &labels);
    }
    w.write(path)
}

/// Upstream acquisition: supplies a subject's recording by identifier.
pub trait RecordingSource {
    fn fetch(&self, subject: &str) -> Result<Recording>;
}

/// Recordings stored as `<root>/<subject>.safetensors`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    pub root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, subject: &str) -> PathBuf {
        self.root.join(format!("{subject}.safetensors"))
    }
}

impl RecordingSource for DirectorySource {
    fn fetch(&self, subject: &str) -> Result<Recording> {
        load_recording(&self.path_for(subject), subject)
    }
}

// ── Segments ──────────────────────────────────────────────────────────────────

/// Write segments cut from one recording. All must share shape and channels.
pub fn write_segments(segments: &[Segment], path: &Path) -> Result<()> {
    let (data, labels) = stack(segments)?;
    let first = &segments[0];
    let windows: Vec<i64> = segments.iter().map(|s| s.window as i64).collect();
    let starts: Vec<i64> = segments.iter().map(|s| s.start as i64).collect();

    let mut w = StWriter::new();
    w.set_metadata("subject", &first.subject);
    w.set_metadata("action", first.action);
    w.add_f32_iter("data", data.iter(), data.shape());
    w.add_i64("labels", &labels);
    w.add_i64("windows", &windows);
    w.add_i64("starts", &starts);
    w.add_lines("ch_names", &first.ch_names);
    w.write(path)
}

pub fn read_segments(path: &Path) -> Result<Vec<Segment>> {
    let f = StFile::open(path)?;
    let data = f.array3("data")?;
    let labels = f.i64_tensor("labels")?;
    let windows = f.index_tensor("windows")?;
    let starts = f.index_tensor("starts")?;
    let ch_names = f.lines("ch_names")?;
    let subject = f.metadata("subject")?.to_string();
    let action: ActionKind = f.metadata("action")?.parse()?;

    let n = data.shape()[0];
    if labels.len() != n || windows.len() != n || starts.len() != n {
        return Err(f.err(format!("{n} segments but {} labels", labels.len())));
    }
    Ok((0..n)
        .map(|i| Segment {
            subject: subject.clone(),
            action,
            ch_names: ch_names.clone(),
            data: data.slice(s![i, .., ..]).to_owned(),
            label: labels[i],
            window: windows[i],
            start: starts[i],
        })
        .collect())
}

// ── Augmented batches ─────────────────────────────────────────────────────────

pub fn write_augmented(batch: &AugmentedBatch, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f32_iter("data", batch.data.iter(), batch.data.shape());
    w.add_i64("labels", &batch.labels);
    w.add_lines("identifiers", &batch.identifier_strings());
    w.write(path)
}

pub fn read_augmented(path: &Path) -> Result<AugmentedBatch> {
    let f = StFile::open(path)?;
    let data = f.array3("data")?;
    let labels: Vec<Label> = f.i64_tensor("labels")?;
    let identifiers = f
        .lines("identifiers")?
        .iter()
        .map(|s| s.parse::<Provenance>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| f.err(e.to_string()))?;
    if labels.len() != data.shape()[0] || identifiers.len() != labels.len() {
        return Err(f.err(format!(
            "{} rows, {} labels, {} identifiers",
            data.shape()[0],
            labels.len(),
            identifiers.len()
        )));
    }
    Ok(AugmentedBatch { data, labels, identifiers })
}

// ── Wavelet batches ───────────────────────────────────────────────────────────

fn coeff_key(segment: usize, channel: usize, kind: CoeffKind, level: usize) -> String {
    let tag = match kind {
        CoeffKind::Approximation => 'a',
        CoeffKind::Detail => 'd',
    };
    format!("s{segment}_c{channel}_{tag}{level}")
}

pub fn write_wavelets(batch: &WaveletBatch, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    let wavelet = batch.iter().next().map_or(Wavelet::default(), |(_, r)| r.wavelet);
    w.set_metadata("wavelet", wavelet);
    w.set_metadata("levels", batch.levels);
    w.set_metadata("n_segments", batch.n_segments);
    w.set_metadata("n_channels", batch.n_channels);
    for ((e, c), result) in batch.iter() {
        for coeffs in result.coeffs() {
            let key = coeff_key(e, c, coeffs.kind, coeffs.level);
            w.add_f32_iter(&key, coeffs.data.iter(), &[coeffs.data.len()]);
        }
    }
    w.write(path)
}

pub fn read_wavelets(path: &Path) -> Result<WaveletBatch> {
    let f = StFile::open(path)?;
    let wavelet: Wavelet = f.metadata("wavelet")?.parse()?;
    let levels = f.metadata_usize("levels")?;
    let n_segments = f.metadata_usize("n_segments")?;
    let n_channels = f.metadata_usize("n_channels")?;

    let band = |e: usize, c: usize, level: usize, kind: CoeffKind| -> Result<Coefficients> {
        let (vals, _) = f.f32_tensor(&coeff_key(e, c, kind, level))?;
        Ok(Coefficients { level, kind, data: Array1::from(vals) })
    };

    let mut results = Vec::with_capacity(n_segments * n_channels);
    for e in 0..n_segments {
        for c in 0..n_channels {
            let mut coeffs = vec![band(e, c, levels, CoeffKind::Approximation)?];
            for level in 1..=levels {
                coeffs.push(band(e, c, level, CoeffKind::Detail)?);
            }
            results.push(WaveletResult::from_coeffs(wavelet, coeffs)?);
        }
    }
    WaveletBatch::from_results(n_segments, n_channels, levels, results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.safetensors");
        std::fs::write(&path, [1u8, 0, 0]).unwrap();
        let err = StFile::open(&path).err().unwrap();
        assert!(matches!(err, PrepError::Format { .. }), "{err}");
    }

    fn with_header(header: &str) -> Vec<u8> {
        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        bytes
    }

    #[test]
    fn huge_header_length_is_format_error() {
        let mut bytes = u64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let err = StFile::from_bytes(Path::new("huge.safetensors"), bytes).err().unwrap();
        assert!(matches!(err, PrepError::Format { .. }), "{err}");
    }

    #[test]
    fn huge_data_offsets_are_format_error() {
        let header = format!(
            r#"{{"x":{{"dtype":"F32","shape":[1],"data_offsets":[{},{}]}}}}"#,
            u64::MAX - 1,
            u64::MAX
        );
        let f = StFile::from_bytes(Path::new("offsets.safetensors"), with_header(&header)).unwrap();
        let err = f.f32_tensor("x").unwrap_err();
        assert!(matches!(err, PrepError::Format { .. }), "{err}");

        let f = StFile::from_bytes(
            Path::new("inverted.safetensors"),
            with_header(r#"{"x":{"dtype":"F32","shape":[1],"data_offsets":[4,0]}}"#),
        )
        .unwrap();
        assert!(f.f32_tensor("x").is_err());
    }

    #[test]
    fn negative_segment_positions_are_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neg.safetensors");
        let mut w = StWriter::new();
        w.set_metadata("subject", "MM05");
        w.set_metadata("action", "thinking");
        w.add_f32("data", &[0.0; 4], &[1, 2, 2]);
        w.add_i64("labels", &[1]);
        w.add_i64("windows", &[-1]);
        w.add_i64("starts", &[0]);
        w.add_lines("ch_names", &["C3".to_string(), "C4".to_string()]);
        w.write(&path).unwrap();

        let err = read_segments(&path).unwrap_err();
        assert!(matches!(err, PrepError::Format { .. }), "{err}");
        assert!(err.to_string().contains("negative index -1"), "{err}");
    }

    #[test]
    fn header_is_padded_and_metadata_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.safetensors");
        let mut w = StWriter::new();
        w.set_metadata("subject", "MM05");
        w.add_f32("x", &[1.0, 2.0, 3.0], &[3]);
        w.add_i64("y", &[-4, 5]);
        w.write(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
        assert_eq!(n % 8, 0);

        let f = StFile::open(&path).unwrap();
        assert_eq!(f.metadata("subject").unwrap(), "MM05");
        assert_eq!(f.f32_tensor("x").unwrap(), (vec![1.0, 2.0, 3.0], vec![3]));
        assert_eq!(f.i64_tensor("y").unwrap(), vec![-4, 5]);
        assert!(f.i64_tensor("x").is_err());
    }

    #[test]
    fn missing_recording_is_data_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let src = DirectorySource::new(dir.path());
        let err = src.fetch("MM21").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataNotFound);
        assert!(err.to_string().contains("MM21"));
    }
}
