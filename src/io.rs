//! Safetensors containers.
//!
//! Every array that leaves or enters the crate goes through a safetensors
//! file: an 8-byte little-endian header length, a JSON header mapping
//! names to `{dtype, shape, data_offsets}`, then the raw little-endian
//! payload. String lists (channel names, trial ids) are stored as one
//! newline-joined `U8` tensor.
//!
//! Reader input layout (one recording per file):
//!
//! ```text
//!   data       [C, T]  F32 | F64
//!   sfreq      [1]     F32 | F64
//!   ch_names   [n]     U8   (optional, newline-joined)
//! ```
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{Array2, ArrayD, IxDyn};
use serde::Deserialize;

use crate::features::FeatureMatrix;
use crate::reduce::Embedding;

#[derive(Debug, Deserialize)]
struct Entry {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// A parsed safetensors file: header entries plus the payload bytes.
pub struct Container {
    entries: HashMap<String, Entry>,
    bytes: Vec<u8>,
    data_start: usize,
}

impl Container {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < 8 {
            bail!("safetensors file too small ({} bytes)", bytes.len());
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = u64::from_le_bytes(len);
        let Some(data_start) = usize::try_from(n)
            .ok()
            .and_then(|n| n.checked_add(8))
            .filter(|&end| end <= bytes.len())
        else {
            bail!("header length {n} exceeds file size {}", bytes.len());
        };
        let raw: HashMap<String, serde_json::Value> = serde_json::from_slice(&bytes[8..data_start])
            .context("failed to parse safetensors header")?;
        let mut entries = HashMap::new();
        for (key, value) in raw {
            if key == "__metadata__" {
                continue;
            }
            let entry: Entry = serde_json::from_value(value)
                .with_context(|| format!("malformed header entry '{key}'"))?;
            let [s, e] = entry.data_offsets;
            match data_start.checked_add(e) {
                Some(end) if s <= e && end <= bytes.len() => {}
                _ => bail!("entry '{key}' offsets {s}..{e} out of range"),
            }
            entries.insert(key, entry);
        }
        Ok(Self { entries, bytes, data_start })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn entry(&self, name: &str) -> Result<(&Entry, &[u8])> {
        let entry = self
            .entries
            .get(name)
            .with_context(|| format!("missing '{name}' key (have: {})", self.keys().join(", ")))?;
        let [s, e] = entry.data_offsets;
        Ok((entry, &self.bytes[self.data_start + s..self.data_start + e]))
    }

    /// Any numeric tensor, converted to `f64`.
    pub fn array_f64(&self, name: &str) -> Result<ArrayD<f64>> {
        let (entry, raw) = self.entry(name)?;
        let vals: Vec<f64> = match entry.dtype.as_str() {
            "F32" => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "F64" => raw
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            "I32" => raw
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "U8" => raw.iter().map(|&b| b as f64).collect(),
            other => bail!("'{name}': unsupported dtype {other}"),
        };
        ArrayD::from_shape_vec(IxDyn(&entry.shape), vals)
            .with_context(|| format!("'{name}': payload does not match shape {:?}", entry.shape))
    }

    pub fn array2_f64(&self, name: &str) -> Result<Array2<f64>> {
        self.array_f64(name)?
            .into_dimensionality()
            .with_context(|| format!("'{name}' is not 2-D"))
    }

    /// First element of a numeric tensor.
    pub fn scalar_f64(&self, name: &str) -> Result<f64> {
        self.array_f64(name)?
            .iter()
            .next()
            .copied()
            .with_context(|| format!("'{name}' is empty"))
    }

    /// Newline-joined `U8` string list.
    pub fn str_list(&self, name: &str) -> Result<Vec<String>> {
        let (entry, raw) = self.entry(name)?;
        if entry.dtype != "U8" {
            bail!("'{name}': expected U8 string list, got {}", entry.dtype);
        }
        let text = std::str::from_utf8(raw).with_context(|| format!("'{name}' is not UTF-8"))?;
        Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
    }
}

// ── Recording reader ──────────────────────────────────────────────────────────

/// One continuous recording.
#[derive(Debug, Clone)]
pub struct RawData {
    /// `[C, T]`.
    pub data: Array2<f64>,
    /// Sampling rate (Hz).
    pub sfreq: f64,
    /// Channel names (may be empty if not saved).
    pub ch_names: Vec<String>,
}

impl RawData {
    pub fn load(path: &Path) -> Result<Self> {
        let c = Container::open(path)?;
        let data = c.array2_f64("data").with_context(|| format!("in {}", path.display()))?;
        let sfreq = c.scalar_f64("sfreq").with_context(|| format!("in {}", path.display()))?;
        if !(sfreq > 0.0) {
            bail!("{}: sfreq {sfreq} must be > 0", path.display());
        }
        let ch_names = if c.contains("ch_names") { c.str_list("ch_names")? } else { vec![] };
        if !ch_names.is_empty() && ch_names.len() != data.nrows() {
            bail!(
                "{}: {} channel names for {} channels",
                path.display(),
                ch_names.len(),
                data.nrows()
            );
        }
        Ok(RawData { data, sfreq, ch_names })
    }

    /// Row index of channel `name` (case-insensitive, spaces ignored).
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        let norm = |s: &str| s.replace(' ', "").to_lowercase();
        self.ch_names.iter().position(|n| norm(n) == norm(name))
    }

    /// Write in the reader layout above (data as F64).
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = StWriter::new();
        w.add_f64_arr2("data", &self.data);
        w.add_f64("sfreq", &[self.sfreq], &[1]);
        if !self.ch_names.is_empty() {
            w.add_str_list("ch_names", &self.ch_names);
        }
        w.write(path)
    }
}

// ── Generic writer ────────────────────────────────────────────────────────────

/// Safetensors writer for F32, F64, I32 and U8 tensors.
///
/// ```rust,no_run
/// use exg_embed::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("psd", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.add_str_list("ids", &["rec01".to_string()]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    /// Any-dimensional `f64` array, written in logical (row-major) order.
    pub fn add_f64_arrd<D: ndarray::Dimension>(&mut self, name: &str, arr: &ndarray::Array<f64, D>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, arr.shape());
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    pub fn add_u8(&mut self, name: &str, data: &[u8], shape: &[usize]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", shape.to_vec()));
    }

    pub fn add_str_list(&mut self, name: &str, items: &[String]) {
        let joined = items.join("\n");
        self.add_u8(name, joined.as_bytes(), &[joined.len()]);
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(
                name.clone(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Presentation exports ──────────────────────────────────────────────────────

/// Write a feature matrix: `features [N, F]`, `trial_ids`, `columns`.
pub fn write_features(features: &FeatureMatrix, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("features", &features.data);
    w.add_str_list("trial_ids", &features.ids);
    w.add_str_list("columns", &features.columns);
    w.write(path)
}

/// Write an embedding: `embedding [N, 2]`, `trial_ids`.
pub fn write_embedding(embedding: &Embedding, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("embedding", &embedding.points);
    w.add_str_list("trial_ids", &embedding.ids);
    w.write(path)
}
