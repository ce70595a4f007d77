//! Loaders for Kokoro voice style matrices.
//!
//! A voice is a float32 tensor of shape `(rows, 1, 256)` (or `(rows, 256)`):
//! one 256-wide style vector per possible token count. It can arrive as
//!   - a single `.npy` file (NPY format 1.0 / 2.0, C order, float32),
//!   - one member of a `.npz` archive (a ZIP of `.npy` files), or
//!   - a raw little-endian `.bin` dump with no header.
//!
//! All three end up as a [`StyleMatrix`]: rows × width, flat row-major data.

use std::{fs::File, io::Read, path::Path};

use anyhow::{bail, ensure, Context, Result};
use zip::ZipArchive;

/// Width of one Kokoro style vector.
pub const STYLE_WIDTH: usize = 256;

/// A 2-D view over a voice tensor. Trailing dimensions are flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleMatrix {
    rows: usize,
    width: usize,
    data: Vec<f32>,
}

impl StyleMatrix {
    pub fn new(rows: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        ensure!(width > 0, "style width must be non-zero");
        ensure!(
            data.len() == rows * width,
            "style data has {} values, expected {} × {}",
            data.len(),
            rows,
            width
        );
        Ok(Self { rows, width, data })
    }

    /// Build from an N-d shape: first axis is rows, the rest is flattened.
    fn from_shape(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let Some((&rows, rest)) = shape.split_first() else {
            bail!("scalar array cannot hold voice styles");
        };
        let width = rest.iter().product::<usize>().max(1);
        Self::new(rows, width, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Row `i`, clamped to the last row.
    pub fn row(&self, i: usize) -> &[f32] {
        let i = i.min(self.rows.saturating_sub(1));
        &self.data[i * self.width..(i + 1) * self.width]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NPY
// ─────────────────────────────────────────────────────────────────────────────

/// Parse an in-memory `.npy` buffer.
pub fn parse_npy(bytes: &[u8]) -> Result<StyleMatrix> {
    if bytes.len() < 10 || &bytes[..6] != b"\x93NUMPY" {
        bail!("Not a valid NPY file (bad magic)");
    }

    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            ensure!(bytes.len() >= 12, "NPY v{} file too short", bytes[6]);
            (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
        }
        v => bail!("Unsupported NPY version {}.{}", v, bytes[7]),
    };

    let header_end = header_start + header_len;
    ensure!(bytes.len() >= header_end, "NPY file truncated in header");
    let header = std::str::from_utf8(&bytes[header_start..header_end])
        .context("NPY header is not valid UTF-8")?;

    let descr = header_value(header, "descr").context("NPY header missing 'descr'")?;
    let big_endian = match descr {
        "<f4" | "=f4" | "|f4" => false,
        ">f4" => true,
        other => bail!("Unsupported dtype '{}' — voices must be float32", other),
    };

    if header_value(header, "fortran_order").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        bail!("Fortran-order arrays are not supported");
    }

    let shape = parse_shape(header_value(header, "shape").context("NPY header missing 'shape'")?)?;
    let count: usize = shape.iter().product();

    let payload = &bytes[header_end..];
    ensure!(
        payload.len() >= count * 4,
        "NPY data section too short: expected {} bytes, got {}",
        count * 4,
        payload.len()
    );

    let data = payload[..count * 4]
        .chunks_exact(4)
        .map(|b| {
            let b = [b[0], b[1], b[2], b[3]];
            if big_endian { f32::from_be_bytes(b) } else { f32::from_le_bytes(b) }
        })
        .collect();

    StyleMatrix::from_shape(&shape, data)
}

/// Value of `'key': value` in the Python-literal header dict, without quotes.
fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = [format!("'{key}':"), format!("\"{key}\":")]
        .iter()
        .find_map(|k| header.find(k.as_str()).map(|p| p + k.len()))?;
    let rest = header[start..].trim_start();

    match rest.chars().next()? {
        '(' => rest.find(')').map(|end| &rest[..=end]),
        q @ ('\'' | '"') => {
            let inner = &rest[1..];
            inner.find(q).map(|end| &inner[..end])
        }
        _ => {
            let end = rest.find([',', '}']).unwrap_or(rest.len());
            Some(rest[..end].trim())
        }
    }
}

/// `(511, 1, 256)` → `[511, 1, 256]`; `()` → `[]`.
fn parse_shape(tuple: &str) -> Result<Vec<usize>> {
    tuple
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<usize>().with_context(|| format!("Bad shape dim: '{t}'")))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// File loaders
// ─────────────────────────────────────────────────────────────────────────────

/// Read a standalone `.npy` file.
pub fn load_npy(path: &Path) -> Result<StyleMatrix> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Cannot read voice file: {}", path.display()))?;
    parse_npy(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read the member `name` (with or without `.npy`) from an NPZ archive.
pub fn load_npz_member(path: &Path, name: &str) -> Result<StyleMatrix> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open NPZ file: {}", path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Cannot open ZIP archive: {}", path.display()))?;

    let member = format!("{}.npy", name.trim_end_matches(".npy"));
    let mut entry = archive
        .by_name(&member)
        .with_context(|| format!("Voice '{}' not found in {}", name, path.display()))?;

    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf).context("Failed to read NPY entry")?;
    parse_npy(&buf).with_context(|| format!("Failed to parse NPY entry '{member}'"))
}

/// Read a headerless little-endian f32 dump of `width`-wide rows.
pub fn load_raw_f32(path: &Path, width: usize) -> Result<StyleMatrix> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Cannot read voice file: {}", path.display()))?;
    ensure!(
        bytes.len() % (width * 4) == 0,
        "{} is {} bytes, not a whole number of {}-wide f32 rows",
        path.display(),
        bytes.len(),
        width
    );
    let data: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    StyleMatrix::new(data.len() / width, width, data)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Minimal v1.0 NPY buffer, header padded to a multiple of 64 bytes.
    pub(crate) fn make_npy(shape: &[usize], values: &[f32]) -> Vec<u8> {
        let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
        let mut header = format!(
            "{{'descr': '<f4', 'fortran_order': False, 'shape': ({},), }}",
            dims.join(", ")
        );
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut buf = b"\x93NUMPY\x01\x00".to_vec();
        buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
        buf.extend_from_slice(header.as_bytes());
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    #[test]
    fn parses_three_dim_voice_shape() {
        let values: Vec<f32> = (0..12).map(|x| x as f32).collect();
        let m = parse_npy(&make_npy(&[3, 1, 4], &values)).unwrap();
        assert_eq!((m.rows(), m.width()), (3, 4));
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn row_index_is_clamped() {
        let values: Vec<f32> = (0..6).map(|x| x as f32).collect();
        let m = parse_npy(&make_npy(&[2, 3], &values)).unwrap();
        assert_eq!(m.row(99), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn rejects_bad_magic_and_dtype() {
        assert!(parse_npy(b"NOTANPYFILE").is_err());

        let mut buf = make_npy(&[1], &[1.0]);
        let pos = buf.windows(3).position(|w| w == b"<f4").unwrap();
        buf[pos..pos + 3].copy_from_slice(b"<f8");
        assert!(parse_npy(&buf).is_err());
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut buf = make_npy(&[4], &[1.0, 2.0, 3.0, 4.0]);
        buf.truncate(buf.len() - 4);
        assert!(parse_npy(&buf).is_err());
    }

    #[test]
    fn reads_member_from_npz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voices.npz");
        {
            let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
            let opts = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            zip.start_file("af_bella.npy", opts).unwrap();
            zip.write_all(&make_npy(&[2, 2], &[1.0, 2.0, 3.0, 4.0])).unwrap();
            zip.finish().unwrap();
        }

        let m = load_npz_member(&path, "af_bella").unwrap();
        assert_eq!(m.row(0), &[1.0, 2.0]);
        assert!(load_npz_member(&path, "bm_lewis").is_err());
    }

    #[test]
    fn reads_raw_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("af_sky.bin");
        let bytes: Vec<u8> = (0..8).flat_map(|x| (x as f32).to_le_bytes()).collect();
        std::fs::write(&path, bytes).unwrap();

        let m = load_raw_f32(&path, 4).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0, 7.0]);
        assert!(load_raw_f32(&path, 3).is_err());
    }
}
