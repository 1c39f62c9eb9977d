//! Minimal `.npy` codec for the embedding matrix
//!
//! Only the layout the index uses is supported: format version 1.x/2.x/3.x,
//! little-endian `f32` (`'<f4'`), C order. The header shape is reported as-is
//! so the store can reject anything that is not two-dimensional.

use crate::error::{Error, Result};
use std::io::{Read, Write};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;
const F32_DESCR: &str = "<f4";
/// Same default limit numpy applies when reading headers
const MAX_HEADER_LEN: usize = 10_000;

/// Header fields of an `.npy` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    /// dtype descriptor, e.g. `<f4`
    pub descr: String,
    /// Whether data is stored column-major
    pub fortran_order: bool,
    /// Array shape
    pub shape: Vec<usize>,
}

/// Write a `rows x cols` little-endian `f32` matrix.
pub fn write_f32_matrix<W: Write>(
    writer: &mut W,
    rows: usize,
    cols: usize,
    data: &[f32],
) -> Result<()> {
    if data.len() != rows * cols {
        return Err(Error::DimensionMismatch {
            expected: rows * cols,
            actual: data.len(),
        });
    }

    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({}, {}), }}",
        F32_DESCR, rows, cols
    );
    // magic(6) + version(2) + header_len(2) + header + '\n' must be 64-byte aligned
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| Error::IndexCorrupt("npy header too long".to_string()))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;

    let mut bytes = Vec::with_capacity(data.len() * 4);
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    writer.write_all(&bytes)?;
    Ok(())
}

/// Read an `.npy` file holding little-endian `f32` values.
///
/// Returns the parsed header and the flat data. The data length is checked
/// against the product of the header shape.
pub fn read_f32_array<R: Read>(reader: &mut R) -> Result<(NpyHeader, Vec<f32>)> {
    let mut magic = [0u8; 6];
    reader
        .read_exact(&mut magic)
        .map_err(|_| Error::IndexCorrupt("npy file too short".to_string()))?;
    if &magic != MAGIC {
        return Err(Error::IndexCorrupt("not an npy file".to_string()));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        other => {
            return Err(Error::IndexCorrupt(format!(
                "unsupported npy version {}",
                other
            )))
        }
    };

    if header_len > MAX_HEADER_LEN {
        return Err(Error::IndexCorrupt(format!(
            "npy header is {} bytes, limit is {}",
            header_len, MAX_HEADER_LEN
        )));
    }

    let mut header_bytes = vec![0u8; header_len];
    reader.read_exact(&mut header_bytes)?;
    let header_text = String::from_utf8(header_bytes)
        .map_err(|_| Error::IndexCorrupt("npy header is not UTF-8".to_string()))?;
    let header = parse_header(&header_text)?;

    if header.descr != F32_DESCR {
        return Err(Error::IndexCorrupt(format!(
            "embeddings must be little-endian float32, found '{}'",
            header.descr
        )));
    }
    if header.fortran_order {
        return Err(Error::IndexCorrupt(
            "embeddings must be stored in C order".to_string(),
        ));
    }

    let expected_bytes = header
        .shape
        .iter()
        .try_fold(4usize, |bytes, dim| bytes.checked_mul(*dim))
        .ok_or_else(|| {
            Error::IndexCorrupt(format!("npy shape {:?} is too large", header.shape))
        })?;

    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    if body.len() != expected_bytes {
        return Err(Error::IndexCorrupt(format!(
            "embedding data holds {} bytes, header shape {:?} needs {}",
            body.len(),
            header.shape,
            expected_bytes
        )));
    }

    let data = body
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok((header, data))
}

fn parse_header(text: &str) -> Result<NpyHeader> {
    let corrupt = |what: &str| Error::IndexCorrupt(format!("npy header: {}", what));

    let descr = value_after(text, "'descr':")
        .and_then(|rest| {
            let rest = rest.trim_start().strip_prefix('\'')?;
            rest.split('\'').next()
        })
        .ok_or_else(|| corrupt("missing descr"))?
        .to_string();

    let fortran_order = match value_after(text, "'fortran_order':").map(str::trim_start) {
        Some(rest) if rest.starts_with("True") => true,
        Some(rest) if rest.starts_with("False") => false,
        _ => return Err(corrupt("missing fortran_order")),
    };

    let shape_text = value_after(text, "'shape':")
        .and_then(|rest| {
            let rest = rest.trim_start().strip_prefix('(')?;
            rest.split(')').next()
        })
        .ok_or_else(|| corrupt("missing shape"))?;

    let shape = shape_text
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| dim.parse::<usize>().map_err(|_| corrupt("invalid shape")))
        .collect::<Result<Vec<_>>>()?;

    Ok(NpyHeader {
        descr,
        fortran_order,
        shape,
    })
}

fn value_after<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.find(key).map(|pos| &text[pos + key.len()..])
}
