// ============================================================================
// NPY DECODING: compressed NumPy arrays to typed slices
// ============================================================================
//
// Slice bodies are a single 2-D `.npy` array, usually zlib-compressed
// (gzip is accepted too, and so is an uncompressed array).  Only the subset
// of the format the backend emits is handled: little/big/native endian
// scalar dtypes, C or Fortran order, 2-D shape (leading unit dims squeezed).

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};

use super::RemoteError;
use crate::ops::ingest::{RawSlice, SliceData};

const MAGIC: &[u8] = b"\x93NUMPY";

/// Inflate a slice body if it is compressed.
pub fn decompress(body: &[u8]) -> Result<Vec<u8>, RemoteError> {
    if body.starts_with(MAGIC) {
        return Ok(body.to_vec());
    }
    let mut out = Vec::new();
    let res = if body.starts_with(&[0x1f, 0x8b]) {
        GzDecoder::new(body).read_to_end(&mut out)
    } else {
        ZlibDecoder::new(body).read_to_end(&mut out)
    };
    res.map_err(|e| RemoteError::Decode(format!("decompression failed: {}", e)))?;
    Ok(out)
}

/// Decompress and parse a slice body.
pub fn decode_slice(body: &[u8]) -> Result<RawSlice, RemoteError> {
    parse_npy(&decompress(body)?)
}

#[derive(Debug, PartialEq)]
struct Header {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

fn bad(msg: impl Into<String>) -> RemoteError {
    RemoteError::Decode(msg.into())
}

pub fn parse_npy(bytes: &[u8]) -> Result<RawSlice, RemoteError> {
    if !bytes.starts_with(MAGIC) || bytes.len() < 10 {
        return Err(bad("missing .npy magic"));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(bad("truncated .npy preamble"));
            }
            (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
        }
        v => return Err(bad(format!("unsupported .npy version {}", v))),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(bad("truncated .npy header"));
    }
    let text = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| bad("non-UTF-8 .npy header"))?;
    let header = parse_header(text)?;

    let dims: Vec<usize> = {
        let mut d = header.shape.clone();
        while d.len() > 2 && d[0] == 1 {
            d.remove(0);
        }
        d
    };
    let (height, width) = match dims.as_slice() {
        [h, w] => (*h, *w),
        [w] => (1, *w),
        _ => return Err(bad(format!("expected a 2-D array, got shape {:?}", header.shape))),
    };
    if width > u32::MAX as usize || height > u32::MAX as usize {
        return Err(bad(format!("shape {:?} exceeds the slice size limit", header.shape)));
    }
    let count = width
        .checked_mul(height)
        .ok_or_else(|| bad(format!("shape {:?} overflows the sample count", header.shape)))?;

    let mut data = decode_samples(&header.descr, &bytes[data_start..], count)?;
    if header.fortran_order && width > 1 && height > 1 {
        data = transpose(data, width, height);
    }
    RawSlice::new(width as u32, height as u32, data)
        .ok_or_else(|| bad("sample count does not match shape"))
}

/// Parse the Python-literal header dict.
fn parse_header(text: &str) -> Result<Header, RemoteError> {
    let descr = dict_value(text, "descr")
        .and_then(|v| {
            let v = v.trim();
            v.strip_prefix('\'')
                .and_then(|s| s.split('\'').next())
                .map(str::to_string)
        })
        .ok_or_else(|| bad("header has no descr"))?;

    let fortran_order = dict_value(text, "fortran_order")
        .map(|v| v.trim_start().starts_with("True"))
        .unwrap_or(false);

    let shape_src = dict_value(text, "shape").ok_or_else(|| bad("header has no shape"))?;
    let open = shape_src.find('(').ok_or_else(|| bad("malformed shape"))?;
    let close = shape_src.find(')').ok_or_else(|| bad("malformed shape"))?;
    let shape = shape_src[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('L').parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| bad("non-integer shape dimension"))?;

    Ok(Header { descr, fortran_order, shape })
}

/// Text after `'key':` in the header dict.
fn dict_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{}'", key);
    let at = text.find(&needle)? + needle.len();
    let rest = text[at..].trim_start().strip_prefix(':')?;
    Some(rest)
}

fn decode_samples(descr: &str, raw: &[u8], count: usize) -> Result<SliceData, RemoteError> {
    let (order, code) = descr.split_at(1.min(descr.len()));
    let big = match order {
        "<" | "|" | "=" => false,
        ">" => true,
        _ => return Err(bad(format!("unsupported dtype '{}'", descr))),
    };
    let width = match code.get(1..).and_then(|s| s.parse::<usize>().ok()) {
        Some(w) => w,
        None => return Err(bad(format!("unsupported dtype '{}'", descr))),
    };
    let bytes = count
        .checked_mul(width)
        .ok_or_else(|| bad(format!("{} samples of '{}' overflow the byte count", count, descr)))?;
    if raw.len() < bytes {
        return Err(bad(format!(
            "expected {} bytes of '{}' data, got {}",
            bytes,
            descr,
            raw.len()
        )));
    }
    let chunks = raw[..bytes].chunks_exact(width);

    macro_rules! read {
        ($t:ty) => {
            chunks.map(|c| {
                let mut b = [0u8; std::mem::size_of::<$t>()];
                b.copy_from_slice(c);
                if big { <$t>::from_be_bytes(b) } else { <$t>::from_le_bytes(b) }
            })
        };
    }

    let kind = code.chars().next().unwrap_or('?');
    let data = match (kind, width) {
        ('u', 1) | ('b', 1) => SliceData::U8(raw[..count].to_vec()),
        ('u', 2) => SliceData::U16(read!(u16).collect()),
        ('f', 4) => SliceData::F32(read!(f32).collect()),
        ('f', 8) => SliceData::F32(read!(f64).map(|v| v as f32).collect()),
        ('i', 1) => SliceData::I32(raw[..count].iter().map(|&b| b as i8 as i32).collect()),
        ('i', 2) => SliceData::I32(read!(i16).map(i32::from).collect()),
        ('i', 4) => SliceData::I32(read!(i32).collect()),
        ('i', 8) => SliceData::I32(
            read!(i64).map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32).collect(),
        ),
        ('u', 4) => SliceData::I32(read!(u32).map(|v| v.min(i32::MAX as u32) as i32).collect()),
        ('u', 8) => SliceData::I32(read!(u64).map(|v| v.min(i32::MAX as u64) as i32).collect()),
        _ => return Err(bad(format!("unsupported dtype '{}'", descr))),
    };
    Ok(data)
}

/// Column-major samples to row-major.
fn transpose(data: SliceData, width: usize, height: usize) -> SliceData {
    fn t<T: Copy>(v: Vec<T>, width: usize, height: usize) -> Vec<T> {
        (0..width * height)
            .map(|i| {
                let (y, x) = (i / width, i % width);
                v[x * height + y]
            })
            .collect()
    }
    match data {
        SliceData::U8(v) => SliceData::U8(t(v, width, height)),
        SliceData::U16(v) => SliceData::U16(t(v, width, height)),
        SliceData::F32(v) => SliceData::F32(t(v, width, height)),
        SliceData::I32(v) => SliceData::I32(t(v, width, height)),
    }
}

#[cfg(test)]
pub(crate) fn encode_npy(descr: &str, shape: (usize, usize), fortran: bool, payload: &[u8]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': {}, 'shape': ({}, {}), }}",
        descr,
        if fortran { "True" } else { "False" },
        shape.0,
        shape.1
    );
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}
