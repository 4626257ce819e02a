//! PNG predictor reversal for PDF stream decoding.
//!
//! Cross-reference streams and some object streams compress better when a
//! PNG row predictor runs before Flate. Only predictor 12 (PNG-Up) is in
//! scope: the decoded buffer is a sequence of `columns + 1` byte rows, the
//! first byte of each row being the per-row filter tag.

use crate::error::{Error, Result};

/// Decode parameters extracted from a `DecodeParms` dictionary.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 12 = PNG-Up)
    pub predictor: i64,
    /// Number of columns per row
    pub columns: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
        }
    }
}

/// Reverse the predictor declared in `params`.
///
/// Predictor 1 is the identity. Predictor 12 walks rows of
/// `columns + 1` bytes: a tag byte of 2 (Up) adds each byte to the byte
/// above it modulo 256, any other tag copies the row through; the tag
/// byte itself is discarded. Predictor values other than 1 and 12 are a
/// [`Error::Decode`].
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        12 => decode_png_up(data, params.columns),
        other => Err(Error::Decode(format!("unsupported predictor: {}", other))),
    }
}

fn decode_png_up(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    if columns == 0 {
        return Err(Error::Decode("predictor 12 with zero columns".to_string()));
    }
    let mut output = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; columns];

    for chunk in data.chunks(columns + 1) {
        let tag = chunk[0];
        let row = &chunk[1..];
        let mut decoded = Vec::with_capacity(row.len());
        match tag {
            2 => {
                for (i, &b) in row.iter().enumerate() {
                    decoded.push(b.wrapping_add(prev.get(i).copied().unwrap_or(0)));
                }
            },
            // Any other tag passes the row through unchanged
            _ => decoded.extend_from_slice(row),
        }
        output.extend_from_slice(&decoded);
        prev = decoded;
    }

    Ok(output)
}
