//! Stream decoder implementations for PDF filters.
//!
//! The supported pipeline is FlateDecode (zlib/deflate) optionally followed
//! by PNG-Up predictor reversal. Filters are applied in declaration order;
//! anything else fails in strict mode and is skipped with a warning in
//! lenient mode.

use crate::error::{Error, Result};

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{DecodeParams, decode_predictor};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name this decoder implements (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode stream data through a filter pipeline.
///
/// # Arguments
///
/// * `data` - The raw stream data
/// * `filters` - Filter names, applied in order
/// * `params` - Optional decode parameters (predictor, columns)
/// * `strict` - Whether an unsupported filter is fatal
pub fn decode_stream(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    strict: bool,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        match filter_name.as_str() {
            "FlateDecode" | "Fl" => {
                current = FlateDecoder.decode(&current)?;
                if let Some(params) = params {
                    if params.predictor != 1 {
                        current = decode_predictor(&current, params)?;
                    }
                }
            },
            other => {
                if strict {
                    return Err(Error::UnsupportedFilter(other.to_string()));
                }
                log::warn!("skipping unsupported filter {}", other);
            },
        }
    }

    Ok(current)
}

/// Extract filter names from a `Filter` entry (a name or array of names).
pub fn filter_names(filter: &crate::object::Object) -> Vec<String> {
    use crate::object::Object;
    match filter {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|o| o.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}
