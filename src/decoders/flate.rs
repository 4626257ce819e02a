//! FlateDecode (zlib/deflate) implementation.
//!
//! The only compression filter in scope; uses the flate2 crate.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(e) => {
                // Partial recovery: keep whatever decompressed before the error
                if !output.is_empty() {
                    log::warn!(
                        "FlateDecode: recovered {} bytes before corruption: {}",
                        output.len(),
                        e
                    );
                    return Ok(output);
                }
                // Some generators emit raw deflate without the zlib wrapper
                output.clear();
                match DeflateDecoder::new(input).read_to_end(&mut output) {
                    Ok(_) => {
                        log::debug!("FlateDecode: raw deflate fallback succeeded");
                        Ok(output)
                    },
                    Err(deflate_err) => Err(Error::Decode(format!(
                        "FlateDecode failed (zlib: {}, deflate: {})",
                        e, deflate_err
                    ))),
                }
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use std::io::Write;

    #[test]
    fn test_flate_decode_simple() {
        let original = b"Hello, FlateDecode!";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_large_data() {
        let original = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(1000);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_raw_deflate_fallback() {
        let original = b"raw deflate without zlib header";
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        assert!(FlateDecoder.decode(b"\xff\xfe not compressed \x00").is_err());
    }

    #[test]
    fn test_flate_decoder_name() {
        assert_eq!(FlateDecoder.name(), "FlateDecode");
    }
}
