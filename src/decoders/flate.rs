//! FlateDecode (zlib/deflate) implementation.
//!
//! Uses the flate2 crate. Raw deflate is tried when the zlib wrapper is
//! damaged, which some producers get wrong on xref streams.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(zlib_err) => {
                if !output.is_empty() {
                    log::warn!(
                        "FlateDecode partial recovery: {} bytes before corruption: {}",
                        output.len(),
                        zlib_err
                    );
                    return Ok(output);
                }

                log::debug!("Zlib decode failed ({}), trying raw deflate", zlib_err);
                output.clear();
                DeflateDecoder::new(input)
                    .read_to_end(&mut output)
                    .map_err(|e| Error::Decode(format!("FlateDecode failed: {}", e)))?;
                Ok(output)
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Compress data for a `/Filter /FlateDecode` stream.
pub fn encode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
