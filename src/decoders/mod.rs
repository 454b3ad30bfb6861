//! Stream decoders for the filters found on cross-reference and object streams.
//!
//! Signing only needs to read structure streams, which in practice use
//! FlateDecode with an optional PNG predictor. Content streams and images
//! are never decoded.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};

mod flate;
mod predictor;

pub use flate::{encode_flate, FlateDecoder};
pub use predictor::{decode_predictor, DecodeParams};

/// Maximum decompressed size of a structure stream (decompression bomb guard).
const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

fn decoder_for(filter: &str) -> Result<Box<dyn StreamDecoder>> {
    match filter {
        "FlateDecode" | "Fl" => Ok(Box::new(FlateDecoder)),
        other => Err(Error::Decode(format!("Unsupported filter on structure stream: {}", other))),
    }
}

fn filter_names(dict: &Dictionary) -> Result<Vec<String>> {
    match dict.get("Filter") {
        None | Some(Object::Null) => Ok(Vec::new()),
        Some(Object::Name(name)) => Ok(vec![name.clone()]),
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_name()
                    .map(str::to_string)
                    .ok_or_else(|| Error::Decode("Non-name entry in /Filter array".to_string()))
            })
            .collect(),
        Some(other) => Err(Error::Decode(format!("Invalid /Filter type: {}", other.type_name()))),
    }
}

fn decode_params_at(dict: &Dictionary, index: usize) -> Option<DecodeParams> {
    let params = match dict.get("DecodeParms")? {
        Object::Dictionary(d) => d,
        Object::Array(items) => items.get(index)?.as_dict()?,
        _ => return None,
    };
    Some(DecodeParams::from_dict(params))
}

/// Decode a stream's data by applying its `/Filter` chain and predictors.
pub fn decode_stream(dict: &Dictionary, data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = data.to_vec();

    for (index, filter) in filter_names(dict)?.iter().enumerate() {
        let decoder = decoder_for(filter)?;
        decoded = decoder.decode(&decoded)?;
        if let Some(params) = decode_params_at(dict, index) {
            decoded = decode_predictor(&decoded, &params)?;
        }
        if decoded.len() > MAX_DECOMPRESSED_SIZE {
            return Err(Error::Decode(format!(
                "{} output exceeds {} bytes",
                decoder.name(),
                MAX_DECOMPRESSED_SIZE
            )));
        }
    }

    Ok(decoded)
}
