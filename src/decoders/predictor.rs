//! PNG and TIFF predictor reversal (ISO 32000-1:2008, 7.4.4.4).
//!
//! Cross-reference streams are almost always written with `/Predictor 12`
//! (PNG Up) so that the column-wise deltas compress well.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};

/// Decode parameters for stream decoders.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (samples per row)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read `/Predictor`, `/Columns`, `/Colors`, `/BitsPerComponent`.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let get = |key: &str, default: i64| {
            dict.get(key).and_then(Object::as_integer).unwrap_or(default)
        };
        Self {
            predictor: get("Predictor", 1),
            columns: get("Columns", 1).max(1) as usize,
            colors: get("Colors", 1).max(1) as usize,
            bits_per_component: get("BitsPerComponent", 8).max(1) as usize,
        }
    }

    /// Bytes of sample data per row, excluding a PNG tag byte.
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete pixel, at least 1 (PNG filter distance).
    fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode("TIFF predictor only supported for 8-bit samples".to_string()));
    }
    let row_bytes = params.row_bytes();
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_bytes) {
        for i in params.colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - params.colors]);
        }
    }
    Ok(output)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_bytes = params.row_bytes();
    let stride = row_bytes + 1;
    if data.len() % stride != 0 {
        return Err(Error::Decode(format!(
            "Predicted data length {} is not a multiple of row size {}",
            data.len(),
            stride
        )));
    }

    let bpp = params.pixel_bytes();
    let mut output = Vec::with_capacity(data.len() / stride * row_bytes);
    let mut previous = vec![0u8; row_bytes];

    for row in data.chunks(stride) {
        let tag = row[0];
        let mut current = row[1..].to_vec();

        for i in 0..row_bytes {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", other)))
                },
            };
            current[i] = current[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&current);
        previous = current;
    }

    Ok(output)
}

/// Paeth predictor function from the PNG specification.
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (ia, ib, ic) = (i16::from(a), i16::from(b), i16::from(c));
    let p = ia + ib - ic;
    let (pa, pb, pc) = ((p - ia).abs(), (p - ib).abs(), (p - ic).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_params(columns: usize) -> DecodeParams {
        DecodeParams {
            predictor: 12,
            columns,
            ..Default::default()
        }
    }

    #[test]
    fn test_png_up_predictor() {
        // Two rows of 3 columns, tag 2 (Up) on both
        let data = [2, 1, 2, 3, 2, 1, 1, 1];
        let decoded = decode_predictor(&data, &png_params(3)).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_predictor() {
        let data = [1, 5, 1, 1];
        let decoded = decode_predictor(&data, &png_params(3)).unwrap();
        assert_eq!(decoded, vec![5, 6, 7]);
    }

    #[test]
    fn test_png_bad_length() {
        assert!(decode_predictor(&[2, 1, 2], &png_params(3)).is_err());
    }

    #[test]
    fn test_no_predictor_passthrough() {
        let params = DecodeParams::default();
        assert_eq!(decode_predictor(&[9, 8, 7], &params).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn test_params_from_dict() {
        let mut dict = Dictionary::new();
        dict.insert("Predictor".into(), Object::Integer(12));
        dict.insert("Columns".into(), Object::Integer(5));
        let params = DecodeParams::from_dict(&dict);
        assert_eq!(params.predictor, 12);
        assert_eq!(params.row_bytes(), 5);
    }
}
