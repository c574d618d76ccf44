//! Coordinate reconstruction: wrapper objects and encoded blobs.
//!
//! An encoded blob is `{"bdata": "<base64>", "dtype": "f8", "shape": "r, c"}`.
//! Only `bdata` is required; values are little-endian and `dtype` defaults to
//! 64-bit floats.

use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};

use super::Coordinates;

/// Substituted when a blob cannot be decoded.
pub const FALLBACK_SAMPLES: [f64; 5] = [0.0, 1.0, 2.0, 3.0, 4.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F8,
    F4,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
}

impl DType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "f8" | "float64" => Some(DType::F8),
            "f4" | "float32" => Some(DType::F4),
            "i1" | "int8" => Some(DType::I1),
            "u1" | "u1c" | "uint8" => Some(DType::U1),
            "i2" | "int16" => Some(DType::I2),
            "u2" | "uint16" => Some(DType::U2),
            "i4" | "int32" => Some(DType::I4),
            "u4" | "uint32" => Some(DType::U4),
            _ => None,
        }
    }

    pub fn width(self) -> usize {
        match self {
            DType::F8 => 8,
            DType::F4 | DType::I4 | DType::U4 => 4,
            DType::I2 | DType::U2 => 2,
            DType::I1 | DType::U1 => 1,
        }
    }

    fn read(self, b: &[u8]) -> f64 {
        match self {
            DType::F8 => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            DType::F4 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            DType::I4 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            DType::U4 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            DType::I2 => i16::from_le_bytes([b[0], b[1]]) as f64,
            DType::U2 => u16::from_le_bytes([b[0], b[1]]) as f64,
            DType::I1 => b[0] as i8 as f64,
            DType::U1 => b[0] as f64,
        }
    }
}

/// Decode a base64 blob into a flat sequence.
pub fn decode_blob(bdata: &str, dtype: Option<&str>) -> Result<Vec<f64>> {
    let dtype = match dtype {
        None => DType::F8,
        Some(name) => DType::parse(name).ok_or_else(|| anyhow!("unknown dtype {:?}", name))?,
    };
    let compact: String = bdata.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| anyhow!("base64 decode error: {}", e))?;
    let width = dtype.width();
    if bytes.len() % width != 0 {
        bail!("{} bytes is not a multiple of element width {}", bytes.len(), width);
    }
    Ok(bytes.chunks_exact(width).map(|c| dtype.read(c)).collect())
}

/// Parse a blob `shape`, given either as `"r, c"` or `[r, c]`.
pub fn parse_shape(value: &Value) -> Option<Vec<usize>> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.parse().ok())
            .collect(),
        Value::Array(items) => items.iter().map(|v| v.as_u64().map(|n| n as usize)).collect(),
        Value::Number(n) => n.as_u64().map(|n| vec![n as usize]),
        _ => None,
    }
}

fn to_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// A JSON sequence as coordinates: a grid when every element is itself a sequence.
pub fn coords_from_sequence(items: &[Value]) -> Coordinates {
    if !items.is_empty() && items.iter().all(Value::is_array) {
        let rows = items
            .iter()
            .map(|row| match row {
                Value::Array(cells) => cells.iter().map(to_number).collect(),
                _ => Vec::new(),
            })
            .collect();
        return Coordinates::Grid(rows);
    }
    Coordinates::Flat(items.iter().map(to_number).collect())
}

fn reshape(values: Vec<f64>, shape: Option<Vec<usize>>) -> Coordinates {
    match shape.as_deref() {
        Some(&[rows, cols]) if rows > 0 && cols > 0 && rows * cols == values.len() => {
            Coordinates::Grid(values.chunks(cols).map(<[f64]>::to_vec).collect())
        }
        _ => Coordinates::Flat(values),
    }
}

/// Result of reconstructing one wrapped coordinate field.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconstructed {
    Coords(Coordinates),
    /// Blob was present but undecodable; carries the fallback and the reason
    Fallback(Coordinates, String),
    /// Nothing recognizable in the wrapper
    Absent,
}

/// Reconstruct an object-valued coordinate field, in priority order
/// `data`, `original`, encoded blob.
pub fn reconstruct(field: &Map<String, Value>) -> Reconstructed {
    if let Some(Value::Array(items)) = field.get("data") {
        return Reconstructed::Coords(coords_from_sequence(items));
    }
    if let Some(Value::Array(items)) = field.get("original") {
        return Reconstructed::Coords(coords_from_sequence(items));
    }
    let Some(marker) = field.get("bdata") else {
        return Reconstructed::Absent;
    };

    let decoded = match marker {
        Value::String(blob) => decode_blob(blob, field.get("dtype").and_then(Value::as_str)),
        other => Err(anyhow!("bdata is not a string: {}", other)),
    };
    match decoded {
        Ok(values) => Reconstructed::Coords(reshape(values, field.get("shape").and_then(parse_shape))),
        Err(e) => Reconstructed::Fallback(Coordinates::Flat(FALLBACK_SAMPLES.to_vec()), e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_f64(values: &[f64]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    #[test]
    fn decodes_f8_blob() {
        let blob = encode_f64(&[0.25, 0.5, 1.0]);
        assert_eq!(decode_blob(&blob, None).unwrap(), vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn decodes_narrow_dtypes() {
        let i2: Vec<u8> = [-3i16, 7].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(decode_blob(&STANDARD.encode(i2), Some("i2")).unwrap(), vec![-3.0, 7.0]);
        assert_eq!(decode_blob(&STANDARD.encode([1u8, 255]), Some("u1")).unwrap(), vec![1.0, 255.0]);
    }

    #[test]
    fn misaligned_blob_is_an_error() {
        let blob = STANDARD.encode([0u8; 12]);
        assert!(decode_blob(&blob, Some("f8")).is_err());
    }

    #[test]
    fn corrupted_blob_falls_back() {
        let field = json!({"bdata": "@@not-base64@@"});
        match reconstruct(field.as_object().unwrap()) {
            Reconstructed::Fallback(Coordinates::Flat(v), _) => assert_eq!(v, FALLBACK_SAMPLES.to_vec()),
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn unknown_dtype_falls_back() {
        let field = json!({"bdata": encode_f64(&[1.0]), "dtype": "c16"});
        assert!(matches!(reconstruct(field.as_object().unwrap()), Reconstructed::Fallback(..)));
    }

    #[test]
    fn data_wins_over_original() {
        let field = json!({"data": [1, 2], "original": [9, 9, 9]});
        assert_eq!(
            reconstruct(field.as_object().unwrap()),
            Reconstructed::Coords(Coordinates::Flat(vec![1.0, 2.0]))
        );
        let field = json!({"original": [3, 4]});
        assert_eq!(
            reconstruct(field.as_object().unwrap()),
            Reconstructed::Coords(Coordinates::Flat(vec![3.0, 4.0]))
        );
    }

    #[test]
    fn shaped_blob_becomes_grid() {
        let field = json!({"bdata": encode_f64(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), "dtype": "f8", "shape": "2, 3"});
        assert_eq!(
            reconstruct(field.as_object().unwrap()),
            Reconstructed::Coords(Coordinates::Grid(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]))
        );
    }

    #[test]
    fn mismatched_shape_stays_flat() {
        let field = json!({"bdata": encode_f64(&[1.0, 2.0, 3.0]), "shape": [2, 2]});
        assert_eq!(
            reconstruct(field.as_object().unwrap()),
            Reconstructed::Coords(Coordinates::Flat(vec![1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn unrecognized_wrapper_is_absent() {
        let field = json!({"values": [1, 2]});
        assert_eq!(reconstruct(field.as_object().unwrap()), Reconstructed::Absent);
    }

    #[test]
    fn nested_sequences_and_gaps() {
        let grid = coords_from_sequence(json!([[0.1, null], [0.3, "0.4"]]).as_array().unwrap());
        match grid {
            Coordinates::Grid(rows) => {
                assert_eq!(rows[0][0], 0.1);
                assert!(rows[0][1].is_nan());
                assert_eq!(rows[1][1], 0.4);
            }
            other => panic!("expected grid, got {:?}", other),
        }
    }
}
