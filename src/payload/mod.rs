//! Chart payload model and the normalization pipeline.
//!
//! A `ChartPayload` is what the chart library consumes: an ordered, non-empty
//! trace list plus a free-form layout object. Coordinates are always
//! materialized numbers by the time a payload exists.

use serde::Serialize;
use serde_json::{Map, Value};

pub mod decode;
pub mod layout;
pub mod normalize;

pub use normalize::{classify, normalize, normalize_slot, normalize_with, Classified, PayloadShape};

/// Coordinate values of one trace field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Coordinates {
    Flat(Vec<f64>),
    /// Row-major grid, used by contour and heatmap `z`
    Grid(Vec<Vec<f64>>),
}

impl Coordinates {
    /// Number of points (rows for a grid).
    pub fn len(&self) -> usize {
        match self {
            Coordinates::Flat(v) => v.len(),
            Coordinates::Grid(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major flattening; a flat sequence is returned unchanged.
    pub fn into_flat(self) -> Self {
        match self {
            Coordinates::Grid(rows) => Coordinates::Flat(rows.into_iter().flatten().collect()),
            flat => flat,
        }
    }

    pub fn as_flat(&self) -> Option<&[f64]> {
        match self {
            Coordinates::Flat(v) => Some(v),
            Coordinates::Grid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Scatter,
    Contour,
    Heatmap,
}

impl TraceKind {
    pub fn from_type(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "scatter" | "scattergl" | "line" => Some(TraceKind::Scatter),
            "contour" => Some(TraceKind::Contour),
            "heatmap" | "heatmapgl" => Some(TraceKind::Heatmap),
            _ => None,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self, TraceKind::Contour | TraceKind::Heatmap)
    }
}

/// One renderable series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: TraceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Remaining chart-library attributes (line, marker, colorscale, axis refs...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Trace {
    pub fn new(kind: TraceKind) -> Self {
        Self {
            kind,
            x: None,
            y: None,
            z: None,
            name: None,
            mode: None,
            extra: Map::new(),
        }
    }

    /// Point count used for cosmetic decisions: `y` first, then `x`.
    pub fn point_count(&self) -> usize {
        self.y
            .as_ref()
            .or(self.x.as_ref())
            .map(Coordinates::len)
            .unwrap_or(0)
    }

    pub fn has_markers(&self) -> bool {
        self.mode.as_deref().map_or(false, |m| m.contains("markers"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPayload {
    #[serde(rename = "data")]
    pub series: Vec<Trace>,
    pub layout: Map<String, Value>,
    /// Set when the payload is a placeholder; mirrored as a layout annotation
    #[serde(skip)]
    pub diagnostic: Option<String>,
}

impl ChartPayload {
    pub fn is_placeholder(&self) -> bool {
        self.diagnostic.is_some()
    }

    /// `{data, layout}` as the chart library expects it.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trace_serializes_type_and_flattened_extra() {
        let mut t = Trace::new(TraceKind::Contour);
        t.z = Some(Coordinates::Grid(vec![vec![0.1, 0.2], vec![0.3, f64::NAN]]));
        t.extra.insert("colorscale".into(), json!("Viridis"));
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["type"], "contour");
        assert_eq!(v["z"], json!([[0.1, 0.2], [0.3, null]]));
        assert_eq!(v["colorscale"], "Viridis");
        assert!(v.get("x").is_none());
    }

    #[test]
    fn kind_from_type_names() {
        assert_eq!(TraceKind::from_type("Scatter"), Some(TraceKind::Scatter));
        assert_eq!(TraceKind::from_type("heatmap"), Some(TraceKind::Heatmap));
        assert_eq!(TraceKind::from_type("bar"), None);
    }

    #[test]
    fn grid_flattens_row_major() {
        let grid = Coordinates::Grid(vec![vec![1.0, 2.0], vec![3.0]]);
        assert_eq!(grid.into_flat(), Coordinates::Flat(vec![1.0, 2.0, 3.0]));
        let flat = Coordinates::Flat(vec![4.0]);
        assert_eq!(flat.clone().into_flat(), flat);
    }

    #[test]
    fn point_count_prefers_y() {
        let mut t = Trace::new(TraceKind::Scatter);
        t.x = Some(Coordinates::Flat(vec![1.0, 2.0, 3.0]));
        assert_eq!(t.point_count(), 3);
        t.y = Some(Coordinates::Flat(vec![1.0]));
        assert_eq!(t.point_count(), 1);
    }
}
