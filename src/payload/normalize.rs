//! Payload Normalizer: any decoded JSON (or JSON text) to a renderable payload.
//!
//! The input shape is decided once, up front, by [`classify`]. Every later
//! step works on typed traces and never re-inspects the raw value.

use serde_json::{json, Map, Value};

use super::decode::{coords_from_sequence, reconstruct, Reconstructed};
use super::layout::{apply_overrides, deep_merge, default_layout, diagnostic_annotation, push_annotation};
use super::{ChartPayload, Coordinates, Trace, TraceKind};
use crate::logging::{log, log_decode_fallback, log_placeholder, log_shape, obj, v_str, Domain, Level};
use crate::slots::{Category, DashboardSlot, SlotOverrides};

pub const NO_DATA_LABEL: &str = "no data";
pub const UNPARSEABLE: &str = "unparseable payload";
pub const RERUN_SIMULATION: &str = "failed to load, rerun simulation";

/// Scatter series shorter than this are drawn with markers as well.
pub const SMALL_SERIES_POINTS: usize = 20;
pub const DEFAULT_LINE_WIDTH: f64 = 2.0;

/// Where the series array was found.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadShape {
    /// Text input that is not valid JSON
    Unparseable(String),
    Data(Vec<Value>),
    Traces(Vec<Value>),
    Frames(Vec<Value>),
    Unrecognized,
}

impl PayloadShape {
    pub fn label(&self) -> &'static str {
        match self {
            PayloadShape::Unparseable(_) => "unparseable",
            PayloadShape::Data(_) => "data",
            PayloadShape::Traces(_) => "traces",
            PayloadShape::Frames(_) => "frames",
            PayloadShape::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub shape: PayloadShape,
    pub layout: Option<Map<String, Value>>,
}

/// Decide the payload shape. A string is parsed as JSON exactly once.
pub fn classify(raw: Value) -> Classified {
    let value = match raw {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Classified {
                    shape: PayloadShape::Unparseable(e.to_string()),
                    layout: None,
                }
            }
        },
        other => other,
    };

    let Value::Object(mut root) = value else {
        return Classified { shape: PayloadShape::Unrecognized, layout: None };
    };
    let layout = match root.remove("layout") {
        Some(Value::Object(layout)) => Some(layout),
        _ => None,
    };

    let shape = if let Some(Value::Array(series)) = root.remove("data") {
        PayloadShape::Data(series)
    } else if let Some(Value::Array(series)) = root.remove("traces") {
        PayloadShape::Traces(series)
    } else if let Some(series) = first_frame_series(root.remove("frames")) {
        PayloadShape::Frames(series)
    } else {
        PayloadShape::Unrecognized
    };
    Classified { shape, layout }
}

fn first_frame_series(frames: Option<Value>) -> Option<Vec<Value>> {
    let Some(Value::Array(frames)) = frames else {
        return None;
    };
    frames.into_iter().find_map(|frame| match frame {
        Value::Object(mut f) => match f.remove("data") {
            Some(Value::Array(series)) => Some(series),
            _ => None,
        },
        _ => None,
    })
}

fn diagnostic_text(reason: &str, slot_id: &str) -> String {
    if slot_id.is_empty() {
        reason.to_string()
    } else {
        format!("{} (slot {})", reason, slot_id)
    }
}

/// The synthetic single series drawn when nothing could be interpreted.
pub fn placeholder_trace() -> Trace {
    let mut trace = Trace::new(TraceKind::Scatter);
    trace.x = Some(Coordinates::Flat(vec![0.0, 1.0]));
    trace.y = Some(Coordinates::Flat(vec![0.0, 0.0]));
    trace.name = Some(NO_DATA_LABEL.to_string());
    trace.mode = Some("lines".to_string());
    trace.extra.insert("line".into(), json!({"width": DEFAULT_LINE_WIDTH, "dash": "dot"}));
    trace
}

fn existing_diagnostic(layout: &Map<String, Value>) -> Option<String> {
    layout
        .get("annotations")?
        .as_array()?
        .iter()
        .filter_map(|a| a.get("text").and_then(Value::as_str))
        .find(|text| text.starts_with(UNPARSEABLE) || text.starts_with(RERUN_SIMULATION))
        .map(String::from)
}

fn coordinate(field: Option<Value>, axis: &str, index: usize, slot_id: &str) -> Option<Coordinates> {
    match field? {
        Value::Array(items) => Some(coords_from_sequence(&items)),
        Value::Object(wrapper) => match reconstruct(&wrapper) {
            Reconstructed::Coords(coords) => Some(coords),
            Reconstructed::Fallback(coords, reason) => {
                log_decode_fallback(slot_id, index, axis, &reason);
                Some(coords)
            }
            Reconstructed::Absent => {
                log_decode_fallback(slot_id, index, axis, "wrapper without data, original or bdata");
                None
            }
        },
        Value::Null => None,
        other => {
            log_decode_fallback(slot_id, index, axis, &format!("not a sequence: {}", other));
            None
        }
    }
}

fn flat_only(coords: Option<Coordinates>, axis: &str, index: usize, slot_id: &str) -> Option<Coordinates> {
    match coords {
        Some(grid @ Coordinates::Grid(_)) => {
            log(
                Level::Debug,
                Domain::Decode,
                "grid_flattened",
                obj(&[("slot_id", v_str(slot_id)), ("trace_index", json!(index)), ("field", v_str(axis))]),
            );
            Some(grid.into_flat())
        }
        other => other,
    }
}

fn label(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_trace(value: Value, index: usize, slot_id: &str) -> Option<Trace> {
    let Value::Object(mut fields) = value else {
        log(
            Level::Warn,
            Domain::Payload,
            "trace_dropped",
            obj(&[("slot_id", v_str(slot_id)), ("trace_index", json!(index))]),
        );
        return None;
    };

    let declared = fields.remove("type");
    let mut trace = Trace::new(TraceKind::Scatter);
    trace.x = coordinate(fields.remove("x"), "x", index, slot_id);
    trace.y = coordinate(fields.remove("y"), "y", index, slot_id);
    trace.z = coordinate(fields.remove("z"), "z", index, slot_id);
    trace.name = label(fields.remove("name"));
    trace.mode = match fields.remove("mode") {
        Some(Value::String(mode)) => Some(mode),
        _ => None,
    };
    trace.extra = fields;

    trace.kind = match declared.as_ref().and_then(Value::as_str) {
        Some(name) => TraceKind::from_type(name).unwrap_or_else(|| {
            log(
                Level::Debug,
                Domain::Payload,
                "unknown_trace_type",
                obj(&[("slot_id", v_str(slot_id)), ("type", v_str(name))]),
            );
            TraceKind::Scatter
        }),
        None if trace.has_markers() => TraceKind::Scatter,
        None if trace.z.is_some() => TraceKind::Contour,
        None => TraceKind::Scatter,
    };

    // only contour and heatmap `z` may stay a grid
    trace.x = flat_only(trace.x.take(), "x", index, slot_id);
    trace.y = flat_only(trace.y.take(), "y", index, slot_id);
    if !trace.kind.is_field() {
        trace.z = flat_only(trace.z.take(), "z", index, slot_id);
    }

    apply_cosmetics(&mut trace);
    Some(trace)
}

/// Non-destructive: explicit values are never overwritten.
fn apply_cosmetics(trace: &mut Trace) {
    if trace.kind != TraceKind::Scatter {
        return;
    }
    match trace.extra.get_mut("line") {
        None => {
            trace.extra.insert("line".into(), json!({"width": DEFAULT_LINE_WIDTH}));
        }
        Some(Value::Object(line)) => {
            line.entry("width").or_insert(json!(DEFAULT_LINE_WIDTH));
        }
        Some(_) => {}
    }
    if trace.mode.is_none() && trace.point_count() < SMALL_SERIES_POINTS {
        trace.mode = Some("lines+markers".to_string());
    }
}

/// Normalize with the generic layout and no slot overrides.
pub fn normalize(raw: Value, slot_id: &str) -> ChartPayload {
    normalize_with(raw, slot_id, None, None)
}

/// Normalize for a dashboard slot: category defaults plus the slot's overrides.
pub fn normalize_slot(raw: Value, slot: &DashboardSlot) -> ChartPayload {
    normalize_with(raw, &slot.id, Some(slot.category), Some(&slot.overrides))
}

pub fn normalize_with(
    raw: Value,
    slot_id: &str,
    category: Option<Category>,
    overrides: Option<&SlotOverrides>,
) -> ChartPayload {
    let Classified { shape, layout: source_layout } = classify(raw);
    let shape_label = shape.label();

    let (values, mut diagnostic) = match shape {
        PayloadShape::Unparseable(err) => {
            log(
                Level::Warn,
                Domain::Payload,
                "unparseable",
                obj(&[("slot_id", v_str(slot_id)), ("msg", v_str(&err))]),
            );
            (Vec::new(), Some(diagnostic_text(UNPARSEABLE, slot_id)))
        }
        PayloadShape::Data(v) | PayloadShape::Traces(v) | PayloadShape::Frames(v) => (v, None),
        PayloadShape::Unrecognized => (Vec::new(), None),
    };

    let mut series: Vec<Trace> = values
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| normalize_trace(v, i, slot_id))
        .collect();
    log_shape(slot_id, shape_label, series.len());

    if series.is_empty() {
        series.push(placeholder_trace());
        diagnostic.get_or_insert_with(|| diagnostic_text(RERUN_SIMULATION, slot_id));
    } else if diagnostic.is_none() && series.len() == 1 && series[0] == placeholder_trace() {
        // an already-normalized placeholder keeps its diagnostic
        diagnostic = source_layout
            .as_ref()
            .and_then(existing_diagnostic)
            .or_else(|| Some(diagnostic_text(RERUN_SIMULATION, slot_id)));
    }

    let mut layout = default_layout(category);
    if let Some(source) = &source_layout {
        deep_merge(&mut layout, source);
    }
    if let Some(text) = &diagnostic {
        log_placeholder(slot_id, text);
        push_annotation(&mut layout, diagnostic_annotation(text));
    }
    if let Some(overrides) = overrides {
        apply_overrides(&mut layout, &mut series, overrides);
    }

    ChartPayload { series, layout, diagnostic }
}
