//! Layout defaults, merging and slot overrides.

use serde_json::{json, Map, Value};

use super::Trace;
use crate::slots::{Category, SlotOverrides};

fn axis_defaults() -> Value {
    json!({
        "showgrid": true,
        "gridcolor": "#e5e5e5",
        "zeroline": false,
        "linecolor": "#999999",
        "ticks": "outside",
    })
}

/// Baseline layout for a dashboard category.
pub fn default_layout(category: Option<Category>) -> Map<String, Value> {
    let mut layout = Map::new();
    layout.insert("font".into(), json!({"family": "Arial, sans-serif", "size": 12, "color": "#333333"}));
    layout.insert("margin".into(), json!({"l": 60, "r": 30, "t": 60, "b": 60}));
    layout.insert("plot_bgcolor".into(), json!("#ffffff"));
    layout.insert("paper_bgcolor".into(), json!("#ffffff"));
    layout.insert("xaxis".into(), axis_defaults());
    layout.insert("yaxis".into(), axis_defaults());
    layout.insert("legend".into(), json!({"orientation": "h", "x": 0.0, "y": -0.2}));
    layout.insert("hovermode".into(), json!("closest"));

    let (height, legend) = match category {
        Some(Category::Saturation) => (600, None),
        Some(Category::Recovery) => (500, Some(json!({"orientation": "v", "x": 1.0, "xanchor": "right", "y": 0.0, "yanchor": "bottom"}))),
        Some(Category::Pressure) => (500, Some(json!({"orientation": "v", "x": 1.0, "xanchor": "right", "y": 1.0}))),
        Some(Category::Permeability) => (500, Some(json!({"orientation": "v", "x": 0.5, "xanchor": "center", "y": 1.0}))),
        None => (450, None),
    };
    layout.insert("height".into(), json!(height));
    if let Some(legend) = legend {
        layout.insert("legend".into(), legend);
    }
    layout
}

/// Recursively overlay `overlay` onto `base`. Keys present in `overlay` win;
/// nested objects merge, so unrelated keys in `base` survive.
pub fn deep_merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => deep_merge(existing, incoming),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// The object stored under `key`, replacing a missing or non-object value.
fn object_entry<'a>(layout: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    let slot = layout.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut()
}

/// Title text of an axis, whether given as a plain string or `{text}`.
pub fn axis_title<'a>(layout: &'a Map<String, Value>, axis: &str) -> Option<&'a str> {
    match layout.get(axis)?.get("title")? {
        Value::String(s) => Some(s),
        Value::Object(t) => t.get("text").and_then(Value::as_str),
        _ => None,
    }
}

/// Append an annotation unless one with the same text is already present.
pub fn push_annotation(layout: &mut Map<String, Value>, annotation: Value) {
    let entry = layout
        .entry("annotations".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    if let Value::Array(items) = entry {
        let text = annotation.get("text");
        if text.is_some() && items.iter().any(|a| a.get("text") == text) {
            return;
        }
        items.push(annotation);
    }
}

pub fn diagnostic_annotation(text: &str) -> Value {
    json!({
        "text": text,
        "x": 0.5,
        "y": 0.5,
        "xref": "paper",
        "yref": "paper",
        "showarrow": false,
        "font": {"size": 14, "color": "#b02a37"},
    })
}

fn set_axis(layout: &mut Map<String, Value>, axis: &str, title: Option<&str>, range: Option<[f64; 2]>) {
    if title.is_none() && range.is_none() {
        return;
    }
    let Some(axis) = object_entry(layout, axis) else {
        return;
    };
    if let Some(title) = title {
        axis.insert("title".into(), json!({"text": title}));
    }
    if let Some([lo, hi]) = range {
        axis.insert("range".into(), json!([lo, hi]));
        axis.insert("autorange".into(), json!(false));
    }
}

/// Apply slot overrides to a merged layout and its traces.
pub fn apply_overrides(layout: &mut Map<String, Value>, series: &mut [Trace], overrides: &SlotOverrides) {
    let mut x_axes = vec!["xaxis"];
    let mut y_axes = vec!["yaxis"];
    if overrides.secondary_axes {
        x_axes.push("xaxis2");
        y_axes.push("yaxis2");
    }
    for axis in x_axes {
        set_axis(layout, axis, overrides.x_title.as_deref(), overrides.x_range);
    }
    for axis in y_axes {
        set_axis(layout, axis, overrides.y_title.as_deref(), overrides.y_range);
    }

    for trace in series.iter_mut().filter(|t| t.kind.is_field()) {
        if let Some(scale) = &overrides.colorscale {
            trace.extra.insert("colorscale".into(), json!(scale));
        }
        if overrides.diverging {
            trace.extra.insert("zmid".into(), json!(0.0));
        }
        if let (Some(levels), super::TraceKind::Contour) = (&overrides.contours, trace.kind) {
            trace.extra.insert("contours".into(), levels.to_value());
            trace.extra.insert("ncontours".into(), json!(levels.count));
            trace.extra.insert("autocontour".into(), json!(false));
        }
    }

    for annotation in &overrides.annotations {
        push_annotation(layout, annotation.to_value());
    }
    deep_merge(layout, &overrides.layout);
}
