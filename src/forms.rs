//! Project form state and the server-side validation contracts.
//!
//! Validation never throws: the server's verdict is turned into per-field
//! feedback, and a failure on one field leaves every other field untouched.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::format::NumberFormat;
use crate::logging::{log, obj, v_str, Domain, Level};

/// Verdict of `POST /api/parameters/check`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterCheck {
    pub valid: bool,
    pub errors: BTreeMap<String, String>,
    pub warnings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum FieldFeedback {
    Error(String),
    Warning(String),
}

impl ParameterCheck {
    /// One message per field; an error hides any warning on the same field.
    pub fn feedback(&self) -> BTreeMap<String, FieldFeedback> {
        let mut out: BTreeMap<String, FieldFeedback> = self
            .warnings
            .iter()
            .map(|(k, v)| (k.clone(), FieldFeedback::Warning(v.clone())))
            .collect();
        for (field, message) in &self.errors {
            out.insert(field.clone(), FieldFeedback::Error(message.clone()));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    RockProperties,
    CapillaryPressure,
    RelativePerm,
    PvtData,
    ProductionData,
}

impl FileType {
    pub const ALL: [FileType; 5] = [
        FileType::RockProperties,
        FileType::CapillaryPressure,
        FileType::RelativePerm,
        FileType::PvtData,
        FileType::ProductionData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::RockProperties => "rock_properties",
            FileType::CapillaryPressure => "capillary_pressure",
            FileType::RelativePerm => "relative_perm",
            FileType::PvtData => "pvt_data",
            FileType::ProductionData => "production_data",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn title(&self) -> &'static str {
        match self {
            FileType::RockProperties => "Rock properties",
            FileType::CapillaryPressure => "Capillary pressure",
            FileType::RelativePerm => "Relative permeability",
            FileType::PvtData => "PVT data",
            FileType::ProductionData => "Production data",
        }
    }
}

/// A file to send to the preview or validation endpoint.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub file_type: Option<FileType>,
}

impl Upload {
    pub fn from_path(path: &Path, file_type: Option<FileType>) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        Ok(Self { file_name, bytes, file_type })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnStat {
    Numeric { min: f64, max: f64, mean: f64 },
    #[serde(alias = "text")]
    Categorical { unique: u64 },
}

/// Response of `POST /api/file/preview`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilePreview {
    pub columns: Vec<String>,
    #[serde(default)]
    pub preview: Vec<Map<String, Value>>,
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub stats: BTreeMap<String, ColumnStat>,
}

impl FilePreview {
    /// Preview rows as display cells, in column order; nulls become empty cells.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.preview
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|col| match row.get(col) {
                        None | Some(Value::Null) => String::new(),
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                    })
                    .collect()
            })
            .collect()
    }

    pub fn stat_lines(&self, fmt: &NumberFormat) -> Vec<String> {
        let mut lines = vec![format!("Total rows: {}", self.total_rows)];
        for (col, stat) in &self.stats {
            lines.push(match stat {
                ColumnStat::Numeric { min, max, mean } => format!(
                    "{}: min = {}, max = {}, mean = {}",
                    col,
                    fmt.fixed(*min, 2),
                    fmt.fixed(*max, 2),
                    fmt.fixed(*mean, 2)
                ),
                ColumnStat::Categorical { unique } => format!("{}: {} unique values", col, unique),
            });
        }
        lines
    }
}

/// Response of `POST /api/file/validate`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileVerdict {
    pub valid: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Basic,
    Carbonate,
}

/// Fields shown only for the dual-porosity carbonate model.
pub const CARBONATE_ONLY: [&str; 5] = [
    "fracture_porosity",
    "matrix_porosity",
    "fracture_permeability",
    "matrix_permeability",
    "shape_factor",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub value: String,
    /// Value of the linked range slider, if the field has one
    pub slider: Option<String>,
    pub feedback: Option<FieldFeedback>,
}

/// Model parameter inputs of the project form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    fields: BTreeMap<String, FormField>,
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, name: &str, value: &str, with_slider: bool) {
        self.fields.insert(
            name.to_string(),
            FormField {
                value: value.to_string(),
                slider: with_slider.then(|| value.to_string()),
                feedback: None,
            },
        );
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.get(name)
    }

    /// Typing into the input moves its slider too.
    pub fn set_field(&mut self, name: &str, value: &str) -> bool {
        let Some(field) = self.fields.get_mut(name) else {
            return false;
        };
        field.value = value.to_string();
        if let Some(slider) = field.slider.as_mut() {
            *slider = value.to_string();
        }
        true
    }

    /// Dragging the slider updates the input.
    pub fn set_slider(&mut self, name: &str, value: &str) -> bool {
        match self.fields.get_mut(name) {
            Some(field) if field.slider.is_some() => {
                field.slider = Some(value.to_string());
                field.value = value.to_string();
                true
            }
            _ => false,
        }
    }

    /// Fill fields from a rock preset; unknown parameters are ignored.
    /// Returns the names that were applied.
    pub fn apply_preset(&mut self, preset: &Map<String, Value>) -> Vec<String> {
        let mut applied = Vec::new();
        for (name, value) in preset {
            match display_value(value) {
                Some(text) if self.set_field(name, &text) => applied.push(name.clone()),
                _ => log(
                    Level::Debug,
                    Domain::Form,
                    "preset_field_ignored",
                    obj(&[("field", v_str(name))]),
                ),
            }
        }
        applied
    }

    /// Flat name → value mapping, as sent to the parameter check.
    pub fn values(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, f)| (k.clone(), Value::String(f.value.clone())))
            .collect()
    }

    pub fn visible_fields(&self, model: ModelType) -> Vec<&str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|name| model == ModelType::Carbonate || !CARBONATE_ONLY.contains(name))
            .collect()
    }

    /// Replace all field feedback with the verdict's. Returns whether the form may be submitted.
    pub fn apply_check(&mut self, check: &ParameterCheck) -> bool {
        let feedback = check.feedback();
        for (name, field) in self.fields.iter_mut() {
            field.feedback = feedback.get(name).cloned();
        }
        for name in feedback.keys().filter(|n| !self.fields.contains_key(*n)) {
            log(
                Level::Debug,
                Domain::Form,
                "feedback_for_unknown_field",
                obj(&[("field", v_str(name))]),
            );
        }
        check.valid && check.errors.is_empty()
    }
}
