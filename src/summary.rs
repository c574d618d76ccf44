//! Results and model-parameter summaries, rendered to HTML.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Write;

use crate::format::NumberFormat;
use crate::logging::{log, obj, v_str, Domain, Level};

pub const NO_DATA_NOTICE: &str = "No data to display";

/// One quantity computed with and without capillary effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CapPair {
    pub with_cap: Option<f64>,
    pub without_cap: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecoveryCurves {
    pub time: Vec<f64>,
    pub with_cap: Vec<f64>,
    pub without_cap: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontParameters {
    pub velocity: CapPair,
    pub transition_width: CapPair,
}

/// The parts of a result set the summary tables read. Each part is parsed on
/// its own so one ill-shaped entry does not hide the others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationResults {
    pub breakthrough_time: Option<CapPair>,
    pub recovery_factor: Option<RecoveryCurves>,
    pub front_parameters: Option<FrontParameters>,
}

fn part<T: for<'de> Deserialize<'de>>(results: &Value, key: &str) -> Option<T> {
    let raw = results.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(raw.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log(
                Level::Debug,
                Domain::Dashboard,
                "results_part_ignored",
                obj(&[("part", v_str(key)), ("msg", v_str(&e.to_string()))]),
            );
            None
        }
    }
}

impl SimulationResults {
    pub fn from_value(results: &Value) -> Self {
        Self {
            breakthrough_time: part(results, "breakthrough_time"),
            recovery_factor: part(results, "recovery_factor"),
            front_parameters: part(results, "front_parameters"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub label: String,
    pub without_cap: f64,
    pub with_cap: f64,
    pub decimals: usize,
}

impl ComparisonRow {
    pub fn difference(&self) -> f64 {
        self.with_cap - self.without_cap
    }

    /// Without-cap, with-cap and "difference (percent%)" cells.
    pub fn cells(&self, fmt: &NumberFormat) -> [String; 3] {
        let percent = fmt
            .percent_change(self.without_cap, self.with_cap, 1)
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "n/a".to_string());
        [
            fmt.fixed(self.without_cap, self.decimals),
            fmt.fixed(self.with_cap, self.decimals),
            format!("{} ({})", fmt.fixed(self.difference(), self.decimals), percent),
        ]
    }
}

/// Comparison of the runs with and without capillary effects.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsSummary {
    pub rows: Vec<ComparisonRow>,
}

impl ResultsSummary {
    /// `None` when breakthrough time or the recovery curves are missing.
    pub fn from_results(results: &SimulationResults, fmt: &NumberFormat) -> Option<Self> {
        let breakthrough = results.breakthrough_time?;
        let recovery = results.recovery_factor.as_ref()?;
        let last = recovery.time.len().checked_sub(1)?;
        let day = recovery.time[last];

        let mut rows = vec![
            ComparisonRow {
                label: "Water breakthrough time, days".to_string(),
                without_cap: breakthrough.without_cap.unwrap_or(0.0),
                with_cap: breakthrough.with_cap.unwrap_or(0.0),
                decimals: 1,
            },
            ComparisonRow {
                label: format!("Recovery factor at day {}, fraction", fmt.fixed(day, 0)),
                without_cap: recovery.without_cap.get(last).copied().unwrap_or(f64::NAN),
                with_cap: recovery.with_cap.get(last).copied().unwrap_or(f64::NAN),
                decimals: 3,
            },
        ];
        if let Some(front) = &results.front_parameters {
            rows.push(ComparisonRow {
                label: "Front velocity, m/day".to_string(),
                without_cap: front.velocity.without_cap.unwrap_or(0.0),
                with_cap: front.velocity.with_cap.unwrap_or(0.0),
                decimals: 2,
            });
            rows.push(ComparisonRow {
                label: "Transition zone width, m".to_string(),
                without_cap: front.transition_width.without_cap.unwrap_or(0.0),
                with_cap: front.transition_width.with_cap.unwrap_or(0.0),
                decimals: 1,
            });
        }
        Some(Self { rows })
    }

    pub fn to_html(&self, fmt: &NumberFormat) -> String {
        let mut buf = String::new();
        buf.push_str(
            "<table class=\"results-summary\"><thead><tr><th>Parameter</th>\
             <th>Without capillary effects</th><th>With capillary effects</th>\
             <th>Difference</th></tr></thead><tbody>",
        );
        for row in &self.rows {
            let [without, with, diff] = row.cells(fmt);
            let _ = write!(
                buf,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                esc(&row.label),
                esc(&without),
                esc(&with),
                esc(&diff)
            );
        }
        buf.push_str("</tbody></table>");
        buf
    }
}

struct ParamInfo {
    name: &'static str,
    description: &'static str,
    unit: &'static str,
}

const fn info(name: &'static str, description: &'static str, unit: &'static str) -> ParamInfo {
    ParamInfo { name, description, unit }
}

const PARAMETER_CATEGORIES: [(&str, &[ParamInfo]); 4] = [
    (
        "Reservoir",
        &[info("length", "Reservoir length", "m"), info("porosity", "Porosity", "fraction")],
    ),
    (
        "Fluids",
        &[
            info("mu_oil", "Oil viscosity", "mPa·s"),
            info("mu_water", "Water viscosity", "mPa·s"),
            info("initial_water_saturation", "Initial water saturation", "fraction"),
            info("residual_oil_saturation", "Residual oil saturation", "fraction"),
        ],
    ),
    (
        "Capillary",
        &[
            info("entry_pressure", "Entry pressure", "MPa"),
            info("pore_distribution_index", "Pore size distribution index", "dimensionless"),
            info("wettability_factor", "Wettability factor", "dimensionless"),
        ],
    ),
    (
        "Carbonate model",
        &[
            info("fracture_porosity", "Fracture porosity", "fraction"),
            info("matrix_porosity", "Matrix porosity", "fraction"),
            info("fracture_permeability", "Fracture permeability", "mD"),
            info("matrix_permeability", "Matrix permeability", "mD"),
            info("shape_factor", "Shape factor", "dimensionless"),
        ],
    ),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRow {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSection {
    pub title: String,
    pub rows: Vec<ParameterRow>,
}

/// Model parameters grouped by category; empty categories are left out.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSummary {
    pub sections: Vec<ParameterSection>,
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => f64::NAN,
    }
}

impl ParameterSummary {
    pub const DECIMALS: usize = 3;

    pub fn from_parameters(parameters: &Map<String, Value>) -> Self {
        let sections = PARAMETER_CATEGORIES
            .iter()
            .filter_map(|(title, params)| {
                let rows: Vec<ParameterRow> = params
                    .iter()
                    .filter_map(|p| {
                        parameters.get(p.name).map(|v| ParameterRow {
                            name: p.name.to_string(),
                            description: p.description.to_string(),
                            unit: p.unit.to_string(),
                            value: numeric(v),
                        })
                    })
                    .collect();
                (!rows.is_empty()).then(|| ParameterSection { title: title.to_string(), rows })
            })
            .collect();
        Self { sections }
    }

    pub fn to_html(&self, fmt: &NumberFormat) -> String {
        let mut buf = String::new();
        for section in &self.sections {
            let _ = write!(
                buf,
                "<section class=\"parameters\"><h5>{}</h5><table><thead><tr>\
                 <th>Parameter</th><th>Value</th><th>Unit</th></tr></thead><tbody>",
                esc(&section.title)
            );
            for row in &section.rows {
                let _ = write!(
                    buf,
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    esc(&row.description),
                    esc(&fmt.fixed(row.value, Self::DECIMALS)),
                    esc(&row.unit)
                );
            }
            buf.push_str("</tbody></table></section>");
        }
        buf
    }
}

fn notice() -> String {
    format!("<div class=\"notice\">{}</div>", esc(NO_DATA_NOTICE))
}

/// Contents of the results-summary container.
pub fn results_summary_html(results: &SimulationResults, fmt: &NumberFormat) -> String {
    match ResultsSummary::from_results(results, fmt) {
        Some(summary) => summary.to_html(fmt),
        None => notice(),
    }
}

/// Contents of the parameters-summary container.
pub fn parameter_summary_html(parameters: Option<&Map<String, Value>>, fmt: &NumberFormat) -> String {
    match parameters {
        Some(p) => ParameterSummary::from_parameters(p).to_html(fmt),
        None => notice(),
    }
}

/// Standalone page with both summaries.
pub fn summary_page(
    project_id: &str,
    results: &SimulationResults,
    parameters: Option<&Map<String, Value>>,
    fmt: &NumberFormat,
) -> String {
    let mut buf = String::with_capacity(8 * 1024);
    let _ = write!(
        buf,
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Project {}</title>\
         <style>table{{border-collapse:collapse}}td,th{{padding:4px 8px;border-bottom:1px solid #ddd;text-align:left}}\
         .notice{{font-style:italic;opacity:0.8}}</style></head><body>",
        esc(project_id)
    );
    let _ = write!(
        buf,
        "<div id=\"results-summary\">{}</div><div id=\"model-parameters-summary\">{}</div>",
        results_summary_html(results, fmt),
        parameter_summary_html(parameters, fmt)
    );
    buf.push_str("</body></html>");
    buf
}

/// Escape text for HTML.
pub fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
