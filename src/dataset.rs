//! Input handed over by the server-rendered page: a project id and the
//! serialized results object of its latest run.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{Map, Value};

use crate::availability::Availability;
use crate::summary::SimulationResults;

#[derive(Debug, Clone, PartialEq)]
pub struct PageDataset {
    pub project_id: String,
    pub results: Value,
}

impl PageDataset {
    /// Both attributes must be present and `results` must be a JSON object.
    pub fn parse(project_id: Option<&str>, results: Option<&str>) -> Result<Self> {
        let project_id = project_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("dataset is missing projectId"))?;
        let text = results.ok_or_else(|| anyhow!("dataset is missing results"))?;
        let results: Value = serde_json::from_str(text).context("results is not valid JSON")?;
        if !results.is_object() {
            bail!("results must be a JSON object, got {}", kind(&results));
        }
        Ok(Self { project_id: project_id.to_string(), results })
    }

    /// Dataset for a project with no embedded results: every slot is attempted.
    pub fn without_results(project_id: &str) -> Self {
        Self { project_id: project_id.to_string(), results: Value::Object(Map::new()) }
    }

    pub fn visualizations(&self) -> Availability {
        Availability::from_value(self.results.get("visualizations"))
    }

    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        self.results.get("parameters").and_then(Value::as_object)
    }

    pub fn simulation(&self) -> SimulationResults {
        SimulationResults::from_value(&self.results)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
