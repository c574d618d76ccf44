//! Dashboard Assembler.
//!
//! Every available slot is fetched concurrently; results are applied by slot
//! id as they arrive. The assembler owns the slot-state map: last request
//! parameters, the current request generation and the last outcome. A result
//! whose generation is no longer current is dropped, so a retry always wins
//! over an older request still in flight.

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::availability::Availability;
use crate::client::{FetchError, VisualizationSource};
use crate::logging::{log, log_slot_outcome, obj, payload_digest, v_str, Domain, Level, ProfileScope};
use crate::payload::{normalize_slot, ChartPayload};
use crate::render::{ChartRenderer, ErrorPanel, RetryBinding};
use crate::slots::{Category, DashboardSlot};

/// Last known state of one slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SlotStatus {
    Pending,
    Skipped,
    Rendered { trace_count: usize, placeholder: bool },
    Failed { message: String },
}

/// What one request did to its slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SlotOutcome {
    /// Not marked available; nothing was fetched or drawn
    Skipped,
    Rendered { trace_count: usize, placeholder: bool },
    Failed { message: String, retry: RetryBinding },
    /// A newer request for the slot was issued before this one finished
    Superseded,
}

impl SlotOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SlotOutcome::Skipped => "skipped",
            SlotOutcome::Rendered { .. } => "rendered",
            SlotOutcome::Failed { .. } => "failed",
            SlotOutcome::Superseded => "superseded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotReport {
    pub slot_id: String,
    pub remote_name: String,
    #[serde(flatten)]
    pub outcome: SlotOutcome,
}

/// Per-slot outcomes in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub project_id: String,
    pub slots: Vec<SlotReport>,
}

impl DashboardReport {
    pub fn outcome(&self, slot_id: &str) -> Option<&SlotOutcome> {
        self.slots.iter().find(|s| s.slot_id == slot_id).map(|s| &s.outcome)
    }

    pub fn rendered_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.outcome, SlotOutcome::Rendered { .. }))
            .count()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| matches!(s.outcome, SlotOutcome::Failed { .. }))
            .map(|s| s.slot_id.as_str())
            .collect()
    }

    pub fn retry_bindings(&self) -> Vec<&RetryBinding> {
        self.slots
            .iter()
            .filter_map(|s| match &s.outcome {
                SlotOutcome::Failed { retry, .. } => Some(retry),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct SlotState {
    slot: DashboardSlot,
    project_id: String,
    generation: u64,
    status: SlotStatus,
}

/// A server answer with nothing to draw counts as a failed retrieval.
pub fn reject_empty_series(body: Value) -> Result<Value, FetchError> {
    let empty = match &body {
        Value::Null => true,
        Value::Object(map) => matches!(map.get("data"), Some(Value::Array(series)) if series.is_empty()),
        _ => false,
    };
    if empty {
        Err(FetchError::EmptySeries)
    } else {
        Ok(body)
    }
}

pub struct Assembler {
    source: Arc<dyn VisualizationSource>,
    renderer: Arc<dyn ChartRenderer>,
    slots: Mutex<BTreeMap<String, SlotState>>,
    active: Mutex<Option<Category>>,
}

impl Assembler {
    pub fn new(source: Arc<dyn VisualizationSource>, renderer: Arc<dyn ChartRenderer>) -> Self {
        Self {
            source,
            renderer,
            slots: Mutex::new(BTreeMap::new()),
            active: Mutex::new(None),
        }
    }

    // A poisoned lock only means a renderer panicked mid-call; the map itself is intact.
    fn state(&self) -> MutexGuard<'_, BTreeMap<String, SlotState>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn active_category(&self) -> MutexGuard<'_, Option<Category>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a new request for the slot and return its generation.
    fn begin(&self, slot: &DashboardSlot, project_id: &str, status: SlotStatus) -> u64 {
        let mut state = self.state();
        let entry = state.entry(slot.id.clone()).or_insert_with(|| SlotState {
            slot: slot.clone(),
            project_id: project_id.to_string(),
            generation: 0,
            status: SlotStatus::Pending,
        });
        entry.slot = slot.clone();
        entry.project_id = project_id.to_string();
        entry.generation += 1;
        entry.status = status;
        entry.generation
    }

    pub async fn assemble(&self, project_id: &str, slots: &[DashboardSlot], availability: &Availability) -> DashboardReport {
        let _scope = ProfileScope::with_context(
            "assemble",
            &[("project_id", v_str(project_id)), ("slot_count", json!(slots.len()))],
        );
        {
            let mut active = self.active_category();
            if active.is_none() {
                *active = slots.first().map(|s| s.category);
            }
        }

        let mut outcomes: HashMap<String, SlotOutcome> = HashMap::new();
        let mut in_flight = FuturesUnordered::new();
        for slot in slots {
            if availability.is_present(&slot.remote_name) {
                let generation = self.begin(slot, project_id, SlotStatus::Pending);
                in_flight.push(self.run_slot(slot.clone(), project_id.to_string(), generation));
            } else {
                self.begin(slot, project_id, SlotStatus::Skipped);
                log_slot_outcome(&slot.id, project_id, &slot.remote_name, "skipped", Value::Null);
                outcomes.insert(slot.id.clone(), SlotOutcome::Skipped);
            }
        }

        // completion order is arbitrary; outcomes are keyed by slot id
        while let Some((slot_id, outcome)) = in_flight.next().await {
            outcomes.insert(slot_id, outcome);
        }

        let report = DashboardReport {
            project_id: project_id.to_string(),
            slots: slots
                .iter()
                .map(|slot| SlotReport {
                    slot_id: slot.id.clone(),
                    remote_name: slot.remote_name.clone(),
                    outcome: outcomes.remove(&slot.id).unwrap_or(SlotOutcome::Superseded),
                })
                .collect(),
        };
        log(
            Level::Info,
            Domain::Dashboard,
            "assembled",
            obj(&[
                ("project_id", v_str(project_id)),
                ("rendered", json!(report.rendered_count())),
                ("failed", json!(report.failed_ids())),
            ]),
        );
        report
    }

    /// Re-issue a slot's retrieval from its retry binding. `None` for an unknown slot.
    pub async fn retry(&self, binding: &RetryBinding) -> Option<SlotOutcome> {
        let slot = self.state().get(&binding.slot_id).map(|s| s.slot.clone())?;
        let slot = DashboardSlot { remote_name: binding.remote_name.clone(), ..slot };
        log(
            Level::Info,
            Domain::Dashboard,
            "retry",
            obj(&[
                ("slot_id", v_str(&binding.slot_id)),
                ("project_id", v_str(&binding.project_id)),
                ("remote_name", v_str(&binding.remote_name)),
            ]),
        );
        let generation = self.begin(&slot, &binding.project_id, SlotStatus::Pending);
        let (_, outcome) = self.run_slot(slot, binding.project_id.clone(), generation).await;
        Some(outcome)
    }

    async fn run_slot(&self, slot: DashboardSlot, project_id: String, generation: u64) -> (String, SlotOutcome) {
        let fetched = self
            .source
            .fetch_visualization(&project_id, &slot.remote_name)
            .await
            .and_then(reject_empty_series);
        let prepared = fetched.map(|body| {
            log(
                Level::Trace,
                Domain::Dashboard,
                "payload_received",
                obj(&[("slot_id", v_str(&slot.id)), ("digest", v_str(&payload_digest(&body)))]),
            );
            normalize_slot(body, &slot)
        });
        let outcome = self.apply(&slot, &project_id, generation, prepared);
        log_slot_outcome(
            &slot.id,
            &project_id,
            &slot.remote_name,
            outcome.label(),
            json!({"generation": generation, "result": outcome}),
        );
        (slot.id, outcome)
    }

    /// Generation check and render happen under the slot-state lock, so a
    /// stale result can never overwrite a newer one.
    fn apply(
        &self,
        slot: &DashboardSlot,
        project_id: &str,
        generation: u64,
        result: Result<ChartPayload, FetchError>,
    ) -> SlotOutcome {
        let mut state = self.state();
        let Some(entry) = state.get_mut(&slot.id) else {
            return SlotOutcome::Superseded;
        };
        if entry.generation != generation {
            return SlotOutcome::Superseded;
        }
        match result {
            Ok(payload) => {
                self.renderer.render(&slot.id, &payload);
                let trace_count = payload.series.len();
                let placeholder = payload.is_placeholder();
                entry.status = SlotStatus::Rendered { trace_count, placeholder };
                SlotOutcome::Rendered { trace_count, placeholder }
            }
            Err(err) => {
                let retry = RetryBinding {
                    slot_id: slot.id.clone(),
                    project_id: project_id.to_string(),
                    remote_name: slot.remote_name.clone(),
                };
                let message = err.to_string();
                self.renderer.render_error(&ErrorPanel {
                    slot_id: slot.id.clone(),
                    message: message.clone(),
                    retry: retry.clone(),
                });
                entry.status = SlotStatus::Failed { message: message.clone() };
                SlotOutcome::Failed { message, retry }
            }
        }
    }

    /// Switch the visible category. Charts already drawn in it get a relayout
    /// signal; nothing is refetched. Returns the relayouted slot ids.
    pub fn select_category(&self, category: Category) -> Vec<String> {
        {
            let mut active = self.active_category();
            if *active == Some(category) {
                return Vec::new();
            }
            *active = Some(category);
        }
        let state = self.state();
        let ids: Vec<String> = state
            .values()
            .filter(|s| s.slot.category == category && matches!(s.status, SlotStatus::Rendered { .. }))
            .map(|s| s.slot.id.clone())
            .collect();
        for id in &ids {
            self.renderer.relayout(id);
        }
        ids
    }

    pub fn active(&self) -> Option<Category> {
        *self.active_category()
    }

    pub fn slot_status(&self, slot_id: &str) -> Option<SlotStatus> {
        self.state().get(slot_id).map(|s| s.status.clone())
    }

    /// Last request parameters of a slot.
    pub fn retry_binding(&self, slot_id: &str) -> Option<RetryBinding> {
        self.state().get(slot_id).map(|s| RetryBinding {
            slot_id: s.slot.id.clone(),
            project_id: s.project_id.clone(),
            remote_name: s.slot.remote_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingRenderer;
    use async_trait::async_trait;

    struct Fixed(Result<Value, FetchError>);

    #[async_trait]
    impl VisualizationSource for Fixed {
        async fn fetch_visualization(&self, _project_id: &str, _name: &str) -> Result<Value, FetchError> {
            self.0.clone()
        }
    }

    fn assembler(result: Result<Value, FetchError>) -> (Assembler, Arc<RecordingRenderer>) {
        let renderer = Arc::new(RecordingRenderer::new());
        (Assembler::new(Arc::new(Fixed(result)), renderer.clone()), renderer)
    }

    #[test]
    fn empty_series_is_rejected() {
        assert_eq!(reject_empty_series(Value::Null), Err(FetchError::EmptySeries));
        assert_eq!(reject_empty_series(json!({"data": []})), Err(FetchError::EmptySeries));
        assert!(reject_empty_series(json!({"data": [{"y": [1]}]})).is_ok());
        assert!(reject_empty_series(json!({"frames": []})).is_ok());
    }

    #[tokio::test]
    async fn failure_carries_retry_binding() {
        let (a, r) = assembler(Err(FetchError::Status(500)));
        let slot = DashboardSlot::new("recovery-factor", "recovery_factor", Category::Recovery);
        let report = a.assemble("9", &[slot], &Availability::All).await;
        match report.outcome("recovery-factor") {
            Some(SlotOutcome::Failed { retry, .. }) => {
                assert_eq!(retry.project_id, "9");
                assert_eq!(retry.remote_name, "recovery_factor");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(r.error("recovery-factor").is_some());
        assert_eq!(a.retry_binding("recovery-factor"), report.retry_bindings().first().cloned().cloned());
    }

    #[tokio::test]
    async fn unknown_slot_cannot_be_retried() {
        let (a, _) = assembler(Ok(json!({"data": [{"y": [1]}]})));
        let binding = RetryBinding {
            slot_id: "nope".into(),
            project_id: "1".into(),
            remote_name: "nope".into(),
        };
        assert_eq!(a.retry(&binding).await, None);
    }

    #[tokio::test]
    async fn placeholder_payload_is_still_rendered() {
        let (a, r) = assembler(Ok(json!({"layout": {}})));
        let slot = DashboardSlot::new("fractional-flow", "fractional_flow", Category::Pressure);
        let report = a.assemble("2", &[slot], &Availability::All).await;
        assert_eq!(
            report.outcome("fractional-flow"),
            Some(&SlotOutcome::Rendered { trace_count: 1, placeholder: true })
        );
        assert!(r.chart("fractional-flow").unwrap().is_placeholder());
    }

    #[tokio::test]
    async fn selecting_active_category_is_a_no_op() {
        let (a, r) = assembler(Ok(json!({"data": [{"y": [1]}]})));
        let slot = DashboardSlot::new("recovery-factor", "recovery_factor", Category::Recovery);
        a.assemble("2", &[slot], &Availability::All).await;
        assert_eq!(a.active(), Some(Category::Recovery));
        assert!(a.select_category(Category::Recovery).is_empty());
        assert!(a.select_category(Category::Saturation).is_empty());
        assert_eq!(a.select_category(Category::Recovery), vec!["recovery-factor".to_string()]);
        assert_eq!(r.relayouts(), vec!["recovery-factor".to_string()]);
    }
}
