//! Dashboard assembly with a scripted source standing in for the server.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

use reservoir_dash::assembler::{Assembler, SlotOutcome, SlotStatus};
use reservoir_dash::availability::Availability;
use reservoir_dash::client::{FetchError, VisualizationSource};
use reservoir_dash::render::{RecordingRenderer, RetryBinding};
use reservoir_dash::slots::{standard_slots, Category};

type Step = (u64, Result<Value, FetchError>);

#[derive(Default)]
struct Scripted {
    steps: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    fn push(&self, name: &str, delay_ms: u64, result: Result<Value, FetchError>) {
        self.steps
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back((delay_ms, result));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisualizationSource for Scripted {
    async fn fetch_visualization(&self, _project_id: &str, name: &str) -> Result<Value, FetchError> {
        self.calls.lock().unwrap().push(name.to_string());
        let step = self.steps.lock().unwrap().get_mut(name).and_then(VecDeque::pop_front);
        let Some((delay_ms, result)) = step else {
            return Err(FetchError::Status(404));
        };
        if delay_ms > 0 {
            sleep(Duration::from_millis(delay_ms)).await;
        }
        result
    }
}

fn chart(traces: usize) -> Value {
    let series: Vec<Value> = (0..traces)
        .map(|i| json!({"x": [0, 1, 2], "y": [0.1, 0.2 + i as f64 * 0.1, 0.3], "name": format!("series {}", i)}))
        .collect();
    json!({ "data": series })
}

fn setup() -> (Arc<Scripted>, Arc<RecordingRenderer>, Assembler) {
    let source = Arc::new(Scripted::default());
    let renderer = Arc::new(RecordingRenderer::new());
    let assembler = Assembler::new(source.clone(), renderer.clone());
    (source, renderer, assembler)
}

#[tokio::test]
async fn two_failed_slots_leave_six_charts() {
    let (source, renderer, assembler) = setup();
    let slots = standard_slots();
    for (i, slot) in slots.iter().enumerate() {
        // later slots answer first, so completion order is reversed
        let delay = (slots.len() - i) as u64 * 5;
        match i + 1 {
            3 => source.push(&slot.remote_name, delay, Err(FetchError::Status(500))),
            6 => source.push(
                &slot.remote_name,
                delay,
                Err(FetchError::Network { message: "connection reset".into(), transient: false }),
            ),
            _ => source.push(&slot.remote_name, delay, Ok(chart(2))),
        }
    }

    let report = assembler.assemble("42", &slots, &Availability::All).await;

    let ids: Vec<&str> = report.slots.iter().map(|s| s.slot_id.as_str()).collect();
    let declared: Vec<&str> = slots.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, declared);
    assert_eq!(report.rendered_count(), 6);
    assert_eq!(report.failed_ids(), vec!["saturation-difference", "capillary-pressure"]);

    for slot in &slots {
        let failed = slot.id == "saturation-difference" || slot.id == "capillary-pressure";
        assert_eq!(renderer.chart(&slot.id).is_some(), !failed, "{}", slot.id);
        assert_eq!(renderer.error(&slot.id).is_some(), failed, "{}", slot.id);
    }

    let panel = renderer.error("capillary-pressure").unwrap();
    assert!(panel.message.contains("connection reset"));
    assert_eq!(
        panel.retry,
        RetryBinding {
            slot_id: "capillary-pressure".into(),
            project_id: "42".into(),
            remote_name: "capillary_pressure".into(),
        }
    );

    // the bindings are enough to recover both slots
    source.push("saturation_difference", 0, Ok(chart(1)));
    source.push("capillary_pressure", 0, Ok(chart(3)));
    for binding in report.retry_bindings() {
        let outcome = assembler.retry(binding).await;
        assert!(matches!(outcome, Some(SlotOutcome::Rendered { placeholder: false, .. })));
    }
    assert_eq!(renderer.chart("capillary-pressure").unwrap().series.len(), 3);
    assert_eq!(
        assembler.slot_status("saturation-difference"),
        Some(SlotStatus::Rendered { trace_count: 1, placeholder: false })
    );
}

#[tokio::test]
async fn retry_supersedes_request_in_flight() {
    let (source, renderer, assembler) = setup();
    let slots: Vec<_> = standard_slots().into_iter().filter(|s| s.id == "recovery-factor").collect();
    source.push("recovery_factor", 100, Ok(chart(3)));
    source.push("recovery_factor", 0, Ok(chart(1)));

    let binding = RetryBinding {
        slot_id: "recovery-factor".into(),
        project_id: "5".into(),
        remote_name: "recovery_factor".into(),
    };
    let (report, retried) = tokio::join!(assembler.assemble("5", &slots, &Availability::All), async {
        sleep(Duration::from_millis(10)).await;
        assembler.retry(&binding).await
    });

    assert_eq!(report.outcome("recovery-factor"), Some(&SlotOutcome::Superseded));
    assert_eq!(retried, Some(SlotOutcome::Rendered { trace_count: 1, placeholder: false }));
    // the slow, older answer never reached the renderer
    assert_eq!(renderer.events().len(), 1);
    assert_eq!(renderer.chart("recovery-factor").unwrap().series.len(), 1);
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test]
async fn unavailable_slots_are_not_fetched() {
    let (source, renderer, assembler) = setup();
    for slot in standard_slots() {
        source.push(&slot.remote_name, 0, Ok(chart(1)));
    }
    let descriptor = json!({
        "saturation_profiles": true,
        "recovery_factor": "true",
        "capillary_pressure": null,
        "fractional_flow": 0,
        "relative_permeability": "false"
    });
    let report = assembler
        .assemble("8", &standard_slots(), &Availability::from_value(Some(&descriptor)))
        .await;

    let mut calls = source.calls();
    calls.sort();
    // a key with a null value still counts as present
    assert_eq!(
        calls,
        vec![
            "capillary_pressure".to_string(),
            "recovery_factor".to_string(),
            "saturation_profiles".to_string(),
        ]
    );
    assert_eq!(report.outcome("fractional-flow"), Some(&SlotOutcome::Skipped));
    assert_eq!(assembler.slot_status("relative-permeability"), Some(SlotStatus::Skipped));
    assert_eq!(renderer.events().len(), 3);
}

#[tokio::test]
async fn empty_series_response_is_a_failure() {
    let (source, renderer, assembler) = setup();
    let slots: Vec<_> = standard_slots().into_iter().filter(|s| s.id == "breakthrough-time").collect();
    source.push("breakthrough_time", 0, Ok(json!({"data": []})));

    let report = assembler.assemble("3", &slots, &Availability::All).await;
    match report.outcome("breakthrough-time") {
        Some(SlotOutcome::Failed { message, retry }) => {
            assert!(message.contains("no series"));
            assert_eq!(retry.remote_name, "breakthrough_time");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(renderer.error("breakthrough-time").is_some());
}

#[tokio::test]
async fn reselecting_a_category_relayouts_rendered_charts() {
    let (source, renderer, assembler) = setup();
    for slot in standard_slots() {
        let result = if slot.id == "breakthrough-time" { Err(FetchError::Status(404)) } else { Ok(chart(1)) };
        source.push(&slot.remote_name, 0, result);
    }
    assembler.assemble("11", &standard_slots(), &Availability::All).await;
    assert_eq!(assembler.active(), Some(Category::Saturation));
    let calls_after_assembly = source.calls().len();

    assert_eq!(assembler.select_category(Category::Recovery), vec!["recovery-factor".to_string()]);
    assert_eq!(
        assembler.select_category(Category::Saturation),
        vec![
            "saturation-difference".to_string(),
            "saturation-evolution".to_string(),
            "saturation-profiles".to_string(),
        ]
    );
    assert_eq!(renderer.relayouts().len(), 4);
    // relayout never refetches
    assert_eq!(source.calls().len(), calls_after_assembly);
}
