//! Chart rendering collaborator.
//!
//! The assembler never draws anything itself. It hands normalized payloads
//! and error panels to a `ChartRenderer`, keyed by slot id.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::logging::{log, obj, payload_digest, v_str, Domain, Level};
use crate::payload::ChartPayload;

/// Everything needed to re-issue one slot's retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryBinding {
    pub slot_id: String,
    pub project_id: String,
    pub remote_name: String,
}

/// Inline error state scoped to a single slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPanel {
    pub slot_id: String,
    pub message: String,
    pub retry: RetryBinding,
}

pub trait ChartRenderer: Send + Sync {
    fn render(&self, slot_id: &str, payload: &ChartPayload);
    fn render_error(&self, panel: &ErrorPanel);
    /// Layout recalculation for an already drawn chart; no data changes.
    fn relayout(&self, slot_id: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Chart { slot_id: String, payload: ChartPayload },
    Error(ErrorPanel),
    Relayout(String),
}

impl RenderEvent {
    pub fn slot_id(&self) -> &str {
        match self {
            RenderEvent::Chart { slot_id, .. } => slot_id,
            RenderEvent::Error(panel) => &panel.slot_id,
            RenderEvent::Relayout(slot_id) => slot_id,
        }
    }
}

/// Keeps every call in memory, in call order.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Latest chart drawn into a slot, if any.
    pub fn chart(&self, slot_id: &str) -> Option<ChartPayload> {
        self.events().into_iter().rev().find_map(|e| match e {
            RenderEvent::Chart { slot_id: id, payload } if id == slot_id => Some(payload),
            _ => None,
        })
    }

    pub fn error(&self, slot_id: &str) -> Option<ErrorPanel> {
        self.events().into_iter().rev().find_map(|e| match e {
            RenderEvent::Error(panel) if panel.slot_id == slot_id => Some(panel),
            _ => None,
        })
    }

    pub fn relayouts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Relayout(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: RenderEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ChartRenderer for RecordingRenderer {
    fn render(&self, slot_id: &str, payload: &ChartPayload) {
        self.push(RenderEvent::Chart { slot_id: slot_id.to_string(), payload: payload.clone() });
    }

    fn render_error(&self, panel: &ErrorPanel) {
        self.push(RenderEvent::Error(panel.clone()));
    }

    fn relayout(&self, slot_id: &str) {
        self.push(RenderEvent::Relayout(slot_id.to_string()));
    }
}

/// Writes `<slot_id>.json` per chart and `<slot_id>.error.json` per error panel.
/// A slot holds one of the two at a time.
pub struct DirRenderer {
    dir: PathBuf,
}

impl DirRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn chart_path(&self, slot_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot_id))
    }

    pub fn error_path(&self, slot_id: &str) -> PathBuf {
        self.dir.join(format!("{}.error.json", slot_id))
    }

    fn write(&self, slot_id: &str, path: &Path, stale: &Path, body: &serde_json::Value) -> Result<()> {
        let text = serde_json::to_string_pretty(body)?;
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        if stale.exists() {
            fs::remove_file(stale).with_context(|| format!("removing {}", stale.display()))?;
        }
        log(
            Level::Debug,
            Domain::Dashboard,
            "slot_written",
            obj(&[("slot_id", v_str(slot_id)), ("path", v_str(&path.display().to_string()))]),
        );
        Ok(())
    }

    fn report(slot_id: &str, result: Result<()>) {
        if let Err(e) = result {
            log(
                Level::Error,
                Domain::Dashboard,
                "render_write_failed",
                obj(&[("slot_id", v_str(slot_id)), ("msg", v_str(&format!("{:#}", e)))]),
            );
        }
    }
}

impl ChartRenderer for DirRenderer {
    fn render(&self, slot_id: &str, payload: &ChartPayload) {
        let body = payload.to_value();
        log(
            Level::Trace,
            Domain::Dashboard,
            "render",
            obj(&[("slot_id", v_str(slot_id)), ("digest", v_str(&payload_digest(&body)))]),
        );
        let result = self.write(slot_id, &self.chart_path(slot_id), &self.error_path(slot_id), &body);
        Self::report(slot_id, result);
    }

    fn render_error(&self, panel: &ErrorPanel) {
        let result = serde_json::to_value(panel)
            .map_err(anyhow::Error::from)
            .and_then(|body| {
                self.write(&panel.slot_id, &self.error_path(&panel.slot_id), &self.chart_path(&panel.slot_id), &body)
            });
        Self::report(&panel.slot_id, result);
    }

    fn relayout(&self, slot_id: &str) {
        log(Level::Info, Domain::Dashboard, "relayout", obj(&[("slot_id", v_str(slot_id))]));
    }
}
