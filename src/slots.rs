//! Dashboard slot declarations.
//!
//! A slot maps one chart region to one remote visualization name, and carries
//! the presentation overrides applied after normalization.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Saturation,
    Recovery,
    Pressure,
    Permeability,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Saturation,
        Category::Recovery,
        Category::Pressure,
        Category::Permeability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Saturation => "saturation",
            Category::Recovery => "recovery",
            Category::Pressure => "pressure",
            Category::Permeability => "permeability",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// Fixed contour levels, independent of the data extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContourLevels {
    pub start: f64,
    pub end: f64,
    pub count: u32,
}

impl ContourLevels {
    pub fn size(&self) -> f64 {
        (self.end - self.start) / self.count.max(1) as f64
    }

    pub fn to_value(&self) -> Value {
        json!({"start": self.start, "end": self.end, "size": self.size()})
    }
}

/// Text placed in paper coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

impl Annotation {
    pub fn to_value(&self) -> Value {
        json!({
            "text": self.text,
            "x": self.x,
            "y": self.y,
            "xref": "paper",
            "yref": "paper",
            "showarrow": false,
            "font": {"size": 13},
        })
    }
}

/// Per-slot presentation overrides. Every key set here wins over both the
/// category defaults and whatever layout the payload carried.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotOverrides {
    pub x_title: Option<String>,
    pub y_title: Option<String>,
    pub x_range: Option<[f64; 2]>,
    pub y_range: Option<[f64; 2]>,
    /// Apply axis titles and ranges to `xaxis2`/`yaxis2` as well (dual panels)
    pub secondary_axes: bool,
    pub colorscale: Option<String>,
    /// Center the color scale on zero
    pub diverging: bool,
    pub contours: Option<ContourLevels>,
    pub annotations: Vec<Annotation>,
    /// Raw layout keys merged last
    pub layout: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSlot {
    pub id: String,
    pub remote_name: String,
    pub category: Category,
    #[serde(default)]
    pub overrides: SlotOverrides,
}

impl DashboardSlot {
    pub fn new(id: &str, remote_name: &str, category: Category) -> Self {
        Self {
            id: id.to_string(),
            remote_name: remote_name.to_string(),
            category,
            overrides: SlotOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: SlotOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Saturation and permeability are fractions.
pub const UNIT_RANGE: [f64; 2] = [0.0, 1.0];

/// Level set of the saturation-evolution reference rendering.
pub const EVOLUTION_LEVELS: ContourLevels = ContourLevels { start: 0.2, end: 0.8, count: 20 };

const DISTANCE: &str = "Distance, m";
const TIME_DAYS: &str = "Time, days";
const WATER_SATURATION: &str = "Water saturation, fraction";

fn titles(x: &str, y: &str) -> SlotOverrides {
    SlotOverrides {
        x_title: Some(x.to_string()),
        y_title: Some(y.to_string()),
        ..Default::default()
    }
}

fn panel_titles(left: &str, right: &str) -> Vec<Annotation> {
    vec![
        Annotation { text: left.to_string(), x: 0.22, y: 1.06 },
        Annotation { text: right.to_string(), x: 0.78, y: 1.06 },
    ]
}

/// The eight charts of the results dashboard, in tab order.
pub fn standard_slots() -> Vec<DashboardSlot> {
    use Category::*;
    vec![
        DashboardSlot::new("saturation-profiles", "saturation_profiles", Saturation).with_overrides(
            SlotOverrides {
                y_range: Some(UNIT_RANGE),
                ..titles(DISTANCE, WATER_SATURATION)
            },
        ),
        DashboardSlot::new("saturation-evolution", "saturation_evolution", Saturation).with_overrides(
            SlotOverrides {
                secondary_axes: true,
                colorscale: Some("Viridis".to_string()),
                contours: Some(EVOLUTION_LEVELS),
                annotations: panel_titles("Without capillary effects", "With capillary effects"),
                ..titles(DISTANCE, TIME_DAYS)
            },
        ),
        DashboardSlot::new("saturation-difference", "saturation_difference", Saturation).with_overrides(
            SlotOverrides {
                colorscale: Some("RdBu".to_string()),
                diverging: true,
                ..titles(DISTANCE, TIME_DAYS)
            },
        ),
        DashboardSlot::new("recovery-factor", "recovery_factor", Recovery)
            .with_overrides(titles(TIME_DAYS, "Recovery factor, fraction")),
        DashboardSlot::new("breakthrough-time", "breakthrough_time", Recovery).with_overrides(SlotOverrides {
            y_title: Some(TIME_DAYS.to_string()),
            ..Default::default()
        }),
        DashboardSlot::new("capillary-pressure", "capillary_pressure", Pressure).with_overrides(SlotOverrides {
            x_range: Some(UNIT_RANGE),
            ..titles(WATER_SATURATION, "Capillary pressure, MPa")
        }),
        DashboardSlot::new("fractional-flow", "fractional_flow", Pressure).with_overrides(SlotOverrides {
            x_range: Some(UNIT_RANGE),
            y_range: Some(UNIT_RANGE),
            ..titles(WATER_SATURATION, "Water fractional flow, fraction")
        }),
        DashboardSlot::new("relative-permeability", "relative_permeability", Permeability).with_overrides(
            SlotOverrides {
                x_range: Some(UNIT_RANGE),
                y_range: Some(UNIT_RANGE),
                ..titles(WATER_SATURATION, "Relative permeability, fraction")
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn standard_slots_are_unique_and_complete() {
        let slots = standard_slots();
        assert_eq!(slots.len(), 8);
        let ids: HashSet<_> = slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 8);
        for cat in Category::ALL {
            assert!(slots.iter().any(|s| s.category == cat), "{:?} has no slot", cat);
        }
    }

    #[test]
    fn evolution_levels_are_fixed() {
        assert_eq!(EVOLUTION_LEVELS.count, 20);
        assert!((EVOLUTION_LEVELS.size() - 0.03).abs() < 1e-12);
    }

    #[test]
    fn overrides_deserialize_with_defaults() {
        let o: SlotOverrides = serde_json::from_value(json!({"x_title": "B", "y_range": [0, 1]})).unwrap();
        assert_eq!(o.x_title.as_deref(), Some("B"));
        assert_eq!(o.y_range, Some([0.0, 1.0]));
        assert!(o.annotations.is_empty());
    }

    #[test]
    fn category_round_trip_names() {
        for cat in Category::ALL {
            assert_eq!(Category::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(Category::parse("images"), None);
    }
}
