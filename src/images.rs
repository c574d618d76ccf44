//! Static chart images rendered server-side (PNG/SVG).

use serde::Deserialize;
use std::collections::BTreeMap;

/// Response of `GET /api/project/{id}/images`: format → (name → path).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageIndex {
    #[serde(default)]
    pub images: BTreeMap<String, BTreeMap<String, String>>,
}

impl ImageIndex {
    /// Image names available in `format`, sorted.
    pub fn names(&self, format: &str) -> Vec<&str> {
        self.images
            .get(format)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self, format: &str) -> bool {
        self.names(format).is_empty()
    }
}

/// Human-readable title of an image name.
pub fn display_name(name: &str) -> String {
    let spaced = name.replace(|c: char| c == '_' || c == '-', " ");
    let known = match spaced.as_str() {
        "saturation profiles" => Some("Saturation profiles"),
        "saturation difference" => Some("Saturation difference"),
        "saturation evolution" => Some("Saturation evolution"),
        "recovery factor" => Some("Recovery factor"),
        "breakthrough time" => Some("Water breakthrough time"),
        "capillary pressure" => Some("Capillary pressure"),
        "fractional flow" => Some("Buckley-Leverett fractional flow"),
        "relative permeability" => Some("Relative permeability"),
        _ => None,
    };
    if let Some(title) = known {
        return title.to_string();
    }
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Path of an image file, relative to the server origin.
pub fn image_path(project_id: &str, name: &str, format: &str) -> String {
    format!("/project/{}/image/{}.{}", project_id, name, format)
}

/// Path of the attachment download for an image.
pub fn download_path(project_id: &str, name: &str, format: &str) -> String {
    format!("/project/{}/download/image/{}/{}", project_id, format, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_per_format() {
        let idx: ImageIndex = serde_json::from_value(json!({
            "images": {
                "png": {"recovery_factor": "results/3/recovery_factor.png", "capillary_pressure": "p"},
                "svg": {}
            }
        }))
        .unwrap();
        assert_eq!(idx.names("png"), vec!["capillary_pressure", "recovery_factor"]);
        assert!(idx.is_empty("svg"));
        assert!(idx.is_empty("pdf"));
    }

    #[test]
    fn missing_images_key_is_empty() {
        let idx: ImageIndex = serde_json::from_value(json!({})).unwrap();
        assert!(idx.is_empty("png"));
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("fractional_flow"), "Buckley-Leverett fractional flow");
        assert_eq!(display_name("saturation-profiles"), "Saturation profiles");
        assert_eq!(display_name("pressure_map_2"), "Pressure map 2");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn urls() {
        assert_eq!(image_path("4", "recovery_factor", "png"), "/project/4/image/recovery_factor.png");
        assert_eq!(download_path("4", "recovery_factor", "svg"), "/project/4/download/image/svg/recovery_factor");
    }
}
