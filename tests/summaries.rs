//! Summary tables, dataset parsing and the page output.

use serde_json::json;

use reservoir_dash::dataset::PageDataset;
use reservoir_dash::format::NumberFormat;
use reservoir_dash::summary::{
    parameter_summary_html, results_summary_html, summary_page, ParameterSummary, ResultsSummary,
    SimulationResults, NO_DATA_NOTICE,
};

fn results() -> serde_json::Value {
    json!({
        "breakthrough_time": {"with_cap": 52.0, "without_cap": 40.0},
        "recovery_factor": {
            "time": [0.0, 50.0, 100.0],
            "with_cap": [0.0, 0.31, 0.4567],
            "without_cap": [0.0, 0.28, 0.4]
        },
        "front_parameters": {
            "velocity": {"with_cap": 0.9, "without_cap": 1.2},
            "transition_width": {"with_cap": 12.5, "without_cap": 0.0}
        },
        "parameters": {
            "length": 1000,
            "porosity": 0.2,
            "entry_pressure": "0.5",
            "unknown_knob": 7
        },
        "visualizations": {"recovery_factor": true}
    })
}

#[test]
fn results_table_rows_and_precision() {
    let fmt = NumberFormat::en();
    let summary = ResultsSummary::from_results(&SimulationResults::from_value(&results()), &fmt).unwrap();
    assert_eq!(summary.rows.len(), 4);

    assert_eq!(summary.rows[0].cells(&fmt), ["40.0".to_string(), "52.0".to_string(), "12.0 (30.0%)".to_string()]);
    assert_eq!(summary.rows[1].label, "Recovery factor at day 100, fraction");
    assert_eq!(summary.rows[1].cells(&fmt)[0], "0.400");
    assert_eq!(summary.rows[1].cells(&fmt)[1], "0.457");
    assert_eq!(summary.rows[2].cells(&fmt)[2], "-0.30 (-25.0%)");
    // zero baseline
    assert_eq!(summary.rows[3].cells(&fmt)[2], "12.5 (n/a)");
}

#[test]
fn front_rows_are_optional() {
    let mut r = results();
    r.as_object_mut().unwrap().remove("front_parameters");
    let summary = ResultsSummary::from_results(&SimulationResults::from_value(&r), &NumberFormat::en()).unwrap();
    assert_eq!(summary.rows.len(), 2);
}

#[test]
fn missing_results_render_notice() {
    let fmt = NumberFormat::ru();
    let html = results_summary_html(&SimulationResults::from_value(&json!({"recovery_factor": null})), &fmt);
    assert!(html.contains(NO_DATA_NOTICE));
    assert!(!html.contains("<table"));
    assert!(parameter_summary_html(None, &fmt).contains(NO_DATA_NOTICE));
}

#[test]
fn ru_locale_in_html() {
    let html = results_summary_html(&SimulationResults::from_value(&results()), &NumberFormat::ru());
    assert!(html.contains("<td>40,0</td>"));
    assert!(html.contains("12,0 (30,0%)"));
}

#[test]
fn parameter_summary_skips_empty_categories() {
    let r = results();
    let summary = ParameterSummary::from_parameters(r["parameters"].as_object().unwrap());
    let titles: Vec<&str> = summary.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Reservoir", "Capillary"]);
    assert_eq!(summary.sections[1].rows[0].value, 0.5);

    let html = summary.to_html(&NumberFormat::ru());
    assert!(html.contains("1\u{a0}000,000"));
    assert!(html.contains("0,200"));
    assert!(!html.contains("unknown_knob"));
    assert!(!html.contains("Carbonate"));
}

#[test]
fn page_from_dataset() {
    let text = results().to_string();
    let ds = PageDataset::parse(Some("17"), Some(&text)).unwrap();
    assert!(ds.visualizations().is_present("recovery_factor"));
    assert!(!ds.visualizations().is_present("capillary_pressure"));

    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("summary.html");
    let page = summary_page(&ds.project_id, &ds.simulation(), ds.parameters(), &NumberFormat::en());
    std::fs::write(&path, &page).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("<!doctype html>"));
    assert!(written.contains("id=\"results-summary\""));
    assert!(written.contains("id=\"model-parameters-summary\""));
    assert!(written.contains("Project 17"));
}
