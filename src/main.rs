use anyhow::{bail, Context, Result};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use reservoir_dash::assembler::Assembler;
use reservoir_dash::client::HttpApi;
use reservoir_dash::config::Config;
use reservoir_dash::dataset::PageDataset;
use reservoir_dash::images::{display_name, image_path};
use reservoir_dash::logging::{log, obj, v_str, Domain, Level};
use reservoir_dash::render::DirRenderer;
use reservoir_dash::slots::standard_slots;
use reservoir_dash::summary::summary_page;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(project_id) = args.next() else {
        bail!("usage: reservoir_dash <project_id> [results.json]");
    };
    let results_text = match args.next() {
        Some(path) => Some(std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?),
        None => None,
    };

    let cfg = Config::from_env();
    let dataset = match results_text.as_deref() {
        Some(text) => PageDataset::parse(Some(&project_id), Some(text))?,
        None => PageDataset::without_results(&project_id),
    };
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("project_id", v_str(&dataset.project_id)),
            ("base_url", v_str(&cfg.base_url)),
            ("out_dir", v_str(&cfg.out_dir)),
        ]),
    );

    let out_dir = PathBuf::from(&cfg.out_dir).join(&dataset.project_id);
    let renderer = Arc::new(DirRenderer::new(&out_dir)?);
    let api = Arc::new(HttpApi::new(&cfg)?);
    let assembler = Assembler::new(api.clone(), renderer);

    let slots = standard_slots();
    let report = assembler.assemble(&dataset.project_id, &slots, &dataset.visualizations()).await;
    for slot in &report.slots {
        println!("{}", serde_json::to_string(slot)?);
    }

    // one retry round for failed slots
    for binding in report.retry_bindings() {
        if let Some(outcome) = assembler.retry(binding).await {
            println!("{}", json!({"slot_id": binding.slot_id, "retry": outcome}));
        }
    }

    match api.images(&dataset.project_id).await {
        Ok(index) => {
            for name in index.names("png") {
                log(
                    Level::Info,
                    Domain::System,
                    "image",
                    obj(&[
                        ("name", v_str(name)),
                        ("title", v_str(&display_name(name))),
                        ("path", v_str(&image_path(&dataset.project_id, name, "png"))),
                    ]),
                );
            }
        }
        Err(e) => log(Level::Warn, Domain::Fetch, "images_unavailable", obj(&[("msg", v_str(&format!("{:#}", e)))])),
    }

    let page = summary_page(
        &dataset.project_id,
        &dataset.simulation(),
        dataset.parameters(),
        &cfg.number_format,
    );
    let summary_path = out_dir.join("summary.html");
    std::fs::write(&summary_path, page).with_context(|| format!("writing {}", summary_path.display()))?;

    log(
        Level::Info,
        Domain::System,
        "done",
        obj(&[
            ("project_id", v_str(&dataset.project_id)),
            ("rendered", json!(report.rendered_count())),
            ("failed", json!(report.failed_ids())),
        ]),
    );
    Ok(())
}
