//! Normalize a saved visualization payload and print the result.
//!
//! Usage: normalize_payload <file> [slot_id] [category]
//! A slot id from the standard dashboard also applies that slot's overrides.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use reservoir_dash::payload::normalize_with;
use reservoir_dash::slots::{standard_slots, Category};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or_else(|| anyhow!("usage: normalize_payload <file> [slot_id] [category]"))?;
    let slot_id = args.next().unwrap_or_else(|| "payload".to_string());
    let category = match args.next() {
        Some(name) => Some(Category::parse(&name).ok_or_else(|| anyhow!("unknown category {:?}", name))?),
        None => None,
    };

    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    // the normalizer parses text itself, so unparseable files still yield a placeholder
    let raw = Value::String(text);

    let slot = standard_slots().into_iter().find(|s| s.id == slot_id);
    let payload = match &slot {
        Some(slot) => normalize_with(raw, &slot.id, category.or(Some(slot.category)), Some(&slot.overrides)),
        None => normalize_with(raw, &slot_id, category, None),
    };

    if let Some(diagnostic) = &payload.diagnostic {
        eprintln!("placeholder: {}", diagnostic);
    }
    println!("{}", serde_json::to_string_pretty(&payload.to_value())?);
    Ok(())
}
