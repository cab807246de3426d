//! Terminal rendering for predictions, the ledger, and model information.

use serde_json::json;

use visionsense_core::schema::ledger::ledger_to_record_batch;
use visionsense_core::{ClassifierConfig, LedgerEntry, ModelInfo, PredictionResult};

use crate::batch::{BatchStats, FileOutcome};

const BAR_WIDTH: usize = 20;

// ── Predictions ──

pub fn print_outcome(outcome: &FileOutcome) {
    match &outcome.result {
        Ok(result) => print!("{}", format_card(&outcome.path.display().to_string(), result)),
        Err(e) => eprintln!("✗ {} [{}] {e}", outcome.path.display(), e.kind()),
    }
}

/// A titled block with one ranked line per prediction.
pub fn format_card(title: &str, result: &PredictionResult) -> String {
    let mut out = format!("=== {title} ===\n");
    let width = result.iter().map(|p| p.label.len()).max().unwrap_or(0);
    for (rank, p) in result.iter().enumerate() {
        out.push_str(&format!(
            "  {:>2}. {:<width$}  {:>7.2}%  {}\n",
            rank + 1,
            p.label,
            p.confidence * 100.0,
            bar(p.confidence),
        ));
    }
    out.push('\n');
    out
}

fn bar(confidence: f32) -> String {
    let filled = (confidence.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize;
    format!("{}{}", "█".repeat(filled), "·".repeat(BAR_WIDTH - filled))
}

/// One line of JSON per file.
pub fn outcome_json(outcome: &FileOutcome) -> serde_json::Value {
    let file = outcome.path.display().to_string();
    match &outcome.result {
        Ok(result) => json!({ "file": file, "predictions": result }),
        Err(e) => json!({
            "file": file,
            "error": { "kind": e.kind(), "message": e.to_string() },
        }),
    }
}

pub fn print_stats(stats: &BatchStats) {
    eprintln!(
        "Classified {}/{} files in {:.2}s ({} failed)",
        stats.succeeded, stats.total, stats.elapsed_secs, stats.failed
    );
}

// ── Ledger ──

pub fn print_ledger(entries: &[LedgerEntry]) -> anyhow::Result<()> {
    if entries.is_empty() {
        println!("(no recorded predictions)");
        return Ok(());
    }
    let batch = ledger_to_record_batch(entries)?;
    println!("{}", arrow::util::pretty::pretty_format_batches(&[batch])?);
    Ok(())
}

// ── Model ──

pub fn print_info(model: Option<&ModelInfo>, config: &ClassifierConfig) -> anyhow::Result<()> {
    let report = json!({ "model": model, "config": config });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
