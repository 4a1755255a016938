//! Execution-history export in JSON, CSV, and summary-markdown shapes.

use crate::engine::ExecutionResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
    Summary,
}

pub(super) fn export(document_id: &str, results: &[&ExecutionResult], format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(results).unwrap_or_else(|_| "[]".to_string())
        }
        ExportFormat::Csv => to_csv(results),
        ExportFormat::Summary => to_summary(document_id, results),
    }
}

fn to_csv(results: &[&ExecutionResult]) -> String {
    let mut csv = String::from(
        "key,document_id,success,iterations,nodes_evaluated,elapsed_ms,errors,started_at\n",
    );
    for result in results {
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{}",
            result.history_key(),
            result.document_id,
            result.success,
            result.metrics.iterations_completed,
            result.metrics.nodes_evaluated,
            result.metrics.elapsed_ms,
            result.errors.len(),
            result.started_at,
        );
    }
    csv
}

fn to_summary(document_id: &str, results: &[&ExecutionResult]) -> String {
    let total = results.len();
    let successful = results.iter().filter(|r| r.success).count();
    let avg_elapsed = if total == 0 {
        0.0
    } else {
        results.iter().map(|r| r.metrics.elapsed_ms).sum::<u64>() as f64 / total as f64
    };

    let mut summary = String::new();
    let _ = writeln!(summary, "# Execution Summary: {}", document_id);
    let _ = writeln!(summary, "\n- executions: {}", total);
    let _ = writeln!(summary, "- successful: {}", successful);
    let _ = writeln!(summary, "- failed: {}", total - successful);
    let _ = writeln!(summary, "- average duration: {:.1} ms", avg_elapsed);

    if total > 0 {
        let _ = writeln!(summary, "\n## Runs\n");
        let _ = writeln!(summary, "| key | success | iterations | elapsed (ms) | errors |");
        let _ = writeln!(summary, "|---|---|---|---|---|");
        for result in results {
            let _ = writeln!(
                summary,
                "| {} | {} | {} | {} | {} |",
                result.history_key(),
                result.success,
                result.metrics.iterations_completed,
                result.metrics.elapsed_ms,
                result.errors.len(),
            );
        }
    }
    summary
}
