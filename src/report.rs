//! Human-readable summaries and JSON export of results

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::optimizer::{ConstraintFamily, DispatchResult};
use crate::sweep::TaggedResult;

/// Everything produced by one run, as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub generated_at: DateTime<Utc>,
    pub label: String,
    pub records: Vec<TaggedResult>,
}

impl SweepReport {
    pub fn new(label: impl Into<String>, records: Vec<TaggedResult>) -> Self {
        Self {
            generated_at: Utc::now(),
            label: label.into(),
            records,
        }
    }
}

pub fn write_json(path: &Path, reports: &[SweepReport]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(reports).context("serializing report")?;
    fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    info!(path = %path.display(), reports = reports.len(), "report written");
    Ok(())
}

/// Multi-line breakdown of one result
pub fn summary(result: &DispatchResult, label: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {label} ({}) ===", result.scenario);

    let Some(outcome) = &result.outcome else {
        let _ = writeln!(out, "status: {} (no solution)", result.status);
        return out;
    };

    let breakdown = &outcome.breakdown;
    let totals = &outcome.totals;
    let duals = &outcome.duals;

    let _ = writeln!(out, "objective:           {:>10.3} DKK", outcome.objective);
    let _ = writeln!(out, "export revenue:      {:>10.3} DKK", breakdown.export_revenue);
    let _ = writeln!(out, "import cost:         {:>10.3} DKK", breakdown.import_cost);
    if let Some(penalty) = breakdown.discomfort_penalty {
        let _ = writeln!(out, "discomfort penalty:  {penalty:>10.3} DKK");
    }
    if let Some(cost) = breakdown.battery_cost {
        let _ = writeln!(out, "battery cost:        {cost:>10.3} DKK");
    }

    let _ = writeln!(
        out,
        "pv used {:.2} / {:.2} kWh, import {:.2} kWh, export {:.2} kWh",
        totals.pv_used, totals.pv_available, totals.import, totals.export
    );
    match (totals.served, totals.reference_load) {
        (Some(served), Some(reference)) => {
            let _ = writeln!(
                out,
                "served {served:.2} kWh against reference {reference:.2} kWh, deviation {:.2} kWh",
                totals.deviation.unwrap_or(0.0)
            );
        }
        (Some(served), None) => {
            let _ = writeln!(out, "served {served:.2} kWh");
        }
        _ => {}
    }
    if let (Some(charge), Some(discharge)) = (totals.charge, totals.discharge) {
        let _ = writeln!(out, "charged {charge:.2} kWh, discharged {discharge:.2} kWh");
    }
    if let Some(scale) = outcome.battery_scale {
        let _ = writeln!(out, "battery scale:       {scale:>10.3}");
    }

    let headline = [
        ("daily demand", duals.single(ConstraintFamily::DailyDemand)),
        ("max pv cap", duals.max(ConstraintFamily::PvCap)),
        ("mean balance", duals.mean(ConstraintFamily::Balance)),
        ("initial soc", duals.single(ConstraintFamily::SocInit)),
        ("final soc", duals.single(ConstraintFamily::SocFinal)),
        ("max charge cap", duals.max(ConstraintFamily::ChargeCap)),
        ("max discharge cap", duals.max(ConstraintFamily::DischargeCap)),
        ("total soc cap", duals.total(ConstraintFamily::SocCap)),
    ];
    let _ = writeln!(out, "shadow prices:");
    for (name, value) in headline {
        if let Some(value) = value {
            let _ = writeln!(out, "  {name:<18} {value:>10.4}");
        }
    }
    out
}

/// One line per record: tags, status, objective and headline totals
pub fn sweep_table(records: &[TaggedResult]) -> String {
    let mut out = String::new();
    for record in records {
        let tags = record
            .tags
            .iter()
            .map(|tag| format!("{}={:.3}", tag.knob, tag.value))
            .join(" ");
        match &record.result.outcome {
            Some(outcome) => {
                let _ = writeln!(
                    out,
                    "{tags:<40} {:<10} objective {:>10.3}  import {:>8.2}  export {:>8.2}{}",
                    record.result.status,
                    outcome.objective,
                    outcome.totals.import,
                    outcome.totals.export,
                    outcome
                        .battery_scale
                        .map(|scale| format!("  scale {scale:.3}"))
                        .unwrap_or_default(),
                );
            }
            None => {
                let _ = writeln!(out, "{tags:<40} {}", record.result.status);
            }
        }
    }
    out
}
