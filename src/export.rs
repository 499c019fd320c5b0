//! Run export
//!
//! Serializes a run (config, trajectories and summary) to JSON for external
//! consumers such as chart renderers.

use crate::config::ExperimentConfig;
use crate::engine::SimulationResult;
use crate::error::{SimError, SimResult};
use crate::summary::RunSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Complete export of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationExport {
    pub version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Seed of a seeded run, if known
    pub seed: Option<u64>,
    pub config: ExperimentConfig,
    pub result: SimulationResult,
    pub summary: RunSummary,
}

/// Build a complete simulation export.
pub fn build_export(
    config: &ExperimentConfig,
    result: &SimulationResult,
    seed: Option<u64>,
) -> SimulationExport {
    SimulationExport {
        version: crate::VERSION.to_string(),
        run_id: Uuid::now_v7(),
        generated_at: Utc::now(),
        seed,
        config: config.clone(),
        result: result.clone(),
        summary: RunSummary::from_result(result),
    }
}

/// Export as pretty-printed JSON.
pub fn export_json(export: &SimulationExport) -> SimResult<String> {
    Ok(serde_json::to_string_pretty(export)?)
}

/// Import an export from JSON.
pub fn import_json(json: &str) -> SimResult<SimulationExport> {
    Ok(serde_json::from_str(json)?)
}

/// Write export to a file path.
pub fn write_to_file(export: &SimulationExport, path: impl AsRef<Path>) -> SimResult<()> {
    let path = path.as_ref();
    let json = export_json(export)?;
    std::fs::write(path, json).map_err(|e| SimError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    info!(
        path = %path.display(),
        run_id = %export.run_id,
        groups = export.result.len(),
        "Exported simulation run"
    );
    Ok(())
}
