//! ---
//! fds_section: "02-telemetry-generation"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Bulk CSV export of synthesized telemetry for model training."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::synthesis::generate_pump_telemetry;

/// Training dataset variants produced for offline anomaly-model work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingScenario {
    NoFailure,
    ImmediateFailure,
    GradualFailure,
}

impl TrainingScenario {
    fn file_stem(&self) -> &'static str {
        match self {
            TrainingScenario::NoFailure => "pump_training_no_failure",
            TrainingScenario::ImmediateFailure => "pump_training_immediate_failure",
            TrainingScenario::GradualFailure => "pump_training_gradual_failure",
        }
    }

    fn failure(&self) -> bool {
        !matches!(self, TrainingScenario::NoFailure)
    }
}

/// Write one delimited dataset for `scenario`: one row per telemetry record,
/// one column per channel. The same synthesis path feeds the live device
/// runtime, so exported training data and simulated data share identical
/// numeric semantics.
pub fn write_training_data(
    output_dir: &Path,
    scenario: TrainingScenario,
    sample_size: usize,
    fail_over_iterations: usize,
    seed: u64,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("unable to create output dir {}", output_dir.display()))?;
    let path = output_dir.join(format!("{}.csv", scenario.file_stem()));

    let transition = match scenario {
        TrainingScenario::GradualFailure => fail_over_iterations,
        _ => 0,
    };
    let records = generate_pump_telemetry(sample_size, scenario.failure(), transition, seed)?;

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    for record in &records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!(scenario = ?scenario, rows = records.len(), path = %path.display(), "training dataset written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let path =
            write_training_data(dir.path(), TrainingScenario::NoFailure, 25, 0, 11).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "MotorPowerKw,MotorSpeed,PumpRate,TimePumpOn,CasingFriction"
        );
        assert_eq!(lines.count(), 25);
    }

    #[test]
    fn gradual_failure_dataset_includes_the_ramp() {
        let dir = tempdir().unwrap();
        let path =
            write_training_data(dir.path(), TrainingScenario::GradualFailure, 20, 8, 11).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        // header + normal + ramp + failed
        assert_eq!(contents.lines().count(), 1 + 20 + 8 + 20);
    }

    #[test]
    fn scenario_files_are_distinct() {
        let dir = tempdir().unwrap();
        let a = write_training_data(dir.path(), TrainingScenario::NoFailure, 10, 0, 1).unwrap();
        let b =
            write_training_data(dir.path(), TrainingScenario::ImmediateFailure, 10, 0, 1).unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }
}
