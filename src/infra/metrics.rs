// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per validation round.
//
// Metrics recorded per round:
//   - step:          optimizer steps completed
//   - train_loss:    mean training loss since the previous round
//   - val_loss:      mean cross-entropy on the validation split
//   - val_accuracy:  next-token accuracy on the validation split
//                    (padding excluded)
//   - learning_rate: Noam rate used for the latest update
//
// Output file: <saving_path>/metrics.csv
//
// Example CSV output:
//   step,train_loss,val_loss,val_accuracy,learning_rate
//   100,6.912300,6.554100,0.081200,0.000017
//   200,5.870100,5.802300,0.114900,0.000035
//
// The header is only written when the file is new, so a resumed
// run keeps appending to the same curve.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const HEADER: &str = "step,train_loss,val_loss,val_accuracy,learning_rate";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step:          usize,
    pub train_loss:    f64,
    pub val_loss:      f64,
    /// Range: [0.0, 1.0]
    pub val_accuracy:  f64,
    pub learning_rate: f64,
}

impl StepMetrics {
    /// Returns true if this round improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.8}",
            m.step,
            m.train_loss,
            m.val_loss,
            m.val_accuracy,
            m.learning_rate,
        )?;

        tracing::debug!(
            "Logged step {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.step,
            m.train_loss,
            m.val_loss,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
