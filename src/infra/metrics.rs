// ============================================================
// Layer 6 — Scalar Writer
// ============================================================
// TensorBoard-style scalar logging. Each call to add_scalars
// appends one CSV row per series:
//
//   tag,series,step,value
//   loss,train,0,0.693147
//   loss,val,0,0.690012
//   loss,train,500,0.412345
//   ...
//
// Output file: <model_dir>/runs/scalars.csv
// The header is written only when the file is new, so
// repeated runs append to the same log.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub struct ScalarWriter {
    csv_path: PathBuf,
}

impl ScalarWriter {
    /// Create a writer logging into `<log_dir>/scalars.csv`.
    pub fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = log_dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log dir '{}'", dir.display()))?;

        let csv_path = dir.join("scalars.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "tag,series,step,value")?;
            tracing::debug!("Created scalar log: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Record several named series of one tag at a global step,
    /// e.g. `add_scalars("loss", &[("train", 0.4), ("val", 0.5)], 1000)`.
    pub fn add_scalars(&mut self, tag: &str, series: &[(&str, f64)], step: usize) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        for (name, value) in series {
            writeln!(f, "{},{},{},{:.6}", tag, name, step, value)?;
        }
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_appended_under_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = ScalarWriter::new(dir.path().join("runs")).unwrap();
        w.add_scalars("loss", &[("train", 0.5), ("val", 0.25)], 10).unwrap();

        // A second writer on the same directory keeps the header single
        let mut w2 = ScalarWriter::new(dir.path().join("runs")).unwrap();
        w2.add_scalars("acc", &[("val", 0.001)], 20).unwrap();

        let text = fs::read_to_string(w.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "tag,series,step,value");
        assert_eq!(lines[1], "loss,train,10,0.500000");
        assert_eq!(lines[2], "loss,val,10,0.250000");
        assert_eq!(lines[3], "acc,val,20,0.001000");
        assert_eq!(lines.len(), 4);
    }
}
