//! Epoch files: JSON-lines instances plus a small metrics sidecar.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::output::EPOCH_FILE_PREFIX;
use crate::errors::PretrainError;
use crate::instances::Instance;
use crate::metrics::EpochMetrics;

/// `<dir>/epoch_<n>.json`
pub fn epoch_file_path(output_dir: &Path, epoch: u64) -> PathBuf {
    output_dir.join(format!("{EPOCH_FILE_PREFIX}{epoch}.json"))
}

/// `<dir>/epoch_<n>_metrics.json`
pub fn metrics_file_path(output_dir: &Path, epoch: u64) -> PathBuf {
    output_dir.join(format!("{EPOCH_FILE_PREFIX}{epoch}_metrics.json"))
}

/// Streams the instances of one epoch to disk.
pub struct EpochWriter {
    epoch: u64,
    path: PathBuf,
    metrics_path: PathBuf,
    out: BufWriter<File>,
    written: usize,
}

impl EpochWriter {
    /// Create (or truncate) the epoch file under `output_dir`, creating the directory.
    pub fn create(output_dir: &Path, epoch: u64) -> Result<Self, PretrainError> {
        fs::create_dir_all(output_dir)?;
        let path = epoch_file_path(output_dir, epoch);
        let out = BufWriter::new(File::create(&path)?);
        Ok(Self {
            epoch,
            metrics_path: metrics_file_path(output_dir, epoch),
            path,
            out,
            written: 0,
        })
    }

    /// Append one instance as a JSON line.
    pub fn write(&mut self, instance: &Instance) -> Result<(), PretrainError> {
        serde_json::to_writer(&mut self.out, instance)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Instances written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Path of the epoch file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the epoch file and write its metrics sidecar.
    pub fn finish(
        mut self,
        max_seq_len: usize,
        max_ngram_in_sequence: usize,
    ) -> Result<EpochMetrics, PretrainError> {
        self.out.flush()?;
        let metrics = EpochMetrics {
            num_training_examples: self.written,
            max_seq_len,
            max_ngram_in_sequence,
        };
        fs::write(&self.metrics_path, serde_json::to_vec(&metrics)?)?;
        debug!(
            epoch = self.epoch,
            path = %self.path.display(),
            instances = self.written,
            "epoch file finished"
        );
        Ok(metrics)
    }
}

/// Read an epoch file back into memory.
pub fn read_epoch(path: &Path) -> Result<Vec<Instance>, PretrainError> {
    let reader = BufReader::new(File::open(path)?);
    let mut instances = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        instances.push(serde_json::from_str(&line)?);
    }
    Ok(instances)
}

/// Read an epoch's metrics sidecar.
pub fn read_metrics(output_dir: &Path, epoch: u64) -> Result<EpochMetrics, PretrainError> {
    let raw = fs::read(metrics_file_path(output_dir, epoch))?;
    Ok(serde_json::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writer_emits_json_lines_and_metrics_sidecar() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("out");
        let mut writer = EpochWriter::create(&output_dir, 2).unwrap();
        let instance = Instance {
            tokens: vec!["[CLS]".into(), "[MASK]".into(), "[SEP]".into(), "g".into(), "[SEP]".into()],
            segment_ids: vec![0, 0, 0, 1, 1],
            masked_lm_positions: vec![1],
            masked_lm_labels: vec!["a".into()],
            ..Instance::default()
        };
        writer.write(&instance).unwrap();
        writer.write(&instance).unwrap();
        assert_eq!(writer.written(), 2);
        assert!(writer.path().ends_with("epoch_2.json"));
        let metrics = writer.finish(128, 20).unwrap();
        assert_eq!(metrics.num_training_examples, 2);

        let raw = fs::read_to_string(output_dir.join("epoch_2.json")).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.starts_with("{\"tokens\":[\"[CLS]\""));
        assert_eq!(read_epoch(&epoch_file_path(&output_dir, 2)).unwrap(), vec![instance.clone(), instance]);
        assert_eq!(read_metrics(&output_dir, 2).unwrap(), metrics);
        assert!(output_dir.join("epoch_2_metrics.json").exists());
    }
}
