//! Training dataset preparation
//!
//! One-shot batch job: read the raw labeled recordings, build a class-balanced
//! pool, split it into train/test arrays and write every row left out of the
//! pool as the patient file the inference service loads.

pub mod raw;
pub mod split;

use crate::config::Config;
use crate::dataset::{to_sequence_batch, PatientDataset};
use crate::errors::{Result, ServiceError};
use ndarray::{Array2, Array3, Axis};
use ndarray_npy::write_npy;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use raw::{read_raw, RawDataset};
pub use split::{balanced_pool, one_hot, train_test_split};

/// Tunables for one preparation run
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareSettings {
    pub sequence_length: usize,
    pub per_class: usize,
    pub test_fraction: f64,
    pub seed: u64,
}

impl PrepareSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sequence_length: config.model.sequence_length,
            per_class: config.preprocessing.per_class,
            test_fraction: config.preprocessing.test_fraction,
            seed: config.preprocessing.seed,
        }
    }
}

/// Where each output goes
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub x_train: PathBuf,
    pub y_train: PathBuf,
    pub x_test: PathBuf,
    pub y_test: PathBuf,
    pub patients: PathBuf,
}

impl OutputPaths {
    /// Standard file names inside `processed_dir`, plus the patient file
    pub fn new(processed_dir: &Path, patients: PathBuf) -> Self {
        Self {
            x_train: processed_dir.join("X_train.npy"),
            y_train: processed_dir.join("Y_train.npy"),
            x_test: processed_dir.join("X_test.npy"),
            y_test: processed_dir.join("Y_test.npy"),
            patients,
        }
    }
}

/// In-memory result of a preparation run
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x_train: Array3<f32>,
    pub y_train: Array2<f32>,
    pub x_test: Array3<f32>,
    pub y_test: Array2<f32>,
    pub remaining: PatientDataset,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct PreparationReport {
    pub raw_rows: usize,
    pub epileptic_rows: usize,
    pub non_epileptic_rows: usize,
    pub train_shape: Vec<usize>,
    pub test_shape: Vec<usize>,
    pub remaining_rows: usize,
}

impl fmt::Display for PreparationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Preprocessing completed")?;
        writeln!(
            f,
            "  raw rows: {} (epileptic: {}, non-epileptic: {})",
            self.raw_rows, self.epileptic_rows, self.non_epileptic_rows
        )?;
        writeln!(f, "  X_train shape: {:?}", self.train_shape)?;
        writeln!(f, "  X_test shape: {:?}", self.test_shape)?;
        write!(f, "  patient rows: {}", self.remaining_rows)
    }
}

/// Balance, split and reshape a raw dataset
pub fn prepare(raw: &RawDataset, settings: &PrepareSettings) -> Result<PreparedData> {
    let (epileptic, non_epileptic) = raw.class_counts();
    info!(epileptic, non_epileptic, "Class distribution");

    let pool = balanced_pool(&raw.labels, settings.per_class, settings.seed)?;
    let pool_features = raw.features.select(Axis(0), &pool);
    let pool_labels: Vec<u8> = pool.iter().map(|i| raw.labels[*i]).collect();
    let targets = one_hot(&pool_labels);

    let (train, test) = train_test_split(pool.len(), settings.test_fraction, settings.seed);

    let x_train = to_sequence_batch(pool_features.select(Axis(0), &train));
    let y_train = targets.select(Axis(0), &train);
    let x_test = to_sequence_batch(pool_features.select(Axis(0), &test));
    let y_test = targets.select(Axis(0), &test);

    let in_pool: HashSet<usize> = pool.iter().copied().collect();
    let remaining_rows: Vec<usize> = (0..raw.len()).filter(|i| !in_pool.contains(i)).collect();
    let remaining = PatientDataset::new(
        raw.feature_columns.clone(),
        remaining_rows.iter().map(|i| raw.patient_ids[*i]).collect(),
        raw.features.select(Axis(0), &remaining_rows),
    )?;

    Ok(PreparedData {
        x_train,
        y_train,
        x_test,
        y_test,
        remaining,
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn npy_error(path: &Path, e: impl fmt::Display) -> ServiceError {
    ServiceError::DatasetError(format!("failed to write {}: {}", path.display(), e))
}

fn stage_all(data: &PreparedData, paths: &OutputPaths) -> Result<()> {
    let stage = staging_path(&paths.x_train);
    write_npy(&stage, &data.x_train).map_err(|e| npy_error(&paths.x_train, e))?;
    let stage = staging_path(&paths.y_train);
    write_npy(&stage, &data.y_train).map_err(|e| npy_error(&paths.y_train, e))?;
    let stage = staging_path(&paths.x_test);
    write_npy(&stage, &data.x_test).map_err(|e| npy_error(&paths.x_test, e))?;
    let stage = staging_path(&paths.y_test);
    write_npy(&stage, &data.y_test).map_err(|e| npy_error(&paths.y_test, e))?;
    data.remaining.write_csv(&staging_path(&paths.patients))
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

fn discard_staged(targets: &[&PathBuf]) {
    for target in targets {
        let _ = std::fs::remove_file(staging_path(target));
    }
}

/// Put back what `target` held before this run
fn restore(target: &Path, backed_up: bool) {
    if backed_up {
        let _ = std::fs::rename(backup_path(target), target);
    } else {
        let _ = std::fs::remove_file(target);
    }
}

/// Move every staged file over its target. On failure, targets already
/// replaced get their previous contents back.
fn commit_staged(targets: &[&PathBuf]) -> std::io::Result<()> {
    let mut committed: Vec<(&PathBuf, bool)> = Vec::with_capacity(targets.len());

    for &target in targets {
        let backed_up = target.is_file();
        let moved = if backed_up {
            std::fs::rename(target, backup_path(target))
        } else {
            Ok(())
        };

        let result = moved.and_then(|_| {
            std::fs::rename(staging_path(target), target).map_err(|e| {
                if backed_up {
                    let _ = std::fs::rename(backup_path(target), target);
                }
                e
            })
        });

        if let Err(e) = result {
            for (done, had_backup) in committed.into_iter().rev() {
                restore(done, had_backup);
            }
            return Err(e);
        }
        committed.push((target, backed_up));
    }

    for (target, backed_up) in committed {
        if backed_up {
            let _ = std::fs::remove_file(backup_path(target));
        }
    }
    Ok(())
}

/// Write every output, or none of them
pub fn write_outputs(data: &PreparedData, paths: &OutputPaths) -> Result<()> {
    let targets = [
        &paths.x_train,
        &paths.y_train,
        &paths.x_test,
        &paths.y_test,
        &paths.patients,
    ];

    for target in targets {
        ensure_parent(target)?;
    }

    if let Err(e) = stage_all(data, paths) {
        discard_staged(&targets);
        return Err(e);
    }

    if let Err(e) = commit_staged(&targets) {
        warn!(error = %e, "Failed to move outputs into place, previous outputs restored");
        discard_staged(&targets);
        return Err(e.into());
    }

    Ok(())
}

/// Full job: read, prepare, write
pub fn run(raw_path: &Path, paths: &OutputPaths, settings: &PrepareSettings) -> Result<PreparationReport> {
    info!(path = %raw_path.display(), "Reading raw data");
    let raw = read_raw(raw_path, settings.sequence_length).map_err(|e| {
        warn!(path = %raw_path.display(), error = %e, "Error loading raw data");
        e
    })?;
    info!(rows = raw.len(), "Raw data loaded");

    let data = prepare(&raw, settings)?;

    info!(
        x_train = ?paths.x_train.parent(),
        patients = %paths.patients.display(),
        "Saving processed data"
    );
    write_outputs(&data, paths)?;

    let (epileptic_rows, non_epileptic_rows) = raw.class_counts();
    let report = PreparationReport {
        raw_rows: raw.len(),
        epileptic_rows,
        non_epileptic_rows,
        train_shape: data.x_train.shape().to_vec(),
        test_shape: data.x_test.shape().to_vec(),
        remaining_rows: data.remaining.len(),
    };
    info!(
        train = ?report.train_shape,
        test = ?report.test_shape,
        remaining = report.remaining_rows,
        "Preprocessing completed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_npy::read_npy;

    fn settings(sequence_length: usize, per_class: usize) -> PrepareSettings {
        PrepareSettings {
            sequence_length,
            per_class,
            test_fraction: 0.2,
            seed: 42,
        }
    }

    /// Row `i` has features `i*T .. i*T+T`, id `1000 + i`
    fn synthetic(epileptic: usize, other: usize, sequence_length: usize) -> RawDataset {
        let n = epileptic + other;
        let values: Vec<f32> = (0..n * sequence_length).map(|v| v as f32).collect();
        let mut labels = vec![1u8; epileptic];
        labels.extend(std::iter::repeat(0u8).take(other));

        RawDataset {
            feature_columns: (1..=sequence_length).map(|i| format!("X{}", i)).collect(),
            patient_ids: (0..n as i64).map(|i| 1000 + i).collect(),
            features: Array2::from_shape_vec((n, sequence_length), values).unwrap(),
            labels,
        }
    }

    #[test]
    fn test_reference_scenario_sizes() {
        let raw = synthetic(500, 600, 178);
        let data = prepare(&raw, &settings(178, 400)).unwrap();

        assert_eq!(data.x_train.shape(), &[640, 178, 1]);
        assert_eq!(data.y_train.shape(), &[640, 2]);
        assert_eq!(data.x_test.shape(), &[160, 178, 1]);
        assert_eq!(data.y_test.shape(), &[160, 2]);
        assert_eq!(data.remaining.len(), 300);
        assert_eq!(data.remaining.shape(), (300, 179));

        let epileptic_targets = data.y_train.column(1).sum() + data.y_test.column(1).sum();
        assert_eq!(epileptic_targets, 400.0);
    }

    #[test]
    fn test_remaining_excludes_pool_rows() {
        let raw = synthetic(30, 40, 3);
        let data = prepare(&raw, &settings(3, 10)).unwrap();

        // first feature identifies the raw row
        let used: HashSet<i64> = data
            .x_train
            .outer_iter()
            .chain(data.x_test.outer_iter())
            .map(|r| 1000 + (r[[0, 0]] as i64) / 3)
            .collect();
        assert_eq!(used.len(), 20);

        for id in data.remaining.patient_ids() {
            assert!(!used.contains(id));
        }
        assert_eq!(data.remaining.len(), 50);

        let ids = data.remaining.patient_ids();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "original order kept");
    }

    #[test]
    fn test_features_follow_their_targets() {
        let raw = synthetic(30, 40, 3);
        let data = prepare(&raw, &settings(3, 10)).unwrap();

        for (x, y) in data.x_train.outer_iter().zip(data.y_train.outer_iter()) {
            let row = (x[[0, 0]] as usize) / 3;
            let expected = raw.labels[row] as usize;
            assert_eq!(y[expected], 1.0);
            assert_eq!(y[1 - expected], 0.0);
        }
    }

    #[test]
    fn test_run_is_deterministic() {
        let raw_dir = tempfile::tempdir().unwrap();
        let raw_path = raw_dir.path().join("raw.csv");

        let mut contents = String::from("id,X1,X2,X3,y\n");
        for i in 0..60 {
            let label = if i % 3 == 0 { 1 } else { 2 + i % 4 };
            contents.push_str(&format!("X{}.V1.{},{},{},{},{}\n", i, i, i, i * 2, i * 3, label));
        }
        std::fs::write(&raw_path, contents).unwrap();

        let run_once = |dir: &Path| {
            let paths = OutputPaths::new(&dir.join("processed"), dir.join("patients").join("patients.csv"));
            let report = run(&raw_path, &paths, &settings(3, 10)).unwrap();
            (report, paths)
        };

        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let (report_a, paths_a) = run_once(first.path());
        let (report_b, paths_b) = run_once(second.path());

        assert_eq!(report_a, report_b);
        assert_eq!(report_a.raw_rows, 60);
        assert_eq!(report_a.train_shape, vec![16, 3, 1]);
        assert_eq!(report_a.test_shape, vec![4, 3, 1]);
        assert_eq!(report_a.remaining_rows, 40);

        for (a, b) in [
            (&paths_a.x_train, &paths_b.x_train),
            (&paths_a.y_train, &paths_b.y_train),
            (&paths_a.x_test, &paths_b.x_test),
            (&paths_a.y_test, &paths_b.y_test),
            (&paths_a.patients, &paths_b.patients),
        ] {
            assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
        }

        let x_train: Array3<f32> = read_npy(&paths_a.x_train).unwrap();
        assert_eq!(x_train.shape(), &[16, 3, 1]);

        let patients = PatientDataset::load(&paths_a.patients, 3).unwrap();
        assert_eq!(patients.len(), 40);
    }

    #[test]
    fn test_failed_run_leaves_no_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw.csv");
        // not enough epileptic rows for per_class = 10
        std::fs::write(&raw_path, "id,X1,y\n1,0.5,1\n2,0.5,2\n").unwrap();

        let paths = OutputPaths::new(&dir.path().join("processed"), dir.path().join("patients.csv"));
        assert!(run(&raw_path, &paths, &settings(1, 10)).is_err());
        assert!(!paths.x_train.exists());
        assert!(!paths.patients.exists());
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp") || n.ends_with(".bak"))
            .collect()
    }

    #[test]
    fn test_failed_commit_restores_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let processed = dir.path().join("processed");
        // a directory where the patient file should go makes the last rename fail
        let patients = dir.path().join("patients.csv");
        std::fs::create_dir_all(patients.join("keep")).unwrap();
        std::fs::create_dir_all(&processed).unwrap();

        let paths = OutputPaths::new(&processed, patients.clone());
        std::fs::write(&paths.x_train, b"previous x_train").unwrap();
        std::fs::write(&paths.y_test, b"previous y_test").unwrap();

        let data = prepare(&synthetic(30, 40, 3), &settings(3, 10)).unwrap();
        assert!(write_outputs(&data, &paths).is_err());

        assert_eq!(std::fs::read(&paths.x_train).unwrap(), b"previous x_train");
        assert_eq!(std::fs::read(&paths.y_test).unwrap(), b"previous y_test");
        assert!(!paths.y_train.exists());
        assert!(!paths.x_test.exists());
        assert!(patients.join("keep").is_dir());

        assert!(leftovers(&processed).is_empty(), "{:?}", leftovers(&processed));
        assert!(leftovers(dir.path()).is_empty(), "{:?}", leftovers(dir.path()));
    }

    #[test]
    fn test_successful_commit_replaces_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let processed = dir.path().join("processed");
        std::fs::create_dir_all(&processed).unwrap();

        let paths = OutputPaths::new(&processed, dir.path().join("patients.csv"));
        std::fs::write(&paths.x_train, b"previous x_train").unwrap();

        let data = prepare(&synthetic(30, 40, 3), &settings(3, 10)).unwrap();
        write_outputs(&data, &paths).unwrap();

        let x_train: Array3<f32> = read_npy(&paths.x_train).unwrap();
        assert_eq!(x_train.shape(), &[16, 3, 1]);
        assert!(leftovers(&processed).is_empty());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path(), dir.path().join("patients.csv"));
        assert!(run(&dir.path().join("absent.csv"), &paths, &settings(178, 400)).is_err());
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/data/processed/X_train.npy")),
            PathBuf::from("/data/processed/X_train.npy.tmp")
        );
    }

    #[test]
    fn test_report_display() {
        let report = PreparationReport {
            raw_rows: 1100,
            epileptic_rows: 500,
            non_epileptic_rows: 600,
            train_shape: vec![640, 178, 1],
            test_shape: vec![160, 178, 1],
            remaining_rows: 300,
        };
        let text = report.to_string();
        assert!(text.contains("[640, 178, 1]"));
        assert!(text.contains("patient rows: 300"));
    }
}
