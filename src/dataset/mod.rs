//! Patient recordings table
//!
//! The file handed from `prepare` to `serve`: a header row, a `patient_id`
//! column and one column per timestep. Several rows may share a patient id.

use crate::errors::{Result, ServiceError};
use ndarray::{Array2, Array3, Axis};
use std::path::Path;
use tracing::info;

/// Name of the identifier column both sides of the handoff agree on
pub const PATIENT_ID_COLUMN: &str = "patient_id";

/// Immutable, in-memory patient dataset
#[derive(Debug, Clone)]
pub struct PatientDataset {
    feature_columns: Vec<String>,
    patient_ids: Vec<i64>,
    features: Array2<f32>,
}

impl PatientDataset {
    /// Build a dataset from already parsed parts
    pub fn new(feature_columns: Vec<String>, patient_ids: Vec<i64>, features: Array2<f32>) -> Result<Self> {
        if patient_ids.len() != features.nrows() {
            return Err(ServiceError::DatasetError(format!(
                "{} patient ids for {} feature rows",
                patient_ids.len(),
                features.nrows()
            )));
        }
        if feature_columns.len() != features.ncols() {
            return Err(ServiceError::DatasetError(format!(
                "{} feature columns named for {} feature values per row",
                feature_columns.len(),
                features.ncols()
            )));
        }

        Ok(Self {
            feature_columns,
            patient_ids,
            features,
        })
    }

    /// Load a patient CSV, requiring exactly `sequence_length` feature columns
    pub fn load(path: &Path, sequence_length: usize) -> Result<Self> {
        if !path.exists() {
            return Err(ServiceError::DatasetError(format!(
                "Patient data file not found: {}",
                path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let id_index = headers
            .iter()
            .position(|h| h == PATIENT_ID_COLUMN)
            .ok_or_else(|| {
                ServiceError::DatasetError(format!(
                    "column '{}' missing from {}",
                    PATIENT_ID_COLUMN,
                    path.display()
                ))
            })?;

        let feature_columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_index)
            .map(|(_, h)| h.to_string())
            .collect();

        if feature_columns.len() != sequence_length {
            return Err(ServiceError::DatasetError(format!(
                "expected {} feature columns, found {}",
                sequence_length,
                feature_columns.len()
            )));
        }

        let mut patient_ids = Vec::new();
        let mut values = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            // header is line 1
            let line = row + 2;

            let raw_id = record.get(id_index).unwrap_or_default().trim();
            let patient_id: i64 = raw_id.parse().map_err(|_| {
                ServiceError::DatasetError(format!("line {}: invalid patient id '{}'", line, raw_id))
            })?;
            patient_ids.push(patient_id);

            for (col, field) in record.iter().enumerate() {
                if col == id_index {
                    continue;
                }
                let value: f32 = field.trim().parse().map_err(|_| {
                    ServiceError::DatasetError(format!(
                        "line {}: non-numeric value '{}' in column '{}'",
                        line,
                        field,
                        headers.get(col).unwrap_or("?")
                    ))
                })?;
                values.push(value);
            }
        }

        let features = Array2::from_shape_vec((patient_ids.len(), sequence_length), values)
            .map_err(|e| ServiceError::DatasetError(format!("ragged rows: {}", e)))?;

        let dataset = Self::new(feature_columns, patient_ids, features)?;
        let (rows, cols) = dataset.shape();
        info!(path = %path.display(), rows, cols, "Loaded patient data");
        Ok(dataset)
    }

    /// Write the dataset as CSV with `patient_id` first
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = Vec::with_capacity(self.feature_columns.len() + 1);
        header.push(PATIENT_ID_COLUMN.to_string());
        header.extend(self.feature_columns.iter().cloned());
        writer.write_record(&header)?;

        for (patient_id, row) in self.patient_ids.iter().zip(self.features.rows()) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(patient_id.to_string());
            record.extend(row.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Tabular shape `(rows, columns)`, counting the identifier column
    pub fn shape(&self) -> (usize, usize) {
        (self.features.nrows(), self.feature_columns.len() + 1)
    }

    pub fn len(&self) -> usize {
        self.patient_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patient_ids.is_empty()
    }

    pub fn patient_ids(&self) -> &[i64] {
        &self.patient_ids
    }

    pub fn features(&self) -> &Array2<f32> {
        &self.features
    }

    /// Feature matrix `(recordings, timesteps)` for one patient, in file order
    pub fn recordings_for(&self, patient_id: i64) -> Option<Array2<f32>> {
        let rows: Vec<usize> = self
            .patient_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| **id == patient_id)
            .map(|(i, _)| i)
            .collect();

        if rows.is_empty() {
            None
        } else {
            Some(self.features.select(Axis(0), &rows))
        }
    }
}

/// Add a trailing single-channel axis: `(R, T)` -> `(R, T, 1)`
pub fn to_sequence_batch(features: Array2<f32>) -> Array3<f32> {
    features.insert_axis(Axis(2))
}
