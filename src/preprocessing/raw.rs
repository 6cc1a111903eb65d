//! Raw labeled recordings
//!
//! Layout: identifier column, `sequence_length` feature columns, label column.

use crate::errors::{Result, ServiceError};
use ndarray::Array2;
use std::path::Path;

/// Label value that marks an epileptic recording in the raw file
pub const RAW_EPILEPTIC_LABEL: f64 = 1.0;

/// Raw dataset with binarized labels
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub feature_columns: Vec<String>,
    pub patient_ids: Vec<i64>,
    pub features: Array2<f32>,
    /// 1 = epileptic, 0 = anything else
    pub labels: Vec<u8>,
}

impl RawDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows per binary class: `(epileptic, non_epileptic)`
    pub fn class_counts(&self) -> (usize, usize) {
        let epileptic = self.labels.iter().filter(|l| **l == 1).count();
        (epileptic, self.labels.len() - epileptic)
    }
}

/// Collapse the original label space: 1 stays 1, everything else becomes 0
pub fn binarize_label(raw: &str) -> Result<u8> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ServiceError::DatasetError(format!("non-numeric label '{}'", raw)))?;
    Ok(u8::from(value == RAW_EPILEPTIC_LABEL))
}

/// Patient id from a raw identifier: a plain integer, or the trailing id of a
/// segment label shaped `X<n>.V<n>.<id>` such as `X21.V1.791`
pub fn parse_patient_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }

    let mut parts = raw.split('.');
    let (segment, version, id) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let numbered = |part: &str, prefix: char| {
        part.strip_prefix(prefix)
            .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    };
    if !numbered(segment, 'X') || !numbered(version, 'V') {
        return None;
    }
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// Read the raw CSV
pub fn read_raw(path: &Path, sequence_length: usize) -> Result<RawDataset> {
    if !path.exists() {
        return Err(ServiceError::DatasetError(format!(
            "Raw data file not found: {}",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    // id + features + label
    if headers.len() != sequence_length + 2 {
        return Err(ServiceError::DatasetError(format!(
            "expected {} columns (id, {} features, label), found {}",
            sequence_length + 2,
            sequence_length,
            headers.len()
        )));
    }

    let feature_columns: Vec<String> = headers
        .iter()
        .skip(1)
        .take(sequence_length)
        .map(str::to_string)
        .collect();

    let mut patient_ids = Vec::new();
    let mut labels = Vec::new();
    let mut values = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let line = row + 2;

        let raw_id = record.get(0).unwrap_or_default();
        let patient_id = parse_patient_id(raw_id).ok_or_else(|| {
            ServiceError::DatasetError(format!("line {}: cannot derive patient id from '{}'", line, raw_id))
        })?;

        for field in record.iter().skip(1).take(sequence_length) {
            let value: f32 = field.trim().parse().map_err(|_| {
                ServiceError::DatasetError(format!("line {}: non-numeric feature '{}'", line, field))
            })?;
            values.push(value);
        }

        let label = record.get(sequence_length + 1).unwrap_or_default();
        labels.push(
            binarize_label(label)
                .map_err(|e| ServiceError::DatasetError(format!("line {}: {}", line, e)))?,
        );
        patient_ids.push(patient_id);
    }

    let features = Array2::from_shape_vec((labels.len(), sequence_length), values)
        .map_err(|e| ServiceError::DatasetError(format!("ragged rows: {}", e)))?;

    Ok(RawDataset {
        feature_columns,
        patient_ids,
        features,
        labels,
    })
}
