//! Per-patient prediction
//!
//! Scores every recording of one patient and summarizes the result. Class
//! index 1 is "epileptic"; recording positions reported to humans are 1-based.

use crate::dataset::to_sequence_batch;
use crate::errors::{Result, ServiceError};
use crate::state::Snapshot;
use ndarray::{Array2, ArrayView1};
use serde::Serialize;
use tracing::{error, info, warn};

/// Class index the model uses for epileptic recordings
pub const EPILEPTIC_CLASS: usize = 1;

/// Number of classes the model is expected to output
pub const NUM_CLASSES: usize = 2;

/// Prediction response for one patient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientPrediction {
    pub patient_id: i64,
    pub total_recordings: usize,
    /// 1-based row positions predicted epileptic, ascending
    pub epileptic_recordings: Vec<usize>,
    pub predictions: Vec<usize>,
    pub confidence_scores: Vec<f32>,
    pub message: String,
    pub processed_by: String,
}

/// Index of the largest score; the first one wins on ties
pub fn argmax(row: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    for (i, value) in row.iter().enumerate() {
        if *value > row[best] {
            best = i;
        }
    }
    best
}

/// Largest score in a row
pub fn max_score(row: ArrayView1<'_, f32>) -> f32 {
    row.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Human-readable summary line
pub fn summary_message(patient_id: i64, epileptic: &[usize]) -> String {
    if epileptic.is_empty() {
        format!(
            "Patient {} predicted as non-epileptic in all recordings.",
            patient_id
        )
    } else {
        let rows: Vec<String> = epileptic.iter().map(|i| i.to_string()).collect();
        format!(
            "Patient {} predicted epileptic recordings at rows: [{}]",
            patient_id,
            rows.join(", ")
        )
    }
}

/// Turn a `(recordings, classes)` score matrix into a patient prediction
pub fn summarize(patient_id: i64, scores: &Array2<f32>, username: &str) -> PatientPrediction {
    let predictions: Vec<usize> = scores.rows().into_iter().map(argmax).collect();
    let confidence_scores: Vec<f32> = scores.rows().into_iter().map(max_score).collect();

    let epileptic_recordings: Vec<usize> = predictions
        .iter()
        .enumerate()
        .filter(|(_, class)| **class == EPILEPTIC_CLASS)
        .map(|(i, _)| i + 1)
        .collect();

    PatientPrediction {
        patient_id,
        total_recordings: predictions.len(),
        message: summary_message(patient_id, &epileptic_recordings),
        epileptic_recordings,
        predictions,
        confidence_scores,
        processed_by: username.to_string(),
    }
}

/// Predict every recording of `patient_id` using the dataset and model in `snapshot`
pub async fn predict_patient(
    snapshot: &Snapshot,
    patient_id: i64,
    username: &str,
) -> Result<PatientPrediction> {
    let (dataset, model) = match (&snapshot.dataset, &snapshot.model) {
        (Some(dataset), Some(model)) => (dataset, model),
        _ => {
            warn!(patient_id, user = %username, "Prediction requested while model or data not loaded");
            return Err(ServiceError::ServiceUnavailable);
        }
    };

    let features = dataset.recordings_for(patient_id).ok_or_else(|| {
        warn!(patient_id, user = %username, "No data found for patient");
        ServiceError::NotFound { patient_id }
    })?;

    info!(patient_id, shape = ?features.shape(), "Input shape before reshape");
    let batch = to_sequence_batch(features);
    info!(patient_id, shape = ?batch.shape(), "Input shape after reshape");

    let scores = model.classifier.predict(&batch).await.map_err(|e| {
        error!(patient_id, error = %e, "Prediction failed");
        match e {
            ServiceError::InternalError(_) => e,
            other => ServiceError::InternalError(other.to_string()),
        }
    })?;

    if scores.nrows() != batch.shape()[0] || scores.ncols() != NUM_CLASSES {
        error!(patient_id, shape = ?scores.shape(), "Unexpected score shape");
        return Err(ServiceError::InternalError(format!(
            "model returned scores of shape {:?} for {} recordings, expected {} classes",
            scores.shape(),
            batch.shape()[0],
            NUM_CLASSES
        )));
    }

    let prediction = summarize(patient_id, &scores, username);
    info!(patient_id, user = %username, "Prediction completed");
    Ok(prediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::PatientDataset;
    use crate::models::classifier::SequenceClassifier;
    use crate::models::types::{LoadedModel, ModelMetadata};
    use async_trait::async_trait;
    use ndarray::{array, Array3};
    use quickcheck_macros::quickcheck;
    use std::sync::Arc;

    /// Epileptic when the first timestep is positive
    struct SignOfFirst;

    #[async_trait]
    impl SequenceClassifier for SignOfFirst {
        async fn predict(&self, batch: &Array3<f32>) -> Result<Array2<f32>> {
            let n = batch.shape()[0];
            let mut out = Array2::zeros((n, 2));
            for i in 0..n {
                if batch[[i, 0, 0]] > 0.0 {
                    out[[i, 0]] = 0.1;
                    out[[i, 1]] = 0.9;
                } else {
                    out[[i, 0]] = 0.7;
                    out[[i, 1]] = 0.3;
                }
            }
            Ok(out)
        }
    }

    struct Broken;

    #[async_trait]
    impl SequenceClassifier for Broken {
        async fn predict(&self, _batch: &Array3<f32>) -> Result<Array2<f32>> {
            Err(ServiceError::Generic("tensor shape mismatch".to_string()))
        }
    }

    struct WrongWidth;

    #[async_trait]
    impl SequenceClassifier for WrongWidth {
        async fn predict(&self, batch: &Array3<f32>) -> Result<Array2<f32>> {
            Ok(Array2::zeros((batch.shape()[0], 3)))
        }
    }

    fn snapshot(classifier: Arc<dyn SequenceClassifier>) -> Snapshot {
        let dataset = PatientDataset::new(
            vec!["X1".to_string(), "X2".to_string()],
            vec![5, 6, 5, 5],
            array![[-1.0, 0.0], [1.0, 0.0], [2.0, 0.0], [-3.0, 0.0]],
        )
        .unwrap();

        Snapshot {
            dataset: Some(Arc::new(dataset)),
            model: Some(Arc::new(LoadedModel {
                classifier,
                metadata: ModelMetadata {
                    name: "epilepsy_model".to_string(),
                    version: "1".to_string(),
                    stage: "Production".to_string(),
                    run_id: None,
                    loaded_at: chrono::Utc::now(),
                },
            })),
        }
    }

    #[test]
    fn test_argmax_first_wins_on_tie() {
        assert_eq!(argmax(array![0.5, 0.5].view()), 0);
        assert_eq!(argmax(array![0.2, 0.8].view()), 1);
    }

    #[test]
    fn test_summary_messages() {
        assert_eq!(
            summary_message(3, &[1, 4]),
            "Patient 3 predicted epileptic recordings at rows: [1, 4]"
        );
        assert_eq!(
            summary_message(3, &[]),
            "Patient 3 predicted as non-epileptic in all recordings."
        );
    }

    #[test]
    fn test_summarize_uses_one_based_rows() {
        let scores = array![[0.9, 0.1], [0.2, 0.8], [0.4, 0.6]];
        let prediction = summarize(11, &scores, "alice");

        assert_eq!(prediction.total_recordings, 3);
        assert_eq!(prediction.predictions, vec![0, 1, 1]);
        assert_eq!(prediction.epileptic_recordings, vec![2, 3]);
        assert_eq!(prediction.confidence_scores, vec![0.9, 0.8, 0.6]);
        assert_eq!(prediction.processed_by, "alice");
    }

    #[tokio::test]
    async fn test_predict_patient() {
        let prediction = predict_patient(&snapshot(Arc::new(SignOfFirst)), 5, "bob")
            .await
            .unwrap();

        assert_eq!(prediction.total_recordings, 3);
        assert_eq!(prediction.predictions, vec![0, 1, 0]);
        assert_eq!(prediction.epileptic_recordings, vec![2]);
        assert_eq!(prediction.confidence_scores, vec![0.7, 0.9, 0.7]);
        assert!(prediction.message.contains("[2]"));
    }

    #[tokio::test]
    async fn test_unknown_patient_not_found() {
        let result = predict_patient(&snapshot(Arc::new(SignOfFirst)), 99, "bob").await;
        assert!(matches!(result, Err(ServiceError::NotFound { patient_id: 99 })));
    }

    #[tokio::test]
    async fn test_not_ready_is_unavailable() {
        let mut snap = snapshot(Arc::new(SignOfFirst));
        snap.model = None;
        let result = predict_patient(&snap, 5, "bob").await;
        assert!(matches!(result, Err(ServiceError::ServiceUnavailable)));

        let result = predict_patient(&Snapshot::default(), 5, "bob").await;
        assert!(matches!(result, Err(ServiceError::ServiceUnavailable)));
    }

    #[tokio::test]
    async fn test_model_error_becomes_internal() {
        let result = predict_patient(&snapshot(Arc::new(Broken)), 5, "bob").await;
        match result {
            Err(ServiceError::InternalError(msg)) => assert!(msg.contains("tensor shape mismatch")),
            other => panic!("expected InternalError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_score_width_is_internal() {
        let result = predict_patient(&snapshot(Arc::new(WrongWidth)), 5, "bob").await;
        assert!(matches!(result, Err(ServiceError::InternalError(_))));
    }

    #[quickcheck]
    fn prop_summary_invariants(raw: Vec<(u8, u8)>) -> bool {
        let n = raw.len();
        let flat: Vec<f32> = raw
            .iter()
            .flat_map(|(a, b)| {
                let total = *a as f32 + *b as f32 + 1.0;
                vec![(*a as f32 + 0.5) / total, (*b as f32 + 0.5) / total]
            })
            .collect();
        let scores = Array2::from_shape_vec((n, 2), flat).unwrap();
        let prediction = summarize(1, &scores, "u");

        let increasing = prediction.epileptic_recordings.windows(2).all(|w| w[0] < w[1]);
        let in_range = prediction
            .epileptic_recordings
            .iter()
            .all(|i| *i >= 1 && *i <= n);
        let scores_ok = prediction
            .confidence_scores
            .iter()
            .all(|s| (0.0..=1.0).contains(s));

        prediction.predictions.len() == n
            && prediction.confidence_scores.len() == n
            && increasing
            && in_range
            && scores_ok
    }
}
