//! Prediction models.
//!
//! The on-disk contract is a JSON artifact per `(first, second, model)`
//! that yields an object with a single `predict(row) -> f64` capability.
//! An artifact is either a bare model object (tagged with `kind`) or a
//! wrapper object that must carry the model under a `pipeline` key.

mod ensemble;

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::features::FeatureRow;

pub use ensemble::WeightedEnsemble;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Model artifact missing 'pipeline' key: {0}")]
    MissingPipeline(String),
    #[error("Model artifact is not an object: {0}")]
    InvalidArtifact(String),
}

/// The single capability every loaded model exposes.
pub trait Model: Send + Sync + std::fmt::Debug {
    fn predict(&self, row: &FeatureRow) -> f64;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelSpec {
    /// `intercept + sum(coefficient * feature value)`. Categorical
    /// features are addressed with `name=value` one-hot keys.
    Linear {
        #[serde(default)]
        intercept: f64,
        coefficients: HashMap<String, f64>,
    },
    Constant { value: f64 },
}

impl Model for ModelSpec {
    fn predict(&self, row: &FeatureRow) -> f64 {
        match self {
            ModelSpec::Linear {
                intercept,
                coefficients,
            } => {
                intercept
                    + coefficients
                        .iter()
                        .map(|(key, coef)| coef * row.value(key))
                        .sum::<f64>()
            }
            ModelSpec::Constant { value } => *value,
        }
    }
}

/// Load one artifact from disk, discriminating the bare-model form from
/// the `pipeline` wrapper form.
pub fn load_artifact(path: &Path) -> Result<Box<dyn Model>, ModelError> {
    let data = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&data)?;

    let serde_json::Value::Object(obj) = &value else {
        return Err(ModelError::InvalidArtifact(path.display().to_string()));
    };

    let spec_value = if obj.contains_key("kind") {
        value.clone()
    } else {
        obj.get("pipeline")
            .cloned()
            .ok_or_else(|| ModelError::MissingPipeline(path.display().to_string()))?
    };

    let spec: ModelSpec = serde_json::from_value(spec_value)?;
    Ok(Box::new(spec))
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::features::{FeatureRow, SegmentFeatureBuilder, TimeFeatureExtractor};

    pub fn sample_row() -> FeatureRow {
        use crate::darwin::forecasts::ForecastLocation;
        use crate::darwin::segments::{DepTimeKind, Segment};
        use chrono_tz::Europe::London;

        let seg = Segment {
            rid: Some("X1".to_string()),
            ssd: Some("2025-04-10".to_string()),
            first: "SOTON",
            second: "SOTPKWY",
            planned_dep: Some("09:00".to_string()),
            planned_arr: None,
            dep_time_for_prediction: Some("09:03".to_string()),
            dep_time_kind: DepTimeKind::Estimate,
            has_actual_dep: false,
            actual_dep_confirmed: None,
            departure_delay_min: Some(3.0),
            arrival_delay_min: None,
            dwell_delay_min: Some(1.0),
            loc_first: ForecastLocation::default(),
            loc_second: ForecastLocation::default(),
        };
        SegmentFeatureBuilder::new(TimeFeatureExtractor::default(), London)
            .build(&seg)
            .unwrap()
    }
}
