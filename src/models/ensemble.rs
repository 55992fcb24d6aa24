//! Weighted ensemble over per-segment sub-models.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{load_artifact, Model, ModelError};
use crate::features::FeatureRow;

/// Per-pair ensemble weights plus a cache of loaded sub-models.
///
/// Weights file format: `{ "FIRST_SECOND": { "model_name": weight } }`.
/// Artifacts live at `<models_dir>/<FIRST>_<SECOND>_<model_name>.json`
/// and are loaded lazily, once per `(pair, model)` - the working set is
/// fixed, so there is no eviction.
pub struct WeightedEnsemble {
    weights: HashMap<String, HashMap<String, f64>>,
    models_dir: PathBuf,
    cache: HashMap<(String, String), Box<dyn Model>>,
}

impl WeightedEnsemble {
    pub fn load<P: AsRef<Path>>(weights_path: P, models_dir: P) -> Result<Self, ModelError> {
        let data = std::fs::read_to_string(weights_path.as_ref())?;
        let weights: HashMap<String, HashMap<String, f64>> = serde_json::from_str(&data)?;

        Ok(Self {
            weights,
            models_dir: models_dir.as_ref().to_path_buf(),
            cache: HashMap::new(),
        })
    }

    /// Number of station pairs with configured weights.
    pub fn pair_count(&self) -> usize {
        self.weights.len()
    }

    /// Weighted prediction for one feature row.
    ///
    /// `Ok(None)` when no weights exist for the pair (or the weights sum
    /// to zero); `Err` when a required artifact cannot be loaded.
    pub fn predict_one(
        &mut self,
        first: &str,
        second: &str,
        row: &FeatureRow,
    ) -> Result<Option<f64>, ModelError> {
        let pair_key = format!("{first}_{second}");
        let Some(wdict) = self.weights.get(&pair_key) else {
            return Ok(None);
        };
        let wdict = wdict.clone();

        let mut weighted = 0.0;
        let mut total = 0.0;

        for (model_name, w) in &wdict {
            let model = self.model_for(&pair_key, model_name)?;
            weighted += w * model.predict(row);
            total += w;
        }

        if total > 0.0 {
            Ok(Some(weighted / total))
        } else {
            Ok(None)
        }
    }

    fn model_for(&mut self, pair_key: &str, model_name: &str) -> Result<&dyn Model, ModelError> {
        let key = (pair_key.to_string(), model_name.to_string());
        if !self.cache.contains_key(&key) {
            let path = self.models_dir.join(format!("{pair_key}_{model_name}.json"));
            let model = load_artifact(&path)?;
            self.cache.insert(key.clone(), model);
        }
        Ok(self.cache[&key].as_ref())
    }
}
