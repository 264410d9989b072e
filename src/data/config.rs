use std::path::Path;

use serde::{Deserialize, Serialize};

/// Settings for one data-preparation run.
///
/// Everything the pipeline consumes is carried explicitly through this
/// struct; there is no process-wide configuration state.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Temporal downsampling rate; also the number of buckets per partition.
    pub sampling_rate: usize,
    /// Fraction of rows (by file order) assigned to the held-out partition.
    pub test_split: f64,
    /// Fraction of rows assigned to the validation partition.
    pub valid_split: f64,
    /// When set, only rows with these category labels are kept, and the
    /// held-out partition is keyed by label.
    pub labels: Option<Vec<String>>,
    pub annotation_x_scale: f64,
    pub annotation_y_scale: f64,
    /// Border exclusion: `1/fraction_to_remove` of the maximum coordinate is
    /// cut from each side of the recording extent.
    pub fraction_to_remove: f64,
    /// Tag describing the annotation source format.
    pub annotation_type: String,
    /// Prefix for serialized bucket file names.
    pub file_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 15,
            test_split: 0.15,
            valid_split: 0.15,
            labels: None,
            annotation_x_scale: 1.0,
            annotation_y_scale: 1.0,
            fraction_to_remove: 10.0,
            annotation_type: "stanford".into(),
            file_prefix: "stan".into(),
        }
    }
}

/// Persisted record of a data-preparation run.
///
/// A prior run is reused only when its fingerprint equals the requested one
/// and `complete` is set; anything else forces full regeneration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub sampling_rate: usize,
    pub labels: Option<Vec<String>>,
    pub input_folder: String,
    pub output_folder: String,
    pub annotation_x_scale: f64,
    pub annotation_y_scale: f64,
    pub fraction_to_remove: f64,
    pub annotation_type: String,
    pub complete: bool,
}

impl Fingerprint {
    pub fn new(cfg: &PipelineConfig, input_folder: &Path, output_folder: &Path) -> Self {
        Self {
            sampling_rate: cfg.sampling_rate,
            labels: cfg.labels.clone(),
            input_folder: input_folder.display().to_string(),
            output_folder: output_folder.display().to_string(),
            annotation_x_scale: cfg.annotation_x_scale,
            annotation_y_scale: cfg.annotation_y_scale,
            fraction_to_remove: cfg.fraction_to_remove,
            annotation_type: cfg.annotation_type.clone(),
            complete: false,
        }
    }

    pub fn completed(&self) -> Self {
        Self {
            complete: true,
            ..self.clone()
        }
    }
}
