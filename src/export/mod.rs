//! Data Export Module
//!
//! Export assembled trajectory windows for training in Python/PyTorch.
//!
//! # Supported Formats
//!
//! - NumPy (.npy) - Windows (`f64`) and validity masks (`u8`)
//! - JSON - Shapes, mask coverage and export timestamp
//!
//! # Output Layout
//!
//! ```text
//! output_dir/
//! ├── windows.npy      [N × window_length × feature_dim]  float64
//! ├── masks.npy        [N × window_length]                uint8
//! └── metadata.json
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use trajectory_features::export::NumpyExporter;
//! use trajectory_features::sequence_builder::split_future;
//!
//! let sequence = Array2::<f64>::zeros((12, 4));
//! let (windows, masks) = split_future(sequence.view(), 10);
//!
//! let exporter = NumpyExporter::new("out/episode_0001");
//! let metadata = exporter.export_split(&windows, &masks, None)?;
//! assert_eq!(metadata.n_windows, 12);
//! # Ok::<(), trajectory_features::export::ExportError>(())
//! ```

use crate::config::ExperimentMetadata;
use ndarray::{Array2, Array3};
use ndarray_npy::{WriteNpyError, WriteNpyExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Error type for export operations.
#[derive(Debug)]
pub enum ExportError {
    /// Filesystem error
    Io(std::io::Error),

    /// NumPy serialization error
    Npy(WriteNpyError),

    /// Metadata serialization error
    Json(serde_json::Error),

    /// Windows and masks don't describe the same batch.
    ShapeMismatch {
        /// `(N, window_length)` of the windows
        windows: (usize, usize),
        /// `(N, window_length)` of the masks
        masks: (usize, usize),
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Npy(e) => write!(f, "Failed to write .npy: {}", e),
            Self::Json(e) => write!(f, "Failed to write metadata: {}", e),
            Self::ShapeMismatch { windows, masks } => {
                write!(
                    f,
                    "Windows {:?} and masks {:?} differ in (N, window_length)",
                    windows, masks
                )
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Npy(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::ShapeMismatch { .. } => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WriteNpyError> for ExportError {
    fn from(e: WriteNpyError) -> Self {
        Self::Npy(e)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Metadata written next to an exported split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Number of windows
    pub n_windows: usize,

    /// Rows per window
    pub window_length: usize,

    /// Features per row
    pub feature_dim: usize,

    /// Mask entries equal to 1 (real, non-padded rows)
    pub valid_steps: usize,

    /// Experiment name, if the caller supplied metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,

    /// Export timestamp (RFC3339)
    pub export_timestamp: String,
}

/// NumPy exporter for trajectory windows.
#[derive(Debug, Clone)]
pub struct NumpyExporter {
    output_dir: PathBuf,
}

impl NumpyExporter {
    /// Exporter writing into `output_dir` (created on first export).
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write a `[N × T × F]` window batch to `{name}.npy`.
    pub fn export_windows(
        &self,
        name: &str,
        windows: &Array3<f64>,
    ) -> Result<PathBuf, ExportError> {
        let path = self.npy_path(name)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        windows.write_npy(&mut writer)?;

        let (n, t, f) = windows.dim();
        log::info!(
            "Exported windows: {} [{} × {} × {}]",
            path.display(),
            n,
            t,
            f
        );
        Ok(path)
    }

    /// Write a `[N × T]` mask batch to `{name}.npy`.
    pub fn export_masks(&self, name: &str, masks: &Array2<u8>) -> Result<PathBuf, ExportError> {
        let path = self.npy_path(name)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        masks.write_npy(&mut writer)?;

        let (n, t) = masks.dim();
        log::info!("Exported masks: {} [{} × {}]", path.display(), n, t);
        Ok(path)
    }

    /// Write `windows.npy`, `masks.npy` and `metadata.json`.
    ///
    /// # Errors
    ///
    /// [`ExportError::ShapeMismatch`] if windows and masks disagree on
    /// `(N, window_length)`; nothing is written in that case.
    pub fn export_split(
        &self,
        windows: &Array3<f64>,
        masks: &Array2<u8>,
        experiment: Option<&ExperimentMetadata>,
    ) -> Result<ExportMetadata, ExportError> {
        let (n, t, f) = windows.dim();
        if (n, t) != masks.dim() {
            return Err(ExportError::ShapeMismatch {
                windows: (n, t),
                masks: masks.dim(),
            });
        }

        self.export_windows("windows", windows)?;
        self.export_masks("masks", masks)?;

        let metadata = ExportMetadata {
            n_windows: n,
            window_length: t,
            feature_dim: f,
            valid_steps: masks.iter().filter(|&&m| m != 0).count(),
            experiment: experiment.map(|m| m.name.clone()),
            export_timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.export_metadata(&metadata)?;

        Ok(metadata)
    }

    fn export_metadata(&self, metadata: &ExportMetadata) -> Result<(), ExportError> {
        let path = self.output_dir.join("metadata.json");
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, metadata)?;

        log::info!("Exported metadata: {}", path.display());
        Ok(())
    }

    fn npy_path(&self, name: &str) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(format!("{name}.npy")))
    }
}
