//! Trajectory Features
//!
//! Online normalization and per-agent context windows for multi-agent
//! trajectory prediction.
//!
//! # Overview
//!
//! This library prepares the inputs of a trajectory predictor while an
//! environment is running:
//!
//! - **Normalization**: Streaming mean/variance with adaptive standardization,
//!   clipping and discounted-return reward scaling
//! - **Trajectory Buffer**: Per-agent timelines with linear gap interpolation
//! - **Context Windows**: Left-padded history, right-padded future, and
//!   neighbour selection with zero-filled slots
//! - **Export**: NumPy (.npy) windows and masks for Python/PyTorch
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Trajectory Features                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  preprocessing/    - Running moments and normalizers           │
//! │  sequence_builder/ - Agent store, padding, window splitting    │
//! │  config            - Serializable configuration (TOML/JSON)    │
//! │  export/           - NumPy export for Python/PyTorch           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use ndarray::arr1;
//! use trajectory_features::prelude::*;
//!
//! let config = ContextConfig::default();
//! let mut normalizer = build_transform(&config.feature_normalizer);
//! let mut store: AgentTrajectoryStore = AgentTrajectoryStore::new(config.buffer.clone());
//!
//! for t in 0..12 {
//!     let raw = arr1(&[t as f64, 2.0 * t as f64, 0.1, 5.0]).into_dyn();
//!     let normalized = normalizer.transform(raw.view()).unwrap();
//!     store.add(1, normalized.iter().copied().collect(), t).unwrap();
//! }
//!
//! let futures = store.query_futures(6, &[1], 10).unwrap();
//! assert_eq!(futures.shape(), &[1, 10, 4]);
//! ```

pub mod config;
pub mod export;
pub mod preprocessing;
pub mod prelude;
pub mod sequence_builder;

// Re-exports - Config
pub use config::{ContextConfig, ExperimentMetadata};

// Re-exports - Preprocessing
pub use preprocessing::{
    build_transform, AdaptiveNormalizer, FeatureTransform, MomentSnapshot, NoOpTransform,
    NormalizationError, NormalizerConfig, StreamingMomentEstimator,
};

// Re-exports - Sequence Building
pub use sequence_builder::{
    pad_future, pad_history, split_future, stack_windows, AgentTrajectoryStore, BufferConfig,
    BufferError, FeatureVec, QueryMode,
};

// Re-exports - Export
pub use export::{ExportError, ExportMetadata, NumpyExporter};
