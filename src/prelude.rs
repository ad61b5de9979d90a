//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Usage
//!
//! ```
//! use trajectory_features::prelude::*;
//!
//! let config = ContextConfig::default();
//! let mut store: AgentTrajectoryStore = AgentTrajectoryStore::new(config.buffer);
//! store.add(1, vec![0.0; 4], 0).unwrap();
//! ```
//!
//! # What's Included
//!
//! ## Configuration
//! - [`ContextConfig`] - Normalizer + buffer configuration
//! - [`NormalizerConfig`] - Normalizer configuration
//! - [`BufferConfig`] - Trajectory buffer configuration
//! - [`ExperimentMetadata`] - Experiment tracking metadata
//!
//! ## Normalization
//! - [`FeatureTransform`] - Transform trait
//! - [`AdaptiveNormalizer`] - Running-statistics normalizer
//! - [`NoOpTransform`] - Identity transform
//! - [`StreamingMomentEstimator`] - Welford mean/variance
//!
//! ## Context Windows
//! - [`AgentTrajectoryStore`] - Per-agent trajectory buffer
//! - [`QueryMode`] - Neighbour eligibility rule
//! - [`split_future`] - Sliding future windows with masks
//!
//! ## Export
//! - [`NumpyExporter`] - Export to NumPy format

// ============================================================================
// Configuration
// ============================================================================

pub use crate::config::{ContextConfig, ExperimentMetadata};

// ============================================================================
// Preprocessing (Normalization)
// ============================================================================

pub use crate::preprocessing::{
    build_transform, AdaptiveNormalizer, FeatureTransform, MomentSnapshot, NoOpTransform,
    NormalizationError, NormalizerConfig, StreamingMomentEstimator,
};

// ============================================================================
// Sequence Building
// ============================================================================

pub use crate::sequence_builder::{
    pad_future, pad_history, split_future, stack_windows, AgentTrajectoryStore, BufferConfig,
    BufferError, FeatureVec, QueryMode, Timestep,
};

// ============================================================================
// Export
// ============================================================================

pub use crate::export::{ExportError, ExportMetadata, NumpyExporter};
