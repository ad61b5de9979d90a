//! Online feature preprocessing.
//!
//! Everything here runs one sample at a time, so it can sit inside an
//! environment step loop without buffering the whole dataset:
//!
//! - **Running Statistics**: Welford mean/variance over arbitrary tensor shapes
//!   - Numerically stable single-pass update
//!   - Snapshot/restore for resuming a run
//!
//! - **Normalization**: Adaptive standardization
//!   - Optional centering and scaling
//!   - Optional symmetric clipping
//!   - Discounted-return statistics for reward scaling (`gamma`)
//!   - Pass-through transform when disabled
//!
//! # Example
//!
//! ```
//! use ndarray::{arr1, ArrayD};
//! use trajectory_features::preprocessing::{build_transform, FeatureTransform, NormalizerConfig};
//!
//! let config = NormalizerConfig::new(vec![2]).with_clip(5.0);
//! let mut transform = build_transform(&config);
//!
//! let x: ArrayD<f64> = arr1(&[1.0, -2.0]).into_dyn();
//! let y = transform.transform(x.view()).unwrap();
//! assert_eq!(y.shape(), &[2]);
//! ```

pub mod normalization;
pub mod running_stat;

// Re-export commonly used types for convenience
pub use normalization::{
    build_transform, AdaptiveNormalizer, FeatureTransform, NoOpTransform, NormalizerConfig,
    STD_EPSILON,
};
pub use running_stat::{MomentSnapshot, NormalizationError, StreamingMomentEstimator};
