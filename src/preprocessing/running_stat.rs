//! Streaming moment estimation for fixed-shape observations.
//!
//! Tracks the first and second moments of a stream of tensors using Welford's
//! online algorithm, elementwise over a fixed shape:
//!
//! ```text
//! For each new observation x:
//!   n = n + 1
//!   delta = x - mean
//!   mean = mean + delta / n
//!   S = S + delta × (x - mean)      // uses the updated mean
//!
//! variance = S / (n - 1)            // n > 1
//! variance = mean²                  // n <= 1
//! ```
//!
//! The `mean²` fallback for `n <= 1` is not a true variance. It keeps
//! `x / (std + ε)` defined for the first samples of a stream, and downstream
//! normalization depends on it.
//!
//! # Example
//!
//! ```
//! use ndarray::{arr1, IxDyn};
//! use trajectory_features::preprocessing::StreamingMomentEstimator;
//!
//! let mut stats = StreamingMomentEstimator::new(&[2]);
//! for x in [[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]] {
//!     stats.push(arr1(&x).into_dyn().view()).unwrap();
//! }
//!
//! assert_eq!(stats.n(), 3);
//! assert!((stats.mean()[IxDyn(&[0])] - 2.0).abs() < 1e-12);
//! assert!((stats.var()[IxDyn(&[1])] - 100.0).abs() < 1e-9);
//! ```

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type for normalization operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// Observation shape doesn't match the configured shape.
    ShapeMismatch {
        /// Configured shape
        expected: Vec<usize>,
        /// Shape of the rejected observation
        actual: Vec<usize>,
    },

    /// A checkpoint's `mean` and `sum_sq_dev` disagree on shape.
    SnapshotShapeMismatch {
        /// Shape of the checkpointed mean
        mean: Vec<usize>,
        /// Shape of the checkpointed sum of squared deviations
        sum_sq_dev: Vec<usize>,
    },

    /// A checkpoint with zero observations carries non-zero moments.
    NonZeroEmptySnapshot,
}

impl fmt::Display for NormalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, actual } => {
                write!(
                    f,
                    "Observation shape {:?} doesn't match configured shape {:?}",
                    actual, expected
                )
            }
            Self::SnapshotShapeMismatch { mean, sum_sq_dev } => {
                write!(
                    f,
                    "Snapshot mean shape {:?} doesn't match sum_sq_dev shape {:?}",
                    mean, sum_sq_dev
                )
            }
            Self::NonZeroEmptySnapshot => {
                write!(f, "Snapshot has count 0 but non-zero mean or sum_sq_dev")
            }
        }
    }
}

impl std::error::Error for NormalizationError {}

/// Serializable checkpoint of a [`StreamingMomentEstimator`].
///
/// Holds exactly the three quantities needed to resume estimation:
/// the sample count, the running mean, and the running sum of squared
/// deviations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentSnapshot {
    /// Number of observations pushed
    pub count: u64,

    /// Running mean
    pub mean: ArrayD<f64>,

    /// Running sum of squared deviations from the mean
    pub sum_sq_dev: ArrayD<f64>,
}

/// Running mean/variance over a stream of fixed-shape tensors.
///
/// # Performance
///
/// - `push`: O(size of shape), no allocation beyond one temporary
/// - Memory: two tensors of the configured shape, independent of stream length
///
/// # Thread Safety
///
/// Not synchronized internally. Owned by a single producer.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingMomentEstimator {
    /// Number of observations seen
    count: u64,

    /// Running mean (Welford)
    mean: ArrayD<f64>,

    /// Running sum of squared deviations (Welford's M2)
    sum_sq_dev: ArrayD<f64>,
}

impl StreamingMomentEstimator {
    /// Create an empty estimator for observations of the given shape.
    ///
    /// An empty slice gives a scalar (0-dimensional) shape.
    pub fn new(shape: &[usize]) -> Self {
        Self {
            count: 0,
            mean: ArrayD::zeros(IxDyn(shape)),
            sum_sq_dev: ArrayD::zeros(IxDyn(shape)),
        }
    }

    /// Restore an estimator from a checkpoint.
    ///
    /// # Errors
    ///
    /// - [`NormalizationError::SnapshotShapeMismatch`] if `mean` and
    ///   `sum_sq_dev` differ in shape
    /// - [`NormalizationError::NonZeroEmptySnapshot`] if `count == 0` but
    ///   either tensor holds a non-zero value
    pub fn from_snapshot(snapshot: MomentSnapshot) -> Result<Self, NormalizationError> {
        if snapshot.mean.shape() != snapshot.sum_sq_dev.shape() {
            return Err(NormalizationError::SnapshotShapeMismatch {
                mean: snapshot.mean.shape().to_vec(),
                sum_sq_dev: snapshot.sum_sq_dev.shape().to_vec(),
            });
        }

        if snapshot.count == 0
            && snapshot
                .mean
                .iter()
                .chain(snapshot.sum_sq_dev.iter())
                .any(|&v| v != 0.0)
        {
            return Err(NormalizationError::NonZeroEmptySnapshot);
        }

        Ok(Self {
            count: snapshot.count,
            mean: snapshot.mean,
            sum_sq_dev: snapshot.sum_sq_dev,
        })
    }

    /// Capture the current state for checkpointing.
    pub fn snapshot(&self) -> MomentSnapshot {
        MomentSnapshot {
            count: self.count,
            mean: self.mean.clone(),
            sum_sq_dev: self.sum_sq_dev.clone(),
        }
    }

    /// Add one observation.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizationError::ShapeMismatch`] if `x` does not have
    /// exactly the configured shape. State is left untouched in that case.
    pub fn push(&mut self, x: ArrayViewD<'_, f64>) -> Result<(), NormalizationError> {
        if x.shape() != self.mean.shape() {
            return Err(NormalizationError::ShapeMismatch {
                expected: self.mean.shape().to_vec(),
                actual: x.shape().to_vec(),
            });
        }

        self.count += 1;
        let n = self.count as f64;

        let delta = &x - &self.mean;
        self.mean += &(&delta / n);
        // Second factor uses the updated mean
        let delta2 = &x - &self.mean;
        self.sum_sq_dev += &(&delta * &delta2);

        Ok(())
    }

    /// Number of observations pushed.
    #[inline]
    pub fn n(&self) -> u64 {
        self.count
    }

    /// True if nothing has been pushed since construction or the last reset.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Configured observation shape.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.mean.shape()
    }

    /// Running mean.
    #[inline]
    pub fn mean(&self) -> &ArrayD<f64> {
        &self.mean
    }

    /// Running sum of squared deviations.
    #[inline]
    pub fn sum_sq_dev(&self) -> &ArrayD<f64> {
        &self.sum_sq_dev
    }

    /// Sample variance (ddof = 1), or `mean²` while `n <= 1`.
    pub fn var(&self) -> ArrayD<f64> {
        if self.count > 1 {
            &self.sum_sq_dev / (self.count - 1) as f64
        } else {
            self.mean.mapv(|m| m * m)
        }
    }

    /// Elementwise square root of [`Self::var`].
    pub fn std(&self) -> ArrayD<f64> {
        self.var().mapv(f64::sqrt)
    }

    /// Discard all state. The shape is kept.
    pub fn reset(&mut self) {
        self.count = 0;
        self.mean.fill(0.0);
        self.sum_sq_dev.fill(0.0);
    }
}
