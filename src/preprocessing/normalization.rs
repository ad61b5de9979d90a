//! Online feature normalization.
//!
//! This module turns raw per-step observations into zero-mean, unit-variance
//! features using running statistics from [`StreamingMomentEstimator`]. It
//! needs no pass over historical data.
//!
//! # Transform Steps
//!
//! For each observation `x` handed to [`AdaptiveNormalizer::transform`]:
//!
//! ```text
//! 1. acc = acc × γ + x; push(acc)     // if γ configured (reward normalization)
//!    push(x)                          // otherwise
//! 2. x = x - mean                     // if center
//! 3. x = x / (std + 1e-8)             // if scale && center
//!    x = (x - mean)/(std + 1e-8) + mean   // if scale && !center
//! 4. x = clip(x, -c, c)               // if clip configured
//! ```
//!
//! Step 3 without centering scales the deviation from the mean and then adds the
//! raw mean back. It is not a z-score, and existing callers rely on that.
//!
//! # Architecture
//!
//! ```text
//! FeatureTransform (trait)
//!     ├── AdaptiveNormalizer   (running statistics)
//!     └── NoOpTransform        (identity)
//! ```
//!
//! Pick the implementation once from configuration with [`build_transform`].
//!
//! # Example
//!
//! ```
//! use ndarray::arr1;
//! use trajectory_features::preprocessing::{build_transform, FeatureTransform, NormalizerConfig};
//!
//! let mut transform = build_transform(&NormalizerConfig::new(vec![2]));
//!
//! for x in [[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]] {
//!     let normalized = transform.transform(arr1(&x).into_dyn().view()).unwrap();
//!     assert_eq!(normalized.shape(), &[2]);
//! }
//! ```

use super::running_stat::{NormalizationError, StreamingMomentEstimator};
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

/// Added to the standard deviation before dividing.
pub const STD_EPSILON: f64 = 1e-8;

/// Common interface for per-observation feature transforms.
///
/// A pipeline holds a `Box<dyn FeatureTransform>`. This lets it enable or
/// disable normalization without branching at every call site.
pub trait FeatureTransform: Send {
    /// Transform one observation, updating internal state if any.
    fn transform(&mut self, x: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, NormalizationError>;

    /// Transform each row of a `[time × feature]` sequence in order.
    ///
    /// Default implementation calls `transform` once per row, so stateful
    /// transforms see the rows as a stream.
    fn transform_sequence(
        &mut self,
        sequence: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, NormalizationError> {
        let mut out = Array2::zeros(sequence.raw_dim());
        for (row, mut target) in sequence.outer_iter().zip(out.outer_iter_mut()) {
            let transformed = self.transform(row.into_dyn())?;
            for (t, &v) in target.iter_mut().zip(transformed.iter()) {
                *t = v;
            }
        }
        Ok(out)
    }

    /// Reset transform state.
    fn reset(&mut self);
}

/// Configuration for feature normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Use [`AdaptiveNormalizer`] when true, [`NoOpTransform`] when false
    pub enabled: bool,

    /// Observation shape (empty for scalar streams such as rewards)
    pub shape: Vec<usize>,

    /// Subtract the running mean
    pub center: bool,

    /// Divide by the running standard deviation
    pub scale: bool,

    /// Clip output to `[-clip, clip]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<f64>,

    /// Discount factor for reward-style decayed accumulation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
}

impl NormalizerConfig {
    /// Centering and scaling enabled, no clipping, no decay.
    pub fn new(shape: Vec<usize>) -> Self {
        Self {
            enabled: true,
            shape,
            center: true,
            scale: true,
            clip: None,
            gamma: None,
        }
    }

    /// Scalar reward normalization: scale only, statistics over the
    /// discounted return.
    ///
    /// ```
    /// use trajectory_features::preprocessing::NormalizerConfig;
    ///
    /// let config = NormalizerConfig::reward(0.99);
    /// assert!(config.shape.is_empty());
    /// assert!(!config.center);
    /// assert_eq!(config.gamma, Some(0.99));
    /// ```
    pub fn reward(gamma: f64) -> Self {
        Self {
            enabled: true,
            shape: Vec::new(),
            center: false,
            scale: true,
            clip: None,
            gamma: Some(gamma),
        }
    }

    /// Identity transform for the given shape.
    pub fn disabled(shape: Vec<usize>) -> Self {
        Self {
            enabled: false,
            ..Self::new(shape)
        }
    }

    /// Enable or disable centering.
    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    /// Enable or disable scaling.
    pub fn with_scale(mut self, scale: bool) -> Self {
        self.scale = scale;
        self
    }

    /// Set the clip magnitude.
    pub fn with_clip(mut self, clip: f64) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Set the discount factor for decayed accumulation.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    /// Validate configuration.
    ///
    /// Returns Ok(()) if valid, Err(msg) otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(clip) = self.clip {
            if !clip.is_finite() || clip <= 0.0 {
                return Err(format!("clip must be finite and > 0, got {}", clip));
            }
        }

        if let Some(gamma) = self.gamma {
            if !gamma.is_finite() || gamma <= 0.0 {
                return Err(format!("gamma must be finite and > 0, got {}", gamma));
            }
        }

        Ok(())
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self::new(vec![4])
    }
}

/// Normalizer driven by running statistics.
///
/// Every call to [`FeatureTransform::transform`] first updates the statistics
/// with the incoming observation (or the decayed accumulator), then normalizes
/// the observation with the updated mean and standard deviation.
///
/// # Example
///
/// ```
/// use ndarray::{arr0, IxDyn};
/// use trajectory_features::preprocessing::{
///     AdaptiveNormalizer, FeatureTransform, NormalizerConfig,
/// };
///
/// let mut normalizer = AdaptiveNormalizer::new(NormalizerConfig::new(vec![]));
///
/// // The first sample is its own mean, so it centers to zero
/// let y = normalizer.transform(arr0(42.0).into_dyn().view()).unwrap();
/// assert_eq!(y[IxDyn(&[])], 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct AdaptiveNormalizer {
    config: NormalizerConfig,

    /// Running statistics over pushed observations
    stats: StreamingMomentEstimator,

    /// Discounted running sum, present iff gamma is configured
    decayed: Option<ArrayD<f64>>,
}

impl AdaptiveNormalizer {
    /// Create a normalizer from configuration.
    ///
    /// # Panics
    ///
    /// Panics if configuration is invalid (use `validate()` first).
    pub fn new(config: NormalizerConfig) -> Self {
        config
            .validate()
            .expect("Invalid normalizer configuration");

        let decayed = config
            .gamma
            .map(|_| ArrayD::zeros(IxDyn(&config.shape)));

        Self {
            stats: StreamingMomentEstimator::new(&config.shape),
            decayed,
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Running statistics used for normalization.
    pub fn stats(&self) -> &StreamingMomentEstimator {
        &self.stats
    }

    /// Current decayed accumulator (None unless gamma is configured).
    pub fn decayed_accumulator(&self) -> Option<&ArrayD<f64>> {
        self.decayed.as_ref()
    }

    fn check_shape(&self, x: &ArrayViewD<'_, f64>) -> Result<(), NormalizationError> {
        if x.shape() != self.config.shape.as_slice() {
            return Err(NormalizationError::ShapeMismatch {
                expected: self.config.shape.clone(),
                actual: x.shape().to_vec(),
            });
        }
        Ok(())
    }
}

impl FeatureTransform for AdaptiveNormalizer {
    fn transform(&mut self, x: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, NormalizationError> {
        // Reject before touching the accumulator
        self.check_shape(&x)?;

        match (self.decayed.as_mut(), self.config.gamma) {
            (Some(acc), Some(gamma)) => {
                acc.mapv_inplace(|a| a * gamma);
                *acc += &x;
                self.stats.push(acc.view())?;
            }
            _ => self.stats.push(x.view())?,
        }

        let mean = self.stats.mean();
        let mut out = x.to_owned();

        if self.config.center {
            out -= mean;
        }

        if self.config.scale {
            let denom = self.stats.std() + STD_EPSILON;
            if self.config.center {
                out /= &denom;
            } else {
                let diff = (&out - mean) / &denom;
                out = diff + mean;
            }
        }

        if let Some(clip) = self.config.clip {
            out.mapv_inplace(|v| v.clamp(-clip, clip));
        }

        Ok(out)
    }

    fn reset(&mut self) {
        if let Some(acc) = self.decayed.as_mut() {
            acc.fill(0.0);
        }
        self.stats.reset();
    }
}

/// Identity transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTransform;

impl FeatureTransform for NoOpTransform {
    fn transform(&mut self, x: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, NormalizationError> {
        Ok(x.to_owned())
    }

    fn reset(&mut self) {}
}

/// Build the transform selected by `config.enabled`.
///
/// # Panics
///
/// Panics if an enabled configuration is invalid.
pub fn build_transform(config: &NormalizerConfig) -> Box<dyn FeatureTransform> {
    if config.enabled {
        log::debug!(
            "Adaptive normalizer: shape={:?} center={} scale={} clip={:?} gamma={:?}",
            config.shape,
            config.center,
            config.scale,
            config.clip,
            config.gamma
        );
        Box::new(AdaptiveNormalizer::new(config.clone()))
    } else {
        log::debug!("Normalization disabled, using identity transform");
        Box::new(NoOpTransform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1, arr2};

    fn scalar(v: f64) -> ArrayD<f64> {
        arr0(v).into_dyn()
    }

    fn value(a: &ArrayD<f64>) -> f64 {
        a[IxDyn(&[])]
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = NormalizerConfig::default();
        assert!(config.enabled);
        assert!(config.center && config.scale);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(NormalizerConfig::new(vec![]).with_clip(0.0).validate().is_err());
        assert!(NormalizerConfig::new(vec![]).with_clip(f64::NAN).validate().is_err());
        assert!(NormalizerConfig::new(vec![]).with_gamma(0.0).validate().is_err());
        assert!(NormalizerConfig::new(vec![]).with_gamma(-0.5).validate().is_err());
        assert!(NormalizerConfig::new(vec![])
            .with_clip(5.0)
            .with_gamma(0.99)
            .validate()
            .is_ok());
    }

    #[test]
    #[should_panic(expected = "Invalid normalizer configuration")]
    fn test_invalid_config_panics() {
        let _ = AdaptiveNormalizer::new(NormalizerConfig::new(vec![]).with_clip(-1.0));
    }

    #[test]
    fn test_first_sample_centers_to_zero() {
        let mut normalizer = AdaptiveNormalizer::new(NormalizerConfig::new(vec![2]));
        let out = normalizer
            .transform(arr1(&[3.0, -4.0]).into_dyn().view())
            .unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_center_and_scale_second_sample() {
        let mut normalizer = AdaptiveNormalizer::new(NormalizerConfig::new(vec![]));
        normalizer.transform(scalar(0.0).view()).unwrap();
        let out = normalizer.transform(scalar(10.0).view()).unwrap();

        // mean = 5, var = 50
        let expected = 5.0 / (50.0_f64.sqrt() + STD_EPSILON);
        assert!((value(&out) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_passthrough_when_center_and_scale_disabled() {
        let config = NormalizerConfig::new(vec![2])
            .with_center(false)
            .with_scale(false);
        let mut normalizer = AdaptiveNormalizer::new(config);

        for x in [[1.0, 2.0], [7.0, -3.0], [0.5, 0.25]] {
            let input = arr1(&x).into_dyn();
            let out = normalizer.transform(input.view()).unwrap();
            assert_eq!(out, input);
        }
        // Statistics still advance
        assert_eq!(normalizer.stats().n(), 3);
    }

    #[test]
    fn test_scale_without_center_adds_mean_back() {
        let config = NormalizerConfig::new(vec![]).with_center(false);
        let mut normalizer = AdaptiveNormalizer::new(config);

        let first = normalizer.transform(scalar(0.0).view()).unwrap();
        assert_eq!(value(&first), 0.0);

        // mean = 0.5, var = 0.5: (1 - 0.5) / sqrt(0.5) + 0.5
        let second = normalizer.transform(scalar(1.0).view()).unwrap();
        let expected = 0.5 / (0.5_f64.sqrt() + STD_EPSILON) + 0.5;
        assert!((value(&second) - expected).abs() < 1e-12);

        // Not a textbook z-score
        let zscore = 0.5 / 0.5_f64.sqrt();
        assert!((value(&second) - zscore).abs() > 0.4);
    }

    #[test]
    fn test_scale_uses_mean_squared_fallback_on_first_sample() {
        let mut normalizer =
            AdaptiveNormalizer::new(NormalizerConfig::new(vec![]).with_center(false));
        // mean = 4, var = 16 → std = 4: (4 - 4) / 4 + 4 = 4
        let out = normalizer.transform(scalar(4.0).view()).unwrap();
        assert!((value(&out) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_bounds_output() {
        let config = NormalizerConfig::new(vec![]).with_clip(0.5);
        let mut normalizer = AdaptiveNormalizer::new(config);
        normalizer.transform(scalar(0.0).view()).unwrap();
        let out = normalizer.transform(scalar(10.0).view()).unwrap();
        assert_eq!(value(&out), 0.5);

        let low = normalizer.transform(scalar(-100.0).view()).unwrap();
        assert_eq!(value(&low), -0.5);
    }

    #[test]
    fn test_gamma_accumulates_decayed_sum() {
        let config = NormalizerConfig::new(vec![])
            .with_center(false)
            .with_scale(false)
            .with_gamma(0.5);
        let mut normalizer = AdaptiveNormalizer::new(config);

        let a = normalizer.transform(scalar(1.0).view()).unwrap();
        let b = normalizer.transform(scalar(1.0).view()).unwrap();

        // Output is the raw input; statistics see 1.0 then 1.5
        assert_eq!(value(&a), 1.0);
        assert_eq!(value(&b), 1.0);
        assert_eq!(value(normalizer.decayed_accumulator().unwrap()), 1.5);
        assert_eq!(value(normalizer.stats().mean()), 1.25);
    }

    #[test]
    fn test_no_accumulator_without_gamma() {
        let normalizer = AdaptiveNormalizer::new(NormalizerConfig::new(vec![3]));
        assert!(normalizer.decayed_accumulator().is_none());
    }

    #[test]
    fn test_reset_clears_statistics_and_accumulator() {
        let config = NormalizerConfig::reward(0.9);
        let mut normalizer = AdaptiveNormalizer::new(config);

        let first: Vec<f64> = (0..10)
            .map(|r| value(&normalizer.transform(scalar(r as f64).view()).unwrap()))
            .collect();

        normalizer.reset();
        assert_eq!(normalizer.stats().n(), 0);
        assert_eq!(value(normalizer.decayed_accumulator().unwrap()), 0.0);

        let second: Vec<f64> = (0..10)
            .map(|r| value(&normalizer.transform(scalar(r as f64).view()).unwrap()))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_shape_mismatch_leaves_state_untouched() {
        let mut normalizer =
            AdaptiveNormalizer::new(NormalizerConfig::new(vec![2]).with_gamma(0.9));
        normalizer.transform(arr1(&[1.0, 1.0]).into_dyn().view()).unwrap();
        let before = normalizer.decayed_accumulator().unwrap().clone();

        let result = normalizer.transform(arr1(&[1.0, 2.0, 3.0]).into_dyn().view());
        assert!(matches!(
            result,
            Err(NormalizationError::ShapeMismatch { .. })
        ));
        assert_eq!(normalizer.stats().n(), 1);
        assert_eq!(normalizer.decayed_accumulator().unwrap(), &before);
    }

    #[test]
    fn test_noop_is_identity() {
        let mut transform = NoOpTransform;
        let input = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
        assert_eq!(transform.transform(input.view()).unwrap(), input);
        transform.reset();
        assert_eq!(transform.transform(input.view()).unwrap(), input);
    }

    #[test]
    fn test_build_transform_selects_implementation() {
        let mut enabled = build_transform(&NormalizerConfig::new(vec![]));
        let mut disabled = build_transform(&NormalizerConfig::disabled(vec![]));

        let a = enabled.transform(scalar(7.0).view()).unwrap();
        let b = disabled.transform(scalar(7.0).view()).unwrap();
        assert_eq!(value(&a), 0.0);
        assert_eq!(value(&b), 7.0);
    }

    #[test]
    fn test_transform_sequence_streams_rows() {
        let mut normalizer = AdaptiveNormalizer::new(NormalizerConfig::new(vec![2]));
        let seq = arr2(&[[0.0, 1.0], [10.0, 1.0]]);
        let out = normalizer.transform_sequence(seq.view()).unwrap();

        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out[[0, 0]], 0.0);
        let expected = 5.0 / (50.0_f64.sqrt() + STD_EPSILON);
        assert!((out[[1, 0]] - expected).abs() < 1e-12);
        // Constant column: zero deviation
        assert_eq!(out[[1, 1]], 0.0);
        assert_eq!(normalizer.stats().n(), 2);
    }

    #[test]
    fn test_transform_sequence_rejects_wrong_width() {
        let mut normalizer = AdaptiveNormalizer::new(NormalizerConfig::new(vec![3]));
        let seq = arr2(&[[0.0, 1.0]]);
        assert!(normalizer.transform_sequence(seq.view()).is_err());
    }
}
