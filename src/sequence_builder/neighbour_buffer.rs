//! Per-agent trajectory buffer with windowed history/future queries.
//!
//! Agents are observed intermittently: a vehicle can leave sensor range for a
//! few steps and come back. The store keeps one contiguous, step-1 timeline per
//! agent by linearly interpolating any gap at insert time. Queries can then
//! slice windows by index arithmetic alone.
//!
//! # Window Arithmetic
//!
//! For a record spanning `[first, last]` queried at `curr`:
//!
//! ```text
//! hist_span = curr - first + 1          // observed steps up to and including curr
//! fut_span  = last - curr               // recorded steps after curr
//! n = max(hist_span - hist_length, 0)   // history window start
//! l = min(hist_span, hist_length)       // history rows used
//! f = min(fut_span, future_length)      // future rows used
//!
//! history = values[n .. n+l]            // left-padded
//! future  = values[n+l .. n+l+f]        // right-padded (query_futures)
//! ```
//!
//! # Query Modes
//!
//! - [`QueryMode::HistoryOnly`]: neighbours with any observed history,
//!   returned as left-padded history windows.
//! - [`QueryMode::FullFuture`]: neighbours with at least `future_length`
//!   recorded future steps, returned as left-padded history followed by the
//!   unpadded future.
//! - [`QueryMode::Default`]: reserved for "at least one future step" with loss
//!   masking; not implemented and always rejected.
//!
//! # Memory Management
//!
//! Records grow with every `add` until [`AgentTrajectoryStore::clear`] is called.
//! Setting [`BufferConfig::max_history`] evicts the oldest entries of each
//! record beyond the cap. Eviction moves `first` forward, so it changes
//! `hist_span` and the window arithmetic above. It is off by default.
//!
//! # Example
//!
//! ```
//! use trajectory_features::sequence_builder::{AgentTrajectoryStore, BufferConfig, QueryMode};
//!
//! let config = BufferConfig::new((1, 10, 2)).with_query_mode(QueryMode::HistoryOnly);
//! let mut store = AgentTrajectoryStore::new(config);
//!
//! store.add(7u64, vec![0.0, 0.0], 0).unwrap();
//! store.add(7u64, vec![3.0, 6.0], 3).unwrap(); // steps 1 and 2 interpolated
//! assert_eq!(store.timesteps(&7).unwrap(), vec![0, 1, 2, 3]);
//!
//! let (windows, kept) = store.query_neighbours(3, &[7], &[0], 2, 5).unwrap();
//! assert_eq!(windows.len(), 2); // one neighbour + one zero block
//! assert_eq!(kept, vec![0]);
//! assert_eq!(windows[0].shape(), &[5, 2]);
//! ```

use super::padding::{pad_future, pad_history, rows_to_array};
use super::windows::stack_windows;
use ahash::AHashMap;
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use std::ops::Range;
use std::sync::Arc;

/// Shared state vector.
///
/// Windows returned by queries are freshly allocated arrays. The `Arc` only
/// avoids copies when callers read records back through [`AgentTrajectoryStore::values`].
pub type FeatureVec = Arc<[f64]>;

/// Integer simulation step.
pub type Timestep = i64;

/// Default `(batch, max_time, feature_dim)`: 10 steps of (x, y, heading, speed).
pub const DEFAULT_STATE_SHAPE: (usize, usize, usize) = (1, 10, 4);

/// Error type for trajectory buffer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// State vector length doesn't match the configured feature dimension.
    FeatureCountMismatch {
        /// Configured feature dimension
        expected: usize,
        /// Length of the rejected vector
        actual: usize,
    },

    /// Timestep is not after the agent's last recorded timestep.
    NonMonotonicTimestep {
        /// Agent identity (debug-formatted)
        agent: String,
        /// Last recorded timestep
        last: Timestep,
        /// Rejected timestep
        timestep: Timestep,
    },

    /// A window is not a non-empty rectangular `[time × feature]` sequence.
    MalformedWindow(String),

    /// Query mode has no implementation.
    UnsupportedQueryMode(QueryMode),

    /// Agent has never been added.
    UnknownAgent(String),

    /// Candidate ids and external indices differ in length.
    IndexCountMismatch {
        /// Number of ids
        ids: usize,
        /// Number of indices
        indices: usize,
    },

    /// Windows can't be stacked into one batch.
    RaggedBatch {
        /// Position of the first mismatching window
        index: usize,
        /// Shape of the first window
        expected: (usize, usize),
        /// Shape of the mismatching window
        actual: (usize, usize),
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeatureCountMismatch { expected, actual } => {
                write!(
                    f,
                    "State vector length ({}) doesn't match feature dimension ({})",
                    actual, expected
                )
            }
            Self::NonMonotonicTimestep {
                agent,
                last,
                timestep,
            } => {
                write!(
                    f,
                    "Agent {}: timestep {} is not after last recorded timestep {}",
                    agent, timestep, last
                )
            }
            Self::MalformedWindow(reason) => write!(f, "Malformed window: {}", reason),
            Self::UnsupportedQueryMode(mode) => {
                write!(f, "Query mode '{}' is not implemented", mode)
            }
            Self::UnknownAgent(agent) => write!(f, "Unknown agent {}", agent),
            Self::IndexCountMismatch { ids, indices } => {
                write!(f, "Got {} candidate ids but {} indices", ids, indices)
            }
            Self::RaggedBatch {
                index,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Window {} has shape {:?}, expected {:?}",
                    index, actual, expected
                )
            }
        }
    }
}

impl std::error::Error for BufferError {}

/// Neighbour eligibility rule for [`AgentTrajectoryStore::query_neighbours`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Neighbours must have at least one observed step at query time
    HistoryOnly,

    /// Neighbours must have `future_length` recorded steps after query time
    FullFuture,

    /// At least one future step (needs masked loss); not implemented
    Default,
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HistoryOnly => "history_only",
            Self::FullFuture => "full_future",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// Configuration for the trajectory buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum history rows per window
    pub hist_length: usize,

    /// Maximum future rows per window
    pub future_length: usize,

    /// Neighbour eligibility rule
    pub query_mode: QueryMode,

    /// `(batch, max_time, feature_dim)` of the downstream state tensor.
    ///
    /// `feature_dim` is enforced on every `add`. `max_time` caps the zero
    /// blocks used to fill missing neighbour slots.
    pub state_shape: (usize, usize, usize),

    /// Per-agent history cap (None = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history: Option<usize>,
}

impl BufferConfig {
    /// 5 history steps, 5 future steps, full-future neighbours.
    pub fn new(state_shape: (usize, usize, usize)) -> Self {
        Self {
            hist_length: 5,
            future_length: 5,
            query_mode: QueryMode::FullFuture,
            state_shape,
            max_history: None,
        }
    }

    /// Set the history length.
    pub fn with_hist_length(mut self, hist_length: usize) -> Self {
        self.hist_length = hist_length;
        self
    }

    /// Set the future length.
    pub fn with_future_length(mut self, future_length: usize) -> Self {
        self.future_length = future_length;
        self
    }

    /// Set the query mode.
    pub fn with_query_mode(mut self, query_mode: QueryMode) -> Self {
        self.query_mode = query_mode;
        self
    }

    /// Cap the number of stored entries per agent.
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = Some(max_history);
        self
    }

    /// Feature dimension of every stored state vector.
    #[inline]
    pub fn feature_dim(&self) -> usize {
        self.state_shape.2
    }

    /// Validate configuration.
    ///
    /// Returns Ok(()) if valid, Err(msg) otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.hist_length == 0 {
            return Err("hist_length must be > 0".to_string());
        }

        if self.state_shape.2 == 0 {
            return Err("state_shape feature dimension must be > 0".to_string());
        }

        if self.max_history == Some(0) {
            return Err("max_history must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_SHAPE)
    }
}

/// Window bounds for one record at one query time.
///
/// Spans and lengths are signed: an agent first seen after the query time has
/// `hist_span <= 0`, and one last seen before it has `fut_span < 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpan {
    /// `curr - first + 1`
    pub hist_span: i64,
    /// `last - curr`
    pub fut_span: i64,
    /// History window start index
    pub start: i64,
    /// History rows used
    pub hist_len: i64,
    /// Future rows used
    pub fut_len: i64,
}

impl WindowSpan {
    fn compute(
        first: Timestep,
        last: Timestep,
        curr: Timestep,
        hist_length: usize,
        future_length: usize,
    ) -> Self {
        let hist_span = curr - first + 1;
        let fut_span = last - curr;
        Self {
            hist_span,
            fut_span,
            start: (hist_span - hist_length as i64).max(0),
            hist_len: hist_span.min(hist_length as i64),
            fut_len: fut_span.min(future_length as i64),
        }
    }

    /// Index range of the history rows, clamped to `len` entries.
    pub fn history_range(&self, len: usize) -> Range<usize> {
        clamp_range(self.start, self.hist_len, len)
    }

    /// Index range of the future rows, clamped to `len` entries.
    pub fn future_range(&self, len: usize) -> Range<usize> {
        clamp_range(self.start + self.hist_len.max(0), self.fut_len, len)
    }
}

fn clamp_range(start: i64, count: i64, len: usize) -> Range<usize> {
    let len = len as i64;
    let from = start.clamp(0, len);
    let to = (start + count.max(0)).clamp(from, len);
    from as usize..to as usize
}

/// One agent's contiguous timeline.
#[derive(Debug, Clone, Default)]
struct AgentRecord {
    values: VecDeque<FeatureVec>,
    timesteps: VecDeque<Timestep>,
}

impl AgentRecord {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn first_timestep(&self) -> Option<Timestep> {
        self.timesteps.front().copied()
    }

    fn last_timestep(&self) -> Option<Timestep> {
        self.timesteps.back().copied()
    }

    fn push(&mut self, value: FeatureVec, timestep: Timestep) {
        self.values.push_back(value);
        self.timesteps.push_back(timestep);
    }

    fn rows(&self, range: Range<usize>) -> Vec<FeatureVec> {
        self.values.range(range).cloned().collect()
    }

    fn span(&self, curr: Timestep, hist_length: usize, future_length: usize) -> WindowSpan {
        // Records are never empty once created
        let first = self.first_timestep().unwrap_or(curr + 1);
        let last = self.last_timestep().unwrap_or(curr);
        WindowSpan::compute(first, last, curr, hist_length, future_length)
    }

    /// Linearly interpolate every feature over `(last, timestep)`.
    ///
    /// With a history cap only the last `cap - 1` gap steps are built; older
    /// ones would be evicted by the same `add`. The record is then cleared
    /// before filling, since none of its entries survive the cap either.
    ///
    /// Returns the number of gap steps, built or not.
    fn fill_gap(&mut self, value: &[f64], timestep: Timestep, cap: Option<usize>) -> usize {
        let (Some(last_t), Some(last_v)) = (self.last_timestep(), self.values.back().cloned())
        else {
            return 0;
        };

        let span = (timestep - last_t) as f64;
        let slopes: Vec<f64> = last_v
            .iter()
            .zip(value)
            .map(|(&a, &b)| (b - a) / span)
            .collect();

        let mut from = last_t + 1;
        if let Some(cap) = cap {
            from = from.max(timestep - (cap as i64 - 1));
            if from > last_t + 1 {
                self.values.clear();
                self.timesteps.clear();
            }
        }

        for t in from..timestep {
            let dt = (t - last_t) as f64;
            let point: FeatureVec = last_v
                .iter()
                .zip(&slopes)
                .map(|(&a, &slope)| slope * dt + a)
                .collect();
            self.push(point, t);
        }
        (timestep - last_t - 1) as usize
    }

    fn evict_to(&mut self, cap: usize) -> usize {
        let excess = self.len().saturating_sub(cap);
        self.values.drain(..excess);
        self.timesteps.drain(..excess);
        excess
    }
}

/// Per-agent store of timestamped state vectors.
///
/// # Invariants
///
/// - Within a record, timesteps increase by exactly 1.
/// - Every stored vector has length `state_shape.2`.
///
/// # Thread Safety
///
/// Not synchronized. Use one store per episode/worker, or serialize access
/// externally.
#[derive(Debug, Clone)]
pub struct AgentTrajectoryStore<K = u64> {
    config: BufferConfig,

    records: AHashMap<K, AgentRecord>,

    /// Values passed to `add` (for tracking)
    total_added: u64,

    /// Steps synthesized by gap interpolation (for tracking)
    total_interpolated: u64,
}

impl<K> AgentTrajectoryStore<K>
where
    K: Hash + Eq + Clone + fmt::Debug,
{
    /// Create an empty store.
    ///
    /// # Panics
    ///
    /// Panics if configuration is invalid (use `validate()` first).
    pub fn new(config: BufferConfig) -> Self {
        config
            .validate()
            .expect("Invalid trajectory buffer configuration");

        Self {
            config,
            records: AHashMap::new(),
            total_added: 0,
            total_interpolated: 0,
        }
    }

    /// Record `value` for agent `id` at `timestep` (convenience method).
    ///
    /// Wraps the vector in an `Arc` and delegates to [`Self::add_arc`].
    #[inline]
    pub fn add(&mut self, id: K, value: Vec<f64>, timestep: Timestep) -> Result<(), BufferError> {
        self.add_arc(id, value.into(), timestep)
    }

    /// Record a shared state vector for agent `id` at `timestep`.
    ///
    /// If the agent's last timestep is not `timestep - 1`, the missing steps
    /// are filled by per-feature linear interpolation between the last stored
    /// value and `value`.
    ///
    /// # Errors
    ///
    /// - [`BufferError::FeatureCountMismatch`] if `value.len() != state_shape.2`
    /// - [`BufferError::NonMonotonicTimestep`] if `timestep` is not after the
    ///   agent's last timestep. Nothing is reordered or stored.
    pub fn add_arc(
        &mut self,
        id: K,
        value: FeatureVec,
        timestep: Timestep,
    ) -> Result<(), BufferError> {
        let feature_dim = self.config.feature_dim();
        if value.len() != feature_dim {
            return Err(BufferError::FeatureCountMismatch {
                expected: feature_dim,
                actual: value.len(),
            });
        }

        if let Some(last) = self.records.get(&id).and_then(AgentRecord::last_timestep) {
            if timestep <= last {
                return Err(BufferError::NonMonotonicTimestep {
                    agent: format!("{:?}", id),
                    last,
                    timestep,
                });
            }
        }

        let max_history = self.config.max_history;
        let record = self.records.entry(id).or_default();

        let inserted = record.fill_gap(&value, timestep, max_history);
        if inserted > 0 {
            log::debug!(
                "Interpolated {} missing steps before timestep {}",
                inserted,
                timestep
            );
            self.total_interpolated += inserted as u64;
        }
        debug_assert!(record
            .last_timestep()
            .map_or(true, |last| last + 1 == timestep));

        record.push(value, timestep);
        self.total_added += 1;

        if let Some(cap) = max_history {
            let evicted = record.evict_to(cap);
            if evicted > 0 {
                log::trace!("Evicted {} entries beyond history cap {}", evicted, cap);
            }
        }

        Ok(())
    }

    /// Future windows for `ids` at `curr`, right-padded to `pad_length`.
    ///
    /// Returns a `[ids.len() × pad_length × feature_dim]` batch.
    ///
    /// # Errors
    ///
    /// - [`BufferError::UnknownAgent`] for an id never added
    /// - [`BufferError::MalformedWindow`] if an agent has no recorded step
    ///   after `curr`
    /// - [`BufferError::RaggedBatch`] if `future_length > pad_length` lets a
    ///   window outgrow the padding
    pub fn query_futures(
        &self,
        curr: Timestep,
        ids: &[K],
        pad_length: usize,
    ) -> Result<Array3<f64>, BufferError> {
        if ids.is_empty() {
            return Ok(Array3::zeros((0, pad_length, self.config.feature_dim())));
        }

        let mut windows = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self.record(id)?;
            let span = record.span(curr, self.config.hist_length, self.config.future_length);
            let future = record.rows(span.future_range(record.len()));
            windows.push(pad_future(&future, pad_length)?);
        }

        stack_windows(&windows)
    }

    /// Neighbour context windows at `curr`, keeping at most `keep_top`.
    ///
    /// Candidates are visited in input order; `indices[i]` is the caller's
    /// external index for `ids[i]` and is reported back for every accepted
    /// candidate. Missing slots up to `keep_top` are filled with zero blocks of
    /// shape `(clip(curr + 1, 0, state_shape.1), state_shape.2)`.
    ///
    /// Agents first seen after `curr` are skipped in both modes.
    ///
    /// # Behavior
    ///
    /// Kept indices are reported for accepted candidates in
    /// [`QueryMode::FullFuture`] too, not only in [`QueryMode::HistoryOnly`].
    ///
    /// # Errors
    ///
    /// - [`BufferError::UnsupportedQueryMode`] in [`QueryMode::Default`]
    /// - [`BufferError::IndexCountMismatch`] if `ids` and `indices` differ in length
    /// - [`BufferError::UnknownAgent`] for a visited id never added
    /// - [`BufferError::MalformedWindow`] if a [`QueryMode::HistoryOnly`]
    ///   candidate has no history rows at `curr` (last seen before the window)
    pub fn query_neighbours(
        &self,
        curr: Timestep,
        ids: &[K],
        indices: &[usize],
        keep_top: usize,
        pad_length: usize,
    ) -> Result<(Vec<Array2<f64>>, Vec<usize>), BufferError> {
        let mode = self.config.query_mode;
        if mode == QueryMode::Default {
            return Err(BufferError::UnsupportedQueryMode(mode));
        }

        if ids.len() != indices.len() {
            return Err(BufferError::IndexCountMismatch {
                ids: ids.len(),
                indices: indices.len(),
            });
        }

        let feature_dim = self.config.feature_dim();
        let mut neighbours = Vec::with_capacity(keep_top);
        let mut kept = Vec::with_capacity(keep_top);

        for (id, &index) in ids.iter().zip(indices) {
            if neighbours.len() >= keep_top {
                break;
            }

            let record = self.record(id)?;
            let span = record.span(curr, self.config.hist_length, self.config.future_length);

            let window = match mode {
                QueryMode::HistoryOnly => {
                    if span.hist_span <= 0 {
                        continue;
                    }
                    pad_history(&record.rows(span.history_range(record.len())), pad_length)?
                }
                QueryMode::FullFuture => {
                    if span.hist_span <= 0 || span.fut_span < self.config.future_length as i64 {
                        continue;
                    }
                    let history =
                        pad_history(&record.rows(span.history_range(record.len())), pad_length)?;
                    let future =
                        rows_to_array(&record.rows(span.future_range(record.len())), feature_dim)?;
                    ndarray::concatenate(Axis(0), &[history.view(), future.view()])
                        .map_err(|e| BufferError::MalformedWindow(e.to_string()))?
                }
                QueryMode::Default => return Err(BufferError::UnsupportedQueryMode(mode)),
            };

            neighbours.push(window);
            kept.push(index);
        }

        let accepted = neighbours.len();
        let pad_rows = (curr + 1).clamp(0, self.config.state_shape.1 as i64) as usize;
        neighbours.resize_with(keep_top.max(accepted), || {
            Array2::zeros((pad_rows, feature_dim))
        });

        log::trace!(
            "Neighbour query at t={}: {} of {} candidates kept, {} zero blocks",
            curr,
            accepted,
            ids.len(),
            neighbours.len() - accepted
        );

        Ok((neighbours, kept))
    }

    /// Window bounds for agent `id` at `curr`.
    pub fn window_span(&self, id: &K, curr: Timestep) -> Result<WindowSpan, BufferError> {
        let record = self.record(id)?;
        Ok(record.span(curr, self.config.hist_length, self.config.future_length))
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.total_added = 0;
        self.total_interpolated = 0;
    }

    /// Number of agents with a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no agent has been added since construction or the last clear.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check whether agent `id` has a record.
    pub fn contains(&self, id: &K) -> bool {
        self.records.contains_key(id)
    }

    /// Iterate over known agent ids (arbitrary order).
    pub fn agent_ids(&self) -> impl Iterator<Item = &K> {
        self.records.keys()
    }

    /// Stored timesteps for agent `id`, including interpolated ones.
    pub fn timesteps(&self, id: &K) -> Option<Vec<Timestep>> {
        self.records
            .get(id)
            .map(|r| r.timesteps.iter().copied().collect())
    }

    /// Stored state vectors for agent `id`, including interpolated ones.
    pub fn values(&self, id: &K) -> Option<Vec<FeatureVec>> {
        self.records.get(id).map(|r| r.values.iter().cloned().collect())
    }

    /// Values passed to `add` since construction or the last clear.
    pub fn total_added(&self) -> u64 {
        self.total_added
    }

    /// Steps synthesized by gap interpolation since construction or the last clear.
    pub fn total_interpolated(&self) -> u64 {
        self.total_interpolated
    }

    /// Get the configuration.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    fn record(&self, id: &K) -> Result<&AgentRecord, BufferError> {
        self.records
            .get(id)
            .ok_or_else(|| BufferError::UnknownAgent(format!("{:?}", id)))
    }
}

impl<K> Default for AgentTrajectoryStore<K>
where
    K: Hash + Eq + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}
