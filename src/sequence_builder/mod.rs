//! Trajectory context windows for sequence models.
//!
//! This module turns intermittent per-agent observations into the fixed-shape
//! windows a trajectory predictor consumes: left-padded history, right-padded
//! future, and per-timestep future windows with validity masks.
//!
//! # Architecture
//!
//! - **AgentTrajectoryStore**: Per-agent timelines with gap interpolation
//! - **BufferConfig**: History/future lengths, query mode, state shape
//! - **pad_history / pad_future**: Direction-specific zero padding
//! - **split_future / stack_windows**: Sliding windows and batch assembly
//!
//! # Example
//!
//! ```
//! use trajectory_features::sequence_builder::{AgentTrajectoryStore, BufferConfig};
//!
//! let mut store = AgentTrajectoryStore::new(BufferConfig::new((1, 10, 1)));
//! for t in 0..13 {
//!     store.add(1u64, vec![t as f64], t).unwrap();
//! }
//!
//! // Futures after t=10: two real rows, eight zero rows
//! let futures = store.query_futures(10, &[1], 10).unwrap();
//! assert_eq!(futures.shape(), &[1, 10, 1]);
//! assert_eq!(futures[[0, 0, 0]], 11.0);
//! assert_eq!(futures[[0, 2, 0]], 0.0);
//! ```

pub mod neighbour_buffer;
mod padding;
mod windows;

// Re-export all public types
pub use neighbour_buffer::{
    AgentTrajectoryStore, BufferConfig, BufferError, FeatureVec, QueryMode, Timestep, WindowSpan,
    DEFAULT_STATE_SHAPE,
};
pub use padding::{pad_future, pad_history};
pub use windows::{split_future, stack_windows};
