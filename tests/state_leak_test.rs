//! Episode State Leak Tests
//!
//! These tests verify that state is properly isolated between episodes and
//! that reset()/clear() drop all internal state.
//!
//! State leakage can cause:
//! - Normalization statistics biased by the previous episode
//! - Neighbour windows containing agents from the previous scene
//! - Interpolation across an episode boundary
//! - Memory growth over a long data-generation run

use ndarray::{arr0, arr1, ArrayD};
use trajectory_features::prelude::*;

fn run_episode(
    normalizer: &mut dyn FeatureTransform,
    store: &mut AgentTrajectoryStore,
    offset: f64,
) -> Vec<ArrayD<f64>> {
    let mut outputs = Vec::new();
    for t in 0..10 {
        let raw = arr1(&[offset + t as f64, offset - t as f64]).into_dyn();
        let normalized = normalizer.transform(raw.view()).unwrap();
        store.add(1, raw.iter().copied().collect(), t).unwrap();
        outputs.push(normalized);
    }
    outputs
}

#[test]
fn test_reset_isolates_episodes() {
    let mut normalizer = build_transform(&NormalizerConfig::new(vec![2]));
    let mut store: AgentTrajectoryStore = AgentTrajectoryStore::new(BufferConfig::new((1, 10, 2)));

    let first = run_episode(normalizer.as_mut(), &mut store, 0.0);

    // A different episode in between
    normalizer.reset();
    store.clear();
    run_episode(normalizer.as_mut(), &mut store, 1000.0);

    normalizer.reset();
    store.clear();
    let replay = run_episode(normalizer.as_mut(), &mut store, 0.0);

    assert_eq!(first, replay);
    assert_eq!(store.timesteps(&1).unwrap(), (0..10).collect::<Vec<_>>());
}

#[test]
fn test_without_clear_episode_restart_is_rejected() {
    let mut store: AgentTrajectoryStore = AgentTrajectoryStore::new(BufferConfig::new((1, 10, 1)));
    for t in 0..5 {
        store.add(1, vec![t as f64], t).unwrap();
    }

    // Timestep counter restarts at 0 in the next episode
    assert!(matches!(
        store.add(1, vec![0.0], 0),
        Err(BufferError::NonMonotonicTimestep { .. })
    ));

    store.clear();
    assert!(store.add(1, vec![0.0], 0).is_ok());
}

#[test]
fn test_clear_prevents_interpolation_across_episodes() {
    let mut store: AgentTrajectoryStore = AgentTrajectoryStore::new(BufferConfig::new((1, 10, 1)));
    store.add(1, vec![0.0], 0).unwrap();
    store.clear();

    store.add(1, vec![50.0], 50).unwrap();
    assert_eq!(store.timesteps(&1).unwrap(), vec![50]);
    assert_eq!(store.total_interpolated(), 0);
}

#[test]
fn test_reward_normalizer_reset_zeroes_accumulator() {
    let mut normalizer = AdaptiveNormalizer::new(NormalizerConfig::reward(0.99));
    for r in [1.0, -2.0, 0.5] {
        normalizer.transform(arr0(r).into_dyn().view()).unwrap();
    }
    assert!(normalizer.decayed_accumulator().unwrap().iter().any(|&a| a != 0.0));

    normalizer.reset();
    assert_eq!(normalizer.stats().n(), 0);
    assert!(normalizer.decayed_accumulator().unwrap().iter().all(|&a| a == 0.0));
    assert!(normalizer.stats().mean().iter().all(|&m| m == 0.0));
}

#[test]
fn test_history_cap_bounds_long_runs() {
    let config = BufferConfig::new((1, 10, 1)).with_max_history(16);
    let mut store: AgentTrajectoryStore = AgentTrajectoryStore::new(config);

    for t in 0..10_000 {
        store.add(1, vec![t as f64], t).unwrap();
    }

    let timesteps = store.timesteps(&1).unwrap();
    assert_eq!(timesteps.len(), 16);
    assert_eq!(*timesteps.first().unwrap(), 9_984);
    assert_eq!(store.total_added(), 10_000);
}
