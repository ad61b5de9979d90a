//! Zero-padding for trajectory windows.
//!
//! The two directions are deliberately separate functions:
//!
//! ```text
//! pad_future:   [r0, r1, r2, 0, 0, 0]     // real rows first, zeros appended
//! pad_history:  [0, 0, 0, r0, r1, r2]     // zeros first, real rows end at "now"
//! ```
//!
//! History windows end at the query time and future windows start right
//! after it. Downstream tensors are concatenated around that point, so the
//! padding must stay on the far side of each window.
//!
//! Both helpers require a non-empty, rectangular `[time × feature]` input and
//! never truncate: inputs longer than `pad_length` come back unchanged.

use super::neighbour_buffer::BufferError;
use ndarray::{s, Array2};

/// Append zero rows so the window has at least `pad_length` rows.
///
/// # Errors
///
/// [`BufferError::MalformedWindow`] if `rows` is empty or ragged.
///
/// # Example
///
/// ```
/// use trajectory_features::sequence_builder::pad_future;
///
/// let padded = pad_future(&[vec![1.0, 2.0]], 3).unwrap();
/// assert_eq!(padded.shape(), &[3, 2]);
/// assert_eq!(padded[[0, 1]], 2.0);
/// assert_eq!(padded[[2, 1]], 0.0);
/// ```
pub fn pad_future<R: AsRef<[f64]>>(
    rows: &[R],
    pad_length: usize,
) -> Result<Array2<f64>, BufferError> {
    let width = feature_width(rows)?;
    let total = rows.len().max(pad_length);

    let mut out = Array2::zeros((total, width));
    fill_rows(&mut out, 0, rows);
    Ok(out)
}

/// Prepend zero rows so the window has at least `pad_length` rows.
///
/// # Errors
///
/// [`BufferError::MalformedWindow`] if `rows` is empty or ragged.
///
/// # Example
///
/// ```
/// use trajectory_features::sequence_builder::pad_history;
///
/// let padded = pad_history(&[vec![1.0, 2.0]], 3).unwrap();
/// assert_eq!(padded.shape(), &[3, 2]);
/// assert_eq!(padded[[0, 0]], 0.0);
/// assert_eq!(padded[[2, 0]], 1.0);
/// ```
pub fn pad_history<R: AsRef<[f64]>>(
    rows: &[R],
    pad_length: usize,
) -> Result<Array2<f64>, BufferError> {
    let width = feature_width(rows)?;
    let total = rows.len().max(pad_length);

    let mut out = Array2::zeros((total, width));
    fill_rows(&mut out, total - rows.len(), rows);
    Ok(out)
}

/// Copy rows into a `[rows × feature_dim]` array without padding.
///
/// Unlike the padding helpers an empty input is allowed and yields a
/// `[0 × feature_dim]` array.
pub(crate) fn rows_to_array<R: AsRef<[f64]>>(
    rows: &[R],
    feature_dim: usize,
) -> Result<Array2<f64>, BufferError> {
    if let Some(bad) = rows.iter().find(|r| r.as_ref().len() != feature_dim) {
        return Err(BufferError::MalformedWindow(format!(
            "row of width {} in a window of width {}",
            bad.as_ref().len(),
            feature_dim
        )));
    }

    let mut out = Array2::zeros((rows.len(), feature_dim));
    fill_rows(&mut out, 0, rows);
    Ok(out)
}

/// Width shared by all rows; rejects anything that isn't a rank-2 sequence.
fn feature_width<R: AsRef<[f64]>>(rows: &[R]) -> Result<usize, BufferError> {
    let first = rows.first().ok_or_else(|| {
        BufferError::MalformedWindow("empty window cannot be padded".to_string())
    })?;
    let width = first.as_ref().len();

    if rows.iter().any(|r| r.as_ref().len() != width) {
        return Err(BufferError::MalformedWindow(
            "rows of unequal width".to_string(),
        ));
    }

    Ok(width)
}

fn fill_rows<R: AsRef<[f64]>>(out: &mut Array2<f64>, offset: usize, rows: &[R]) {
    for (i, row) in rows.iter().enumerate() {
        let mut target = out.slice_mut(s![offset + i, ..]);
        for (t, &v) in target.iter_mut().zip(row.as_ref()) {
            *t = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_pads_at_end() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let out = pad_future(&rows, 5).unwrap();

        assert_eq!(out.shape(), &[5, 2]);
        assert_eq!(out[[0, 0]], 1.0);
        assert_eq!(out[[1, 1]], 4.0);
        for r in 2..5 {
            assert_eq!(out[[r, 0]], 0.0);
            assert_eq!(out[[r, 1]], 0.0);
        }
    }

    #[test]
    fn test_history_pads_at_start() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let out = pad_history(&rows, 5).unwrap();

        assert_eq!(out.shape(), &[5, 2]);
        for r in 0..3 {
            assert_eq!(out[[r, 0]], 0.0);
        }
        assert_eq!(out[[3, 0]], 1.0);
        assert_eq!(out[[4, 1]], 4.0);
    }

    #[test]
    fn test_padding_directions_differ() {
        let rows = vec![vec![9.0]];
        let fut = pad_future(&rows, 3).unwrap();
        let hist = pad_history(&rows, 3).unwrap();
        assert_eq!(fut[[0, 0]], 9.0);
        assert_eq!(hist[[2, 0]], 9.0);
        assert_ne!(fut, hist);
    }

    #[test]
    fn test_no_truncation_when_longer_than_pad() {
        let rows: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let fut = pad_future(&rows, 2).unwrap();
        let hist = pad_history(&rows, 2).unwrap();
        assert_eq!(fut.shape(), &[4, 1]);
        assert_eq!(hist.shape(), &[4, 1]);
        assert_eq!(hist[[3, 0]], 3.0);
    }

    #[test]
    fn test_empty_window_rejected() {
        let rows: Vec<Vec<f64>> = Vec::new();
        assert!(matches!(
            pad_future(&rows, 3),
            Err(BufferError::MalformedWindow(_))
        ));
        assert!(matches!(
            pad_history(&rows, 3),
            Err(BufferError::MalformedWindow(_))
        ));
    }

    #[test]
    fn test_ragged_window_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(pad_future(&rows, 3).is_err());
        assert!(pad_history(&rows, 3).is_err());
    }

    #[test]
    fn test_rows_to_array_allows_empty() {
        let rows: Vec<Vec<f64>> = Vec::new();
        let out = rows_to_array(&rows, 3).unwrap();
        assert_eq!(out.shape(), &[0, 3]);

        assert!(rows_to_array(&[vec![1.0]], 3).is_err());
    }
}
