//! Sliding future windows and batch stacking.
//!
//! [`split_future`] turns one `[T × F]` sequence into `T` overlapping windows
//! of fixed length, one per start index:
//!
//! ```text
//! sequence:  t0 t1 t2 t3            window_length = 3
//!
//! windows:   [t0 t1 t2]   mask [1 1 1]
//!            [t1 t2 t3]   mask [1 1 1]
//!            [t2 t3  0]   mask [1 1 0]
//!            [t3  0  0]   mask [1 0 0]
//! ```
//!
//! The stride is always 1 and the tail windows are zero-padded at the end.

use super::neighbour_buffer::BufferError;
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

/// Split a sequence into one fixed-length future window per timestep.
///
/// Returns `(windows, masks)` with shapes `[T × window_length × F]` and
/// `[T × window_length]`. Mask entries are 1 for real rows and 0 for padding.
///
/// # Example
///
/// ```
/// use ndarray::Array2;
/// use trajectory_features::sequence_builder::split_future;
///
/// let sequence = Array2::from_shape_fn((12, 2), |(t, f)| (t * 10 + f) as f64);
/// let (windows, masks) = split_future(sequence.view(), 10);
///
/// assert_eq!(windows.shape(), &[12, 10, 2]);
/// assert_eq!(masks.shape(), &[12, 10]);
/// assert_eq!(masks.row(11).sum(), 1);
/// ```
pub fn split_future(
    sequence: ArrayView2<'_, f64>,
    window_length: usize,
) -> (Array3<f64>, Array2<u8>) {
    let (steps, features) = sequence.dim();

    let mut windows = Array3::zeros((steps, window_length, features));
    let mut masks = Array2::zeros((steps, window_length));

    for start in 0..steps {
        let valid = window_length.min(steps - start);
        windows
            .slice_mut(s![start, ..valid, ..])
            .assign(&sequence.slice(s![start..start + valid, ..]));
        masks.slice_mut(s![start, ..valid]).fill(1);
    }

    (windows, masks)
}

/// Stack equally-shaped windows into a `[k × rows × features]` batch.
///
/// An empty slice yields a `[0 × 0 × 0]` array.
///
/// # Errors
///
/// [`BufferError::RaggedBatch`] if any window's shape differs from the first.
pub fn stack_windows(windows: &[Array2<f64>]) -> Result<Array3<f64>, BufferError> {
    let Some(first) = windows.first() else {
        return Ok(Array3::zeros((0, 0, 0)));
    };
    let expected = first.dim();

    if let Some((index, bad)) = windows
        .iter()
        .enumerate()
        .find(|(_, w)| w.dim() != expected)
    {
        return Err(BufferError::RaggedBatch {
            index,
            expected,
            actual: bad.dim(),
        });
    }

    let views: Vec<_> = windows.iter().map(|w| w.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| BufferError::MalformedWindow(e.to_string()))
}
