use smallvec::SmallVec;
use std::ops::{Add, Neg};

/// The value with the largest magnitude, keeping its sign
///
/// Ties go to the first occurrence. Returns `None` for an empty slice.
///
/// ```
/// use nd_grid::absmax;
///
/// assert_eq!(absmax(&[1, 2, -3]), Some(-3));
/// assert_eq!(absmax(&[2.5, -2.5]), Some(2.5));
/// ```
pub fn absmax<T>(values: &[T]) -> Option<T>
where
    T: Copy + PartialOrd + Neg<Output = T> + Default,
{
    let magnitude = |v: T| if v < T::default() { -v } else { v };

    values.iter().copied().fold(None, |max, v| match max {
        Some(current) if magnitude(current) >= magnitude(v) => Some(current),
        _ => Some(v),
    })
}

/// A copy of `t` with the entry at `index` incremented by `delta`
///
/// # Panics
/// if `index` is out of bounds
pub fn modify_tuple<T>(t: &[T], index: usize, delta: T) -> SmallVec<[T; 3]>
where
    T: Copy + Add<Output = T>,
{
    assert!(
        index < t.len(),
        "Index {} is out of bounds for a tuple of length {}; Cannot modify tuple!",
        index,
        t.len()
    );

    let mut modified = SmallVec::from_slice(t);
    modified[index] = modified[index] + delta;
    modified
}
