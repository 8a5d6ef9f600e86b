//! Contiguous display ordering shared by budgets and funds.
//!
//! Collections are always renumbered `0..N-1` after an insert, delete or move,
//! keeping the relative order of every item that was not touched.

use crate::errors::{Error, Result};

/// Moves the item at `from` so it ends up at index `to`.
///
/// Items between the two positions shift by one to close the gap, so
/// `[A, B, C, D]` with `from = 3, to = 1` becomes `[A, D, B, C]`.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<()> {
    let len = items.len();
    if from >= len {
        return Err(Error::InvalidPosition { index: from, len });
    }
    if to >= len {
        return Err(Error::InvalidPosition { index: to, len });
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}

/// Returns the index to insert at, clamping to the end of the collection.
#[must_use]
pub fn insertion_index(requested: Option<usize>, len: usize) -> usize {
    requested.map_or(len, |index| index.min(len))
}

/// Pairs every item with its new contiguous order value, skipping items whose
/// stored order already matches.
pub fn renumber<T, F>(items: &[T], current: F) -> Vec<(usize, i32)>
where
    F: Fn(&T) -> i32,
{
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let order = i32::try_from(index).unwrap_or(i32::MAX);
            (current(item) != order).then_some((index, order))
        })
        .collect()
}
