//! Playlist position renumbering.
//!
//! Items carry explicit integer positions that must stay dense and
//! zero-based (`0..len`). Each operation expects a slice sorted by position
//! and leaves it sorted and dense.
//!
//! Moving from `source` to `destination`:
//! - `source < destination`: every item in `(source, destination]` is decremented
//! - `source > destination`: every item in `[destination, source)` is incremented
//! - the moved item lands on `destination`
//!
//! Out-of-range indices leave the sequence untouched.

use crate::models::PlaylistItem;

/// Anything ordered by an explicit position.
pub trait Positioned {
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);
}

impl Positioned for PlaylistItem {
    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

/// Remove the item at index `index`, closing the gap it leaves.
///
/// Returns the removed item, or `None` when `index` is out of bounds.
pub fn remove_at<T: Positioned>(items: &mut Vec<T>, index: usize) -> Option<T> {
    if index >= items.len() {
        return None;
    }

    let removed = items.remove(index);
    let removed_position = removed.position();
    for item in items.iter_mut() {
        if item.position() > removed_position {
            item.set_position(item.position() - 1);
        }
    }

    Some(removed)
}

/// Move the item at `source` to `destination`.
///
/// Returns `true` when the order changed.
pub fn move_item<T: Positioned>(items: &mut [T], source: usize, destination: usize) -> bool {
    if source >= items.len() || destination >= items.len() || source == destination {
        return false;
    }

    let (src, dst) = (source as i64, destination as i64);
    for (index, item) in items.iter_mut().enumerate() {
        if index == source {
            continue;
        }
        let position = item.position();
        if src < dst && position > src && position <= dst {
            item.set_position(position - 1);
        } else if src > dst && position >= dst && position < src {
            item.set_position(position + 1);
        }
    }
    items[source].set_position(dst);

    items.sort_by_key(|item| item.position());
    true
}

/// Insert `item` at `index`, shifting every item at or after it down one.
///
/// `index` past the end appends. Returns the position the item landed on.
pub fn insert_at<T: Positioned>(items: &mut Vec<T>, mut item: T, index: usize) -> i64 {
    let index = index.min(items.len());
    let position = index as i64;

    for existing in items.iter_mut() {
        if existing.position() >= position {
            existing.set_position(existing.position() + 1);
        }
    }

    item.set_position(position);
    items.insert(index, item);
    position
}

/// Whether positions are exactly `0..len` in order.
pub fn is_contiguous<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index as i64)
}
