use core::{any::Any, mem};

use alloc::vec::Vec;

/// Type erased column of a single component type
pub(crate) trait Storage: Send + Sync {
    fn len(&self) -> usize;

    /// Grow the column to hold at least `capacity` values
    fn grow(&mut self, capacity: usize);

    fn push_default(&mut self);

    /// Swap-removes the value at `row` and pushes it to the end of `dst`.
    ///
    /// # Panics
    /// If `dst` is not a column of the same type
    fn swap_remove_to(&mut self, row: usize, dst: &mut dyn Storage);

    /// Swap-removes the value at `row`.
    ///
    /// If `stash` is set the removed value is kept until [`Storage::clear_stash`]
    fn swap_remove(&mut self, row: usize, stash: bool);

    /// Returns the value most recently stashed
    fn stashed(&self) -> Option<&dyn Any>;

    fn clear_stash(&mut self);

    fn get_any(&self, row: usize) -> Option<&dyn Any>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense storage for values of `T`
pub(crate) struct Column<T> {
    pub(crate) data: Vec<T>,
    stash: Option<T>,
}

impl<T> Column<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            stash: None,
        }
    }

    /// Replaces the value at `row`, stashing the previous value if `stash` is set
    pub fn replace(&mut self, row: usize, value: T, stash: bool) {
        let old = mem::replace(&mut self.data[row], value);
        if stash {
            self.stash = Some(old);
        }
    }
}

impl<T: Send + Sync + Default + 'static> Storage for Column<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn grow(&mut self, capacity: usize) {
        if let Some(additional) = capacity.checked_sub(self.data.len()) {
            self.data.reserve_exact(additional);
        }
    }

    fn push_default(&mut self) {
        self.data.push(T::default())
    }

    fn swap_remove_to(&mut self, row: usize, dst: &mut dyn Storage) {
        let dst = match dst.as_any_mut().downcast_mut::<Column<T>>() {
            Some(v) => v,
            None => panic!("Mismatched column type for {}", tynm::type_name::<T>()),
        };

        let (value, _) = swap_remove(&mut self.data, row);
        dst.data.push(value);
    }

    fn swap_remove(&mut self, row: usize, stash: bool) {
        let (value, _) = swap_remove(&mut self.data, row);
        if stash {
            self.stash = Some(value);
        }
    }

    fn stashed(&self) -> Option<&dyn Any> {
        self.stash.as_ref().map(|v| v as &dyn Any)
    }

    fn clear_stash(&mut self) {
        self.stash = None;
    }

    fn get_any(&self, row: usize) -> Option<&dyn Any> {
        self.data.get(row).map(|v| v as &dyn Any)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Removes the element at `index` by moving the last element into its place.
///
/// Returns the removed element and whether another element now occupies `index`. When it
/// does, that element previously lived at the new `len()` and any index referring to it must
/// be updated by the caller.
///
/// Shared by archetype rows and relation entries.
pub(crate) fn swap_remove<T>(items: &mut Vec<T>, index: usize) -> (T, bool) {
    let value = items.swap_remove(index);
    (value, index < items.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_remove_reports_moved() {
        let mut items = vec!['a', 'b', 'c'];

        assert_eq!(swap_remove(&mut items, 0), ('a', true));
        assert_eq!(items, ['c', 'b']);

        assert_eq!(swap_remove(&mut items, 1), ('b', false));
        assert_eq!(items, ['c']);
    }

    #[test]
    fn column_stash() {
        let mut src = Column::<i32>::with_capacity(4);
        let mut dst = Column::<i32>::with_capacity(4);
        src.data.extend([1, 2, 3]);

        src.swap_remove_to(0, &mut dst);
        assert_eq!(src.data, [3, 2]);
        assert_eq!(dst.data, [1]);

        src.swap_remove(1, true);
        assert_eq!(src.stashed().and_then(|v| v.downcast_ref::<i32>()), Some(&2));

        src.replace(0, 7, true);
        assert_eq!(src.data, [7]);
        assert_eq!(src.stashed().and_then(|v| v.downcast_ref::<i32>()), Some(&3));

        src.clear_stash();
        assert!(src.stashed().is_none());
    }
}
