use core::{iter::FusedIterator, slice};

use crate::{
    archetype::{Archetype, ArchetypeId},
    Entity, EntityStore,
};

use super::QueryData;

/// The columns and entities of one matched archetype.
///
/// All columns have the same length as [`Chunk::entities`], and the value at index `i` of
/// each column belongs to the entity at index `i`.
pub struct Chunk<'a, Q: QueryData> {
    pub columns: Q::Columns<'a>,
    pub entities: &'a [Entity],
    archetype: &'a Archetype,
}

impl<'a, Q: QueryData> Chunk<'a, Q> {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn archetype(&self) -> &'a Archetype {
        self.archetype
    }

    /// Mutable access to the components of the entity at `row`
    pub fn row_mut(&mut self, row: usize) -> Q::RowMut<'_> {
        Q::row_mut(&mut self.columns, row)
    }
}

/// Iterates the non empty matched archetypes of a query
pub struct Chunks<'a, Q> {
    store: &'a EntityStore,
    archetypes: slice::Iter<'a, ArchetypeId>,
    _marker: core::marker::PhantomData<fn() -> Q>,
}

impl<'a, Q: QueryData> Chunks<'a, Q> {
    pub(super) fn new(store: &'a EntityStore, archetypes: slice::Iter<'a, ArchetypeId>) -> Self {
        Self {
            store,
            archetypes,
            _marker: core::marker::PhantomData,
        }
    }
}

impl<'a, Q: QueryData> Iterator for Chunks<'a, Q> {
    type Item = Chunk<'a, Q>;

    fn next(&mut self) -> Option<Self::Item> {
        for &arch_id in self.archetypes.by_ref() {
            let archetype = self.store.archetype(arch_id);
            if archetype.is_empty() {
                continue;
            }

            return Some(Chunk {
                columns: Q::borrow_columns(archetype),
                entities: archetype.entities(),
                archetype,
            });
        }

        None
    }
}

impl<'a, Q: QueryData> FusedIterator for Chunks<'a, Q> {}
