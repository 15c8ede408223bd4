use alloc::{boxed::Box, collections::BTreeMap, format, vec::Vec};
use core::{any::Any, fmt};

use atomic_refcell::{AtomicRef, AtomicRefCell, AtomicRefMut};

use crate::{
    component::{Component, ComponentType, ComponentTypes},
    tag::Tags,
    Entity, Signature,
};

mod storage;

pub(crate) use storage::*;

/// Index of an archetype within its store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    /// The archetype without any components or tags
    pub const DEFAULT: Self = Self(0);

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arch:{}", self.0)
    }
}

/// Represents a row in the archetype
pub type Row = usize;

const SHORT_DEBUG_LEN: usize = 8;

#[derive(Clone)]
/// Shows only a handful of entries to avoid cluttering the terminal with gigantic vecs
struct ShortDebugVec<T>(Vec<T>);

impl<T: fmt::Debug> fmt::Debug for ShortDebugVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_list();
        s.entries(self.0.iter().take(SHORT_DEBUG_LEN));

        if self.0.len() > SHORT_DEBUG_LEN {
            s.entry(&format_args!("+{} more", self.0.len() - SHORT_DEBUG_LEN));
        }

        s.finish()
    }
}

/// Human friendly archetype inspection
#[derive(Debug, Clone)]
pub struct ArchetypeInfo {
    signature: Signature,
    len: usize,
    capacity: usize,
    entities: ShortDebugVec<Entity>,
}

impl ArchetypeInfo {
    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the entities in the archetype
    pub fn entities(&self) -> &[Entity] {
        &self.entities.0
    }
}

/// A collection of entities with the same components and tags.
/// Stored as columns of contiguous component data.
///
/// Every column and the entity array have the same length, which is the number of rows.
pub struct Archetype {
    id: ArchetypeId,
    signature: Signature,
    columns: BTreeMap<u16, AtomicRefCell<Box<dyn Storage>>>,
    /// Row to entity
    entities: Vec<Entity>,
    capacity: usize,
}

impl Archetype {
    /// Creates an empty archetype with columns for each component type of the signature
    pub(crate) fn create_with_signature(
        id: ArchetypeId,
        signature: Signature,
        capacity: usize,
    ) -> Self {
        let columns = signature
            .components
            .iter()
            .map(|ty| (ty.index() as u16, AtomicRefCell::new(ty.new_storage(capacity))))
            .collect();

        Self {
            id,
            signature,
            columns,
            entities: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn component_types(&self) -> &ComponentTypes {
        &self.signature.components
    }

    pub fn tags(&self) -> &Tags {
        &self.signature.tags
    }

    /// Returns the number of entities in the archetype
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Row to entity
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, row: Row) -> Option<Entity> {
        self.entities.get(row).copied()
    }

    pub fn has<T: Component>(&self) -> bool {
        self.signature.components.has::<T>()
    }

    fn reserve_one(&mut self) {
        if self.entities.len() < self.capacity {
            return;
        }

        let capacity = (self.capacity * 2).max(1);
        tracing::trace!(id = %self.id, capacity, "growing archetype");

        self.entities.reserve_exact(capacity - self.entities.len());
        for column in self.columns.values_mut() {
            column.get_mut().grow(capacity);
        }

        self.capacity = capacity;
    }

    /// Appends a new row for `entity` with every component default initialized
    pub(crate) fn add_entity(&mut self, entity: Entity) -> Row {
        self.reserve_one();

        let row = self.entities.len();
        self.entities.push(entity);
        for column in self.columns.values_mut() {
            column.get_mut().push_default();
        }

        row
    }

    /// Moves the entity at `row` to `dst`.
    ///
    /// Components shared with `dst` are moved, components missing in `dst` are dropped or
    /// stashed if `stash` is set, and components only present in `dst` are default initialized.
    ///
    /// The row is swap-removed from `self`. Returns the row in `dst` and the entity which now
    /// occupies `row` in `self`, if any.
    pub(crate) fn move_entity_to(
        &mut self,
        row: Row,
        dst: &mut Archetype,
        stash: bool,
    ) -> (Row, Option<Entity>) {
        dst.reserve_one();

        for (key, column) in &mut self.columns {
            let column = column.get_mut();
            match dst.columns.get_mut(key) {
                Some(dst_column) => column.swap_remove_to(row, &mut **dst_column.get_mut()),
                None => column.swap_remove(row, stash),
            }
        }

        for (key, column) in &mut dst.columns {
            if !self.columns.contains_key(key) {
                column.get_mut().push_default();
            }
        }

        let (entity, moved) = swap_remove(&mut self.entities, row);
        let dst_row = dst.entities.len();
        dst.entities.push(entity);

        let len = dst.entities.len();
        debug_assert!(dst.columns.values_mut().all(|v| v.get_mut().len() == len));

        (dst_row, moved.then(|| self.entities[row]))
    }

    /// Swap-removes the entity at `row`, dropping all its components.
    ///
    /// Returns the entity which now occupies `row`, if any.
    pub(crate) fn remove_entity(&mut self, row: Row) -> Option<Entity> {
        for column in self.columns.values_mut() {
            column.get_mut().swap_remove(row, false);
        }

        let (_, moved) = swap_remove(&mut self.entities, row);
        moved.then(|| self.entities[row])
    }

    /// Drops all stashed values
    pub(crate) fn clear_stash(&mut self) {
        for column in self.columns.values_mut() {
            column.get_mut().clear_stash();
        }
    }

    /// Returns the stashed value of a component type
    pub(crate) fn stashed(&self, ty: ComponentType) -> Option<AtomicRef<dyn Any>> {
        let column = self.columns.get(&(ty.index() as u16))?.borrow();
        AtomicRef::filter_map(column, |v| v.stashed())
    }

    pub(crate) fn get_any(&self, ty: ComponentType, row: Row) -> Option<AtomicRef<dyn Any>> {
        let column = self.columns.get(&(ty.index() as u16))?.borrow();
        AtomicRef::filter_map(column, |v| v.get_any(row))
    }

    fn column<T: Component>(&self) -> Option<&AtomicRefCell<Box<dyn Storage>>> {
        self.columns.get(&(T::component_type().index() as u16))
    }

    /// Borrow the column of `T`
    ///
    /// # Panics
    /// If the column is already borrowed mutably
    pub fn borrow<T: Component>(&self) -> Option<AtomicRef<[T]>> {
        let column = self.column::<T>()?;
        let column = match column.try_borrow() {
            Ok(v) => v,
            Err(_) => panic!("Component {} is already borrowed mutably", tynm::type_name::<T>()),
        };

        AtomicRef::filter_map(column, |v| {
            v.as_any()
                .downcast_ref::<Column<T>>()
                .map(|v| v.data.as_slice())
        })
    }

    /// Mutably borrow the column of `T`
    ///
    /// # Panics
    /// If the column is already borrowed
    pub fn borrow_mut<T: Component>(&self) -> Option<AtomicRefMut<[T]>> {
        let column = self.column::<T>()?;
        let column = match column.try_borrow_mut() {
            Ok(v) => v,
            Err(_) => panic!("Component {} is already borrowed", tynm::type_name::<T>()),
        };

        AtomicRefMut::filter_map(column, |v| {
            v.as_any_mut()
                .downcast_mut::<Column<T>>()
                .map(|v| v.data.as_mut_slice())
        })
    }

    pub fn get<T: Component>(&self, row: Row) -> Option<AtomicRef<T>> {
        AtomicRef::filter_map(self.borrow::<T>()?, |v| v.get(row))
    }

    pub fn get_mut<T: Component>(&self, row: Row) -> Option<AtomicRefMut<T>> {
        AtomicRefMut::filter_map(self.borrow_mut::<T>()?, |v| v.get_mut(row))
    }

    /// Typed access to the column of `T` for writes which bypass borrow tracking
    pub(crate) fn column_mut<T: Component>(&mut self) -> Option<&mut Column<T>> {
        let column = self
            .columns
            .get_mut(&(T::component_type().index() as u16))?
            .get_mut();

        column.as_any_mut().downcast_mut::<Column<T>>()
    }

    pub fn info(&self) -> ArchetypeInfo {
        ArchetypeInfo {
            signature: self.signature,
            len: self.len(),
            capacity: self.capacity,
            entities: ShortDebugVec(self.entities.clone()),
        }
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("signature", &format!("{}", self.signature))
            .field("len", &self.len())
            .finish()
    }
}
