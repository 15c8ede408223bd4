use core::{
    any::{Any, TypeId},
    fmt::Debug,
};

use alloc::{boxed::Box, collections::BTreeMap, format, vec::Vec};
use smallvec::SmallVec;

use crate::{
    archetype::swap_remove, error::Result, ComponentValue, Entity, EntityStore, Error,
};

/// A component type of which an entity can hold many values, one per key.
///
/// ```rust
/// use archstore::Relation;
///
/// #[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// enum Slot {
///     Head,
///     Hand,
/// }
///
/// struct Item {
///     slot: Slot,
///     weight: f32,
/// }
///
/// impl Relation for Item {
///     type Key = Slot;
///
///     fn key(&self) -> Slot {
///         self.slot
///     }
/// }
/// ```
pub trait Relation: ComponentValue {
    type Key: PartialEq + Debug;

    fn key(&self) -> Self::Key;
}

/// The relations of one entity
struct RelationEntry {
    entity: Entity,
    /// Positions in the value column, in insertion order except after removals
    positions: SmallVec<[usize; 4]>,
}

/// All values of one relation type, densely packed
struct RelationColumn<R> {
    values: Vec<R>,
    /// Owning entity id of each value
    owners: Vec<u32>,
    /// Doubles as the reverse index of entities holding this relation type
    entries: BTreeMap<u32, RelationEntry>,
}

impl<R: Relation> RelationColumn<R> {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            owners: Vec::new(),
            entries: BTreeMap::new(),
        }
    }

    fn find(&self, entity: u32, key: &R::Key) -> Option<(usize, usize)> {
        let entry = self.entries.get(&entity)?;
        let index = entry
            .positions
            .iter()
            .position(|&pos| self.values[pos].key() == *key)?;

        Some((index, entry.positions[index]))
    }

    /// Returns true if the key was not present
    fn insert(&mut self, entity: Entity, value: R) -> bool {
        let key = value.key();
        if let Some((_, pos)) = self.find(entity.id(), &key) {
            self.values[pos] = value;
            return false;
        }

        let pos = self.values.len();
        self.values.push(value);
        self.owners.push(entity.id());

        self.entries
            .entry(entity.id())
            .or_insert_with(|| RelationEntry {
                entity,
                positions: SmallVec::new(),
            })
            .positions
            .push(pos);

        true
    }

    fn remove(&mut self, entity: u32, key: &R::Key) -> Option<R> {
        let (index, pos) = self.find(entity, key)?;

        if let Some(entry) = self.entries.get_mut(&entity) {
            entry.positions.swap_remove(index);
            if entry.positions.is_empty() {
                self.entries.remove(&entity);
            }
        }

        Some(self.remove_value(pos))
    }

    /// Swap-removes a value and repoints the moved value's owner entry
    fn remove_value(&mut self, pos: usize) -> R {
        let (value, moved) = swap_remove(&mut self.values, pos);
        swap_remove(&mut self.owners, pos);

        if moved {
            let old_pos = self.values.len();
            let owner = self.owners[pos];
            if let Some(slot) = self
                .entries
                .get_mut(&owner)
                .and_then(|v| v.positions.iter_mut().find(|v| **v == old_pos))
            {
                *slot = pos;
            }
        }

        value
    }

    fn values_of(&self, entity: u32) -> Relations<'_, R> {
        let positions = match self.entries.get(&entity) {
            Some(entry) => &entry.positions[..],
            None => Default::default(),
        };

        Relations {
            values: &self.values,
            positions: positions.iter(),
        }
    }
}

trait AnyRelationColumn: Send + Sync {
    fn remove_entity(&mut self, entity: u32);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<R: Relation> AnyRelationColumn for RelationColumn<R> {
    fn remove_entity(&mut self, entity: u32) {
        let Some(entry) = self.entries.remove(&entity) else {
            return;
        };

        // Highest first so earlier removals do not move the remaining values
        let mut positions = entry.positions;
        positions.sort_unstable_by(|a, b| b.cmp(a));

        for pos in positions {
            self.remove_value(pos);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Relation values of all types
#[derive(Default)]
pub(crate) struct RelationStore {
    columns: BTreeMap<TypeId, Box<dyn AnyRelationColumn>>,
}

impl RelationStore {
    fn column<R: Relation>(&self) -> Option<&RelationColumn<R>> {
        self.columns
            .get(&TypeId::of::<R>())?
            .as_any()
            .downcast_ref::<RelationColumn<R>>()
    }

    fn column_mut<R: Relation>(&mut self) -> Option<&mut RelationColumn<R>> {
        self.columns
            .get_mut(&TypeId::of::<R>())?
            .as_any_mut()
            .downcast_mut::<RelationColumn<R>>()
    }

    fn column_or_default<R: Relation>(&mut self) -> &mut RelationColumn<R> {
        let column = self
            .columns
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(RelationColumn::<R>::new()));

        match column.as_any_mut().downcast_mut::<RelationColumn<R>>() {
            Some(v) => v,
            None => unreachable!("Mismatched relation column for {}", tynm::type_name::<R>()),
        }
    }

    pub(crate) fn remove_entity(&mut self, entity: u32) {
        for column in self.columns.values_mut() {
            column.remove_entity(entity);
        }
    }
}

/// Iterator over the relations of one entity
pub struct Relations<'a, R> {
    values: &'a [R],
    positions: core::slice::Iter<'a, usize>,
}

impl<'a, R> Iterator for Relations<'a, R> {
    type Item = &'a R;

    fn next(&mut self) -> Option<Self::Item> {
        self.positions.next().map(|&pos| &self.values[pos])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<'a, R> ExactSizeIterator for Relations<'a, R> {}

fn missing_key<R: Relation>(entity: Entity, key: &R::Key) -> Error {
    Error::MissingRelationKey {
        entity,
        key: format!("{key:?}"),
    }
}

impl EntityStore {
    /// Adds a relation, replacing the value with the same key.
    ///
    /// Returns true if the key was not present.
    pub fn add_relation<R: Relation>(&mut self, entity: Entity, value: R) -> Result<bool> {
        self.nodes.get(entity)?;
        Ok(self.relations.column_or_default::<R>().insert(entity, value))
    }

    /// Fails if the entity has no relation with `key`
    pub fn get_relation<R: Relation>(&self, entity: Entity, key: &R::Key) -> Result<&R> {
        self.try_get_relation(entity, key)?
            .ok_or_else(|| missing_key::<R>(entity, key))
    }

    pub fn get_relation_mut<R: Relation>(
        &mut self,
        entity: Entity,
        key: &R::Key,
    ) -> Result<&mut R> {
        self.nodes.get(entity)?;

        let column = self.relations.column_mut::<R>();
        match column.and_then(|v| Some((v.find(entity.id(), key)?.1, v))) {
            Some((pos, column)) => Ok(&mut column.values[pos]),
            None => Err(missing_key::<R>(entity, key)),
        }
    }

    pub fn try_get_relation<R: Relation>(
        &self,
        entity: Entity,
        key: &R::Key,
    ) -> Result<Option<&R>> {
        self.nodes.get(entity)?;

        Ok(self.relations.column::<R>().and_then(|column| {
            let (_, pos) = column.find(entity.id(), key)?;
            Some(&column.values[pos])
        }))
    }

    /// Returns true if a relation with `key` was removed
    pub fn remove_relation<R: Relation>(&mut self, entity: Entity, key: &R::Key) -> Result<bool> {
        self.nodes.get(entity)?;

        Ok(self
            .relations
            .column_mut::<R>()
            .and_then(|column| column.remove(entity.id(), key))
            .is_some())
    }

    /// Iterate the relations of an entity
    pub fn get_relations<R: Relation>(&self, entity: Entity) -> Result<Relations<'_, R>> {
        self.nodes.get(entity)?;

        Ok(match self.relations.column::<R>() {
            Some(column) => column.values_of(entity.id()),
            None => Relations {
                values: Default::default(),
                positions: <&[usize]>::default().iter(),
            },
        })
    }

    /// Iterate all entities holding at least one relation of type `R`, in ascending id order
    pub fn entities_with_relations<R: Relation>(&self) -> impl Iterator<Item = Entity> + '_ {
        self.relations
            .column::<R>()
            .into_iter()
            .flat_map(|column| column.entries.values().map(|v| v.entity))
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Link(u32);

    impl Relation for Link {
        type Key = u32;

        fn key(&self) -> u32 {
            self.0
        }
    }

    fn entity(id: u32) -> Entity {
        Entity::from_parts(id, 0).unwrap()
    }

    fn keys(column: &RelationColumn<Link>, id: u32) -> Vec<u32> {
        column.values_of(id).map(|v| v.0).collect_vec()
    }

    #[test]
    fn swap_remove_repoints_owner() {
        let mut column = RelationColumn::<Link>::new();
        assert!(column.insert(entity(1), Link(1)));
        assert!(column.insert(entity(1), Link(2)));
        assert!(column.insert(entity(2), Link(10)));
        assert!(!column.insert(entity(2), Link(10)));

        assert_eq!(column.remove(1, &1), Some(Link(1)));

        assert_eq!(keys(&column, 1), [2]);
        assert_eq!(keys(&column, 2), [10]);
        assert_eq!(column.values.len(), 2);

        column.remove_entity(1);
        assert_eq!(keys(&column, 1), Vec::<u32>::new());
        assert_eq!(keys(&column, 2), [10]);
        assert_eq!(column.entries.keys().copied().collect_vec(), [2]);
    }

    #[test]
    fn relations_without_column() {
        let mut store = EntityStore::new();
        let id = store.create_entity();

        assert_eq!(store.get_relations::<Link>(id).unwrap().len(), 0);

        store.add_relation(id, Link(3)).unwrap();
        store.add_relation(id, Link(4)).unwrap();

        let relations = store.get_relations::<Link>(id).unwrap();
        assert_eq!(relations.len(), 2);
        assert_eq!(relations.map(|v| v.0).collect_vec(), [3, 4]);
    }
}
