use core::fmt;

use alloc::{boxed::Box, vec::Vec};

use crate::{
    archetype::{ArchetypeId, Row},
    error::Result,
    events::ComponentAction,
    format::write_names,
    query::{Query, QueryData},
    Component, ComponentType, ComponentTypes, Entity, EntityStore, Error, Signature, Tag, Tags,
};

/// A recorded component value, cloned into each entity the batch is applied to
trait PendingValue: Send + Sync {
    fn write(&self, store: &mut EntityStore, arch: ArchetypeId, row: Row, stash: bool);
}

struct Pending<T>(T);

impl<T: Component + Clone> PendingValue for Pending<T> {
    fn write(&self, store: &mut EntityStore, arch: ArchetypeId, row: Row, stash: bool) {
        store.write_component(arch, row, self.0.clone(), stash)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    #[default]
    Empty,
    Recording,
    Applied,
}

/// Records component and tag changes and applies them in a single structural change.
///
/// A later command for the same type replaces an earlier one, so adding and then removing a
/// component results in a single remove.
///
/// A batch is either bound to an entity, created by [`EntityStore::batch`] and applied with
/// [`EntityBatch::apply`], or standalone and applied to any number of entities with
/// [`EntityBatch::apply_to`].
#[derive(Default)]
pub struct EntityBatch {
    entity: Option<Entity>,
    state: BatchState,
    add: ComponentTypes,
    remove: ComponentTypes,
    add_tags: Tags,
    remove_tags: Tags,
    /// Indexed by component type
    values: Vec<Option<Box<dyn PendingValue>>>,
}

impl EntityBatch {
    /// Creates a standalone batch
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bound(entity: Entity) -> Self {
        Self {
            entity: Some(entity),
            ..Default::default()
        }
    }

    /// The entity a bound batch applies to
    pub fn entity(&self) -> Option<Entity> {
        self.entity
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    fn recording(&mut self) -> &mut Self {
        self.state = BatchState::Recording;
        self
    }

    fn set_value(&mut self, ty: ComponentType, value: Option<Box<dyn PendingValue>>) {
        let index = ty.index();
        if self.values.len() <= index {
            self.values.resize_with(index + 1, || None);
        }

        self.values[index] = value;
    }

    pub fn add_component<T: Component + Clone>(&mut self, value: T) -> &mut Self {
        let ty = T::component_type();
        self.add.insert(ty);
        self.remove.remove(ty);
        self.set_value(ty, Some(Box::new(Pending(value))));
        self.recording()
    }

    pub fn remove_component<T: Component>(&mut self) -> &mut Self {
        let ty = T::component_type();
        self.remove.insert(ty);
        self.add.remove(ty);
        self.set_value(ty, None);
        self.recording()
    }

    pub fn add_tag<T: Tag>(&mut self) -> &mut Self {
        self.add_tags(Tags::of::<(T,)>())
    }

    pub fn remove_tag<T: Tag>(&mut self) -> &mut Self {
        self.remove_tags(Tags::of::<(T,)>())
    }

    pub fn add_tags(&mut self, tags: Tags) -> &mut Self {
        self.add_tags = self.add_tags.union(&tags);
        self.remove_tags = self.remove_tags.difference(&tags);
        self.recording()
    }

    pub fn remove_tags(&mut self, tags: Tags) -> &mut Self {
        self.remove_tags = self.remove_tags.union(&tags);
        self.add_tags = self.add_tags.difference(&tags);
        self.recording()
    }

    /// Returns the number of recorded commands, one per affected type
    pub fn command_count(&self) -> usize {
        self.add.count() + self.remove.count() + self.add_tags.count() + self.remove_tags.count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.command_count() == 0
    }

    /// Components added by the batch
    pub fn added(&self) -> &ComponentTypes {
        &self.add
    }

    /// Components removed by the batch
    pub fn removed(&self) -> &ComponentTypes {
        &self.remove
    }

    pub fn added_tags(&self) -> &Tags {
        &self.add_tags
    }

    pub fn removed_tags(&self) -> &Tags {
        &self.remove_tags
    }

    /// Removes all commands, keeping the allocated storage
    pub fn clear(&mut self) {
        self.add = ComponentTypes::new();
        self.remove = ComponentTypes::new();
        self.add_tags = Tags::new();
        self.remove_tags = Tags::new();
        self.values.iter_mut().for_each(|v| *v = None);
        self.state = BatchState::Empty;
    }

    /// Applies a bound batch to its entity and clears it
    pub fn apply(&mut self, store: &mut EntityStore) -> Result<()> {
        let entity = self.entity.ok_or(Error::InvalidBatchUsage(
            "apply() can only be used on a batch bound to an entity. Use apply_to()",
        ))?;

        store.apply_batch(entity, self)?;
        self.clear();
        self.state = BatchState::Applied;
        Ok(())
    }

    /// Applies a standalone batch to `entity`.
    ///
    /// The commands are kept, so the batch can be applied to other entities.
    pub fn apply_to(&mut self, store: &mut EntityStore, entity: Entity) -> Result<()> {
        self.standalone()?;
        store.apply_batch(entity, self)?;
        self.state = BatchState::Applied;
        Ok(())
    }

    /// Applies a standalone batch to each entity
    pub fn apply_to_many(
        &mut self,
        store: &mut EntityStore,
        entities: impl IntoIterator<Item = Entity>,
    ) -> Result<()> {
        self.standalone()?;
        for entity in entities {
            store.apply_batch(entity, self)?;
        }

        self.state = BatchState::Applied;
        Ok(())
    }

    fn standalone(&self) -> Result<()> {
        match self.entity {
            Some(_) => Err(Error::InvalidBatchUsage(
                "apply_to() can only be used on a standalone batch. Use apply()",
            )),
            None => Ok(()),
        }
    }
}

/// Formats as `add: [Position, #Tag]  remove: [Rotation]`, or `empty`
impl fmt::Display for EntityBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("empty");
        }

        let added = !self.add.is_empty() || !self.add_tags.is_empty();
        if added {
            f.write_str("add: ")?;
            write_names(
                f,
                self.add.iter().map(|v| v.name()),
                self.add_tags.iter().map(|v| v.name()),
            )?;
        }

        if !self.remove.is_empty() || !self.remove_tags.is_empty() {
            if added {
                f.write_str("  ")?;
            }

            f.write_str("remove: ")?;
            write_names(
                f,
                self.remove.iter().map(|v| v.name()),
                self.remove_tags.iter().map(|v| v.name()),
            )?;
        }

        Ok(())
    }
}

impl fmt::Debug for EntityBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityBatch")
            .field("entity", &self.entity)
            .field("state", &self.state)
            .field("commands", &format_args!("{self}"))
            .finish()
    }
}

impl EntityStore {
    /// Creates a batch bound to `entity`
    pub fn batch(&self, entity: Entity) -> Result<EntityBatch> {
        self.nodes.get(entity)?;
        Ok(EntityBatch::bound(entity))
    }

    /// Applies a standalone batch to every entity matched by `query`
    pub fn apply_batch_to_query<Q: QueryData>(
        &mut self,
        query: &mut Query<Q>,
        batch: &mut EntityBatch,
    ) -> Result<()> {
        // Applying moves entities between archetypes
        let entities: Vec<Entity> = query.entities(self).collect();
        batch.apply_to_many(self, entities)
    }

    /// Folds the commands of `batch` onto the signature of `entity` and moves it at most once
    pub(crate) fn apply_batch(&mut self, entity: Entity, batch: &EntityBatch) -> Result<()> {
        let old = self.signature(entity)?;
        let target = Signature::new(
            old.components.union(&batch.add).difference(&batch.remove),
            old.tags.union(&batch.add_tags).difference(&batch.remove_tags),
        );

        let listening = !self.events.components.is_empty();
        let stash_removed = self.events.components.wants(ComponentAction::Remove);
        let stash_updated = self.events.components.wants(ComponentAction::Update);

        let loc = self.relocate(entity, &target, stash_removed)?;

        for ty in batch.add.iter() {
            if let Some(Some(value)) = batch.values.get(ty.index()) {
                let existed = old.components.contains(ty);
                value.write(self, loc.dst, loc.row, existed && stash_updated);
            }
        }

        self.emit_tags(entity, target.tags, old.tags);

        if listening {
            for ty in batch.add.iter() {
                let action = if old.components.contains(ty) {
                    ComponentAction::Update
                } else {
                    ComponentAction::Add
                };

                let old_in = (action == ComponentAction::Update).then_some(loc.dst);
                self.emit_component(entity, action, ty, Some((loc.dst, loc.row)), old_in);
            }

            for ty in batch.remove.iter().filter(|&ty| old.components.contains(ty)) {
                self.emit_component(entity, ComponentAction::Remove, ty, None, Some(loc.src));
            }

            self.clear_stash(loc.dst);
            if loc.src != loc.dst {
                self.clear_stash(loc.src);
            }
        }

        Ok(())
    }
}
