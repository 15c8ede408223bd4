use core::{
    num::NonZeroU32,
    sync::atomic::{AtomicU64, Ordering},
};
use std::collections::HashMap;

use alloc::{boxed::Box, format};
use atomic_refcell::{AtomicRef, AtomicRefMut};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    archetype::{Archetype, ArchetypeId, Row},
    archetypes::Archetypes,
    components::Disabled,
    entity::{EntityNode, NodeFlags, Nodes},
    error::Result,
    events::{
        ComponentAction, ComponentChanged, ComponentMask, Events, ListenerId, TagsChanged,
    },
    format::EntityFormatter,
    relation::RelationStore,
    ChildEntitiesChanged, Component, ComponentBundle, ComponentType, Entity, Error, PidType,
    Signature, StoreConfig, Tag, Tags,
};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Location of an entity before and after a structural change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Relocation {
    pub src: ArchetypeId,
    pub dst: ArchetypeId,
    pub row: Row,
}

/// Holds the entities, their components and the archetypes storing them.
///
/// Every structural change, such as adding or removing a component or tag, moves the entity to
/// the archetype of its new signature.
pub struct EntityStore {
    id: u64,
    config: StoreConfig,
    pub(crate) nodes: Nodes,
    pub(crate) archetypes: Archetypes,
    pids: HashMap<u64, u32>,
    rng: StdRng,
    pub(crate) events: Events,
    pub(crate) relations: RelationStore,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            archetypes: Archetypes::new(config.default_capacity),
            config,
            nodes: Nodes::new(),
            pids: HashMap::new(),
            rng,
            events: Events::default(),
            relations: RelationStore::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Unique id of this store within the process
    pub(crate) fn store_id(&self) -> u64 {
        self.id
    }

    /// Returns the number of alive entities
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a new entity without components in the default archetype
    pub fn create_entity(&mut self) -> Entity {
        self.create_entity_in(ArchetypeId::DEFAULT)
    }

    /// Creates a new entity in the given archetype, with every component default initialized
    pub fn create_entity_in(&mut self, archetype: ArchetypeId) -> Entity {
        let row = self.archetypes.get(archetype).len();
        let entity = self.nodes.alloc(archetype, row);
        self.spawned(entity, archetype, row);
        entity
    }

    /// Creates an entity with its initial components and tags.
    ///
    /// The entity is placed directly in the archetype of its signature. No events are raised.
    pub fn create_entity_with<C: ComponentBundle>(&mut self, components: C, tags: Tags) -> Entity {
        let signature = Signature::new(C::component_types(), tags);
        let archetype = self.archetypes.get_or_create(&signature);

        let entity = self.create_entity_in(archetype);
        let row = self.nodes.node(entity.id()).row;
        components.write_row(self.archetypes.get_mut(archetype), row);

        entity
    }

    /// Creates an entity with a specific id.
    ///
    /// Fails if the id is in use.
    pub fn create_entity_at(&mut self, id: u32) -> Result<Entity> {
        let id = NonZeroU32::new(id).ok_or(Error::InvalidId(id))?;

        let archetype = ArchetypeId::DEFAULT;
        let row = self.archetypes.get(archetype).len();
        let entity = self.nodes.alloc_at(id, archetype, row)?;
        self.spawned(entity, archetype, row);
        Ok(entity)
    }

    fn spawned(&mut self, entity: Entity, archetype: ArchetypeId, row: Row) {
        let actual = self.archetypes.get_mut(archetype).add_entity(entity);
        debug_assert_eq!(actual, row);

        let pid = self.next_pid(entity.id());
        self.nodes.node_mut(entity.id()).pid = pid;

        tracing::trace!(%entity, pid, %archetype, "created entity");
    }

    fn next_pid(&mut self, id: u32) -> u64 {
        match self.config.pid_type {
            PidType::UsePidAsId => id as u64,
            PidType::RandomPids => loop {
                let pid = self.rng.gen_range(1..=i64::MAX as u64);
                if let std::collections::hash_map::Entry::Vacant(slot) = self.pids.entry(pid) {
                    slot.insert(id);
                    break pid;
                }
            },
        }
    }

    /// Deletes an entity.
    ///
    /// The entity is removed from its parent and its children become root entities, raising a
    /// child event for every unlink. All its relations and the listeners scoped to it are
    /// dropped. No component events are raised.
    pub fn delete_entity(&mut self, entity: Entity) -> Result<()> {
        let node = self.nodes.get(entity)?;

        if let Some(parent) = node.parent {
            self.detach_child(parent, entity.id());
        }

        while let Some(&child) = self.nodes.node(entity.id()).children.first() {
            self.detach_child(entity.id(), child);
        }

        self.relations.remove_entity(entity.id());
        self.events.remove_entity(entity);

        let node = self.nodes.free(entity)?;
        if let Some(arch_id) = node.archetype {
            let arch = self.archetypes.get_mut(arch_id);
            if let Some(moved) = arch.remove_entity(node.row) {
                self.nodes.set_row(moved, node.row);
            }
        }

        if self.config.pid_type == PidType::RandomPids {
            self.pids.remove(&node.pid);
        }

        tracing::trace!(%entity, "deleted entity");
        Ok(())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.nodes.get(entity).is_ok()
    }

    /// Returns the current handle of an alive id
    pub fn entity_by_id(&self, id: u32) -> Option<Entity> {
        self.nodes.entity(id)
    }

    pub fn entity_by_pid(&self, pid: u64) -> Option<Entity> {
        let id = match self.config.pid_type {
            PidType::UsePidAsId => u32::try_from(pid).ok()?,
            PidType::RandomPids => *self.pids.get(&pid)?,
        };

        self.nodes.entity(id)
    }

    pub fn node(&self, entity: Entity) -> Result<&EntityNode> {
        self.nodes.get(entity)
    }

    /// Iterate all alive entities in ascending id order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.nodes.iter().map(|(entity, _)| entity)
    }

    pub(crate) fn location(&self, entity: Entity) -> Result<(ArchetypeId, Row)> {
        let node = self.nodes.get(entity)?;
        node.archetype
            .map(|arch| (arch, node.row))
            .ok_or(Error::StaleHandle(entity))
    }

    /// Returns the archetype of `signature`, creating it if it does not exist yet
    pub fn get_archetype(&mut self, signature: &Signature) -> ArchetypeId {
        self.archetypes.get_or_create(signature)
    }

    pub fn find_archetype(&self, signature: &Signature) -> Option<ArchetypeId> {
        self.archetypes.find(signature)
    }

    /// # Panics
    /// If the archetype does not belong to this store
    pub fn archetype(&self, id: ArchetypeId) -> &Archetype {
        self.archetypes.get(id)
    }

    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn entity_archetype(&self, entity: Entity) -> Result<&Archetype> {
        let (arch, _) = self.location(entity)?;
        Ok(self.archetypes.get(arch))
    }

    pub fn signature(&self, entity: Entity) -> Result<Signature> {
        Ok(*self.entity_archetype(entity)?.signature())
    }

    /// Moves `entity` to the archetype of `signature`.
    ///
    /// Values of removed components are stashed in the source archetype if `stash` is set.
    pub(crate) fn relocate(
        &mut self,
        entity: Entity,
        signature: &Signature,
        stash: bool,
    ) -> Result<Relocation> {
        let (src, src_row) = self.location(entity)?;
        let dst = self.archetypes.get_or_create(signature);

        if src == dst {
            return Ok(Relocation {
                src,
                dst,
                row: src_row,
            });
        }

        let (src_arch, dst_arch) = self.archetypes.get_disjoint_mut(src, dst);
        let (row, moved) = src_arch.move_entity_to(src_row, dst_arch, stash);

        if let Some(moved) = moved {
            self.nodes.set_row(moved, src_row);
        }

        let node = self.nodes.get_mut(entity)?;
        node.archetype = Some(dst);
        node.row = row;
        node.flags.remove(NodeFlags::CREATED);

        tracing::trace!(%entity, %src, %dst, "moved entity");

        Ok(Relocation { src, dst, row })
    }

    /// Writes a value without raising events
    pub(crate) fn write_component<T: Component>(
        &mut self,
        arch: ArchetypeId,
        row: Row,
        value: T,
        stash: bool,
    ) {
        if let Some(column) = self.archetypes.get_mut(arch).column_mut::<T>() {
            column.replace(row, value, stash);
        }
    }

    /// Raises a component event.
    ///
    /// The new value is read from `value_at` and the old value from the stash of `old_in`.
    pub(crate) fn emit_component(
        &mut self,
        entity: Entity,
        action: ComponentAction,
        component: ComponentType,
        value_at: Option<(ArchetypeId, Row)>,
        old_in: Option<ArchetypeId>,
    ) {
        let value = value_at.and_then(|(arch, row)| self.archetypes.get(arch).get_any(component, row));
        let old = old_in.and_then(|arch| self.archetypes.get(arch).stashed(component));

        let event = ComponentChanged {
            entity,
            action,
            component,
            value: value.as_deref(),
            old: old.as_deref(),
        };

        self.events.components.dispatch(&event);
    }

    pub(crate) fn emit_tags(&mut self, entity: Entity, tags: Tags, old_tags: Tags) {
        if self.events.tags.is_empty() || tags == old_tags {
            return;
        }

        self.events.tags.dispatch(&TagsChanged {
            entity,
            tags,
            old_tags,
        });
    }

    pub(crate) fn clear_stash(&mut self, arch: ArchetypeId) {
        self.archetypes.get_mut(arch).clear_stash();
    }

    /// Adds or updates a component.
    ///
    /// Returns true if the component was added, and false if an existing value was replaced.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<bool> {
        let ty = T::component_type();
        let (arch_id, row) = self.location(entity)?;
        let signature = *self.archetypes.get(arch_id).signature();

        if signature.components.contains(ty) {
            self.update_component(entity, arch_id, row, value);
            return Ok(false);
        }

        let loc = self.relocate(entity, &signature.with_component(ty), false)?;
        self.write_component(loc.dst, loc.row, value, false);

        if self.events.components.wants(ComponentAction::Add) {
            self.emit_component(
                entity,
                ComponentAction::Add,
                ty,
                Some((loc.dst, loc.row)),
                None,
            );
        }

        Ok(true)
    }

    /// Replaces the value of an existing component.
    ///
    /// Fails if the entity does not have the component.
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let (arch_id, row) = self.location(entity)?;
        if !self.archetypes.get(arch_id).has::<T>() {
            return Err(missing::<T>(entity));
        }

        self.update_component(entity, arch_id, row, value);
        Ok(())
    }

    fn update_component<T: Component>(
        &mut self,
        entity: Entity,
        arch: ArchetypeId,
        row: Row,
        value: T,
    ) {
        let stash = self.events.components.wants(ComponentAction::Update);
        self.write_component(arch, row, value, stash);

        if stash {
            self.emit_component(
                entity,
                ComponentAction::Update,
                T::component_type(),
                Some((arch, row)),
                Some(arch),
            );
            self.clear_stash(arch);
        }
    }

    /// Removes a component.
    ///
    /// Returns false if the entity did not have the component.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<bool> {
        let ty = T::component_type();
        let (arch_id, _) = self.location(entity)?;
        let signature = *self.archetypes.get(arch_id).signature();

        if !signature.components.contains(ty) {
            return Ok(false);
        }

        let stash = self.events.components.wants(ComponentAction::Remove);
        let loc = self.relocate(entity, &signature.without_component(ty), stash)?;

        if stash {
            self.emit_component(entity, ComponentAction::Remove, ty, None, Some(loc.src));
            self.clear_stash(loc.src);
        }

        Ok(true)
    }

    /// Returns true if the entity is alive and has the component
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.entity_archetype(entity)
            .map(|v| v.has::<T>())
            .unwrap_or_default()
    }

    /// Access a component.
    ///
    /// Fails if the entity does not have the component.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<AtomicRef<T>> {
        self.try_get_component(entity)?
            .ok_or_else(|| missing::<T>(entity))
    }

    /// Mutably access a component without raising an update event
    pub fn get_component_mut<T: Component>(&self, entity: Entity) -> Result<AtomicRefMut<T>> {
        let (arch, row) = self.location(entity)?;
        self.archetypes
            .get(arch)
            .get_mut::<T>(row)
            .ok_or_else(|| missing::<T>(entity))
    }

    /// Access a component if present
    pub fn try_get_component<T: Component>(&self, entity: Entity) -> Result<Option<AtomicRef<T>>> {
        let (arch, row) = self.location(entity)?;
        Ok(self.archetypes.get(arch).get::<T>(row))
    }

    pub fn tags(&self, entity: Entity) -> Result<Tags> {
        Ok(*self.entity_archetype(entity)?.tags())
    }

    pub fn has_tag<T: Tag>(&self, entity: Entity) -> bool {
        self.entity_archetype(entity)
            .map(|v| v.tags().has::<T>())
            .unwrap_or_default()
    }

    /// Returns true if the tag was added
    pub fn add_tag<T: Tag>(&mut self, entity: Entity) -> Result<bool> {
        self.add_tags(entity, Tags::of::<(T,)>())
    }

    /// Returns true if the tag was removed
    pub fn remove_tag<T: Tag>(&mut self, entity: Entity) -> Result<bool> {
        self.remove_tags(entity, Tags::of::<(T,)>())
    }

    /// Returns true if any tag was added
    pub fn add_tags(&mut self, entity: Entity, tags: Tags) -> Result<bool> {
        self.change_tags(entity, |old| old.union(&tags))
    }

    /// Returns true if any tag was removed
    pub fn remove_tags(&mut self, entity: Entity, tags: Tags) -> Result<bool> {
        self.change_tags(entity, |old| old.difference(&tags))
    }

    fn change_tags(&mut self, entity: Entity, f: impl FnOnce(&Tags) -> Tags) -> Result<bool> {
        let signature = self.signature(entity)?;
        let tags = f(&signature.tags);
        if tags == signature.tags {
            return Ok(false);
        }

        self.relocate(entity, &Signature::new(signature.components, tags), false)?;
        self.emit_tags(entity, tags, signature.tags);
        Ok(true)
    }

    /// Disabled entities are hidden from queries unless queried
    /// [`with_disabled`](crate::Query::with_disabled)
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) -> Result<()> {
        if enabled {
            self.remove_tag::<Disabled>(entity)?;
        } else {
            self.add_tag::<Disabled>(entity)?;
        }

        Ok(())
    }

    pub fn is_enabled(&self, entity: Entity) -> Result<bool> {
        Ok(!self.tags(entity)?.has::<Disabled>())
    }

    /// Listen to added and updated components
    pub fn on_component_added(
        &mut self,
        listener: impl FnMut(&ComponentChanged) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events
            .add_component_listener(None, ComponentMask::ADDED, Box::new(listener))
    }

    /// Listen to removed components
    pub fn on_component_removed(
        &mut self,
        listener: impl FnMut(&ComponentChanged) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events
            .add_component_listener(None, ComponentMask::REMOVED, Box::new(listener))
    }

    /// Listen to added, updated and removed components
    pub fn on_component_changed(
        &mut self,
        listener: impl FnMut(&ComponentChanged) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events
            .add_component_listener(None, ComponentMask::all(), Box::new(listener))
    }

    pub fn on_tags_changed(
        &mut self,
        listener: impl FnMut(&TagsChanged) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events.add_tags_listener(None, Box::new(listener))
    }

    /// Listen to children added to or removed from any entity.
    ///
    /// Deleting an entity raises a remove event for its link to its parent and for each of its
    /// children.
    pub fn on_child_entities_changed(
        &mut self,
        listener: impl FnMut(&ChildEntitiesChanged) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events.add_child_listener(None, Box::new(listener))
    }

    /// Listen to added, updated and removed components of a single entity.
    ///
    /// The listener is dropped when the entity is deleted.
    pub fn on_entity_component_changed(
        &mut self,
        entity: Entity,
        listener: impl FnMut(&ComponentChanged) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        self.nodes.get(entity)?;
        Ok(self
            .events
            .add_component_listener(Some(entity), ComponentMask::all(), Box::new(listener)))
    }

    /// Listen to the tag changes of a single entity
    pub fn on_entity_tags_changed(
        &mut self,
        entity: Entity,
        listener: impl FnMut(&TagsChanged) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        self.nodes.get(entity)?;
        Ok(self.events.add_tags_listener(Some(entity), Box::new(listener)))
    }

    /// Listen to children added to or removed from a single entity
    pub fn on_entity_child_entities_changed(
        &mut self,
        entity: Entity,
        listener: impl FnMut(&ChildEntitiesChanged) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        self.nodes.get(entity)?;
        Ok(self.events.add_child_listener(Some(entity), Box::new(listener)))
    }

    /// Returns true if the listener was registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove(id)
    }

    /// Formats an entity as `id: 1  "name"  [EntityName, Position, #Tag]`
    pub fn format_entity(&self, entity: Entity) -> EntityFormatter {
        EntityFormatter {
            store: self,
            entity,
        }
    }
}

fn missing<T: Component>(entity: Entity) -> Error {
    Error::MissingComponent {
        entity,
        missing: format!("[{}]", T::component_type().name()),
    }
}

impl core::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.len())
            .field("archetypes", &self.archetypes.len())
            .finish()
    }
}
