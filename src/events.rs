use core::{any::Any, fmt};

use alloc::{boxed::Box, vec::Vec};
use bitflags::bitflags;

use crate::{ComponentType, Entity, Tags};

/// Describes what happened to a component of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentAction {
    /// The component was added to the entity
    Add,
    /// The value of an existing component was replaced
    Update,
    /// The component was removed from the entity
    Remove,
}

impl fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("Add"),
            Self::Update => f.write_str("Update"),
            Self::Remove => f.write_str("Remove"),
        }
    }
}

bitflags! {
    /// Selects which component actions a listener receives
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct ComponentMask: u8 {
        const ADDED = 1;
        const REMOVED = 2;
    }
}

impl ComponentAction {
    fn mask(&self) -> ComponentMask {
        match self {
            Self::Add | Self::Update => ComponentMask::ADDED,
            Self::Remove => ComponentMask::REMOVED,
        }
    }
}

/// A component of an entity was added, updated or removed.
///
/// Values are only accessible for the duration of the listener call.
pub struct ComponentChanged<'a> {
    pub entity: Entity,
    pub action: ComponentAction,
    pub component: ComponentType,
    pub(crate) value: Option<&'a dyn Any>,
    pub(crate) old: Option<&'a dyn Any>,
}

impl<'a> ComponentChanged<'a> {
    /// The current value for [`ComponentAction::Add`] and [`ComponentAction::Update`]
    pub fn component<T: 'static>(&self) -> Option<&'a T> {
        self.value?.downcast_ref()
    }

    /// The previous value for [`ComponentAction::Update`] and [`ComponentAction::Remove`]
    pub fn old_component<T: 'static>(&self) -> Option<&'a T> {
        self.old?.downcast_ref()
    }
}

impl<'a> fmt::Display for ComponentChanged<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entity: {} - event > {} Component: [{}]",
            self.entity.id(),
            self.action,
            self.component.name()
        )
    }
}

impl<'a> fmt::Debug for ComponentChanged<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The tags of an entity changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagsChanged {
    pub entity: Entity,
    pub tags: Tags,
    pub old_tags: Tags,
}

impl TagsChanged {
    pub fn added_tags(&self) -> Tags {
        self.tags.difference(&self.old_tags)
    }

    pub fn removed_tags(&self) -> Tags {
        self.old_tags.difference(&self.tags)
    }
}

impl fmt::Display for TagsChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity: {} - event >", self.entity.id())?;

        let added = self.added_tags();
        if !added.is_empty() {
            write!(f, " Add Tags: {added}")?;
        }

        let removed = self.removed_tags();
        if !removed.is_empty() {
            write!(f, " Remove Tags: {removed}")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChildAction {
    Add,
    Remove,
}

/// A child was added to or removed from an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildEntitiesChanged {
    pub action: ChildAction,
    pub parent: Entity,
    pub child: Entity,
    /// Position of the child in the child list of the parent
    pub index: usize,
}

impl fmt::Display for ChildEntitiesChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            ChildAction::Add => "Add",
            ChildAction::Remove => "Remove",
        };

        write!(
            f,
            "entity: {} - event > {action} Child[{}] = {}",
            self.parent.id(),
            self.index,
            self.child.id()
        )
    }
}

/// Handle returned when registering a listener, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

pub(crate) type ComponentListener = dyn for<'a> FnMut(&ComponentChanged<'a>) + Send + Sync;
pub(crate) type TagsListener = dyn FnMut(&TagsChanged) + Send + Sync;
pub(crate) type ChildListener = dyn FnMut(&ChildEntitiesChanged) + Send + Sync;

struct Listener<F: ?Sized, M> {
    id: ListenerId,
    /// Only events of this entity are received
    entity: Option<Entity>,
    mask: M,
    handler: Box<F>,
}

impl<F: ?Sized, M> Listener<F, M> {
    #[inline]
    fn receives(&self, entity: Entity) -> bool {
        self.entity.map_or(true, |v| v == entity)
    }
}

/// Ordered list of listeners for one channel.
///
/// `M` filters events within the channel, such as the actions of component events.
pub(crate) struct Listeners<F: ?Sized, M = ()> {
    entries: Vec<Listener<F, M>>,
}

impl<F: ?Sized, M> Default for Listeners<F, M> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized, M> Listeners<F, M> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, id: ListenerId, entity: Option<Entity>, mask: M, handler: Box<F>) {
        self.entries.push(Listener {
            id,
            entity,
            mask,
            handler,
        })
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let len = self.entries.len();
        self.entries.retain(|v| v.id != id);
        self.entries.len() != len
    }

    /// Drops the listeners scoped to `entity`
    fn remove_entity(&mut self, entity: Entity) {
        self.entries.retain(|v| v.entity != Some(entity));
    }
}

impl Listeners<ComponentListener, ComponentMask> {
    /// Returns true if any listener receives `action`
    #[inline]
    pub fn wants(&self, action: ComponentAction) -> bool {
        let mask = action.mask();
        self.entries.iter().any(|v| v.mask.intersects(mask))
    }

    pub fn dispatch(&mut self, event: &ComponentChanged) {
        let mask = event.action.mask();
        for listener in &mut self.entries {
            if listener.mask.intersects(mask) && listener.receives(event.entity) {
                (listener.handler)(event)
            }
        }
    }
}

impl Listeners<TagsListener> {
    pub fn dispatch(&mut self, event: &TagsChanged) {
        for listener in &mut self.entries {
            if listener.receives(event.entity) {
                (listener.handler)(event)
            }
        }
    }
}

impl Listeners<ChildListener> {
    /// Listeners scoped to an entity receive the events where it is the parent
    pub fn dispatch(&mut self, event: &ChildEntitiesChanged) {
        for listener in &mut self.entries {
            if listener.receives(event.parent) {
                (listener.handler)(event)
            }
        }
    }
}

/// The event channels of a store.
///
/// Payloads are only built when the respective channel has a listener.
#[derive(Default)]
pub(crate) struct Events {
    next_id: u64,
    pub(crate) components: Listeners<ComponentListener, ComponentMask>,
    pub(crate) tags: Listeners<TagsListener>,
    pub(crate) children: Listeners<ChildListener>,
}

impl Events {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    pub(crate) fn add_component_listener(
        &mut self,
        entity: Option<Entity>,
        mask: ComponentMask,
        handler: Box<ComponentListener>,
    ) -> ListenerId {
        let id = self.next_id();
        self.components.push(id, entity, mask, handler);
        id
    }

    pub(crate) fn add_tags_listener(
        &mut self,
        entity: Option<Entity>,
        handler: Box<TagsListener>,
    ) -> ListenerId {
        let id = self.next_id();
        self.tags.push(id, entity, (), handler);
        id
    }

    pub(crate) fn add_child_listener(
        &mut self,
        entity: Option<Entity>,
        handler: Box<ChildListener>,
    ) -> ListenerId {
        let id = self.next_id();
        self.children.push(id, entity, (), handler);
        id
    }

    /// Drops every listener scoped to a deleted entity
    pub(crate) fn remove_entity(&mut self, entity: Entity) {
        self.components.remove_entity(entity);
        self.tags.remove_entity(entity);
        self.children.remove_entity(entity);
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.components.remove(id) || self.tags.remove(id) || self.children.remove(id)
    }
}
