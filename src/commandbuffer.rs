use core::{any::Any, fmt};
use std::collections::HashMap;

use alloc::{boxed::Box, collections::BTreeMap, format, vec::Vec};
use anyhow::Context;

use crate::{
    Component, ComponentType, ComponentTypes, Entity, EntityStore, Error, Signature, Tag, Tags,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Add,
    Update,
    Remove,
}

struct ComponentCommand<T> {
    entity: Entity,
    kind: CommandKind,
    value: Option<T>,
}

/// Recorded commands of a single component type, in recording order
struct ComponentCommands<T> {
    ty: ComponentType,
    commands: Vec<ComponentCommand<T>>,
}

trait AnyComponentCommands: Send + Sync {
    fn len(&self) -> usize;

    /// Fails if an update targets an entity without the component at that point of the
    /// recording. `current` returns the signature of an entity before playback.
    fn validate(&self, current: &dyn Fn(Entity) -> Option<Signature>) -> anyhow::Result<()>;

    /// Writes all values into the archetypes the entities were moved to
    fn execute(&mut self, store: &mut EntityStore);

    fn clear(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyComponentCommands for ComponentCommands<T> {
    fn len(&self) -> usize {
        self.commands.len()
    }

    fn validate(&self, current: &dyn Fn(Entity) -> Option<Signature>) -> anyhow::Result<()> {
        // Presence of the component while walking the commands in recording order
        let mut state: HashMap<Entity, bool> = HashMap::new();

        for cmd in &self.commands {
            let present = state.entry(cmd.entity).or_insert_with(|| {
                current(cmd.entity)
                    .map(|v| v.components.contains(self.ty))
                    .unwrap_or_default()
            });

            match cmd.kind {
                CommandKind::Add => *present = true,
                CommandKind::Remove => *present = false,
                CommandKind::Update if !*present => {
                    return Err(Error::MissingComponent {
                        entity: cmd.entity,
                        missing: format!("[{}]", self.ty.name()),
                    })
                    .with_context(|| format!("Failed to update component {}", self.ty.name()));
                }
                CommandKind::Update => {}
            }
        }

        Ok(())
    }

    fn execute(&mut self, store: &mut EntityStore) {
        for cmd in &mut self.commands {
            let Some(value) = cmd.value.take() else {
                continue;
            };

            // Adds and updates followed by a removal are skipped as their column is gone
            if let Ok((arch, row)) = store.location(cmd.entity) {
                store.write_component(arch, row, value, false);
            }
        }
    }

    fn clear(&mut self) {
        self.commands.clear();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Net structural change of a single entity
#[derive(Debug, Clone, Copy)]
struct EntityChange {
    entity: Entity,
    add: ComponentTypes,
    remove: ComponentTypes,
    add_tags: Tags,
    remove_tags: Tags,
}

impl EntityChange {
    fn apply(&self, signature: &Signature) -> Signature {
        Signature::new(
            signature.components.union(&self.add).difference(&self.remove),
            signature
                .tags
                .union(&self.add_tags)
                .difference(&self.remove_tags),
        )
    }
}

/// Records component and tag changes for many entities.
///
/// All changes are deferred until [`CommandBuffer::playback`], which moves each entity at most
/// once and then writes the recorded values into the final archetypes.
///
/// Playback raises no component or tag events.
#[derive(Default)]
pub struct CommandBuffer {
    /// Component index to recorded commands
    components: BTreeMap<u16, Box<dyn AnyComponentCommands>>,
    changes: Vec<EntityChange>,
    index: HashMap<Entity, usize>,
    current: Vec<Signature>,
    targets: Vec<Signature>,
    tag_commands: usize,
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("commands", &self.command_count())
            .field("entities", &self.changes.len())
            .finish()
    }
}

impl CommandBuffer {
    /// Creates a new commandbuffer
    pub fn new() -> Self {
        Self::default()
    }

    fn change(&mut self, entity: Entity) -> &mut EntityChange {
        let changes = &mut self.changes;
        let index = *self.index.entry(entity).or_insert_with(|| {
            changes.push(EntityChange {
                entity,
                add: ComponentTypes::new(),
                remove: ComponentTypes::new(),
                add_tags: Tags::new(),
                remove_tags: Tags::new(),
            });
            changes.len() - 1
        });

        &mut self.changes[index]
    }

    fn commands<T: Component>(&mut self) -> &mut ComponentCommands<T> {
        let ty = T::component_type();
        let commands = self
            .components
            .entry(ty.index() as u16)
            .or_insert_with(|| {
                Box::new(ComponentCommands::<T> {
                    ty,
                    commands: Vec::new(),
                })
            });

        match commands.as_any_mut().downcast_mut::<ComponentCommands<T>>() {
            Some(v) => v,
            None => unreachable!("Mismatched command list for {}", ty.name()),
        }
    }

    fn push<T: Component>(&mut self, entity: Entity, kind: CommandKind, value: Option<T>) {
        self.commands::<T>().commands.push(ComponentCommand {
            entity,
            kind,
            value,
        });
    }

    /// Add or update a component for `entity`
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> &mut Self {
        let ty = T::component_type();
        let change = self.change(entity);
        change.add.insert(ty);
        change.remove.remove(ty);

        self.push(entity, CommandKind::Add, Some(value));
        self
    }

    /// Update an existing component.
    ///
    /// Playback fails if the entity does not have the component when this command is reached,
    /// taking the adds and removals recorded before it into account.
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) -> &mut Self {
        self.change(entity);
        self.push(entity, CommandKind::Update, Some(value));
        self
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> &mut Self {
        let ty = T::component_type();
        let change = self.change(entity);
        change.remove.insert(ty);
        change.add.remove(ty);

        self.push::<T>(entity, CommandKind::Remove, None);
        self
    }

    pub fn add_tag<T: Tag>(&mut self, entity: Entity) -> &mut Self {
        self.add_tags(entity, Tags::of::<(T,)>())
    }

    pub fn remove_tag<T: Tag>(&mut self, entity: Entity) -> &mut Self {
        self.remove_tags(entity, Tags::of::<(T,)>())
    }

    pub fn add_tags(&mut self, entity: Entity, tags: Tags) -> &mut Self {
        let change = self.change(entity);
        change.add_tags = change.add_tags.union(&tags);
        change.remove_tags = change.remove_tags.difference(&tags);
        self.tag_commands += 1;
        self
    }

    pub fn remove_tags(&mut self, entity: Entity, tags: Tags) -> &mut Self {
        let change = self.change(entity);
        change.remove_tags = change.remove_tags.union(&tags);
        change.add_tags = change.add_tags.difference(&tags);
        self.tag_commands += 1;
        self
    }

    /// Returns the number of recorded commands
    pub fn command_count(&self) -> usize {
        self.components.values().map(|v| v.len()).sum::<usize>() + self.tag_commands
    }

    /// Returns the number of entities affected by the recorded commands
    pub fn entity_count(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.command_count() == 0
    }

    /// Applies all recorded commands to the store and clears the buffer.
    ///
    /// Every affected entity is validated before any entity is moved, so a failed playback
    /// leaves the store unchanged.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn playback(&mut self, store: &mut EntityStore) -> anyhow::Result<()> {
        let result = self.try_playback(store);
        self.clear();
        result
    }

    fn try_playback(&mut self, store: &mut EntityStore) -> anyhow::Result<()> {
        self.current.clear();
        self.targets.clear();
        for change in &self.changes {
            let current = store
                .signature(change.entity)
                .with_context(|| format!("Failed to play back commands for {}", change.entity))?;

            self.current.push(current);
            self.targets.push(change.apply(&current));
        }

        let current = |entity: Entity| self.index.get(&entity).map(|&i| self.current[i]);
        for commands in self.components.values() {
            commands.validate(&current)?;
        }

        tracing::debug!(entities = self.changes.len(), "moving entities");
        for (change, target) in self.changes.iter().zip(&self.targets) {
            store
                .relocate(change.entity, target, false)
                .with_context(|| format!("Failed to move {}", change.entity))?;
        }

        for commands in self.components.values_mut() {
            commands.execute(store);
        }

        Ok(())
    }

    /// Clears all commands but keeps allocations around.
    /// Is automatically called by [`Self::playback`].
    pub fn clear(&mut self) {
        for commands in self.components.values_mut() {
            commands.clear();
        }

        self.changes.clear();
        self.index.clear();
        self.current.clear();
        self.targets.clear();
        self.tag_commands = 0;
    }
}
