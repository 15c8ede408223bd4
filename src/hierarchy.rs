use alloc::vec::Vec;

use crate::{
    entity::NodeFlags,
    error::Result,
    events::{ChildAction, ChildEntitiesChanged},
    Entity, EntityStore, Error,
};

impl EntityStore {
    /// Appends `child` to the children of `parent`.
    ///
    /// If the child has another parent it is removed from it first. Adding a child to its
    /// current parent does nothing.
    pub fn add_child(&mut self, parent: Entity, child: Entity) -> Result<()> {
        let len = self.nodes.get(parent)?.children.len();
        self.insert_child(parent, child, len)
    }

    /// Inserts `child` at `index` in the children of `parent`.
    ///
    /// The index is clamped to the number of children.
    pub fn insert_child(&mut self, parent: Entity, child: Entity, index: usize) -> Result<()> {
        self.nodes.get(parent)?;
        let current = self.nodes.get(child)?.parent;

        if current == Some(parent.id()) {
            return Ok(());
        }

        if self.is_ancestor_or_self(child.id(), parent.id()) {
            return Err(Error::HierarchyCycle { parent, child });
        }

        if let Some(old_parent) = current {
            self.detach_child(old_parent, child.id());
        }

        let children = &mut self.nodes.node_mut(parent.id()).children;
        let index = index.min(children.len());
        children.insert(index, child.id());

        let node = self.nodes.node_mut(child.id());
        node.parent = Some(parent.id());
        node.flags.insert(NodeFlags::TREE_NODE);

        if !self.events.children.is_empty() {
            self.events.children.dispatch(&ChildEntitiesChanged {
                action: ChildAction::Add,
                parent,
                child,
                index,
            });
        }

        Ok(())
    }

    /// Removes `child` from the children of `parent`.
    ///
    /// Returns false if `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: Entity, child: Entity) -> Result<bool> {
        self.nodes.get(parent)?;
        if self.nodes.get(child)?.parent != Some(parent.id()) {
            return Ok(false);
        }

        self.detach_child(parent.id(), child.id());
        Ok(true)
    }

    /// Unlinks both sides of a parent child pair
    pub(crate) fn detach_child(&mut self, parent: u32, child: u32) {
        let children = &mut self.nodes.node_mut(parent).children;
        let Some(index) = children.iter().position(|&v| v == child) else {
            return;
        };

        // Keeps sibling order
        children.remove(index);

        let node = self.nodes.node_mut(child);
        node.parent = None;
        node.flags.remove(NodeFlags::TREE_NODE);

        if self.events.children.is_empty() {
            return;
        }

        if let (Some(parent), Some(child)) = (self.nodes.entity(parent), self.nodes.entity(child)) {
            self.events.children.dispatch(&ChildEntitiesChanged {
                action: ChildAction::Remove,
                parent,
                child,
                index,
            });
        }
    }

    /// Returns true if `ancestor` is `id` or one of its ancestors
    fn is_ancestor_or_self(&self, ancestor: u32, mut id: u32) -> bool {
        loop {
            if id == ancestor {
                return true;
            }

            match self.nodes.node(id).parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    pub fn parent(&self, entity: Entity) -> Result<Option<Entity>> {
        let node = self.nodes.get(entity)?;
        Ok(node.parent.and_then(|id| self.nodes.entity(id)))
    }

    /// Returns the children of an entity in order
    pub fn children(&self, entity: Entity) -> Result<Vec<Entity>> {
        let node = self.nodes.get(entity)?;
        Ok(node
            .children
            .iter()
            .filter_map(|&id| self.nodes.entity(id))
            .collect())
    }

    pub fn child_count(&self, entity: Entity) -> Result<usize> {
        Ok(self.nodes.get(entity)?.children.len())
    }
}
