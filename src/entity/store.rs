use core::num::NonZeroU32;

use alloc::vec::Vec;

use super::{Entity, EntityNode, NodeFlags};
use crate::{
    archetype::{ArchetypeId, Row},
    error::Result,
    Error,
};

/// Flat table of entity nodes indexed by id.
///
/// Id 0 is reserved and never handed out.
pub(crate) struct Nodes {
    nodes: Vec<EntityNode>,
    free: Vec<u32>,
    len: usize,
}

impl Nodes {
    pub fn new() -> Self {
        Self {
            nodes: vec![EntityNode::vacant(0)],
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of alive entities
    pub fn len(&self) -> usize {
        self.len
    }

    fn handle(node: &EntityNode) -> Entity {
        // Id 0 is never alive
        Entity::new(
            NonZeroU32::new(node.id).unwrap_or(NonZeroU32::MIN),
            node.revision,
        )
    }

    /// Allocates an id, preferring recycled ids
    pub fn alloc(&mut self, archetype: ArchetypeId, row: Row) -> Entity {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                let id = self.nodes.len() as u32;
                self.nodes.push(EntityNode::vacant(id));
                id
            }
        };

        self.occupy(id, archetype, row)
    }

    /// Allocates a specific id
    pub fn alloc_at(
        &mut self,
        id: NonZeroU32,
        archetype: ArchetypeId,
        row: Row,
    ) -> Result<Entity> {
        let id = id.get();
        let index = id as usize;

        if index >= self.nodes.len() {
            let start = self.nodes.len() as u32;
            self.nodes.extend((start..=id).map(EntityNode::vacant));
            // Skipped ids become available for reuse, lowest first
            self.free.extend((start..id).rev());
        } else if self.nodes[index].is_alive() {
            return Err(Error::EntityOccupied(id));
        } else {
            self.free.retain(|&v| v != id);
        }

        Ok(self.occupy(id, archetype, row))
    }

    fn occupy(&mut self, id: u32, archetype: ArchetypeId, row: Row) -> Entity {
        let node = &mut self.nodes[id as usize];
        debug_assert!(!node.is_alive());

        node.archetype = Some(archetype);
        node.row = row;
        node.flags = NodeFlags::CREATED;
        self.len += 1;

        Self::handle(node)
    }

    /// Retires the id of `entity`, invalidating all handles to it
    pub fn free(&mut self, entity: Entity) -> Result<EntityNode> {
        let node = self.get_mut(entity)?;

        let retired = core::mem::replace(node, EntityNode::vacant(entity.id()));
        node.revision = retired.revision.wrapping_add(1);

        self.free.push(entity.id());
        self.len -= 1;
        Ok(retired)
    }

    pub fn get(&self, entity: Entity) -> Result<&EntityNode> {
        match self.nodes.get(entity.id() as usize) {
            Some(node) if node.is_alive() && node.revision == entity.revision() => Ok(node),
            _ => Err(Error::StaleHandle(entity)),
        }
    }

    pub fn get_mut(&mut self, entity: Entity) -> Result<&mut EntityNode> {
        match self.nodes.get_mut(entity.id() as usize) {
            Some(node) if node.is_alive() && node.revision == entity.revision() => Ok(node),
            _ => Err(Error::StaleHandle(entity)),
        }
    }

    /// Returns the current handle of an alive id
    pub fn entity(&self, id: u32) -> Option<Entity> {
        let node = self.nodes.get(id as usize)?;
        node.is_alive().then(|| Self::handle(node))
    }

    /// Node of an id known to be alive
    ///
    /// # Panics
    /// If the id was never allocated
    pub fn node(&self, id: u32) -> &EntityNode {
        &self.nodes[id as usize]
    }

    pub fn node_mut(&mut self, id: u32) -> &mut EntityNode {
        &mut self.nodes[id as usize]
    }

    /// Updates the cached row of an entity moved by a swap-remove
    pub fn set_row(&mut self, entity: Entity, row: Row) {
        self.nodes[entity.id() as usize].row = row;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &EntityNode)> {
        self.nodes
            .iter()
            .filter(|v| v.is_alive())
            .map(|v| (Self::handle(v), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycle_bumps_revision() {
        let mut nodes = Nodes::new();
        let a = nodes.alloc(ArchetypeId::DEFAULT, 0);
        let b = nodes.alloc(ArchetypeId::DEFAULT, 1);

        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);

        nodes.free(a).unwrap();
        assert_eq!(nodes.get(a).unwrap_err(), Error::StaleHandle(a));
        assert_eq!(nodes.len(), 1);

        let c = nodes.alloc(ArchetypeId::DEFAULT, 0);
        assert_eq!(c.id(), 1);
        assert_eq!(c.revision(), a.revision() + 1);
        assert!(nodes.get(a).is_err());
        assert!(nodes.get(c).is_ok());
    }

    #[test]
    fn alloc_at() {
        let mut nodes = Nodes::new();
        let id = NonZeroU32::new(4).unwrap();
        let a = nodes.alloc_at(id, ArchetypeId::DEFAULT, 0).unwrap();
        assert_eq!(a.id(), 4);

        assert_eq!(
            nodes.alloc_at(id, ArchetypeId::DEFAULT, 0),
            Err(Error::EntityOccupied(4))
        );

        let ids = (0..4)
            .map(|_| nodes.alloc(ArchetypeId::DEFAULT, 0).id())
            .collect::<Vec<_>>();
        assert_eq!(ids, [1, 2, 3, 5]);
    }
}
