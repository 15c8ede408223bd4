mod store;

use core::fmt;
use core::num::NonZeroU32;

use alloc::vec::Vec;
use bitflags::bitflags;

pub(crate) use store::*;

use crate::archetype::{ArchetypeId, Row};

/// Handle to an entity in a store.
///
/// The revision is incremented each time the id is recycled, which invalidates all handles
/// to the previous occupant.
#[derive(PartialOrd, Clone, Copy, PartialEq, Eq, Ord, Hash)]
pub struct Entity {
    id: NonZeroU32,
    revision: u16,
}

impl Entity {
    pub(crate) fn new(id: NonZeroU32, revision: u16) -> Self {
        Self { id, revision }
    }

    /// Construct an entity handle from its raw parts.
    ///
    /// Returns `None` for the reserved id 0.
    pub fn from_parts(id: u32, revision: u16) -> Option<Self> {
        Some(Self::new(NonZeroU32::new(id)?, revision))
    }

    pub fn id(&self) -> u32 {
        self.id.get()
    }

    pub fn revision(&self) -> u16 {
        self.revision
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.revision)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags! {
    /// State of an entity node
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// The entity has a parent
        const TREE_NODE = 1;
        /// No structural change has been made since the entity was created
        const CREATED = 2;
    }
}

/// The store's record of a single entity id
#[derive(Debug, Clone)]
pub struct EntityNode {
    pub(crate) id: u32,
    pub(crate) pid: u64,
    pub(crate) revision: u16,
    /// `None` when the id is not in use
    pub(crate) archetype: Option<ArchetypeId>,
    pub(crate) row: Row,
    pub(crate) parent: Option<u32>,
    pub(crate) children: Vec<u32>,
    pub(crate) flags: NodeFlags,
}

impl EntityNode {
    fn vacant(id: u32) -> Self {
        Self {
            id,
            pid: 0,
            revision: 0,
            archetype: None,
            row: 0,
            parent: None,
            children: Vec::new(),
            flags: NodeFlags::empty(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Persistent id
    pub fn pid(&self) -> u64 {
        self.pid
    }

    pub fn revision(&self) -> u16 {
        self.revision
    }

    pub fn archetype(&self) -> Option<ArchetypeId> {
        self.archetype
    }

    pub fn row(&self) -> Row {
        self.row
    }

    pub fn parent_id(&self) -> Option<u32> {
        self.parent
    }

    pub fn child_ids(&self) -> &[u32] {
        &self.children
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_alive(&self) -> bool {
        self.archetype.is_some()
    }
}
