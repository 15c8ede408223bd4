//! An archetype based entity store
//!
//! Entities are grouped by their exact set of components and tags, called a
//! signature. Each group, an archetype, stores its components as one dense column
//! per type, which keeps bulk iteration cache friendly.
//!
//! # Features
//! - Cheap structural changes by moving entities between archetypes
//! - Cached queries yielding contiguous column chunks
//! - Entity batches and command buffers applying many changes in one move
//! - Relations: many values of one type per entity, addressed by key
//! - Parent child hierarchies and change events

extern crate alloc;

mod archetype;
mod archetypes;
mod batch;
pub mod bitset;
mod commandbuffer;
mod component;
mod components;
mod config;
mod entity;
pub mod error;
mod events;
mod format;
mod hierarchy;
mod macros;
mod query;
mod relation;
mod signature;
mod store;
mod tag;

pub use archetype::{Archetype, ArchetypeId, ArchetypeInfo, Row};
pub use batch::*;
pub use commandbuffer::*;
pub use component::*;
pub use components::*;
pub use config::*;
pub use entity::{Entity, EntityNode, NodeFlags};
pub use error::Error;
pub use events::{
    ChildAction, ChildEntitiesChanged, ComponentAction, ComponentChanged, ListenerId, TagsChanged,
};
pub use format::EntityFormatter;
pub use query::*;
pub use relation::*;
pub use signature::*;
pub use store::*;
pub use tag::*;

#[doc(hidden)]
pub mod __internal {
    pub use once_cell::sync::OnceCell;
}
