use core::fmt;

use crate::{
    component::{Component, ComponentTuple, ComponentType, ComponentTypes},
    format::write_names,
    tag::{Tag, TagTuple, TagType, Tags},
};

/// The exact set of component types and tags of an archetype.
///
/// Exactly one archetype exists per distinct signature in a store.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    pub components: ComponentTypes,
    pub tags: Tags,
}

impl Signature {
    pub const fn new(components: ComponentTypes, tags: Tags) -> Self {
        Self { components, tags }
    }

    /// Creates a signature from a tuple of components and a tuple of tags
    pub fn of<C: ComponentTuple, T: TagTuple>() -> Self {
        Self {
            components: C::component_types(),
            tags: T::tags(),
        }
    }

    pub fn has<T: Component>(&self) -> bool {
        self.components.has::<T>()
    }

    pub fn has_tag<T: Tag>(&self) -> bool {
        self.tags.has::<T>()
    }

    #[must_use]
    pub fn with_component(mut self, ty: ComponentType) -> Self {
        self.components.insert(ty);
        self
    }

    #[must_use]
    pub fn without_component(mut self, ty: ComponentType) -> Self {
        self.components.remove(ty);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, ty: TagType) -> Self {
        self.tags.insert(ty);
        self
    }

    #[must_use]
    pub fn without_tag(mut self, ty: TagType) -> Self {
        self.tags.remove(ty);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.tags.is_empty()
    }

    pub fn combined_hash(&self) -> u64 {
        self.components
            .bits()
            .combined_hash()
            .rotate_left(17)
            ^ self.tags.0.combined_hash()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Formats as `[EntityName, Position, #TestTag]`
impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_names(
            f,
            self.components.iter().map(|v| v.name()),
            self.tags.iter().map(|v| v.name()),
        )
    }
}
