use core::fmt;

use alloc::string::String;

use crate::{component, tag};

/// Debug name of an entity, shown when formatting the entity
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityName(pub String);

impl EntityName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Excludes an entity from queries unless the query is created
/// [`with_disabled`](crate::Query::with_disabled)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Disabled;

component!(EntityName);
tag!(Disabled);
