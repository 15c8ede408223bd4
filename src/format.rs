use core::fmt;

use itertools::Itertools;

use crate::{components::EntityName, Entity, EntityStore};

/// Writes `[A, B, #Tag]`.
///
/// Names are sorted so the output does not depend on the order types were registered in.
pub(crate) fn write_names<'a>(
    f: &mut fmt::Formatter<'_>,
    components: impl Iterator<Item = &'a str>,
    tags: impl Iterator<Item = &'a str>,
) -> fmt::Result {
    let components = components.sorted_unstable();
    let tags = tags.sorted_unstable().map(|v| format!("#{v}"));

    write!(
        f,
        "[{}]",
        components.map(String::from).chain(tags).format(", ")
    )
}

/// Formats an entity as `id: 1  "name"  [EntityName, Position, #TestTag]`
pub struct EntityFormatter<'a> {
    pub(crate) store: &'a EntityStore,
    pub(crate) entity: Entity,
}

impl<'a> fmt::Display for EntityFormatter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(archetype) = self.store.entity_archetype(self.entity) else {
            return write!(f, "id: {}  (deleted)", self.entity.id());
        };

        write!(f, "id: {}  ", self.entity.id())?;

        if let Some(name) = self
            .store
            .try_get_component::<EntityName>(self.entity)
            .ok()
            .flatten()
        {
            write!(f, "{:?}  ", name.0)?;
        }

        write!(f, "{}", archetype.signature())
    }
}

impl<'a> fmt::Debug for EntityFormatter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
