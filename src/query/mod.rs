mod data;
mod iter;

use core::{fmt, marker::PhantomData};

use alloc::vec::Vec;

pub use data::*;
pub use iter::*;

use crate::{
    archetype::{Archetype, ArchetypeId},
    components::Disabled,
    ComponentTuple, ComponentTypes, Entity, EntityStore, Tag, Tags,
};

/// Tag constraints of a query
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TagFilter {
    /// Every tag must be present
    pub all: Tags,
    /// At least one tag must be present
    pub any: Tags,
    /// Rejects archetypes having all of these tags
    pub without_all: Tags,
    /// Rejects archetypes having any of these tags
    pub without_any: Tags,
    /// Include entities tagged [`Disabled`]
    pub with_disabled: bool,
}

impl TagFilter {
    pub fn matches(&self, tags: &Tags) -> bool {
        tags.has_all(&self.all)
            && (self.any.is_empty() || tags.has_any(&self.any))
            && (self.without_all.is_empty() || !tags.has_all(&self.without_all))
            && !tags.has_any(&self.without_any)
            && (self.with_disabled || !tags.has::<Disabled>())
    }
}

/// Matched archetypes, valid for one store and structure version
#[derive(Default)]
struct QueryCache {
    store: u64,
    gen: u32,
    /// Number of archetypes already scanned
    scanned: usize,
    archetypes: Vec<ArchetypeId>,
}

/// Represents a query and state for a given store.
///
/// The archetypes to visit are cached in the query, which means it is more performant to
/// reuse the query than creating a new one. Only archetypes created since the last use are
/// scanned.
pub struct Query<Q> {
    include: ComponentTypes,
    exclude: ComponentTypes,
    filter: TagFilter,
    cache: QueryCache,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: QueryData> Default for Query<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: QueryData> Query<Q> {
    /// Construct a new query over the component types of `Q`
    pub fn new() -> Self {
        Self {
            include: Q::component_types(),
            exclude: ComponentTypes::new(),
            filter: TagFilter::default(),
            cache: QueryCache::default(),
            _marker: PhantomData,
        }
    }

    fn invalidate(mut self) -> Self {
        self.cache = QueryCache::default();
        self
    }

    /// Additionally require the components of `T` without accessing them
    pub fn with<T: ComponentTuple>(mut self) -> Self {
        for ty in T::component_types().iter() {
            self.include.insert(ty);
        }
        self.invalidate()
    }

    /// Exclude archetypes having any component of `T`
    pub fn without<T: ComponentTuple>(mut self) -> Self {
        for ty in T::component_types().iter() {
            self.exclude.insert(ty);
        }
        self.invalidate()
    }

    pub fn all_tags(mut self, tags: Tags) -> Self {
        self.filter.all = self.filter.all.union(&tags);
        self.invalidate()
    }

    pub fn any_tags(mut self, tags: Tags) -> Self {
        self.filter.any = self.filter.any.union(&tags);
        self.invalidate()
    }

    pub fn without_all_tags(mut self, tags: Tags) -> Self {
        self.filter.without_all = self.filter.without_all.union(&tags);
        self.invalidate()
    }

    pub fn without_any_tags(mut self, tags: Tags) -> Self {
        self.filter.without_any = self.filter.without_any.union(&tags);
        self.invalidate()
    }

    /// Shorthand for requiring a single tag
    pub fn with_tag<T: Tag>(self) -> Self {
        self.all_tags(Tags::of::<(T,)>())
    }

    /// Include entities tagged [`Disabled`]
    pub fn with_disabled(mut self) -> Self {
        self.filter.with_disabled = true;
        self.invalidate()
    }

    pub fn filter(&self) -> &TagFilter {
        &self.filter
    }

    pub fn matches(&self, archetype: &Archetype) -> bool {
        archetype_matches(&self.include, &self.exclude, &self.filter, archetype)
    }

    /// Returns the matching archetypes, scanning archetypes created since the last call
    pub fn archetypes(&mut self, store: &EntityStore) -> &[ArchetypeId] {
        let archetypes = &store.archetypes;

        if self.cache.store != store.store_id() {
            self.cache = QueryCache {
                store: store.store_id(),
                gen: archetypes.gen().wrapping_sub(1),
                ..Default::default()
            };
        }

        if self.cache.gen != archetypes.gen() {
            let (include, exclude, filter) = (self.include, self.exclude, self.filter);
            let matched = archetypes
                .iter()
                .skip(self.cache.scanned)
                .filter(|arch| archetype_matches(&include, &exclude, &filter, arch))
                .map(|v| v.id());

            self.cache.archetypes.extend(matched);
            self.cache.scanned = archetypes.len();
            self.cache.gen = archetypes.gen();
        }

        &self.cache.archetypes
    }

    /// Iterate the matching archetypes as chunks of columns.
    ///
    /// The columns of a chunk are borrowed until the chunk is dropped.
    pub fn chunks<'a>(&'a mut self, store: &'a EntityStore) -> Chunks<'a, Q> {
        let archetypes = self.archetypes(store);
        Chunks::new(store, archetypes.iter())
    }

    /// Iterate the matching entities
    pub fn entities<'a>(&'a mut self, store: &'a EntityStore) -> impl Iterator<Item = Entity> + 'a {
        self.archetypes(store)
            .iter()
            .flat_map(move |&arch| store.archetype(arch).entities().iter().copied())
    }

    /// Returns the number of matching entities
    pub fn count(&mut self, store: &EntityStore) -> usize {
        self.archetypes(store)
            .iter()
            .map(|&arch| store.archetype(arch).len())
            .sum()
    }

    /// Visit every matching entity with mutable access to its components
    pub fn for_each_entity<F>(&mut self, store: &EntityStore, mut f: F)
    where
        F: for<'r> FnMut(Q::RowMut<'r>, Entity),
    {
        for mut chunk in self.chunks(store) {
            for (row, &entity) in chunk.entities.iter().enumerate() {
                f(Q::row_mut(&mut chunk.columns, row), entity);
            }
        }
    }
}

fn archetype_matches(
    include: &ComponentTypes,
    exclude: &ComponentTypes,
    filter: &TagFilter,
    archetype: &Archetype,
) -> bool {
    let components = archetype.component_types().bits();
    components.has_all(include.bits())
        && !components.has_any(exclude.bits())
        && filter.matches(archetype.tags())
}

impl<Q> fmt::Debug for Query<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("filter", &self.filter)
            .finish()
    }
}

impl EntityStore {
    /// Creates a query over the components of `Q`
    pub fn query<Q: QueryData>(&self) -> Query<Q> {
        Query::new()
    }
}
