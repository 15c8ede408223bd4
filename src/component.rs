use core::{any::TypeId, fmt};
use std::sync::{PoisonError, RwLock};

use alloc::boxed::Box;
use once_cell::sync::Lazy;

use crate::{
    archetype::{Archetype, Column, Row, Storage},
    bitset::{BitSet, BitSetIter, BITSET_CAPACITY},
    format::write_names,
    tag::TagType,
};

/// Trait alias for any type which can be stored in the store
pub trait ComponentValue: Send + Sync + 'static {}
impl<T> ComponentValue for T where T: Send + Sync + 'static {}

/// A plain data type stored in the columns of an archetype.
///
/// Implemented through the [`component!`](crate::component) macro, which registers the type
/// on first use.
pub trait Component: ComponentValue + Default {
    /// Returns the registered descriptor of this type
    fn component_type() -> ComponentType;
}

/// Immutable, process wide descriptor of a component type
#[derive(Clone, Copy)]
pub struct ComponentType {
    index: u16,
    name: &'static str,
    size: usize,
    type_id: TypeId,
    new_storage: fn(usize) -> Box<dyn Storage>,
}

impl ComponentType {
    /// Registers a new component type.
    ///
    /// Prefer the [`component!`](crate::component) macro, which calls this exactly once per
    /// type.
    pub fn register<T: ComponentValue + Default>() -> Self {
        fn new_storage<T: ComponentValue + Default>(capacity: usize) -> Box<dyn Storage> {
            Box::new(Column::<T>::with_capacity(capacity))
        }

        let mut schema = SCHEMA.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = schema
            .components
            .iter()
            .find(|v| v.type_id == TypeId::of::<T>())
        {
            return *existing;
        }

        let index = schema.components.len();
        assert!(
            index < BITSET_CAPACITY,
            "Exceeded the maximum of {BITSET_CAPACITY} component types"
        );

        let ty = Self {
            index: index as u16,
            // Leaked once per registered type
            name: Box::leak(tynm::type_name::<T>().into_boxed_str()),
            size: core::mem::size_of::<T>(),
            type_id: TypeId::of::<T>(),
            new_storage: new_storage::<T>,
        };

        tracing::debug!(name = ty.name, index, "registered component type");
        schema.components.push(ty);
        ty
    }

    /// Returns the component type registered at `index`
    pub fn by_index(index: usize) -> Option<Self> {
        let schema = SCHEMA.read().unwrap_or_else(PoisonError::into_inner);
        schema.components.get(index).copied()
    }

    /// The dense index of this type, stable for the lifetime of the process
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The size in bytes of a single value
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub(crate) fn new_storage(&self, capacity: usize) -> Box<dyn Storage> {
        (self.new_storage)(capacity)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub(crate) struct Schema {
    pub(crate) components: Vec<ComponentType>,
    pub(crate) tags: Vec<TagType>,
}

/// Populated on first use of each type, read-only afterwards
pub(crate) static SCHEMA: Lazy<RwLock<Schema>> = Lazy::new(|| {
    RwLock::new(Schema {
        components: Vec::new(),
        tags: Vec::new(),
    })
});

/// A set of component types
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypes(pub(crate) BitSet);

impl ComponentTypes {
    pub const fn new() -> Self {
        Self(BitSet::new())
    }

    /// Returns the set of component types in the tuple `T`
    pub fn of<T: ComponentTuple>() -> Self {
        T::component_types()
    }

    pub fn insert(&mut self, ty: ComponentType) {
        self.0.set_bit(ty.index())
    }

    pub fn remove(&mut self, ty: ComponentType) {
        self.0.clear_bit(ty.index())
    }

    #[inline]
    pub fn contains(&self, ty: ComponentType) -> bool {
        self.0.has(ty.index())
    }

    pub fn has<T: Component>(&self) -> bool {
        self.contains(T::component_type())
    }

    pub fn bits(&self) -> &BitSet {
        &self.0
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0))
    }

    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.difference(&other.0))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self) -> usize {
        self.0.count()
    }

    /// Iterate the component types in ascending index order
    pub fn iter(&self) -> ComponentTypesIter {
        ComponentTypesIter(self.0.iter())
    }
}

impl fmt::Debug for ComponentTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for ComponentTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_names(f, self.iter().map(|v| v.name()), core::iter::empty())
    }
}

impl FromIterator<ComponentType> for ComponentTypes {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        Self(iter.into_iter().map(|v| v.index()).collect())
    }
}

pub struct ComponentTypesIter(BitSetIter);

impl Iterator for ComponentTypesIter {
    type Item = ComponentType;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.0.next()?;
        ComponentType::by_index(index)
    }
}

/// A fixed size family of component types, implemented for tuples of arity 0 to 5
pub trait ComponentTuple: 'static {
    fn component_types() -> ComponentTypes;
}

/// A tuple of component values, such as `(Health(10), Mana(5))`
pub trait ComponentBundle: ComponentTuple + Sized {
    /// Writes every value into `row` of an archetype containing all the types
    fn write_row(self, archetype: &mut Archetype, row: Row);
}

macro_rules! tuple_impl {
    ($($ty: ident),*) => {
        impl<$($ty: Component),*> ComponentTuple for ($($ty,)*) {
            fn component_types() -> ComponentTypes {
                #[allow(unused_mut)]
                let mut types = ComponentTypes::new();
                $(types.insert($ty::component_type());)*
                types
            }
        }

        impl<$($ty: Component),*> ComponentBundle for ($($ty,)*) {
            #[allow(non_snake_case, unused_variables)]
            fn write_row(self, archetype: &mut Archetype, row: Row) {
                let ($($ty,)*) = self;
                $(
                    if let Some(column) = archetype.column_mut::<$ty>() {
                        column.replace(row, $ty, false);
                    }
                )*
            }
        }
    };
}

tuple_impl! {}
tuple_impl! { A }
tuple_impl! { A, B }
tuple_impl! { A, B, C }
tuple_impl! { A, B, C, D }
tuple_impl! { A, B, C, D, E }
