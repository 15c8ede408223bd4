use core::{any::TypeId, fmt};
use std::sync::PoisonError;

use alloc::boxed::Box;

use crate::{
    bitset::{BitSet, BitSetIter, BITSET_CAPACITY},
    component::SCHEMA,
    format::write_names,
};

/// A marker type without data.
///
/// Tags take part in the signature of an archetype but own no column. Implemented through
/// the [`tag!`](crate::tag) macro.
pub trait Tag: 'static {
    fn tag_type() -> TagType;
}

/// Process wide descriptor of a tag type
#[derive(Clone, Copy)]
pub struct TagType {
    index: u16,
    name: &'static str,
    type_id: TypeId,
}

impl TagType {
    /// Registers a tag type, returning the existing descriptor if already registered
    pub fn register<T: 'static>() -> Self {
        let mut schema = SCHEMA.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = schema.tags.iter().find(|v| v.type_id == TypeId::of::<T>()) {
            return *existing;
        }

        let index = schema.tags.len();
        assert!(
            index < BITSET_CAPACITY,
            "Exceeded the maximum of {BITSET_CAPACITY} tag types"
        );

        let ty = Self {
            index: index as u16,
            name: Box::leak(tynm::type_name::<T>().into_boxed_str()),
            type_id: TypeId::of::<T>(),
        };

        tracing::debug!(name = ty.name, index, "registered tag type");
        schema.tags.push(ty);
        ty
    }

    pub fn by_index(index: usize) -> Option<Self> {
        let schema = SCHEMA.read().unwrap_or_else(PoisonError::into_inner);
        schema.tags.get(index).copied()
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for TagType {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for TagType {}

impl fmt::Debug for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.name)
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.name)
    }
}

/// A set of tags
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tags(pub(crate) BitSet);

impl Tags {
    pub const fn new() -> Self {
        Self(BitSet::new())
    }

    /// Returns the set of tags in the tuple `T`
    pub fn of<T: TagTuple>() -> Self {
        T::tags()
    }

    pub fn has<T: Tag>(&self) -> bool {
        self.contains(T::tag_type())
    }

    #[inline]
    pub fn contains(&self, ty: TagType) -> bool {
        self.0.has(ty.index())
    }

    pub fn add<T: Tag>(&mut self) -> &mut Self {
        self.insert(T::tag_type());
        self
    }

    pub fn insert(&mut self, ty: TagType) {
        self.0.set_bit(ty.index())
    }

    pub fn remove(&mut self, ty: TagType) {
        self.0.clear_bit(ty.index())
    }

    pub fn has_all(&self, other: &Tags) -> bool {
        self.0.has_all(&other.0)
    }

    pub fn has_any(&self, other: &Tags) -> bool {
        self.0.has_any(&other.0)
    }

    #[must_use]
    pub fn union(&self, other: &Tags) -> Tags {
        Self(self.0.union(&other.0))
    }

    #[must_use]
    pub fn difference(&self, other: &Tags) -> Tags {
        Self(self.0.difference(&other.0))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self) -> usize {
        self.0.count()
    }

    pub fn iter(&self) -> TagsIter {
        TagsIter(self.0.iter())
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_names(f, core::iter::empty(), self.iter().map(|v| v.name()))
    }
}

impl FromIterator<TagType> for Tags {
    fn from_iter<I: IntoIterator<Item = TagType>>(iter: I) -> Self {
        Self(iter.into_iter().map(|v| v.index()).collect())
    }
}

pub struct TagsIter(BitSetIter);

impl Iterator for TagsIter {
    type Item = TagType;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.0.next()?;
        TagType::by_index(index)
    }
}

/// A fixed size family of tags, implemented for tuples of arity 0 to 5
pub trait TagTuple: 'static {
    fn tags() -> Tags;
}

macro_rules! tuple_impl {
    ($($ty: ident),*) => {
        impl<$($ty: Tag),*> TagTuple for ($($ty,)*) {
            fn tags() -> Tags {
                #[allow(unused_mut)]
                let mut tags = Tags::new();
                $(tags.insert($ty::tag_type());)*
                tags
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
