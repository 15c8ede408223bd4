use atomic_refcell::AtomicRefMut;

use crate::{archetype::Archetype, Component, ComponentTuple};

/// Components accessed by a query, implemented for tuples of arity 0 to 5.
///
/// Each component type may only appear once in the tuple, as the columns are borrowed
/// mutably.
pub trait QueryData: ComponentTuple {
    /// The borrowed columns of a single archetype
    type Columns<'a>;
    /// Mutable references to the components of a single row
    type RowMut<'r>;

    /// Borrow the columns of a matched archetype
    ///
    /// # Panics
    /// If the archetype is missing a component of the tuple, or a column is already borrowed
    fn borrow_columns(archetype: &Archetype) -> Self::Columns<'_>;

    fn row_mut<'r, 'a: 'r>(columns: &'r mut Self::Columns<'a>, row: usize) -> Self::RowMut<'r>;
}

fn column<T: Component>(archetype: &Archetype) -> AtomicRefMut<[T]> {
    match archetype.borrow_mut::<T>() {
        Some(v) => v,
        None => panic!(
            "Archetype {} does not contain {}",
            archetype.signature(),
            tynm::type_name::<T>()
        ),
    }
}

macro_rules! tuple_impl {
    ($($idx: tt => $ty: ident),*) => {
        impl<$($ty: Component),*> QueryData for ($($ty,)*) {
            type Columns<'a> = ($(AtomicRefMut<'a, [$ty]>,)*);
            type RowMut<'r> = ($(&'r mut $ty,)*);

            fn borrow_columns(_archetype: &Archetype) -> Self::Columns<'_> {
                ($(column::<$ty>(_archetype),)*)
            }

            fn row_mut<'r, 'a: 'r>(
                _columns: &'r mut Self::Columns<'a>,
                _row: usize,
            ) -> Self::RowMut<'r> {
                ($(&mut _columns.$idx[_row],)*)
            }
        }
    };
}

tuple_impl! {}
tuple_impl! { 0 => A }
tuple_impl! { 0 => A, 1 => B }
tuple_impl! { 0 => A, 1 => B, 2 => C }
tuple_impl! { 0 => A, 1 => B, 2 => C, 3 => D }
tuple_impl! { 0 => A, 1 => B, 2 => C, 3 => D, 4 => E }
