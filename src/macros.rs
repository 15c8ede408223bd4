#[macro_export]
/// Declare one or more types as components.
///
/// The type is registered with a dense index the first time it is used.
///
/// usage:
/// ```rust
/// use archstore::component;
///
/// #[derive(Default, Debug, Clone)]
/// struct Health(f32);
///
/// #[derive(Default, Debug, Clone)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// component!(Health, Position);
/// ```
macro_rules! component {
    ($($ty: ty),* $(,)?) => {
        $(
            impl $crate::Component for $ty {
                fn component_type() -> $crate::ComponentType {
                    static TYPE: $crate::__internal::OnceCell<$crate::ComponentType> =
                        $crate::__internal::OnceCell::new();
                    *TYPE.get_or_init($crate::ComponentType::register::<$ty>)
                }
            }
        )*
    };
}

#[macro_export]
/// Declare one or more types as tags.
///
/// ```rust
/// use archstore::tag;
///
/// struct Enemy;
/// struct Frozen;
///
/// tag!(Enemy, Frozen);
/// ```
macro_rules! tag {
    ($($ty: ty),* $(,)?) => {
        $(
            impl $crate::Tag for $ty {
                fn tag_type() -> $crate::TagType {
                    static TYPE: $crate::__internal::OnceCell<$crate::TagType> =
                        $crate::__internal::OnceCell::new();
                    *TYPE.get_or_init($crate::TagType::register::<$ty>)
                }
            }
        )*
    };
}
