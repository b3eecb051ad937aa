//! Declaration macros for records.

/// Declares a struct and makes it a field-based [`Record`](crate::Record) and
/// [`Mappable`](crate::Mappable).
///
/// Components are the fields, in declaration order, named after the fields.
///
/// ```ignore
/// segmap::record! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct Point {
///         pub x: i32,
///         pub y: i32,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $fty,
            )*
        }

        impl $crate::Record for $name {
            fn shape() -> $crate::Shape<Self> {
                $crate::Shape::fields(stringify!($name), |fields| {
                    ::std::result::Result::Ok($name { $($field: fields.take::<$fty>()?,)* })
                })
                $(.field::<$fty>(stringify!($field), |value: &$name| &value.$field))*
            }
        }

        $crate::mappable!($name);
    };
}

/// Implements [`Mappable`](crate::Mappable) for a type that implements
/// [`Record`](crate::Record) by hand.
#[macro_export]
macro_rules! mappable {
    ($name:ty) => {
        impl $crate::Mappable for $name {
            fn describe() -> $crate::TypeDesc {
                $crate::TypeDesc::record::<Self>()
            }

            fn compile(
                layout: &$crate::lamina::Layout,
                cx: &mut $crate::Compiler<'_>,
            ) -> $crate::MappingResult<$crate::Accessor<Self>> {
                $crate::compile::record::compile::<Self>(layout, cx)
            }

            fn natural_layout() -> $crate::MappingResult<$crate::lamina::Layout> {
                $crate::natural::record_layout::<Self>()
            }
        }
    };
}
