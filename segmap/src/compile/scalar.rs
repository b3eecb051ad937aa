//! Scalars: one Rust type per carrier, matched exactly (no widening, no narrowing).

use lamina::{Address, ByteOrder, Layout, Scalar, ValueLayout};

use crate::accessor::{Accessor, Elements};
use crate::compile::{Compiler, Mappable};
use crate::desc::TypeDesc;
use crate::error::{MappingError, MappingResult};

/// The value layout `layout` must be for a scalar `S`.
fn value_of<'l, S: Scalar>(
    desc: &TypeDesc,
    layout: &'l Layout,
    cx: &Compiler<'_>,
) -> MappingResult<&'l ValueLayout> {
    match layout {
        Layout::Value(v) if v.carrier() == S::CARRIER => Ok(v),
        Layout::Value(v) => Err(cx.mismatch(
            desc,
            layout,
            format!("carrier {} differs from {}", v.carrier(), S::CARRIER),
        )),
        other => Err(cx.mismatch(
            desc,
            layout,
            format!("a scalar maps to a value layout, not a {}", other.kind_name()),
        )),
    }
}

fn scalar_accessor<S: Scalar>(order: ByteOrder) -> Accessor<S> {
    Accessor::new(
        move |segment, offset| Ok(segment.get::<S>(offset, order)?),
        move |segment, offset, value| Ok(segment.set(offset, order, *value)?),
    )
}

/// Whole runs of scalars are moved with one bulk copy.
fn bulk_elements<S: Scalar + Default>(order: ByteOrder) -> Elements<S> {
    Elements::new(
        move |segment, offset, count| {
            let mut out = vec![S::default(); count];
            segment.copy_to(offset, order, &mut out)?;
            Ok(out)
        },
        move |segment, offset, values| Ok(segment.copy_from(offset, order, values)?),
    )
}

macro_rules! impl_mappable_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Mappable for $ty {
                fn describe() -> TypeDesc {
                    TypeDesc::scalar::<$ty>(<$ty as Scalar>::CARRIER)
                }

                fn compile(layout: &Layout, cx: &mut Compiler<'_>) -> MappingResult<Accessor<Self>> {
                    let value = value_of::<$ty>(&Self::describe(), layout, cx)?;
                    Ok(scalar_accessor::<$ty>(value.order()))
                }

                fn compile_elements(
                    element: &Layout,
                    cx: &mut Compiler<'_>,
                ) -> MappingResult<Elements<Self>> {
                    let value = value_of::<$ty>(&Self::describe(), element, cx)?;
                    Ok(bulk_elements::<$ty>(value.order()))
                }

                fn natural_layout() -> MappingResult<Layout> {
                    Ok(Layout::value(<$ty as Scalar>::CARRIER))
                }
            }
        )*
    };
}

impl_mappable_scalar!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, Address);

impl Mappable for bool {
    fn describe() -> TypeDesc {
        TypeDesc::scalar::<bool>(bool::CARRIER)
    }

    fn compile(layout: &Layout, cx: &mut Compiler<'_>) -> MappingResult<Accessor<Self>> {
        let value = value_of::<bool>(&Self::describe(), layout, cx)?;
        Ok(scalar_accessor::<bool>(value.order()))
    }

    fn compile_elements(element: &Layout, cx: &mut Compiler<'_>) -> MappingResult<Elements<Self>> {
        Err(MappingError::UnsupportedElementKind {
            site: cx.site(&Self::describe()),
            element: Self::describe().name,
            layout: element.to_string(),
        })
    }

    fn natural_layout() -> MappingResult<Layout> {
        Ok(Layout::BOOL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use lamina::Segment;

    #[test]
    fn test_scalar_honours_order() {
        let registry = Registry::empty();
        let mut cx = Compiler::new(&registry);
        let big = cx.compile::<u16>(&Layout::U16.with_byte_order(ByteOrder::Big)).unwrap();
        let seg = Segment::from_bytes(&[0x12, 0x34]);
        assert_eq!((big.get)(&seg, 0).unwrap(), 0x1234);
        (big.set)(&seg, 0, &0xabcd).unwrap();
        assert_eq!(seg.to_vec(), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_no_widening() {
        let registry = Registry::empty();
        let mut cx = Compiler::new(&registry);
        let err = cx.compile::<i64>(&Layout::I32.with_name("x")).unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { .. }));
        assert!(err.to_string().contains("carrier i32 differs from i64"), "{}", err);
        assert!(cx.compile::<u32>(&Layout::I32).is_err());
        assert!(cx.compile::<f32>(&Layout::structure([Layout::F32]).unwrap()).is_err());
    }

    #[test]
    fn test_bool_elements_are_refused() {
        let registry = Registry::empty();
        let mut cx = Compiler::new(&registry);
        assert!(matches!(
            bool::compile_elements(&Layout::BOOL, &mut cx),
            Err(MappingError::UnsupportedElementKind { .. })
        ));
        assert!(cx.compile::<bool>(&Layout::BOOL).is_ok());
    }
}
