//! Natural layouts: the layout a type has when nobody says otherwise.
//!
//! Scalars become a value of their carrier in native byte order, `[E; N]` a sequence of `N`
//! natural `E`s, and records a struct of their components' natural layouts, each named after
//! its component and aligned naturally. `Vec<E>` has no natural layout since its length is
//! not part of its type.

use lamina::Layout;

use crate::compile::Mappable;
use crate::error::{MappingError, MappingResult};
use crate::introspect::Record;

/// Natural layout of `T`, equivalent to `T::natural_layout()`.
pub fn natural_layout<T: Mappable>() -> MappingResult<Layout> {
    T::natural_layout()
}

pub fn record_layout<T: Record>() -> MappingResult<Layout> {
    let components = T::shape().validate()?;
    let members = components
        .iter()
        .map(|c| {
            c.natural_layout().map_err(|err| match err {
                MappingError::NoNaturalLayout { reason, .. } => MappingError::NoNaturalLayout {
                    type_name: format!("{}.{}", components.name, c.name()),
                    reason,
                },
                other => other,
            })
        })
        .collect::<MappingResult<Vec<_>>>()?;
    Ok(Layout::structure(members)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina::{ByteOrder, PathElement};

    crate::record! {
        struct Sample {
            flag: bool,
            value: f64,
            pair: [u16; 2],
        }
    }

    crate::record! {
        struct Outer {
            sample: Sample,
            tail: u8,
        }
    }

    crate::record! {
        struct Growable {
            items: Vec<i32>,
        }
    }

    #[test]
    fn test_record_natural_layout() {
        let layout = natural_layout::<Outer>().unwrap();
        let sample = layout.member("sample").unwrap();
        assert_eq!(sample.byte_size(), 20);
        assert_eq!(sample.byte_offset(&[PathElement::member("pair")]).unwrap(), 16);
        assert_eq!(layout.byte_size(), 21);
        assert_eq!(
            layout.select(&[PathElement::member("sample"), PathElement::member("flag")]).unwrap(),
            &Layout::BOOL.with_name("flag")
        );
        assert_eq!(
            layout.member("tail").unwrap(),
            &Layout::U8.with_byte_order(ByteOrder::NATIVE).with_name("tail")
        );
    }

    #[test]
    fn test_vec_has_no_natural_layout() {
        let err = natural_layout::<Growable>().unwrap_err();
        assert!(matches!(
            &err,
            MappingError::NoNaturalLayout { type_name, .. } if type_name == "Growable.items"
        ));
    }
}
