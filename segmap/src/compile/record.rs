//! Records over structs and unions.
//!
//! Components are matched by name, compiled against their member, and shifted by the
//! member's offset. Union members all sit at offset 0, so a record over a union decodes
//! every component it names from the same bytes; the caller picks the arm by choosing the
//! record type.

use lamina::Layout;

use crate::accessor::{Accessor, Fill, Setter};
use crate::compile::{Compiler, Mappable};
use crate::error::MappingResult;
use crate::introspect::{Bound, Components, ErasedGetter, Fields, Record, Style};
use crate::matcher::match_components;

pub fn compile<T: Record + Mappable>(
    layout: &Layout,
    cx: &mut Compiler<'_>,
) -> MappingResult<Accessor<T>> {
    let (components, bound) = bind(layout, cx)?;
    let mut reads: Vec<ErasedGetter> = Vec::with_capacity(bound.len());
    let mut fills: Vec<Fill<T>> = Vec::new();
    let mut stores: Vec<Setter<T>> = Vec::with_capacity(bound.len());
    for (_, b) in bound {
        reads.push(b.read);
        fills.extend(b.fill);
        stores.push(b.store);
    }

    let type_name = components.name;
    let set = move |segment: &lamina::Segment, offset: usize, value: &T| {
        stores.iter().try_for_each(|store| store(segment, offset, value))
    };
    Ok(match components.style {
        Style::Fields(construct) => Accessor::new(
            move |segment, offset| {
                let mut fields = Fields::new(segment, offset, &reads, type_name);
                construct(&mut fields)
            },
            set,
        ),
        Style::Properties(create) => Accessor::new(
            move |segment, offset| {
                let mut value = create();
                for fill in fills.iter() {
                    fill(segment, offset, &mut value)?;
                }
                Ok(value)
            },
            set,
        ),
    })
}

/// Validates `T`, matches its components against `layout` and compiles each one against
/// its member, in declaration order.
pub fn bind<T: Record + Mappable>(
    layout: &Layout,
    cx: &mut Compiler<'_>,
) -> MappingResult<(Components<T>, Vec<(&'static str, Bound<T>)>)> {
    let desc = T::describe();
    let group = match layout.as_group() {
        Some(group) => group,
        None => {
            let reason =
                format!("a record maps to a struct or a union, not a {}", layout.kind_name());
            return Err(cx.mismatch(&desc, layout, reason));
        }
    };
    let components = T::shape().validate()?;
    let matched = match_components(&components, layout, group)?;
    let mut bound = Vec::with_capacity(matched.len());
    for m in matched.iter() {
        let name = m.component.name();
        let b = cx.within(components.name, name, |cx| m.component.bind(m.member, m.offset, cx))?;
        bound.push((name, b));
    }
    Ok((components, bound))
}
