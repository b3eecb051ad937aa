//! Pairs record components with group members by name.
//!
//! Matching is exact: a component named `x` maps to the member named `x`, nothing else.
//! Padding is never matched; a component that shares its name with a padding member is an
//! error rather than silently skipped. Kinds must agree: scalars need a value of the same
//! carrier, records a struct or a union, arrays a sequence.

use lamina::{GroupLayout, Layout};

use crate::desc::{TypeDesc, TypeKind};
use crate::error::{MappingError, MappingResult};
use crate::introspect::{Component, Components};

/// A component and the member it maps to.
pub struct Matched<'c, 'l, T> {
    pub component: &'c Component<T>,
    /// Offset of the member relative to the start of the group.
    pub offset: usize,
    pub member: &'l Layout,
}

/// Matches every component of `components` against the members of `group`, whose layout
/// is `layout`. Results are in component order.
pub fn match_components<'c, 'l, T>(
    components: &'c Components<T>,
    layout: &'l Layout,
    group: &'l GroupLayout,
) -> MappingResult<Vec<Matched<'c, 'l, T>>> {
    let type_name = components.name;
    let mut missing = Vec::new();
    let mut matched = Vec::with_capacity(components.len());

    for component in components.iter() {
        let mut candidates =
            group.iter().filter(|(_, member)| member.name() == Some(component.name()));
        let first = candidates.next();
        let second = candidates.next();
        match (first, second) {
            (None, _) => missing.push(component.name().to_string()),
            (Some((_, Layout::Padding(_))), _) | (_, Some((_, Layout::Padding(_)))) => {
                return Err(MappingError::PaddingCollision {
                    type_name: type_name.to_string(),
                    component: component.name().to_string(),
                    layout: layout.to_string(),
                });
            }
            (Some(_), Some(_)) => {
                return Err(MappingError::DuplicateMapping {
                    type_name: type_name.to_string(),
                    component: component.name().to_string(),
                    layout: layout.to_string(),
                });
            }
            (Some((offset, member)), None) => matched.push(Matched { component, offset, member }),
        }
    }

    if !missing.is_empty() {
        return Err(MappingError::MissingMapping {
            type_name: type_name.to_string(),
            components: missing,
            layout: layout.to_string(),
        });
    }

    for m in matched.iter() {
        if let Err(reason) = compatible(m.component.declared(), m.member) {
            return Err(MappingError::TypeMismatch {
                site: format!("{}.{}", type_name, m.component.name()),
                declared: m.component.declared().name.clone(),
                layout: m.member.to_string(),
                reason,
            });
        }
    }
    Ok(matched)
}

/// Whether a value of `declared` can live in `member`, judged on kinds alone.
pub fn compatible(declared: &TypeDesc, member: &Layout) -> Result<(), String> {
    match (&declared.kind, member) {
        (TypeKind::Scalar(carrier), Layout::Value(v)) if *carrier == v.carrier() => Ok(()),
        (TypeKind::Scalar(carrier), Layout::Value(v)) => {
            Err(format!("carrier {} differs from {}", v.carrier(), carrier))
        }
        (TypeKind::Scalar(_), other) => {
            Err(format!("a scalar maps to a value layout, not a {}", other.kind_name()))
        }
        (TypeKind::Record, Layout::Struct(_) | Layout::Union(_)) => Ok(()),
        (TypeKind::Record, other) => {
            Err(format!("a record maps to a struct or a union, not a {}", other.kind_name()))
        }
        (TypeKind::Array { .. }, Layout::Sequence(_)) => Ok(()),
        (TypeKind::Array { .. }, other) => {
            Err(format!("an array maps to a sequence, not a {}", other.kind_name()))
        }
        (TypeKind::Known, Layout::Padding(_)) => Err("padding holds no value".to_string()),
        (TypeKind::Known, _) => Ok(()),
    }
}
