//! Construction errors ([`MappingError`]) and call-time errors ([`AccessError`]).
//!
//! Everything structural is reported once, when a mapper is built. Messages name the type,
//! the component (as `Type.component`) and the layout node involved.

use std::fmt;

use lamina::{LayoutError, SegmentError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// Components with no member of the same name.
    MissingMapping { type_name: String, components: Vec<String>, layout: String },
    /// A component name matches several members of one group.
    DuplicateMapping { type_name: String, component: String, layout: String },
    DuplicateComponent { type_name: String, component: String },
    TypeMismatch { site: String, declared: String, layout: String, reason: String },
    /// Array nesting depth of the type differs from the nesting depth of the sequences.
    DimensionMismatch {
        site: String,
        declared: String,
        depth: usize,
        dimensions: usize,
        layout: String,
    },
    UnsupportedElementKind { site: String, element: String, layout: String },
    SelfReference { type_name: String, via: String },
    EmptyComponentSet { type_name: String },
    GenericType { type_name: String, parameters: Vec<String> },
    /// A component is named like a padding member.
    PaddingCollision { type_name: String, component: String, layout: String },
    NoNaturalLayout { type_name: String, reason: String },
    Layout(LayoutError),
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::MissingMapping { type_name, components, layout } => {
                let names: Vec<String> =
                    components.iter().map(|c| format!("{}.{}", type_name, c)).collect();
                write!(f, "no mapping for {} in layout {}", names.join(", "), layout)
            }
            MappingError::DuplicateMapping { type_name, component, layout } => write!(
                f,
                "component {}.{} matches more than one member of layout {}",
                type_name, component, layout
            ),
            MappingError::DuplicateComponent { type_name, component } => {
                write!(f, "{} declares component '{}' more than once", type_name, component)
            }
            MappingError::TypeMismatch { site, declared, layout, reason } => write!(
                f,
                "{}: type {} cannot be mapped to {}: {}",
                site, declared, layout, reason
            ),
            MappingError::DimensionMismatch { site, declared, depth, dimensions, layout } => {
                write!(
                    f,
                    "{}: type {} has {} array dimension(s) but layout {} has {}",
                    site, declared, depth, layout, dimensions
                )
            }
            MappingError::UnsupportedElementKind { site, element, layout } => write!(
                f,
                "{}: arrays of {} are not supported (layout {})",
                site, element, layout
            ),
            MappingError::SelfReference { type_name, via } => {
                write!(f, "{} refers to itself through {}", type_name, via)
            }
            MappingError::EmptyComponentSet { type_name } => {
                write!(f, "{} has no components to map", type_name)
            }
            MappingError::GenericType { type_name, parameters } => write!(
                f,
                "{} has unresolved type parameters <{}>",
                type_name,
                parameters.join(", ")
            ),
            MappingError::PaddingCollision { type_name, component, layout } => write!(
                f,
                "component {}.{} is named like a padding member of layout {}",
                type_name, component, layout
            ),
            MappingError::NoNaturalLayout { type_name, reason } => {
                write!(f, "unable to find a natural layout for {}: {}", type_name, reason)
            }
            MappingError::Layout(err) => write!(f, "invalid layout: {}", err),
        }
    }
}

impl std::error::Error for MappingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MappingError::Layout(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LayoutError> for MappingError {
    fn from(err: LayoutError) -> Self {
        MappingError::Layout(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    OutOfBounds { offset: usize, size: usize, len: usize },
    Misaligned { offset: usize, alignment: usize },
    ReadOnly { type_name: String },
    /// An array value does not have the element count of its sequence.
    LengthMismatch { expected: usize, actual: usize },
    /// The segment is not a whole number of elements.
    NotAMultiple { len: usize, size: usize },
    /// Indexed and streaming access need a layout of non-zero size.
    Unsized { type_name: String },
    /// The bytes do not encode a valid value of the type.
    InvalidValue { type_name: String, reason: String },
    /// A record constructor took its components in a different order or type than declared.
    ShapeMismatch { type_name: String, position: usize },
    /// A view was asked for a component its type does not declare.
    NoSuchComponent { type_name: String, component: String },
    /// A view component was read or written as another type than declared.
    ComponentType { site: String, declared: String, requested: String },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::OutOfBounds { offset, size, len } => write!(
                f,
                "access of {} bytes at offset {} is out of bounds for a segment of {} bytes",
                size, offset, len
            ),
            AccessError::Misaligned { offset, alignment } => {
                write!(f, "offset {} is not aligned to {}", offset, alignment)
            }
            AccessError::ReadOnly { type_name } => {
                write!(f, "the mapper for {} is read-only", type_name)
            }
            AccessError::LengthMismatch { expected, actual } => {
                write!(f, "expected {} array elements, got {}", expected, actual)
            }
            AccessError::NotAMultiple { len, size } => write!(
                f,
                "segment of {} bytes is not a multiple of the layout size {}",
                len, size
            ),
            AccessError::Unsized { type_name } => {
                write!(f, "the layout of {} has no size to step by", type_name)
            }
            AccessError::InvalidValue { type_name, reason } => {
                write!(f, "invalid {}: {}", type_name, reason)
            }
            AccessError::ShapeMismatch { type_name, position } => write!(
                f,
                "constructor of {} does not take component #{} as declared",
                type_name, position
            ),
            AccessError::NoSuchComponent { type_name, component } => {
                write!(f, "{} has no component named {}", type_name, component)
            }
            AccessError::ComponentType { site, declared, requested } => {
                write!(f, "{} is declared as {}, not {}", site, declared, requested)
            }
        }
    }
}

impl std::error::Error for AccessError {}

impl From<SegmentError> for AccessError {
    fn from(err: SegmentError) -> Self {
        match err {
            SegmentError::OutOfBounds { offset, size, len } => {
                AccessError::OutOfBounds { offset, size, len }
            }
            SegmentError::Misaligned { offset, alignment } => {
                AccessError::Misaligned { offset, alignment }
            }
        }
    }
}

pub type MappingResult<T> = Result<T, MappingError>;
pub type AccessResult<T> = Result<T, AccessError>;
