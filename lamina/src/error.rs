//! Errors raised while building layouts and while touching segments.

use std::fmt;

use crate::layout::PathElement;

/// A layout tree could not be built, or a path did not resolve inside one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Alignments must be powers of two.
    NotPowerOfTwo { alignment: usize },
    /// An explicit alignment was smaller than what a member requires.
    AlignmentTooSmall { requested: usize, required: usize, layout: String },
    /// Unbounded sequences may only appear as the outermost layout.
    UnboundedNested { layout: String },
    /// The element of a sequence does not tile: its size is not a multiple of its alignment.
    ElementSizeNotMultiple { size: usize, alignment: usize, element: String },
    /// Size or offset arithmetic overflowed `usize`.
    Overflow,
    NoSuchMember { name: String, layout: String },
    IndexOutOfRange { index: usize, count: usize, layout: String },
    /// A path element did not fit the kind of node it was applied to.
    PathMismatch { element: PathElement, layout: String },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::NotPowerOfTwo { alignment } => {
                write!(f, "alignment {} is not a power of two", alignment)
            }
            LayoutError::AlignmentTooSmall { requested, required, layout } => write!(
                f,
                "alignment {} is smaller than the {} required by {}",
                requested, required, layout
            ),
            LayoutError::UnboundedNested { layout } => {
                write!(f, "unbounded sequence {} can only be the outermost layout", layout)
            }
            LayoutError::ElementSizeNotMultiple { size, alignment, element } => write!(
                f,
                "element {} of size {} is not a multiple of its alignment {}",
                element, size, alignment
            ),
            LayoutError::Overflow => write!(f, "layout size overflows usize"),
            LayoutError::NoSuchMember { name, layout } => {
                write!(f, "no member named '{}' in {}", name, layout)
            }
            LayoutError::IndexOutOfRange { index, count, layout } => {
                write!(f, "index {} out of range 0..{} in {}", index, count, layout)
            }
            LayoutError::PathMismatch { element, layout } => {
                write!(f, "path element {} cannot be applied to {}", element, layout)
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// An access fell outside a segment or broke the alignment contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    OutOfBounds { offset: usize, size: usize, len: usize },
    Misaligned { offset: usize, alignment: usize },
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::OutOfBounds { offset, size, len } => write!(
                f,
                "access of {} bytes at offset {} is out of bounds for a segment of {} bytes",
                size, offset, len
            ),
            SegmentError::Misaligned { offset, alignment } => {
                write!(f, "offset {} is not aligned to {}", offset, alignment)
            }
        }
    }
}

impl std::error::Error for SegmentError {}

pub type LayoutResult<T> = Result<T, LayoutError>;
