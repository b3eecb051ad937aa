//! Lamina: declarative binary layouts and the shared byte segments they are applied to.
//!
//! A [`Layout`] is an immutable tree of scalar values, padding, sequences, structs and
//! unions. It knows the size, alignment and offset of every node, and nothing else: it does
//! not own memory. Memory lives in a [`Segment`], a cloneable, thread-safe handle onto a
//! block of bytes with bounds-checked scalar access in either byte order.
//!
//! Turning bytes into typed values is the job of the `segmap` crate, which compiles
//! accessors for a (type, layout) pair on top of these two building blocks.

pub mod describe;
pub mod error;
pub mod layout;
pub mod segment;
pub mod transform;

pub use error::{LayoutError, LayoutResult, SegmentError};
pub use layout::{
    ByteOrder, Carrier, GroupLayout, Layout, PaddingLayout, PathElement, SequenceLayout,
    ValueLayout,
};
pub use segment::{Address, Scalar, Segment};
pub use transform::Transformer;

/// Align an offset up to the given alignment (a power of two).
pub fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

/// [`align_up`] that reports overflow instead of wrapping.
pub fn checked_align_up(addr: usize, align: usize) -> Option<usize> {
    Some(addr.checked_add(align - 1)? & !(align - 1))
}
