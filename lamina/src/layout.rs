//! The layout model: an immutable tree describing where typed values live inside a byte
//! segment.
//!
//! ## Nodes
//!
//! - `Value`: one scalar of a given [`Carrier`], byte order and alignment.
//! - `Padding`: filler bytes. Never mapped to anything.
//! - `Sequence`: `count` repetitions of one element layout. A sequence without a count is
//!   *unbounded* and may only be the outermost node of a tree.
//! - `Struct`: members placed one after the other, each at the next offset rounded up to
//!   its alignment.
//! - `Union`: members overlapping at offset 0.
//!
//! ## Derived attributes
//!
//! A composite's alignment is the largest alignment among its members unless a larger one is
//! requested explicitly. A union is as large as its largest member and a struct ends where its
//! last member ends; neither is padded at the end.
//! Offsets of group members are computed once, when the group is built, so that offset
//! lookups during mapping are plain indexing.
//!
//! Layouts are cheap to clone: children are shared behind `Arc`s, and every "modifier"
//! (`with_name`, `with_byte_alignment`, ...) returns a new tree.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::checked_align_up;
use crate::error::{LayoutError, LayoutResult};

const FINGERPRINT_SEED: u64 = 1234;

// ============================================================================
// Scalars
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    #[cfg(target_endian = "little")]
    pub const NATIVE: ByteOrder = ByteOrder::Little;
    #[cfg(target_endian = "big")]
    pub const NATIVE: ByteOrder = ByteOrder::Big;

    pub fn flip(self) -> ByteOrder {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }
}

/// The scalar kinds a value layout can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// An opaque 8-byte address.
    Address,
}

impl Carrier {
    pub const fn byte_size(self) -> usize {
        match self {
            Carrier::Bool | Carrier::I8 | Carrier::U8 => 1,
            Carrier::I16 | Carrier::U16 => 2,
            Carrier::I32 | Carrier::U32 | Carrier::F32 => 4,
            Carrier::I64 | Carrier::U64 | Carrier::F64 | Carrier::Address => 8,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Carrier::Bool => "bool",
            Carrier::I8 => "i8",
            Carrier::U8 => "u8",
            Carrier::I16 => "i16",
            Carrier::U16 => "u16",
            Carrier::I32 => "i32",
            Carrier::U32 => "u32",
            Carrier::I64 => "i64",
            Carrier::U64 => "u64",
            Carrier::F32 => "f32",
            Carrier::F64 => "f64",
            Carrier::Address => "addr",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// ============================================================================
// Node types
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueLayout {
    carrier: Carrier,
    order: ByteOrder,
    align: usize,
    name: Option<Arc<str>>,
}

impl ValueLayout {
    /// A value with native byte order and natural alignment.
    pub const fn new(carrier: Carrier) -> Self {
        ValueLayout { carrier, order: ByteOrder::NATIVE, align: carrier.byte_size(), name: None }
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn with_order(&self, order: ByteOrder) -> ValueLayout {
        ValueLayout { order, ..self.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PaddingLayout {
    size: usize,
    align: usize,
    name: Option<Arc<str>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SequenceLayout {
    count: Option<usize>,
    element: Arc<Layout>,
    size: usize,
    align: usize,
    name: Option<Arc<str>>,
}

impl SequenceLayout {
    /// `None` for an unbounded sequence.
    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn element(&self) -> &Layout {
        &self.element
    }

    pub fn is_unbounded(&self) -> bool {
        self.count.is_none()
    }
}

/// Members of a struct or a union, with their precomputed offsets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupLayout {
    members: Arc<[Layout]>,
    offsets: Arc<[usize]>,
    size: usize,
    align: usize,
    name: Option<Arc<str>>,
}

impl GroupLayout {
    fn build(members: Vec<Layout>, overlapping: bool) -> LayoutResult<GroupLayout> {
        let mut offsets = Vec::with_capacity(members.len());
        let mut extent = 0usize;
        let mut align = 1usize;
        for member in members.iter() {
            if member.is_unbounded() {
                return Err(LayoutError::UnboundedNested { layout: member.to_string() });
            }
            let member_align = member.byte_alignment();
            align = align.max(member_align);
            if overlapping {
                offsets.push(0);
                extent = extent.max(member.byte_size());
            } else {
                let offset =
                    checked_align_up(extent, member_align).ok_or(LayoutError::Overflow)?;
                offsets.push(offset);
                extent = offset.checked_add(member.byte_size()).ok_or(LayoutError::Overflow)?;
            }
        }
        Ok(GroupLayout {
            members: members.into(),
            offsets: offsets.into(),
            size: extent,
            align,
            name: None,
        })
    }

    pub fn members(&self) -> &[Layout] {
        &self.members
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// `(offset, member)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Layout)> + '_ {
        self.offsets.iter().copied().zip(self.members.iter())
    }

    /// Index of the first member with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name() == Some(name))
    }

    fn natural_alignment(&self) -> usize {
        self.members.iter().map(Layout::byte_alignment).max().unwrap_or(1)
    }
}

/// One step of a path into a layout tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// Select a struct or union member by name.
    Member(String),
    /// Select an element of a sequence.
    Index(usize),
}

impl PathElement {
    pub fn member(name: &str) -> PathElement {
        PathElement::Member(name.to_string())
    }

    pub fn index(index: usize) -> PathElement {
        PathElement::Index(index)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Member(name) => write!(f, ".{}", name),
            PathElement::Index(index) => write!(f, "[{}]", index),
        }
    }
}

// ============================================================================
// Layout
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    Value(ValueLayout),
    Padding(PaddingLayout),
    Sequence(SequenceLayout),
    Struct(GroupLayout),
    Union(GroupLayout),
}

impl Layout {
    pub const BOOL: Layout = Layout::value(Carrier::Bool);
    pub const I8: Layout = Layout::value(Carrier::I8);
    pub const U8: Layout = Layout::value(Carrier::U8);
    pub const I16: Layout = Layout::value(Carrier::I16);
    pub const U16: Layout = Layout::value(Carrier::U16);
    pub const I32: Layout = Layout::value(Carrier::I32);
    pub const U32: Layout = Layout::value(Carrier::U32);
    pub const I64: Layout = Layout::value(Carrier::I64);
    pub const U64: Layout = Layout::value(Carrier::U64);
    pub const F32: Layout = Layout::value(Carrier::F32);
    pub const F64: Layout = Layout::value(Carrier::F64);
    pub const ADDRESS: Layout = Layout::value(Carrier::Address);

    pub const fn value(carrier: Carrier) -> Layout {
        Layout::Value(ValueLayout::new(carrier))
    }

    pub fn padding(size: usize) -> Layout {
        Layout::Padding(PaddingLayout { size, align: 1, name: None })
    }

    pub fn sequence(count: usize, element: Layout) -> LayoutResult<Layout> {
        Self::build_sequence(Some(count), element)
    }

    /// A sequence whose length is decided by the segment it is applied to.
    pub fn unbounded(element: Layout) -> LayoutResult<Layout> {
        Self::build_sequence(None, element)
    }

    fn build_sequence(count: Option<usize>, element: Layout) -> LayoutResult<Layout> {
        if element.is_unbounded() {
            return Err(LayoutError::UnboundedNested { layout: element.to_string() });
        }
        let (element_size, align) = (element.byte_size(), element.byte_alignment());
        if element_size % align != 0 {
            return Err(LayoutError::ElementSizeNotMultiple {
                size: element_size,
                alignment: align,
                element: element.to_string(),
            });
        }
        let size = count
            .unwrap_or(0)
            .checked_mul(element_size)
            .ok_or(LayoutError::Overflow)?;
        Ok(Layout::Sequence(SequenceLayout { count, element: Arc::new(element), size, align, name: None }))
    }

    pub fn structure(members: impl IntoIterator<Item = Layout>) -> LayoutResult<Layout> {
        Ok(Layout::Struct(GroupLayout::build(members.into_iter().collect(), false)?))
    }

    pub fn union(members: impl IntoIterator<Item = Layout>) -> LayoutResult<Layout> {
        Ok(Layout::Union(GroupLayout::build(members.into_iter().collect(), true)?))
    }

    /// Size in bytes. Unbounded sequences report 0.
    pub fn byte_size(&self) -> usize {
        match self {
            Layout::Value(v) => v.carrier.byte_size(),
            Layout::Padding(p) => p.size,
            Layout::Sequence(s) => s.size,
            Layout::Struct(g) | Layout::Union(g) => g.size,
        }
    }

    pub fn byte_alignment(&self) -> usize {
        match self {
            Layout::Value(v) => v.align,
            Layout::Padding(p) => p.align,
            Layout::Sequence(s) => s.align,
            Layout::Struct(g) | Layout::Union(g) => g.align,
        }
    }

    /// Alignment this node would have without an explicit `with_byte_alignment`.
    pub fn natural_alignment(&self) -> usize {
        match self {
            Layout::Value(v) => v.carrier.byte_size(),
            Layout::Padding(_) => 1,
            Layout::Sequence(s) => s.element.byte_alignment(),
            Layout::Struct(g) | Layout::Union(g) => g.natural_alignment(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name_slot().as_deref()
    }

    fn name_slot(&self) -> &Option<Arc<str>> {
        match self {
            Layout::Value(v) => &v.name,
            Layout::Padding(p) => &p.name,
            Layout::Sequence(s) => &s.name,
            Layout::Struct(g) | Layout::Union(g) => &g.name,
        }
    }

    fn name_slot_mut(&mut self) -> &mut Option<Arc<str>> {
        match self {
            Layout::Value(v) => &mut v.name,
            Layout::Padding(p) => &mut p.name,
            Layout::Sequence(s) => &mut s.name,
            Layout::Struct(g) | Layout::Union(g) => &mut g.name,
        }
    }

    pub fn with_name(&self, name: &str) -> Layout {
        let mut layout = self.clone();
        *layout.name_slot_mut() = Some(Arc::from(name));
        layout
    }

    pub fn without_name(&self) -> Layout {
        let mut layout = self.clone();
        *layout.name_slot_mut() = None;
        layout
    }

    /// Same layout with a different alignment.
    ///
    /// Values and padding accept any power of two. Sequences and groups refuse an alignment
    /// smaller than what their elements or members require. Sizes never change: a node whose
    /// size is not a multiple of its alignment is rejected when it is tiled in a sequence.
    pub fn with_byte_alignment(&self, align: usize) -> LayoutResult<Layout> {
        if !align.is_power_of_two() {
            return Err(LayoutError::NotPowerOfTwo { alignment: align });
        }
        let required = match self {
            Layout::Value(_) | Layout::Padding(_) => 1,
            _ => self.natural_alignment(),
        };
        if align < required {
            return Err(LayoutError::AlignmentTooSmall {
                requested: align,
                required,
                layout: self.to_string(),
            });
        }
        let mut layout = self.clone();
        match &mut layout {
            Layout::Value(v) => v.align = align,
            Layout::Padding(p) => p.align = align,
            Layout::Sequence(s) => s.align = align,
            Layout::Struct(g) | Layout::Union(g) => g.align = align,
        }
        Ok(layout)
    }

    /// Changes the byte order of a value layout. Other nodes are returned unchanged; use
    /// [`crate::transform::with_byte_order`] to rewrite a whole tree.
    pub fn with_byte_order(&self, order: ByteOrder) -> Layout {
        match self {
            Layout::Value(v) => Layout::Value(v.with_order(order)),
            other => other.clone(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Layout::Sequence(s) if s.is_unbounded())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Layout::Value(_) => "value",
            Layout::Padding(_) => "padding",
            Layout::Sequence(_) => "sequence",
            Layout::Struct(_) => "struct",
            Layout::Union(_) => "union",
        }
    }

    pub fn as_group(&self) -> Option<&GroupLayout> {
        match self {
            Layout::Struct(g) | Layout::Union(g) => Some(g),
            _ => None,
        }
    }

    /// First member with the given name, if this is a struct or a union.
    pub fn member(&self, name: &str) -> Option<&Layout> {
        let group = self.as_group()?;
        group.position(name).map(|ix| &group.members[ix])
    }

    fn step(&self, element: &PathElement) -> LayoutResult<(usize, &Layout)> {
        match (self, element) {
            (Layout::Struct(g) | Layout::Union(g), PathElement::Member(name)) => g
                .position(name)
                .map(|ix| (g.offsets[ix], &g.members[ix]))
                .ok_or_else(|| LayoutError::NoSuchMember {
                    name: name.clone(),
                    layout: self.to_string(),
                }),
            (Layout::Sequence(s), PathElement::Index(index)) => {
                if let Some(count) = s.count {
                    if *index >= count {
                        return Err(LayoutError::IndexOutOfRange {
                            index: *index,
                            count,
                            layout: self.to_string(),
                        });
                    }
                }
                let delta =
                    index.checked_mul(s.element.byte_size()).ok_or(LayoutError::Overflow)?;
                Ok((delta, &s.element))
            }
            _ => Err(LayoutError::PathMismatch { element: element.clone(), layout: self.to_string() }),
        }
    }

    /// Offset of the node addressed by `path`, relative to the start of this layout.
    pub fn byte_offset(&self, path: &[PathElement]) -> LayoutResult<usize> {
        let mut node = self;
        let mut offset = 0usize;
        for element in path {
            let (delta, next) = node.step(element)?;
            offset = offset.checked_add(delta).ok_or(LayoutError::Overflow)?;
            node = next;
        }
        Ok(offset)
    }

    /// The node addressed by `path`.
    pub fn select(&self, path: &[PathElement]) -> LayoutResult<&Layout> {
        path.iter().try_fold(self, |node, element| node.step(element).map(|(_, next)| next))
    }

    /// Structural 64-bit hash of the whole tree, names and byte orders included.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(FINGERPRINT_SEED);
        self.hash(&mut hasher);
        hasher.finish()
    }
}

fn write_members(f: &mut fmt::Formatter<'_>, group: &GroupLayout, sep: &str) -> fmt::Result {
    f.write_str("[")?;
    for (ix, member) in group.members.iter().enumerate() {
        if ix > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", member)?;
    }
    f.write_str("]")
}

/// Compact diagnostic form, e.g. `[i32(x) i32(y)](point)` or `8%[2:I64]`.
///
/// Little-endian values print lower case and big-endian values upper case.
impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.byte_alignment() != self.natural_alignment() {
            write!(f, "{}%", self.byte_alignment())?;
        }
        match self {
            Layout::Value(v) => match v.order {
                ByteOrder::Little => f.write_str(v.carrier.mnemonic())?,
                ByteOrder::Big => f.write_str(&v.carrier.mnemonic().to_uppercase())?,
            },
            Layout::Padding(p) => write!(f, "x{}", p.size)?,
            Layout::Sequence(s) => match s.count {
                Some(count) => write!(f, "[{}:{}]", count, s.element)?,
                None => write!(f, "[*:{}]", s.element)?,
            },
            Layout::Struct(g) => write_members(f, g, " ")?,
            Layout::Union(g) => write_members(f, g, "|")?,
        }
        if let Some(name) = self.name() {
            write!(f, "({})", name)?;
        }
        Ok(())
    }
}
