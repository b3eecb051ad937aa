//! Arrays over sequences.
//!
//! `Vec<E>` maps to a sequence of any count (including an unbounded outermost sequence, whose
//! count is taken from the segment), `[E; N]` only to a sequence of exactly `N` elements.
//! Nested arrays map to nested sequences: `Vec<[i32; 4]>` over `[3:[4:i32]]`. The nesting
//! depth of the type must equal the number of sequence levels; a `Vec<i32>` over
//! `[3:[4:i32]]` is refused up front instead of failing deep inside the element.
//!
//! Each level decodes its elements through the accessor of the level below, `stride` bytes
//! apart, where the stride is the byte size of one element: the product of the remaining
//! dimensions times the leaf size.

use std::fmt;

use lamina::{Layout, SequenceLayout};
use smallvec::SmallVec;

use crate::accessor::{Accessor, Elements};
use crate::compile::{Compiler, Mappable};
use crate::desc::{TypeDesc, TypeKind};
use crate::error::{AccessError, MappingError, MappingResult};

/// A chain of nested sequences flattened into its counts and its leaf.
pub struct Dimensions<'l> {
    /// Outermost first. `None` marks an unbounded sequence.
    pub counts: SmallVec<[Option<usize>; 4]>,
    pub leaf: &'l Layout,
}

impl<'l> Dimensions<'l> {
    pub fn of(layout: &'l Layout) -> Self {
        let mut counts = SmallVec::new();
        let mut node = layout;
        while let Layout::Sequence(seq) = node {
            counts.push(seq.count());
            node = seq.element();
        }
        Dimensions { counts, leaf: node }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl fmt::Display for Dimensions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for count in self.counts.iter() {
            match count {
                Some(count) => write!(f, "[{}]", count)?,
                None => f.write_str("[*]")?,
            }
        }
        write!(f, " of {}", self.leaf)
    }
}

/// Checks the sequence and the dimensionality, then compiles the element runs.
fn compile_sequence<'l, E: Mappable>(
    desc: &TypeDesc,
    layout: &'l Layout,
    cx: &mut Compiler<'_>,
) -> MappingResult<(&'l SequenceLayout, Elements<E>)> {
    let seq = match layout {
        Layout::Sequence(seq) => seq,
        other => {
            let reason = format!("an array maps to a sequence, not a {}", other.kind_name());
            return Err(cx.mismatch(desc, layout, reason));
        }
    };
    let dims = Dimensions::of(layout);
    if desc.depth() != dims.len() {
        return Err(MappingError::DimensionMismatch {
            site: cx.site(desc),
            declared: desc.name.clone(),
            depth: desc.depth(),
            dimensions: dims.len(),
            layout: layout.to_string(),
        });
    }
    let elements = E::compile_elements(seq.element(), cx)?;
    Ok((seq, elements))
}

fn unbounded_count(
    segment_len: usize,
    offset: usize,
    stride: usize,
    desc: &str,
) -> Result<usize, AccessError> {
    if stride == 0 {
        return Err(AccessError::Unsized { type_name: desc.to_string() });
    }
    Ok(segment_len.saturating_sub(offset) / stride)
}

impl<E: Mappable> Mappable for Vec<E> {
    fn describe() -> TypeDesc {
        let element = E::describe();
        let name = format!("Vec<{}>", element.name);
        TypeDesc::new::<Self>(name, TypeKind::Array { element: Box::new(element), len: None })
    }

    fn compile(layout: &Layout, cx: &mut Compiler<'_>) -> MappingResult<Accessor<Self>> {
        let desc = Self::describe();
        let (seq, elements) = compile_sequence::<E>(&desc, layout, cx)?;
        let count = seq.count();
        let stride = seq.element().byte_size();
        let Elements { read, write } = elements;
        let name = desc.name;
        Ok(Accessor::new(
            move |segment, offset| {
                let count = match count {
                    Some(count) => count,
                    None => unbounded_count(segment.len(), offset, stride, &name)?,
                };
                read(segment, offset, count)
            },
            move |segment, offset, values: &Vec<E>| {
                if let Some(count) = count {
                    if values.len() != count {
                        return Err(AccessError::LengthMismatch {
                            expected: count,
                            actual: values.len(),
                        });
                    }
                }
                write(segment, offset, values)
            },
        ))
    }

    fn natural_layout() -> MappingResult<Layout> {
        Err(MappingError::NoNaturalLayout {
            type_name: Self::describe().name,
            reason: "the element count of a Vec is not part of its type".to_string(),
        })
    }
}

impl<E: Mappable, const N: usize> Mappable for [E; N] {
    fn describe() -> TypeDesc {
        let element = E::describe();
        let name = format!("[{}; {}]", element.name, N);
        TypeDesc::new::<Self>(name, TypeKind::Array { element: Box::new(element), len: Some(N) })
    }

    fn compile(layout: &Layout, cx: &mut Compiler<'_>) -> MappingResult<Accessor<Self>> {
        let desc = Self::describe();
        let (seq, elements) = compile_sequence::<E>(&desc, layout, cx)?;
        if seq.count() != Some(N) {
            let reason = format!("expected a sequence of exactly {} elements", N);
            return Err(cx.mismatch(&desc, layout, reason));
        }
        let Elements { read, write } = elements;
        Ok(Accessor::new(
            move |segment, offset| {
                let values = read(segment, offset, N)?;
                let actual = values.len();
                values
                    .try_into()
                    .map_err(|_| AccessError::LengthMismatch { expected: N, actual })
            },
            move |segment, offset, values: &[E; N]| write(segment, offset, &values[..]),
        ))
    }

    fn natural_layout() -> MappingResult<Layout> {
        Ok(Layout::sequence(N, E::natural_layout()?)?)
    }
}
