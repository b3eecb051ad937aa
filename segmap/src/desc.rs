//! Type descriptors: what the matcher knows about a Rust type without looking at values.

use std::any::TypeId;
use std::fmt;

use lamina::Carrier;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// Maps to exactly one value layout of this carrier.
    Scalar(Carrier),
    /// Maps to a struct or a union, component by component.
    Record,
    /// `Vec<E>` (`len: None`) or `[E; N]`. Maps to a sequence.
    Array { element: Box<TypeDesc>, len: Option<usize> },
    /// Has a prebuilt mapping in a [`crate::Registry`].
    Known,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDesc {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
}

impl TypeDesc {
    pub fn new<T: 'static>(name: impl Into<String>, kind: TypeKind) -> Self {
        TypeDesc { id: TypeId::of::<T>(), name: name.into(), kind }
    }

    pub fn scalar<T: 'static>(carrier: Carrier) -> Self {
        Self::new::<T>(carrier.mnemonic(), TypeKind::Scalar(carrier))
    }

    /// Descriptor of a record, named after the Rust type without module paths.
    pub fn record<T: 'static>() -> Self {
        Self::new::<T>(short_name::<T>(), TypeKind::Record)
    }

    /// Number of nested array levels: `Vec<[i32; 4]>` has depth 2.
    pub fn depth(&self) -> usize {
        match &self.kind {
            TypeKind::Array { element, .. } => 1 + element.depth(),
            _ => 0,
        }
    }

    /// The innermost non-array type.
    pub fn leaf(&self) -> &TypeDesc {
        match &self.kind {
            TypeKind::Array { element, .. } => element.leaf(),
            _ => self,
        }
    }
}

/// `std::any::type_name` with every module path dropped: `Vec<Option<Duration>>` rather
/// than `alloc::vec::Vec<core::option::Option<core::time::Duration>>`.
pub fn short_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    for (ix, ch) in full.char_indices() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            continue;
        }
        push_last_segment(&mut out, &full[segment_start..ix]);
        out.push(ch);
        segment_start = ix + ch.len_utf8();
    }
    push_last_segment(&mut out, &full[segment_start..]);
    out
}

fn push_last_segment(out: &mut String, path: &str) {
    out.push_str(path.rsplit("::").next().unwrap_or(path));
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
