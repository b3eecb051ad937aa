//! The mapper: a compiled (type, layout) pair applied to segments.
//!
//! Construction runs the whole analysis; afterwards every call is a bounds and alignment
//! check followed by the precompiled accessor. Composite accesses are bracketed by the
//! sentinel fence on the first byte of the value: one acquire load before reading, one
//! release store after writing.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use lamina::{Layout, PathElement, Segment};
use tracing::debug;

use crate::accessor::{Getter, Setter};
use crate::compile::{Compiler, Mappable};
use crate::desc::short_name;
use crate::error::{AccessError, AccessResult, MappingResult};
use crate::natural::natural_layout;
use crate::registry::Registry;

fn getter<T>(
    f: impl Fn(&Segment, usize) -> AccessResult<T> + Send + Sync + 'static,
) -> Getter<T> {
    Arc::new(f)
}

fn setter<T>(
    f: impl Fn(&Segment, usize, &T) -> AccessResult<()> + Send + Sync + 'static,
) -> Setter<T> {
    Arc::new(f)
}

pub struct Mapper<T> {
    type_name: Arc<str>,
    layout: Layout,
    get: Getter<T>,
    set: Option<Setter<T>>,
    fenced: bool,
}

impl<T> Clone for Mapper<T> {
    fn clone(&self) -> Self {
        Mapper {
            type_name: self.type_name.clone(),
            layout: self.layout.clone(),
            get: self.get.clone(),
            set: self.set.clone(),
            fenced: self.fenced,
        }
    }
}

impl<T> fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("type_name", &self.type_name)
            .field("layout", &self.layout.to_string())
            .field("read_only", &self.set.is_none())
            .finish()
    }
}

impl<T: Mappable> Mapper<T> {
    /// Mapper of `T` over `layout`, using the global registry.
    pub fn new(layout: &Layout) -> MappingResult<Mapper<T>> {
        Mapper::builder(layout).build()
    }

    pub fn builder(layout: &Layout) -> MapperBuilder<'static, T> {
        MapperBuilder {
            layout: layout.clone(),
            path: Vec::new(),
            registry: Registry::global(),
            fenced: true,
            _type: PhantomData,
        }
    }

    /// Mapper over the natural layout of `T`.
    pub fn natural() -> MappingResult<Mapper<T>> {
        Mapper::new(&natural_layout::<T>()?)
    }

    /// Mapper of `T` over the node that `path` addresses inside `root`.
    ///
    /// Offsets passed to the mapper are offsets of `root`; the mapper adds the offset of the
    /// node itself. This is how a single arm of a union is read.
    pub fn at_path(root: &Layout, path: &[PathElement]) -> MappingResult<Mapper<T>> {
        Mapper::builder(root).path(path).build()
    }
}

impl<T: 'static> Mapper<T> {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_read_only(&self) -> bool {
        self.set.is_none()
    }

    pub(crate) fn check(&self, segment: &Segment, offset: usize) -> AccessResult<()> {
        segment.check_access(offset, self.layout.byte_size(), self.layout.byte_alignment())?;
        Ok(())
    }

    pub(crate) fn index_offset(&self, segment: &Segment, index: usize) -> AccessResult<usize> {
        let size = self.stride()?;
        index.checked_mul(size).ok_or(AccessError::OutOfBounds {
            offset: usize::MAX,
            size,
            len: segment.len(),
        })
    }

    fn stride(&self) -> AccessResult<usize> {
        match self.layout.byte_size() {
            0 => Err(AccessError::Unsized { type_name: self.type_name.to_string() }),
            size => Ok(size),
        }
    }

    pub fn get(&self, segment: &Segment, offset: usize) -> AccessResult<T> {
        self.check(segment, offset)?;
        if self.fenced {
            segment.fence_acquire(offset)?;
        }
        (self.get)(segment, offset)
    }

    /// Equivalent to `get(segment, index * layout().byte_size())`.
    pub fn get_at_index(&self, segment: &Segment, index: usize) -> AccessResult<T> {
        self.get(segment, self.index_offset(segment, index)?)
    }

    pub fn set(&self, segment: &Segment, offset: usize, value: &T) -> AccessResult<()> {
        let set = self
            .set
            .as_ref()
            .ok_or_else(|| AccessError::ReadOnly { type_name: self.type_name.to_string() })?;
        self.check(segment, offset)?;
        set(segment, offset, value)?;
        if self.fenced {
            segment.fence_release(offset)?;
        }
        Ok(())
    }

    pub fn set_at_index(&self, segment: &Segment, index: usize, value: &T) -> AccessResult<()> {
        self.set(segment, self.index_offset(segment, index)?, value)
    }

    /// Every value of `segment`, which must be a whole number of layouts long.
    ///
    /// Values are decoded lazily; each call starts over from the first element.
    pub fn stream(&self, segment: &Segment) -> AccessResult<Stream<'_, T>> {
        let size = self.stride()?;
        if segment.len() % size != 0 {
            return Err(AccessError::NotAMultiple { len: segment.len(), size });
        }
        Ok(Stream { mapper: self, segment: segment.clone(), next: 0, end: segment.len() / size })
    }

    /// Elements `page_number * page_size ..` of [`Mapper::stream`], at most `page_size` of them.
    pub fn page(
        &self,
        segment: &Segment,
        page_size: usize,
        page_number: usize,
    ) -> AccessResult<Stream<'_, T>> {
        let mut stream = self.stream(segment)?;
        let start = page_size.saturating_mul(page_number).min(stream.end);
        stream.next = start;
        stream.end = start.saturating_add(page_size).min(stream.end);
        Ok(stream)
    }

    /// A mapper of `U` that converts after reading and before writing. Errors name `U`.
    pub fn map<U: 'static>(
        &self,
        to: impl Fn(T) -> U + Send + Sync + 'static,
        from: impl Fn(&U) -> T + Send + Sync + 'static,
    ) -> Mapper<U> {
        let get = self.get.clone();
        Mapper {
            type_name: short_name::<U>().into(),
            layout: self.layout.clone(),
            get: getter(move |segment, offset| get(segment, offset).map(&to)),
            set: self.set.clone().map(|set| {
                setter(move |segment, offset, value: &U| set(segment, offset, &from(value)))
            }),
            fenced: self.fenced,
        }
    }

    pub fn map_read_only<U: 'static>(
        &self,
        to: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Mapper<U> {
        let get = self.get.clone();
        Mapper {
            type_name: short_name::<U>().into(),
            layout: self.layout.clone(),
            get: getter(move |segment, offset| get(segment, offset).map(&to)),
            set: None,
            fenced: self.fenced,
        }
    }
}

/// Construction options of a [`Mapper`].
pub struct MapperBuilder<'r, T> {
    layout: Layout,
    path: Vec<PathElement>,
    registry: &'r Registry,
    fenced: bool,
    _type: PhantomData<fn() -> T>,
}

impl<'r, T: Mappable> MapperBuilder<'r, T> {
    /// Registry of well-known types; the global one by default.
    pub fn registry<'s>(self, registry: &'s Registry) -> MapperBuilder<'s, T> {
        MapperBuilder {
            layout: self.layout,
            path: self.path,
            registry,
            fenced: self.fenced,
            _type: PhantomData,
        }
    }

    /// Whether composite accesses go through the sentinel fence (default `true`).
    pub fn fenced(mut self, fenced: bool) -> Self {
        self.fenced = fenced;
        self
    }

    /// Maps the node at `path` instead of the whole layout.
    pub fn path(mut self, path: &[PathElement]) -> Self {
        self.path = path.to_vec();
        self
    }

    pub fn build(self) -> MappingResult<Mapper<T>> {
        let node = self.layout.select(&self.path)?;
        let delta = self.layout.byte_offset(&self.path)?;
        let mut cx = Compiler::new(self.registry);
        let accessor = cx.compile::<T>(node)?.at(delta);

        let desc = T::describe();
        let composite = !matches!(self.layout, Layout::Value(_) | Layout::Padding(_));
        debug!(
            type_name = %desc,
            layout = %self.layout,
            fingerprint = self.layout.fingerprint(),
            delta,
            "compiled mapper"
        );
        Ok(Mapper {
            type_name: desc.name.into(),
            fenced: self.fenced && composite && self.layout.byte_size() > 0,
            layout: self.layout,
            get: accessor.get,
            set: Some(accessor.set),
        })
    }
}

/// Lazy view of consecutive values, see [`Mapper::stream`].
pub struct Stream<'m, T> {
    mapper: &'m Mapper<T>,
    segment: Segment,
    next: usize,
    end: usize,
}

impl<T: 'static> Iterator for Stream<'_, T> {
    type Item = AccessResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.mapper.get_at_index(&self.segment, index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end - self.next;
        (left, Some(left))
    }
}

impl<T: 'static> ExactSizeIterator for Stream<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina::ByteOrder;

    #[test]
    fn test_scalar_mapper_is_not_fenced() {
        let mapper = Mapper::<u16>::new(&Layout::U16).unwrap();
        assert!(!mapper.fenced);
        let seg = Segment::allocate(4);
        mapper.set_at_index(&seg, 1, &0xbeef).unwrap();
        assert_eq!(seg.get::<u16>(2, ByteOrder::NATIVE).unwrap(), 0xbeef);
        assert!(matches!(mapper.get(&seg, 1), Err(AccessError::Misaligned { .. })));
        assert!(matches!(mapper.get(&seg, 4), Err(AccessError::OutOfBounds { .. })));
    }

    #[test]
    fn test_page_clamps() {
        let mapper = Mapper::<u8>::new(&Layout::U8).unwrap();
        let seg = Segment::from_bytes(&[0, 1, 2, 3, 4]);
        let page: Vec<u8> = mapper.page(&seg, 2, 2).unwrap().map(Result::unwrap).collect();
        assert_eq!(page, vec![4]);
        assert_eq!(mapper.page(&seg, 2, 7).unwrap().count(), 0);
        assert_eq!(mapper.stream(&seg).unwrap().len(), 5);
    }

    #[test]
    fn test_read_only() {
        let mapper = Mapper::<i32>::new(&Layout::I32).unwrap().map_read_only(|v| v as i64 * 2);
        let seg = Segment::allocate(4);
        seg.set(0, ByteOrder::NATIVE, 21i32).unwrap();
        assert_eq!(mapper.get(&seg, 0).unwrap(), 42);
        assert!(mapper.is_read_only());
        assert_eq!(
            mapper.set(&seg, 0, &1).unwrap_err(),
            AccessError::ReadOnly { type_name: "i64".to_string() }
        );
    }

    #[test]
    fn test_derived_mapper_names_target_type() {
        let mapper = Mapper::<u32>::new(&Layout::U32).unwrap();
        let wrapped = mapper.map(Some, |v: &Option<u32>| v.unwrap_or(0));
        assert_eq!(wrapped.type_name(), "Option<u32>");
        assert_eq!(mapper.type_name(), "u32");
    }
}
