//! Segment-backed views of records.
//!
//! A [`Mapper`] decodes a whole value at once. A [`View`] instead stays attached to the
//! segment: every [`View::get`] reads the component from the bytes as they are now, and
//! every [`View::set`] writes straight through. This is the natural way to work with
//! property-style records, whose setters then act on the segment rather than on a copy.
//!
//! ```ignore
//! let views = Views::<Sensor>::new(&layout)?;
//! let sensor = views.at(&segment, 0)?;
//! sensor.set("reading", &21.5f32)?;
//! assert_eq!(segment.get::<f32>(4, ByteOrder::NATIVE)?, 21.5);
//! ```
//!
//! Field components and properties without a setter are read-only through a view.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use lamina::{Layout, Segment};

use crate::accessor::{Getter, Setter};
use crate::compile::{record, Compiler, Mappable};
use crate::desc::TypeDesc;
use crate::error::{AccessError, AccessResult, MappingResult};
use crate::introspect::{ErasedGetter, ErasedSetter, Record};
use crate::mapper::Mapper;
use crate::registry::Registry;

struct Slot {
    declared: TypeDesc,
    read: ErasedGetter,
    write: Option<ErasedSetter>,
}

/// Compiled per-component accessors of `T` over one layout. Produces [`View`]s.
pub struct Views<T> {
    mapper: Mapper<T>,
    slots: Arc<IndexMap<&'static str, Slot>>,
}

impl<T> Clone for Views<T> {
    fn clone(&self) -> Self {
        Views { mapper: self.mapper.clone(), slots: self.slots.clone() }
    }
}

impl<T: Record + Mappable> Views<T> {
    /// Views of `T` over `layout`, using the global registry.
    pub fn new(layout: &Layout) -> MappingResult<Views<T>> {
        Views::with_registry(layout, Registry::global())
    }

    pub fn with_registry(layout: &Layout, registry: &Registry) -> MappingResult<Views<T>> {
        let mapper = Mapper::<T>::builder(layout).registry(registry).build()?;
        let mut cx = Compiler::new(registry);
        let (components, bound) = record::bind::<T>(layout, &mut cx)?;
        let slots = bound
            .into_iter()
            .map(|(name, b)| {
                let declared = components.by_name[name].declared().clone();
                (name, Slot { declared, read: b.read, write: b.write })
            })
            .collect();
        Ok(Views { mapper, slots: Arc::new(slots) })
    }
}

impl<T: 'static> Views<T> {
    pub fn layout(&self) -> &Layout {
        self.mapper.layout()
    }

    /// Component names in declaration order.
    pub fn components(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }

    /// The view of the value at `offset`. Bounds and alignment are checked once, here.
    pub fn at(&self, segment: &Segment, offset: usize) -> AccessResult<View<T>> {
        self.mapper.check(segment, offset)?;
        Ok(View { segment: segment.clone(), offset, views: self.clone() })
    }

    pub fn at_index(&self, segment: &Segment, index: usize) -> AccessResult<View<T>> {
        self.at(segment, self.mapper.index_offset(segment, index)?)
    }
}

/// One record living in a segment.
pub struct View<T> {
    segment: Segment,
    offset: usize,
    views: Views<T>,
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        View { segment: self.segment.clone(), offset: self.offset, views: self.views.clone() }
    }
}

impl<T: 'static> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("type_name", &self.views.mapper.type_name())
            .field("offset", &self.offset)
            .field("len", &self.segment.len())
            .finish()
    }
}

impl<T: 'static> View<T> {
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn slot(&self, name: &str) -> AccessResult<&Slot> {
        let slot = self.views.slots.get(name).ok_or_else(|| AccessError::NoSuchComponent {
            type_name: self.views.mapper.type_name().to_string(),
            component: name.to_string(),
        })?;
        Ok(slot)
    }

    fn type_error<F: Mappable>(&self, name: &str, slot: &Slot) -> AccessError {
        AccessError::ComponentType {
            site: format!("{}.{}", self.views.mapper.type_name(), name),
            declared: slot.declared.name.clone(),
            requested: F::describe().name,
        }
    }

    /// Reads component `name`, declared as `F`, from the segment.
    pub fn get<F: Mappable>(&self, name: &str) -> AccessResult<F> {
        let slot = self.slot(name)?;
        let read = slot
            .read
            .downcast_ref::<Getter<F>>()
            .ok_or_else(|| self.type_error::<F>(name, slot))?;
        read(&self.segment, self.offset)
    }

    /// Writes component `name` to the segment. Fails with [`AccessError::ReadOnly`] for fields
    /// and for properties without a setter.
    pub fn set<F: Mappable>(&self, name: &str, value: &F) -> AccessResult<()> {
        let slot = self.slot(name)?;
        let write = slot.write.as_ref().ok_or_else(|| AccessError::ReadOnly {
            type_name: format!("{}.{}", self.views.mapper.type_name(), name),
        })?;
        let write = write
            .downcast_ref::<Setter<F>>()
            .ok_or_else(|| self.type_error::<F>(name, slot))?;
        write(&self.segment, self.offset, value)
    }

    /// Decodes the whole record.
    pub fn load(&self) -> AccessResult<T> {
        self.views.mapper.get(&self.segment, self.offset)
    }

    /// Writes every component of `value`, read-only properties included.
    pub fn store(&self, value: &T) -> AccessResult<()> {
        self.views.mapper.set(&self.segment, self.offset, value)
    }
}
