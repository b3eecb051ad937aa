//! Record introspection: the ordered, named, typed components of a structured type.
//!
//! Rust has no runtime reflection, so a record describes itself once through
//! [`Record::shape`]. Two styles are supported:
//!
//! - **Fields**: immutable aggregates. Every component has a read accessor, and values are
//!   built by a constructor that takes the decoded components positionally from [`Fields`].
//!   This is what [`crate::record!`] generates.
//! - **Properties**: values are created empty and filled through setter functions; reading a
//!   value back goes through getter functions. Properties without a setter are read-only:
//!   they are written to segments but left at their initial value when decoding.
//!   Property types are usually accessed through a [`crate::view::View`] instead, which
//!   reads and writes each property in the segment on every call.
//!
//! ```ignore
//! impl Record for Sensor {
//!     fn shape() -> Shape<Self> {
//!         Shape::properties("Sensor", Sensor::default)
//!             .property("id", |s: &Sensor| s.id(), Some(Sensor::set_id))
//!             .property("reading", |s: &Sensor| s.reading(), Some(Sensor::set_reading))
//!     }
//! }
//! segmap::mappable!(Sensor);
//! ```
//!
//! Components keep the order in which the shape declares them. That order is the mapping
//! order for writes and the positional order of [`Fields::take`].

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use lamina::{Layout, Segment};

use crate::accessor::{Fill, Getter, Setter};
use crate::compile::{Compiler, Mappable};
use crate::desc::TypeDesc;
use crate::error::{AccessError, AccessResult, MappingError, MappingResult};

/// A type that exposes its components for mapping.
pub trait Record: Sized + Send + Sync + 'static {
    fn shape() -> Shape<Self>;
}

pub type Construct<T> = fn(&mut Fields<'_>) -> AccessResult<T>;

pub enum Style<T> {
    Fields(Construct<T>),
    Properties(fn() -> T),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    Field,
    Property { writable: bool },
}

/// The declared components of a record, before validation.
pub struct Shape<T> {
    name: &'static str,
    style: Style<T>,
    components: Vec<Component<T>>,
    type_parameters: Vec<&'static str>,
}

impl<T: Record> Shape<T> {
    /// A field-based record built by `construct`.
    pub fn fields(name: &'static str, construct: Construct<T>) -> Self {
        Shape {
            name,
            style: Style::Fields(construct),
            components: Vec::new(),
            type_parameters: Vec::new(),
        }
    }

    /// A property-based record created empty by `create`.
    pub fn properties(name: &'static str, create: fn() -> T) -> Self {
        Shape {
            name,
            style: Style::Properties(create),
            components: Vec::new(),
            type_parameters: Vec::new(),
        }
    }

    pub fn field<F: Mappable>(mut self, name: &'static str, read: fn(&T) -> &F) -> Self {
        self.push(name, ComponentKind::Field, Box::new(FieldBinding { read }));
        self
    }

    pub fn property<F: Mappable>(
        mut self,
        name: &'static str,
        read: fn(&T) -> F,
        write: Option<fn(&mut T, F)>,
    ) -> Self {
        let kind = ComponentKind::Property { writable: write.is_some() };
        self.push(name, kind, Box::new(PropertyBinding { read, write }));
        self
    }

    /// Declares a type parameter the record is generic over. Generic records cannot be
    /// mapped; see [`MappingError::GenericType`].
    pub fn type_parameter(mut self, name: &'static str) -> Self {
        self.type_parameters.push(name);
        self
    }

    fn push(&mut self, name: &'static str, kind: ComponentKind, binding: Box<dyn Bind<T>>) {
        let position = self.components.len();
        let declared = binding.declared();
        self.components.push(Component { name, declared, kind, position, binding });
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks the shape and indexes its components by name.
    pub fn validate(self) -> MappingResult<Components<T>> {
        let type_name = self.name.to_string();
        if !self.type_parameters.is_empty() {
            return Err(MappingError::GenericType {
                type_name,
                parameters: self.type_parameters.iter().map(|p| p.to_string()).collect(),
            });
        }
        if self.components.is_empty() {
            return Err(MappingError::EmptyComponentSet { type_name });
        }
        let mut by_name = IndexMap::with_capacity(self.components.len());
        for component in self.components {
            if component.declared.leaf().id == TypeId::of::<T>() {
                return Err(MappingError::SelfReference {
                    type_name: type_name.clone(),
                    via: format!("{}.{}: {}", type_name, component.name, component.declared),
                });
            }
            let name = component.name;
            if by_name.insert(name, component).is_some() {
                return Err(MappingError::DuplicateComponent {
                    type_name,
                    component: name.to_string(),
                });
            }
        }
        Ok(Components { name: self.name, style: self.style, by_name })
    }
}

/// A validated component set, in declaration order.
pub struct Components<T> {
    pub name: &'static str,
    pub style: Style<T>,
    pub by_name: IndexMap<&'static str, Component<T>>,
}

impl<T> fmt::Debug for Components<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Components")
            .field("name", &self.name)
            .field("components", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> Components<T> {
    pub fn iter(&self) -> impl Iterator<Item = &Component<T>> + '_ {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

pub struct Component<T> {
    name: &'static str,
    declared: TypeDesc,
    kind: ComponentKind,
    position: usize,
    binding: Box<dyn Bind<T>>,
}

impl<T> Component<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declared(&self) -> &TypeDesc {
        &self.declared
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Compiles this component against the member found at `delta` inside the record.
    pub fn bind(
        &self,
        member: &Layout,
        delta: usize,
        cx: &mut Compiler<'_>,
    ) -> MappingResult<Bound<T>> {
        self.binding.bind(member, delta, cx)
    }

    /// Natural layout of the declared type, named after the component.
    pub fn natural_layout(&self) -> MappingResult<Layout> {
        Ok(self.binding.natural_layout()?.with_name(self.name))
    }
}

/// Type-erased `Getter<F>`; [`Fields::take`] recovers it.
pub type ErasedGetter = Box<dyn Any + Send + Sync>;

/// Type-erased `Setter<F>` of a writable property.
pub type ErasedSetter = Box<dyn Any + Send + Sync>;

/// A component compiled against its member.
pub struct Bound<T> {
    /// `Getter<F>` for the declared type `F`, already shifted to the member.
    pub read: ErasedGetter,
    /// Writes the decoded component into a value under construction (writable properties).
    pub fill: Option<Fill<T>>,
    /// Writes the component of a value to the segment.
    pub store: Setter<T>,
    /// `Setter<F>` shifted to the member, for writable properties only.
    pub write: Option<ErasedSetter>,
}

trait Bind<T>: Send + Sync {
    fn declared(&self) -> TypeDesc;
    fn bind(&self, member: &Layout, delta: usize, cx: &mut Compiler<'_>) -> MappingResult<Bound<T>>;
    fn natural_layout(&self) -> MappingResult<Layout>;
}

struct FieldBinding<T, F> {
    read: fn(&T) -> &F,
}

impl<T: Record, F: Mappable> Bind<T> for FieldBinding<T, F> {
    fn declared(&self) -> TypeDesc {
        F::describe()
    }

    fn bind(
        &self,
        member: &Layout,
        delta: usize,
        cx: &mut Compiler<'_>,
    ) -> MappingResult<Bound<T>> {
        let inner = cx.compile::<F>(member)?.at(delta);
        let read = self.read;
        let set = inner.set;
        let store: Setter<T> = Arc::new(move |segment: &Segment, offset: usize, value: &T| {
            set(segment, offset, read(value))
        });
        Ok(Bound { read: Box::new(inner.get), fill: None, store, write: None })
    }

    fn natural_layout(&self) -> MappingResult<Layout> {
        F::natural_layout()
    }
}

struct PropertyBinding<T, F> {
    read: fn(&T) -> F,
    write: Option<fn(&mut T, F)>,
}

impl<T: Record, F: Mappable> Bind<T> for PropertyBinding<T, F> {
    fn declared(&self) -> TypeDesc {
        F::describe()
    }

    fn bind(
        &self,
        member: &Layout,
        delta: usize,
        cx: &mut Compiler<'_>,
    ) -> MappingResult<Bound<T>> {
        let inner = cx.compile::<F>(member)?.at(delta);
        let fill = self.write.map(|write| {
            let get = inner.get.clone();
            let fill: Fill<T> =
                Arc::new(move |segment: &Segment, offset: usize, target: &mut T| -> AccessResult<()> {
                    write(target, get(segment, offset)?);
                    Ok(())
                });
            fill
        });
        let write = self.write.map(|_| Box::new(inner.set.clone()) as ErasedSetter);
        let read = self.read;
        let set = inner.set;
        let store: Setter<T> = Arc::new(move |segment: &Segment, offset: usize, value: &T| {
            set(segment, offset, &read(value))
        });
        Ok(Bound { read: Box::new(inner.get), fill, store, write })
    }

    fn natural_layout(&self) -> MappingResult<Layout> {
        F::natural_layout()
    }
}

/// Positional access to the decoded components of a field-based record.
pub struct Fields<'a> {
    segment: &'a Segment,
    offset: usize,
    reads: &'a [ErasedGetter],
    next: usize,
    type_name: &'a str,
}

impl<'a> Fields<'a> {
    pub fn new(
        segment: &'a Segment,
        offset: usize,
        reads: &'a [ErasedGetter],
        type_name: &'a str,
    ) -> Self {
        Fields { segment, offset, reads, next: 0, type_name }
    }

    /// Decodes the next component, which must have been declared with type `F`.
    pub fn take<F: Mappable>(&mut self) -> AccessResult<F> {
        let position = self.next;
        self.next += 1;
        let getter = self
            .reads
            .get(position)
            .and_then(|read| read.downcast_ref::<Getter<F>>())
            .ok_or_else(|| AccessError::ShapeMismatch {
                type_name: self.type_name.to_string(),
                position,
            })?;
        getter(self.segment, self.offset)
    }
}
