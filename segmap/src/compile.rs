//! The accessor compiler.
//!
//! ## Overview
//!
//! A [`Mappable`] type knows how to compile an [`Accessor`] for itself against one layout
//! node. Compilation is recursive: a record compiles each of its components against the
//! member it was matched with, an array compiles its element against the sequence element,
//! and so on down to scalars.
//!
//! The [`Compiler`] threads shared state through that recursion:
//!
//! - a cache of already compiled `(type, layout)` pairs, so that a type used in several
//!   places of one tree is analysed once,
//! - the stack of types being compiled, to refuse types that contain themselves,
//! - the current site (`Type.component`) for error messages,
//! - the registry of well-known types with prebuilt accessors.
//!
//! ## Modules
//!
//! - [`scalar`]: carriers and `bool`/[`lamina::Address`]
//! - [`array`]: `Vec<E>` and `[E; N]` over (nested) sequences
//! - [`record`]: records over structs and unions

pub mod array;
pub mod record;
pub mod scalar;

use std::any::{Any, TypeId};

use hashbrown::HashMap;
use lamina::Layout;
use tracing::trace;

use crate::accessor::{Accessor, Elements};
use crate::desc::TypeDesc;
use crate::error::{MappingError, MappingResult};
use crate::registry::{Lookup, Registry};

/// A type that can be mapped to and from a layout.
///
/// Implemented for the scalar carriers, `bool`, [`lamina::Address`], `Vec<E>`, `[E; N]`,
/// the registry types, and every type declared with [`crate::record!`] or passed to
/// [`crate::mappable!`].
pub trait Mappable: Sized + Send + Sync + 'static {
    fn describe() -> TypeDesc;

    fn compile(layout: &Layout, cx: &mut Compiler<'_>) -> MappingResult<Accessor<Self>>;

    /// Accessor for runs of `Self` laid out as the elements of a sequence.
    fn compile_elements(element: &Layout, cx: &mut Compiler<'_>) -> MappingResult<Elements<Self>> {
        let accessor = cx.compile::<Self>(element)?;
        Ok(Elements::one_by_one(accessor, element.byte_size()))
    }

    /// The layout this type has when nobody says otherwise.
    fn natural_layout() -> MappingResult<Layout>;
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    type_id: TypeId,
    layout: Layout,
}

struct Site {
    type_name: String,
    component: &'static str,
}

pub struct Compiler<'r> {
    registry: &'r Registry,
    cache: HashMap<CacheKey, Box<dyn Any>>,
    in_progress: Vec<(TypeId, String)>,
    sites: Vec<Site>,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Compiler { registry, cache: HashMap::new(), in_progress: Vec::new(), sites: Vec::new() }
    }

    /// Compiles (or fetches from the cache) the accessor of `T` over `layout`.
    pub fn compile<T: Mappable>(&mut self, layout: &Layout) -> MappingResult<Accessor<T>> {
        let desc = T::describe();
        match self.registry.lookup::<T>(layout) {
            Some(Lookup::Match(accessor)) => {
                trace!(type_name = %desc, layout = %layout, "registry hit");
                return Ok(accessor);
            }
            Some(Lookup::Mismatch(registered)) => {
                let reason = format!("registered layout is {}", registered);
                return Err(self.mismatch(&desc, layout, reason));
            }
            None => {}
        }

        let key = CacheKey { type_id: desc.id, layout: layout.without_name() };
        if let Some(accessor) = self.cache.get(&key).and_then(|a| a.downcast_ref::<Accessor<T>>())
        {
            trace!(type_name = %desc, layout = %layout, "compile cache hit");
            return Ok(accessor.clone());
        }

        if let Some(start) = self.in_progress.iter().position(|(id, _)| *id == desc.id) {
            let mut via: Vec<&str> =
                self.in_progress[start..].iter().map(|(_, name)| name.as_str()).collect();
            via.push(&desc.name);
            return Err(MappingError::SelfReference {
                type_name: desc.name.clone(),
                via: via.join(" -> "),
            });
        }

        self.in_progress.push((desc.id, desc.name.clone()));
        let compiled = T::compile(layout, self);
        self.in_progress.pop();

        let accessor = compiled?;
        self.cache.insert(key, Box::new(accessor.clone()));
        Ok(accessor)
    }

    /// Runs `f` with `type_name.component` as the site named by errors.
    pub fn within<R>(
        &mut self,
        type_name: &str,
        component: &'static str,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.sites.push(Site { type_name: type_name.to_string(), component });
        let result = f(self);
        self.sites.pop();
        result
    }

    /// Where an error about `desc` happened: the enclosing component, or the type itself.
    pub fn site(&self, desc: &TypeDesc) -> String {
        match self.sites.last() {
            Some(Site { type_name, component }) => format!("{}.{}", type_name, component),
            None => desc.name.clone(),
        }
    }

    pub fn mismatch(
        &self,
        desc: &TypeDesc,
        layout: &Layout,
        reason: impl Into<String>,
    ) -> MappingError {
        MappingError::TypeMismatch {
            site: self.site(desc),
            declared: desc.name.clone(),
            layout: layout.to_string(),
            reason: reason.into(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }
}
