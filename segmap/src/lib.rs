//! Segmap: typed views over binary layouts.
//!
//! Given a Rust type and a [`lamina::Layout`], segmap builds a [`Mapper`] that reads values
//! of the type out of a [`lamina::Segment`] and writes them back, following the offsets,
//! byte orders and alignments the layout prescribes.
//!
//! ```ignore
//! segmap::record! {
//!     #[derive(Debug, PartialEq)]
//!     pub struct Point { pub x: i32, pub y: i32 }
//! }
//!
//! let layout = Layout::structure([Layout::I32.with_name("x"), Layout::I32.with_name("y")])?;
//! let mapper = Mapper::<Point>::new(&layout)?;
//! let point = mapper.get_at_index(&segment, 1)?;
//! ```
//!
//! Building a mapper runs three phases once:
//!
//! 1. [`introspect`]: the type's [`Shape`] lists its named components,
//! 2. [`matcher`]: each component is paired with the group member of the same name,
//! 3. [`compile`]: get and set procedures are composed bottom-up.
//!
//! [`Views`] run the same phases but keep one accessor per component, for records that stay
//! attached to their segment.
//!
//! Every structural problem surfaces as a [`MappingError`] at that point. Calls on the
//! built mapper only fail with an [`AccessError`] (bounds, alignment, read-only, lengths).

pub use lamina;

pub mod accessor;
pub mod compile;
pub mod desc;
pub mod error;
pub mod introspect;
mod macros;
pub mod mapper;
pub mod matcher;
pub mod natural;
pub mod registry;
pub mod view;

pub use accessor::{Accessor, Elements};
pub use compile::{Compiler, Mappable};
pub use desc::{TypeDesc, TypeKind};
pub use error::{AccessError, AccessResult, MappingError, MappingResult};
pub use introspect::{Component, Fields, Record, Shape};
pub use mapper::{Mapper, MapperBuilder, Stream};
pub use natural::natural_layout;
pub use registry::Registry;
pub use view::{View, Views};
