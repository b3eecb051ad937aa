//! Well-known types with prebuilt accessors.
//!
//! Some types are not records but still have an obvious binary form. The registry maps their
//! `TypeId` to a fixed layout and a hand-written accessor. When the compiler meets such a
//! type, the member layout must equal the registered one (names aside), otherwise the
//! mapping is refused.
//!
//! The standard registry, shared process-wide through [`Registry::global`], knows:
//!
//! | type | layout |
//! |---|---|
//! | `std::time::Duration` | `[u64(secs) u32(nanos)]` |
//! | `std::time::SystemTime` | `[i64(secs) u32(nanos)]`, relative to the Unix epoch |

use std::any::{Any, TypeId};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use lamina::{transform, ByteOrder, Layout, LayoutResult};

use crate::accessor::Accessor;
use crate::compile::{Compiler, Mappable};
use crate::desc::{TypeDesc, TypeKind};
use crate::error::{AccessError, MappingError, MappingResult};

const NANOS_PER_SEC: u32 = 1_000_000_000;

struct Entry {
    type_name: &'static str,
    layout: Layout,
    bare: Layout,
    accessor: Box<dyn Any + Send + Sync>,
}

/// Result of asking the registry about a type and a layout.
pub enum Lookup<'r, T> {
    Match(Accessor<T>),
    /// The type is registered with this other layout.
    Mismatch(&'r Layout),
}

#[derive(Default)]
pub struct Registry {
    entries: HashMap<TypeId, Entry>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the standard entries.
    pub fn standard() -> Self {
        let mut registry = Registry::empty();
        let duration = Layout::structure([Layout::U64.with_name("secs"), Layout::U32.with_name("nanos")]);
        let system_time =
            Layout::structure([Layout::I64.with_name("secs"), Layout::U32.with_name("nanos")]);
        // Both layouts are fixed and valid.
        if let Ok(layout) = duration {
            registry.insert("Duration", layout, duration_accessor());
        }
        if let Ok(layout) = system_time {
            registry.insert("SystemTime", layout, system_time_accessor());
        }
        registry
    }

    /// The process-wide standard registry, built on first use.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::standard)
    }

    /// Registers (or replaces) the accessor of `T` over `layout`.
    pub fn register<T: Send + Sync + 'static>(
        &mut self,
        type_name: &'static str,
        layout: Layout,
        accessor: Accessor<T>,
    ) -> LayoutResult<()> {
        let bare = transform::without_names(&layout)?;
        self.entries.insert(
            TypeId::of::<T>(),
            Entry { type_name, layout, bare, accessor: Box::new(accessor) },
        );
        Ok(())
    }

    fn insert<T: Send + Sync + 'static>(
        &mut self,
        type_name: &'static str,
        layout: Layout,
        accessor: Accessor<T>,
    ) {
        if let Err(err) = self.register(type_name, layout, accessor) {
            tracing::warn!(type_name, error = %err, "skipping registry entry");
        }
    }

    pub fn layout_of<T: 'static>(&self) -> Option<&Layout> {
        self.entries.get(&TypeId::of::<T>()).map(|e| &e.layout)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.values().map(|e| e.type_name)
    }

    pub fn lookup<T: 'static>(&self, layout: &Layout) -> Option<Lookup<'_, T>> {
        let entry = self.entries.get(&TypeId::of::<T>())?;
        let matches = transform::without_names(layout).map(|bare| bare == entry.bare).unwrap_or(false);
        if !matches {
            return Some(Lookup::Mismatch(&entry.layout));
        }
        entry.accessor.downcast_ref::<Accessor<T>>().map(|a| Lookup::Match(a.clone()))
    }
}

fn invalid(type_name: &str, reason: impl Into<String>) -> AccessError {
    AccessError::InvalidValue { type_name: type_name.to_string(), reason: reason.into() }
}

fn read_nanos(segment: &lamina::Segment, offset: usize, type_name: &str) -> Result<u32, AccessError> {
    let nanos = segment.get::<u32>(offset, ByteOrder::NATIVE)?;
    if nanos >= NANOS_PER_SEC {
        return Err(invalid(type_name, format!("{} nanoseconds is not below one second", nanos)));
    }
    Ok(nanos)
}

fn duration_accessor() -> Accessor<Duration> {
    Accessor::new(
        |segment, offset| {
            let secs = segment.get::<u64>(offset, ByteOrder::NATIVE)?;
            let nanos = read_nanos(segment, offset + 8, "Duration")?;
            Ok(Duration::new(secs, nanos))
        },
        |segment, offset, value| {
            segment.set(offset, ByteOrder::NATIVE, value.as_secs())?;
            segment.set(offset + 8, ByteOrder::NATIVE, value.subsec_nanos())?;
            Ok(())
        },
    )
}

fn system_time_accessor() -> Accessor<SystemTime> {
    Accessor::new(
        |segment, offset| {
            let secs = segment.get::<i64>(offset, ByteOrder::NATIVE)?;
            let nanos = read_nanos(segment, offset + 8, "SystemTime")?;
            let time = if secs >= 0 {
                UNIX_EPOCH.checked_add(Duration::new(secs.unsigned_abs(), nanos))
            } else {
                UNIX_EPOCH
                    .checked_sub(Duration::from_secs(secs.unsigned_abs()))
                    .and_then(|t| t.checked_add(Duration::new(0, nanos)))
            };
            time.ok_or_else(|| invalid("SystemTime", format!("{}s is out of range", secs)))
        },
        |segment, offset, value| {
            let (secs, nanos) = match value.duration_since(UNIX_EPOCH) {
                Ok(after) => (after.as_secs() as i128, after.subsec_nanos()),
                Err(before) => {
                    let before = before.duration();
                    match before.subsec_nanos() {
                        0 => (-(before.as_secs() as i128), 0),
                        n => (-(before.as_secs() as i128) - 1, NANOS_PER_SEC - n),
                    }
                }
            };
            let secs = i64::try_from(secs)
                .map_err(|_| invalid("SystemTime", format!("{}s does not fit i64", secs)))?;
            segment.set(offset, ByteOrder::NATIVE, secs)?;
            segment.set(offset + 8, ByteOrder::NATIVE, nanos)?;
            Ok(())
        },
    )
}

macro_rules! impl_mappable_known {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Mappable for $ty {
                fn describe() -> TypeDesc {
                    TypeDesc::new::<$ty>($name, TypeKind::Known)
                }

                /// Only reached when the registry in use does not know the type.
                fn compile(layout: &Layout, cx: &mut Compiler<'_>) -> MappingResult<Accessor<Self>> {
                    Err(cx.mismatch(&Self::describe(), layout, "type is not registered"))
                }

                fn natural_layout() -> MappingResult<Layout> {
                    Registry::global().layout_of::<$ty>().cloned().ok_or_else(|| {
                        MappingError::NoNaturalLayout {
                            type_name: $name.to_string(),
                            reason: "type is not registered".to_string(),
                        }
                    })
                }
            }
        )*
    };
}

impl_mappable_known!(Duration => "Duration", SystemTime => "SystemTime");

#[cfg(test)]
mod tests {
    use super::*;
    use lamina::Segment;

    #[test]
    fn test_standard_entries() {
        let registry = Registry::global();
        assert!(registry.contains::<Duration>());
        assert!(registry.contains::<SystemTime>());
        assert!(!registry.contains::<u32>());
        let mut names: Vec<_> = registry.type_names().collect();
        names.sort();
        assert_eq!(names, vec!["Duration", "SystemTime"]);
        assert_eq!(registry.layout_of::<Duration>().unwrap().byte_size(), 12);
    }

    #[test]
    fn test_lookup_ignores_names_only() {
        let registry = Registry::standard();
        let renamed = Layout::structure([Layout::U64.with_name("s"), Layout::U32]).unwrap();
        assert!(matches!(registry.lookup::<Duration>(&renamed), Some(Lookup::Match(_))));
        let other = Layout::structure([Layout::U32, Layout::U32]).unwrap();
        assert!(matches!(registry.lookup::<Duration>(&other), Some(Lookup::Mismatch(_))));
        assert!(registry.lookup::<u8>(&Layout::U8).is_none());
    }

    #[test]
    fn test_system_time_before_epoch() {
        let accessor = system_time_accessor();
        let seg = Segment::allocate(16);
        let before = UNIX_EPOCH - Duration::new(5, 250_000_000);
        (accessor.set)(&seg, 0, &before).unwrap();
        assert_eq!(seg.get::<i64>(0, ByteOrder::NATIVE).unwrap(), -6);
        assert_eq!(seg.get::<u32>(8, ByteOrder::NATIVE).unwrap(), 750_000_000);
        assert_eq!((accessor.get)(&seg, 0).unwrap(), before);
    }

    #[test]
    fn test_invalid_nanos() {
        let accessor = duration_accessor();
        let seg = Segment::allocate(16);
        seg.set(8, ByteOrder::NATIVE, NANOS_PER_SEC).unwrap();
        assert!(matches!((accessor.get)(&seg, 0), Err(AccessError::InvalidValue { .. })));
    }

    #[test]
    fn test_unregistered_known_type() {
        let registry = Registry::empty();
        let mut cx = Compiler::new(&registry);
        let layout = Registry::global().layout_of::<Duration>().unwrap().clone();
        assert!(matches!(
            cx.compile::<Duration>(&layout),
            Err(MappingError::TypeMismatch { .. })
        ));
    }
}
