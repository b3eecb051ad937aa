//! Compiled access procedures.
//!
//! Every procedure takes the segment and the *base* offset of the value it decodes; nested
//! procedures capture their member's delta and add it at call time, so one compiled
//! accessor serves any position in any segment.

use std::fmt;
use std::sync::Arc;

use lamina::Segment;

use crate::error::AccessResult;

pub type Getter<T> = Arc<dyn Fn(&Segment, usize) -> AccessResult<T> + Send + Sync>;
pub type Setter<T> = Arc<dyn Fn(&Segment, usize, &T) -> AccessResult<()> + Send + Sync>;

/// Writes one component into a value that is being assembled.
pub type Fill<T> = Arc<dyn Fn(&Segment, usize, &mut T) -> AccessResult<()> + Send + Sync>;

pub struct Accessor<T> {
    pub get: Getter<T>,
    pub set: Setter<T>,
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Accessor { get: self.get.clone(), set: self.set.clone() }
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor").finish_non_exhaustive()
    }
}

impl<T: 'static> Accessor<T> {
    pub fn new(
        get: impl Fn(&Segment, usize) -> AccessResult<T> + Send + Sync + 'static,
        set: impl Fn(&Segment, usize, &T) -> AccessResult<()> + Send + Sync + 'static,
    ) -> Self {
        Accessor { get: Arc::new(get), set: Arc::new(set) }
    }

    /// The same accessor applied `delta` bytes further into the segment.
    pub fn at(&self, delta: usize) -> Accessor<T> {
        if delta == 0 {
            return self.clone();
        }
        let (get, set) = (self.get.clone(), self.set.clone());
        Accessor::new(
            move |segment, offset| get(segment, offset + delta),
            move |segment, offset, value| set(segment, offset + delta, value),
        )
    }
}

/// Runs of consecutive elements: `(segment, offset, count)` for reads, a slice for writes.
pub struct Elements<E> {
    pub read: Arc<dyn Fn(&Segment, usize, usize) -> AccessResult<Vec<E>> + Send + Sync>,
    pub write: Arc<dyn Fn(&Segment, usize, &[E]) -> AccessResult<()> + Send + Sync>,
}

impl<E> Clone for Elements<E> {
    fn clone(&self) -> Self {
        Elements { read: self.read.clone(), write: self.write.clone() }
    }
}

impl<E> fmt::Debug for Elements<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elements").finish_non_exhaustive()
    }
}

impl<E: 'static> Elements<E> {
    pub fn new(
        read: impl Fn(&Segment, usize, usize) -> AccessResult<Vec<E>> + Send + Sync + 'static,
        write: impl Fn(&Segment, usize, &[E]) -> AccessResult<()> + Send + Sync + 'static,
    ) -> Self {
        Elements { read: Arc::new(read), write: Arc::new(write) }
    }

    /// Elements decoded one by one through `element`, `stride` bytes apart.
    pub fn one_by_one(element: Accessor<E>, stride: usize) -> Self {
        let Accessor { get, set } = element;
        Elements::new(
            move |segment, offset, count| {
                (0..count).map(|ix| get(segment, offset + ix * stride)).collect()
            },
            move |segment, offset, values| {
                for (ix, value) in values.iter().enumerate() {
                    set(segment, offset + ix * stride, value)?;
                }
                Ok(())
            },
        )
    }
}
