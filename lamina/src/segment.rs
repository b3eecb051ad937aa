//! Segments: shared, bounds-checked byte storage that layouts are applied to.
//!
//! A [`Segment`] is a cheap handle (`Arc` + window) onto a block of bytes. Every byte is an
//! `AtomicU8`, so handles can be cloned into several threads and read or written
//! concurrently without undefined behaviour. Plain accesses are relaxed; callers that need
//! cross-thread visibility of a multi-byte record pair [`Segment::fence_release`] on the
//! writing side with [`Segment::fence_acquire`] on the reading side, both on the same
//! sentinel byte.
//!
//! Multi-byte values are assembled from individual bytes and may tear under concurrent
//! writes. The fences order accesses, they do not make them atomic.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::SegmentError;
use crate::layout::{ByteOrder, Carrier, Layout};

const MAX_SCALAR: usize = 8;

// ============================================================================
// Scalars
// ============================================================================

/// A Rust type stored as exactly one [`Carrier`].
pub trait Scalar: Copy + Send + Sync + 'static {
    const CARRIER: Carrier;
    const SIZE: usize = Self::CARRIER.byte_size();

    /// Decode from exactly `SIZE` bytes.
    fn decode(bytes: &[u8], order: ByteOrder) -> Self;

    /// Encode into exactly `SIZE` bytes.
    fn encode(self, order: ByteOrder, out: &mut [u8]);
}

macro_rules! impl_scalar_num {
    ($($ty:ty => $carrier:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const CARRIER: Carrier = Carrier::$carrier;

                fn decode(bytes: &[u8], order: ByteOrder) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    match order {
                        ByteOrder::Little => <$ty>::from_le_bytes(raw),
                        ByteOrder::Big => <$ty>::from_be_bytes(raw),
                    }
                }

                fn encode(self, order: ByteOrder, out: &mut [u8]) {
                    let raw = match order {
                        ByteOrder::Little => self.to_le_bytes(),
                        ByteOrder::Big => self.to_be_bytes(),
                    };
                    out.copy_from_slice(&raw);
                }
            }
        )*
    };
}

impl_scalar_num!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

/// Any non-zero byte reads as `true`; `true` is written as 1.
impl Scalar for bool {
    const CARRIER: Carrier = Carrier::Bool;

    fn decode(bytes: &[u8], _order: ByteOrder) -> Self {
        bytes[0] != 0
    }

    fn encode(self, _order: ByteOrder, out: &mut [u8]) {
        out[0] = self as u8;
    }
}

/// An opaque 64-bit address. Never dereferenced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl Scalar for Address {
    const CARRIER: Carrier = Carrier::Address;

    fn decode(bytes: &[u8], order: ByteOrder) -> Self {
        Address(u64::decode(bytes, order))
    }

    fn encode(self, order: ByteOrder, out: &mut [u8]) {
        self.0.encode(order, out)
    }
}

// ============================================================================
// Segment
// ============================================================================

#[derive(Clone)]
pub struct Segment {
    bytes: Arc<[AtomicU8]>,
    base: usize,
    len: usize,
}

impl Segment {
    /// A zeroed segment of `len` bytes.
    pub fn allocate(len: usize) -> Segment {
        let bytes: Arc<[AtomicU8]> = (0..len).map(|_| AtomicU8::new(0)).collect();
        Segment { bytes, base: 0, len }
    }

    /// A zeroed segment large enough for one instance of `layout`.
    pub fn for_layout(layout: &Layout) -> Segment {
        Self::allocate(layout.byte_size())
    }

    pub fn from_bytes(data: &[u8]) -> Segment {
        let bytes: Arc<[AtomicU8]> = data.iter().map(|b| AtomicU8::new(*b)).collect();
        Segment { bytes, base: 0, len: data.len() }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn range(&self, offset: usize, size: usize) -> Result<Range<usize>, SegmentError> {
        match offset.checked_add(size) {
            Some(end) if end <= self.len => Ok(self.base + offset..self.base + end),
            _ => Err(SegmentError::OutOfBounds { offset, size, len: self.len }),
        }
    }

    pub fn check_bounds(&self, offset: usize, size: usize) -> Result<(), SegmentError> {
        self.range(offset, size).map(|_| ())
    }

    /// Bounds check plus alignment of `offset`, measured from the start of the
    /// underlying allocation so that slices keep the alignment of their parent.
    pub fn check_access(
        &self,
        offset: usize,
        size: usize,
        alignment: usize,
    ) -> Result<(), SegmentError> {
        self.check_bounds(offset, size)?;
        if (self.base + offset) % alignment != 0 {
            return Err(SegmentError::Misaligned { offset, alignment });
        }
        Ok(())
    }

    /// A window of `len` bytes starting at `offset`. Shares storage with `self`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Segment, SegmentError> {
        let range = self.range(offset, len)?;
        Ok(Segment { bytes: self.bytes.clone(), base: range.start, len })
    }

    pub fn slice_from(&self, offset: usize) -> Result<Segment, SegmentError> {
        let len = self.len.checked_sub(offset).ok_or(SegmentError::OutOfBounds {
            offset,
            size: 0,
            len: self.len,
        })?;
        self.slice(offset, len)
    }

    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) -> Result<(), SegmentError> {
        let range = self.range(offset, out.len())?;
        for (dst, src) in out.iter_mut().zip(self.bytes[range].iter()) {
            *dst = src.load(Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<(), SegmentError> {
        let range = self.range(offset, data.len())?;
        for (dst, src) in self.bytes[range].iter().zip(data.iter()) {
            dst.store(*src, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn get<S: Scalar>(&self, offset: usize, order: ByteOrder) -> Result<S, SegmentError> {
        let mut raw = [0u8; MAX_SCALAR];
        let buf = &mut raw[..S::SIZE];
        self.read_bytes(offset, buf)?;
        Ok(S::decode(buf, order))
    }

    pub fn set<S: Scalar>(
        &self,
        offset: usize,
        order: ByteOrder,
        value: S,
    ) -> Result<(), SegmentError> {
        let mut raw = [0u8; MAX_SCALAR];
        let buf = &mut raw[..S::SIZE];
        value.encode(order, buf);
        self.write_bytes(offset, buf)
    }

    /// Bulk read of `out.len()` consecutive scalars starting at `offset`.
    pub fn copy_to<S: Scalar>(
        &self,
        offset: usize,
        order: ByteOrder,
        out: &mut [S],
    ) -> Result<(), SegmentError> {
        let size = bulk_size::<S>(offset, out.len(), self.len)?;
        let range = self.range(offset, size)?;
        let mut raw = [0u8; MAX_SCALAR];
        for (slot, chunk) in out.iter_mut().zip(self.bytes[range].chunks_exact(S::SIZE)) {
            for (dst, src) in raw.iter_mut().zip(chunk.iter()) {
                *dst = src.load(Ordering::Relaxed);
            }
            *slot = S::decode(&raw[..S::SIZE], order);
        }
        Ok(())
    }

    /// Bulk write of consecutive scalars starting at `offset`.
    pub fn copy_from<S: Scalar>(
        &self,
        offset: usize,
        order: ByteOrder,
        values: &[S],
    ) -> Result<(), SegmentError> {
        let size = bulk_size::<S>(offset, values.len(), self.len)?;
        let range = self.range(offset, size)?;
        let mut raw = [0u8; MAX_SCALAR];
        for (value, chunk) in values.iter().zip(self.bytes[range].chunks_exact(S::SIZE)) {
            value.encode(order, &mut raw[..S::SIZE]);
            for (dst, src) in chunk.iter().zip(raw.iter()) {
                dst.store(*src, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Acquire load of the byte at `offset`. Pairs with [`Segment::fence_release`].
    pub fn fence_acquire(&self, offset: usize) -> Result<u8, SegmentError> {
        let range = self.range(offset, 1)?;
        Ok(self.bytes[range.start].load(Ordering::Acquire))
    }

    /// Release store of the byte at `offset` with its current value, publishing every
    /// earlier write of this thread to threads that acquire the same byte.
    pub fn fence_release(&self, offset: usize) -> Result<(), SegmentError> {
        let range = self.range(offset, 1)?;
        let byte = &self.bytes[range.start];
        byte.store(byte.load(Ordering::Relaxed), Ordering::Release);
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes[self.base..self.base + self.len]
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }
}

fn bulk_size<S: Scalar>(offset: usize, count: usize, len: usize) -> Result<usize, SegmentError> {
    count.checked_mul(S::SIZE).ok_or(SegmentError::OutOfBounds { offset, size: usize::MAX, len })
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment").field("base", &self.base).field("len", &self.len).finish()
    }
}
