//! Generation-checked object handles
//!
//! Sources and buffers live in fixed-capacity arenas. A handle is an
//! `(index, generation)` pair; freeing a slot bumps its generation so any
//! handle still pointing at it is detected as stale instead of aliasing the
//! next occupant.
//!
//! Raw form (`u64`), used at untyped boundaries:
//!
//! ```text
//!  63      56 55              32 31                 0
//! +----------+------------------+--------------------+
//! | kind tag |    generation    |       index        |
//! +----------+------------------+--------------------+
//! ```
//!
//! Raw `0` is the null handle. A source handle decoded as a buffer handle
//! (or vice versa) fails on the kind tag.

use std::fmt;
use std::marker::PhantomData;

/// Generations are stored in 24 bits of the raw handle
const GENERATION_MASK: u32 = 0x00ff_ffff;

/// Common interface of the typed handles
pub trait Handle: Copy + Eq + fmt::Debug {
    /// Kind tag stored in the top byte of the raw form
    const TAG: u8;

    fn new(index: u32, generation: u32) -> Self;
    fn index(self) -> u32;
    fn generation(self) -> u32;

    /// Encode as a raw, kind-tagged integer
    fn to_raw(self) -> u64 {
        ((Self::TAG as u64) << 56)
            | (((self.generation() & GENERATION_MASK) as u64) << 32)
            | self.index() as u64
    }

    /// Decode a raw integer, `None` for null or a foreign kind tag
    fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 || (raw >> 56) as u8 != Self::TAG {
            return None;
        }
        let generation = ((raw >> 32) as u32) & GENERATION_MASK;
        Some(Self::new(raw as u32, generation))
    }
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $tag:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl Handle for $name {
            const TAG: u8 = $tag;

            #[inline]
            fn new(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline]
            fn index(self) -> u32 {
                self.index
            }

            #[inline]
            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}v{})", stringify!($name), self.index, self.generation)
            }
        }
    };
}

define_handle!(
    /// Handle to a playback source
    SourceId,
    b'S'
);

define_handle!(
    /// Handle to a PCM buffer
    BufferId,
    b'B'
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity slot map
///
/// Slot storage is reserved up front, so inserting never reallocates and
/// references handed to the render path stay put for the arena's lifetime.
pub(crate) struct Arena<H: Handle, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    capacity: usize,
    len: usize,
    _handle: PhantomData<H>,
}

impl<H: Handle, T> Arena<H, T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            capacity,
            len: 0,
            _handle: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Free slots left
    pub fn available(&self) -> usize {
        self.capacity - self.len
    }

    /// Store `value`, `None` when the arena is full
    pub fn insert(&mut self, value: T) -> Option<H> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
            None => return None,
        };

        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.len += 1;
        Some(H::new(index, slot.generation))
    }

    /// Remove and return the value behind `handle`
    pub fn remove(&mut self, handle: H) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() || slot.value.is_none() {
            return None;
        }

        // generation 0 never appears in a live handle
        slot.generation = match (slot.generation + 1) & GENERATION_MASK {
            0 => 1,
            g => g,
        };
        self.free.push(handle.index());
        self.len -= 1;
        slot.value.take()
    }

    #[inline]
    pub fn get(&self, handle: H) -> Option<&T> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }
}
