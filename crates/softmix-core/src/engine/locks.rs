//! Lock ordering
//!
//! Mixer state sits behind three mutexes: the source table, the buffer
//! table and the active-slot table. Whenever more than one is held they
//! must be taken in that order (source → buffer → active) and released in
//! reverse.
//!
//! The order is encoded in the guard types. Multi-lock guards can only be
//! built by extending a guard that already holds the earlier locks:
//!
//! ```text
//! MixerLocks::sources()  -> SourcesHeld
//!     .with_buffers()    -> SourcesBuffersHeld
//!     .with_active()     -> AllHeld
//! ```
//!
//! `MixerLocks::buffers()` and `MixerLocks::active()` take a single lock and
//! cannot be extended. The types alone don't stop a caller that holds one of
//! those from calling `sources()` next, so every guard also records its lock
//! in a per-thread mask; debug builds panic when a lock is taken while a
//! later one (or the same one) is already held. Guard fields are declared
//! innermost-first so they drop in reverse acquisition order.
//!
//! A poisoned mutex is recovered rather than propagated: every mutation
//! leaves the tables consistent between statements that can panic, and the
//! render path must keep running.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::active::ActiveSlots;
use super::buffer::BufferStore;
use super::source::SourceStore;

const SOURCES: u8 = 0b001;
const BUFFERS: u8 = 0b010;
const ACTIVE: u8 = 0b100;

thread_local! {
    /// Locks held by this thread, one bit per lock in acquisition order
    static HELD: Cell<u8> = const { Cell::new(0) };
}

/// A mutex guard that clears its bit in `HELD` when dropped
pub(crate) struct OrderedGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    bit: u8,
}

impl<T> Deref for OrderedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for OrderedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for OrderedGuard<'_, T> {
    fn drop(&mut self) {
        let bit = self.bit;
        HELD.with(|held| held.set(held.get() & !bit));
    }
}

#[inline]
fn acquire<T>(mutex: &Mutex<T>, bit: u8) -> OrderedGuard<'_, T> {
    HELD.with(|held| {
        let current = held.get();
        debug_assert!(
            current < bit,
            "lock order violated: taking {:#05b} while holding {:#05b}",
            bit,
            current
        );
    });
    let guard = mutex.lock().unwrap_or_else(PoisonError::into_inner);
    HELD.with(|held| held.set(held.get() | bit));
    OrderedGuard { guard, bit }
}

/// The three mutexes guarding mixer state
pub(crate) struct MixerLocks {
    sources: Mutex<SourceStore>,
    buffers: Mutex<BufferStore>,
    active: Mutex<ActiveSlots>,
}

impl MixerLocks {
    pub fn new(sources: SourceStore, buffers: BufferStore, active: ActiveSlots) -> Self {
        Self {
            sources: Mutex::new(sources),
            buffers: Mutex::new(buffers),
            active: Mutex::new(active),
        }
    }

    /// Take the source lock; the head of every multi-lock chain
    pub fn sources(&self) -> SourcesHeld<'_> {
        SourcesHeld {
            locks: self,
            sources: acquire(&self.sources, SOURCES),
        }
    }

    /// Take the buffer lock alone
    pub fn buffers(&self) -> OrderedGuard<'_, BufferStore> {
        acquire(&self.buffers, BUFFERS)
    }

    /// Take the active-slot lock alone
    pub fn active(&self) -> OrderedGuard<'_, ActiveSlots> {
        acquire(&self.active, ACTIVE)
    }

    /// Take all three locks in order
    pub fn all(&self) -> AllHeld<'_> {
        self.sources().with_buffers().with_active()
    }
}

/// Source lock held
pub(crate) struct SourcesHeld<'a> {
    locks: &'a MixerLocks,
    sources: OrderedGuard<'a, SourceStore>,
}

impl<'a> SourcesHeld<'a> {
    pub fn with_buffers(self) -> SourcesBuffersHeld<'a> {
        let buffers = acquire(&self.locks.buffers, BUFFERS);
        SourcesBuffersHeld {
            locks: self.locks,
            buffers,
            sources: self.sources,
        }
    }

    pub fn sources(&self) -> &SourceStore {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut SourceStore {
        &mut self.sources
    }
}

/// Source and buffer locks held
pub(crate) struct SourcesBuffersHeld<'a> {
    locks: &'a MixerLocks,
    buffers: OrderedGuard<'a, BufferStore>,
    sources: OrderedGuard<'a, SourceStore>,
}

impl<'a> SourcesBuffersHeld<'a> {
    pub fn with_active(self) -> AllHeld<'a> {
        let active = acquire(&self.locks.active, ACTIVE);
        AllHeld {
            active,
            buffers: self.buffers,
            sources: self.sources,
        }
    }

    pub fn parts(&mut self) -> (&mut SourceStore, &mut BufferStore) {
        (&mut self.sources, &mut self.buffers)
    }
}

/// All three locks held
pub(crate) struct AllHeld<'a> {
    active: OrderedGuard<'a, ActiveSlots>,
    buffers: OrderedGuard<'a, BufferStore>,
    sources: OrderedGuard<'a, SourceStore>,
}

impl<'a> AllHeld<'a> {
    pub fn parts(&mut self) -> (&mut SourceStore, &mut BufferStore, &mut ActiveSlots) {
        (&mut self.sources, &mut self.buffers, &mut self.active)
    }
}
