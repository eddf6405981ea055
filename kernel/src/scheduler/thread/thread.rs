//! Thread handles
//!
//! Identity of a schedulable thread: id, debug name and role flags.
//! Handles are immutable and cheap to clone; all mutable scheduling data
//! lives in the scheduler's thread table, keyed by `ThreadId`.

use alloc::sync::Arc;
use bitflags::bitflags;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Thread ID type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u64);

impl ThreadId {
    /// Reserved for the bootstrap thread
    pub const MAIN: ThreadId = ThreadId(0);

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Next thread id (0 belongs to the bootstrap thread)
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh, monotonically increasing thread id
pub fn alloc_thread_id() -> ThreadId {
    ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
}

bitflags! {
    /// Thread role flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ThreadFlags: u8 {
        /// Bootstrap thread; kernel-idle fallback of every wait queue
        const MAIN = 1 << 0;
        /// Idle thread; never queued
        const IDLE = 1 << 1;
    }
}

impl ThreadFlags {
    /// Threads excluded from aging and from run statistics
    pub fn is_exempt(&self) -> bool {
        self.intersects(Self::MAIN | Self::IDLE)
    }
}

/// Immutable thread identity
#[derive(Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    id: ThreadId,
    name: Arc<str>,
    flags: ThreadFlags,
}

impl ThreadHandle {
    /// New ordinary thread with a fresh id
    pub fn new(name: &str) -> Self {
        Self {
            id: alloc_thread_id(),
            name: Arc::from(name),
            flags: ThreadFlags::empty(),
        }
    }

    /// The bootstrap thread (id 0)
    pub fn main() -> Self {
        Self {
            id: ThreadId::MAIN,
            name: Arc::from("main"),
            flags: ThreadFlags::MAIN,
        }
    }

    /// A new idle thread
    pub fn idle() -> Self {
        Self {
            id: alloc_thread_id(),
            name: Arc::from("idle"),
            flags: ThreadFlags::IDLE,
        }
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn flags(&self) -> ThreadFlags {
        self.flags
    }

    #[inline]
    pub fn is_main(&self) -> bool {
        self.flags.contains(ThreadFlags::MAIN)
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.flags.contains(ThreadFlags::IDLE)
    }
}

/// `name(id)`, the form used in every scheduler record
impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.id.0)
            .field("name", &&*self.name)
            .field("flags", &self.flags)
            .finish()
    }
}
