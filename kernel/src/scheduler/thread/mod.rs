//! Thread module

pub mod state;
pub mod table;
pub mod thread;

pub use state::{FinishRecord, SchedulingState};
pub use table::ThreadTable;
pub use thread::{alloc_thread_id, ThreadFlags, ThreadHandle, ThreadId};
