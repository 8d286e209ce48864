//! Filesystem operations: modularized.

mod atomic;
mod compare;
mod helpers;
mod lock;
mod metadata;

pub use atomic::move_no_clobber;
pub use compare::files_identical;
pub(crate) use helpers::build_message;
pub use helpers::io_error_with_help;
pub use lock::{RunLock, try_acquire_run_lock};
pub use metadata::{apply_attributes, replicate_entry};
