//! Persisted seek state
//!
//! One small JSON file per tracked log target records how far the target has
//! been consumed, so each invocation only reads bytes appended since the last
//! one. Files live in the scope directory next to the cache and lock files.

pub mod identity;
pub mod record;
pub mod store;

pub use identity::{data_file_prefix, cache_path, lock_path, SeekIdentity};
pub use record::{FileId, SeekRecord};
pub use store::SeekStore;
