#[allow(clippy::module_inception)]
pub mod memtable;

pub use memtable::{InternalKey, MemTable, RecordKind};
