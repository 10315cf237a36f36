pub mod comparator;
pub mod slice;
pub mod status;

pub use comparator::{BytewiseComparator, Comparator};
pub use slice::Slice;
pub use status::{Code, Result, Status};
