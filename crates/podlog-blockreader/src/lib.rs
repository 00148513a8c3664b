pub mod pool;
pub mod reader;

pub use pool::BufferPool;
pub use reader::{read_range, ReadError};
