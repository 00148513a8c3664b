pub mod config;
pub mod logging;

pub use logging::{init_tracing, Must};
