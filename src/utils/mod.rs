//! Utility modules

pub mod amount;
pub mod memory_sink;
pub mod validation;

pub use memory_sink::*;
pub use validation::*;
