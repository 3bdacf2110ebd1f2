pub mod accumulate;
pub mod aggregate;
pub mod chart;
pub mod config;
pub mod error;
pub mod io;
pub mod load;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod sort;
pub mod transform;
pub mod write;

pub use error::{Result, ToolError};
