pub mod config;
pub mod discover;
mod error;
pub mod naming;
pub mod normalize;
pub mod page;
pub mod paths;
pub mod persist;
pub mod report;
pub mod retrieve;
pub mod session;
pub mod transport;

pub use error::{EngineError, Result};
