//! Currency Service Common Types
//!
//! This crate contains types shared across the currency service crates,
//! including the fixed-point money exchange format, the exposed-path
//! policy, and the service error taxonomy.

pub mod monetary;
pub mod path;
pub mod error;

pub use monetary::*;
pub use path::*;
pub use error::*;
