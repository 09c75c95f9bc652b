//! Schema descriptor sets for Pipeworks
//!
//! This crate loads compiled protobuf descriptor sets and resolves them into a
//! [`DescriptorPool`]: every file is built only after the files it imports, so
//! callers can hand over files in any order.

pub mod error;
pub mod parse;
pub mod pool;
pub mod search;
pub mod types;
pub mod utils;

pub use error::*;
pub use pool::*;
pub use search::*;
pub use types::*;
