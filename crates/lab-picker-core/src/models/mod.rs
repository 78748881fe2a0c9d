//! Domain models for the lab test picker.

mod catalog;
mod search;

pub use catalog::*;
pub use search::*;
