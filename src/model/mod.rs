//! Data model shared by every matching stage.
//!
//! Products and catalogs are the engine's input snapshot; candidates and results
//! are its output. Everything here is built fresh per call and never mutated
//! once handed to a matcher.

mod catalog;
mod product;
mod result;

pub use catalog::*;
pub use product::*;
pub use result::*;
