//! Report generation modules.

pub mod format;
pub mod generator;

pub use format::NumberFormatter;
pub use generator::*;
