//! Name resolution: key sanitizing and per-collection disambiguation.

pub mod resolver;
pub mod sanitize;

pub use resolver::{resolve, DEGENERATE_NAME};
pub use sanitize::sanitize;
