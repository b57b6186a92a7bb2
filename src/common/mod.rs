//! Common definitions shared across modules

pub mod error;

pub use error::{Error, Result};
