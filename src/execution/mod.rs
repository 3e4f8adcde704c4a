//! Query execution against the local store

pub mod executor;
pub mod result;

pub use executor::execute;
pub use result::{display_value, Table};
