//! Runtime value types

pub mod value;

pub use value::Value;
