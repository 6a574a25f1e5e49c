pub mod modes;
pub mod schemas;
pub mod validate;

pub use validate::{FieldPath, ValidationError, parse, parse_at, parse_str};
