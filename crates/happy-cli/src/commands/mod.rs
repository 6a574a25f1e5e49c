pub mod common;
pub mod doctor;
pub mod modes;
pub mod replay;
pub mod validate;
