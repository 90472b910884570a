//! Utility functions shared across the codebase

pub mod json;

pub use json::{parse_json_object, parse_json_value};
