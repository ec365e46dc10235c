//! Security utilities and validation functions.
//!
//! This module provides path validation that keeps every file extracted
//! from an evidence container inside the run's staging directory.

pub mod path_validator;

pub use path_validator::{normalize_member_name, staged_path, validate_input_path};
