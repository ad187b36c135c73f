//! Utilities Module - shared infrastructure
//!
//! - `jsonpath`: JSONPath subset used to extract values from tool output

pub mod jsonpath;
