//! Shared helpers.

pub mod json_extraction;

pub use json_extraction::{
    extract_balanced, extract_fenced_block, extract_json, find_matching_delimiter,
    JsonExtractionError,
};
