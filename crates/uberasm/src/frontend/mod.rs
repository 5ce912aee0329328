//! List file front end
//!
//! The front end is responsible for:
//! 1. Lexing list file text into tokens
//! 2. Parsing tokens into typed statements
//!
//! Applying statements to contexts and resources is done by
//! [`crate::link::Config`].

pub mod list;

pub use list::{FileCommand, ParsedList, ResourceItem, Statement, parse_list};
