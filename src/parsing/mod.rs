//! Source ingestion (§6 "Input: source file enumeration", §10.1).

pub mod ports;
pub mod tree_sitter_parser;

pub use ports::{BatchParser, ParsedFile, Parser};
pub use tree_sitter_parser::TreeSitterParser;
