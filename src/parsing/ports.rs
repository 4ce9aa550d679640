//! Parser port (§6 "Input: source file enumeration").
//!
//! The core only depends on this trait; the concrete grammar is an
//! external collaborator per §1. `tree_sitter_parser` is the one
//! production implementation shipped in this crate.

use crate::ast::Module;
use crate::error::AnalysisError;

/// A single parsed source file: the modules it defines (a file
/// conventionally defines one, but nested/sibling `defmodule` blocks are
/// legal and each becomes its own entry) plus any parse diagnostics
/// collected along the way (§4.10 — parse errors never abort the run,
/// the file is just skipped for further analysis).
pub struct ParsedFile {
    pub modules: Vec<Module>,
    pub errors: Vec<AnalysisError>,
}

pub trait Parser {
    /// Parse a single file's text into a `ParsedFile`. Never returns
    /// `Err` for malformed source — malformed source produces a
    /// `ParsedFile` with an empty `modules` list and a populated
    /// `errors` list.
    fn parse(&self, file_path: &str, source: &str) -> ParsedFile;

    fn language_name(&self) -> &'static str;

    fn supports_extension(&self, ext: &str) -> bool;
}

/// Batch convenience over an iterable of `(path, text)` pairs (§6's
/// "iterable of (file_path, text_content)" input contract). Files are
/// independent of one another at the parse stage (§5 "Concurrency &
/// resource model" — the only parallelism this analyzer allows outside
/// trivial SCCs), so with the `parallel` feature enabled this fans the
/// batch out across `rayon`'s global pool; without it, the batch runs
/// sequentially in iteration order.
pub trait BatchParser: Parser + Sync {
    #[cfg(feature = "parallel")]
    fn parse_all<'a, I>(&self, files: I) -> Vec<ParsedFile>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        use rayon::prelude::*;
        let files: Vec<(&str, &str)> = files.into_iter().collect();
        files.into_par_iter().map(|(path, text)| self.parse(path, text)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn parse_all<'a, I>(&self, files: I) -> Vec<ParsedFile>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        files.into_iter().map(|(path, text)| self.parse(path, text)).collect()
    }
}

impl<T: Parser + Sync> BatchParser for T {}
