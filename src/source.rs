//! Source-file enumeration (§6 "Input: source file enumeration"):
//! discovers files on disk and hands back the `(path, text)` pairs the
//! parser port consumes, narrowed to the one extension set this
//! grammar supports.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::AnalysisResult;

/// One file pulled off disk, ready for `parsing::Parser::parse`.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

/// Walk `root`, skipping hidden directories and common build/dependency
/// directories, returning every file whose extension the parser claims
/// to support.
pub fn enumerate_sources(root: &Path, extensions: &[&str]) -> AnalysisResult<Vec<SourceFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        !name.starts_with('.') && name != "_build" && name != "deps" && name != "node_modules"
    }) {
        let entry = entry.map_err(|e| {
            crate::error::AnalysisError::new(crate::error::ErrorKind::Io, format!("walk error: {e}"))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_string()) else {
            continue;
        };
        if !extensions.contains(&ext.as_str()) {
            continue;
        }

        let text = std::fs::read_to_string(path)?;
        files.push(SourceFile { path: path.to_path_buf(), text });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_matching_extensions_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ex"), "defmodule A do end").unwrap();
        std::fs::write(dir.path().join("b.txt"), "ignored").unwrap();

        let files = enumerate_sources(dir.path(), &["ex", "exs"]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("a.ex"));
    }

    #[test]
    fn skips_build_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("_build")).unwrap();
        std::fs::write(dir.path().join("_build").join("skip.ex"), "defmodule Skip do end").unwrap();
        std::fs::write(dir.path().join("keep.ex"), "defmodule Keep do end").unwrap();

        let files = enumerate_sources(dir.path(), &["ex"]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("keep.ex"));
    }
}
