//! Maps file identifiers to script files on disk

use std::path::{Path, PathBuf};

use crate::error::ScriptError;

/// Default extension appended to identifiers that have none.
pub const DEFAULT_EXTENSION: &str = "js";

#[derive(Debug, Clone)]
pub struct ScriptResolver {
    search_paths: Vec<PathBuf>,
    extension: String,
}

impl ScriptResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Find the script for `id`.
    ///
    /// Absolute identifiers are used as-is. Otherwise each search path is
    /// tried in order, first with `id` verbatim, then with the default
    /// extension appended when `id` has no extension of its own.
    pub fn resolve(&self, id: &str) -> Result<PathBuf, ScriptError> {
        let requested = Path::new(id);
        if requested.is_absolute() {
            return if requested.is_file() {
                Ok(requested.to_path_buf())
            } else {
                Err(ScriptError::ScriptNotFound { id: id.to_string() })
            };
        }

        for dir in &self.search_paths {
            for candidate in self.candidates(dir, requested) {
                if candidate.is_file() {
                    tracing::trace!(file = id, path = %candidate.display(), "resolved script");
                    return Ok(candidate);
                }
            }
        }

        Err(ScriptError::ScriptNotFound { id: id.to_string() })
    }

    fn candidates(&self, dir: &Path, requested: &Path) -> Vec<PathBuf> {
        let exact = dir.join(requested);
        if requested.extension().is_some() || self.extension.is_empty() {
            vec![exact]
        } else {
            let with_extension = exact.with_extension(&self.extension);
            vec![exact, with_extension]
        }
    }
}

impl Default for ScriptResolver {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn appends_default_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("struct.js"), "").unwrap();

        let resolver = ScriptResolver::new(vec![dir.path().to_path_buf()]);
        assert_eq!(resolver.resolve("struct").unwrap(), dir.path().join("struct.js"));
        assert_eq!(resolver.resolve("struct.js").unwrap(), dir.path().join("struct.js"));
    }

    #[test]
    fn earlier_search_paths_win() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("main.js"), "1").unwrap();
        fs::write(second.path().join("main.js"), "2").unwrap();
        fs::write(second.path().join("only.js"), "3").unwrap();

        let resolver = ScriptResolver::new(vec![first.path().into(), second.path().into()]);
        let read = |id| fs::read_to_string(resolver.resolve(id).unwrap()).unwrap();
        assert_eq!(read("main"), "1");
        assert_eq!(read("only"), "3");
    }

    #[test]
    fn nested_identifiers_and_custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/util.mjs"), "").unwrap();

        let resolver = ScriptResolver::new(vec![dir.path().into()]).with_extension("mjs");
        assert_eq!(resolver.resolve("lib/util").unwrap(), dir.path().join("lib/util.mjs"));
    }

    #[test]
    fn absolute_identifiers_bypass_search_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abs.js");
        fs::write(&path, "").unwrap();

        let resolver = ScriptResolver::new(Vec::new());
        assert_eq!(resolver.resolve(path.to_str().unwrap()).unwrap(), path);
    }

    #[test]
    fn missing_scripts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ScriptResolver::new(vec![dir.path().into()]);
        let err = resolver.resolve("nope").unwrap_err();
        assert!(matches!(err, ScriptError::ScriptNotFound { id } if id == "nope"));
    }
}
