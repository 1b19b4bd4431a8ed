//! Path filtering with gitignore-style exclude patterns.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::Result;

/// Decides which changed paths are worth reporting.
#[derive(Debug, Clone)]
pub struct PathFilter {
    gitignore: Gitignore,
    base_path: PathBuf,
    extensions: Vec<String>,
    roots: Vec<PathBuf>,
}

impl PathFilter {
    /// Create a filter that accepts everything under `base_path`.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            gitignore: Gitignore::empty(),
            base_path: base_path.as_ref().to_path_buf(),
            extensions: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Create a filter with exclude patterns and an extension allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error if patterns are invalid.
    pub fn with_patterns(
        base_path: impl AsRef<Path>,
        patterns: &[String],
        extensions: &[String],
    ) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        let mut builder = GitignoreBuilder::new(&base_path);

        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| crate::Error::config(format!("invalid pattern: {e}")))?;
        }

        let gitignore = builder
            .build()
            .map_err(|e| crate::Error::config(format!("failed to build exclude set: {e}")))?;

        Ok(Self {
            gitignore,
            base_path,
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
            roots: Vec::new(),
        })
    }

    /// Register a watch root. Events on a root always pass the extension check.
    pub fn add_root(&mut self, root: impl Into<PathBuf>) {
        let root = root.into();
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }

    /// Check if a change on `path` should be reported.
    #[must_use]
    pub fn allows(&self, path: &Path) -> bool {
        if self.is_excluded(path) {
            return false;
        }

        if self.roots.iter().any(|r| r == path) {
            return true;
        }

        self.has_wanted_extension(path)
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// A path is excluded if it or any parent below the base matches a pattern.
    fn is_excluded(&self, path: &Path) -> bool {
        for ancestor in path.ancestors() {
            if ancestor == self.base_path.as_path() || ancestor.as_os_str().is_empty() {
                break;
            }
            let is_dir = ancestor != path || path.is_dir();
            if self.gitignore.matched(ancestor, is_dir).is_ignore() {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = PathFilter::new("/project");
        assert!(filter.allows(Path::new("/project/src/main.c")));
        assert!(filter.allows(Path::new("/project/README")));
    }

    #[test]
    fn test_excluded_directory() {
        let filter =
            PathFilter::with_patterns("/project", &patterns(&["target", ".git"]), &[]).unwrap();

        assert!(!filter.allows(Path::new("/project/target/debug/app")));
        assert!(!filter.allows(Path::new("/project/.git/index")));
        assert!(filter.allows(Path::new("/project/src/main.rs")));
    }

    #[test]
    fn test_excluded_glob() {
        let filter = PathFilter::with_patterns("/project", &patterns(&["*.swp", "*~"]), &[]).unwrap();

        assert!(!filter.allows(Path::new("/project/src/.main.c.swp")));
        assert!(!filter.allows(Path::new("/project/src/main.c~")));
        assert!(filter.allows(Path::new("/project/src/main.c")));
    }

    #[test]
    fn test_extension_allow_list() {
        let filter =
            PathFilter::with_patterns("/project", &[], &patterns(&["c", "h"])).unwrap();

        assert!(filter.allows(Path::new("/project/src/main.c")));
        assert!(filter.allows(Path::new("/project/src/util.H")));
        assert!(!filter.allows(Path::new("/project/src/notes.txt")));
        assert!(!filter.allows(Path::new("/project/Makefile")));
    }

    #[test]
    fn test_root_bypasses_extension_check() {
        let mut filter =
            PathFilter::with_patterns("/project", &[], &patterns(&["c"])).unwrap();
        filter.add_root("/project/src");

        assert!(filter.allows(Path::new("/project/src")));
        assert!(!filter.allows(Path::new("/project/docs")));
    }

    #[test]
    fn test_excluded_with_real_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("build/out")).unwrap();
        fs::write(tmp.path().join("build/out/app"), "bin").unwrap();
        fs::write(tmp.path().join("main.c"), "int main;").unwrap();

        let filter = PathFilter::with_patterns(tmp.path(), &patterns(&["build/"]), &[]).unwrap();

        assert!(!filter.allows(&tmp.path().join("build/out/app")));
        assert!(filter.allows(&tmp.path().join("main.c")));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PathFilter::with_patterns("/project", &patterns(&["a{b"]), &[]);
        assert!(result.is_err());
    }
}
