use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use url::Url;

use crate::ast::ImportUrl;

/// Extension given to import paths that have none.
pub const SOURCE_EXTENSION: &str = "scss";

/// Opens the documents named by `@import`.
pub trait Resolver {
    /// Base path that relative imports resolve against, e.g. `styles/`.
    fn scoped_path(&self) -> &str;

    /// The document text, or `None` when there is no such document.
    fn open(&self, path: &str) -> Option<String>;
}

/// Resolves imports from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
    scoped_path: String,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scoped_path: String::new(),
        }
    }

    pub fn with_scoped_path(mut self, scoped_path: impl Into<String>) -> Self {
        self.scoped_path = scoped_path.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Resolver for FsResolver {
    fn scoped_path(&self) -> &str {
        &self.scoped_path
    }

    fn open(&self, path: &str) -> Option<String> {
        let full = self.root.join(path);
        match fs::read_to_string(&full) {
            Ok(text) => Some(text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %full.display(), error = %err, "failed to read import");
                None
            }
        }
    }
}

/// Resolves imports from documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: HashMap<String, String>,
    scoped_path: String,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scoped_path(mut self, scoped_path: impl Into<String>) -> Self {
        self.scoped_path = scoped_path.into();
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl Resolver for MemoryResolver {
    fn scoped_path(&self) -> &str {
        &self.scoped_path
    }

    fn open(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }
}

/// Turns an import url into the path handed to [`Resolver::open`].
///
/// Relative urls are joined onto `scoped_path` with url semantics, so `../`
/// segments are folded away. The leading `/` is dropped and
/// [`SOURCE_EXTENSION`] is added when the file name has no extension.
/// Returns `None` when the url is not a local path or cannot be joined.
pub fn resolve_import_path(url: &ImportUrl, scoped_path: &str) -> Option<String> {
    if !url.is_path() {
        return None;
    }
    let absolute = if url.as_str().starts_with('/') {
        url.as_str().to_string()
    } else {
        let base = Url::parse("https://local/").ok()?;
        let scoped = base.join(scoped_path.trim_start_matches('/')).ok()?;
        scoped.join(url.as_str()).ok()?.path().to_string()
    };
    let mut path = absolute.trim_start_matches('/').to_string();
    if Path::new(&path).extension().is_none() {
        path.push('.');
        path.push_str(SOURCE_EXTENSION);
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/imports")
    }

    #[test]
    fn relative_paths_join_the_scoped_path() {
        let url = ImportUrl::new("partials/buttons");
        assert_eq!(
            resolve_import_path(&url, "styles/").as_deref(),
            Some("styles/partials/buttons.scss")
        );
        assert_eq!(
            resolve_import_path(&ImportUrl::new("../shared/reset.css"), "styles/site/").as_deref(),
            Some("styles/shared/reset.css")
        );
    }

    #[test]
    fn absolute_paths_ignore_the_scoped_path() {
        assert_eq!(
            resolve_import_path(&ImportUrl::new("/lib/grid"), "styles/").as_deref(),
            Some("lib/grid.scss")
        );
    }

    #[test]
    fn urls_with_a_scheme_are_not_paths() {
        let url = ImportUrl::new("https://fonts.example.com/css");
        assert!(!url.is_path());
        assert_eq!(resolve_import_path(&url, ""), None);
    }

    #[test]
    fn fs_resolver_reads_fixtures() {
        let resolver = FsResolver::new(fixture_dir());
        let text = resolver.open("base.scss").expect("fixture exists");
        assert!(text.contains("$base-color"));
        assert!(resolver.open("missing.scss").is_none());
    }

    #[test]
    fn memory_resolver() {
        let mut resolver = MemoryResolver::new().with_scoped_path("css/");
        resolver.insert("css/a.scss", "a { b: c; }");
        assert_eq!(resolver.scoped_path(), "css/");
        assert_eq!(resolver.open("css/a.scss").as_deref(), Some("a { b: c; }"));
        assert!(resolver.open("css/b.scss").is_none());
    }
}
