//! Local file system walker.
//!
//! Walks a root directory and decides, file by file, whether the contents
//! become an [`IndexedRecord`]. Skip directories are pruned while walking so
//! their subtrees are never read. Every other file goes through the same
//! filter chain, in order: exclude patterns, binary extension, size, and
//! strict UTF-8 decoding. Files whose relative path is not valid UTF-8 are
//! skipped up front, since their record id could not be told apart.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::ConfigError;
use crate::models::{IndexedRecord, IndexingConfig, STORE_DIR_NAME};
use crate::utils::file::{has_binary_extension, read_utf8_text, relative_path};

/// Immutable filter rules applied during a walk.
#[derive(Debug, Clone)]
pub struct WalkRules {
    skip_dirs: HashSet<String>,
    binary_extensions: Vec<String>,
    max_file_size: u64,
    exclude_patterns: Vec<glob::Pattern>,
}

impl WalkRules {
    /// Create rules from explicit sets. The store directory is always skipped.
    pub fn new<I, J>(skip_dirs: I, binary_extensions: J, max_file_size: u64) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        J: IntoIterator,
        J::Item: Into<String>,
    {
        let mut skip_dirs: HashSet<String> = skip_dirs.into_iter().map(Into::into).collect();
        skip_dirs.insert(STORE_DIR_NAME.to_string());

        Self {
            skip_dirs,
            binary_extensions: binary_extensions.into_iter().map(Into::into).collect(),
            max_file_size,
            exclude_patterns: Vec::new(),
        }
    }

    pub fn from_config(config: &IndexingConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.skip_dirs.iter().cloned(),
            config.binary_extensions.iter().cloned(),
            config.max_file_size,
        )
        .with_exclude_patterns(&config.exclude_patterns)
    }

    /// Add glob patterns matched against each file's relative path.
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self, ConfigError> {
        for pattern in patterns {
            let compiled =
                glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
            self.exclude_patterns.push(compiled);
        }
        Ok(self)
    }

    pub fn is_skipped_dir(&self, name: &str) -> bool {
        self.skip_dirs.contains(name)
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.exclude_patterns.iter().any(|p| p.matches(relative))
    }
}

impl Default for WalkRules {
    fn default() -> Self {
        let config = IndexingConfig::default();
        Self::new(
            config.skip_dirs,
            config.binary_extensions,
            config.max_file_size,
        )
    }
}

/// Why a file was not indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Excluded,
    BinaryExtension,
    Empty,
    TooLarge(u64),
    NotUtf8,
    NonUtf8Name,
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Excluded => write!(f, "excluded"),
            SkipReason::BinaryExtension => write!(f, "binary"),
            SkipReason::Empty => write!(f, "empty"),
            SkipReason::TooLarge(size) => write!(f, "too large: {} bytes", size),
            SkipReason::NotUtf8 => write!(f, "not utf-8"),
            SkipReason::NonUtf8Name => write!(f, "non-utf-8 file name"),
            SkipReason::Unreadable(message) => write!(f, "unreadable: {}", message),
        }
    }
}

/// Decision for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Included(IndexedRecord),
    Skipped { path: String, reason: SkipReason },
}

/// Local file system data source.
#[derive(Debug)]
pub struct LocalSource {
    /// Root path to scan
    root: PathBuf,

    rules: WalkRules,
}

impl LocalSource {
    pub fn new(root: PathBuf, rules: WalkRules) -> Self {
        Self { root, rules }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree, yielding one outcome per file.
    ///
    /// Entries are visited in file-name order so runs are reproducible.
    pub fn walk(&self) -> impl Iterator<Item = FileOutcome> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.is_pruned(entry))
            .filter_map(move |entry| match entry {
                Ok(entry) => self.inspect(&entry),
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| self.display_path(p))
                        .unwrap_or_else(|| self.root.display().to_string());
                    Some(FileOutcome::Skipped {
                        path,
                        reason: SkipReason::Unreadable(e.to_string()),
                    })
                }
            })
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let pruned = self
            .rules
            .is_skipped_dir(&entry.file_name().to_string_lossy());
        if pruned {
            debug!(path = %entry.path().display(), "pruning directory");
        }
        pruned
    }

    fn inspect(&self, entry: &DirEntry) -> Option<FileOutcome> {
        let path = entry.path();

        // Symlinked directories are listed but not followed.
        if entry.file_type().is_dir() || (entry.path_is_symlink() && path.is_dir()) {
            return None;
        }

        let relative = self.display_path(path);
        let outcome = match self.check_file(path, &relative) {
            Ok(text) => FileOutcome::Included(IndexedRecord::new(relative, text)),
            Err(reason) => FileOutcome::Skipped {
                path: relative,
                reason,
            },
        };
        Some(outcome)
    }

    fn check_file(&self, path: &Path, relative: &str) -> Result<String, SkipReason> {
        if path
            .strip_prefix(&self.root)
            .is_ok_and(|rest| rest.to_str().is_none())
        {
            return Err(SkipReason::NonUtf8Name);
        }

        if self.rules.is_excluded(relative) {
            return Err(SkipReason::Excluded);
        }

        if has_binary_extension(path, &self.rules.binary_extensions) {
            return Err(SkipReason::BinaryExtension);
        }

        let size = fs::metadata(path)
            .map_err(|e| SkipReason::Unreadable(e.to_string()))?
            .len();
        if size == 0 {
            return Err(SkipReason::Empty);
        }
        if size > self.rules.max_file_size {
            return Err(SkipReason::TooLarge(size));
        }

        match read_utf8_text(path) {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(SkipReason::NotUtf8),
            Err(e) => Err(SkipReason::Unreadable(e.to_string())),
        }
    }

    fn display_path(&self, path: &Path) -> String {
        relative_path(&self.root, path).unwrap_or_else(|| path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn included_paths(source: &LocalSource) -> Vec<String> {
        source
            .walk()
            .filter_map(|outcome| match outcome {
                FileOutcome::Included(record) => Some(record.metadata.path),
                FileOutcome::Skipped { .. } => None,
            })
            .collect()
    }

    fn skip_reason(source: &LocalSource, path: &str) -> Option<SkipReason> {
        source.walk().find_map(|outcome| match outcome {
            FileOutcome::Skipped { path: p, reason } if p == path => Some(reason),
            _ => None,
        })
    }

    #[test]
    fn test_includes_text_and_skips_binary_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes.txt", b"0123456789");
        write(dir.path(), "logo.png", b"not really a png");
        write(dir.path(), "LOGO2.PNG", b"upper case");

        let source = LocalSource::new(dir.path().to_path_buf(), WalkRules::default());
        assert_eq!(included_paths(&source), vec!["notes.txt"]);
        assert_eq!(
            skip_reason(&source, "logo.png"),
            Some(SkipReason::BinaryExtension)
        );
        assert_eq!(
            skip_reason(&source, "LOGO2.PNG"),
            Some(SkipReason::BinaryExtension)
        );
    }

    #[test]
    fn test_skips_empty_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.txt", b"");
        write(dir.path(), "exact.txt", &[b'a'; 100]);
        write(dir.path(), "big.txt", &[b'a'; 101]);

        let rules = WalkRules::new(Vec::<String>::new(), Vec::<String>::new(), 100);
        let source = LocalSource::new(dir.path().to_path_buf(), rules);

        assert_eq!(included_paths(&source), vec!["exact.txt"]);
        assert_eq!(skip_reason(&source, "empty.txt"), Some(SkipReason::Empty));
        assert_eq!(
            skip_reason(&source, "big.txt"),
            Some(SkipReason::TooLarge(101))
        );
    }

    #[test]
    fn test_default_size_threshold() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "limit.txt", &vec![b'x'; 1_000_000]);
        write(dir.path(), "over.txt", &vec![b'x'; 1_000_001]);

        let source = LocalSource::new(dir.path().to_path_buf(), WalkRules::default());
        assert_eq!(included_paths(&source), vec!["limit.txt"]);
    }

    #[test]
    fn test_skips_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "latin1.txt", &[0x63, 0x61, 0x66, 0xe9]);

        let source = LocalSource::new(dir.path().to_path_buf(), WalkRules::default());
        assert!(included_paths(&source).is_empty());
        assert_eq!(
            skip_reason(&source, "latin1.txt"),
            Some(SkipReason::NotUtf8)
        );
    }

    #[test]
    fn test_prunes_skip_dirs_and_store_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", b"fn main() {}");
        write(dir.path(), ".git/config", b"[core]");
        write(dir.path(), "node_modules/pkg/index.js", b"module.exports = 1;");
        write(dir.path(), "deep/venv/lib/site.py", b"import os");
        write(dir.path(), ".dirsearch/notes.txt", b"store internals");

        let source = LocalSource::new(dir.path().to_path_buf(), WalkRules::default());
        let outcomes: Vec<FileOutcome> = source.walk().collect();

        // Pruned subtrees produce no outcome at all, not even a skip.
        assert_eq!(outcomes.len(), 1);
        assert_eq!(included_paths(&source), vec!["src/main.rs"]);
    }

    #[test]
    fn test_store_dir_skipped_even_with_custom_rules() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".dirsearch/store.txt", b"hidden");
        write(dir.path(), "visible.txt", b"shown");

        let rules = WalkRules::new(Vec::<String>::new(), Vec::<String>::new(), 1_000);
        let source = LocalSource::new(dir.path().to_path_buf(), rules);
        assert_eq!(included_paths(&source), vec!["visible.txt"]);
    }

    #[test]
    fn test_root_named_like_skip_dir_is_walked() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("node_modules");
        write(&root, "a.js", b"let a = 1;");

        let source = LocalSource::new(root, WalkRules::default());
        assert_eq!(included_paths(&source), vec!["a.js"]);
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keep.rs", b"fn keep() {}");
        write(dir.path(), "bundle.min.js", b"var a=1;");

        let rules = WalkRules::default()
            .with_exclude_patterns(&["**/*.min.js".to_string(), "*.min.js".to_string()])
            .unwrap();
        let source = LocalSource::new(dir.path().to_path_buf(), rules);

        assert_eq!(included_paths(&source), vec!["keep.rs"]);
        assert_eq!(
            skip_reason(&source, "bundle.min.js"),
            Some(SkipReason::Excluded)
        );
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let result = WalkRules::default().with_exclude_patterns(&["a[".to_string()]);
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_record_ids_are_stable_across_walks() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/readme.md", b"first");

        let source = LocalSource::new(dir.path().to_path_buf(), WalkRules::default());
        let first: Vec<FileOutcome> = source.walk().collect();

        write(dir.path(), "docs/readme.md", b"second version");
        let second: Vec<FileOutcome> = source.walk().collect();

        let id = |outcomes: &[FileOutcome]| match &outcomes[0] {
            FileOutcome::Included(record) => record.id.clone(),
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(id(&first), id(&second));
        assert_eq!(id(&first), crate::utils::record_id("docs/readme.md"));
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::NotUtf8.to_string(), "not utf-8");
        assert_eq!(
            SkipReason::TooLarge(2_000_000).to_string(),
            "too large: 2000000 bytes"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "locked/secret.txt", b"hidden");
        write(dir.path(), "open.txt", b"visible");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits are not enforced for privileged users.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let source = LocalSource::new(dir.path().to_path_buf(), WalkRules::default());
        let outcomes: Vec<FileOutcome> = source.walk().collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(outcomes.iter().any(|outcome| matches!(
            outcome,
            FileOutcome::Skipped { path, reason: SkipReason::Unreadable(_) } if path == "locked"
        )));
        let included: Vec<&str> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                FileOutcome::Included(record) => Some(record.path()),
                FileOutcome::Skipped { .. } => None,
            })
            .collect();
        assert_eq!(included, vec!["open.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dir_not_followed_but_symlinked_file_included() {
        use std::os::unix::fs::symlink;

        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "inner.txt", b"behind a dir link");
        write(outside.path(), "target.txt", b"behind a file link");

        let dir = tempfile::tempdir().unwrap();
        symlink(outside.path(), dir.path().join("linked_dir")).unwrap();
        symlink(outside.path().join("target.txt"), dir.path().join("linked.txt")).unwrap();

        let source = LocalSource::new(dir.path().to_path_buf(), WalkRules::default());
        let outcomes: Vec<FileOutcome> = source.walk().collect();

        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            FileOutcome::Included(record) => {
                assert_eq!(record.path(), "linked.txt");
                assert_eq!(record.text, "behind a file link");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe9.txt")), "latin-1").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe8.txt")), "also latin-1").unwrap();
        write(dir.path(), "plain.txt", b"fine");

        let source = LocalSource::new(dir.path().to_path_buf(), WalkRules::default());
        assert_eq!(included_paths(&source), vec!["plain.txt"]);

        let skipped = source
            .walk()
            .filter(|outcome| {
                matches!(
                    outcome,
                    FileOutcome::Skipped {
                        reason: SkipReason::NonUtf8Name,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(skipped, 2);
    }
}
