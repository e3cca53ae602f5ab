//! Project discovery and path classification.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{WalkBuilder, WalkState};
use rayon::prelude::*;

use crate::app::pattern::PatternMatcher;
use crate::app::tree::normalize_path;
use crate::domain::model::{ClassifiedPath, NodeKind};
use crate::infra::config::Config;

const CTXTREE_IGNORE: &str = ".ctxtreeignore";

/// Result of scanning a project root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// `None` when the root was missing or unreadable.
    pub root: Option<PathBuf>,
    pub entries: Vec<ClassifiedPath>,
}

impl ScanResult {
    /// Relative paths of every classified file.
    pub fn files(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == NodeKind::File)
            .map(|entry| entry.path.as_str())
            .collect()
    }
}

/// Configuration inputs for the scanner.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub root: PathBuf,
    pub show_hidden: bool,
    pub respect_gitignore: bool,
    pub threads: usize,
}

impl ScannerConfig {
    pub fn from_root(root: PathBuf, config: &Config) -> Self {
        Self {
            root,
            show_hidden: config.scan.show_hidden(),
            respect_gitignore: config.scan.respect_gitignore(),
            threads: config.scan.threads(),
        }
    }
}

/// Decides whether a relative path names a file or a directory.
pub trait Classify {
    fn classify(&self, relative_path: &str) -> io::Result<NodeKind>;
}

/// Classifies paths below a root with filesystem metadata.
#[derive(Debug, Clone)]
pub struct FsClassifier {
    root: PathBuf,
}

impl FsClassifier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Classify for FsClassifier {
    fn classify(&self, relative_path: &str) -> io::Result<NodeKind> {
        let metadata = fs::metadata(self.root.join(relative_path))?;
        Ok(if metadata.is_dir() {
            NodeKind::Directory
        } else {
            NodeKind::File
        })
    }
}

/// Classify every path on a bounded rayon pool and wait for all of them.
///
/// A failed classification falls back to [`NodeKind::File`]. The output keeps the input order.
/// `threads == 0` uses rayon's default worker count.
pub fn classify_all<C>(classifier: &C, paths: Vec<String>, threads: usize) -> Vec<ClassifiedPath>
where
    C: Classify + Sync + ?Sized,
{
    let classify = || -> Vec<ClassifiedPath> {
        paths
            .into_par_iter()
            .map(|path| {
                let kind = classifier.classify(&path).unwrap_or_else(|err| {
                    tracing::warn!(path = %path, error = %err, "classification failed");
                    NodeKind::File
                });
                ClassifiedPath { path, kind }
            })
            .collect()
    };

    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(classify),
        Err(err) => {
            tracing::warn!(error = %err, "failed to build classification pool, using global pool");
            classify()
        }
    }
}

/// Scanner walking the project respecting ignore rules.
#[derive(Debug, Default)]
pub struct Scanner;

impl Scanner {
    pub fn new() -> Self {
        Self
    }

    /// Every file and directory below the root, honoring ignore files but no include/exclude
    /// patterns. A missing root produces an empty result.
    pub fn find_all_paths(&self, cfg: &ScannerConfig) -> Result<ScanResult> {
        if !cfg.root.is_dir() {
            tracing::warn!(root = %cfg.root.display(), "project root not found");
            return Ok(ScanResult::default());
        }

        let paths = walk(cfg)?;
        let classifier = FsClassifier::new(&cfg.root);
        let entries = classify_all(&classifier, paths, cfg.threads);
        tracing::info!(root = %cfg.root.display(), entries = entries.len(), "scanned project");

        Ok(ScanResult {
            root: Some(cfg.root.clone()),
            entries,
        })
    }

    /// Files below the root accepted by `matcher`.
    pub fn find_paths(&self, cfg: &ScannerConfig, matcher: &PatternMatcher) -> Result<ScanResult> {
        let mut result = self.find_all_paths(cfg)?;
        result
            .entries
            .retain(|entry| entry.kind == NodeKind::File && matcher.is_included(&entry.path));
        Ok(result)
    }
}

fn walk(cfg: &ScannerConfig) -> Result<Vec<String>> {
    let matcher = Arc::new(build_ignore_matcher(&cfg.root)?);
    let mut builder = WalkBuilder::new(&cfg.root);
    builder
        .git_ignore(cfg.respect_gitignore)
        .git_exclude(cfg.respect_gitignore)
        .git_global(cfg.respect_gitignore)
        .require_git(false)
        .hidden(!cfg.show_hidden);

    let root = cfg.root.clone();
    builder.filter_entry({
        let matcher = matcher.clone();
        move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            !matcher.should_skip(rel)
        }
    });

    let paths = Mutex::new(Vec::new());
    let root = cfg.root.clone();

    builder.build_parallel().run(|| {
        let paths = &paths;
        let root = root.clone();
        Box::new(move |result| match result {
            Ok(entry) => {
                if entry.depth() > 0
                    && let Some(rel) = relative_path(&root, entry.path())
                    && let Ok(mut guard) = paths.lock()
                {
                    guard.push(rel);
                }
                WalkState::Continue
            }
            Err(err) => {
                tracing::warn!(error = %err, "scanner error");
                WalkState::Continue
            }
        })
    });

    let mut paths = paths.into_inner().unwrap_or_default();
    paths.sort();
    Ok(paths)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let normalized = normalize_path(&rel.to_string_lossy());
    (!normalized.is_empty()).then_some(normalized)
}

#[derive(Debug, Clone)]
struct IgnoreMatcher {
    globs: GlobSet,
}

impl IgnoreMatcher {
    fn should_skip(&self, rel: &Path) -> bool {
        self.globs.is_match(rel)
    }
}

fn build_ignore_matcher(root: &Path) -> Result<IgnoreMatcher> {
    let mut builder = GlobSetBuilder::new();

    for pattern in load_ctxtreeignore(root)? {
        for expanded in expand_dir_pattern(&pattern) {
            let glob = Glob::new(&expanded).context("invalid .ctxtreeignore pattern")?;
            builder.add(glob);
        }
    }

    // Always ignore the ignore file itself.
    builder.add(Glob::new(CTXTREE_IGNORE)?);

    let globs = builder.build().context("failed to build ignore matcher")?;
    Ok(IgnoreMatcher { globs })
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        trimmed.to_owned(),
        format!("{trimmed}/**"),
        format!("**/{trimmed}"),
        format!("**/{trimmed}/**"),
    ]
}

fn load_ctxtreeignore(root: &Path) -> Result<Vec<String>> {
    let path = root.join(CTXTREE_IGNORE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut patterns = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        patterns.push(trimmed.to_owned());
    }
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    fn scan(root: &Path, config: &Config) -> Result<ScanResult> {
        let cfg = ScannerConfig::from_root(root.to_path_buf(), config);
        Scanner::new().find_all_paths(&cfg)
    }

    fn kind_of(result: &ScanResult, path: &str) -> Option<NodeKind> {
        result
            .entries
            .iter()
            .find(|entry| entry.path == path)
            .map(|entry| entry.kind)
    }

    struct FlakyClassifier {
        failing: HashSet<&'static str>,
    }

    impl Classify for FlakyClassifier {
        fn classify(&self, relative_path: &str) -> io::Result<NodeKind> {
            if self.failing.contains(relative_path) {
                return Err(io::Error::other("metadata unavailable"));
            }
            Ok(if relative_path.ends_with(".d") {
                NodeKind::Directory
            } else {
                NodeKind::File
            })
        }
    }

    #[test]
    fn discovers_and_classifies_entries() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("src/app"))?;
        fs::create_dir_all(root.join("empty"))?;
        fs::write(root.join("src/app/main.rs"), b"fn main() {}")?;
        fs::write(root.join("README.md"), b"# readme")?;

        let result = scan(root, &Config::default())?;

        assert_eq!(result.root.as_deref(), Some(root));
        assert_eq!(kind_of(&result, "src"), Some(NodeKind::Directory));
        assert_eq!(kind_of(&result, "src/app"), Some(NodeKind::Directory));
        assert_eq!(kind_of(&result, "empty"), Some(NodeKind::Directory));
        assert_eq!(kind_of(&result, "src/app/main.rs"), Some(NodeKind::File));
        assert_eq!(result.files(), ["README.md", "src/app/main.rs"]);
        Ok(())
    }

    #[test]
    fn missing_root_yields_empty_result() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let result = scan(&temp.path().join("does-not-exist"), &Config::default())?;
        assert_eq!(result, ScanResult::default());
        Ok(())
    }

    #[test]
    fn respects_ctxtreeignore_and_hidden_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("generated"))?;
        fs::write(root.join("generated/output.txt"), b"not included")?;
        fs::write(root.join(".env"), b"SECRET=1")?;
        fs::write(root.join("main.rs"), b"fn main() {}")?;
        fs::write(root.join(CTXTREE_IGNORE), "# generated code\ngenerated/\n")?;

        let result = scan(root, &Config::default())?;
        let paths: Vec<&str> = result.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["main.rs"]);

        let mut config = Config::default();
        config.scan.show_hidden = Some(true);
        let result = scan(root, &config)?;
        assert!(kind_of(&result, ".env").is_some());
        assert!(kind_of(&result, CTXTREE_IGNORE).is_none());
        Ok(())
    }

    #[test]
    fn honors_gitignore_without_repository() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::write(root.join(".gitignore"), "*.log\n")?;
        fs::write(root.join("debug.log"), b"noise")?;
        fs::write(root.join("lib.rs"), b"")?;

        let result = scan(root, &Config::default())?;
        assert_eq!(result.files(), ["lib.rs"]);

        let mut config = Config::default();
        config.scan.respect_gitignore = Some(false);
        let result = scan(root, &config)?;
        assert_eq!(result.files(), ["debug.log", "lib.rs"]);
        Ok(())
    }

    #[test]
    fn find_paths_applies_patterns() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("src/a.ts"), b"")?;
        fs::write(root.join("src/b.js"), b"")?;

        let matcher = PatternMatcher::new(&["src/*.ts".to_string()], &[], true)?;
        let cfg = ScannerConfig::from_root(root.to_path_buf(), &Config::default());
        let result = Scanner::new().find_paths(&cfg, &matcher)?;
        assert_eq!(result.files(), ["src/a.ts"]);
        assert_eq!(result.entries.len(), 1);
        Ok(())
    }

    #[test]
    fn classification_failures_default_to_file() {
        let classifier = FlakyClassifier {
            failing: HashSet::from(["broken.d"]),
        };
        let paths = vec![
            "a.d".to_string(),
            "broken.d".to_string(),
            "c.txt".to_string(),
        ];

        let entries = classify_all(&classifier, paths, 2);

        assert_eq!(
            entries,
            [
                ClassifiedPath::directory("a.d"),
                ClassifiedPath::file("broken.d"),
                ClassifiedPath::file("c.txt"),
            ]
        );
    }

    #[test]
    fn classification_preserves_input_order_across_workers() {
        let classifier = FlakyClassifier {
            failing: HashSet::new(),
        };
        let paths: Vec<String> = (0..500).map(|i| format!("file-{i:03}.txt")).collect();
        let entries = classify_all(&classifier, paths.clone(), 8);
        let classified: Vec<String> = entries.into_iter().map(|entry| entry.path).collect();
        assert_eq!(classified, paths);
    }
}
