//! Rendering of selected files into a single context document.
//!
//! Layout:
//! 1. a fixed preamble,
//! 2. a directory listing of the selected files (directories end with `/`, two spaces of
//!    indentation per level),
//! 3. one block per file between `=== BEGIN FILE: <path> ===` and `=== END FILE: <path> ===`,
//!    fenced with the language tag of the file extension when one is known.
//!
//! Files are emitted in lexicographic order of their relative path, so the same selection always
//! renders the same document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::app::language::fence_tag;
use crate::app::tree::normalize_path;
use crate::infra::config::Config;

/// Fixed text opening every document.
pub const PREAMBLE: &str = "\
This document bundles files selected from a project for use as context.
It opens with a directory listing of the selected files, followed by the
contents of each file between BEGIN FILE and END FILE markers.
";

/// Default size above which [`FsContentProvider`] refuses to read a file.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Source of file contents for the generator.
pub trait ContentProvider {
    /// Project root the relative paths resolve against. `None` when no project is open.
    fn root(&self) -> Option<&Path>;

    /// Read the text of a file given its root-relative path.
    fn read_text(&self, relative_path: &str) -> io::Result<String>;
}

/// Reads files from disk below a project root.
#[derive(Debug, Clone)]
pub struct FsContentProvider {
    root: Option<PathBuf>,
    max_file_size: u64,
}

impl FsContentProvider {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }
}

impl ContentProvider for FsContentProvider {
    fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn read_text(&self, relative_path: &str) -> io::Result<String> {
        let root = self
            .root
            .as_deref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no project root"))?;
        let path = root.join(relative_path);

        let size = fs::metadata(&path)?.len();
        if size > self.max_file_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "file is {size} bytes, above the {} byte limit",
                    self.max_file_size
                ),
            ));
        }
        fs::read_to_string(path)
    }
}

/// Options controlling document layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Wrap file contents in code fences.
    pub fence_code: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self { fence_code: true }
    }
}

impl DocumentOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fence_code: config.export.fence_code(),
        }
    }
}

/// A selected file whose contents could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableFile {
    pub path: String,
    pub message: String,
}

/// Generated document plus the failures reported inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub files: usize,
    pub unreadable: Vec<UnreadableFile>,
}

/// Renders a sorted selection into the document layout.
#[derive(Debug, Clone, Default)]
pub struct DocumentGenerator {
    options: DocumentOptions,
}

impl DocumentGenerator {
    pub fn new(options: DocumentOptions) -> Self {
        Self { options }
    }

    /// Render the document text. Returns an empty string when the provider has no root.
    pub fn generate<S, P>(&self, selected: &[S], provider: &P) -> String
    where
        S: AsRef<str>,
        P: ContentProvider + ?Sized,
    {
        self.generate_report(selected, provider).text
    }

    /// Render the document and report every file that could not be read.
    ///
    /// A read failure replaces that file's block with an inline notice; the remaining files are
    /// still rendered.
    pub fn generate_report<S, P>(&self, selected: &[S], provider: &P) -> Document
    where
        S: AsRef<str>,
        P: ContentProvider + ?Sized,
    {
        if provider.root().is_none() {
            tracing::debug!("no project root, producing empty document");
            return Document::default();
        }

        let mut paths: Vec<String> = selected
            .iter()
            .map(|path| normalize_path(path.as_ref()))
            .filter(|path| !path.is_empty())
            .collect();
        paths.sort();
        paths.dedup();

        let mut text = String::from(PREAMBLE);
        text.push_str("\nDirectory listing:\n");
        if paths.is_empty() {
            text.push_str("(no files selected)\n");
        } else {
            text.push_str(&directory_listing(&paths));
        }

        let mut unreadable = Vec::new();
        for path in &paths {
            text.push('\n');
            match provider.read_text(path) {
                Ok(contents) => self.push_block(&mut text, path, &contents),
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "failed to read selected file");
                    text.push_str(&format!("=== ERROR READING FILE: {path} ({err}) ===\n"));
                    unreadable.push(UnreadableFile {
                        path: path.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            files = paths.len(),
            unreadable = unreadable.len(),
            bytes = text.len(),
            "generated document"
        );

        Document {
            text,
            files: paths.len(),
            unreadable,
        }
    }

    fn push_block(&self, text: &mut String, path: &str, contents: &str) {
        let contents = normalize_contents(contents);

        text.push_str(&format!("=== BEGIN FILE: {path} ===\n"));
        if self.options.fence_code {
            let fence = fence_for(&contents);
            text.push_str(&fence);
            text.push_str(fence_tag(path).unwrap_or_default());
            text.push('\n');
            if !contents.is_empty() {
                text.push_str(&contents);
                text.push('\n');
            }
            text.push_str(&fence);
            text.push('\n');
        } else if !contents.is_empty() {
            text.push_str(&contents);
            text.push('\n');
        }
        text.push_str(&format!("=== END FILE: {path} ===\n"));
    }
}

/// One line per unique segment of the sorted paths, each directory printed once.
fn directory_listing(paths: &[String]) -> String {
    let mut listing = String::new();
    let mut open: Vec<&str> = Vec::new();

    for path in paths {
        let segments: Vec<&str> = path.split('/').collect();
        let Some((file, directories)) = segments.split_last() else {
            continue;
        };

        let common = open
            .iter()
            .zip(directories)
            .take_while(|(current, directory)| *current == *directory)
            .count();
        open.truncate(common);

        for directory in &directories[common..] {
            listing.push_str(&"  ".repeat(open.len()));
            listing.push_str(directory);
            listing.push_str("/\n");
            open.push(*directory);
        }

        listing.push_str(&"  ".repeat(directories.len()));
        listing.push_str(file);
        listing.push('\n');
    }

    listing
}

/// LF line endings, no trailing whitespace on any line, no trailing blank lines.
fn normalize_contents(contents: &str) -> String {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let unified = contents.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified
        .split('\n')
        .map(str::trim_end)
        .collect();
    let end = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .map_or(0, |last| last + 1);
    lines[..end].join("\n")
}

/// A backtick fence longer than any backtick run inside `contents`.
fn fence_for(contents: &str) -> String {
    let longest = contents
        .split(|ch| ch != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}
