//! Delivery of generated documents.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};

use crate::app::document::Document;
use crate::infra::clipboard::Clipboard;

/// Runtime options controlling where a document goes.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub output_path: Option<PathBuf>,
    pub copy_to_clipboard: bool,
}

/// Result of an export operation.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub output_path: Option<PathBuf>,
    pub copied_to_clipboard: bool,
    pub bytes: usize,
}

/// Responsible for writing documents to disk and the clipboard.
pub struct Exporter {
    clipboard: Mutex<Option<Clipboard>>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    /// The clipboard is only opened on the first copy.
    pub fn new() -> Self {
        Self {
            clipboard: Mutex::new(None),
        }
    }

    /// Persist and/or copy the document according to `options`.
    pub fn export(&self, document: &Document, options: &ExportOptions) -> Result<ExportResult> {
        if let Some(path) = &options.output_path {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create export directory: {}", parent.display())
                })?;
            }
            fs::write(path, &document.text)
                .with_context(|| format!("failed to write export output to {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = document.text.len(), "wrote document");
        }

        if options.copy_to_clipboard {
            let mut guard = self
                .clipboard
                .lock()
                .map_err(|_| anyhow!("clipboard lock poisoned"))?;
            guard
                .get_or_insert_with(Clipboard::new)
                .copy(&document.text)
                .context("failed to copy export to clipboard")?;
            tracing::info!(bytes = document.text.len(), "copied document to clipboard");
        }

        Ok(ExportResult {
            output_path: options.output_path.clone(),
            copied_to_clipboard: options.copy_to_clipboard,
            bytes: document.text.len(),
        })
    }
}
