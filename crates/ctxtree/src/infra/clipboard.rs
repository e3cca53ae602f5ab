//! System clipboard access for generated documents.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};

/// Clipboard handle preferring `arboard`, falling back to platform copy commands on headless
/// sessions where no clipboard server is reachable.
pub struct Clipboard {
    native: Option<arboard::Clipboard>,
}

impl Clipboard {
    pub fn new() -> Self {
        let native = match arboard::Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(err) => {
                tracing::debug!(error = %err, "native clipboard unavailable");
                None
            }
        };
        Self { native }
    }

    /// Place `text` on the clipboard.
    pub fn copy(&mut self, text: &str) -> Result<()> {
        if let Some(native) = self.native.as_mut() {
            match native.set_text(text.to_owned()) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::debug!(error = %err, "native clipboard rejected text");
                    self.native = None;
                }
            }
        }
        copy_with_commands(text, copy_commands())
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_with_commands(text: &str, commands: &[&[&str]]) -> Result<()> {
    for command in commands {
        match pipe_to_command(command, text) {
            Ok(()) => return Ok(()),
            Err(err) => tracing::debug!(error = %err, "clipboard command failed"),
        }
    }
    Err(anyhow!("no clipboard backend accepted the document"))
}

fn pipe_to_command(command: &[&str], text: &str) -> Result<()> {
    let (program, args) = command
        .split_first()
        .context("clipboard command missing program")?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn clipboard command: {program}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .context("failed to write clipboard contents")?;
    }

    let status = child
        .wait()
        .with_context(|| format!("clipboard command did not exit cleanly: {program}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("{program} exited with status {status}"))
    }
}

#[cfg(target_os = "macos")]
fn copy_commands() -> &'static [&'static [&'static str]] {
    &[&["pbcopy"]]
}

#[cfg(all(unix, not(target_os = "macos")))]
fn copy_commands() -> &'static [&'static [&'static str]] {
    &[
        &["wl-copy"],
        &["xclip", "-selection", "clipboard"],
        &["xsel", "--clipboard", "--input"],
    ]
}

#[cfg(target_os = "windows")]
fn copy_commands() -> &'static [&'static [&'static str]] {
    &[&["powershell.exe", "-NoProfile", "-Command", "Set-Clipboard"]]
}

#[cfg(not(any(unix, target_os = "windows")))]
fn copy_commands() -> &'static [&'static [&'static str]] {
    &[]
}
