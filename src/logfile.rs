//! Append-only deployment log files.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::DeployResult;

/// Handle on a deployment's log file. Writes after [`close`]
/// are silently dropped so trailing progress callbacks can't fail
/// an attempt that is already winding down.
///
/// [`close`]: LogFile::close
pub struct LogFile {
    path: PathBuf,
    file: Option<File>,
}

impl LogFile {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> DeployResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn writable(&self) -> bool {
        self.file.is_some()
    }

    /// Append one line.
    pub fn line(&mut self, text: &str) -> DeployResult<()> {
        if let Some(file) = &mut self.file {
            writeln!(file, "{text}")?;
        }
        Ok(())
    }

    /// Append a step banner, separated from previous output by a
    /// blank line.
    pub fn banner(&mut self, text: &str) -> DeployResult<()> {
        self.line("")?;
        self.line(&format!("==> {text}"))
    }

    /// Append raw command output, making sure it ends on a line
    /// boundary.
    pub fn output(&mut self, text: &str) -> DeployResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(file) = &mut self.file {
            file.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                file.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    /// Progress line from a streaming primitive. Never fails.
    pub fn progress(&mut self, text: &str) {
        if self.writable() {
            // A lost progress line isn't worth failing the pull over.
            let _ = self.line(text);
        }
    }

    pub fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        self.close();
    }
}
