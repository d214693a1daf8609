//! The decoded multipart form handed to request handlers.
//!
//! A [`Form`] is the whole contract between the transport core and whatever acts on a
//! POST request: the ordered field table, the names that were submitted as selected
//! items, and the uploads spooled to disk while the request was read.

use std::path::{Path, PathBuf};
use std::{fs, io};

use tracing::{debug, warn};

/// Field value marking its field name as a selected item rather than data.
pub const CHECKED: &str = "__CHECKED";

/// Ordered, multi-valued form content of one request.
///
/// Duplicate names are kept in submission order; nothing is ever overwritten.
#[derive(Debug, Default)]
pub struct Form {
    fields: Vec<(String, String)>,
    checked: Vec<String>,
    uploads: Vec<Upload>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_field(&mut self, name: String, value: String) {
        self.fields.push((name, value));
    }

    pub(crate) fn push_checked(&mut self, name: String) {
        self.checked.push(name);
    }

    pub(crate) fn push_upload(&mut self, upload: Upload) {
        self.uploads.push(upload);
    }

    /// All `(name, value)` pairs in the order the parts were received.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// The first value submitted under `name`.
    pub fn get<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.fields.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Every value submitted under `name`, in order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.fields.iter().filter(move |(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == name)
    }

    /// Names of the fields whose value was [`CHECKED`].
    pub fn checked(&self) -> &[String] {
        &self.checked
    }

    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    /// Takes ownership of the spooled uploads, leaving none behind in the form.
    pub fn take_uploads(&mut self) -> Vec<Upload> {
        std::mem::take(&mut self.uploads)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.checked.is_empty() && self.uploads.is_empty()
    }
}

/// An uploaded file spooled to a temporary path.
///
/// The spool file is removed when the value is dropped, unless [`Upload::persist`]
/// moved it to its final place first.
#[derive(Debug)]
pub struct Upload {
    filename: String,
    path: PathBuf,
    size: u64,
    kept: bool,
}

impl Upload {
    pub(crate) fn new(filename: String, path: PathBuf) -> Self {
        Self { filename, path, size: 0, kept: false }
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// The decoded client-side file name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn spool_path(&self) -> &Path {
        &self.path
    }

    /// Number of body bytes written to the spool file.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Renames the spool file to `target`.
    ///
    /// On failure the spool file is discarded along with `self`.
    pub async fn persist(mut self, target: &Path) -> io::Result<()> {
        tokio::fs::rename(&self.path, target).await?;
        debug!(from = %self.path.display(), to = %target.display(), "persisted upload");
        self.kept = true;
        Ok(())
    }
}

impl Drop for Upload {
    fn drop(&mut self) {
        if self.kept {
            return;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "discarded spool file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), cause = %e, "can't remove spool file"),
        }
    }
}
