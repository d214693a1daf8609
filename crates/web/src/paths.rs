//! Mapping of request paths and submitted names below the served root.
//!
//! Every path the file manager touches goes through [`Location`]: URL paths are
//! percent-decoded and split into segments, so no request can reach outside the root.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("{0} is not valid UTF-8 once decoded")]
    NotUtf8(String),

    #[error("{0} leaves the served directory")]
    Escapes(String),

    #[error("{0:?} is not a valid file name")]
    InvalidName(String),
}

/// A directory or file below the served root, known by its URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    segments: Vec<String>,
    fs_path: PathBuf,
}

impl Location {
    /// Maps a raw request path, e.g. `/sdcard/My%20Music/`, below `root`.
    ///
    /// `.` and empty segments are dropped; a `..` segment is refused outright.
    pub fn from_request_path(root: &Path, raw: &str) -> Result<Self, PathError> {
        let decoded = urlencoding::decode(raw).ok().ok_or_else(|| PathError::NotUtf8(raw.to_owned()))?;

        let mut segments = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(PathError::Escapes(decoded.to_string())),
                segment => segments.push(segment.to_owned()),
            }
        }

        Ok(Self::from_segments(root, segments))
    }

    fn from_segments(root: &Path, segments: Vec<String>) -> Self {
        let fs_path = segments.iter().fold(root.to_path_buf(), |path, segment| path.join(segment));
        Self { segments, fs_path }
    }

    /// The decoded URL path: `/` for the root, no trailing slash otherwise.
    pub fn url_path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn fs_path(&self) -> &Path {
        &self.fs_path
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The containing directory; the root is its own parent.
    pub fn parent(&self, root: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self::from_segments(root, segments)
    }

    /// Resolves a user-typed path, such as a move destination.
    ///
    /// Absolute paths start at the root, relative ones at this location. `..` steps up
    /// one level but never above the root.
    pub fn resolve(&self, root: &Path, target: &str) -> Result<Self, PathError> {
        let mut segments = if target.starts_with('/') { Vec::new() } else { self.segments.clone() };

        for segment in target.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(PathError::Escapes(target.to_owned()));
                    }
                }
                segment => segments.push(segment.to_owned()),
            }
        }

        Ok(Self::from_segments(root, segments))
    }

    /// The path of the entry called `name` in this directory.
    pub fn child(&self, name: &str) -> Result<PathBuf, PathError> {
        Ok(self.fs_path.join(entry_name(name)?))
    }
}

/// Checks that `name` names a single directory entry.
pub fn entry_name(name: &str) -> Result<&str, PathError> {
    let valid = !matches!(name, "" | "." | "..") && !name.contains(['/', '\\', '\0']);
    if valid { Ok(name) } else { Err(PathError::InvalidName(name.to_owned())) }
}

/// Strips any directory part some browsers send along with an upload's file name.
pub fn upload_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/phone")
    }

    #[test]
    fn maps_request_paths() {
        let location = Location::from_request_path(&root(), "/sdcard/My%20Music/").unwrap();
        assert_eq!(location.url_path(), "/sdcard/My Music");
        assert_eq!(location.fs_path(), Path::new("/srv/phone/sdcard/My Music"));

        let location = Location::from_request_path(&root(), "/").unwrap();
        assert!(location.is_root());
        assert_eq!(location.url_path(), "/");
        assert_eq!(location.fs_path(), root());
    }

    #[test]
    fn decodes_utf8_and_question_marks() {
        let location = Location::from_request_path(&root(), "/caf%C3%A9/why%3F.txt").unwrap();
        assert_eq!(location.url_path(), "/café/why?.txt");
    }

    #[test]
    fn refuses_parent_segments() {
        assert_eq!(
            Location::from_request_path(&root(), "/sdcard/../../etc/passwd"),
            Err(PathError::Escapes("/sdcard/../../etc/passwd".to_owned()))
        );
        assert_eq!(
            Location::from_request_path(&root(), "/%2e%2e/etc"),
            Err(PathError::Escapes("/../etc".to_owned()))
        );
        assert!(matches!(Location::from_request_path(&root(), "/%FF"), Err(PathError::NotUtf8(_))));
    }

    #[test]
    fn parent_of_root_is_root() {
        let location = Location::from_request_path(&root(), "/sdcard/DCIM").unwrap();
        assert_eq!(location.parent(&root()).url_path(), "/sdcard");
        assert_eq!(location.parent(&root()).parent(&root()).parent(&root()).url_path(), "/");
    }

    #[test]
    fn resolves_typed_paths() {
        let here = Location::from_request_path(&root(), "/sdcard/DCIM").unwrap();

        assert_eq!(here.resolve(&root(), "Camera").unwrap().url_path(), "/sdcard/DCIM/Camera");
        assert_eq!(here.resolve(&root(), "../Music/").unwrap().url_path(), "/sdcard/Music");
        assert_eq!(here.resolve(&root(), "/tmp").unwrap().fs_path(), Path::new("/srv/phone/tmp"));
        assert_eq!(here.resolve(&root(), "").unwrap(), here);
        assert!(matches!(here.resolve(&root(), "../../.."), Err(PathError::Escapes(_))));
    }

    #[test]
    fn entry_names() {
        assert_eq!(entry_name("notes.txt"), Ok("notes.txt"));
        assert_eq!(entry_name(".hidden"), Ok(".hidden"));
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(entry_name(bad).is_err(), "{bad}");
        }

        let here = Location::from_request_path(&root(), "/sdcard").unwrap();
        assert_eq!(here.child("a.txt").unwrap(), Path::new("/srv/phone/sdcard/a.txt"));
        assert!(here.child("../a.txt").is_err());
    }

    #[test]
    fn upload_names_lose_client_directories() {
        assert_eq!(upload_name("photo.jpg"), "photo.jpg");
        assert_eq!(upload_name("C:\\Users\\me\\photo.jpg"), "photo.jpg");
        assert_eq!(upload_name("dir/photo.jpg"), "photo.jpg");
    }
}
