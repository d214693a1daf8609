//! Decoding of a `multipart/form-data` request body into a [`Form`].
//!
//! The decoder walks the body part by part:
//!
//! ```text
//! AwaitPrelude ──> ReadHeaders ──> ReadBody ──┐
//!                       ^                     │
//!                       └─────────────────────┘ (until the closing delimiter)
//! ```
//!
//! Uploads (parts with a `filename`) are streamed through the [`BoundaryScanner`] into
//! spool files next to their destination; fields are collected in memory line by line.

use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, trace};

use super::boundary_scanner::BoundaryScanner;
use super::disposition::Disposition;
use super::entity::decode_entities;
use crate::codec::RingReader;
use crate::ensure;
use crate::protocol::{CHECKED, Form, ParseError, Upload};

/// Maximum size in bytes of one part's header block
pub const MAX_PART_HEADER_BYTES: usize = 8 * 1024;

/// Maximum size in bytes of a field value held in memory
pub const MAX_FIELD_BYTES: usize = 16 * 1024 * 1024;

/// Attempts at finding an unused spool file name before giving up
const SPOOL_ATTEMPTS: usize = 16;

#[derive(Debug)]
enum State {
    AwaitPrelude,
    ReadHeaders,
    ReadBody(Disposition),
    Done,
}

/// Decodes one multipart body delimited by a fixed boundary.
pub struct PartDecoder {
    /// `--<boundary>`, the start of every delimiter line
    dash_boundary: Vec<u8>,
    scanner: BoundaryScanner,
    upload_dir: PathBuf,
    state: State,
}

impl PartDecoder {
    /// Creates a decoder for `boundary` spooling uploads into `upload_dir`.
    ///
    /// `capacity` sizes the scanner window and should match the reader's capacity.
    pub fn new(boundary: &str, upload_dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, ParseError> {
        let scanner = BoundaryScanner::new(boundary, capacity)?;
        let dash_boundary = scanner.delimiter()[2..].to_vec();

        Ok(Self { dash_boundary, scanner, upload_dir: upload_dir.into(), state: State::AwaitPrelude })
    }

    /// Reads the whole body from `reader`.
    ///
    /// On error every upload spooled so far is removed with the partially built form.
    pub async fn decode<R>(&mut self, reader: &mut RingReader<R>) -> Result<Form, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let mut form = Form::new();
        let mut line = Vec::with_capacity(256);
        self.state = State::AwaitPrelude;

        loop {
            self.state = match std::mem::replace(&mut self.state, State::Done) {
                State::AwaitPrelude => self.skip_preamble(reader, &mut line).await?,

                State::ReadHeaders => {
                    let disposition = self.read_part_headers(reader, &mut line).await?;
                    if disposition.name.is_some() {
                        State::ReadBody(disposition)
                    } else {
                        // a part without a name (or the end of the stream) ends the form
                        trace!("part without name, form complete");
                        State::Done
                    }
                }

                State::ReadBody(Disposition { name: Some(name), filename: Some(filename) }) => {
                    self.read_upload(reader, &mut form, name, filename).await?
                }

                State::ReadBody(Disposition { name: Some(name), filename: None }) => {
                    self.read_field(reader, &mut form, &mut line, name).await?
                }

                State::ReadBody(Disposition { name: None, .. }) | State::Done => {
                    debug!(fields = form.fields().len(), uploads = form.uploads().len(), "decoded multipart form");
                    return Ok(form);
                }
            };
        }
    }

    async fn skip_preamble<R>(&self, reader: &mut RingReader<R>, line: &mut Vec<u8>) -> Result<State, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let n = reader.read_line_bounded(line, MAX_PART_HEADER_BYTES).await;
            ensure!(n > 0, ParseError::unexpected_eof("multipart preamble"));

            if line.starts_with(&self.dash_boundary) {
                return Ok(if self.is_close_delimiter(line) { State::Done } else { State::ReadHeaders });
            }
        }
    }

    async fn read_part_headers<R>(&self, reader: &mut RingReader<R>, line: &mut Vec<u8>) -> Result<Disposition, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let mut disposition = Disposition::default();
        let mut size = 0;

        loop {
            ensure!(size < MAX_PART_HEADER_BYTES, ParseError::too_large_header(size, MAX_PART_HEADER_BYTES));

            let n = reader.read_line_bounded(line, MAX_PART_HEADER_BYTES - size).await;
            if n == 0 {
                // end of stream where a part should start
                return Ok(Disposition::default());
            }

            size += n;
            ensure!(line.ends_with(b"\n") || size < MAX_PART_HEADER_BYTES, ParseError::too_large_header(size, MAX_PART_HEADER_BYTES));

            let text = String::from_utf8_lossy(&line[..]);
            let text = text.trim_end_matches('\n');
            if text.is_empty() {
                return Ok(disposition);
            }

            disposition.absorb_line(text);
        }
    }

    async fn read_upload<R>(&mut self, reader: &mut RingReader<R>, form: &mut Form, name: String, filename: String) -> Result<State, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let name = decode_entities(&name).into_owned();
        let filename = decode_entities(&filename).into_owned();

        if filename.is_empty() {
            // a file input left empty still sends its part, with no content worth keeping
            self.scanner.scan(reader, &mut tokio::io::sink()).await?;
            form.push_field(name, filename);
            return Ok(self.after_upload(reader).await);
        }

        let (mut file, path) = create_spool_file(&self.upload_dir).await?;
        // owns the spool file from here on, removing it if anything below fails
        let mut upload = Upload::new(filename, path);

        let size = self.scanner.scan(reader, &mut file).await.map_err(|e| match e {
            ParseError::Io { source } => ParseError::spool(upload.spool_path(), source),
            e => e,
        })?;
        file.flush().await.map_err(|e| ParseError::spool(upload.spool_path(), e))?;
        drop(file);

        upload.set_size(size);
        debug!(name = %name, filename = upload.filename(), size, path = %upload.spool_path().display(), "spooled upload");

        form.push_field(name, upload.filename().to_owned());
        form.push_upload(upload);

        Ok(self.after_upload(reader).await)
    }

    /// Consumes the two bytes following a body delimiter: `--` closes the form,
    /// anything else (normally `\r\n`) announces another part.
    async fn after_upload<R>(&self, reader: &mut RingReader<R>) -> State
    where
        R: AsyncRead + Unpin,
    {
        let first = reader.read_byte().await;
        let second = reader.read_byte().await;

        match (first, second) {
            (Some(b'-'), Some(b'-')) => State::Done,
            _ => State::ReadHeaders,
        }
    }

    async fn read_field<R>(&self, reader: &mut RingReader<R>, form: &mut Form, line: &mut Vec<u8>, name: String) -> Result<State, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let mut value = Vec::new();

        let next = loop {
            // room for the delimiter line on top of the remaining value budget
            let limit = MAX_FIELD_BYTES - value.len() + self.dash_boundary.len() + 2;
            let n = reader.read_line_bounded(line, limit).await;
            ensure!(n > 0, ParseError::unexpected_eof("form field"));

            if line.starts_with(&self.dash_boundary) {
                break if self.is_close_delimiter(line) { State::Done } else { State::ReadHeaders };
            }

            ensure!(value.len() + line.len() <= MAX_FIELD_BYTES, ParseError::field_too_large(MAX_FIELD_BYTES));
            value.extend_from_slice(line);
        };

        if value.last() == Some(&b'\n') {
            value.pop();
        }

        let name = decode_entities(&name).into_owned();
        let value = String::from_utf8_lossy(&value);

        if value == CHECKED {
            trace!(name = %name, "checked item");
            form.push_checked(name);
        } else {
            let value = decode_entities(&value).into_owned();
            trace!(name = %name, size = value.len(), "form field");
            form.push_field(name, value);
        }

        Ok(next)
    }

    fn is_close_delimiter(&self, line: &[u8]) -> bool {
        line[self.dash_boundary.len()..].starts_with(b"--")
    }
}

/// Creates `<dir>/.temp<36 hex digits>` exclusively, retrying on name collisions.
async fn create_spool_file(dir: &Path) -> Result<(File, PathBuf), ParseError> {
    let mut last_error = None;

    for _ in 0..SPOOL_ATTEMPTS {
        let path = dir.join(spool_name());
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                trace!(path = %path.display(), "spool name taken, retrying");
                last_error = Some((path, e));
            }
            Err(e) => return Err(ParseError::spool(path, e)),
        }
    }

    let (path, e) = last_error.unwrap_or_else(|| (dir.to_path_buf(), io::Error::other("no spool attempt made")));
    Err(ParseError::spool(path, e))
}

fn spool_name() -> String {
    let mut rng = rand::thread_rng();
    format!(".temp{:032x}{:04x}", rng.r#gen::<u128>(), rng.r#gen::<u16>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_support::ChunkedReader;
    use crate::codec::DEFAULT_CAPACITY;
    use indoc::indoc;
    use std::fs;

    /// Converts an indoc fixture to wire format.
    fn wire(text: &str) -> String {
        text.replace('\n', "\r\n")
    }

    async fn decode(body: &str, boundary: &str, dir: &Path, step: usize) -> Result<Form, ParseError> {
        let mut reader = RingReader::new(ChunkedReader::new(body, step));
        let mut decoder = PartDecoder::new(boundary, dir, DEFAULT_CAPACITY)?;
        decoder.decode(&mut reader).await
    }

    fn spool_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.file_name().unwrap().to_string_lossy().starts_with(".temp"))
            .collect()
    }

    #[tokio::test]
    async fn delete_request_with_checked_file() {
        let body = wire(indoc! {r#"
            --XYZ
            Content-Disposition: form-data; name="__DELETE"

            __DELETE
            --XYZ
            Content-Disposition: form-data; name="foo.txt"

            __CHECKED
            --XYZ--
        "#});
        let dir = tempfile::tempdir().unwrap();

        let form = decode(&body, "XYZ", dir.path(), 5).await.unwrap();

        assert_eq!(form.fields(), &[("__DELETE".to_owned(), "__DELETE".to_owned())]);
        assert_eq!(form.checked(), &["foo.txt".to_owned()]);
        assert!(form.uploads().is_empty());
        assert!(spool_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn two_uploads_and_a_checkbox() {
        let body = wire(indoc! {r#"
            --b0undary
            Content-Disposition: form-data; name="file"; filename="a.txt"
            Content-Type: text/plain

            alpha
            --b0undary
            Content-Disposition: form-data; name="file"; filename="b&#233;ta.bin"
            Content-Type: application/octet-stream

            --b0undar
            --b0undary
            Content-Disposition: form-data; name="notes.md"

            __CHECKED
            --b0undary
            Content-Disposition: form-data; name="__UPLOAD"

            Upload
            --b0undary--
        "#});
        let dir = tempfile::tempdir().unwrap();

        for step in [1, 3, body.len()] {
            let form = decode(&body, "b0undary", dir.path(), step).await.unwrap();

            assert_eq!(form.checked(), &["notes.md".to_owned()]);
            assert_eq!(form.get_all("file").collect::<Vec<_>>(), vec!["a.txt", "béta.bin"]);
            assert_eq!(form.get("__UPLOAD"), Some("Upload"));

            let uploads = form.uploads();
            assert_eq!(uploads.len(), 2);
            assert_eq!(uploads[0].filename(), "a.txt");
            assert_eq!(fs::read(uploads[0].spool_path()).unwrap(), b"alpha");
            assert_eq!(uploads[1].filename(), "béta.bin");
            assert_eq!(fs::read(uploads[1].spool_path()).unwrap(), b"--b0undar");
            assert_eq!(uploads[1].size(), 9);

            let name = uploads[0].spool_path().file_name().unwrap().to_string_lossy().into_owned();
            assert_eq!(name.len(), ".temp".len() + 36);
            assert!(name[5..].chars().all(|c| c.is_ascii_hexdigit()));

            drop(form);
            assert!(spool_files(dir.path()).is_empty(), "read size {step}");
        }
    }

    #[test]
    fn spool_names_are_random_hex() {
        let names: Vec<String> = (0..64).map(|_| spool_name()).collect();
        for name in &names {
            assert_eq!(name.len(), 41);
            assert!(name.starts_with(".temp"));
            assert!(name[5..].bytes().all(|b| b.is_ascii_hexdigit()));
        }

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }

    #[tokio::test]
    async fn binary_upload_keeps_crlf() {
        let payload = b"\r\n\x00\xff--\r\n-\r\n";
        let mut body = Vec::new();
        body.extend_from_slice(b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"raw\"\r\n\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n--B--\r\n");
        let dir = tempfile::tempdir().unwrap();

        let mut reader = RingReader::new(ChunkedReader::new(body, 2));
        let mut decoder = PartDecoder::new("B", dir.path(), DEFAULT_CAPACITY).unwrap();
        let form = decoder.decode(&mut reader).await.unwrap();

        assert_eq!(fs::read(form.uploads()[0].spool_path()).unwrap(), payload);
    }

    #[tokio::test]
    async fn multiline_field_and_entities() {
        let body = wire(indoc! {r#"
            preamble to ignore
            --XYZ
            Content-Disposition: form-data; name="__EDITTEXT"

            first line
            caf&#233; & more

            --XYZ
            Content-Disposition: form-data; name="caf&#233;.txt"

            renamed &#8364;.txt
            --XYZ--
        "#});
        let dir = tempfile::tempdir().unwrap();

        let form = decode(&body, "XYZ", dir.path(), 7).await.unwrap();

        assert_eq!(form.get("__EDITTEXT"), Some("first line\ncafé & more\n"));
        assert_eq!(form.get("café.txt"), Some("renamed €.txt"));
    }

    #[tokio::test]
    async fn empty_form_and_empty_file_input() {
        let dir = tempfile::tempdir().unwrap();

        let form = decode("--XYZ--\r\n", "XYZ", dir.path(), 100).await.unwrap();
        assert!(form.is_empty());

        let body = wire(indoc! {r#"
            --XYZ
            Content-Disposition: form-data; name="file"; filename=""
            Content-Type: application/octet-stream


            --XYZ--
        "#});
        let form = decode(&body, "XYZ", dir.path(), 100).await.unwrap();
        assert_eq!(form.get("file"), Some(""));
        assert!(form.uploads().is_empty());
        assert!(spool_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn decoding_is_repeatable() {
        let body = wire(indoc! {r#"
            --XYZ
            Content-Disposition: form-data; name="__MOVEPATH"

            /sdcard/Music
            --XYZ
            Content-Disposition: form-data; name="a.mp3"

            __CHECKED
            --XYZ
            Content-Disposition: form-data; name="__MOVE"

            Move
            --XYZ--
        "#});
        let dir = tempfile::tempdir().unwrap();

        let first = decode(&body, "XYZ", dir.path(), 1).await.unwrap();
        let second = decode(&body, "XYZ", dir.path(), body.len()).await.unwrap();

        assert_eq!(first.fields(), second.fields());
        assert_eq!(first.checked(), second.checked());
    }

    #[tokio::test]
    async fn truncated_upload_removes_spool_file() {
        let body = wire(indoc! {r#"
            --XYZ
            Content-Disposition: form-data; name="file"; filename="ok.txt"

            complete
            --XYZ
            Content-Disposition: form-data; name="file"; filename="cut.txt"

            this upload never ends"#});
        let dir = tempfile::tempdir().unwrap();

        let result = decode(&body, "XYZ", dir.path(), 4).await;

        assert!(matches!(result, Err(ParseError::BoundaryNotFound)));
        assert!(spool_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn truncated_field_is_an_error() {
        let body = wire(indoc! {r#"
            --XYZ
            Content-Disposition: form-data; name="__MKDIRPATH"

            new"#});
        let dir = tempfile::tempdir().unwrap();

        let result = decode(&body, "XYZ", dir.path(), 4).await;
        assert!(matches!(result, Err(ParseError::UnexpectedEof { .. })));

        let result = decode("no delimiter at all", "XYZ", dir.path(), 4).await;
        assert!(matches!(result, Err(ParseError::UnexpectedEof { .. })));
    }

    #[tokio::test]
    async fn end_of_stream_between_parts_ends_form() {
        let body = wire(indoc! {r#"
            --XYZ
            Content-Disposition: form-data; name="__MKDIR"

            Create
            --XYZ
        "#});
        let dir = tempfile::tempdir().unwrap();

        let form = decode(&body, "XYZ", dir.path(), 3).await.unwrap();
        assert_eq!(form.get("__MKDIR"), Some("Create"));
    }

    #[tokio::test]
    async fn unwritable_upload_dir_is_server_side() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let body = wire(indoc! {r#"
            --XYZ
            Content-Disposition: form-data; name="file"; filename="a.txt"

            data
            --XYZ--
        "#});

        let error = decode(&body, "XYZ", &missing, 100).await.unwrap_err();
        assert!(error.is_server_side());
    }
}
