use std::io;
use std::path::Path;

use http::{Response, StatusCode};
use thiserror::Error;

use crate::body::ResponseBody;
use crate::html::{encode_html, page};
use crate::paths::PathError;
use crate::responder::{Html, Responder};

/// A file manager request that couldn't be carried out.
///
/// These never abort the connection: the client gets an error page instead.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{0} was not found on this server")]
    NotFound(String),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("no file selected")]
    NothingSelected,

    #[error("no directory name given")]
    MissingName,

    #[error("no new name submitted for {0}")]
    MissingNewName(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{path} has {size} bytes, the editor takes at most {max}")]
    TooLarge { path: String, size: u64, max: u64 },

    #[error("couldn't {action} {path}: {source}")]
    Io { action: &'static str, path: String, source: io::Error },
}

impl ActionError {
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io { action, path: path.display().to_string(), source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::Path(PathError::Escapes(_) | PathError::NotUtf8(_)) => StatusCode::NOT_FOUND,
            Self::Path(PathError::InvalidName(_))
            | Self::NothingSelected
            | Self::MissingName
            | Self::MissingNewName(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Io { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// An [`ActionError`] rendered as a page linking back to where the user came from.
#[derive(Debug)]
pub struct ErrorPage {
    error: ActionError,
    back: String,
}

impl ErrorPage {
    /// `back` is an already encoded href.
    pub fn new(error: ActionError, back: impl Into<String>) -> Self {
        Self { error, back: back.into() }
    }

    pub fn error(&self) -> &ActionError {
        &self.error
    }
}

impl Responder for ErrorPage {
    fn response_to(self) -> Response<ResponseBody> {
        let status = self.error.status();
        let reason = status.canonical_reason().unwrap_or("Error");
        let title = format!("{} {reason}", status.as_u16());

        let body = format!(
            "<H1>{reason}</H1>\r\n{}<P>\r\n<A HREF=\"{}\">BACK</A>\r\n<HR><ADDRESS>WebPhone</ADDRESS>\r\n",
            encode_html(&self.error.to_string()),
            self.back
        );
        (status, Html(page(&title, &body))).response_to()
    }
}
