use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use http::header::{ALLOW, CONTENT_TYPE, DATE, SERVER};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use tracing::{debug, info, warn};
use webphone_http::handler::Handler;
use webphone_http::protocol::{Form, RequestHeader};

use crate::actions::{Action, Directory};
use crate::body::ResponseBody;
use crate::date::DateService;
use crate::error::{ActionError, ErrorPage};
use crate::html::{encode_href, page};
use crate::paths::Location;
use crate::responder::{Html, Responder};
use crate::settings::SettingsStore;

/// The file manager: serves the tree below `root` to a browser.
///
/// GET requests list directories and download files, POST requests run the action
/// named by the submitted form.
#[derive(Debug)]
pub struct FileManager {
    root: PathBuf,
    settings: Arc<SettingsStore>,
    date_service: DateService,
}

impl FileManager {
    /// Must be created within a tokio runtime.
    pub fn new(root: impl Into<PathBuf>, settings: Arc<SettingsStore>) -> Self {
        Self { root: root.into(), settings, date_service: DateService::start() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn respond(&self, request: Request<Form>) -> Response<ResponseBody> {
        let (parts, form) = request.into_parts();
        let header = RequestHeader::from(parts);

        if let Some(command) = header.command() {
            self.settings.apply_command(command).await;
        }

        let location = match Location::from_request_path(&self.root, header.uri().path()) {
            Ok(location) => location,
            Err(e) => {
                warn!(cause = %e, path = header.uri().path(), "refused request path");
                return ErrorPage::new(e.into(), "/").response_to();
            }
        };

        match header.method() {
            &Method::GET => self.get(&location).await,
            &Method::POST => self.post(&location, form).await,
            method => {
                debug!(%method, "method not allowed");
                let body = page("405 Method Not Allowed", "<H1>Method Not Allowed</H1>\r\n");
                let mut response = (StatusCode::METHOD_NOT_ALLOWED, Html(body)).response_to();
                response.headers_mut().insert(ALLOW, HeaderValue::from_static("GET, POST"));
                response
            }
        }
    }

    /// Lists a directory or sends a file.
    async fn get(&self, location: &Location) -> Response<ResponseBody> {
        let path = location.fs_path();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %path.display(), cause = %e, "can't stat");
                let error = ActionError::NotFound(location.url_path());
                return ErrorPage::new(error, encode_href(&location.parent(&self.root).url_path())).response_to();
            }
        };

        if metadata.is_dir() {
            return self.directory(location).listing().await.map_err(|e| self.error_page(location, e)).response_to();
        }

        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                let error = ActionError::io("open", path, e);
                return ErrorPage::new(error, encode_href(&location.parent(&self.root).url_path())).response_to();
            }
        };

        let content_type = mime_guess::from_path(path).first_or_text_plain();
        info!(path = %path.display(), size = metadata.len(), %content_type, "sending file");

        let mut response = Response::new(ResponseBody::file(file, metadata.len()));
        if let Ok(value) =
            HeaderValue::from_str(content_type.as_ref()).or_else(|_| HeaderValue::from_str(mime::TEXT_PLAIN.as_ref()))
        {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
    }

    async fn post(&self, location: &Location, form: Form) -> Response<ResponseBody> {
        let action = Action::from_form(&form);
        let (checked, uploads) = (form.checked().len(), form.uploads().len());
        info!(?action, path = %location.url_path(), checked, uploads, "running action");

        self.directory(location).run(action, form).await.map_err(|e| self.error_page(location, e)).response_to()
    }

    fn directory<'a>(&'a self, location: &'a Location) -> Directory<'a> {
        Directory { root: &self.root, location, sort: self.settings.current() }
    }

    fn error_page(&self, location: &Location, error: ActionError) -> ErrorPage {
        warn!(cause = %error, path = %location.url_path(), "action failed");
        ErrorPage::new(error, encode_href(&location.url_path()))
    }
}

#[async_trait]
impl Handler for FileManager {
    type RespBody = ResponseBody;
    type Error = Infallible;

    async fn call(&self, req: Request<Form>) -> Result<Response<Self::RespBody>, Self::Error> {
        let mut response = self.respond(req).await;

        let headers = response.headers_mut();
        headers.insert(SERVER, HeaderValue::from_static("WebPhone"));
        if let Some(date) = self.date_service.http_date() {
            headers.insert(DATE, date);
        }
        Ok(response)
    }

    /// Uploads are spooled into the target directory, so storing them is a rename.
    async fn upload_dir(&self, header: &RequestHeader) -> PathBuf {
        if let Ok(location) = Location::from_request_path(&self.root, header.uri().path())
            && let Ok(metadata) = tokio::fs::metadata(location.fs_path()).await
            && metadata.is_dir()
        {
            return location.fs_path().to_path_buf();
        }
        std::env::temp_dir()
    }
}
