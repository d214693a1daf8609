//! A file manager driven from a web browser.
//!
//! [`FileManager`] implements [`webphone_http::handler::Handler`]: `GET` on a directory
//! renders a sortable listing with forms for uploading, creating directories and acting on
//! the checked entries, `GET` on a file streams it back, and `POST` runs the action named
//! by the submit button. Every action either renders a page or an error page linking back
//! to the directory it came from.
//!
//! # Example
//!
//! ```no_run
//! use webphone_web::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), webphone_web::ServerError> {
//!     Server::builder().root("/sdcard").settings_path("/tmp/webphone.json").build()?.start().await
//! }
//! ```
//!
//! # Modules
//!
//! - [`paths`]: mapping request paths and typed names onto the served directory
//! - [`settings`]: listing sort order, persisted as JSON
//! - [`listing`]: reading, sorting and rendering directories
//! - [`actions`]: the form actions (upload, delete, move, rename, mkdir, edit)
//! - [`html`]: entity and href encoding, page scaffolding

pub mod actions;
mod body;
mod date;
mod error;
mod handler;
pub mod html;
pub mod listing;
pub mod paths;
mod responder;
mod server;
pub mod settings;

pub use body::ResponseBody;
pub use error::{ActionError, ErrorPage};
pub use handler::FileManager;
pub use responder::{Html, Responder};
pub use server::{BoundServer, DEFAULT_WORKERS, Server, ServerBuilder, ServerError};
pub use settings::{SettingsStore, SortKey, SortSettings};
