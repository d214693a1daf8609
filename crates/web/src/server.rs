use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;
use webphone_http::server::{DEFAULT_PORTS, WorkerPool, bind_first_free, serve};

use crate::handler::FileManager;
use crate::settings::{SettingsStore, SortSettings};

/// Number of connections served at the same time when none is configured.
pub const DEFAULT_WORKERS: usize = 20;

#[derive(Debug)]
pub struct ServerBuilder {
    root: Option<PathBuf>,
    host: IpAddr,
    ports: Range<u16>,
    workers: usize,
    settings_path: Option<PathBuf>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            root: None,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ports: DEFAULT_PORTS,
            workers: DEFAULT_WORKERS,
            settings_path: None,
        }
    }

    /// The directory served as `/`.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Ports to try in ascending order, end exclusive.
    pub fn ports(mut self, ports: Range<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// File the sort settings are loaded from and saved to. Without one they only last
    /// as long as the process.
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Server, ServerError> {
        let root = self.root.ok_or(ServerError::MissingRoot)?;
        let root = root.canonicalize().map_err(|source| ServerError::InvalidRoot { path: root.clone(), source })?;
        if !root.is_dir() {
            return Err(ServerError::InvalidRoot { path: root, source: io::Error::from(io::ErrorKind::NotADirectory) });
        }
        if self.workers == 0 {
            return Err(ServerError::NoWorkers);
        }

        Ok(Server { root, host: self.host, ports: self.ports, workers: self.workers, settings_path: self.settings_path })
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("root directory must be set")]
    MissingRoot,

    #[error("can't serve {path}: {source}")]
    InvalidRoot { path: PathBuf, source: io::Error },

    #[error("at least one worker is needed")]
    NoWorkers,

    #[error("can't bind a port in {}..{}: {source}", ports.start, ports.end)]
    Bind { ports: Range<u16>, source: io::Error },
}

#[derive(Debug)]
pub struct Server {
    root: PathBuf,
    host: IpAddr,
    ports: Range<u16>,
    workers: usize,
    settings_path: Option<PathBuf>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Loads the settings and binds the first free port, ready to serve.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let settings = match &self.settings_path {
            Some(path) => SettingsStore::load(path).await,
            None => SettingsStore::in_memory(SortSettings::default()),
        };

        let listener = bind_first_free(self.host, self.ports.clone())
            .await
            .map_err(|source| ServerError::Bind { ports: self.ports.clone(), source })?;

        let manager = FileManager::new(self.root, Arc::new(settings));
        Ok(BoundServer { listener, manager: Arc::new(manager), workers: self.workers })
    }

    /// Binds and serves until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        self.bind().await?.run().await;
        Ok(())
    }
}

/// A server with its listening socket, not accepting connections yet.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    manager: Arc<FileManager>,
    workers: usize,
}

impl BoundServer {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, root = %self.manager.root().display(), workers = self.workers, "serving files");
        }
        serve(self.listener, WorkerPool::start(self.workers, self.manager)).await;
    }
}
