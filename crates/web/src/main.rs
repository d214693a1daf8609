use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use webphone_web::{DEFAULT_WORKERS, Server};

/// Manage the files of this machine from a browser.
#[derive(Parser, Debug)]
#[command(name = "webphone", version, about)]
struct Cli {
    /// Directory served as `/`
    #[arg(long, env = "WEBPHONE_ROOT", default_value = "/")]
    root: PathBuf,

    /// Address to listen on
    #[arg(long, env = "WEBPHONE_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// First port tried
    #[arg(long, env = "WEBPHONE_PORT", default_value_t = 8088)]
    port: u16,

    /// Ports up to this one, exclusive, are tried when the first is taken
    #[arg(long, env = "WEBPHONE_PORT_END", default_value_t = 8098)]
    port_end: u16,

    /// Connections served at the same time
    #[arg(long, env = "WEBPHONE_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Sort settings file, `$HOME/.webphone.json` by default
    #[arg(long, env = "WEBPHONE_SETTINGS")]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let mut builder = Server::builder().root(cli.root).host(cli.host).ports(cli.port..cli.port_end).workers(cli.workers);
    let settings = cli.settings.or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".webphone.json")));
    if let Some(path) = settings {
        builder = builder.settings_path(path);
    }

    let result = match builder.build() {
        Ok(server) => server.start().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(cause = %e, "webphone stopped");
            ExitCode::FAILURE
        }
    }
}
