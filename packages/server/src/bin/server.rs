//! kaiwa relay server.
//!
//! Serves the chat client from the asset directory and relays chat, typing and
//! signaling events between WebSocket connections on `/ws`.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kaiwa-server
//! cargo run --bin kaiwa-server -- --bind 127.0.0.1:3000 --cache 50 --rooms --log DEBUG
//! cargo run --bin kaiwa-server -- --certfile cert.pem --keyfile key.pem
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use kaiwa_server::{
    config::{
        ConfigError, DEFAULT_ASSETS_DIR, DEFAULT_BIND, DEFAULT_COMMAND_FILE, ServerConfig,
        TlsFiles,
    },
    domain::{RoomName, value_object::DEFAULT_ROOM_NAME},
    infrastructure::credential::{CommandIceServerProvider, DEFAULT_COMMAND_TIMEOUT},
    ui::Server,
};
use kaiwa_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "kaiwa-server")]
#[command(about = "Room-based WebSocket chat and signaling relay", long_about = None)]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,

    /// Log level (DEBUG, INFO, WARN, ERROR)
    #[arg(long, default_value = "INFO")]
    log: String,

    /// Number of recent messages replayed to newcomers, per room (0 disables)
    #[arg(long, default_value_t = 0)]
    cache: usize,

    /// Maximum inbound message size in MB
    #[arg(long, default_value_t = 1)]
    readlimit: usize,

    /// Advertise WebRTC signaling to clients
    #[arg(long)]
    signaling: bool,

    /// Let clients pick a room instead of joining the default one
    #[arg(long)]
    rooms: bool,

    /// Room used while room selection is disabled
    #[arg(long, default_value = DEFAULT_ROOM_NAME)]
    default_room: String,

    /// Directory with the static client files
    #[arg(long, default_value = DEFAULT_ASSETS_DIR)]
    assets: PathBuf,

    /// File holding the shell command that prints relay credentials
    #[arg(long, default_value = DEFAULT_COMMAND_FILE)]
    command_file: PathBuf,

    /// PEM certificate chain; serves over TLS together with --keyfile
    #[arg(long)]
    certfile: Option<PathBuf>,

    /// PEM private key; serves over TLS together with --certfile
    #[arg(long)]
    keyfile: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let config = ServerConfig {
            bind: self.bind,
            cache: self.cache,
            read_limit_mb: self.readlimit,
            signaling: self.signaling,
            rooms: self.rooms,
            default_room: RoomName::new(&self.default_room)?,
            assets_dir: self.assets,
            command_file: self.command_file,
            tls: TlsFiles::from_paths(self.certfile, self.keyfile)?,
            ..ServerConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &args.log);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let provider = Arc::new(CommandIceServerProvider::new(
        config.command_file.clone(),
        DEFAULT_COMMAND_TIMEOUT,
    ));
    if let Err(e) = Server::new(config, provider).run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
