//! Server execution logic.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{Router, middleware, routing::get};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use kaiwa_shared::time::SystemClock;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    config::{ConfigError, ServerConfig},
    domain::IceServerProvider,
    hub::HubHandle,
    infrastructure::static_files::{AssetRoot, conditional_etag},
    usecase::{Features, build_dispatch_table},
};

use super::{
    handler::{get_room_detail, get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS certificate or key: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// WebSocket relay server
///
/// # Example
///
/// ```ignore
/// let provider = Arc::new(CommandIceServerProvider::new(".command", DEFAULT_COMMAND_TIMEOUT));
/// Server::new(ServerConfig::default(), provider).run().await?;
/// ```
pub struct Server {
    config: ServerConfig,
    ice_servers: Arc<dyn IceServerProvider>,
}

impl Server {
    pub fn new(config: ServerConfig, ice_servers: Arc<dyn IceServerProvider>) -> Self {
        Self {
            config,
            ice_servers,
        }
    }

    /// Spawn the hub and assemble the router.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn into_router(self) -> Result<Router, ServerError> {
        self.config.validate()?;

        let hub = HubHandle::spawn(self.config.cache, Arc::new(SystemClock));
        let features = Features {
            rooms: self.config.rooms,
            signaling: self.config.signaling,
        };
        let dispatch = build_dispatch_table(features, self.ice_servers);
        let assets_dir = self.config.assets_dir.clone();
        let state = Arc::new(AppState {
            config: self.config,
            hub,
            dispatch,
        });

        // Static assets, revalidated through ETag
        let assets = Router::new()
            .fallback_service(ServeDir::new(&assets_dir))
            .layer(middleware::from_fn_with_state(
                AssetRoot::new(assets_dir),
                conditional_etag,
            ));

        let app = Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{room}", get(get_room_detail))
            .with_state(state)
            .fallback_service(assets)
            .layer(TraceLayer::new_for_http());
        Ok(app)
    }

    /// Bind the configured address and serve until Ctrl+C / SIGTERM.
    ///
    /// Serves over TLS when the configuration names a certificate and key.
    pub async fn run(self) -> Result<(), ServerError> {
        let tls = match &self.config.tls {
            Some(files) => Some(
                RustlsConfig::from_pem_file(&files.cert_file, &files.key_file)
                    .await
                    .map_err(ServerError::Tls)?,
            ),
            None => None,
        };
        let addr = self.config.bind.clone();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        match tls {
            Some(tls) => self.serve_tls(listener, tls, shutdown_signal()).await,
            None => self.serve(listener, shutdown_signal()).await,
        }
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr().map_err(ServerError::Serve)?;
        let app = self.announce(local_addr, "ws")?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve HTTPS and WSS on an already bound listener until `shutdown` resolves.
    ///
    /// Open connections get one write wait to finish once shutdown starts.
    pub async fn serve_tls<F>(
        self,
        listener: TcpListener,
        tls: RustlsConfig,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let grace = self.config.keepalive.write_wait();
        let local_addr = listener.local_addr().map_err(ServerError::Serve)?;
        let app = self.announce(local_addr, "wss")?;
        let listener = listener.into_std().map_err(ServerError::Serve)?;

        let handle = Handle::new();
        let trigger = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            trigger.graceful_shutdown(Some(grace));
        });

        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    fn announce(self, local_addr: SocketAddr, scheme: &str) -> Result<Router, ServerError> {
        let summary = format!(
            "cache={}, readlimit={}MB, signaling={}, rooms={}",
            self.config.cache, self.config.read_limit_mb, self.config.signaling, self.config.rooms
        );
        let app = self.into_router()?;
        tracing::info!("kaiwa relay listening on {} ({})", local_addr, summary);
        tracing::info!("Connect to: {}://{}/ws", scheme, local_addr);
        Ok(app)
    }
}
