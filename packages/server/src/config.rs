//! Server configuration.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::domain::RoomName;

pub const DEFAULT_BIND: &str = "0.0.0.0:8090";
pub const DEFAULT_ASSETS_DIR: &str = "html";
pub const DEFAULT_COMMAND_FILE: &str = ".command";
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("ping period ({ping_period:?}) must be shorter than pong wait ({pong_wait:?})")]
    PingNotBeforeDeadline {
        ping_period: Duration,
        pong_wait: Duration,
    },

    #[error("read limit must be at least 1 MB")]
    ZeroReadLimit,

    #[error("invalid default room: {0}")]
    InvalidDefaultRoom(#[from] crate::domain::ValueObjectError),

    #[error("TLS needs both a certificate and a private key, the {0} is missing")]
    IncompleteTls(&'static str),
}

/// PEM certificate chain and private key used to serve over TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

impl TlsFiles {
    /// TLS is enabled only when both paths are given; neither means plain TCP.
    pub fn from_paths(
        cert_file: Option<PathBuf>,
        key_file: Option<PathBuf>,
    ) -> Result<Option<Self>, ConfigError> {
        match (cert_file, key_file) {
            (Some(cert_file), Some(key_file)) => Ok(Some(Self {
                cert_file,
                key_file,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::IncompleteTls("private key")),
            (None, Some(_)) => Err(ConfigError::IncompleteTls("certificate")),
        }
    }
}

/// Liveness timing shared by every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    write_wait: Duration,
    pong_wait: Duration,
    ping_period: Duration,
}

impl Keepalive {
    pub fn new(
        write_wait: Duration,
        pong_wait: Duration,
        ping_period: Duration,
    ) -> Result<Self, ConfigError> {
        if write_wait.is_zero() {
            return Err(ConfigError::ZeroDuration("write wait"));
        }
        if pong_wait.is_zero() {
            return Err(ConfigError::ZeroDuration("pong wait"));
        }
        if ping_period.is_zero() {
            return Err(ConfigError::ZeroDuration("ping period"));
        }
        if ping_period >= pong_wait {
            return Err(ConfigError::PingNotBeforeDeadline {
                ping_period,
                pong_wait,
            });
        }
        Ok(Self {
            write_wait,
            pong_wait,
            ping_period,
        })
    }

    /// Ping period derived as nine tenths of `pong_wait`.
    pub fn from_pong_wait(write_wait: Duration, pong_wait: Duration) -> Result<Self, ConfigError> {
        Self::new(write_wait, pong_wait, pong_wait * 9 / 10)
    }

    /// Upper bound for a single frame write.
    pub fn write_wait(&self) -> Duration {
        self.write_wait
    }

    /// How long the peer may stay silent (no pong) before the connection is dropped.
    pub fn pong_wait(&self) -> Duration {
        self.pong_wait
    }

    pub fn ping_period(&self) -> Duration {
        self.ping_period
    }
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Replay buffer capacity per room. Zero disables history.
    pub cache: usize,
    /// Maximum inbound frame size, in megabytes.
    pub read_limit_mb: usize,
    pub signaling: bool,
    /// When off, every connection lands in `default_room`.
    pub rooms: bool,
    pub default_room: RoomName,
    pub assets_dir: PathBuf,
    pub command_file: PathBuf,
    pub outbound_capacity: usize,
    pub keepalive: Keepalive,
    /// `None` serves plain HTTP / WS.
    pub tls: Option<TlsFiles>,
}

impl ServerConfig {
    pub fn read_limit_bytes(&self) -> usize {
        self.read_limit_mb.saturating_mul(1024 * 1024)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_limit_mb == 0 {
            return Err(ConfigError::ZeroReadLimit);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            cache: 0,
            read_limit_mb: 1,
            signaling: false,
            rooms: false,
            default_room: RoomName::default(),
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            command_file: PathBuf::from(DEFAULT_COMMAND_FILE),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            keepalive: Keepalive::default(),
            tls: None,
        }
    }
}
