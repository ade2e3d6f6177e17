//! UseCase: シグナリング中継
//!
//! ピア同士が直接つながるための交渉データを、指定された接続へそのまま転送する。
//! 交渉の中身には関知しない。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    domain::{ConnectionId, IceServerProvider},
    hub::Audience,
    infrastructure::dto::websocket::{
        ServerEvent, SignalData, SignalRelayData, SignalingAvailableData,
    },
};

use super::{context::ConnectionContext, dispatch::EventHandler};

/// `signaling-enabled` → `signaling-available {enabled, iceServers}`.
pub struct SignalingEnabledHandler {
    enabled: bool,
    provider: Arc<dyn IceServerProvider>,
}

impl SignalingEnabledHandler {
    pub fn new(enabled: bool, provider: Arc<dyn IceServerProvider>) -> Self {
        Self { enabled, provider }
    }

    async fn ice_servers(&self) -> Vec<Value> {
        if !self.enabled {
            return Vec::new();
        }
        match self.provider.ice_servers().await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::error!("Failed to fetch relay credentials: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl EventHandler for SignalingEnabledHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, _data: Value) {
        if !ctx.is_logged_in() {
            return;
        }
        let ice_servers = self.ice_servers().await;
        ctx.send(&ServerEvent::SignalingAvailable {
            data: SignalingAvailableData {
                enabled: self.enabled,
                ice_servers,
            },
        });
    }
}

/// `ready` → `user-ready <id>` to the other named members of the room.
#[derive(Debug, Clone, Copy)]
pub struct ReadyHandler {
    enabled: bool,
}

impl ReadyHandler {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl EventHandler for ReadyHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, _data: Value) {
        if !self.enabled || !ctx.is_logged_in() {
            return;
        }
        let event = ServerEvent::UserReady {
            data: ctx.id.as_str().to_string(),
        };
        ctx.broadcast(&event, Audience::named_except(ctx.id.clone())).await;
    }
}

/// `signal {target, signal}` → `signal {from, signal}` to the target only.
#[derive(Debug, Clone, Copy)]
pub struct SignalHandler {
    enabled: bool,
}

impl SignalHandler {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

fn is_blank(signal: &Value) -> bool {
    match signal {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl EventHandler for SignalHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, data: Value) {
        if !self.enabled || !ctx.is_logged_in() {
            return;
        }
        let request: SignalData = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Invalid signal received from '{}': {}", ctx.id, e);
                return;
            }
        };
        if is_blank(&request.signal) {
            tracing::warn!("Empty signal received from '{}'", ctx.id);
            return;
        }
        let Ok(target) = ConnectionId::new(request.target) else {
            tracing::warn!("Signal from '{}' has no target", ctx.id);
            return;
        };

        let event = ServerEvent::Signal {
            data: SignalRelayData {
                from: ctx.id.as_str().to_string(),
                signal: request.signal,
            },
        };
        if let Some(frame) = event.encode() {
            tracing::debug!("Relaying signal from '{}' to '{}'", ctx.id, target);
            ctx.hub.relay(target, frame).await;
        }
    }
}
