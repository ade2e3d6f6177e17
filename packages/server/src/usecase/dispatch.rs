//! Dispatch table: inbound event tag → handler.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use super::context::ConnectionContext;

/// Handler for one inbound event tag.
///
/// Handlers run on the connection's read loop, one frame at a time, and resolve
/// their own failures: nothing is returned to the loop.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &mut ConnectionContext, data: Value);
}

/// Immutable after start-up and shared by every connection.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `tag`, replacing any previous one.
    pub fn on(mut self, tag: &str, handler: impl EventHandler + 'static) -> Self {
        self.handlers.insert(tag.to_string(), Arc::new(handler));
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(tag).cloned()
    }

    /// Run the handler registered for `tag`. Returns `false` for an unknown tag.
    pub async fn dispatch(&self, tag: &str, ctx: &mut ConnectionContext, data: Value) -> bool {
        match self.handlers.get(tag) {
            Some(handler) => {
                handler.handle(ctx, data).await;
                true
            }
            None => false,
        }
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("tags", &self.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::test_support::Harness;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for Counting {
        async fn handle(&self, _ctx: &mut ConnectionContext, _data: Value) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_known_tags_only() {
        // テスト項目: 登録済みのタグだけがハンドラーに届き、未知のタグは false を返す
        // given (前提条件):
        let calls = Arc::new(AtomicUsize::new(0));
        let table = DispatchTable::new().on("ping", Counting(calls.clone()));
        let mut harness = Harness::new().await;

        // when (操作):
        let known = table.dispatch("ping", &mut harness.ctx, Value::Null).await;
        let unknown = table.dispatch("nope", &mut harness.ctx, Value::Null).await;

        // then (期待する結果):
        assert!(known);
        assert!(!unknown);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.tags(), vec!["ping"]);
    }
}
