use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use riko_core::RealtimeEvent;

use crate::cache::{CacheTag, QueryCache};

/// In-process fan-out of store write notifications. Mutations publish here;
/// watchers invalidate caches so the next read re-fetches.
#[derive(Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn publish(&self, event: RealtimeEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped watch over one conversation. While held, message inserts for that
/// conversation invalidate its page cache. Dropping the watch tears the
/// subscription down.
pub struct ConversationWatch {
    conversation_id: String,
    handle: JoinHandle<()>,
}

impl ConversationWatch {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub(crate) fn spawn(hub: &RealtimeHub, cache: Arc<QueryCache>, conversation_id: &str) -> Self {
        let mut rx = hub.subscribe();
        let watched = conversation_id.to_string();
        let id = watched.clone();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(RealtimeEvent::MessageInserted {
                        conversation_id, ..
                    }) if conversation_id == watched => {
                        cache.invalidate(&CacheTag::Messages(watched.clone())).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Realtime watch lagged, invalidating anyway");
                        cache.invalidate(&CacheTag::Messages(watched.clone())).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            conversation_id: id,
            handle,
        }
    }
}

impl Drop for ConversationWatch {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!(conversation_id = %self.conversation_id, "Conversation watch released");
    }
}
