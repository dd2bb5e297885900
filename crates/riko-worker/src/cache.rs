use std::collections::HashMap;

use tokio::sync::RwLock;

use riko_core::{ConversationView, MessagePage};

/// Tags a cached read so mutations and realtime handlers can mark it stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Every actor's conversation list.
    Conversations,
    /// Every cached page of one conversation.
    Messages(String),
}

/// Explicit query cache. Business logic never writes fetched rows into it on
/// behalf of another key; stale data is dropped via `invalidate` and the next
/// read re-fetches.
pub struct QueryCache {
    conversations: RwLock<HashMap<String, Vec<ConversationView>>>,
    pages: RwLock<HashMap<(String, Option<i64>), MessagePage>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            pages: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_conversations(&self, actor: &str) -> Option<Vec<ConversationView>> {
        self.conversations.read().await.get(actor).cloned()
    }

    pub async fn put_conversations(&self, actor: &str, views: Vec<ConversationView>) {
        self.conversations
            .write()
            .await
            .insert(actor.to_string(), views);
    }

    pub async fn get_page(&self, conversation_id: &str, cursor: Option<i64>) -> Option<MessagePage> {
        self.pages
            .read()
            .await
            .get(&(conversation_id.to_string(), cursor))
            .cloned()
    }

    pub async fn put_page(&self, conversation_id: &str, cursor: Option<i64>, page: MessagePage) {
        self.pages
            .write()
            .await
            .insert((conversation_id.to_string(), cursor), page);
    }

    pub async fn invalidate(&self, tag: &CacheTag) {
        match tag {
            CacheTag::Conversations => {
                self.conversations.write().await.clear();
            }
            CacheTag::Messages(conversation_id) => {
                self.pages
                    .write()
                    .await
                    .retain(|(conv, _), _| conv != conversation_id);
            }
        }
        tracing::debug!(?tag, "Cache invalidated");
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize) -> MessagePage {
        MessagePage {
            messages: Vec::new(),
            next_cursor: Some(n as i64),
        }
    }

    #[tokio::test]
    async fn invalidating_messages_only_drops_that_conversation() {
        let cache = QueryCache::new();
        cache.put_page("a", None, page(1)).await;
        cache.put_page("a", Some(10), page(2)).await;
        cache.put_page("b", None, page(3)).await;

        cache.invalidate(&CacheTag::Messages("a".to_string())).await;

        assert!(cache.get_page("a", None).await.is_none());
        assert!(cache.get_page("a", Some(10)).await.is_none());
        assert!(cache.get_page("b", None).await.is_some());
    }

    #[tokio::test]
    async fn invalidating_conversations_clears_every_actor() {
        let cache = QueryCache::new();
        cache.put_conversations("alice", Vec::new()).await;
        cache.put_conversations("bob", Vec::new()).await;

        cache.invalidate(&CacheTag::Conversations).await;

        assert!(cache.get_conversations("alice").await.is_none());
        assert!(cache.get_conversations("bob").await.is_none());
    }
}
