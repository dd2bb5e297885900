use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use riko_core::{ConversationView, MessagePage, MessageView, RealtimeEvent};
use riko_db::{NewMessage, RikoDb};

use crate::cache::{CacheTag, QueryCache};
use crate::error::{Result, WorkerError};
use crate::events::WorkerEvent;
use crate::pager::MessagePager;
use crate::reader::ConversationReader;
use crate::realtime::{ConversationWatch, RealtimeHub};

/// Facade over the messaging aggregator: reads go through the cache-backed
/// reader and pager, writes go to the store and fan out through the realtime
/// hub. The actor is an opaque caller-supplied user id; reads without one
/// degrade to empty, writes without one fail.
pub struct RikoWorker {
    db: Arc<RikoDb>,
    cache: Arc<QueryCache>,
    hub: RealtimeHub,
    reader: ConversationReader,
    pager: MessagePager,
    event_tx: mpsc::Sender<WorkerEvent>,
    event_rx: Option<mpsc::Receiver<WorkerEvent>>,
}

impl RikoWorker {
    pub async fn new() -> Result<Self> {
        Ok(Self::with_db(RikoDb::new().await?))
    }

    pub async fn new_with_path(path: &str) -> Result<Self> {
        Ok(Self::with_db(RikoDb::new_with_path(path).await?))
    }

    pub async fn new_in_memory() -> Result<Self> {
        Ok(Self::with_db(RikoDb::new_in_memory().await?))
    }

    pub fn with_db(db: RikoDb) -> Self {
        let db = Arc::new(db);
        let cache = Arc::new(QueryCache::new());
        let hub = RealtimeHub::new();
        let reader = ConversationReader::new(db.clone(), cache.clone());
        let pager = MessagePager::new(db.clone(), cache.clone());
        let (event_tx, event_rx) = mpsc::channel(1000);

        Self {
            db,
            cache,
            hub,
            reader,
            pager,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    pub fn db(&self) -> &RikoDb {
        &self.db
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<WorkerEvent>> {
        self.event_rx.take()
    }

    /// Starts the global realtime invalidator: any message insert anywhere
    /// stales every conversation list (preview and recency change) and is
    /// forwarded to the facade's event channel.
    pub fn start(&self) {
        let mut rx = self.hub.subscribe();
        let cache = self.cache.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(RealtimeEvent::MessageInserted {
                        conversation_id,
                        message_id,
                        sender_id,
                        created_at,
                    }) => {
                        cache.invalidate(&CacheTag::Conversations).await;
                        let _ = event_tx
                            .send(WorkerEvent::NewMessage {
                                conversation_id,
                                message_id,
                                sender_id,
                                created_at,
                            })
                            .await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Global invalidator lagged");
                        cache.invalidate(&CacheTag::Conversations).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    // ---- reads ----

    pub async fn list_conversations(&self, actor: Option<&str>) -> Result<Vec<ConversationView>> {
        self.reader.list(actor).await
    }

    pub async fn page_messages(
        &self,
        conversation_id: &str,
        cursor: Option<i64>,
    ) -> Result<MessagePage> {
        self.pager.page(conversation_id, cursor).await
    }

    /// Scoped subscription for the currently open conversation. Hold the
    /// returned guard while the conversation is on screen; dropping it
    /// releases the subscription.
    pub fn watch_conversation(&self, conversation_id: &str) -> ConversationWatch {
        ConversationWatch::spawn(&self.hub, self.cache.clone(), conversation_id)
    }

    /// Feeds an externally observed store write into the realtime hub, the
    /// same path local mutations publish on. This is where a wire listener
    /// for a remote message stream plugs in.
    pub fn publish_event(&self, event: RealtimeEvent) {
        self.hub.publish(event);
    }

    // ---- mutations ----

    pub async fn send_message(
        &self,
        actor: Option<&str>,
        conversation_id: &str,
        content: &str,
        message_type: Option<&str>,
    ) -> Result<MessageView> {
        let actor = actor.ok_or(WorkerError::NotAuthenticated)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(WorkerError::EmptyMessage);
        }

        let now = now_ms();
        let message = self
            .db
            .record_message(NewMessage {
                conversation_id,
                sender_id: Some(actor),
                content,
                message_type: message_type.unwrap_or("text"),
                media_url: None,
                shared_post_id: None,
                created_at: now,
            })
            .await?;

        tracing::info!(conversation_id = %conversation_id, sender = %actor, "💬 Message sent");

        self.cache
            .invalidate(&CacheTag::Messages(conversation_id.to_string()))
            .await;
        self.cache.invalidate(&CacheTag::Conversations).await;

        self.hub.publish(RealtimeEvent::MessageInserted {
            conversation_id: message.conversation_id.clone(),
            message_id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            created_at: message.created_at,
        });

        Ok(MessageView {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            message_type: message.message_type,
            media_url: message.media_url,
            shared_post_id: message.shared_post_id,
            edited: message.edited,
            deleted: message.deleted,
            created_at: message.created_at,
            sender: None,
        })
    }

    /// Creates a conversation for the union of the actor and the supplied
    /// participants. A two-party request first scans the actor's existing
    /// direct conversations and returns the first match as-is, without
    /// re-sending the initial message.
    pub async fn create_conversation(
        &self,
        actor: Option<&str>,
        participant_ids: &[String],
        title: Option<&str>,
        initial_message: Option<&str>,
    ) -> Result<String> {
        let actor = actor.ok_or(WorkerError::NotAuthenticated)?;

        let mut members: BTreeSet<String> = participant_ids.iter().cloned().collect();
        members.insert(actor.to_string());

        if members.len() < 2 {
            return Err(WorkerError::NotEnoughParticipants);
        }

        let kind = if members.len() == 2 { "direct" } else { "group" };

        if kind == "direct" {
            let other = members
                .iter()
                .find(|m| m.as_str() != actor)
                .cloned()
                .ok_or(WorkerError::NotEnoughParticipants)?;

            if let Some(existing) = self.find_direct_conversation(actor, &other).await? {
                tracing::debug!(conversation_id = %existing, "Direct conversation deduplicated");
                return Ok(existing);
            }
        }

        let others: Vec<String> = members.iter().filter(|m| m.as_str() != actor).cloned().collect();
        let (conversation, first_message) = self
            .db
            .create_conversation(kind, title, actor, &others, initial_message, now_ms())
            .await?;

        tracing::info!(
            conversation_id = %conversation.id,
            kind = %kind,
            participants = members.len(),
            "👥 Conversation created"
        );

        self.cache.invalidate(&CacheTag::Conversations).await;
        let _ = self
            .event_tx
            .send(WorkerEvent::ConversationCreated {
                conversation_id: conversation.id.clone(),
            })
            .await;

        if let Some(message) = first_message {
            self.hub.publish(RealtimeEvent::MessageInserted {
                conversation_id: message.conversation_id,
                message_id: message.id,
                sender_id: message.sender_id,
                created_at: message.created_at,
            });
        }

        Ok(conversation.id)
    }

    /// Linear scan over the actor's memberships, one lookup per candidate.
    /// Fine at personal-messaging scale.
    async fn find_direct_conversation(&self, actor: &str, other: &str) -> Result<Option<String>> {
        for membership in self.db.participants_for_user(actor).await? {
            let conversation = self.db.get_conversation(&membership.conversation_id).await?;
            if conversation.kind != "direct" {
                continue;
            }
            if self.db.has_participant(&conversation.id, other).await? {
                return Ok(Some(conversation.id));
            }
        }
        Ok(None)
    }

    /// Best-effort UX signal: silently a no-op without an actor.
    pub async fn mark_conversation_read(
        &self,
        actor: Option<&str>,
        conversation_id: &str,
    ) -> Result<()> {
        let Some(actor) = actor else {
            tracing::debug!(conversation_id = %conversation_id, "mark_read skipped, no actor");
            return Ok(());
        };

        self.db.mark_read(conversation_id, actor, now_ms()).await?;
        self.cache.invalidate(&CacheTag::Conversations).await;

        Ok(())
    }

    // ---- profile sync surface ----

    pub async fn upsert_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
        handle: Option<&str>,
    ) -> Result<()> {
        Ok(self
            .db
            .upsert_profile(user_id, display_name, avatar_url, handle)
            .await?)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
