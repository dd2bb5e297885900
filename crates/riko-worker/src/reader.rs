use std::collections::HashMap;
use std::sync::Arc;

use riko_core::{ConversationKind, ConversationView, ParticipantRole, ParticipantView, ProfileData};
use riko_db::RikoDb;

use crate::cache::QueryCache;
use crate::error::Result;
use crate::profiles::ProfileResolver;

/// Assembles the conversation list for one actor: membership, metadata,
/// full participant rosters, resolved profiles and unread counts.
pub struct ConversationReader {
    db: Arc<RikoDb>,
    cache: Arc<QueryCache>,
    profiles: ProfileResolver,
}

impl ConversationReader {
    pub fn new(db: Arc<RikoDb>, cache: Arc<QueryCache>) -> Self {
        let profiles = ProfileResolver::new(db.clone());
        Self { db, cache, profiles }
    }

    /// No actor means no implicit guest view: the result is empty, not an
    /// error. An actor with no memberships short-circuits before any further
    /// queries are issued.
    pub async fn list(&self, actor: Option<&str>) -> Result<Vec<ConversationView>> {
        let Some(actor) = actor else {
            return Ok(Vec::new());
        };

        if let Some(hit) = self.cache.get_conversations(actor).await {
            return Ok(hit);
        }

        let memberships = self.db.participants_for_user(actor).await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let conversation_ids: Vec<String> = memberships
            .iter()
            .map(|p| p.conversation_id.clone())
            .collect();

        let conversations = self.db.conversations_by_ids(&conversation_ids).await?;
        let roster = self
            .db
            .participants_for_conversations(&conversation_ids)
            .await?;

        let mut user_ids: Vec<String> = roster.iter().map(|p| p.user_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();
        let profiles = self.profiles.resolve(&user_ids).await?;

        // Unread counts are a soft dependency: if the aggregate is
        // unavailable the list still renders, with zeroes.
        let unread: HashMap<String, i64> = match self.db.unread_counts_for_user(actor).await {
            Ok(rows) => rows.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Unread aggregate unavailable, degrading to zero");
                HashMap::new()
            }
        };

        let mut rosters: HashMap<String, Vec<ParticipantView>> = HashMap::new();
        for p in roster {
            let profile = profiles
                .get(&p.user_id)
                .cloned()
                .unwrap_or_else(|| ProfileData::empty_shell(&p.user_id));
            rosters
                .entry(p.conversation_id)
                .or_default()
                .push(ParticipantView {
                    user_id: p.user_id,
                    role: ParticipantRole::parse(&p.role).unwrap_or(ParticipantRole::Member),
                    profile,
                });
        }

        let views: Vec<ConversationView> = conversations
            .into_iter()
            .map(|c| {
                let unread_count = unread.get(&c.id).copied().unwrap_or(0);
                ConversationView {
                    participants: rosters.remove(&c.id).unwrap_or_default(),
                    kind: ConversationKind::parse(&c.kind).unwrap_or(ConversationKind::Group),
                    id: c.id,
                    title: c.title,
                    last_message_at: c.last_message_at,
                    last_message_preview: c.last_message_preview,
                    unread_count,
                }
            })
            .collect();

        tracing::debug!(actor = %actor, count = views.len(), "Conversation list assembled");

        self.cache.put_conversations(actor, views.clone()).await;

        Ok(views)
    }
}
