use std::sync::Arc;

use riko_core::{MessagePage, MessageView};
use riko_db::RikoDb;

use crate::cache::QueryCache;
use crate::error::Result;
use crate::profiles::ProfileResolver;

/// Fixed page size for message history.
pub const PAGE_SIZE: usize = 30;

/// Cursor-paginated reader of one conversation's messages, newest first.
///
/// The cursor is the `created_at` of the previous page's last row; the next
/// page is constrained to strictly earlier timestamps. Callers wanting
/// chronological display reverse the page themselves.
pub struct MessagePager {
    db: Arc<RikoDb>,
    cache: Arc<QueryCache>,
    profiles: ProfileResolver,
}

impl MessagePager {
    pub fn new(db: Arc<RikoDb>, cache: Arc<QueryCache>) -> Self {
        let profiles = ProfileResolver::new(db.clone());
        Self { db, cache, profiles }
    }

    /// Fetches one page. Reads ahead one row past the page size so a page
    /// that drains history exactly reports exhaustion immediately instead of
    /// forcing a trailing empty fetch. Transport errors propagate as `Err`;
    /// an `Ok` page with `next_cursor: None` always means end of history.
    pub async fn page(&self, conversation_id: &str, cursor: Option<i64>) -> Result<MessagePage> {
        if let Some(hit) = self.cache.get_page(conversation_id, cursor).await {
            return Ok(hit);
        }

        let mut rows = self
            .db
            .messages_before(conversation_id, cursor, (PAGE_SIZE + 1) as i64)
            .await?;

        let has_more = rows.len() > PAGE_SIZE;
        rows.truncate(PAGE_SIZE);

        // Only the senders present in this page are resolved.
        let mut sender_ids: Vec<String> = rows.iter().filter_map(|m| m.sender_id.clone()).collect();
        sender_ids.sort();
        sender_ids.dedup();
        let profiles = self.profiles.resolve(&sender_ids).await?;

        let messages: Vec<MessageView> = rows
            .into_iter()
            .map(|m| {
                let sender = m
                    .sender_id
                    .as_deref()
                    .and_then(|id| profiles.get(id).cloned());
                MessageView {
                    id: m.id,
                    conversation_id: m.conversation_id,
                    sender_id: m.sender_id,
                    content: m.content,
                    message_type: m.message_type,
                    media_url: m.media_url,
                    shared_post_id: m.shared_post_id,
                    edited: m.edited,
                    deleted: m.deleted,
                    created_at: m.created_at,
                    sender,
                }
            })
            .collect();

        let next_cursor = if has_more {
            messages.last().map(|m| m.created_at)
        } else {
            None
        };

        let page = MessagePage {
            messages,
            next_cursor,
        };

        self.cache
            .put_page(conversation_id, cursor, page.clone())
            .await;

        Ok(page)
    }
}
