use std::path::PathBuf;

use directories::ProjectDirs;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::models::{Conversation, Message, NewMessage, Participant, Profile};
use crate::schema::SCHEMA;

/// Longest preview stored on a conversation row.
const PREVIEW_CHARS: usize = 80;

pub struct RikoDb {
    pool: Pool<Sqlite>,
}

impl RikoDb {
    pub async fn new() -> Result<Self> {
        let db_path = Self::get_db_path()?;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&db_url).await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        tracing::info!("Database initialized at: {}", db_path.display());

        Ok(Self { pool })
    }

    pub async fn new_with_path(path: &str) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePool::connect(&db_url).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database for tests. Pinned to a single connection so every
    /// query sees the same memory file.
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn get_db_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com.br", "zesmoi", "riko").ok_or(DbError::NoDataDir)?;
        Ok(dirs.data_dir().join("riko.db"))
    }

    // ---- profiles ----

    pub async fn upsert_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
        handle: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO profiles (user_id, display_name, avatar_url, handle)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                 display_name = COALESCE(excluded.display_name, display_name),
                 avatar_url = COALESCE(excluded.avatar_url, avatar_url),
                 handle = COALESCE(excluded.handle, handle)"#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(avatar_url)
        .bind(handle)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn profiles_by_ids(&self, user_ids: &[String]) -> Result<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM profiles WHERE user_id IN ({})",
            placeholders(user_ids.len())
        );
        let mut query = sqlx::query_as::<_, Profile>(&sql);
        for id in user_ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    // ---- conversations & membership ----

    pub async fn get_conversation(&self, id: &str) -> Result<Conversation> {
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::ConversationNotFound(id.to_string()))
    }

    pub async fn conversations_by_ids(&self, ids: &[String]) -> Result<Vec<Conversation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM conversations WHERE id IN ({}) ORDER BY last_message_at DESC",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, Conversation>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn participants_for_user(&self, user_id: &str) -> Result<Vec<Participant>> {
        Ok(sqlx::query_as::<_, Participant>(
            "SELECT * FROM conversation_participants WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn participants_for_conversations(&self, ids: &[String]) -> Result<Vec<Participant>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM conversation_participants WHERE conversation_id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, Participant>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn has_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Unread counts for every conversation the user participates in, read
    /// from the `conversation_unread_counts` view. Conversations the user has
    /// never marked read produce no row.
    pub async fn unread_counts_for_user(&self, user_id: &str) -> Result<Vec<(String, i64)>> {
        Ok(sqlx::query_as(
            "SELECT conversation_id, unread FROM conversation_unread_counts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Creates a conversation, its participant rows and the optional initial
    /// message in one transaction. The creator gets role `admin`, everyone
    /// else `member`. Returns the conversation together with the initial
    /// message row, if one was written.
    pub async fn create_conversation(
        &self,
        kind: &str,
        title: Option<&str>,
        creator_id: &str,
        member_ids: &[String],
        initial_message: Option<&str>,
        now: i64,
    ) -> Result<(Conversation, Option<Message>)> {
        let conversation_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO conversations (id, kind, title, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&conversation_id)
        .bind(kind)
        .bind(title)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role, created_at)
             VALUES (?, ?, 'admin', ?)",
        )
        .bind(&conversation_id)
        .bind(creator_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for member in member_ids {
            if member == creator_id {
                continue;
            }
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, role, created_at)
                 VALUES (?, ?, 'member', ?)",
            )
            .bind(&conversation_id)
            .bind(member)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let mut first_message = None;
        if let Some(content) = initial_message {
            let message_id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO messages (id, conversation_id, sender_id, content, message_type, created_at)
                 VALUES (?, ?, ?, ?, 'text', ?)",
            )
            .bind(&message_id)
            .bind(&conversation_id)
            .bind(creator_id)
            .bind(content)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE conversations SET last_message_at = ?, last_message_preview = ? WHERE id = ?",
            )
            .bind(now)
            .bind(preview_of(content))
            .bind(&conversation_id)
            .execute(&mut *tx)
            .await?;

            first_message = Some(Message {
                id: message_id,
                conversation_id: conversation_id.clone(),
                sender_id: Some(creator_id.to_string()),
                content: content.to_string(),
                message_type: "text".to_string(),
                media_url: None,
                shared_post_id: None,
                edited: false,
                deleted: false,
                created_at: now,
            });
        }

        tx.commit().await?;

        let conversation = self.get_conversation(&conversation_id).await?;
        Ok((conversation, first_message))
    }

    // ---- messages ----

    /// Inserts a message and bumps the owning conversation's last-message
    /// timestamp and preview in the same transaction.
    pub async fn record_message(&self, new: NewMessage<'_>) -> Result<Message> {
        let message_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO messages
               (id, conversation_id, sender_id, content, message_type, media_url, shared_post_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&message_id)
        .bind(new.conversation_id)
        .bind(new.sender_id)
        .bind(new.content)
        .bind(new.message_type)
        .bind(new.media_url)
        .bind(new.shared_post_id)
        .bind(new.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations SET last_message_at = ?, last_message_preview = ? WHERE id = ?",
        )
        .bind(new.created_at)
        .bind(preview_of(new.content))
        .bind(new.conversation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Message {
            id: message_id,
            conversation_id: new.conversation_id.to_string(),
            sender_id: new.sender_id.map(|s| s.to_string()),
            content: new.content.to_string(),
            message_type: new.message_type.to_string(),
            media_url: new.media_url.map(|s| s.to_string()),
            shared_post_id: new.shared_post_id.map(|s| s.to_string()),
            edited: false,
            deleted: false,
            created_at: new.created_at,
        })
    }

    /// Messages in a conversation, newest first, strictly older than `before`
    /// when a cursor is given.
    pub async fn messages_before(
        &self,
        conversation_id: &str,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>> {
        if let Some(cursor) = before {
            Ok(sqlx::query_as::<_, Message>(
                "SELECT * FROM messages WHERE conversation_id = ? AND created_at < ?
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(conversation_id)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
        } else {
            Ok(sqlx::query_as::<_, Message>(
                "SELECT * FROM messages WHERE conversation_id = ?
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
        }
    }

    // ---- read state ----

    pub async fn mark_read(&self, conversation_id: &str, user_id: &str, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE conversation_participants SET last_read_at = ?
             WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(now)
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn preview_of(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}
