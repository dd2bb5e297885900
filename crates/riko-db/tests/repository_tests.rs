use riko_db::{NewMessage, RikoDb};

async fn db() -> RikoDb {
    RikoDb::new_in_memory().await.expect("in-memory database")
}

#[tokio::test]
async fn creation_writes_conversation_membership_and_message_atomically() {
    let db = db().await;

    let (conv, first) = db
        .create_conversation(
            "direct",
            None,
            "alice",
            &["bob".to_string()],
            Some("hello"),
            1_000,
        )
        .await
        .unwrap();

    assert_eq!(conv.kind, "direct");
    assert_eq!(conv.last_message_at, Some(1_000));
    assert_eq!(conv.last_message_preview.as_deref(), Some("hello"));

    let participants = db.participants_for_conversations(&[conv.id.clone()]).await.unwrap();
    assert_eq!(participants.len(), 2);
    let alice = participants.iter().find(|p| p.user_id == "alice").unwrap();
    let bob = participants.iter().find(|p| p.user_id == "bob").unwrap();
    assert_eq!(alice.role, "admin");
    assert_eq!(bob.role, "member");
    assert!(alice.last_read_at.is_none());

    let first = first.expect("initial message row");
    let page = db.messages_before(&conv.id, None, 10).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, first.id);
    assert_eq!(page[0].content, "hello");
}

#[tokio::test]
async fn cursor_is_strictly_exclusive() {
    let db = db().await;
    let (conv, _) = db
        .create_conversation("direct", None, "alice", &["bob".to_string()], None, 1_000)
        .await
        .unwrap();

    for ts in [100, 200, 300] {
        db.record_message(NewMessage {
            conversation_id: &conv.id,
            sender_id: Some("alice"),
            content: "x",
            message_type: "text",
            media_url: None,
            shared_post_id: None,
            created_at: ts,
        })
        .await
        .unwrap();
    }

    let older = db.messages_before(&conv.id, Some(200), 10).await.unwrap();
    let stamps: Vec<i64> = older.iter().map(|m| m.created_at).collect();
    assert_eq!(stamps, vec![100], "the cursor row itself is excluded");
}

#[tokio::test]
async fn unread_view_ignores_participants_who_never_read() {
    let db = db().await;
    let (conv, _) = db
        .create_conversation("direct", None, "alice", &["bob".to_string()], None, 1_000)
        .await
        .unwrap();

    db.record_message(NewMessage {
        conversation_id: &conv.id,
        sender_id: Some("bob"),
        content: "unseen",
        message_type: "text",
        media_url: None,
        shared_post_id: None,
        created_at: 2_000,
    })
    .await
    .unwrap();

    // alice has no last_read_at yet, so she contributes no row at all.
    assert!(db.unread_counts_for_user("alice").await.unwrap().is_empty());

    db.mark_read(&conv.id, "alice", 1_500).await.unwrap();
    let counts = db.unread_counts_for_user("alice").await.unwrap();
    assert_eq!(counts, vec![(conv.id.clone(), 1)]);

    // Strictly-greater comparison: a message at exactly last_read_at is read.
    db.mark_read(&conv.id, "alice", 2_000).await.unwrap();
    assert!(db.unread_counts_for_user("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_profile_lookup_with_empty_input_is_a_no_op() {
    let db = db().await;
    assert!(db.profiles_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn profile_upsert_keeps_existing_fields() {
    let db = db().await;
    db.upsert_profile("alice", Some("Alice"), None, Some("alice01"))
        .await
        .unwrap();
    db.upsert_profile("alice", None, Some("https://cdn/a.png"), None)
        .await
        .unwrap();

    let rows = db.profiles_by_ids(&["alice".to_string()]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].display_name.as_deref(), Some("Alice"));
    assert_eq!(rows[0].avatar_url.as_deref(), Some("https://cdn/a.png"));
    assert_eq!(rows[0].handle.as_deref(), Some("alice01"));
}

#[tokio::test]
async fn long_messages_get_truncated_previews() {
    let db = db().await;
    let (conv, _) = db
        .create_conversation("direct", None, "alice", &["bob".to_string()], None, 1_000)
        .await
        .unwrap();

    let long = "a".repeat(200);
    db.record_message(NewMessage {
        conversation_id: &conv.id,
        sender_id: Some("alice"),
        content: &long,
        message_type: "text",
        media_url: None,
        shared_post_id: None,
        created_at: 2_000,
    })
    .await
    .unwrap();

    let conv = db.get_conversation(&conv.id).await.unwrap();
    let preview = conv.last_message_preview.unwrap();
    assert!(preview.len() < long.len());
    assert!(preview.ends_with("..."));
}

#[tokio::test]
async fn conversations_by_ids_orders_by_recency() {
    let db = db().await;
    let (a, _) = db
        .create_conversation("direct", None, "alice", &["bob".to_string()], Some("1"), 3_000)
        .await
        .unwrap();
    let (b, _) = db
        .create_conversation("direct", None, "alice", &["carol".to_string()], Some("2"), 1_000)
        .await
        .unwrap();
    let (c, _) = db
        .create_conversation("direct", None, "alice", &["dave".to_string()], Some("3"), 2_000)
        .await
        .unwrap();

    let ids = vec![a.id.clone(), b.id.clone(), c.id.clone()];
    let ordered = db.conversations_by_ids(&ids).await.unwrap();
    let got: Vec<&str> = ordered.iter().map(|x| x.id.as_str()).collect();
    assert_eq!(got, vec![a.id.as_str(), c.id.as_str(), b.id.as_str()]);
}
