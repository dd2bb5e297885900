use std::io::{self, Write};

use chrono::DateTime;
use color_eyre::eyre::{Context, Result};
use owo_colors::OwoColorize;

use riko_worker::{ConversationView, ConversationWatch, MessagePage, RikoWorker, WorkerEvent};

struct Session {
    actor: Option<String>,
    open: Option<OpenConversation>,
    last_list: Vec<ConversationView>,
}

struct OpenConversation {
    id: String,
    cursor: Option<i64>,
    // Held for its Drop: releases the realtime watch when the conversation
    // is closed or replaced.
    _watch: ConversationWatch,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .from_env_lossy()
                .add_directive("riko_cli=info".parse().unwrap())
                .add_directive("riko_worker=info".parse().unwrap())
                .add_directive("riko_db=info".parse().unwrap()),
        )
        .init();

    let mut worker = RikoWorker::new().await.wrap_err("Failed to open database")?;

    let mut event_rx = worker
        .take_event_receiver()
        .ok_or_else(|| color_eyre::eyre::eyre!("Failed to get event receiver"))?;

    worker.start();

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            handle_event(event);
        }
    });

    let mut session = Session {
        actor: None,
        open: None,
        last_list: Vec::new(),
    };

    loop {
        print_menu(&session);
        let choice = read_line("Choice: ")?;

        match choice.trim() {
            "1" => login(&mut session)?,
            "2" => edit_profile(&worker, &session).await?,
            "3" => list_conversations(&worker, &mut session).await?,
            "4" => open_conversation(&worker, &mut session).await?,
            "5" => older_messages(&worker, &mut session).await?,
            "6" => send_message(&worker, &session).await?,
            "7" => new_conversation(&worker, &session).await?,
            "0" => {
                println!("👋 Bye");
                break;
            }
            _ => println!("❌ Invalid choice"),
        }
    }

    Ok(())
}

fn print_menu(session: &Session) {
    let actor = session.actor.as_deref().unwrap_or("<nobody>");
    println!();
    println!("╔════════════════════════════════════╗");
    println!("║         RIKO - Messaging           ║");
    println!("╠════════════════════════════════════╣");
    println!("║  1. Login as                       ║");
    println!("║  2. Edit my profile                ║");
    println!("║  3. List conversations             ║");
    println!("║  4. Open conversation              ║");
    println!("║  5. Older messages                 ║");
    println!("║  6. Send message                   ║");
    println!("║  7. New conversation               ║");
    println!("║  0. Exit                           ║");
    println!("╚════════════════════════════════════╝");
    println!("  acting as: {}", actor.cyan());
}

fn handle_event(event: WorkerEvent) {
    match event {
        WorkerEvent::NewMessage {
            conversation_id,
            sender_id,
            ..
        } => {
            println!(
                "\n💬 New message in {} from {}",
                short(&conversation_id),
                sender_id.as_deref().unwrap_or("<system>")
            );
        }
        WorkerEvent::ConversationCreated { conversation_id } => {
            println!("\n👥 Conversation created: {}", short(&conversation_id));
        }
    }
}

fn login(session: &mut Session) -> Result<()> {
    let id = read_line("User id: ")?;
    if id.is_empty() {
        session.actor = None;
        println!("🚪 Logged out");
    } else {
        session.actor = Some(id);
        println!("✅ Acting as {}", session.actor.as_deref().unwrap_or(""));
    }
    session.open = None;
    Ok(())
}

async fn edit_profile(worker: &RikoWorker, session: &Session) -> Result<()> {
    let Some(actor) = session.actor.as_deref() else {
        println!("❌ Login first");
        return Ok(());
    };

    let display_name = read_opt("Display name (empty to keep): ")?;
    let avatar_url = read_opt("Avatar URL (empty to keep): ")?;
    let handle = read_opt("Handle (empty to keep): ")?;

    worker
        .upsert_profile(
            actor,
            display_name.as_deref(),
            avatar_url.as_deref(),
            handle.as_deref(),
        )
        .await?;
    println!("✅ Profile saved");
    Ok(())
}

async fn list_conversations(worker: &RikoWorker, session: &mut Session) -> Result<()> {
    let list = worker.list_conversations(session.actor.as_deref()).await?;

    if list.is_empty() {
        println!("📭 No conversations");
    } else {
        println!("\n💬 Conversations ({}):", list.len());
        for (i, conv) in list.iter().enumerate() {
            let who = conv
                .title
                .clone()
                .unwrap_or_else(|| roster_line(conv, session.actor.as_deref()));
            let when = conv
                .last_message_at
                .map(format_ts)
                .unwrap_or_else(|| "never".to_string());
            let preview = conv.last_message_preview.as_deref().unwrap_or("");
            if conv.unread_count > 0 {
                println!(
                    "  {}. {} [{}] {} - {}",
                    i + 1,
                    who,
                    format!("{} unread", conv.unread_count).red(),
                    when,
                    preview
                );
            } else {
                println!("  {}. {} {} - {}", i + 1, who, when, preview);
            }
        }
    }

    session.last_list = list;
    Ok(())
}

async fn open_conversation(worker: &RikoWorker, session: &mut Session) -> Result<()> {
    if session.last_list.is_empty() {
        list_conversations(worker, session).await?;
        if session.last_list.is_empty() {
            return Ok(());
        }
    }

    let pick = read_line("Conversation number: ")?;
    let index = match pick.parse::<usize>() {
        Ok(n) if n >= 1 => n,
        _ => {
            println!("❌ Not a valid number");
            return Ok(());
        }
    };
    let Some(conv) = session.last_list.get(index - 1) else {
        println!("❌ No such conversation");
        return Ok(());
    };
    let conversation_id = conv.id.clone();

    let page = worker.page_messages(&conversation_id, None).await?;
    print_page(&page);

    worker
        .mark_conversation_read(session.actor.as_deref(), &conversation_id)
        .await?;

    // Replacing the previous open conversation drops its watch.
    session.open = Some(OpenConversation {
        cursor: page.next_cursor,
        _watch: worker.watch_conversation(&conversation_id),
        id: conversation_id,
    });

    Ok(())
}

async fn older_messages(worker: &RikoWorker, session: &mut Session) -> Result<()> {
    let Some(open) = session.open.as_mut() else {
        println!("❌ Open a conversation first");
        return Ok(());
    };

    let Some(cursor) = open.cursor else {
        println!("📜 Beginning of history");
        return Ok(());
    };

    let page = worker.page_messages(&open.id, Some(cursor)).await?;
    print_page(&page);
    open.cursor = page.next_cursor;

    Ok(())
}

async fn send_message(worker: &RikoWorker, session: &Session) -> Result<()> {
    let Some(open) = session.open.as_ref() else {
        println!("❌ Open a conversation first");
        return Ok(());
    };

    let content = read_line("Message: ")?;
    match worker
        .send_message(session.actor.as_deref(), &open.id, &content, None)
        .await
    {
        Ok(_) => println!("📤 Sent"),
        Err(e) => println!("❌ {}", e),
    }
    Ok(())
}

async fn new_conversation(worker: &RikoWorker, session: &Session) -> Result<()> {
    let to = read_line("Participants (comma separated user ids): ")?;
    let participants: Vec<String> = to
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let title = read_opt("Title (groups only, optional): ")?;
    let first = read_opt("First message (optional): ")?;

    match worker
        .create_conversation(
            session.actor.as_deref(),
            &participants,
            title.as_deref(),
            first.as_deref(),
        )
        .await
    {
        Ok(id) => println!("✅ Conversation {}", short(&id)),
        Err(e) => println!("❌ {}", e),
    }
    Ok(())
}

fn print_page(page: &MessagePage) {
    if page.messages.is_empty() {
        println!("📭 No messages");
        return;
    }

    // Pages come newest-first; display chronologically.
    for msg in page.messages.iter().rev() {
        let who = msg
            .sender
            .as_ref()
            .and_then(|p| p.display_name.clone())
            .or_else(|| msg.sender_id.clone())
            .unwrap_or_else(|| "<system>".to_string());
        println!(
            "  [{}] {}: {}",
            format_ts(msg.created_at),
            who.green(),
            msg.content
        );
    }
    if page.next_cursor.is_some() {
        println!("  ... more history available (option 5)");
    }
}

fn roster_line(conv: &ConversationView, actor: Option<&str>) -> String {
    let names: Vec<String> = conv
        .participants
        .iter()
        .filter(|p| Some(p.user_id.as_str()) != actor)
        .map(|p| {
            p.profile
                .display_name
                .clone()
                .unwrap_or_else(|| p.user_id.clone())
        })
        .collect();
    if names.is_empty() {
        "(just you)".to_string()
    } else {
        names.join(", ")
    }
}

fn format_ts(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn short(id: &str) -> String {
    id.chars().take(8).collect()
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn read_opt(prompt: &str) -> Result<Option<String>> {
    let value = read_line(prompt)?;
    if value.is_empty() { Ok(None) } else { Ok(Some(value)) }
}
