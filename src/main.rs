use clap::Parser;
use log::{error, warn};
use std::error::Error;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use forstek_messages::api::ApiClient;
use forstek_messages::api::events::SessionEvent;
use forstek_messages::api::models::{Message, PeerId};
use forstek_messages::utils::{RUNTIME, deep_link_from_query, normalize_url};
use forstek_messages::{MessagesSession, SessionContext, SessionError, Settings};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL (e.g. http://localhost:5000)
    #[arg(long, env = "FORSTEK_SERVER")]
    server: Option<String>,

    /// Account email used to sign in
    #[arg(long, env = "FORSTEK_EMAIL")]
    email: Option<String>,

    /// Password; when given, signs in and stores the session token
    #[arg(long, env = "FORSTEK_PASSWORD")]
    password: Option<String>,

    /// Open a chat with this user on start
    #[arg(long)]
    uid: Option<PeerId>,

    /// Navigation target carrying the user, e.g. "/messages?uid=42"
    #[arg(long, conflicts_with = "uid")]
    link: Option<String>,

    /// Seconds between message refreshes
    #[arg(long)]
    poll: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = RUNTIME.block_on(run(args)) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut settings = Settings::load();
    if let Some(server) = &args.server {
        settings.base_url = normalize_url(server);
    }
    if let Some(email) = &args.email {
        settings.email = email.clone();
    }
    if let Some(poll) = args.poll {
        settings.poll_interval_secs = poll;
    }
    if settings.base_url.is_empty() {
        return Err("No server configured, pass --server".into());
    }

    let mut client = ApiClient::new(&settings.base_url)?.with_token(settings.token.clone());
    if let Some(password) = &args.password {
        let resp = client.signin(&settings.email, password).await?;
        settings.token = client.token().map(str::to_string);
        settings.role = resp.role;
        if let Err(e) = settings.save() {
            warn!("Failed to save settings: {}", e);
        }
    } else if settings.token.is_none() {
        return Err("Not signed in, pass --email and --password".into());
    }

    let client = Arc::new(client);
    let ctx = SessionContext::from_settings(client.clone(), &settings);
    match &ctx.role {
        Some(role) => println!("Signed in to {} as {}", settings.base_url, role),
        None => println!("Signed in to {}", settings.base_url),
    }
    let (mut session, mut events) = MessagesSession::new(&ctx);
    session.initialize().await;
    let link = args
        .uid
        .or_else(|| args.link.as_deref().and_then(deep_link_from_query));
    session.open_deep_link(link).await;
    print_conversations(&session);
    print_help();

    let mut shown: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&mut session, &client, &mut settings, line.trim()).await {
                    break;
                }
            }
            Some(event) = events.recv() => render(&session, event, &mut shown),
        }
    }
    session.close();
    Ok(())
}

async fn handle_line(
    session: &mut MessagesSession,
    client: &ApiClient,
    settings: &mut Settings,
    line: &str,
) -> bool {
    let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
    match cmd {
        "/quit" => return false,
        "/logout" => {
            if let Err(e) = client.logout().await {
                warn!("Server logout failed: {}", e);
            }
            settings.token = None;
            settings.role = None;
            if let Err(e) = settings.save() {
                warn!("Failed to save settings: {}", e);
            }
            println!("Signed out.");
            return false;
        }
        "/help" => print_help(),
        "/list" => print_conversations(session),
        "/open" => match arg.trim().parse::<PeerId>() {
            Ok(peer) => {
                let known = session
                    .snapshot()
                    .conversations
                    .into_iter()
                    .find(|c| c.id == peer);
                match known {
                    Some(conv) => session.select(conv).await,
                    None => session.open_deep_link(Some(peer)).await,
                }
            }
            Err(_) => println!("Usage: /open <user id>"),
        },
        "/like" => match arg.trim().parse() {
            Ok(id) => {
                if let Err(e) = session.like(id).await {
                    println!("Cannot like message: {}", e);
                }
            }
            Err(_) => println!("Usage: /like <message id>"),
        },
        _ => {
            session.set_compose_text(line);
            match session.submit().await {
                Ok(()) | Err(SessionError::EmptyMessage) => {}
                Err(e) => eprintln!("Failed to send: {}", e),
            }
        }
    }
    true
}

fn render(session: &MessagesSession, event: SessionEvent, shown: &mut Vec<Message>) {
    match event {
        SessionEvent::ActiveChatChanged(_) => {
            shown.clear();
            if let Some(chat) = session.snapshot().active_chat {
                println!("--- {} ---", chat.conversation().name);
            }
        }
        SessionEvent::MessagesUpdated(_) => {
            let messages = session.snapshot().messages;
            for line in thread_lines(shown, &messages) {
                println!("{}", line);
            }
            *shown = messages;
        }
        SessionEvent::ConversationsUpdated | SessionEvent::ComposeCleared => {}
    }
}

/// Lines to print for `messages` given what is already on screen: new messages in full,
/// known ones only when their like state flipped.
fn thread_lines(shown: &[Message], messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match shown.iter().find(|s| s.id == m.id) {
            None => Some(format_message(m)),
            Some(prev) if prev.is_liked != m.is_liked => {
                let state = if m.is_liked { "liked <3" } else { "unliked" };
                Some(format!("#{} {}", m.id, state))
            }
            Some(_) => None,
        })
        .collect()
}

fn format_message(m: &Message) -> String {
    let who = if m.is_me { "me" } else { "them" };
    let liked = if m.is_liked { " <3" } else { "" };
    format!("[{}] #{} {}: {}{}", m.timestamp, m.id, who, m.body, liked)
}

fn print_conversations(session: &MessagesSession) {
    let snap = session.snapshot();
    if snap.conversations.is_empty() {
        println!("No conversations yet.");
    }
    for c in &snap.conversations {
        let marker = if snap.active_chat.as_ref().map(|a| a.peer_id()) == Some(c.id) { "*" } else { " " };
        println!("{} {:>5}  {:<24} {:>5}  {}", marker, c.id, c.name, c.timestamp, c.last_msg);
    }
}

fn print_help() {
    println!("Commands: /list, /open <user id>, /like <message id>, /logout, /help, /quit. Anything else is sent.");
}
