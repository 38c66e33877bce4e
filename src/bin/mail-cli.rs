#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for reading an IMAP mailbox

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use imap_message_reader::{
    AttachmentRef, HeaderInfo, ImapConfig, ImapTransport, MailClient, MessageView,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mail-cli")]
#[command(about = "Read messages, bodies and attachments from an IMAP mailbox")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List messages
    List {
        /// IMAP search query (default: UNSEEN UNDELETED)
        #[arg(long)]
        query: Option<String>,

        /// Maximum number of messages to show (most recent first)
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show a message's headers, body and attachments
    Show {
        /// Message UID
        uid: u32,

        /// Preferred body format
        #[arg(long, value_enum, default_value_t = Format::Plain)]
        format: Format,
    },

    /// List a message's attachments and inline parts
    Attachments {
        /// Message UID
        uid: u32,
    },

    /// Write one attachment or inline part to disk
    Save {
        /// Message UID
        uid: u32,

        /// Index as printed by `attachments`
        index: usize,

        /// Output path (default: the part's filename)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Count messages in the mailbox
    Count,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Plain,
    Html,
}

impl Format {
    const fn subtype(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Html => "html",
        }
    }
}

#[derive(Serialize)]
struct MessageDetail<'a> {
    header: &'a HeaderInfo,
    subject: String,
    from: String,
    to: String,
    body: Option<String>,
    attachments: Vec<AttachmentRef>,
    inline_content: Vec<AttachmentRef>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ImapConfig::from_env()?;
    let client = MailClient::new(config);

    match &args.command {
        Command::List { query, limit } => {
            cmd_list(&client, &args, query.as_deref(), *limit).await?;
        }
        Command::Show { uid, format } => {
            cmd_show(&client, &args, *uid, *format).await?;
        }
        Command::Attachments { uid } => {
            cmd_attachments(&client, &args, *uid).await?;
        }
        Command::Save { uid, index, out } => {
            cmd_save(&client, *uid, *index, out.clone()).await?;
        }
        Command::Count => {
            let count = client.count().await?;
            if args.json {
                println!("{}", serde_json::json!({ "count": count }));
            } else {
                println!("{count} message(s)");
            }
        }
    }

    client.close().await?;
    Ok(())
}

async fn cmd_list(
    client: &MailClient,
    args: &Args,
    query: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let mut views = client.messages(query).await?;
    views.reverse();
    views.truncate(limit);

    let mut headers = Vec::with_capacity(views.len());
    for view in &mut views {
        let header = view.header().await?.clone();
        let subject = view.subject().await?;
        let from = view.from().await?;
        headers.push((header, from, subject));
    }

    if args.json {
        let list: Vec<&HeaderInfo> = headers.iter().map(|(h, _, _)| h).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        print_message_table(&headers);
    }

    Ok(())
}

async fn cmd_show(
    client: &MailClient,
    args: &Args,
    uid: u32,
    format: Format,
) -> anyhow::Result<()> {
    let mut view = client.message(uid);
    let header = view.header().await?.clone();
    let detail = MessageDetail {
        header: &header,
        subject: view.subject().await?,
        from: view.from().await?,
        to: view.to().await?,
        body: view.render_body(format.subtype()).await?,
        attachments: view.attachments().await?.to_vec(),
        inline_content: view.inline_content().await?.to_vec(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print_message_detail(&detail);
    }

    Ok(())
}

async fn cmd_attachments(client: &MailClient, args: &Args, uid: u32) -> anyhow::Result<()> {
    let mut view = client.message(uid);
    let parts = listed_parts(&mut view).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&parts)?);
    } else if parts.is_empty() {
        println!("No attachments.");
    } else {
        print_part_table(&parts);
    }

    Ok(())
}

async fn cmd_save(
    client: &MailClient,
    uid: u32,
    index: usize,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut view = client.message(uid);
    let parts = listed_parts(&mut view).await?;
    let Some(part) = parts.get(index) else {
        bail!("UID {uid} has {} part(s), no index {index}", parts.len());
    };

    let payload = view.attachment_payload(part).await?;
    let path = out.unwrap_or_else(|| PathBuf::from(&part.filename));
    let bytes = payload.into_bytes();
    std::fs::write(&path, &bytes).with_context(|| format!("Writing {}", path.display()))?;
    println!("Saved {} byte(s) to {}", bytes.len(), path.display());

    Ok(())
}

/// Attachments followed by inline parts, the order `attachments` prints.
async fn listed_parts(view: &mut MessageView<ImapTransport>) -> anyhow::Result<Vec<AttachmentRef>> {
    let mut parts = view.attachments().await?.to_vec();
    parts.extend_from_slice(view.inline_content().await?);
    Ok(parts)
}

fn print_message_table(rows: &[(HeaderInfo, String, String)]) {
    if rows.is_empty() {
        println!("No messages found.");
        return;
    }

    let header = format!("{:<8} {:<20} {:<30} {}", "UID", "Date", "From", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(100));

    for (info, from, subject) in rows {
        let date = info
            .parsed_date()
            .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{:<8} {:<20} {:<30} {}",
            info.uid,
            date,
            truncate(from, 28),
            truncate(subject, 40),
        );
    }

    println!("\n{} message(s)", rows.len());
}

fn print_message_detail(detail: &MessageDetail<'_>) {
    println!("UID:     {}", detail.header.uid);
    println!("Date:    {}", detail.header.date.as_deref().unwrap_or("-"));
    println!("From:    {}", detail.from);
    println!("To:      {}", detail.to);
    println!("Subject: {}", detail.subject);
    if let Some(id) = &detail.header.message_id {
        println!("Msg-ID:  {id}");
    }
    if let Some(parent) = &detail.header.in_reply_to {
        println!("Reply-To-ID: {parent}");
    }

    println!("\n--- Body ---\n");
    println!("{}", detail.body.as_deref().unwrap_or("(no text body)"));

    if !detail.attachments.is_empty() {
        println!("\n--- Attachments ---");
        for part in &detail.attachments {
            println!("  {} ({})", part.filename, part.mimetype);
        }
    }

    if !detail.inline_content.is_empty() {
        println!("\n--- Inline Content ---");
        for part in &detail.inline_content {
            println!("  {} ({})", part.filename, part.mimetype);
        }
    }
}

fn print_part_table(parts: &[AttachmentRef]) {
    println!(
        "{:<6} {:<8} {:<12} {:<24} {:<10} {}",
        "Index", "Part", "Kind", "Type", "Size", "Filename"
    );
    println!("{}", "-".repeat(90));
    for (index, part) in parts.iter().enumerate() {
        let kind = if part.is_attachment { "attachment" } else { "inline" };
        let size = part.size.map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "{:<6} {:<8} {:<12} {:<24} {:<10} {}",
            index,
            part.path.to_string(),
            kind,
            truncate(&part.mimetype, 22),
            size,
            part.filename,
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
