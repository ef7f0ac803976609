use anyhow::{Context, Result};
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

use thrift_messaging::config::AppConfig;
use thrift_messaging::logging::{init_logging, OperationTimer};
use thrift_messaging::metrics::MetricsCollector;
use thrift_messaging::models::{Attachment, ConversationStatus, NotificationPreference, UserProfile};
use thrift_messaging::{Database, MessagingService};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database url, overrides configuration (e.g. sqlite:data/messaging.db)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or update a user in the directory
    AddUser {
        #[arg(long)]
        id: i64,

        #[arg(short, long)]
        name: String,

        #[arg(long)]
        picture: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
    /// Find or create the conversation between two users
    CreateConversation {
        #[arg(long)]
        from: i64,

        #[arg(long)]
        to: i64,

        /// Mark as a conversation with the AI assistant
        #[arg(long)]
        ai: bool,
    },
    /// List a user's conversations
    Conversations {
        #[arg(short, long)]
        user: i64,

        /// active, archived or deleted
        #[arg(short, long, default_value = "active")]
        status: String,

        /// Filter by the other participant's name
        #[arg(long)]
        search: Option<String>,
    },
    /// Send a message
    Send {
        #[arg(short, long)]
        conversation: i64,

        #[arg(short, long)]
        sender: i64,

        #[arg(short, long)]
        text: Option<String>,

        /// Attachment url or storage path
        #[arg(long)]
        attachment_url: Option<String>,

        #[arg(long, requires = "attachment_url")]
        attachment_name: Option<String>,

        #[arg(long, default_value = "0")]
        attachment_size: i64,
    },
    /// List messages of a conversation
    Messages {
        #[arg(short, long)]
        conversation: i64,

        /// Mark the viewer's incoming messages read
        #[arg(long)]
        viewer: Option<i64>,

        #[arg(short, long)]
        limit: Option<u32>,

        #[arg(short, long)]
        offset: Option<u32>,
    },
    /// Mark a message read
    Read {
        #[arg(short, long)]
        message: i64,
    },
    /// Delete a message (sender only)
    Delete {
        #[arg(short, long)]
        message: i64,

        #[arg(short, long)]
        user: i64,
    },
    /// Full-text search over a user's messages
    Search {
        #[arg(short, long)]
        user: i64,

        term: String,
    },
    /// Archive a conversation
    Archive {
        #[arg(short, long)]
        conversation: i64,
    },
    /// Delete a conversation
    DeleteConversation {
        #[arg(short, long)]
        conversation: i64,
    },
    /// Unread message count across active conversations
    Unread {
        #[arg(short, long)]
        user: i64,
    },
    /// Store notification preferences
    SetPreferences {
        #[arg(short, long)]
        user: i64,

        #[arg(long)]
        disable: bool,

        #[arg(long)]
        email: bool,

        /// Quiet hours start (HH:MM)
        #[arg(long, requires = "quiet_end")]
        quiet_start: Option<String>,

        /// Quiet hours end (HH:MM)
        #[arg(long, requires = "quiet_start")]
        quiet_end: Option<String>,
    },
    /// List a user's notifications
    Notifications {
        #[arg(short, long)]
        user: i64,

        #[arg(long)]
        unread: bool,
    },
    /// Emails waiting for the mailer
    Outbox {
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    let cli = Cli::parse();
    config.database.url = cli.database.unwrap_or_else(|| config.get_database_url());
    config.validate()?;

    // Initialize logging; the guard keeps the file writer alive
    let _guard = init_logging(
        Some(&config.get_log_level()),
        config.logging.file_path.as_deref().map(std::path::Path::new),
        config.logging.format == "json",
    )?;

    if let Err(e) = MetricsCollector::init() {
        error!(error = %e, "Metrics disabled");
    }

    info!("Starting thrift-messaging");

    let db = Database::with_config(&config.database).context("Failed to open database")?;
    let service = MessagingService::new(db, &config)?;

    let result = run(&service, cli.command).await;
    service.drain_notifications().await;
    result
}

async fn run(service: &MessagingService, command: Commands) -> Result<()> {
    let timer = OperationTimer::new("cli_command");

    match command {
        Commands::AddUser {
            id,
            name,
            picture,
            email,
        } => {
            let user = service
                .database()
                .add_or_update_user(UserProfile {
                    id,
                    display_name: name,
                    profile_picture: picture,
                    email,
                })
                .await?;
            print_json(&user)?;
        }
        Commands::CreateConversation { from, to, ai } => {
            print_json(&service.create_conversation(from, to, ai).await?)?;
        }
        Commands::Conversations { user, status, search } => {
            let status: ConversationStatus = status.parse().map_err(anyhow::Error::msg)?;
            print_json(&service.list_conversations(user, Some(status), search.as_deref()).await?)?;
        }
        Commands::Send {
            conversation,
            sender,
            text,
            attachment_url,
            attachment_name,
            attachment_size,
        } => {
            let attachment = attachment_url.map(|url| Attachment {
                original_name: attachment_name.unwrap_or_else(|| file_name_of(&url)),
                url,
                size_bytes: attachment_size,
            });
            let message = service
                .send_message(conversation, sender, text.as_deref(), attachment)
                .await?;
            print_json(&message)?;
        }
        Commands::Messages {
            conversation,
            viewer,
            limit,
            offset,
        } => {
            print_json(&service.list_messages(conversation, viewer, limit, offset).await?)?;
        }
        Commands::Read { message } => {
            print_json(&service.mark_message_read(message).await?)?;
        }
        Commands::Delete { message, user } => {
            service.delete_message(message, user).await?;
            info!(message_id = message, "Message deleted");
        }
        Commands::Search { user, term } => {
            print_json(&service.search_messages(user, &term).await?)?;
        }
        Commands::Archive { conversation } => {
            print_json(&service.archive_conversation(conversation).await?)?;
        }
        Commands::DeleteConversation { conversation } => {
            print_json(&service.delete_conversation(conversation).await?)?;
        }
        Commands::Unread { user } => {
            print_json(&service.unread_count(user).await?)?;
        }
        Commands::SetPreferences {
            user,
            disable,
            email,
            quiet_start,
            quiet_end,
        } => {
            let quiet_hours_start = quiet_start.as_deref().map(parse_time_of_day).transpose()?;
            let quiet_hours_end = quiet_end.as_deref().map(parse_time_of_day).transpose()?;
            let preferences = NotificationPreference {
                user_id: user,
                new_messages_enabled: !disable,
                email_notifications_enabled: email,
                quiet_hours_enabled: quiet_hours_start.is_some(),
                quiet_hours_start,
                quiet_hours_end,
            };
            print_json(&service.update_preferences(preferences).await?)?;
        }
        Commands::Notifications { user, unread } => {
            print_json(&service.list_notifications(user, unread).await?)?;
        }
        Commands::Outbox { limit } => {
            print_json(&service.pending_emails(limit).await?)?;
        }
    }

    timer.finish();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a time of day given as HH:MM or HH:MM:SS
fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .with_context(|| format!("Invalid time of day: {value} (expected HH:MM)"))
}

fn file_name_of(url: &str) -> String {
    PathBuf::from(url)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(url)
        .to_string()
}
