use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use relay_bot::config::{self, DEFAULT_MESSAGE};
use relay_bot::connection::conn;
use relay_bot::database::query_records;
use relay_bot::{RelayOutcome, RelayUseCase, TelegramClient};

#[derive(Debug, Parser)]
#[command(name = "relay-bot", version, about = "Sends query results to a Telegram chat")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the query and send the rows to TELEGRAM_CHAT_ID.
    Send {
        /// Always send the rows as a JSON document.
        #[arg(long)]
        as_file: bool,

        /// SQL to run instead of SQL_QUERY.
        #[arg(long)]
        query: Option<String>,

        /// Heading for the message.
        #[arg(long, default_value = DEFAULT_MESSAGE)]
        message: String,
    },

    /// Print the chat id of the latest message sent to the bot.
    ChatId,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    match cli.command {
        Command::Send {
            as_file,
            query,
            message,
        } => {
            let sql = query.unwrap_or_else(|| config.sql_query.clone());
            let store = conn(&config.database_url, config.busy_timeout)?;
            let records = query_records(store.connection(), &sql)?;
            tracing::info!(records = records.len(), "query finished");

            let client = TelegramClient::new(config.token()?)?
                .with_chat(config.chat()?, config.parse_mode.clone());
            let relay = RelayUseCase::new(Box::new(client));

            match relay.relay(&records, &message, as_file).await? {
                RelayOutcome::Messages { parts } => {
                    println!("✅ Data sent to Telegram in {} message(s)", parts)
                }
                RelayOutcome::File => println!("✅ Data sent to Telegram as a file"),
                RelayOutcome::NoData => bail!("query returned no rows, nothing was sent"),
            }
        }
        Command::ChatId => {
            let client = TelegramClient::new(config.token()?)?;
            println!("Send any message to the bot, then this command reads it back.");

            let Some(chat) = client.get_updates().await? else {
                bail!("no messages found; send the bot a message first");
            };

            println!("Found chat id: {}", chat.id);
            if let Some(name) = chat.first_name.as_deref().or(chat.username.as_deref()) {
                println!("User: {}", name);
            }
            println!("\nAdd to .env:\nTELEGRAM_CHAT_ID={}", chat.id);

            client
                .send_to(chat.id, "The bot works. This is a test message from relay-bot.")
                .await?;
            println!("Test message sent");
        }
    }

    Ok(())
}
