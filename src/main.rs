use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use dedkolya::chat::ChatService;
use dedkolya::{config, gateway, secrets};

const GREETING: &str = "👴 Дед Коля на связи! Шо надо, курва?";

#[derive(Parser)]
#[command(name = "dedkolya")]
#[command(about = "Дед Коля: a persona chat bot with multi-model fallback")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,

        /// Auth token (required for non-loopback)
        #[arg(long, env = "DEDKOLYA_TOKEN")]
        token: Option<String>,
    },

    /// Talk to the bot. Without a message, reads lines from stdin.
    Chat {
        #[arg(short, long, default_value = "default")]
        user: String,

        message: Vec<String>,
    },

    /// Store a free-form fact about a user
    Remember {
        #[arg(short, long, default_value = "default")]
        user: String,

        #[arg(required = true)]
        fact: Vec<String>,
    },

    /// Add an entry to the shared knowledge base
    Teach {
        topic: String,

        #[arg(required = true)]
        fact: Vec<String>,
    },

    /// Show a user's current mood
    Mood {
        #[arg(short, long, default_value = "default")]
        user: String,
    },

    /// Manage provider API keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Show configured models
    Status,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Prompt for a key and store it in the credential store
    Set {
        /// openrouter | ai21
        provider: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, bind, token } => {
            let mut config = config::load()?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            gateway::run(config, token).await
        }
        Commands::Chat { user, message } => {
            let chat = ChatService::from_config(&config::load()?).await?;
            if message.is_empty() {
                interactive(&chat, &user).await
            } else {
                let reply = chat.handle(&user, &message.join(" ")).await;
                println!("{}", reply.reply);
                Ok(())
            }
        }
        Commands::Remember { user, fact } => {
            let chat = ChatService::from_config(&config::load()?).await?;
            println!("{}", chat.remember(&user, &fact.join(" ")).await?);
            Ok(())
        }
        Commands::Teach { topic, fact } => {
            let chat = ChatService::from_config(&config::load()?).await?;
            println!("{}", chat.teach(&topic, &fact.join(" ")).await?);
            Ok(())
        }
        Commands::Mood { user } => {
            let chat = ChatService::from_config(&config::load()?).await?;
            println!("{}", chat.current_mood(&user).await?);
            Ok(())
        }
        Commands::Key { action } => match action {
            KeyAction::Set { provider } => {
                let key = rpassword::prompt_password(format!("{provider} API key: "))?;
                let path = secrets::store_api_key(&provider, &key)?;
                println!("Saved to {}", path.display());
                Ok(())
            }
        },
        Commands::Status => {
            let config = config::load()?;
            println!("dedkolya v{}", env!("CARGO_PKG_VERSION"));
            println!("config: {}", config::config_path().display());
            println!("storage: {:?} ({})", config.storage.backend, config.storage.database_url);
            for model in &config.agent.models {
                let key = if model.api_key.is_some() { "key set" } else { "no key" };
                println!("model: {} [{}] {key}", model.id, model.provider);
            }
            Ok(())
        }
    }
}

async fn interactive(chat: &ChatService, user: &str) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(format!("{GREETING}\n> ").as_bytes()).await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if matches!(text, "exit" | "quit") {
            break;
        }
        if !text.is_empty() {
            let reply = chat.handle(user, text).await;
            stdout.write_all(format!("{}\n", reply.reply).as_bytes()).await?;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }
    Ok(())
}
