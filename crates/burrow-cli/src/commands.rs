use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use burrow_channels::telegram::TelegramChannel;
use burrow_channels::ChannelManager;
use burrow_config::{BurrowConfig, expand_home, load, resolve_path};
use burrow_core::{BurrowError, Result};
use burrow_runtime::{Agent, MessageBus};

const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";
const PLACEHOLDER_BOT_TOKEN: &str = "YOUR_BOT_TOKEN_HERE";

/// 🕳️ Burrow — a local-first conversational agent
#[derive(Parser)]
#[command(name = "burrow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config.toml (default: ~/.burrow/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and workspace
    Onboard,
    /// Talk to the agent — interactive, or one-shot with -m
    Agent {
        /// Send a single message and exit
        #[arg(short, long)]
        message: Option<String>,
        /// Session key to load and persist history under
        #[arg(short, long, default_value = "cli_default")]
        session: String,
    },
    /// Run the channel gateway (Telegram)
    Gateway,
    /// Show configuration and workspace health
    Status,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let log_level = if self.verbose { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
            )
            .with_target(false)
            .init();

        match self.command {
            Commands::Onboard => cmd_onboard(),
            Commands::Agent { message, session } => {
                cmd_agent(self.config, message, &session).await
            }
            Commands::Gateway => cmd_gateway(self.config).await,
            Commands::Status => cmd_status(self.config),
        }
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<BurrowConfig> {
    load(explicit.as_deref()).map_err(|e| {
        BurrowError::Config(format!("{e}. Have you run 'burrow onboard'?"))
    })
}

// ── agent ──────────────────────────────────────────────────────

async fn cmd_agent(
    config_path: Option<PathBuf>,
    message: Option<String>,
    session_key: &str,
) -> Result<()> {
    let config = load_config(config_path)?;
    let agent = Agent::from_config(&config)?;

    let print_reply = |text: &str| println!("Agent: {text}");

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    if let Some(content) = message {
        return agent.run(&cancel, session_key, &content, print_reply).await;
    }

    println!("🕳️ Burrow interactive mode (type 'exit' or 'quit' to leave)");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        let input = line.trim();
        if input == "exit" || input == "quit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match agent.run(&cancel, session_key, input, print_reply).await {
            Ok(()) => {}
            Err(BurrowError::Cancelled) => break,
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    Ok(())
}

// ── gateway ────────────────────────────────────────────────────

async fn cmd_gateway(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let agent = Arc::new(Agent::from_config(&config)?);

    let cancel = CancellationToken::new();

    let bus = MessageBus::new(agent);
    let handle = bus.handle();
    let worker = bus.start(cancel.clone());

    let mut manager = ChannelManager::new();
    let telegram = &config.channels.telegram;
    if telegram.enabled {
        if telegram.bot_token.is_empty() || telegram.bot_token == PLACEHOLDER_BOT_TOKEN {
            warn!("telegram is enabled but no valid bot token is set; skipping");
        } else {
            manager.register(Arc::new(TelegramChannel::new(telegram, handle.clone())));
            info!("registered telegram channel");
        }
    } else {
        info!("telegram is disabled, skipping");
    }

    if manager.is_empty() {
        cancel.cancel();
        let _ = worker.await;
        return Err(BurrowError::Channel {
            channel: "gateway".into(),
            reason: "no channels enabled; nothing to do".into(),
        });
    }

    let channels_cancel = cancel.clone();
    let channels = tokio::spawn(async move { manager.run_all(channels_cancel).await });

    println!("Gateway is running. Press Ctrl+C to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }

    let _ = worker.await;
    match channels.await {
        Ok(result) => result,
        Err(e) => Err(BurrowError::Channel {
            channel: "gateway".into(),
            reason: format!("channel task panicked: {e}"),
        }),
    }
}

// ── onboard ────────────────────────────────────────────────────

const DEFAULT_IDENTITY: &str = "# Identity\n\
You are Burrow, a lightweight assistant that runs entirely on the user's\n\
own machine and helps with technical and everyday tasks.\n\n\
# Core goals\n\
1. Solve the user's problem, whether a technical question or a hands-on task.\n\
2. Stay lean: short, useful answers over long essays.\n\
3. Treat system tools with care and respect the workspace boundary.\n";

const DEFAULT_AGENT: &str = "# Guidelines\n\
1. **Understand first**: before running commands or writing code, make sure\n\
   you know what the user actually wants.\n\
2. **Use the tools**: when you need file contents, directory structure, or\n\
   command output, call the provided tools instead of guessing.\n\
3. **Safety first**: never run destructive commands or touch anything\n\
   outside the workspace.\n\
4. **Answer precisely**: skip filler, focus on the problem at hand.\n";

const DEFAULT_SOUL: &str = "# Personality\n\
- **Concise**: answers get to the point.\n\
- **Honest**: say \"I don't know\" rather than invent.\n\
- **Friendly**: brief does not mean brusque.\n";

const DEFAULT_USER: &str = "# User preferences\n\
Language: English by default.\n\
Style: for technical questions prefer complete, runnable commands or\n\
commented code that can be copied as-is.\n";

fn default_config_template(api_key: &str) -> String {
    format!(
        r#"[agent]
workspace = "~/.burrow/workspace"
model = "openai/gpt-4o-mini"
max_tokens = 8192
temperature = 0.7
max_tool_iterations = 20
restrict_to_workspace = true

[providers.openai]
api_key = "{api_key}"

[providers.ollama]
api_key = "ollama"
api_base = "http://localhost:11434/v1"

[channels.telegram]
enabled = false
bot_token = "{PLACEHOLDER_BOT_TOKEN}"
allow_from = []
"#
    )
}

fn cmd_onboard() -> Result<()> {
    println!("🌟 Initializing Burrow...");

    let base = PathBuf::from(expand_home("~/.burrow"));
    let workspace = base.join("workspace");

    print!("Enter your OpenAI-compatible API key (press Enter to skip): ");
    std::io::stdout().flush()?;
    let mut entered = String::new();
    std::io::stdin().read_line(&mut entered)?;
    let entered = entered.trim();
    let api_key = if entered.is_empty() { PLACEHOLDER_API_KEY } else { entered };

    for dir in [
        base.clone(),
        workspace.clone(),
        workspace.join("sessions"),
        workspace.join("memory"),
    ] {
        std::fs::create_dir_all(&dir)?;
    }

    let config_path = base.join("config.toml");
    if config_path.exists() {
        println!("ℹ️ Config file already exists at {}, skipped.", config_path.display());
    } else {
        std::fs::write(&config_path, default_config_template(api_key))?;
        println!("✅ Created config file at {}", config_path.display());
    }

    let docs = [
        ("IDENTITY.md", DEFAULT_IDENTITY),
        ("AGENT.md", DEFAULT_AGENT),
        ("SOUL.md", DEFAULT_SOUL),
        ("USER.md", DEFAULT_USER),
    ];
    for (name, content) in docs {
        let path = workspace.join(name);
        if !path.exists() {
            std::fs::write(&path, content)?;
            println!("✅ Created {}", path.display());
        }
    }

    println!("🚀 Onboard complete. Try 'burrow agent' to start chatting.");
    Ok(())
}

// ── status ─────────────────────────────────────────────────────

fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    println!("🔍 Burrow v{}", env!("CARGO_PKG_VERSION"));
    println!("-------------------------");

    let path = resolve_path(config_path.as_deref());
    if !path.exists() {
        println!("⚠️  Config file: missing at {}", path.display());
        println!("💡 Tip: run 'burrow onboard' to initialize.");
        return Ok(());
    }
    println!("✅ Config file: {}", path.display());

    let config = match load(Some(&path)) {
        Ok(c) => c,
        Err(e) => {
            println!("❌ Config parse error: {e}");
            return Ok(());
        }
    };

    println!("✅ Model: {}", config.agent.model);
    let workspace = PathBuf::from(expand_home(&config.agent.workspace));
    if workspace.exists() {
        println!("✅ Workspace: {}", workspace.display());
    } else {
        println!("❌ Workspace directory missing: {}", workspace.display());
    }

    let telegram = &config.channels.telegram;
    if telegram.enabled {
        if telegram.bot_token.is_empty() || telegram.bot_token == PLACEHOLDER_BOT_TOKEN {
            println!("⚠️  Telegram: enabled but the bot token is invalid/default");
        } else {
            println!("✅ Telegram: ready");
        }
    } else {
        println!("ℹ️  Telegram: disabled");
    }

    println!("-------------------------");
    println!("🚀 Run 'burrow agent' for interactive mode.");
    println!("🌐 Run 'burrow gateway' to serve channels.");
    Ok(())
}
