use clap::{Parser, Subcommand};
use relay::gateway::CallbackAfterSendSingleMsgReq;
use relay::http::CallContext;
use relay::relay::{Outcome, Relay};

#[derive(Parser)]
#[command(name = "bot-relay")]
#[command(about = "Bot relay for after-send message callbacks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file with every setting spelled out.
    Init {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway. Requires bot.userId (or RELAY_BOT_USER_ID).
    #[command(alias = "gateway")]
    Serve {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run the relay once, in the foreground, for a callback body stored in a JSON file.
    Replay {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// File holding a callbackAfterSendSingleMsgCommand body.
        #[arg(value_name = "FILE")]
        callback: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("bot-relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Replay { config, callback }) => {
            if let Err(e) = run_replay(config, callback).await {
                log::error!("replay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(relay::config::default_config_path);
    let dir = relay::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = relay::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    relay::gateway::run_gateway(config).await
}

async fn run_replay(
    config_path: Option<std::path::PathBuf>,
    callback: std::path::PathBuf,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let (config, _) = relay::config::load_config(config_path)?;
    let raw = std::fs::read_to_string(&callback)
        .with_context(|| format!("reading callback from {}", callback.display()))?;
    let event: CallbackAfterSendSingleMsgReq = serde_json::from_str(&raw)
        .with_context(|| format!("parsing callback from {}", callback.display()))?;

    let relay = Relay::from_config(&config, reqwest::Client::new())?;
    let op = Some(event.operation_id.clone()).filter(|s| !s.is_empty());
    let ctx = CallContext::new(op, tokio_util::sync::CancellationToken::new());
    match relay.handle(&ctx, &event).await? {
        Outcome::Ignored => println!("ignored: message does not need a bot reply"),
        Outcome::Sent(resp) => println!("{}", serde_json::to_string_pretty(&resp)?),
    }
    Ok(())
}
