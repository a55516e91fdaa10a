use clap::{Parser, Subcommand, ValueEnum};
use yuanzhang::channels::{InboundEvent, SourceKind};
use yuanzhang::router::EventRouter;

#[derive(Parser)]
#[command(name = "yuanzhang")]
#[command(about = "Yuanzhang LINE bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config.json, quotes.json).
    Init {
        /// Config file path (default: YUANZHANG_CONFIG_PATH or ~/.yuanzhang/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway. Fails at startup when any credential or endpoint is missing.
    Gateway {
        /// Config file path (default: YUANZHANG_CONFIG_PATH or ~/.yuanzhang/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from PORT, config, or 15151)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run one message through the reply router and print the reply as JSON. Nothing is sent to LINE.
    Ask {
        /// Config file path (default: YUANZHANG_CONFIG_PATH or ~/.yuanzhang/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Chat type the message pretends to come from.
        #[arg(long, value_enum, default_value_t = Source::Individual)]
        source: Source,

        /// Message text, e.g. "院長，颱風"
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Individual,
    Group,
    Room,
}

impl From<Source> for SourceKind {
    fn from(s: Source) -> Self {
        match s {
            Source::Individual => SourceKind::Individual,
            Source::Group => SourceKind::Group,
            Source::Room => SourceKind::Room,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("yuanzhang {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask {
            config,
            source,
            text,
        }) => {
            if let Err(e) = run_ask(config, source, text).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(yuanzhang::config::default_config_path);
    let dir = yuanzhang::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn load_settings(
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<yuanzhang::config::Settings> {
    let (config, path) = yuanzhang::config::load_config(config_path)?;
    let settings = yuanzhang::config::resolve_settings(&config, &path)?;
    Ok(settings)
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut settings = load_settings(config_path)?;
    if let Some(p) = port {
        settings.port = p;
    }
    log::info!("starting gateway on {}:{}", settings.bind, settings.port);
    yuanzhang::gateway::run_gateway(settings).await
}

async fn run_ask(
    config_path: Option<std::path::PathBuf>,
    source: Source,
    text: String,
) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let router = EventRouter::from_settings(&settings);
    let event = InboundEvent::text(source.into(), "cli", text);
    match router.route(&event).await {
        Some(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
        None => println!("(no reply: message would be ignored)"),
    }
    Ok(())
}
