use clap::{Parser, ValueEnum};
use dayplanner_agent::auth::AccessCredential;
use dayplanner_agent::config::AppConfig;
use dayplanner_agent::model::ModelBackend;
use dayplanner_agent::server;
use dayplanner_agent::service::BriefingService;
use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "dayplanner",
    version,
    about = "Daily meeting briefing agent backed by declarative API plugins"
)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    /// Override the plugin root directory from the config file
    #[arg(long)]
    root: Option<std::path::PathBuf>,
    /// Inbound user access token (CLI mode only)
    #[arg(long)]
    token: Option<String>,
    /// Language the briefing is written in
    #[arg(long, default_value = "en-US")]
    language: String,
    #[arg(long, value_enum, default_value_t = RunMode::Cli)]
    mode: RunMode,
    #[arg(long, default_value = "127.0.0.1:8080")]
    rest_addr: SocketAddr,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    Cli,
    Rest,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    info!("Starting dayplanner");
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, language = %cli.language, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let mut config = AppConfig::load(config_path)?;
    if let Some(root) = cli.root {
        config.root = root;
    }
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    } else {
        info!("Loaded configuration from the default path");
    }

    let provider = Arc::new(ModelBackend::from_config(&config.model)?);
    info!(provider = %config.model.provider, model = %config.model.model, "Model backend ready");
    let service = Arc::new(BriefingService::new(&config, provider));

    match cli.mode {
        RunMode::Cli => {
            let credential = AccessCredential::new(cli.token.unwrap_or_default());
            info!("Producing a single briefing in CLI mode");
            let plan = service
                .briefing(credential, cli.language, &CancellationToken::new())
                .await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        RunMode::Rest => {
            info!(addr = %cli.rest_addr, "Starting REST server");
            server::serve(service, cli.rest_addr).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
