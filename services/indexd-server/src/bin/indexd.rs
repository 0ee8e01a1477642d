//! indexd node
//!
//! Serves search sessions over newline-delimited JSON on TCP.

use clap::Parser;
use indexd::core::config::Config;
use indexd::core::services::Services;
use indexd::rpc::RpcServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Search index node
#[derive(Parser, Debug)]
#[command(name = "indexd")]
#[command(version)]
#[command(about = "Search index node", long_about = None)]
struct Args {
    /// Config file (default: INDEXD_CONFIG, then the user config dir, then ./indexd.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Directory all session paths are resolved against
    #[arg(long, value_name = "DIR")]
    root_dir: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("indexd=info"));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn load_config(args: &Args) -> indexd::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.merge_env();
            config
        }
        None => Config::load()?,
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(root_dir) = &args.root_dir {
        config.storage.root_dir = root_dir.clone();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.json_logs);

    // Load configuration
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });
    config.log_config();

    // Create services
    let services = Services::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to initialize: {e}");
        std::process::exit(1);
    });
    tracing::info!("Root directory: {}", services.root.path().display());

    let server = RpcServer::bind(services).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind: {e}");
        std::process::exit(1);
    });

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
