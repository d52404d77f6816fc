//! FieldOps Web Server
//!
//! Authorization and scoped-access backend for field-operations teams.

use anyhow::Context;
use clap::Parser;
use fieldops_core::{init_logging, LoggingConfig};
use fieldops_web::server::FieldOpsServerBuilder;
use fieldops_web::WebConfig;

/// FieldOps web server - authorization and scoped data access
#[derive(Parser)]
#[command(name = "fieldops-web")]
#[command(about = "Authorization backend for field operations")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Database URL for persistent storage
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let logging = LoggingConfig {
        level: args.log_level.clone(),
        ..LoggingConfig::default()
    };
    init_logging(&logging).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = WebConfig::from_env();
    config.host = args.host;
    config.port = args.port;
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }

    let mut builder = FieldOpsServerBuilder::new()
        .host(config.host.clone())
        .port(config.port);
    if let Some(database_url) = config.database_url.clone() {
        builder = builder.database_url(database_url);
    }

    let server = builder.build().await.context("failed to build server")?;
    server.start().await.context("server error")?;

    Ok(())
}
