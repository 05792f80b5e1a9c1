//! runhub server binary
//!
//! Loads the runtime registry, builds the local process backend and serves the
//! execution API until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use runhub_api::{shutdown_signal, RunhubServer, ServerConfig};
use runhub_core::{ExecutionBackend, ProcessBackend, ProcessBackendConfig, Registry, RegistryLoader};

#[derive(Parser, Debug)]
#[clap(author, version, about = "runhub - remote code execution server")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, default_value = "runtimes.yaml", help = "Runtime registry file")]
    runtimes: PathBuf,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the server (default command)
    Run,
    /// Print the runtimes the registry file declares
    Runtimes {
        #[clap(long, help = "Print the listing as JSON")]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    #[clap(long, default_value = "127.0.0.1:2000")]
    bind_addr: String,

    #[clap(long, default_value_t = 1000, help = "Milliseconds a /connect client has to send init")]
    init_timeout_ms: u64,

    #[clap(long, default_value_t = 64, help = "Jobs that may be primed at once")]
    max_concurrent_jobs: usize,

    #[clap(long, default_value_t = 64 * 1024, help = "Bytes kept per output stream before a stage is killed")]
    output_limit: usize,

    #[clap(long, help = "Directory job files are staged under (defaults to the system temp dir)")]
    staging_root: Option<PathBuf>,

    #[clap(long, help = "Allowed CORS origins (any origin when omitted)")]
    cors_origin: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let registry = RegistryLoader::from_file(&cli.runtimes).await?;

    match cli.command {
        Some(Commands::Runtimes { json }) => print_runtimes(&registry, json),
        Some(Commands::Run) | None => run_server(registry, cli.serve).await,
    }
}

async fn run_server(registry: Registry, args: ServeArgs) -> Result<()> {
    if registry.is_empty() {
        log::warn!("Registry declares no runtimes; every job will be rejected");
    }

    let backend: Arc<dyn ExecutionBackend> = Arc::new(ProcessBackend::new(ProcessBackendConfig {
        output_limit: args.output_limit,
        max_concurrent_jobs: args.max_concurrent_jobs,
        staging_root: args.staging_root,
    }));

    let mut server_config = ServerConfig::default()
        .with_bind_addr_str(&args.bind_addr)?
        .with_init_timeout(Duration::from_millis(args.init_timeout_ms))
        .with_logging(true);
    if !args.cors_origin.is_empty() {
        server_config = server_config.with_cors_origins(args.cors_origin);
    }

    log::info!("Starting runhub server on {}...", server_config.bind_addr);
    let server = RunhubServer::with_config(Arc::new(registry), backend, server_config);

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    log::info!("runhub server shut down gracefully.");
    Ok(())
}

fn print_runtimes(registry: &Registry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&registry.list())?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No runtimes configured.");
        return Ok(());
    }

    println!("{:<4} {:<16} {:<12} {:<10} ALIASES", "ID", "LANGUAGE", "VERSION", "ENGINE");
    for runtime in registry.iter() {
        println!(
            "{:<4} {:<16} {:<12} {:<10} {}",
            runtime.id,
            runtime.language,
            runtime.version,
            runtime.engine.as_deref().unwrap_or("-"),
            runtime.aliases.join(", ")
        );
    }
    Ok(())
}
