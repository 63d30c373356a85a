use clap::Parser;
use tokio::net::TcpListener;

use override_proxy::builtin::builtin_rules;
use override_proxy::cli::Cli;
use override_proxy::config::validation::validate_config;
use override_proxy::config::watcher::RulesWatcher;
use override_proxy::config::{load_config, ConfigError, ProxyConfig};
use override_proxy::http::HttpServer;
use override_proxy::lifecycle::{shutdown_signal, Shutdown};
use override_proxy::observability::{logging, metrics};
use override_proxy::registry::{RegistryLoader, SharedRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.target,
        overrides = ?config.overrides.directory,
        "override-proxy starting"
    );

    let mut loader = RegistryLoader::new();
    if config.overrides.builtin_ping {
        loader = loader.with_source(builtin_rules());
    }
    if let Some(directory) = &config.overrides.directory {
        loader = loader.with_directory(directory.clone());
    }
    let registry = SharedRegistry::new(loader.load());
    tracing::info!(rules = ?registry.snapshot().names(), "Rules loaded");

    // Held until exit; dropping it stops the watch.
    let _watcher = match loader.directory() {
        Some(directory) if config.overrides.watch && directory.is_dir() => {
            match RulesWatcher::new(directory, loader.clone(), registry.clone()).run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to watch overrides directory, hot reload disabled");
                    None
                }
            }
        }
        _ => None,
    };

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    });

    let server = HttpServer::new(config, registry)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
