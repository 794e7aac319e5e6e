//! cache-module - Fetch JSON documents through an in-memory cache
//!
//! Requests a URL several times through a `CacheModule`, printing each
//! document, so the cache's hit/miss behaviour can be watched in the logs.

use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cache_module::cache::CacheModule;
use cache_module::cli::{Cli, StartupConfig};
use cache_module::http::{HttpJsonService, HttpRequest};

/// Installs the log subscriber, writing to stderr so stdout stays pure JSON
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cache_module=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    };

    init_logging();

    let cache = CacheModule::new(
        Arc::new(config.settings),
        config.name,
        Arc::new(HttpJsonService::new()),
    )
    .with_method(config.method)
    .with_key_fn(|request: &HttpRequest| request.url.clone())
    .coalesce_misses(config.coalesce);

    info!(
        "[{}] Expiration: {:?}",
        cache.name(),
        cache.expiration()
    );

    let request = HttpRequest::new(config.url);

    for round in 0..config.repeat {
        if round > 0 && !config.interval.is_zero() {
            tokio::time::sleep(config.interval).await;
        }

        let results =
            join_all((0..config.concurrency).map(|_| cache.ensure_available(&request))).await;

        for result in results {
            match result {
                Ok(document) => println!("{}", serde_json::to_string_pretty(&document)?),
                Err(err) => {
                    error!("[{}] Request failed: {}", cache.name(), err);
                    return Err(err.into());
                }
            }
        }
    }

    Ok(())
}
