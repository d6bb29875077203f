//! Process entry point: load configuration, stand up the liteserver client
//! pool, and serve the HTTP/JSON-RPC front end until signaled to stop.
//! Bootstrap shape mirrors the teacher's debugging-service binary: load or
//! dump config, init tracing, build a runtime by hand, block on an async
//! `run`.

use std::sync::Arc;

use gateway_common::config::{make_config_loader, GatewayConfig};
use gateway_common::SafeDisplay;
use gateway_core::{ClientFactory, Manager};
use gateway_liteclient::stub::StubLiteClient;
use gateway_liteclient::LiteClient;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod liteserver_source;

fn main() -> anyhow::Result<()> {
    let config = make_config_loader().load()?;
    init_tracing(&config.tracing.level, config.tracing.jsonify);
    info!(config = %config.to_safe_string(), "starting gateway");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(config))
}

fn init_tracing(level: &str, jsonify: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if jsonify {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Builds the per-worker client factory. Each worker gets its own
/// `<keystore_path>/worker_<index>` directory, mirroring how the original
/// gateway keeps one liteserver's key material isolated from the others'.
fn client_factory(keystore_path: &std::path::Path) -> ClientFactory {
    let keystore_path = keystore_path.to_path_buf();
    Arc::new(move |liteserver| {
        let worker_keystore = keystore_path.join(format!("worker_{}", liteserver.index));
        if let Err(err) = std::fs::create_dir_all(&worker_keystore) {
            error!(path = %worker_keystore.display(), %err, "failed to create worker keystore directory");
        }
        Arc::new(StubLiteClient::new(1, liteserver.archival_hint).with_keystore_path(worker_keystore))
            as Arc<dyn LiteClient>
    })
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let liteservers = liteserver_source::load(&config.liteserver, config.parallel_requests_per_liteserver).await?;
    info!(count = liteservers.len(), "resolved liteserver list");

    let manager = Manager::start(
        liteservers,
        client_factory(&config.keystore_path),
        config.parallel_requests_per_liteserver as usize,
        config.supervisor.clone(),
        config.request_timeout,
        &config.cache,
        config.strict_message_decoding,
    )?;

    let http_address = config.http.address.clone();
    let http_port = config.http.port;
    let server_manager = manager.clone();
    let server = tokio::spawn(async move { gateway_api::serve(server_manager, &http_address, http_port).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
        result = server => {
            match result {
                Ok(Ok(())) => info!("HTTP/JSON-RPC front end exited"),
                Ok(Err(err)) => error!(%err, "HTTP/JSON-RPC front end exited with an error"),
                Err(err) => error!(%err, "HTTP/JSON-RPC front end task panicked"),
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
