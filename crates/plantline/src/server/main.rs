use clap::Parser;
use plantline::{
    server::{
        config::{CliArgs, ServerConfig},
        lock::InstanceLock,
        plant::Plant,
    },
    telemetry::init_telemetry,
};
use plantline_core::Error;
use std::sync::Arc;
use tokio::{net::UdpSocket, signal};
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    let providers = init_telemetry("plantline-plant")?;
    let config = ServerConfig::try_from(args)?;

    // Held until the end of `main`, after the socket is closed.
    let lock = InstanceLock::acquire(&config.lock_path)?;

    let socket = UdpSocket::bind(config.server_addr)
        .await
        .map_err(|e| Error::transport(format!("bind {}", config.server_addr), e))?;
    log_startup_info(&socket, &config);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let plant = Plant::new(Arc::new(socket), config);
    let res = plant.serve(shutdown).await;

    match &res {
        Ok(()) => tracing::info!("PLANT shut down successfully"),
        Err(e) => tracing::error!("PLANT stopped: {e}"),
    }

    drop(plant);
    drop(lock);
    providers.shutdown();
    res.map_err(Into::into)
}

fn log_startup_info(socket: &UdpSocket, config: &ServerConfig) {
    let addr = socket
        .local_addr()
        .map_or_else(|_| config.server_addr.to_string(), |a| a.to_string());

    if cfg!(debug_assertions) {
        tracing::info!("PLANT listening on {} with full config: {:#?}", addr, config);
    } else {
        tracing::info!(
            "PLANT listening on {} with {} workers",
            addr,
            config.num_workers
        );
    }
}

async fn shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    token.cancel();
}
