use clap::Parser;
use plantline::{
    client::{
        config::{CliArgs, ClientConfig},
        session::Buyer,
    },
    telemetry::init_telemetry,
};
use plantline_core::Error;
use std::sync::Arc;
use tokio::net::UdpSocket;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    let providers = init_telemetry("plantline-buyer")?;
    let config = ClientConfig::try_from(args)?;

    tracing::info!("Attempting plant at {}", config.plant_addr);
    let socket = UdpSocket::bind(config.bind_addr)
        .await
        .map_err(|e| Error::transport(format!("bind {}", config.bind_addr), e))?;

    let buyer = Buyer::new(Arc::new(socket), config.plant_addr, config.timeout);
    let res = buyer.place_order(config.order_size).await;

    match &res {
        Ok(report) => {
            println!("\n{report}");
            if report.is_short() {
                tracing::warn!("Order was delivered short");
            }
            println!("\n>>> PROCUREMENT Terminated");
        }
        Err(Error::SessionAborted) => {
            eprintln!("\nPROCUREMENT: The plant aborted the order; no summary is available");
        }
        Err(e) => tracing::error!("PROCUREMENT failed: {e}"),
    }

    providers.shutdown();
    res.map(|_| ()).map_err(Into::into)
}
