use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use plantline_core::types::DEFAULT_PORT;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Runtime configuration for the `buyer` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "buyer",
    version,
    about = "Places one production order with a plant and reports the result"
)]
pub struct CliArgs {
    /// Number of parts to order.
    pub order_size: u32,

    /// IP address of the plant.
    ///
    /// Environment variable: `PLANT_IP`
    #[arg(env = "PLANT_IP")]
    pub plant_ip: String,

    /// UDP port the plant listens on.
    ///
    /// Environment variable: `PLANT_PORT`
    #[arg(env = "PLANT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Give up if the plant stays silent for this many seconds.
    ///
    /// Environment variable: `BUYER_TIMEOUT_SECS`
    #[arg(long, env = "BUYER_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub order_size: u32,
    pub plant_addr: SocketAddr,
    /// Local address to bind; same family as `plant_addr`, ephemeral port.
    pub bind_addr: SocketAddr,
    pub timeout: Duration,
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let ip: IpAddr = args
            .plant_ip
            .trim()
            .parse()
            .with_context(|| format!("invalid PLANT_IP {:?}", args.plant_ip))?;

        if args.timeout_secs == 0 {
            bail!("BUYER_TIMEOUT_SECS must be greater than 0");
        }

        let bind_ip = match ip {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };

        Ok(Self {
            order_size: args.order_size,
            plant_addr: SocketAddr::new(ip, args.port),
            bind_addr: SocketAddr::new(bind_ip, 0),
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }
}
