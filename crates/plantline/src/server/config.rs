use crate::server::pool::worker::WorkerSpec;
use anyhow::bail;
use clap::Parser;
use core::{num::NonZeroU32, time::Duration};
use plantline_core::types::{DEFAULT_PORT, MAX_WORKERS};
use rand::Rng;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

/// Runtime configuration for the `plant` binary.
///
/// The two positional arguments mirror the classic invocation
/// `plant [NUM_WORKERS] [PORT]`. Everything else is an optional tuning knob
/// for the simulated production line. All values may also come from the
/// environment (or a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "plant",
    version,
    about = "A UDP plant that fulfils production orders with concurrent workers"
)]
pub struct CliArgs {
    /// Number of workers started for every order.
    ///
    /// Values above the protocol maximum are clamped.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(env = "NUM_WORKERS", default_value_t = 1)]
    pub num_workers: u32,

    /// UDP port to listen on.
    ///
    /// Environment variable: `PLANT_PORT`
    #[arg(env = "PLANT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Local IP address to bind.
    ///
    /// Environment variable: `BIND_IP`
    #[arg(long, env = "BIND_IP", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind_ip: IpAddr,

    /// Smallest number of parts a worker may produce per iteration.
    ///
    /// Environment variable: `MIN_CAPACITY`
    #[arg(long, env = "MIN_CAPACITY", default_value_t = 10)]
    pub min_capacity: u32,

    /// Largest number of parts a worker may produce per iteration.
    ///
    /// Environment variable: `MAX_CAPACITY`
    #[arg(long, env = "MAX_CAPACITY", default_value_t = 50)]
    pub max_capacity: u32,

    /// Shortest simulated production time per iteration, in milliseconds.
    ///
    /// Environment variable: `MIN_DURATION_MS`
    #[arg(long, env = "MIN_DURATION_MS", default_value_t = 500)]
    pub min_duration_ms: u32,

    /// Longest simulated production time per iteration, in milliseconds.
    ///
    /// Environment variable: `MAX_DURATION_MS`
    #[arg(long, env = "MAX_DURATION_MS", default_value_t = 1200)]
    pub max_duration_ms: u32,

    /// Path of the lock file that keeps a second plant from starting.
    ///
    /// Defaults to `plantline.lock` in the system temp directory.
    ///
    /// Environment variable: `LOCK_PATH`
    #[arg(long, env = "LOCK_PATH")]
    pub lock_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub num_workers: u32,
    pub server_addr: SocketAddr,
    pub min_capacity: NonZeroU32,
    pub max_capacity: NonZeroU32,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub lock_path: PathBuf,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        let num_workers = if args.num_workers > MAX_WORKERS {
            tracing::warn!(
                "NUM_WORKERS ({}) exceeds the maximum pool size; clamping to {}",
                args.num_workers,
                MAX_WORKERS
            );
            MAX_WORKERS
        } else {
            args.num_workers
        };

        let Some(min_capacity) = NonZeroU32::new(args.min_capacity) else {
            bail!("MIN_CAPACITY must be greater than 0");
        };
        let Some(max_capacity) = NonZeroU32::new(args.max_capacity) else {
            bail!("MAX_CAPACITY must be greater than 0");
        };

        if min_capacity > max_capacity {
            bail!(
                "MIN_CAPACITY ({}) exceeds MAX_CAPACITY ({})",
                min_capacity,
                max_capacity
            );
        }

        if args.min_duration_ms > args.max_duration_ms {
            bail!(
                "MIN_DURATION_MS ({}) exceeds MAX_DURATION_MS ({})",
                args.min_duration_ms,
                args.max_duration_ms
            );
        }

        Ok(Self {
            num_workers,
            server_addr: SocketAddr::new(args.bind_ip, args.port),
            min_capacity,
            max_capacity,
            min_duration: Duration::from_millis(u64::from(args.min_duration_ms)),
            max_duration: Duration::from_millis(u64::from(args.max_duration_ms)),
            lock_path: args
                .lock_path
                .unwrap_or_else(|| std::env::temp_dir().join("plantline.lock")),
        })
    }
}

impl ServerConfig {
    /// Assigns every worker of the next order a capacity and a production
    /// time, drawn uniformly from the configured ranges.
    ///
    /// Worker IDs start at 1.
    pub fn plan_workers(&self) -> Vec<WorkerSpec> {
        let mut rng = rand::rng();

        (1..=self.num_workers)
            .map(|id| {
                let capacity = rng.random_range(self.min_capacity.get()..=self.max_capacity.get());
                let capacity = NonZeroU32::new(capacity).unwrap_or(self.min_capacity);
                let duration = rng.random_range(self.min_duration..=self.max_duration);
                WorkerSpec {
                    id,
                    capacity,
                    duration,
                }
            })
            .collect()
    }
}
