//! # Telemetry Features
//!
//! Both binaries always log through `tracing` to the console. Metrics are
//! optional and exported via OpenTelemetry.
//!
//! ## Feature matrix
//!
//! - `metrics`: Enables OpenTelemetry metrics (counters and a histogram).
//! - `stdout`: Exports metrics to stdout every few seconds.
//!
//! ## Metrics
//!
//! - `orders_accepted`: orders confirmed by the plant
//! - `orders_interrupted`: orders cut short by shutdown
//! - `parts_claimed`: parts taken from work pools by all workers
//! - `order_duration`: order-to-completion time in milliseconds
//!
//! When `metrics` is disabled the recording functions below compile to
//! no-ops, so call sites need no feature gates.
//!
//! ## Example usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin plant --features metrics,stdout -- 4 50015
//! ```

#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, Meter},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{Resource, metrics as sdkmetrics};
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

/// Providers that must be flushed before the process exits.
pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down every exporter. Failures are reported on
    /// stderr since the subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber (and meter provider, when enabled).
///
/// The log level comes from `RUST_LOG` and defaults to `info`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_telemetry(service_name: &'static str) -> anyhow::Result<TelemetryProviders> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "metrics")]
    let meter_provider = {
        let meter_provider = init_metrics(service_name);
        opentelemetry::global::set_meter_provider(meter_provider.clone());

        let scope = InstrumentationScope::builder(service_name)
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        init_metric_handles(&opentelemetry::global::meter_with_scope(scope));
        meter_provider
    };
    #[cfg(not(feature = "metrics"))]
    let _ = service_name;

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "metrics")]
fn resource(service_name: &'static str) -> Resource {
    Resource::builder()
        .with_service_name(service_name)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics(service_name: &'static str) -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource(service_name));

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "metrics")]
static ORDERS_ACCEPTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ORDERS_INTERRUPTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PARTS_CLAIMED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ORDER_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = ORDERS_ACCEPTED.set(
        meter
            .u64_counter("orders_accepted")
            .with_description("Orders confirmed by the plant")
            .build(),
    );

    let _ = ORDERS_INTERRUPTED.set(
        meter
            .u64_counter("orders_interrupted")
            .with_description("Orders cut short by shutdown")
            .build(),
    );

    let _ = PARTS_CLAIMED.set(
        meter
            .u64_counter("parts_claimed")
            .with_description("Parts claimed from work pools")
            .build(),
    );

    let _ = ORDER_DURATION_MS.set(
        meter
            .f64_histogram("order_duration")
            .with_unit("ms")
            .with_description("Order-to-completion time")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_orders_accepted() {
    if let Some(counter) = ORDERS_ACCEPTED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_orders_accepted() {}

#[cfg(feature = "metrics")]
pub fn increment_orders_interrupted() {
    if let Some(counter) = ORDERS_INTERRUPTED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_orders_interrupted() {}

#[cfg(feature = "metrics")]
pub fn increment_parts_claimed(count: u64) {
    if let Some(counter) = PARTS_CLAIMED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_parts_claimed(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn record_order_duration(duration_ms: f64) {
    if let Some(histogram) = ORDER_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_order_duration(_duration_ms: f64) {}
